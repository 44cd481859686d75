//! End-to-end voting scenarios driven through `Swarm`'s public API rather
//! than `VotingEngine` directly — covers proposal submission, vote intake,
//! and the tick-driven timeout evaluation together.

use swarmcore::config::Config;
use swarmcore::geometry::Vec2;
use swarmcore::scheduler::Swarm;
use swarmcore::voting::{ProposalKind, VoteResponse};

fn cast(swarm: &mut Swarm, proposal_id: u64, voter_id: u64, choice: &str) {
    swarm
        .record_vote(VoteResponse {
            proposal_id,
            voter_id,
            choice: choice.to_string(),
            weight: 1.0,
            timestamp_ms: 0,
        })
        .unwrap();
}

#[test]
fn proposal_resolves_to_consensus_once_deadline_elapses() {
    let mut swarm = Swarm::new(Config::default(), 1).unwrap();
    for _ in 0..7 {
        swarm.spawn(Vec2::ZERO);
    }

    let id = swarm
        .submit_proposal(
            1,
            "which way".into(),
            vec!["LEFT".into(), "RIGHT".into()],
            String::new(),
            1_000,
            3,
            false,
            ProposalKind::Navigation,
        )
        .unwrap();

    for (voter, choice) in [(1, "LEFT"), (2, "LEFT"), (3, "LEFT"), (4, "LEFT"), (5, "LEFT"), (6, "RIGHT"), (7, "RIGHT")] {
        cast(&mut swarm, id, voter, choice);
    }

    // Before the deadline, the vote hasn't been evaluated yet.
    swarm.tick(0.5);
    assert_eq!(swarm.proposal(id).unwrap().state, swarmcore::voting::ProposalState::Active);

    // Push past the 1000ms deadline.
    swarm.tick(0.6);
    assert_eq!(swarm.proposal(id).unwrap().state, swarmcore::voting::ProposalState::Completed);
}

#[test]
fn votes_after_deadline_are_not_silently_accepted_into_a_stale_round() {
    let mut swarm = Swarm::new(Config::default(), 1).unwrap();
    for _ in 0..3 {
        swarm.spawn(Vec2::ZERO);
    }
    let id = swarm
        .submit_proposal(
            1,
            "abort?".into(),
            vec!["YES".into(), "NO".into()],
            String::new(),
            500,
            1,
            false,
            ProposalKind::Emergency,
        )
        .unwrap();
    cast(&mut swarm, id, 1, "YES");
    swarm.tick(0.6); // crosses the 500ms deadline, evaluates and completes
    assert_eq!(swarm.proposal(id).unwrap().state, swarmcore::voting::ProposalState::Completed);

    // A vote submitted after the proposal has already resolved is rejected.
    let late_vote = VoteResponse {
        proposal_id: id,
        voter_id: 2,
        choice: "NO".to_string(),
        weight: 1.0,
        timestamp_ms: 0,
    };
    assert!(swarm.record_vote(late_vote).is_err());
}

#[test]
fn submitting_the_same_question_twice_yields_independent_proposals() {
    let mut swarm = Swarm::new(Config::default(), 1).unwrap();
    swarm.spawn(Vec2::ZERO);

    let first = swarm
        .submit_proposal(1, "go?".into(), vec!["YES".into(), "NO".into()], String::new(), 5_000, 1, false, ProposalKind::Mission)
        .unwrap();
    let second = swarm
        .submit_proposal(1, "go?".into(), vec!["YES".into(), "NO".into()], String::new(), 5_000, 1, false, ProposalKind::Mission)
        .unwrap();

    assert_ne!(first, second);
    cast(&mut swarm, first, 1, "YES");

    swarm.tick(5.1); // crosses both deadlines
    // The first resolved on its own single YES vote; the second, with no
    // votes at all, did not inherit it.
    assert_eq!(swarm.proposal(first).unwrap().state, swarmcore::voting::ProposalState::Completed);
    assert_eq!(swarm.proposal(second).unwrap().state, swarmcore::voting::ProposalState::Expired);
}
