//! Proposal lifecycle, vote collection, and quorum/threshold evaluation.
//!
//! A ballot/round state machine: a proposal plays the role of a ballot,
//! `VoteResponse` the role of a cast vote, and `evaluate` the role of the
//! round-close routine — generalized from a fixed majority rule to a
//! configurable threshold, unanimous mode, tie-break, and timeout fallback.

use crate::config::VotingConfig;
use crate::error::{Error, Result};
use std::collections::HashMap;

pub type ProposalId = u64;
pub type AgentId = crate::agent::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProposalKind {
    Navigation,
    Formation,
    Mission,
    Emergency,
    Coordination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProposalState {
    Active,
    Completed,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeoutFallback {
    LeaderDecides,
    Abort,
    RetryOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TiebreakMode {
    LeaderDecides,
    LowestId,
    Random,
    FirstOption,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer_id: AgentId,
    pub question: String,
    pub options: Vec<String>,
    pub context: String,
    pub deadline_ms: u64,
    pub minimum_votes: u32,
    pub requires_unanimous: bool,
    pub kind: ProposalKind,
    pub state: ProposalState,
    pub round: u32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoteResponse {
    pub proposal_id: ProposalId,
    pub voter_id: AgentId,
    pub choice: String,
    pub weight: f64,
    pub timestamp_ms: u64,
}

type VoteRecord = VoteResponse;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoteResult {
    pub proposal_id: ProposalId,
    pub consensus_reached: bool,
    pub winning_option: Option<String>,
    pub is_tie: bool,
    pub reason: String,
}

struct ActiveProposal {
    proposal: Proposal,
    votes: Vec<VoteRecord>,
}

/// Owns every proposal and its votes. Proposal evaluation, timeout handling,
/// and tie-break all live here; the scheduler only calls `submit`,
/// `record_vote`, and `advance` once per tick.
#[derive(Default)]
pub struct VotingEngine {
    proposals: HashMap<ProposalId, ActiveProposal>,
    next_id: ProposalId,
}

impl VotingEngine {
    pub fn new() -> Self {
        Self {
            proposals: HashMap::new(),
            next_id: 1,
        }
    }

    /// Validates and stores a new proposal, returning its id. `now_ms` is the
    /// scheduler's current tick time, used to check `deadline > now`.
    pub fn submit(
        &mut self,
        proposer_id: AgentId,
        question: String,
        options: Vec<String>,
        context: String,
        deadline_ms: u64,
        minimum_votes: u32,
        requires_unanimous: bool,
        kind: ProposalKind,
        now_ms: u64,
    ) -> Result<ProposalId> {
        if options.len() < 2 {
            return Err(Error::InvalidProposal("proposal needs at least 2 options".into()));
        }
        if deadline_ms <= now_ms {
            return Err(Error::InvalidProposal("deadline must be after now".into()));
        }
        if minimum_votes < 1 {
            return Err(Error::InvalidProposal("minimumVotes must be >= 1".into()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.proposals.insert(
            id,
            ActiveProposal {
                proposal: Proposal {
                    id,
                    proposer_id,
                    question,
                    options,
                    context,
                    deadline_ms,
                    minimum_votes,
                    requires_unanimous,
                    kind,
                    state: ProposalState::Active,
                    round: 1,
                },
                votes: Vec::new(),
            },
        );
        tracing::info!(proposal = id, "proposal submitted");
        Ok(id)
    }

    pub fn get(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals.get(&id).map(|p| &p.proposal)
    }

    pub fn cancel(&mut self, id: ProposalId) -> Result<()> {
        let entry = self.proposals.get_mut(&id).ok_or(Error::InvalidProposal(format!("unknown proposal {id}")))?;
        entry.proposal.state = ProposalState::Cancelled;
        Ok(())
    }

    /// Accepts a vote iff the proposal is `Active`, `response.choice` is one
    /// of its options, and (when `allow_revoting` is false) this voter has
    /// not already voted. Duplicate votes under that policy are rejected,
    /// not overwritten.
    pub fn record_vote(&mut self, response: VoteResponse, allow_revoting: bool) -> Result<()> {
        let entry = self
            .proposals
            .get_mut(&response.proposal_id)
            .ok_or(Error::InvalidVote(format!("unknown proposal {}", response.proposal_id)))?;

        if entry.proposal.state != ProposalState::Active {
            return Err(Error::InvalidVote("proposal is not active".into()));
        }
        if !entry.proposal.options.contains(&response.choice) {
            return Err(Error::InvalidVote(format!(
                "choice {} is not among the proposal's options",
                response.choice
            )));
        }
        let already_voted = entry.votes.iter().any(|v| v.voter_id == response.voter_id);
        if already_voted && !allow_revoting {
            return Err(Error::InvalidVote("voter has already voted and revoting is disallowed".into()));
        }
        if already_voted {
            entry.votes.retain(|v| v.voter_id != response.voter_id);
        }
        entry.votes.push(response);
        Ok(())
    }

    /// Tallies votes and decides consensus per the configured threshold,
    /// unanimous mode, and tie-break. Transitions the proposal to `Completed`
    /// on consensus; does not change state on a non-conclusive evaluation
    /// (the caller, typically the timeout path, decides what happens next).
    pub fn evaluate(&mut self, id: ProposalId, cfg: &VotingConfig) -> Result<VoteResult> {
        let entry = self.proposals.get_mut(&id).ok_or(Error::InvalidProposal(format!("unknown proposal {id}")))?;
        let proposal = &entry.proposal;

        let total_votes = entry.votes.len() as u32;
        let mut totals: HashMap<&str, f64> = HashMap::new();
        for v in &entry.votes {
            let w = if cfg.weighted_voting { v.weight } else { 1.0 };
            *totals.entry(v.choice.as_str()).or_insert(0.0) += w;
        }
        let total_weight: f64 = totals.values().sum();

        if total_votes < proposal.minimum_votes {
            return Ok(VoteResult {
                proposal_id: id,
                consensus_reached: false,
                winning_option: None,
                is_tie: false,
                reason: "quorum not reached".into(),
            });
        }

        if proposal.requires_unanimous {
            let distinct: std::collections::HashSet<&str> = entry.votes.iter().map(|v| v.choice.as_str()).collect();
            if distinct.len() == 1 {
                let winner = entry.votes[0].choice.clone();
                entry.proposal.state = ProposalState::Completed;
                return Ok(VoteResult {
                    proposal_id: id,
                    consensus_reached: true,
                    winning_option: Some(winner),
                    is_tie: false,
                    reason: "unanimous".into(),
                });
            }
            return Ok(VoteResult {
                proposal_id: id,
                consensus_reached: false,
                winning_option: None,
                is_tie: false,
                reason: "not unanimous".into(),
            });
        }

        let mut ranked: Vec<(&str, f64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        let Some(&(leader, leader_weight)) = ranked.first() else {
            return Ok(VoteResult {
                proposal_id: id,
                consensus_reached: false,
                winning_option: None,
                is_tie: false,
                reason: "no votes cast".into(),
            });
        };
        let is_tie = ranked.iter().filter(|(_, w)| (*w - leader_weight).abs() < 1e-9).count() > 1;
        let threshold_met = leader_weight >= (total_weight * cfg.threshold).ceil();

        if is_tie {
            return Ok(VoteResult {
                proposal_id: id,
                consensus_reached: false,
                winning_option: None,
                is_tie: true,
                reason: "tie between leading options".into(),
            });
        }

        if threshold_met {
            entry.proposal.state = ProposalState::Completed;
            Ok(VoteResult {
                proposal_id: id,
                consensus_reached: true,
                winning_option: Some(leader.to_string()),
                is_tie: false,
                reason: "threshold met".into(),
            })
        } else {
            Ok(VoteResult {
                proposal_id: id,
                consensus_reached: false,
                winning_option: None,
                is_tie: false,
                reason: "threshold not met".into(),
            })
        }
    }

    /// Resolves a tie using `mode`. `leader_choice` is supplied by the caller
    /// when `mode = LeaderDecides` (the leader's own vote, if any).
    pub fn break_tie(
        &self,
        id: ProposalId,
        mode: TiebreakMode,
        leader_choice: Option<&str>,
        rng: &mut impl rand::Rng,
    ) -> Option<String> {
        let entry = self.proposals.get(&id)?;
        let mut totals: HashMap<&str, f64> = HashMap::new();
        for v in &entry.votes {
            *totals.entry(v.choice.as_str()).or_insert(0.0) += v.weight;
        }
        let max_weight = totals.values().cloned().fold(f64::MIN, f64::max);
        let mut tied: Vec<&str> = totals
            .into_iter()
            .filter(|(_, w)| (*w - max_weight).abs() < 1e-9)
            .map(|(k, _)| k)
            .collect();
        tied.sort();

        match mode {
            TiebreakMode::LeaderDecides => leader_choice.map(String::from).or_else(|| tied.first().map(|s| s.to_string())),
            TiebreakMode::LowestId => entry
                .votes
                .iter()
                .filter(|v| tied.contains(&v.choice.as_str()))
                .min_by_key(|v| v.voter_id)
                .map(|v| v.choice.clone()),
            TiebreakMode::Random => {
                let idx = rng.gen_range(0..tied.len().max(1));
                tied.get(idx).map(|s| s.to_string())
            }
            TiebreakMode::FirstOption => entry.proposal.options.iter().find(|o| tied.contains(&o.as_str())).cloned(),
        }
    }

    /// Called once per tick after vote intake. Expires any `Active`
    /// proposal past its deadline per `timeout_fallback`; for `RetryOnce`
    /// the proposal resets to a fresh round rather than terminating.
    pub fn advance(&mut self, now_ms: u64, cfg: &VotingConfig) -> Vec<VoteResult> {
        let expired_ids: Vec<ProposalId> = self
            .proposals
            .iter()
            .filter(|(_, p)| p.proposal.state == ProposalState::Active && now_ms >= p.proposal.deadline_ms)
            .map(|(id, _)| *id)
            .collect();

        let mut results = Vec::new();
        for id in expired_ids {
            let result = self.evaluate(id, cfg).expect("id known to exist");
            if result.consensus_reached {
                results.push(result);
                continue;
            }
            let entry = self.proposals.get_mut(&id).unwrap();
            match cfg.timeout_fallback {
                TimeoutFallback::Abort => {
                    entry.proposal.state = ProposalState::Expired;
                    results.push(result);
                }
                TimeoutFallback::LeaderDecides => {
                    entry.proposal.state = ProposalState::Expired;
                    results.push(result);
                }
                TimeoutFallback::RetryOnce => {
                    if entry.proposal.round < cfg.max_rounds {
                        entry.proposal.round += 1;
                        entry.proposal.deadline_ms = now_ms + cfg.revote_delay_ms + cfg.timeout_ms;
                        entry.votes.clear();
                    } else {
                        entry.proposal.state = ProposalState::Expired;
                        results.push(result);
                    }
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn cast(id: ProposalId, voter_id: AgentId, choice: &str) -> VoteResponse {
        VoteResponse {
            proposal_id: id,
            voter_id,
            choice: choice.to_string(),
            weight: 1.0,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn clear_majority_reaches_consensus() {
        let cfg = VotingConfig { threshold: 0.6, minimum_quorum: 3, ..VotingConfig::default() };
        let mut engine = VotingEngine::new();
        let id = engine
            .submit(1, "which way".into(), vec!["LEFT".into(), "RIGHT".into()], String::new(), 10_000, 3, false, ProposalKind::Navigation, 0)
            .unwrap();
        for (voter, choice) in [(1, "LEFT"), (2, "LEFT"), (3, "LEFT"), (4, "LEFT"), (5, "LEFT"), (6, "RIGHT"), (7, "RIGHT")] {
            engine.record_vote(cast(id, voter, choice), false).unwrap();
        }
        let result = engine.evaluate(id, &cfg).unwrap();
        assert!(result.consensus_reached);
        assert_eq!(result.winning_option.as_deref(), Some("LEFT"));
    }

    #[test]
    fn near_miss_split_fails_threshold() {
        let cfg = VotingConfig { threshold: 0.6, minimum_quorum: 3, ..VotingConfig::default() };
        let mut engine = VotingEngine::new();
        let id = engine
            .submit(1, "q".into(), vec!["YES".into(), "NO".into()], String::new(), 10_000, 3, false, ProposalKind::Mission, 0)
            .unwrap();
        for (voter, choice) in [(1, "NO"), (2, "NO"), (3, "NO"), (4, "NO"), (5, "YES"), (6, "YES"), (7, "YES")] {
            engine.record_vote(cast(id, voter, choice), false).unwrap();
        }
        let result = engine.evaluate(id, &cfg).unwrap();
        assert!(!result.consensus_reached);
    }

    #[test]
    fn unanimous_emergency_reaches_consensus() {
        let cfg = VotingConfig::emergency();
        let mut engine = VotingEngine::new();
        let id = engine
            .submit(1, "abort?".into(), vec!["RETURN_ALL".into(), "CONTINUE".into()], String::new(), 10_000, 3, true, ProposalKind::Emergency, 0)
            .unwrap();
        for voter in 1..=7u64 {
            engine.record_vote(cast(id, voter, "RETURN_ALL"), false).unwrap();
        }
        let result = engine.evaluate(id, &cfg).unwrap();
        assert!(result.consensus_reached);
        assert_eq!(result.winning_option.as_deref(), Some("RETURN_ALL"));
    }

    #[test]
    fn tie_is_detected() {
        let cfg = VotingConfig { threshold: 0.6, minimum_quorum: 3, ..VotingConfig::default() };
        let mut engine = VotingEngine::new();
        let id = engine
            .submit(1, "dir".into(), vec!["NORTH".into(), "SOUTH".into()], String::new(), 10_000, 3, false, ProposalKind::Navigation, 0)
            .unwrap();
        for voter in 1..=3u64 {
            engine.record_vote(cast(id, voter, "NORTH"), false).unwrap();
        }
        for voter in 4..=6u64 {
            engine.record_vote(cast(id, voter, "SOUTH"), false).unwrap();
        }
        let result = engine.evaluate(id, &cfg).unwrap();
        assert!(result.is_tie);
        let mut rng = StdRng::seed_from_u64(7);
        let winner = engine.break_tie(id, TiebreakMode::LowestId, None, &mut rng);
        assert_eq!(winner.as_deref(), Some("NORTH"));
    }

    #[test]
    fn duplicate_vote_rejected_without_revoting() {
        let mut engine = VotingEngine::new();
        let id = engine
            .submit(1, "q".into(), vec!["A".into(), "B".into()], String::new(), 10_000, 1, false, ProposalKind::Coordination, 0)
            .unwrap();
        engine.record_vote(cast(id, 1, "A"), false).unwrap();
        let err = engine.record_vote(cast(id, 1, "B"), false);
        assert!(err.is_err());
    }

    #[test]
    fn empty_options_rejected() {
        let mut engine = VotingEngine::new();
        let err = engine.submit(1, "q".into(), vec!["A".into()], String::new(), 10_000, 1, false, ProposalKind::Navigation, 0);
        assert!(matches!(err, Err(Error::InvalidProposal(_))));
    }

    #[test]
    fn cancelled_proposal_rejects_votes() {
        let mut engine = VotingEngine::new();
        let id = engine
            .submit(1, "q".into(), vec!["A".into(), "B".into()], String::new(), 10_000, 1, false, ProposalKind::Navigation, 0)
            .unwrap();
        engine.cancel(id).unwrap();
        let err = engine.record_vote(cast(id, 1, "A"), false);
        assert!(err.is_err());
    }
}
