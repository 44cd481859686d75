//! Cross-module invariants that only hold once the full `Swarm` tick loop is
//! wired together, as opposed to the per-function unit tests living next to
//! each producer.

use swarmcore::agent::AgentStatus;
use swarmcore::config::Config;
use swarmcore::geometry::Vec2;
use swarmcore::scheduler::Swarm;
use swarmcore::task::{AssignmentStatus, Task, TaskPriority};

/// Invariant 1: velocity never exceeds `maxSpeed` after the integrator step,
/// regardless of how many ticks of flocking/formation forces accumulate.
#[test]
fn velocity_never_exceeds_max_speed_after_many_ticks() {
    let mut swarm = Swarm::new(Config::default(), 7).unwrap();
    let ids: Vec<_> = (0..12)
        .map(|i| swarm.spawn(Vec2::new((i as f64) * 15.0, (i % 3) as f64 * 20.0)))
        .collect();

    for _ in 0..300 {
        swarm.tick(1.0 / 60.0);
    }

    let max_speed = swarm.config.flocking.max_speed;
    for id in ids {
        let agent = swarm.agent(id).unwrap();
        assert!(
            agent.velocity.magnitude() <= max_speed + 1e-6,
            "agent {id} exceeded max speed: {}",
            agent.velocity.magnitude()
        );
    }
}

/// Invariant 5: once an assignment is terminal, it no longer counts toward
/// the owning agent's workload.
#[test]
fn completed_assignment_clears_from_workload() {
    let mut swarm = Swarm::new(Config::default(), 1).unwrap();
    let a = swarm.spawn(Vec2::ZERO);

    let task = Task {
        id: "scout-1".into(),
        kind: "scout".into(),
        priority: TaskPriority::Normal,
        target_location: Some(Vec2::new(10.0, 0.0)),
        estimated_duration_ms: 1_000,
        minimum_battery: 0.1,
        required_role: None,
        deadline_ms: None,
    };
    let assignment = swarm.submit_task(task).unwrap().unwrap();
    assert_eq!(assignment.agent_id, a);

    swarm.report_task_outcome("scout-1", a, AssignmentStatus::Completed).unwrap();

    // A fresh task assigned after completion should not see any residual
    // load from the finished one.
    let task2 = Task {
        id: "scout-2".into(),
        kind: "scout".into(),
        priority: TaskPriority::Normal,
        target_location: Some(Vec2::new(10.0, 0.0)),
        estimated_duration_ms: 1_000,
        minimum_battery: 0.1,
        required_role: None,
        deadline_ms: None,
    };
    let assignment2 = swarm.submit_task(task2).unwrap().unwrap();
    assert_eq!(assignment2.agent_id, a);
}

/// A failed agent is excluded from `all_active` and therefore from every
/// producer; its tasks get reassigned rather than silently dropped.
#[test]
fn failed_agent_is_excluded_from_active_set_and_tasks_reassign() {
    let mut swarm = Swarm::new(Config::default(), 3).unwrap();
    let a = swarm.spawn(Vec2::ZERO);
    let b = swarm.spawn(Vec2::new(5.0, 0.0));

    let task = Task {
        id: "patrol".into(),
        kind: "patrol".into(),
        priority: TaskPriority::Normal,
        target_location: None,
        estimated_duration_ms: 500,
        minimum_battery: 0.1,
        required_role: None,
        deadline_ms: None,
    };
    let assignment = swarm.submit_task(task).unwrap().unwrap();
    let owner = assignment.agent_id;
    assert!(owner == a || owner == b);

    swarm.agent_failed(owner).unwrap();
    assert_eq!(swarm.agent(owner).unwrap().status, AgentStatus::Failed);

    swarm.tick(1.0 / 60.0);
    // The failed agent never appears in a producer's input set again.
    assert!(swarm.agent(owner).unwrap().status != AgentStatus::Active);
}
