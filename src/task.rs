//! Task definitions, eligibility/scoring, assignment, and reassignment.
//!
//! Eligibility is a capability/deadline check generalized into a weighted
//! distance/load/battery/role/urgency score, backed by a per-agent
//! workload map for the reassignment and balance accounting.

use crate::agent::{Agent, AgentId, AgentStatus};
use crate::config::TaskConfig;
use crate::error::{Error, Result};
use crate::geometry::{self, Vec2};
use std::collections::HashMap;

pub type TaskId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Task {
    pub id: TaskId,
    pub kind: String,
    pub priority: TaskPriority,
    pub target_location: Option<Vec2>,
    pub estimated_duration_ms: u64,
    pub minimum_battery: f64,
    pub required_role: Option<String>,
    /// Absolute tick time the task must be picked up by, if any. Tasks
    /// without one score no urgency bonus.
    pub deadline_ms: Option<u64>,
}

impl Task {
    pub fn valid(&self) -> bool {
        !self.id.is_empty() && !self.kind.is_empty() && (0.0..=1.0).contains(&self.minimum_battery)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Blocked,
}

impl AssignmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Failed | AssignmentStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AssignmentReason {
    Initial,
    Reassignment,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskAssignment {
    pub task: Task,
    pub agent_id: AgentId,
    pub status: AssignmentStatus,
    pub reason: AssignmentReason,
    pub score: f64,
    pub created_at_ms: u64,
    pub reassignment_count: u32,
}

fn is_eligible(agent: &Agent, task: &Task, cfg: &TaskConfig, active_load: u32) -> bool {
    agent.status == AgentStatus::Active
        && agent.battery >= task.minimum_battery.max(cfg.min_battery_floor)
        && active_load < cfg.max_tasks_per_agent
}

/// Remaining time before `task`'s deadline, in ms. `None` if the task
/// carries no deadline; `Some(0)` once the deadline has already passed.
fn compute_slack(task: &Task, now_ms: u64) -> Option<u64> {
    task.deadline_ms.map(|deadline| deadline.saturating_sub(now_ms))
}

/// Bounded roughly in `[0, 100]` (or `[0, 100 + cfg.urgency_scale]` for a
/// task under deadline pressure). Distance rewards proximity (or a flat `15`
/// when the task has no target); load rewards agents with spare capacity;
/// battery rewards healthier agents; role match adds a bonus or partial
/// credit; urgency ramps up linearly as a deadline's slack shrinks toward
/// zero, and is absent entirely for tasks with no deadline.
fn score(agent: &Agent, task: &Task, cfg: &TaskConfig, active_load: u32, now_ms: u64) -> f64 {
    let distance_score = match task.target_location {
        Some(target) => {
            let dist = geometry::distance(&agent.position, &target);
            30.0 * (cfg.max_distance_scale - dist).max(0.0) / cfg.max_distance_scale
        }
        None => 15.0,
    };
    let load_score = 25.0 * (cfg.max_tasks_per_agent - active_load) as f64 / cfg.max_tasks_per_agent as f64;
    let battery_score = 20.0 * agent.battery;
    let role_score = match (&task.required_role, &agent.role) {
        (Some(required), Some(bound)) if required == bound => 25.0,
        (Some(_), None) => 12.0,
        _ => 0.0,
    };
    let urgency_score = match compute_slack(task, now_ms) {
        Some(slack) => {
            let remaining = 1.0 - (slack as f64 / cfg.urgency_horizon_ms as f64);
            cfg.urgency_scale * remaining.clamp(0.0, 1.0)
        }
        None => 0.0,
    };
    distance_score + load_score + battery_score + role_score + urgency_score
}

/// Owns every assignment and the per-agent workload index derived from it.
#[derive(Default)]
pub struct TaskAllocator {
    assignments: HashMap<(TaskId, AgentId), TaskAssignment>,
    workload: HashMap<AgentId, Vec<TaskId>>,
    pending: Vec<Task>,
}

impl TaskAllocator {
    pub fn new() -> Self {
        Self {
            assignments: HashMap::new(),
            workload: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn active_load(&self, agent_id: AgentId) -> u32 {
        self.workload.get(&agent_id).map(|v| v.len() as u32).unwrap_or(0)
    }

    /// Target location of `agent_id`'s current non-terminal assignment, if
    /// any, used by producers that need a destination to steer toward
    /// (e.g. pathfinding obstacle avoidance).
    pub fn current_target(&self, agent_id: AgentId) -> Option<Vec2> {
        self.assignments
            .values()
            .find(|a| a.agent_id == agent_id && !a.status.is_terminal())
            .and_then(|a| a.task.target_location)
    }

    /// Picks the highest-scoring eligible agent from `agents` (already
    /// sorted ascending by id by the caller per the deterministic-ordering
    /// contract), breaking ties on lowest id.
    pub fn assign_task(
        &mut self,
        task: Task,
        agents: &[&Agent],
        cfg: &TaskConfig,
        now_ms: u64,
    ) -> Result<Option<TaskAssignment>> {
        let best = agents
            .iter()
            .filter(|a| is_eligible(a, &task, cfg, self.active_load(a.id)))
            .map(|a| (a, score(a, &task, cfg, self.active_load(a.id), now_ms)))
            .max_by(|(a, sa), (b, sb)| sa.partial_cmp(sb).unwrap().then_with(|| b.id.cmp(&a.id)));

        match best {
            Some((agent, s)) => {
                let assignment = TaskAssignment {
                    task: task.clone(),
                    agent_id: agent.id,
                    status: AssignmentStatus::Pending,
                    reason: AssignmentReason::Initial,
                    score: s,
                    created_at_ms: now_ms,
                    reassignment_count: 0,
                };
                self.workload.entry(agent.id).or_default().push(task.id.clone());
                self.assignments.insert((task.id.clone(), agent.id), assignment.clone());
                tracing::debug!(task = %task.id, agent = agent.id, score = s, "task assigned");
                Ok(Some(assignment))
            }
            None => {
                self.pending.push(task.clone());
                Err(Error::NoEligibleAgent(task.id))
            }
        }
    }

    /// Sorts `tasks` by priority (`High > Normal > Low`) before assigning
    /// each in turn.
    pub fn assign_many(&mut self, mut tasks: Vec<Task>, agents: &[&Agent], cfg: &TaskConfig, now_ms: u64) -> Vec<TaskAssignment> {
        tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
        tasks
            .into_iter()
            .filter_map(|t| self.assign_task(t, agents, cfg, now_ms).ok().flatten())
            .collect()
    }

    /// Moves an assignment to a terminal state and drops it from the
    /// agent's workload; an empty workload list removes the agent's key.
    pub fn report_outcome(&mut self, task_id: &str, agent_id: AgentId, status: AssignmentStatus) -> Result<()> {
        let key = (task_id.to_string(), agent_id);
        let assignment = self.assignments.get_mut(&key).ok_or_else(|| Error::UnknownAgent(agent_id))?;
        assignment.status = status;
        if status.is_terminal() {
            if let Some(list) = self.workload.get_mut(&agent_id) {
                list.retain(|id| id != task_id);
                if list.is_empty() {
                    self.workload.remove(&agent_id);
                }
            }
        }
        Ok(())
    }

    pub fn cancel_task(&mut self, task_id: &str, agent_id: AgentId) -> Result<()> {
        self.report_outcome(task_id, agent_id, AssignmentStatus::Cancelled)
    }

    /// Re-runs the allocator for every non-terminal assignment owned by a
    /// failed agent, incrementing `reassignment_count`. Tasks with no
    /// eligible agent remaining fall back to pending.
    pub fn agent_failed(&mut self, agent_id: AgentId, agents: &[&Agent], cfg: &TaskConfig, now_ms: u64) -> Vec<TaskAssignment> {
        let owned: Vec<TaskAssignment> = self
            .assignments
            .values()
            .filter(|a| a.agent_id == agent_id && !a.status.is_terminal())
            .cloned()
            .collect();

        let candidates: Vec<&Agent> = agents.iter().filter(|a| a.id != agent_id).copied().collect();
        let mut reassigned = Vec::new();
        for old in owned {
            let _ = self.report_outcome(&old.task.id, agent_id, AssignmentStatus::Failed);
            match self.assign_task(old.task.clone(), &candidates, cfg, now_ms) {
                Ok(Some(mut new_assignment)) => {
                    new_assignment.reason = AssignmentReason::Reassignment;
                    new_assignment.reassignment_count = old.reassignment_count + 1;
                    let key = (new_assignment.task.id.clone(), new_assignment.agent_id);
                    self.assignments.insert(key, new_assignment.clone());
                    reassigned.push(new_assignment);
                }
                _ => {
                    self.pending.push(old.task);
                }
            }
        }
        reassigned
    }

    /// `true` iff every agent's active load is at most twice the swarm
    /// average — surfaced via metrics, never enforced with preemption.
    pub fn workload_balanced(&self, agent_ids: &[AgentId]) -> bool {
        if agent_ids.is_empty() {
            return true;
        }
        let total: u32 = agent_ids.iter().map(|id| self.active_load(*id)).sum();
        let avg = total as f64 / agent_ids.len() as f64;
        agent_ids.iter().all(|id| self.active_load(*id) as f64 <= 2.0 * avg)
    }

    pub fn pending_tasks(&self) -> &[Task] {
        &self.pending
    }

    /// Mean assignment score across every non-terminal assignment, for the
    /// `task.assignment_score` metric. `None` if nothing is currently
    /// assigned.
    pub fn average_score(&self) -> Option<f64> {
        let active: Vec<f64> = self
            .assignments
            .values()
            .filter(|a| !a.status.is_terminal())
            .map(|a| a.score)
            .collect();
        if active.is_empty() {
            return None;
        }
        Some(active.iter().sum::<f64>() / active.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentStore;

    fn sample_task(id: &str, target: Vec2) -> Task {
        Task {
            id: id.to_string(),
            kind: "patrol".into(),
            priority: TaskPriority::Normal,
            target_location: Some(target),
            estimated_duration_ms: 1000,
            minimum_battery: 0.2,
            required_role: None,
            deadline_ms: None,
        }
    }

    #[test]
    fn tighter_deadline_scores_higher_urgency() {
        let mut store = AgentStore::new();
        let id = store.spawn(Vec2::ZERO);
        store.set_battery(id, 1.0).unwrap();
        let agents = store.all();
        let cfg = TaskConfig::default();
        let mut allocator = TaskAllocator::new();

        let urgent = Task { deadline_ms: Some(1_000), ..sample_task("urgent", Vec2::ZERO) };
        let assignment = allocator.assign_task(urgent, &agents, &cfg, 0).unwrap().unwrap();
        let relaxed_score = score(
            agents[0],
            &Task { deadline_ms: None, ..sample_task("relaxed", Vec2::ZERO) },
            &cfg,
            0,
            0,
        );
        assert!(assignment.score > relaxed_score);
    }

    #[test]
    fn deadline_already_passed_scores_full_urgency() {
        let mut store = AgentStore::new();
        let id = store.spawn(Vec2::ZERO);
        store.set_battery(id, 1.0).unwrap();
        let agents = store.all();
        let cfg = TaskConfig::default();
        let overdue = Task { deadline_ms: Some(0), ..sample_task("overdue", Vec2::ZERO) };
        let overdue_score = score(agents[0], &overdue, &cfg, 0, 5_000);
        let fresh = Task { deadline_ms: Some(5_000 + cfg.urgency_horizon_ms), ..sample_task("fresh", Vec2::ZERO) };
        let fresh_score = score(agents[0], &fresh, &cfg, 0, 5_000);
        assert!(overdue_score > fresh_score);
    }

    #[test]
    fn nearest_agent_wins_assignment() {
        let mut store = AgentStore::new();
        let positions = [
            Vec2::new(100.0, 100.0),
            Vec2::new(290.0, 295.0),
            Vec2::new(400.0, 400.0),
            Vec2::new(200.0, 200.0),
            Vec2::new(500.0, 100.0),
        ];
        let mut ids = Vec::new();
        for p in positions {
            let id = store.spawn(p);
            store.set_battery(id, 0.8).unwrap();
            ids.push(id);
        }
        let agents = store.all();
        let cfg = TaskConfig::default();
        let mut allocator = TaskAllocator::new();
        let task = sample_task("scout-1", Vec2::new(300.0, 300.0));
        let assignment = allocator.assign_task(task, &agents, &cfg, 0).unwrap().unwrap();
        assert_eq!(assignment.agent_id, ids[1]);
    }

    #[test]
    fn no_eligible_agent_queues_pending() {
        let mut store = AgentStore::new();
        let id = store.spawn(Vec2::ZERO);
        store.set_battery(id, 0.05).unwrap();
        let agents = store.all();
        let cfg = TaskConfig::default();
        let mut allocator = TaskAllocator::new();
        let task = sample_task("t1", Vec2::ZERO);
        let result = allocator.assign_task(task, &agents, &cfg, 0);
        assert!(matches!(result, Err(Error::NoEligibleAgent(_))));
        assert_eq!(allocator.pending_tasks().len(), 1);
    }

    #[test]
    fn terminal_assignment_leaves_workload() {
        let mut store = AgentStore::new();
        let id = store.spawn(Vec2::ZERO);
        store.set_battery(id, 1.0).unwrap();
        let agents = store.all();
        let cfg = TaskConfig::default();
        let mut allocator = TaskAllocator::new();
        let task = sample_task("t1", Vec2::ZERO);
        allocator.assign_task(task, &agents, &cfg, 0).unwrap();
        assert_eq!(allocator.active_load(id), 1);
        allocator.report_outcome("t1", id, AssignmentStatus::Completed).unwrap();
        assert_eq!(allocator.active_load(id), 0);
    }

    #[test]
    fn agent_failure_reassigns_to_remaining_agent() {
        let mut store = AgentStore::new();
        let a = store.spawn(Vec2::ZERO);
        let b = store.spawn(Vec2::new(10.0, 0.0));
        store.set_battery(a, 1.0).unwrap();
        store.set_battery(b, 1.0).unwrap();
        let cfg = TaskConfig::default();
        let mut allocator = TaskAllocator::new();
        {
            let agents = store.all();
            let agents_a_only: Vec<&Agent> = agents.iter().filter(|ag| ag.id == a).copied().collect();
            allocator.assign_task(sample_task("t1", Vec2::ZERO), &agents_a_only, &cfg, 0).unwrap();
        }
        let agents = store.all();
        let reassigned = allocator.agent_failed(a, &agents, &cfg, 100);
        assert_eq!(reassigned.len(), 1);
        assert_eq!(reassigned[0].agent_id, b);
        assert_eq!(reassigned[0].reassignment_count, 1);
    }

    #[test]
    fn high_priority_tasks_assigned_first() {
        let mut store = AgentStore::new();
        let id = store.spawn(Vec2::ZERO);
        store.set_battery(id, 1.0).unwrap();
        let agents = store.all();
        let cfg = TaskConfig { max_tasks_per_agent: 1, ..TaskConfig::default() };
        let mut allocator = TaskAllocator::new();
        let low = Task { priority: TaskPriority::Low, ..sample_task("low", Vec2::ZERO) };
        let high = Task { priority: TaskPriority::High, ..sample_task("high", Vec2::ZERO) };
        let assigned = allocator.assign_many(vec![low, high], &agents, &cfg, 0);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].task.id, "high");
    }
}
