//! Agent state store.
//!
//! The store is the single owner of every agent record; every other
//! component (spatial index, producers, arbiter) holds a stable
//! [`AgentId`] and looks the live record up through [`AgentStore`] rather
//! than owning a copy.

use crate::error::{Error, Result};
use crate::geometry::Vec2;
use std::collections::HashMap;

/// Stable integer id for an agent. Ids are never reused within a store's
/// lifetime.
pub type AgentId = u64;

/// Agent lifecycle/operational status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AgentStatus {
    #[default]
    Active,
    Voting,
    DecisionMade,
    Returning,
    Failed,
    Idle,
}

/// A tag recording which behavior currently has control of an agent, set by
/// the arbiter at the end of a tick. Invariant: at most one per agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BehaviorTag {
    Evading,
    Returning,
    Failed,
    TaskExecution,
    Formation,
    Leader,
    Scout,
    Guard,
    Follower,
    Flocking,
    Idle,
}

/// A single agent's state. Mutated only by [`AgentStore::apply_step`] and the
/// handful of store setters the scheduler calls between producer and
/// integrator phases — producers only ever read an agent snapshot.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Agent {
    pub id: AgentId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub status: AgentStatus,
    pub behavior: Option<BehaviorTag>,
    /// Battery level in `[0, 1]`.
    pub battery: f64,
    pub max_speed: f64,
    pub communication_range: f64,
    pub formation_slot: Option<u64>,
    pub task_id: Option<String>,
    /// Bound capability/role, compared against a task's `required_role`.
    pub role: Option<String>,
}

impl Agent {
    fn new(id: AgentId, position: Vec2) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            status: AgentStatus::Active,
            behavior: None,
            battery: 1.0,
            max_speed: 60.0,
            communication_range: 150.0,
            formation_slot: None,
            task_id: None,
            role: None,
        }
    }
}

/// Owns every agent record. The only mutable shared resource in the tick
/// loop: the spatial index is rebuilt from it each tick but never mutates
/// it, and producers only ever read through [`AgentStore::get`] /
/// [`AgentStore::all_active`].
#[derive(Debug, Default)]
pub struct AgentStore {
    agents: HashMap<AgentId, Agent>,
    next_id: AgentId,
}

impl AgentStore {
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            next_id: 1,
        }
    }

    /// Create a new agent at `position`, returning its stable id.
    pub fn spawn(&mut self, position: Vec2) -> AgentId {
        let id = self.next_id;
        self.next_id += 1;
        self.agents.insert(id, Agent::new(id, position));
        tracing::debug!(agent = id, "spawned");
        id
    }

    pub fn remove(&mut self, id: AgentId) -> Result<()> {
        self.agents
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::UnknownAgent(id))
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// All agents whose status is `Active`, in ascending id order — the
    /// ordering the task allocator and arbiter rely on for deterministic
    /// outcomes.
    pub fn all_active(&self) -> Vec<&Agent> {
        let mut out: Vec<&Agent> = self
            .agents
            .values()
            .filter(|a| a.status == AgentStatus::Active)
            .collect();
        out.sort_by_key(|a| a.id);
        out
    }

    /// Every agent regardless of status, in ascending id order.
    pub fn all(&self) -> Vec<&Agent> {
        let mut out: Vec<&Agent> = self.agents.values().collect();
        out.sort_by_key(|a| a.id);
        out
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Integrator write-back: called once per tick, per agent, from the
    /// scheduler only. `new_vel` must already be speed-clipped by the
    /// caller.
    pub fn apply_step(&mut self, id: AgentId, new_pos: Vec2, new_vel: Vec2) -> Result<()> {
        let agent = self.agents.get_mut(&id).ok_or(Error::UnknownAgent(id))?;
        agent.position = new_pos;
        agent.velocity = new_vel;
        Ok(())
    }

    pub fn set_status(&mut self, id: AgentId, status: AgentStatus) -> Result<()> {
        let agent = self.agents.get_mut(&id).ok_or(Error::UnknownAgent(id))?;
        agent.status = status;
        Ok(())
    }

    pub fn set_behavior(&mut self, id: AgentId, behavior: Option<BehaviorTag>) -> Result<()> {
        let agent = self.agents.get_mut(&id).ok_or(Error::UnknownAgent(id))?;
        agent.behavior = behavior;
        Ok(())
    }

    pub fn set_battery(&mut self, id: AgentId, battery: f64) -> Result<()> {
        let agent = self.agents.get_mut(&id).ok_or(Error::UnknownAgent(id))?;
        agent.battery = battery.clamp(0.0, 1.0);
        Ok(())
    }
}
