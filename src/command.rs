//! Behavior kinds, movement commands, and behavior requests.
//!
//! Dispatches on enums-with-methods rather than a class hierarchy, and
//! keeps a tagged-variant sum type per family plus a single small pure
//! function per concern (`priority_of`, `compatible`) instead of spreading
//! the rule across match arms in multiple places.

use crate::agent::{AgentId, BehaviorTag};
use crate::geometry::Vec2;

/// Which producer asserted a request this tick. Distinct from
/// [`BehaviorTag`] only in that a tag is the arbiter's *output* (what the
/// agent is doing) while a kind is a producer's *input* (what it's asking
/// for) — they share the same variant set by design.
pub type BehaviorKind = BehaviorTag;

/// Fixed priority ordering. Higher wins on pure override.
pub fn priority_of(kind: BehaviorKind) -> u32 {
    match kind {
        BehaviorKind::Evading => 100,
        BehaviorKind::Returning => 90,
        BehaviorKind::Failed => 85,
        BehaviorKind::TaskExecution => 70,
        BehaviorKind::Formation => 60,
        BehaviorKind::Leader => 55,
        BehaviorKind::Scout => 50,
        BehaviorKind::Guard => 50,
        BehaviorKind::Follower => 40,
        BehaviorKind::Flocking => 30,
        BehaviorKind::Idle => 10,
    }
}

/// Symmetric compatibility table for weighted blending.
pub fn compatible(a: BehaviorKind, b: BehaviorKind) -> bool {
    use BehaviorKind::*;
    if a == b {
        return true;
    }
    let pair = |x: BehaviorKind, y: BehaviorKind| {
        matches!(
            (x, y),
            (Flocking, Formation)
                | (Flocking, Leader)
                | (Flocking, Follower)
                | (Flocking, Scout)
                | (Flocking, Guard)
                | (Formation, Leader)
                | (Formation, Follower)
                | (Formation, Guard)
                | (Leader, Flocking)
                | (Returning, Evading)
        )
    };
    pair(a, b) || pair(b, a)
}

/// Kinds that never blend with anything, even each other.
pub fn never_blends(kind: BehaviorKind) -> bool {
    matches!(
        kind,
        BehaviorKind::TaskExecution | BehaviorKind::Evading | BehaviorKind::Failed | BehaviorKind::Idle
    )
}

/// The type-specific payload of a [`MovementCommand`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandParams {
    FlockingBehavior { combined_force: Vec2 },
    FormationPosition { correction_force: Vec2, target: Vec2 },
    MoveToTarget { target: Vec2 },
    AvoidObstacle { correction_force: Vec2 },
    StopAndHold,
}

/// One command per active agent per tick, immutable once produced
///.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementCommand {
    pub agent_id: AgentId,
    pub params: CommandParams,
}

impl MovementCommand {
    pub fn new(agent_id: AgentId, params: CommandParams) -> Self {
        Self { agent_id, params }
    }

    /// The net force/target this command implies, used by the physics
    /// integrator to derive an acceleration. Target-only commands return a
    /// zero force; the integrator treats them as a target-seek instead.
    pub fn force(&self) -> Vec2 {
        match self.params {
            CommandParams::FlockingBehavior { combined_force } => combined_force,
            CommandParams::FormationPosition { correction_force, .. } => correction_force,
            CommandParams::AvoidObstacle { correction_force } => correction_force,
            CommandParams::MoveToTarget { .. } | CommandParams::StopAndHold => Vec2::ZERO,
        }
    }

    pub fn target(&self) -> Option<Vec2> {
        match self.params {
            CommandParams::MoveToTarget { target } => Some(target),
            CommandParams::FormationPosition { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Submitted to the arbiter by a producer; consumed and cleared at the end
/// of the tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorRequest {
    pub agent_id: AgentId,
    pub behavior_kind: BehaviorKind,
    pub command: MovementCommand,
    pub timestamp: u64,
}

impl BehaviorRequest {
    pub fn new(
        agent_id: AgentId,
        behavior_kind: BehaviorKind,
        command: MovementCommand,
        timestamp: u64,
    ) -> Self {
        Self {
            agent_id,
            behavior_kind,
            command,
            timestamp,
        }
    }

    pub fn priority(&self) -> u32 {
        priority_of(self.behavior_kind)
    }
}
