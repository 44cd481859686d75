//! Leader selection, follower offsets, health checking, and succession.
//!
//! The staged health check (`Alive -> Suspect -> Dead`) follows the same
//! grace-period-then-declare-lost shape used elsewhere in this crate.
//! Selection-mode scoring is a single-shot weighted-blend scorer rather
//! than a term-based role machine, since there is no distributed term or
//! log to agree on here.

use crate::agent::{Agent, AgentId};
use crate::config::LeaderConfig;
use crate::error::{Error, Result};
use crate::geometry::{self, Vec2};
use crate::neighbor::HealthState;

/// How a leader is (re)selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectionMode {
    /// Explicitly set by the caller; never auto-reselected.
    Manual,
    /// Highest remaining battery.
    HighestBattery,
    /// Closest to the swarm's centroid.
    CentralPosition,
    /// Largest communication range, as a proxy for sensor/awareness reach.
    BestSensors,
    /// Lowest agent id, for fully deterministic selection with no other
    /// tie-break needed.
    LowestId,
    /// Fixed weighted blend of battery (0.4), centrality (0.3), and
    /// stability (0.3) — stability is how close an agent already is to
    /// rest, since a leader that isn't itself still maneuvering makes a
    /// steadier anchor for followers.
    Auto,
}

const AUTO_BATTERY_WEIGHT: f64 = 0.4;
const AUTO_CENTRALITY_WEIGHT: f64 = 0.3;
const AUTO_STABILITY_WEIGHT: f64 = 0.3;

fn centroid(agents: &[&Agent]) -> Vec2 {
    if agents.is_empty() {
        return Vec2::ZERO;
    }
    let sum = agents
        .iter()
        .fold(Vec2::ZERO, |acc, a| acc + a.position);
    sum.scale(1.0 / agents.len() as f64)
}

/// Selects a leader from `candidates` per `mode`. Ties break on lowest
/// [`AgentId`] for determinism. Returns `None` if `candidates` is empty.
pub fn select_leader(candidates: &[&Agent], mode: SelectionMode) -> Option<AgentId> {
    if candidates.is_empty() {
        return None;
    }
    let center = centroid(candidates);
    let max_dist = candidates
        .iter()
        .map(|a| geometry::distance(&a.position, &center))
        .fold(0.0_f64, f64::max)
        .max(1e-9);
    let max_range = candidates
        .iter()
        .map(|a| a.communication_range)
        .fold(0.0_f64, f64::max)
        .max(1e-9);
    let max_speed_seen = candidates
        .iter()
        .map(|a| a.velocity.magnitude())
        .fold(0.0_f64, f64::max)
        .max(1e-9);

    let centrality = |a: &Agent| -> f64 { 1.0 - geometry::distance(&a.position, &center) / max_dist };
    let stability = |a: &Agent| -> f64 { 1.0 - a.velocity.magnitude() / max_speed_seen };

    let score = |a: &&Agent| -> f64 {
        match mode {
            SelectionMode::Manual => 0.0,
            SelectionMode::HighestBattery => a.battery,
            SelectionMode::CentralPosition => centrality(a),
            SelectionMode::BestSensors => a.communication_range / max_range,
            SelectionMode::LowestId => -(a.id as f64),
            SelectionMode::Auto => {
                AUTO_BATTERY_WEIGHT * a.battery
                    + AUTO_CENTRALITY_WEIGHT * centrality(a)
                    + AUTO_STABILITY_WEIGHT * stability(a)
            }
        }
    };

    candidates
        .iter()
        .max_by(|a, b| {
            score(a)
                .partial_cmp(&score(b))
                .unwrap()
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|a| a.id)
}

/// Offset for a follower trailing a leader moving with `leader_velocity`,
/// smoothed toward its assigned slot position by `smooth_factor` per tick.
pub fn follower_target(
    leader_position: Vec2,
    slot_offset: Vec2,
    current_target: Vec2,
    smooth_factor: f64,
) -> Vec2 {
    let desired = leader_position + slot_offset;
    geometry::lerp(current_target, desired, smooth_factor.clamp(0.0, 1.0))
}

/// Staged liveness tracker for a single leader, ticked once per scheduler
/// pass. Mirrors [`HealthState`] staging: a missed heartbeat moves
/// `Alive -> Suspect`, a second miss moves `Suspect -> Dead`.
#[derive(Debug, Clone, Copy)]
pub struct LeaderHealth {
    state: HealthState,
    ms_since_heartbeat: u64,
    timeout_ms: u64,
}

impl LeaderHealth {
    pub fn new(cfg: &LeaderConfig) -> Self {
        Self {
            state: HealthState::Alive,
            ms_since_heartbeat: 0,
            timeout_ms: cfg.leader_timeout_ms,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn heartbeat(&mut self) {
        self.ms_since_heartbeat = 0;
        self.state = HealthState::Alive;
    }

    /// Advances the missed-heartbeat clock by `dt_ms`, staging the health
    /// state down one level each time a full `timeout_ms` window elapses
    /// without a heartbeat.
    pub fn tick(&mut self, dt_ms: u64) {
        self.ms_since_heartbeat += dt_ms;
        self.state = match self.state {
            HealthState::Alive if self.ms_since_heartbeat >= self.timeout_ms => {
                HealthState::Suspect
            }
            HealthState::Suspect if self.ms_since_heartbeat >= self.timeout_ms * 2 => {
                HealthState::Dead
            }
            other => other,
        };
    }

    pub fn is_lost(&self) -> bool {
        self.state == HealthState::Dead
    }
}

/// Runs succession when `current` is lost: picks a new leader from
/// `candidates` via `mode`, excluding the failed leader.
pub fn succeed(
    current: AgentId,
    candidates: &[&Agent],
    mode: SelectionMode,
) -> Result<AgentId> {
    let remaining: Vec<&Agent> = candidates.iter().filter(|a| a.id != current).copied().collect();
    select_leader(&remaining, mode).ok_or(Error::LeaderLost)
}
