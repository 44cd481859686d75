//! Neighbor-info producer and neighbor liveness tracking.
//!
//! `NeighborInfo` is the lightweight, ownership-free view every producer
//! consumes; it is reconstructed fresh from the spatial index each tick.
//! The optional link filter uses a staged `HealthState` rather than a bare
//! healthy/unhealthy bool: a neighbor degrades `Alive -> Suspect -> Dead`
//! before being dropped, modeling a lossy channel one tick ahead of outright
//! loss.

use crate::agent::{Agent, AgentId, AgentStore};
use crate::geometry::Vec2;
use crate::spatial::SpatialGrid;
use rand::Rng;

/// A reconstructed, read-only view of one neighbor. No ownership — it is a
/// snapshot derived from the spatial index for a single producer call and is
/// never stored across ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborInfo {
    pub agent_id: AgentId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub distance: f64,
}

/// Neighbor health, staged `Unknown|Alive|Suspect|Dead` one tick ahead of
/// outright loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthState {
    #[default]
    Unknown,
    Alive,
    Suspect,
    Dead,
}

impl HealthState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Alive | HealthState::Suspect)
    }
}

/// Returns every neighbor of `self_id` within `radius`, excluding self,
/// sorted by ascending distance for deterministic consumption downstream.
pub fn neighbors_within(
    grid: &SpatialGrid,
    store: &AgentStore,
    self_id: AgentId,
    self_position: Vec2,
    radius: f64,
) -> Vec<NeighborInfo> {
    let mut out: Vec<NeighborInfo> = grid
        .radius(self_position, radius)
        .into_iter()
        .filter(|(id, _)| *id != self_id)
        .filter_map(|(id, pos)| {
            let agent: &Agent = store.get(id)?;
            Some(NeighborInfo {
                agent_id: id,
                position: pos,
                velocity: agent.velocity,
                distance: pos.distance_squared(&self_position).sqrt(),
            })
        })
        .collect();
    out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
    out
}

/// Drops entries from `neighbors` with probability `drop_rate`, modeling a
/// lossy link for network-quality simulation. Pure given a seeded `rng` —
/// randomness is always threaded in explicitly, never drawn from a global
/// source, so outcomes stay reproducible.
pub fn apply_link_filter(
    neighbors: Vec<NeighborInfo>,
    drop_rate: f64,
    rng: &mut impl Rng,
) -> Vec<NeighborInfo> {
    if drop_rate <= 0.0 {
        return neighbors;
    }
    neighbors
        .into_iter()
        .filter(|_| rng.gen::<f64>() >= drop_rate)
        .collect()
}
