//! Separation/alignment/cohesion flocking forces.
//!
//! Grounded on the "combine then clip" force-accumulation style found in
//! `other_examples/vicseksim-rs`'s flocking step, adapted to this crate's
//! strictly disjoint separation/alignment/cohesion radius bands rather than
//! Vicsek's single interaction radius. The three sub-forces are pure
//! functions of a neighbor slice; [`flocking_force`] is the only entry point
//! the scheduler calls.

use crate::config::FlockingConfig;
use crate::geometry::Vec2;
use crate::neighbor::NeighborInfo;

/// Repels from neighbors closer than `separation_radius`, weighted by
/// inverse distance so the closest neighbor dominates.
pub(crate) fn separation(position: Vec2, neighbors: &[NeighborInfo], radius: f64) -> Vec2 {
    let mut force = Vec2::ZERO;
    let mut count = 0u32;
    for n in neighbors {
        if n.distance < radius && n.distance > 1e-9 {
            // Unit vector away from the neighbor, scaled by 1/distance so the
            // push grows as the neighbor gets closer.
            let away = (position - n.position).scale(1.0 / (n.distance * n.distance));
            force = force + away;
            count += 1;
        }
    }
    if count > 0 {
        force.scale(1.0 / count as f64)
    } else {
        Vec2::ZERO
    }
}

/// Steers toward the average heading of neighbors in the band
/// `[inner, radius)`, i.e. beyond the separation band and within
/// `alignment_radius` — disjoint from `separation` so no neighbor feeds
/// both rules at once.
pub(crate) fn alignment(velocity: Vec2, neighbors: &[NeighborInfo], inner: f64, radius: f64) -> Vec2 {
    let mut sum = Vec2::ZERO;
    let mut count = 0u32;
    for n in neighbors {
        if n.distance >= inner && n.distance < radius {
            sum = sum + n.velocity;
            count += 1;
        }
    }
    if count == 0 {
        return Vec2::ZERO;
    }
    let average = sum.scale(1.0 / count as f64);
    average - velocity
}

/// Steers toward the centroid of neighbors in the band `[inner, radius)`,
/// i.e. beyond the alignment band and within `cohesion_radius` — disjoint
/// from `separation` and `alignment` so no neighbor feeds more than one
/// rule at once.
pub(crate) fn cohesion(position: Vec2, neighbors: &[NeighborInfo], inner: f64, radius: f64) -> Vec2 {
    let mut sum = Vec2::ZERO;
    let mut count = 0u32;
    for n in neighbors {
        if n.distance >= inner && n.distance < radius {
            sum = sum + n.position;
            count += 1;
        }
    }
    if count == 0 {
        return Vec2::ZERO;
    }
    let centroid = sum.scale(1.0 / count as f64);
    centroid - position
}

/// Combines the three weighted sub-forces and clips the result to
/// `max_force`. `neighbors` should already be filtered to `cohesion_radius`
/// (the widest band) so a single pass covers all three terms. The three
/// bands are disjoint: separation owns `[0, separation_radius)`, alignment
/// `[separation_radius, alignment_radius)`, cohesion
/// `[alignment_radius, cohesion_radius)` — no neighbor contributes to more
/// than one.
pub fn flocking_force(
    position: Vec2,
    velocity: Vec2,
    neighbors: &[NeighborInfo],
    cfg: &FlockingConfig,
) -> Vec2 {
    let sep = separation(position, neighbors, cfg.separation_radius).scale(cfg.separation_weight);
    let ali = alignment(velocity, neighbors, cfg.separation_radius, cfg.alignment_radius).scale(cfg.alignment_weight);
    let coh = cohesion(position, neighbors, cfg.alignment_radius, cfg.cohesion_radius).scale(cfg.cohesion_weight);
    (sep + ali + coh).clip(cfg.max_force)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbor(position: Vec2, velocity: Vec2, from: Vec2) -> NeighborInfo {
        NeighborInfo {
            agent_id: 0,
            position,
            velocity,
            distance: position.distance_squared(&from).sqrt(),
        }
    }

    #[test]
    fn lone_agent_feels_no_force() {
        let cfg = FlockingConfig::default();
        let force = flocking_force(Vec2::ZERO, Vec2::ZERO, &[], &cfg);
        assert_eq!(force, Vec2::ZERO);
    }

    #[test]
    fn close_neighbor_produces_separation_away_from_it() {
        let cfg = FlockingConfig::default();
        let position = Vec2::ZERO;
        let neighbors = vec![neighbor(Vec2::new(5.0, 0.0), Vec2::ZERO, position)];
        let force = flocking_force(position, Vec2::ZERO, &neighbors, &cfg);
        // Pushed in -x direction, away from the neighbor at +x.
        assert!(force.x < 0.0);
    }

    #[test]
    fn distant_neighbor_within_cohesion_pulls_toward_it() {
        let cfg = FlockingConfig::default();
        let position = Vec2::ZERO;
        let far = cfg.cohesion_radius - 1.0;
        let neighbors = vec![neighbor(Vec2::new(far, 0.0), Vec2::ZERO, position)];
        let force = flocking_force(position, Vec2::ZERO, &neighbors, &cfg);
        assert!(force.x > 0.0);
    }

    #[test]
    fn force_never_exceeds_max_force() {
        let cfg = FlockingConfig::emergency_evasion();
        let position = Vec2::ZERO;
        let neighbors: Vec<NeighborInfo> = (0..8)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::PI / 4.0;
                neighbor(Vec2::from_angle(angle).scale(2.0), Vec2::ZERO, position)
            })
            .collect();
        let force = flocking_force(position, Vec2::ZERO, &neighbors, &cfg);
        assert!(force.magnitude() <= cfg.max_force + 1e-9);
    }
}
