//! Obstacle registry and the three avoidance strategies.
//!
//! The Individual strategy is a potential-field repulsion around a point
//! obstacle with a radius rather than a cost field. The Collective and
//! Pathfinding strategies both insert perpendicular waypoints around an
//! obstruction instead.

use crate::geometry::Vec2;
use std::collections::HashMap;

pub type ObstacleId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObstacleKind {
    Static,
    Moving,
    NoFlyZone,
    Expanding,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Obstacle {
    pub id: ObstacleId,
    pub position: Vec2,
    pub radius: f64,
    pub kind: ObstacleKind,
}

/// Owns every registered obstacle.
#[derive(Debug, Default)]
pub struct ObstacleRegistry {
    obstacles: HashMap<ObstacleId, Obstacle>,
    next_id: ObstacleId,
}

impl ObstacleRegistry {
    pub fn new() -> Self {
        Self {
            obstacles: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn register(&mut self, position: Vec2, radius: f64, kind: ObstacleKind) -> ObstacleId {
        let id = self.next_id;
        self.next_id += 1;
        self.obstacles.insert(
            id,
            Obstacle {
                id,
                position,
                radius,
                kind,
            },
        );
        id
    }

    pub fn unregister(&mut self, id: ObstacleId) -> bool {
        self.obstacles.remove(&id).is_some()
    }

    pub fn get(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.obstacles.get(&id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.values()
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}

/// Which strategy handles a given encounter, chosen per the size/density
/// heuristic below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvoidanceStrategy {
    Individual,
    Collective,
    Pathfinding,
}

/// `small obstacle & small swarm -> Individual`; `large obstacle near swarm
/// -> Collective`; `many obstacles -> Pathfinding`; else `Individual`.
pub fn select_strategy(obstacle_radius: f64, swarm_size: usize, obstacle_count: usize) -> AvoidanceStrategy {
    if obstacle_count > 3 {
        AvoidanceStrategy::Pathfinding
    } else if obstacle_radius < 30.0 && swarm_size <= 5 {
        AvoidanceStrategy::Individual
    } else if obstacle_radius >= 30.0 {
        AvoidanceStrategy::Collective
    } else {
        AvoidanceStrategy::Individual
    }
}

/// Per-agent repulsion force from every obstacle within `detection_range`.
pub fn individual_repulsion(
    position: Vec2,
    obstacles: &[Obstacle],
    detection_range: f64,
    critical_distance: f64,
    max_force: f64,
) -> Vec2 {
    let mut force = Vec2::ZERO;
    for obs in obstacles {
        let delta = position - obs.position;
        let d = delta.magnitude() - obs.radius;
        if d < detection_range && d > 0.0 {
            let strength = if d < critical_distance {
                max_force
            } else {
                max_force * (detection_range - d) / detection_range
            };
            force = force + delta.normalize().scale(strength);
        }
    }
    force.clip(max_force)
}

/// One waypoint, offset perpendicular to `swarm_direction` on whichever side
/// `cross(to_obstacle, swarm_direction)` indicates, clearing the obstacle by
/// `radius + buffer + 30`.
pub fn collective_waypoint(swarm_center: Vec2, swarm_direction: Vec2, obstacle: &Obstacle, buffer: f64) -> Vec2 {
    let to_obstacle = obstacle.position - swarm_center;
    let side = if to_obstacle.cross(&swarm_direction) >= 0.0 {
        1.0
    } else {
        -1.0
    };
    let clearance = obstacle.radius + buffer + 30.0;
    obstacle.position + swarm_direction.normalize().perp().scale(side * clearance)
}

/// `MoveToTarget` for a follower preserving its offset from the swarm center
/// while the swarm routes around `waypoint`.
pub fn collective_target(waypoint: Vec2, agent_offset_from_center: Vec2) -> Vec2 {
    waypoint + agent_offset_from_center
}

/// Closest point on segment `a..b` to `p`.
fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len2 = ab.magnitude_squared();
    if len2 < 1e-9 {
        return a;
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    a + ab.scale(t)
}

/// True if segment `a..b` passes within `obstacle.radius + buffer` of the
/// obstacle's center.
fn segment_blocked(a: Vec2, b: Vec2, obstacle: &Obstacle, buffer: f64) -> bool {
    let closest = closest_point_on_segment(a, b, obstacle.position);
    (closest - obstacle.position).magnitude() < obstacle.radius + buffer
}

/// Builds `start -> waypoints -> goal`, inserting one perpendicular waypoint
/// per blocking obstacle on whichever side is closer to `goal`.
pub fn plan_path(start: Vec2, goal: Vec2, obstacles: &[Obstacle], buffer: f64) -> Vec<Vec2> {
    let mut path = vec![start, goal];
    // Fixed-point insertion: re-scan from the start each pass until no
    // segment is blocked, bounded by one insertion per obstacle.
    for _ in 0..obstacles.len() {
        let mut inserted = false;
        let mut i = 0;
        while i + 1 < path.len() {
            let a = path[i];
            let b = path[i + 1];
            if let Some(obstacle) = obstacles.iter().find(|&o| segment_blocked(a, b, o, buffer)) {
                let direction = (b - a).normalize();
                let perp = direction.perp();
                let clearance = obstacle.radius + buffer;
                let side_a = obstacle.position + perp.scale(clearance);
                let side_b = obstacle.position - perp.scale(clearance);
                let waypoint = if (side_a - goal).magnitude() <= (side_b - goal).magnitude() {
                    side_a
                } else {
                    side_b
                };
                path.insert(i + 1, waypoint);
                inserted = true;
                break;
            }
            i += 1;
        }
        if !inserted {
            break;
        }
    }
    path
}
