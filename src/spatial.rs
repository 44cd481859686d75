//! Uniform-grid spatial index for neighbor queries.
//!
//! Agents need *radius* and *rectangle* queries over a 2D plane, so the
//! broad-phase is a uniform grid rather than a k-nearest structure. The
//! grid is rebuilt every tick from scratch with no cross-tick state, and
//! each cell holds a bucket of agent ids.

use crate::agent::{Agent, AgentId};
use crate::geometry::Vec2;
use std::collections::HashMap;

type CellCoord = (i64, i64);

/// Rebuilt from scratch every tick from the agent store; never carries state
/// across ticks. Owns nothing but its own cell → bucket map; it never holds
/// a reference back into the store, only copies of id/position needed to
/// answer a query.
#[derive(Debug, Default)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<CellCoord, Vec<(AgentId, Vec2)>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Self {
        assert!(cell_size > 0.0, "cell_size must be > 0");
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    fn cell_of(&self, p: &Vec2) -> CellCoord {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
        )
    }

    /// Drop all buckets. Called at the start of [`SpatialGrid::rebuild`].
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn insert(&mut self, id: AgentId, position: Vec2) {
        let cell = self.cell_of(&position);
        self.cells.entry(cell).or_default().push((id, position));
    }

    /// `clear()` then `insert()` every agent — the per-tick rebuild.
    pub fn rebuild<'a>(&mut self, agents: impl IntoIterator<Item = &'a Agent>) {
        self.clear();
        for agent in agents {
            self.insert(agent.id, agent.position);
        }
    }

    /// All agents within radius `r` of `point`, including agents exactly at
    /// distance `r`. Callers filter out `self` by id if needed.
    pub fn radius(&self, point: Vec2, r: f64) -> Vec<(AgentId, Vec2)> {
        let min_cell = self.cell_of(&Vec2::new(point.x - r, point.y - r));
        let max_cell = self.cell_of(&Vec2::new(point.x + r, point.y + r));
        let r2 = r * r;

        let mut out = Vec::new();
        for cx in min_cell.0..=max_cell.0 {
            for cy in min_cell.1..=max_cell.1 {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    for &(id, pos) in bucket {
                        if pos.distance_squared(&point) <= r2 {
                            out.push((id, pos));
                        }
                    }
                }
            }
        }
        out
    }

    /// All agents within the axis-aligned rectangle `[top_left,
    /// bottom_right]`, inclusive.
    pub fn rectangle(&self, top_left: Vec2, bottom_right: Vec2) -> Vec<(AgentId, Vec2)> {
        let min_cell = self.cell_of(&top_left);
        let max_cell = self.cell_of(&bottom_right);

        let mut out = Vec::new();
        for cx in min_cell.0..=max_cell.0 {
            for cy in min_cell.1..=max_cell.1 {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    for &(id, pos) in bucket {
                        if pos.x >= top_left.x
                            && pos.x <= bottom_right.x
                            && pos.y >= top_left.y
                            && pos.y <= bottom_right.y
                        {
                            out.push((id, pos));
                        }
                    }
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force_radius(points: &[(AgentId, Vec2)], center: Vec2, r: f64) -> Vec<AgentId> {
        let mut out: Vec<AgentId> = points
            .iter()
            .filter(|(_, p)| p.distance_squared(&center) <= r * r)
            .map(|(id, _)| *id)
            .collect();
        out.sort();
        out
    }

    #[test]
    fn radius_query_equals_brute_force() {
        let points: Vec<(AgentId, Vec2)> = vec![
            (1, Vec2::new(0.0, 0.0)),
            (2, Vec2::new(50.0, 0.0)),
            (3, Vec2::new(99.0, 99.0)),
            (4, Vec2::new(500.0, 500.0)),
            (5, Vec2::new(-40.0, 30.0)),
        ];
        let mut grid = SpatialGrid::new(100.0);
        for (id, p) in &points {
            grid.insert(*id, *p);
        }

        let center = Vec2::new(0.0, 0.0);
        for r in [10.0, 60.0, 150.0, 1000.0] {
            let mut got: Vec<AgentId> = grid.radius(center, r).into_iter().map(|(id, _)| id).collect();
            got.sort();
            assert_eq!(got, brute_force_radius(&points, center, r), "r={r}");
        }
    }

    #[test]
    fn rectangle_query_bounds_are_inclusive() {
        let mut grid = SpatialGrid::new(50.0);
        grid.insert(1, Vec2::new(10.0, 10.0));
        grid.insert(2, Vec2::new(100.0, 100.0));
        let found = grid.rectangle(Vec2::new(0.0, 0.0), Vec2::new(50.0, 50.0));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 1);
    }

    #[test]
    fn rebuild_clears_prior_state() {
        let mut grid = SpatialGrid::new(100.0);
        grid.insert(1, Vec2::new(0.0, 0.0));
        grid.rebuild(std::iter::empty());
        assert!(grid.is_empty());
    }

    #[test]
    fn single_agent_has_no_neighbors() {
        let mut grid = SpatialGrid::new(100.0);
        grid.insert(1, Vec2::ZERO);
        let found = grid.radius(Vec2::ZERO, 50.0);
        assert_eq!(found.len(), 1); // only itself
    }
}
