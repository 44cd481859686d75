//! Formation shapes and maintenance/transition control.
//!
//! Shape-to-slot mapping is a pure function from slot index to offset, no
//! per-shape type. The error-band split (`epsilon_ok` vs `epsilon_minor`)
//! stages position error the same way liveness is staged elsewhere in this
//! crate — a warning band before a hard failure band — and the time-based
//! transition between shapes is a straight `lerp`.

use crate::config::FormationConfig;
use crate::geometry::{self, Vec2};

/// Supported formation shapes. A tagged variant, matched in
/// [`slot_offset`] rather than dispatched through a shape trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormationShape {
    Line,
    Wedge,
    Circle,
    Column,
    Grid { columns: u32 },
    Diamond,
}

/// Offset of slot `index` (0-based) out of `total` slots, relative to the
/// formation's reference point and facing along `+x`. Pure function of
/// shape/index/total/spacing; the caller rotates/translates by the
/// formation's actual heading and anchor.
pub fn slot_offset(shape: FormationShape, index: u32, total: u32, spacing: f64) -> Vec2 {
    let i = index as f64;
    match shape {
        FormationShape::Line => {
            let center = (total.saturating_sub(1)) as f64 / 2.0;
            Vec2::new(0.0, (i - center) * spacing)
        }
        FormationShape::Column => Vec2::new(-i * spacing, 0.0),
        FormationShape::Wedge => {
            // Two arms spreading backward from a point leader at index 0.
            if index == 0 {
                Vec2::ZERO
            } else {
                let arm = if index % 2 == 1 { 1.0 } else { -1.0 };
                let rank = ((index + 1) / 2) as f64;
                Vec2::new(-rank * spacing, arm * rank * spacing)
            }
        }
        FormationShape::Circle => {
            let radius = spacing * total.max(1) as f64 / (2.0 * std::f64::consts::PI);
            let angle = 2.0 * std::f64::consts::PI * i / total.max(1) as f64;
            Vec2::from_angle(angle).scale(radius.max(spacing))
        }
        FormationShape::Grid { columns } => {
            let columns = columns.max(1);
            let row = (index / columns) as f64;
            let col = (index % columns) as f64;
            let col_center = (columns.min(total).saturating_sub(1)) as f64 / 2.0;
            Vec2::new((col - col_center) * spacing, row * spacing)
        }
        FormationShape::Diamond => {
            // Front/back/left/right points, then successive rings.
            match index {
                0 => Vec2::new(spacing, 0.0),
                1 => Vec2::new(0.0, spacing),
                2 => Vec2::new(-spacing, 0.0),
                3 => Vec2::new(0.0, -spacing),
                n => {
                    let ring = (n / 4) as f64 + 1.0;
                    let sub = n % 4;
                    let base = Vec2::new(ring * spacing, 0.0);
                    let angle = std::f64::consts::FRAC_PI_2 * sub as f64;
                    geometry::lerp(base, Vec2::from_angle(angle).scale(ring * spacing), 0.5)
                }
            }
        }
    }
}

/// Result of comparing an agent's position to its assigned slot target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaintenanceBand {
    /// Error below `epsilon_ok`: no correction needed.
    Ok,
    /// Error in `[epsilon_ok, epsilon_minor)`: apply a gentle correction.
    Minor { correction_force: Vec2 },
    /// Error at or above `epsilon_minor`: apply a strong correction.
    Major { correction_force: Vec2 },
}

/// Classifies `position`'s deviation from `target` and produces the
/// corresponding correction force, scaled by the configured gain and capped
/// at `max_force`.
pub fn maintenance_band(
    position: Vec2,
    target: Vec2,
    cfg: &FormationConfig,
    max_force: f64,
) -> MaintenanceBand {
    let delta = target - position;
    let error = delta.magnitude();
    if error < cfg.epsilon_ok {
        MaintenanceBand::Ok
    } else if error < cfg.epsilon_minor {
        let strength = cfg.minor_gain * (error / cfg.epsilon_minor).min(2.0);
        MaintenanceBand::Minor {
            correction_force: delta.normalize().scale(strength).clip(max_force),
        }
    } else {
        let strength = cfg.major_gain * (error / cfg.epsilon_minor).min(2.0);
        MaintenanceBand::Major {
            correction_force: delta.normalize().scale(strength).clip(max_force),
        }
    }
}

/// State for an in-progress shape transition, driven by elapsed time rather
/// than error convergence so transitions finish in bounded, predictable time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormationTransition {
    pub from_target: Vec2,
    pub to_target: Vec2,
    pub duration_s: f64,
    pub elapsed_s: f64,
}

impl FormationTransition {
    pub fn new(from_target: Vec2, to_target: Vec2, duration_s: f64) -> Self {
        Self {
            from_target,
            to_target,
            duration_s: duration_s.max(1e-6),
            elapsed_s: 0.0,
        }
    }

    pub fn progress(&self) -> f64 {
        (self.elapsed_s / self.duration_s).clamp(0.0, 1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed_s >= self.duration_s
    }

    /// Advances elapsed time by `dt` and returns the interpolated target for
    /// this tick.
    pub fn advance(&mut self, dt: f64) -> Vec2 {
        self.elapsed_s = (self.elapsed_s + dt).min(self.duration_s);
        geometry::lerp(self.from_target, self.to_target, self.progress())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_slots_are_symmetric_about_center() {
        let a = slot_offset(FormationShape::Line, 0, 3, 10.0);
        let b = slot_offset(FormationShape::Line, 2, 3, 10.0);
        assert_eq!(a.y, -b.y);
    }

    #[test]
    fn wedge_leader_at_origin() {
        let leader = slot_offset(FormationShape::Wedge, 0, 5, 10.0);
        assert_eq!(leader, Vec2::ZERO);
    }

    #[test]
    fn circle_slots_are_equidistant_from_center() {
        let total = 6;
        let radii: Vec<f64> = (0..total)
            .map(|i| slot_offset(FormationShape::Circle, i, total, 10.0).magnitude())
            .collect();
        for r in &radii[1..] {
            assert!((r - radii[0]).abs() < 1e-9);
        }
    }

    #[test]
    fn maintenance_band_thresholds() {
        let cfg = FormationConfig::default();
        assert_eq!(
            maintenance_band(Vec2::ZERO, Vec2::new(1.0, 0.0), &cfg, 10.0),
            MaintenanceBand::Ok
        );
        match maintenance_band(Vec2::ZERO, Vec2::new(10.0, 0.0), &cfg, 10.0) {
            MaintenanceBand::Minor { .. } => {}
            other => panic!("expected Minor, got {other:?}"),
        }
        match maintenance_band(Vec2::ZERO, Vec2::new(50.0, 0.0), &cfg, 10.0) {
            MaintenanceBand::Major { .. } => {}
            other => panic!("expected Major, got {other:?}"),
        }
    }

    #[test]
    fn minor_band_force_matches_gain_times_capped_ratio() {
        let cfg = FormationConfig::default();
        let band = maintenance_band(Vec2::ZERO, Vec2::new(10.0, 0.0), &cfg, 100.0);
        let expected = cfg.minor_gain * (10.0_f64 / cfg.epsilon_minor).min(2.0);
        match band {
            MaintenanceBand::Minor { correction_force } => {
                assert!((correction_force.magnitude() - expected).abs() < 1e-9);
            }
            other => panic!("expected Minor, got {other:?}"),
        }
    }

    #[test]
    fn major_band_force_saturates_at_twice_gain() {
        let cfg = FormationConfig::default();
        // error far beyond epsilon_minor: ratio clamps to 2.0.
        let band = maintenance_band(Vec2::ZERO, Vec2::new(500.0, 0.0), &cfg, 100.0);
        let expected = cfg.major_gain * 2.0;
        match band {
            MaintenanceBand::Major { correction_force } => {
                assert!((correction_force.magnitude() - expected).abs() < 1e-9);
            }
            other => panic!("expected Major, got {other:?}"),
        }
    }

    #[test]
    fn transition_reaches_target_at_full_duration() {
        let mut t = FormationTransition::new(Vec2::ZERO, Vec2::new(100.0, 0.0), 2.0);
        t.advance(1.0);
        assert!(!t.is_complete());
        let pos = t.advance(1.0);
        assert!(t.is_complete());
        assert_eq!(pos, Vec2::new(100.0, 0.0));
    }
}
