//! Configuration types, one per subsystem, each with its own range-checked
//! `validate()`, collected here since the top-level `Swarm` needs to
//! validate all of them together at construction.

use crate::error::{Error, Result};
use crate::voting::{TiebreakMode, TimeoutFallback};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlockingConfig {
    pub separation_radius: f64,
    pub alignment_radius: f64,
    pub cohesion_radius: f64,
    pub separation_weight: f64,
    pub alignment_weight: f64,
    pub cohesion_weight: f64,
    pub max_speed: f64,
    pub max_force: f64,
}

impl Default for FlockingConfig {
    /// A balanced middle ground between the tight and loose presets below.
    fn default() -> Self {
        Self {
            separation_radius: 25.0,
            alignment_radius: 50.0,
            cohesion_radius: 100.0,
            separation_weight: 1.5,
            alignment_weight: 1.0,
            cohesion_weight: 1.0,
            max_speed: 60.0,
            max_force: 3.0,
        }
    }
}

impl FlockingConfig {
    /// Stronger separation, tighter radii — for formation-adjacent flocking.
    pub fn tight_formation() -> Self {
        Self {
            separation_radius: 15.0,
            alignment_radius: 35.0,
            cohesion_radius: 60.0,
            separation_weight: 2.5,
            alignment_weight: 1.2,
            cohesion_weight: 0.8,
            max_speed: 50.0,
            max_force: 3.0,
        }
    }

    /// Weaker separation, wider cohesion — for loose area exploration.
    pub fn loose_exploration() -> Self {
        Self {
            separation_radius: 20.0,
            alignment_radius: 60.0,
            cohesion_radius: 150.0,
            separation_weight: 1.0,
            alignment_weight: 0.8,
            cohesion_weight: 1.4,
            max_speed: 70.0,
            max_force: 2.5,
        }
    }

    /// Maximum separation at raised top speed — for emergency evasion.
    pub fn emergency_evasion() -> Self {
        Self {
            separation_radius: 30.0,
            alignment_radius: 45.0,
            cohesion_radius: 70.0,
            separation_weight: 5.0,
            alignment_weight: 0.5,
            cohesion_weight: 0.2,
            max_speed: 120.0,
            max_force: 5.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0 < self.separation_radius
            && self.separation_radius < self.alignment_radius
            && self.alignment_radius < self.cohesion_radius
            && self.cohesion_radius <= 200.0)
        {
            return Err(Error::InvalidConfiguration(
                "flocking radii must satisfy 0 < Rs < Ra < Rc <= 200".into(),
            ));
        }
        for (name, w) in [
            ("separation_weight", self.separation_weight),
            ("alignment_weight", self.alignment_weight),
            ("cohesion_weight", self.cohesion_weight),
        ] {
            if !(0.0..=5.0).contains(&w) {
                return Err(Error::InvalidConfiguration(format!(
                    "flocking.{name} must be in [0, 5], got {w}"
                )));
            }
        }
        if !(self.max_speed > 0.0 && self.max_speed <= 200.0) {
            return Err(Error::InvalidConfiguration(
                "flocking.max_speed must be in (0, 200]".into(),
            ));
        }
        if !(self.max_force > 0.0 && self.max_force <= 10.0) {
            return Err(Error::InvalidConfiguration(
                "flocking.max_force must be in (0, 10]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VotingConfig {
    pub threshold: f64,
    pub minimum_quorum: u32,
    pub require_unanimous: bool,
    pub timeout_ms: u64,
    pub max_rounds: u32,
    pub revote_delay_ms: u64,
    pub allow_abstention: bool,
    pub weighted_voting: bool,
    pub allow_revoting: bool,
    pub timeout_fallback: TimeoutFallback,
    pub tiebreaker_mode: TiebreakMode,
    pub leader_override: bool,
}

impl Default for VotingConfig {
    /// Standard preset: 60% threshold, 8s timeout, simple majority.
    fn default() -> Self {
        Self {
            threshold: 0.6,
            minimum_quorum: 1,
            require_unanimous: false,
            timeout_ms: 8_000,
            max_rounds: 1,
            revote_delay_ms: 0,
            allow_abstention: true,
            weighted_voting: false,
            allow_revoting: false,
            timeout_fallback: TimeoutFallback::Abort,
            tiebreaker_mode: TiebreakMode::LowestId,
            leader_override: false,
        }
    }
}

impl VotingConfig {
    pub fn emergency() -> Self {
        Self {
            threshold: 1.0,
            require_unanimous: true,
            timeout_ms: 10_000,
            max_rounds: 1,
            timeout_fallback: TimeoutFallback::LeaderDecides,
            leader_override: true,
            ..Self::default()
        }
    }

    pub fn quick() -> Self {
        Self {
            threshold: 0.5,
            timeout_ms: 5_000,
            max_rounds: 1,
            timeout_fallback: TimeoutFallback::Abort,
            ..Self::default()
        }
    }

    pub fn deliberative() -> Self {
        Self {
            threshold: 0.67,
            timeout_ms: 15_000,
            max_rounds: 3,
            weighted_voting: true,
            timeout_fallback: TimeoutFallback::RetryOnce,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::InvalidConfiguration(
                "voting.threshold must be in [0, 1]".into(),
            ));
        }
        if self.minimum_quorum < 1 {
            return Err(Error::InvalidConfiguration(
                "voting.minimum_quorum must be >= 1".into(),
            ));
        }
        if !(1_000..=60_000).contains(&self.timeout_ms) {
            return Err(Error::InvalidConfiguration(
                "voting.timeout_ms must be in [1000, 60000]".into(),
            ));
        }
        if !(1..=5).contains(&self.max_rounds) {
            return Err(Error::InvalidConfiguration(
                "voting.max_rounds must be in [1, 5]".into(),
            ));
        }
        if self.revote_delay_ms > 10_000 {
            return Err(Error::InvalidConfiguration(
                "voting.revote_delay_ms must be in [0, 10000]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskConfig {
    pub max_tasks_per_agent: u32,
    pub min_battery_floor: f64,
    pub max_distance_scale: f64,
    /// Ceiling on the urgency bonus awarded to a task as its deadline
    /// approaches; scaled down to zero once slack exceeds `urgency_horizon_ms`.
    pub urgency_scale: f64,
    pub urgency_horizon_ms: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_agent: 3,
            min_battery_floor: 0.2,
            max_distance_scale: 1000.0,
            urgency_scale: 15.0,
            urgency_horizon_ms: 30_000,
        }
    }
}

impl TaskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_tasks_per_agent == 0 {
            return Err(Error::InvalidConfiguration(
                "tasks.max_tasks_per_agent must be >= 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_battery_floor) {
            return Err(Error::InvalidConfiguration(
                "tasks.min_battery_floor must be in [0, 1]".into(),
            ));
        }
        if self.max_distance_scale <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "tasks.max_distance_scale must be > 0".into(),
            ));
        }
        if self.urgency_scale < 0.0 {
            return Err(Error::InvalidConfiguration(
                "tasks.urgency_scale must be >= 0".into(),
            ));
        }
        if self.urgency_horizon_ms == 0 {
            return Err(Error::InvalidConfiguration(
                "tasks.urgency_horizon_ms must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormationConfig {
    pub epsilon_ok: f64,
    pub epsilon_minor: f64,
    pub minor_gain: f64,
    pub major_gain: f64,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            epsilon_ok: 5.0,
            epsilon_minor: 15.0,
            minor_gain: 0.5,
            major_gain: 1.5,
        }
    }
}

impl FormationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon_ok >= 0.0 && self.epsilon_ok < self.epsilon_minor) {
            return Err(Error::InvalidConfiguration(
                "formation.epsilon_ok must be >= 0 and < epsilon_minor".into(),
            ));
        }
        if self.minor_gain <= 0.0 || self.major_gain <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "formation gains must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeaderConfig {
    pub leader_timeout_ms: u64,
    pub min_leader_battery: f64,
    pub smooth_factor: f64,
    pub position_tolerance: f64,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            leader_timeout_ms: 5_000,
            min_leader_battery: 0.2,
            smooth_factor: 0.3,
            position_tolerance: 10.0,
        }
    }
}

impl LeaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.leader_timeout_ms == 0 {
            return Err(Error::InvalidConfiguration(
                "leader.leader_timeout_ms must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_leader_battery) {
            return Err(Error::InvalidConfiguration(
                "leader.min_leader_battery must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.smooth_factor) {
            return Err(Error::InvalidConfiguration(
                "leader.smooth_factor must be in [0, 1]".into(),
            ));
        }
        if self.position_tolerance < 0.0 {
            return Err(Error::InvalidConfiguration(
                "leader.position_tolerance must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialConfig {
    pub cell_size: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        // Default cell size = longest behavior radius in a default swarm.
        Self { cell_size: 100.0 }
    }
}

impl SpatialConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cell_size <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "spatial.cell_size must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Aggregate configuration for a [`crate::Swarm`]. Validated as a whole at
/// construction; an invalid field anywhere rejects the whole config rather
/// than silently clamping it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub flocking: FlockingConfig,
    pub voting: VotingConfig,
    pub tasks: TaskConfig,
    pub formation: FormationConfig,
    pub leader: LeaderConfig,
    pub spatial: SpatialConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flocking: FlockingConfig::default(),
            voting: VotingConfig::default(),
            tasks: TaskConfig::default(),
            formation: FormationConfig::default(),
            leader: LeaderConfig::default(),
            spatial: SpatialConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.flocking.validate()?;
        self.voting.validate()?;
        self.tasks.validate()?;
        self.formation.validate()?;
        self.leader.validate()?;
        self.spatial.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn bad_flocking_radii_rejected() {
        let mut cfg = FlockingConfig::default();
        cfg.separation_radius = cfg.alignment_radius; // Rs == Ra, violates Rs < Ra
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_voting_quorum_rejected() {
        let mut cfg = VotingConfig::default();
        cfg.minimum_quorum = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn presets_all_validate() {
        FlockingConfig::tight_formation().validate().unwrap();
        FlockingConfig::loose_exploration().validate().unwrap();
        FlockingConfig::emergency_evasion().validate().unwrap();
        VotingConfig::emergency().validate().unwrap();
        VotingConfig::quick().validate().unwrap();
        VotingConfig::deliberative().validate().unwrap();
    }
}
