//! swarmcore: a deterministic, tick-driven coordination core for a
//! cooperative multi-agent swarm.
//!
//! A single-threaded [`Swarm`] owns every agent and subsystem and advances
//! them one fixed step at a time through [`Swarm::tick`]: rebuild the
//! spatial index, advance time-based coordinators (formation transitions,
//! vote timeouts, leader health), run each agent's behavior producers,
//! arbitrate their requests down to one command per agent, integrate
//! physics, and emit a batch of metrics. No step suspends mid-tick, so a
//! host can run the core in lock-step with its own clock, a replay log, or
//! a test harness, and get the same trajectory from the same seed and the
//! same sequence of calls.

pub mod agent;
pub mod arbiter;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod flocking;
pub mod formation;
pub mod geometry;
pub mod leader;
pub mod metrics;
pub mod neighbor;
pub mod obstacle;
pub mod scheduler;
pub mod spatial;
pub mod task;
pub mod voting;

pub use agent::{Agent, AgentId, AgentStatus, BehaviorTag};
pub use config::Config;
pub use error::{Error, Result};
pub use event::{Event, EventKind};
pub use geometry::Vec2;
pub use metrics::{MetricsSample, MetricsSink, NullSink, RunningAverageSink};
pub use scheduler::{FormationId, Swarm};
