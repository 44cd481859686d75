//! Error types for the swarm coordination core.
//!
//! Arithmetic degenerate cases (zero-length vectors, empty neighbor sets)
//! never produce an `Err` — they resolve locally to zero forces or no-ops.
//! Only stateful violations surface here, and the tick loop itself never
//! returns an error: a single bad input cannot halt simulation.

use crate::agent::AgentId;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every error kind the core can report.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A configuration field was outside its stated range. Fatal to the
    /// caller at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Operation referenced an agent id that the store doesn't know about.
    /// The operation is a no-op.
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    /// `submitProposal` was called with fewer than two options, a deadline
    /// that has already passed, or a quorum below one.
    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    /// A vote was dropped: proposal not active, choice not among the
    /// proposal's options, or a duplicate vote under `allowRevoting = false`.
    #[error("invalid vote: {0}")]
    InvalidVote(String),

    /// `assignTask` found no eligible agent; the task is queued as pending.
    #[error("no eligible agent for task {0}")]
    NoEligibleAgent(String),

    /// A formation's agent count fell below `shape.minimumAgents`.
    #[error("formation {0} violated minimum agent count")]
    FormationViolation(u64),

    /// The leader health check failed and no successor could be found.
    #[error("leader lost with no successor candidate")]
    LeaderLost,
}
