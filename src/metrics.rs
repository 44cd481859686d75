//! Structured metrics emission.
//!
//! A push interface rather than a pull/scrape one, expressed as a
//! `MetricsSink` trait so callers can plug in a channel, a counter
//! registry, or a test spy.

use std::collections::HashMap;

/// One observation: a name, a value, and a set of string tags.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSample {
    pub name: String,
    pub value: f64,
    pub tags: Vec<(String, String)>,
}

impl MetricsSample {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }
}

/// Implemented by whatever the host wires up to receive samples. The core
/// never performs I/O itself; `record` is the only method a sink must
/// provide.
pub trait MetricsSink {
    fn record(&mut self, sample: MetricsSample);
}

/// Discards every sample. The default sink when the caller doesn't need
/// metrics.
#[derive(Debug, Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&mut self, _sample: MetricsSample) {}
}

/// Keeps a running average per metric name, grouped by tag-free key — handy
/// for tests and for hosts that want point-in-time snapshots rather than a
/// stream.
#[derive(Debug, Default)]
pub struct RunningAverageSink {
    sums: HashMap<String, f64>,
    counts: HashMap<String, u64>,
}

impl RunningAverageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn average(&self, name: &str) -> Option<f64> {
        let count = *self.counts.get(name)?;
        if count == 0 {
            return None;
        }
        Some(self.sums.get(name).copied().unwrap_or(0.0) / count as f64)
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }
}

impl MetricsSink for RunningAverageSink {
    fn record(&mut self, sample: MetricsSample) {
        *self.sums.entry(sample.name.clone()).or_insert(0.0) += sample.value;
        *self.counts.entry(sample.name).or_insert(0) += 1;
    }
}

/// Names the core emits every tick; kept as constants so producers and
/// tests never typo a metric name.
pub mod names {
    pub const FLOCKING_COHESION: &str = "flocking.cohesion";
    pub const FLOCKING_SEPARATION_SAFETY: &str = "flocking.separation_safety";
    pub const FLOCKING_ALIGNMENT: &str = "flocking.alignment";
    pub const FORMATION_ACCURACY: &str = "formation.accuracy";
    pub const VOTE_CONSENSUS_TIME_MS: &str = "vote.consensus_time_ms";
    pub const VOTE_SUCCESS: &str = "vote.success";
    pub const TASK_ASSIGNMENT_SCORE: &str = "task.assignment_score";
    pub const TASK_WORKLOAD_BALANCE: &str = "task.workload.balance";
    pub const COORDINATION_AVG_RESPONSE_MS: &str = "coordination.avg_response_ms";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_average_tracks_mean() {
        let mut sink = RunningAverageSink::new();
        sink.record(MetricsSample::new(names::FLOCKING_COHESION, 1.0));
        sink.record(MetricsSample::new(names::FLOCKING_COHESION, 3.0));
        assert_eq!(sink.average(names::FLOCKING_COHESION), Some(2.0));
        assert_eq!(sink.count(names::FLOCKING_COHESION), 2);
    }

    #[test]
    fn null_sink_drops_everything() {
        let mut sink = NullSink;
        sink.record(MetricsSample::new("anything", 1.0));
    }

    #[test]
    fn unsampled_metric_has_no_average() {
        let sink = RunningAverageSink::new();
        assert_eq!(sink.average("never.recorded"), None);
    }
}
