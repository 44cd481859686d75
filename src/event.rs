//! Event kinds emitted once per tick, and the subscription mechanism.
//!
//! A one-shot-per-tick broadcast: subscribers are boxed `FnMut` closures
//! rather than raw function pointers, since this crate targets `std`.

use crate::agent::AgentId;
use crate::command::MovementCommand;
use crate::formation::FormationShape;
use crate::metrics::MetricsSample;
use crate::task::TaskAssignment;
use crate::voting::VoteResult;

/// One notification batched and emitted at the end of a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Commands(Vec<MovementCommand>),
    VoteCompleted(VoteResult),
    TaskAssigned(TaskAssignment),
    TaskReassigned(TaskAssignment),
    LeadershipChanged {
        formation_id: Option<u64>,
        previous: Option<AgentId>,
        new_leader: Option<AgentId>,
        reason: String,
    },
    FormationTransitionComplete {
        formation_id: u64,
        shape: FormationShape,
    },
    LeaderLost {
        agent_id: AgentId,
    },
    FormationDisbanded {
        formation_id: u64,
    },
    Metrics(Vec<MetricsSample>),
}

/// Which kind a subscriber wants, without requiring it to match on the full
/// payload just to filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Commands,
    VoteCompleted,
    TaskAssigned,
    TaskReassigned,
    LeadershipChanged,
    FormationTransitionComplete,
    LeaderLost,
    FormationDisbanded,
    Metrics,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Commands(_) => EventKind::Commands,
            Event::VoteCompleted(_) => EventKind::VoteCompleted,
            Event::TaskAssigned(_) => EventKind::TaskAssigned,
            Event::TaskReassigned(_) => EventKind::TaskReassigned,
            Event::LeadershipChanged { .. } => EventKind::LeadershipChanged,
            Event::FormationTransitionComplete { .. } => EventKind::FormationTransitionComplete,
            Event::LeaderLost { .. } => EventKind::LeaderLost,
            Event::FormationDisbanded { .. } => EventKind::FormationDisbanded,
            Event::Metrics(_) => EventKind::Metrics,
        }
    }
}

pub type SubscriberFn = Box<dyn FnMut(&Event) + Send>;

/// Broadcasts each tick's events to every subscriber interested in that
/// `EventKind`. Subscriptions are never removed mid-run in this core; a host
/// that needs to unsubscribe should wrap its own closure with a flag.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(EventKind, SubscriberFn)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { subscribers: Vec::new() }
    }

    pub fn subscribe(&mut self, kind: EventKind, callback: SubscriberFn) {
        self.subscribers.push((kind, callback));
    }

    /// Delivers `event` to every subscriber registered for its kind, in
    /// subscription order.
    pub fn publish(&mut self, event: Event) {
        let kind = event.kind();
        for (sub_kind, callback) in self.subscribers.iter_mut() {
            if *sub_kind == kind {
                callback(&event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn subscriber_receives_matching_events_only() {
        let mut bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();
        bus.subscribe(
            EventKind::LeaderLost,
            Box::new(move |_event| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.publish(Event::LeaderLost { agent_id: 1 });
        bus.publish(Event::Commands(vec![]));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_kind_matches_variant() {
        assert_eq!(Event::Commands(vec![]).kind(), EventKind::Commands);
        assert_eq!(Event::LeaderLost { agent_id: 1 }.kind(), EventKind::LeaderLost);
    }
}
