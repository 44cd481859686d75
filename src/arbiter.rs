//! Behavior arbitration: collapses one agent's pending `BehaviorRequest`s
//! into a single `MovementCommand`.
//!
//! Collects candidates, sorts them, applies one fixed resolution rule, and
//! emits a single outcome — the same shape used for round resolution
//! elsewhere in this crate, applied here to per-agent behavior requests
//! instead of distributed votes.

use crate::command::{compatible, never_blends, BehaviorRequest, CommandParams, MovementCommand};
use crate::geometry::Vec2;

const EMERGENCY_PRIORITY: u32 = 100;
const NARROW_BLEND_PRIORITY: u32 = 90;

/// Resolves every request queued for one agent this tick into a single
/// command. Returns `None` if `requests` is empty (agent asserted nothing).
pub fn arbitrate(mut requests: Vec<BehaviorRequest>) -> Option<MovementCommand> {
    if requests.is_empty() {
        return None;
    }
    requests.sort_by(|a, b| b.priority().cmp(&a.priority()).then(a.timestamp.cmp(&b.timestamp)));

    let top = requests[0];
    if top.priority() >= EMERGENCY_PRIORITY {
        return Some(top.command);
    }
    if top.priority() >= NARROW_BLEND_PRIORITY {
        let evading: Vec<&BehaviorRequest> = requests
            .iter()
            .filter(|r| r.behavior_kind == crate::agent::BehaviorTag::Evading)
            .collect();
        if evading.is_empty() {
            return Some(top.command);
        }
        let mut blend_set = vec![&top];
        blend_set.extend(evading);
        return Some(weighted_blend(&blend_set));
    }

    if never_blends(top.behavior_kind) {
        return Some(top.command);
    }

    let all_compatible = requests
        .iter()
        .skip(1)
        .all(|r| compatible(top.behavior_kind, r.behavior_kind) && !never_blends(r.behavior_kind));

    if all_compatible && requests.len() > 1 {
        let refs: Vec<&BehaviorRequest> = requests.iter().collect();
        Some(weighted_blend(&refs))
    } else {
        Some(top.command)
    }
}

/// Priority-proportional average of forces/targets across `requests`. The
/// resulting command's type matches the highest-priority contributor.
fn weighted_blend(requests: &[&BehaviorRequest]) -> MovementCommand {
    let total_priority: f64 = requests.iter().map(|r| r.priority() as f64).sum();
    let mut force = Vec2::ZERO;
    let mut target = Vec2::ZERO;
    let mut target_weight = 0.0;

    for r in requests {
        let w = r.priority() as f64 / total_priority;
        force = force + r.command.force().scale(w);
        if let Some(t) = r.command.target() {
            target = target + t.scale(w);
            target_weight += w;
        }
    }

    let dominant = requests.iter().max_by_key(|r| r.priority()).unwrap();
    let params = match dominant.command.params {
        CommandParams::FlockingBehavior { .. } => CommandParams::FlockingBehavior {
            combined_force: force,
        },
        CommandParams::FormationPosition { target: t, .. } => CommandParams::FormationPosition {
            correction_force: force,
            target: if target_weight > 0.0 { target } else { t },
        },
        CommandParams::MoveToTarget { target: t } => CommandParams::MoveToTarget {
            target: if target_weight > 0.0 { target } else { t },
        },
        CommandParams::AvoidObstacle { .. } => CommandParams::AvoidObstacle {
            correction_force: force,
        },
        CommandParams::StopAndHold => CommandParams::StopAndHold,
    };

    MovementCommand::new(dominant.agent_id, params)
}
