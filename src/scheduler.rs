//! The tick scheduler: `Swarm`, the top-level orchestrator wiring every
//! subsystem together behind the external API.
//!
//! A per-tick drain-inputs/step/emit cycle generalized into the
//! multi-producer/arbiter/coordinator pipeline this system needs. Producer
//! order, arbitration, and the integrator all run inside one `tick()` call
//! with no suspension points — a cooperative, single-threaded model.

use crate::agent::{Agent, AgentId, AgentStatus, AgentStore, BehaviorTag};
use crate::arbiter;
use crate::command::{BehaviorRequest, CommandParams, MovementCommand};
use crate::config::Config;
use crate::error::Result;
use crate::event::{Event, EventBus, EventKind, SubscriberFn};
use crate::flocking;
use crate::formation::{self, FormationShape, FormationTransition, MaintenanceBand};
use crate::geometry::{self, Vec2};
use crate::leader::{self, LeaderHealth, SelectionMode};
use crate::metrics::{names, MetricsSample};
use crate::neighbor;
use crate::obstacle::{self, AvoidanceStrategy, Obstacle, ObstacleId, ObstacleKind, ObstacleRegistry};
use crate::spatial::SpatialGrid;
use crate::task::{AssignmentStatus, Task, TaskAllocator, TaskAssignment};
use crate::voting::{Proposal, ProposalId, ProposalKind, TiebreakMode, VoteResponse, VoteResult, VotingEngine};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

pub type FormationId = u64;

/// A live formation: shape, slot assignment, and any in-progress transition.
struct ActiveFormation {
    shape: FormationShape,
    center: Vec2,
    spacing: f64,
    heading: Vec2,
    agent_ids: Vec<AgentId>,
    transition: Option<(FormationShape, FormationTransition)>,
}

impl ActiveFormation {
    fn rotated_offset(&self, shape: FormationShape, index: u32, total: u32) -> Vec2 {
        let offset = formation::slot_offset(shape, index, total, self.spacing);
        let angle = self.heading.angle();
        Vec2::new(
            offset.x * angle.cos() - offset.y * angle.sin(),
            offset.x * angle.sin() + offset.y * angle.cos(),
        )
    }

    /// The target position for `agent_id`'s slot, blending toward
    /// `to_shape` while a transition is in progress.
    fn slot_target(&self, agent_id: AgentId) -> Option<Vec2> {
        let index = self.agent_ids.iter().position(|id| *id == agent_id)? as u32;
        let total = self.agent_ids.len() as u32;
        let from = self.center + self.rotated_offset(self.shape, index, total);
        match &self.transition {
            Some((to_shape, transition)) => {
                let to = self.center + self.rotated_offset(*to_shape, index, total);
                Some(geometry::lerp(from, to, transition.progress()))
            }
            None => Some(from),
        }
    }
}

/// Centroid of `agents`' positions, `Vec2::ZERO` if empty.
fn swarm_centroid(agents: &[&Agent]) -> Vec2 {
    if agents.is_empty() {
        return Vec2::ZERO;
    }
    let sum = agents.iter().fold(Vec2::ZERO, |acc, a| acc + a.position);
    sum.scale(1.0 / agents.len() as f64)
}

/// Average heading of `agents`' velocities, normalized. Falls back to `+x`
/// when the swarm has no net motion (all stationary or empty).
fn swarm_heading(agents: &[&Agent]) -> Vec2 {
    if agents.is_empty() {
        return Vec2::new(1.0, 0.0);
    }
    let sum = agents.iter().fold(Vec2::ZERO, |acc, a| acc + a.velocity);
    let heading = geometry::normalize(&sum);
    if heading.magnitude() > 1e-9 {
        heading
    } else {
        Vec2::new(1.0, 0.0)
    }
}

fn minimum_agents(shape: FormationShape) -> u32 {
    match shape {
        FormationShape::Line | FormationShape::Column => 2,
        FormationShape::Wedge => 3,
        FormationShape::Circle => 3,
        FormationShape::Grid { .. } => 2,
        FormationShape::Diamond => 4,
    }
}

/// The full coordination core. Owns every subsystem and exposes the
/// external API from the configuration object down to `tick`.
pub struct Swarm {
    pub config: Config,
    agents: AgentStore,
    grid: SpatialGrid,
    obstacles: ObstacleRegistry,
    voting: VotingEngine,
    tasks: TaskAllocator,
    formations: HashMap<FormationId, ActiveFormation>,
    next_formation_id: FormationId,
    leader_agent_id: Option<AgentId>,
    leader_health: Option<LeaderHealth>,
    leader_mode: SelectionMode,
    /// Each follower's fixed offset from the leader, captured once when it
    /// starts following (or the leader changes) rather than re-derived from
    /// current positions every tick.
    follower_offsets: HashMap<AgentId, Vec2>,
    events: EventBus,
    rng: StdRng,
    now_ms: u64,
    proposal_submitted_at: HashMap<ProposalId, u64>,
}

impl Swarm {
    pub fn new(config: Config, seed: u64) -> Result<Self> {
        config.validate()?;
        let cell_size = config.spatial.cell_size;
        Ok(Self {
            config,
            agents: AgentStore::new(),
            grid: SpatialGrid::new(cell_size),
            obstacles: ObstacleRegistry::new(),
            voting: VotingEngine::new(),
            tasks: TaskAllocator::new(),
            formations: HashMap::new(),
            next_formation_id: 1,
            leader_agent_id: None,
            leader_health: None,
            leader_mode: SelectionMode::HighestBattery,
            follower_offsets: HashMap::new(),
            events: EventBus::new(),
            rng: StdRng::seed_from_u64(seed),
            now_ms: 0,
            proposal_submitted_at: HashMap::new(),
        })
    }

    pub fn subscribe(&mut self, kind: EventKind, callback: SubscriberFn) {
        self.events.subscribe(kind, callback);
    }

    // -- Agents ----------------------------------------------------------

    pub fn spawn(&mut self, position: Vec2) -> AgentId {
        self.agents.spawn(position)
    }

    pub fn remove(&mut self, id: AgentId) -> Result<()> {
        self.agents.remove(id)
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Signals that `id` has failed: marks it `Failed`, reassigns its
    /// non-terminal tasks, and triggers leader succession if it was leader.
    pub fn agent_failed(&mut self, id: AgentId) -> Result<()> {
        self.agents.set_status(id, AgentStatus::Failed)?;
        let agents = self.agents.all_active();
        let reassigned = self.tasks.agent_failed(id, &agents, &self.config.tasks, self.now_ms);
        for assignment in reassigned {
            self.events.publish(Event::TaskReassigned(assignment));
        }
        if self.leader_agent_id == Some(id) {
            self.run_succession();
        }
        Ok(())
    }

    // -- Obstacles ---------------------------------------------------------

    pub fn register_obstacle(&mut self, position: Vec2, radius: f64, kind: ObstacleKind) -> ObstacleId {
        self.obstacles.register(position, radius, kind)
    }

    pub fn unregister_obstacle(&mut self, id: ObstacleId) -> bool {
        self.obstacles.unregister(id)
    }

    // -- Voting --------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn submit_proposal(
        &mut self,
        proposer_id: AgentId,
        question: String,
        options: Vec<String>,
        context: String,
        deadline_ms: u64,
        minimum_votes: u32,
        requires_unanimous: bool,
        kind: ProposalKind,
    ) -> Result<ProposalId> {
        let id = self.voting.submit(
            proposer_id,
            question,
            options,
            context,
            deadline_ms,
            minimum_votes,
            requires_unanimous,
            kind,
            self.now_ms,
        )?;
        self.proposal_submitted_at.insert(id, self.now_ms);
        Ok(id)
    }

    pub fn record_vote(&mut self, response: VoteResponse) -> Result<()> {
        self.voting.record_vote(response, self.config.voting.allow_revoting)
    }

    pub fn proposal(&self, id: ProposalId) -> Option<&Proposal> {
        self.voting.get(id)
    }

    // -- Tasks -----------------------------------------------------------

    pub fn submit_task(&mut self, task: Task) -> Result<Option<TaskAssignment>> {
        let agents = self.agents.all_active();
        let result = self.tasks.assign_task(task, &agents, &self.config.tasks, self.now_ms);
        if let Ok(Some(assignment)) = &result {
            self.events.publish(Event::TaskAssigned(assignment.clone()));
        }
        result
    }

    pub fn cancel_task(&mut self, task_id: &str, agent_id: AgentId) -> Result<()> {
        self.tasks.cancel_task(task_id, agent_id)
    }

    pub fn report_task_outcome(&mut self, task_id: &str, agent_id: AgentId, status: AssignmentStatus) -> Result<()> {
        self.tasks.report_outcome(task_id, agent_id, status)
    }

    // -- Formations --------------------------------------------------------

    pub fn request_formation(
        &mut self,
        shape: FormationShape,
        agent_ids: Vec<AgentId>,
        center: Vec2,
        spacing: f64,
        heading: Vec2,
    ) -> Result<FormationId> {
        if (agent_ids.len() as u32) < minimum_agents(shape) {
            return Err(crate::error::Error::FormationViolation(self.next_formation_id));
        }
        let id = self.next_formation_id;
        self.next_formation_id += 1;
        for (idx, agent_id) in agent_ids.iter().enumerate() {
            let _ = self.agents.get_mut(*agent_id).map(|a| a.formation_slot = Some(idx as u64));
        }
        self.formations.insert(
            id,
            ActiveFormation {
                shape,
                center,
                spacing,
                heading,
                agent_ids,
                transition: None,
            },
        );
        Ok(id)
    }

    pub fn transition_formation(&mut self, formation_id: FormationId, new_shape: FormationShape, duration_ms: u64) -> Result<()> {
        let formation = self
            .formations
            .get_mut(&formation_id)
            .ok_or(crate::error::Error::FormationViolation(formation_id))?;
        formation.transition = Some((
            new_shape,
            FormationTransition::new(Vec2::ZERO, Vec2::ZERO, duration_ms as f64 / 1000.0),
        ));
        Ok(())
    }

    // -- Leadership --------------------------------------------------------

    pub fn set_leader(&mut self, agent_id: AgentId) -> Result<()> {
        if !self.agents.contains(agent_id) {
            return Err(crate::error::Error::UnknownAgent(agent_id));
        }
        let previous = self.leader_agent_id;
        self.leader_agent_id = Some(agent_id);
        self.leader_health = Some(LeaderHealth::new(&self.config.leader));
        self.follower_offsets.clear();
        self.events.publish(Event::LeadershipChanged {
            formation_id: None,
            previous,
            new_leader: Some(agent_id),
            reason: "manual".into(),
        });
        Ok(())
    }

    pub fn select_leader(&mut self, mode: SelectionMode) -> Option<AgentId> {
        self.leader_mode = mode;
        let agents = self.agents.all_active();
        let chosen = leader::select_leader(&agents, mode);
        if let Some(id) = chosen {
            let previous = self.leader_agent_id;
            self.leader_agent_id = Some(id);
            self.leader_health = Some(LeaderHealth::new(&self.config.leader));
            self.follower_offsets.clear();
            self.events.publish(Event::LeadershipChanged {
                formation_id: None,
                previous,
                new_leader: Some(id),
                reason: "selection".into(),
            });
        }
        chosen
    }

    fn run_succession(&mut self) {
        let agents = self.agents.all_active();
        let previous = self.leader_agent_id;
        self.events.publish(Event::LeaderLost {
            agent_id: previous.unwrap_or_default(),
        });
        let candidate = previous.and_then(|p| leader::succeed(p, &agents, self.leader_mode).ok());
        self.leader_agent_id = candidate.or_else(|| leader::select_leader(&agents, self.leader_mode));
        self.leader_health = self.leader_agent_id.map(|_| LeaderHealth::new(&self.config.leader));
        self.follower_offsets.clear();
        self.events.publish(Event::LeadershipChanged {
            formation_id: None,
            previous,
            new_leader: self.leader_agent_id,
            reason: "succession".into(),
        });
    }

    /// Assigns a fixed `offset_from_leader` to every active non-leader agent
    /// that doesn't already have one — called once per tick before the
    /// producers run, so a freshly spawned follower or a follower left
    /// stranded by `follower_offsets.clear()` on leader change picks up its
    /// offset from its *current* position rather than having one derived
    /// from the same tick's comparison (which would always be zero).
    fn sync_follower_offsets(&mut self) {
        let Some(leader_id) = self.leader_agent_id else { return };
        let Some(leader_position) = self.agents.get(leader_id).map(|a| a.position) else { return };
        let missing: Vec<AgentId> = self
            .agents
            .all_active()
            .iter()
            .map(|a| a.id)
            .filter(|id| *id != leader_id && !self.follower_offsets.contains_key(id))
            .collect();
        for id in missing {
            if let Some(position) = self.agents.get(id).map(|a| a.position) {
                self.follower_offsets.insert(id, position - leader_position);
            }
        }
    }

    // -- Tick --------------------------------------------------------------

    /// Advances the simulation by `dt` seconds. Runs index rebuild,
    /// coordinator advancement, per-agent producers, arbitration, physics
    /// integration, and metrics emission — in that fixed order, with no
    /// suspension points.
    pub fn tick(&mut self, dt: f64) {
        let dt_ms = (dt * 1000.0) as u64;
        self.now_ms += dt_ms;

        let snapshot: Vec<Agent> = self.agents.all().into_iter().cloned().collect();
        self.grid.rebuild(snapshot.iter());

        self.advance_formations(dt);
        let vote_results = self.voting.advance(self.now_ms, &self.config.voting);
        let mut vote_metrics = Vec::new();
        for result in vote_results {
            if result.consensus_reached {
                if let Some(submitted_at) = self.proposal_submitted_at.remove(&result.proposal_id) {
                    vote_metrics.push((true, self.now_ms.saturating_sub(submitted_at)));
                }
            } else {
                self.proposal_submitted_at.remove(&result.proposal_id);
                vote_metrics.push((false, 0));
            }
            self.events.publish(Event::VoteCompleted(result));
        }
        self.advance_leader_health(dt_ms);
        self.sync_follower_offsets();

        let mut flocking_sums = (0.0_f64, 0.0_f64, 0.0_f64);
        let mut flocking_samples = 0u32;
        let mut formation_accuracy_sum = 0.0_f64;
        let mut formation_accuracy_samples = 0u32;
        let mut requests: HashMap<AgentId, Vec<BehaviorRequest>> = HashMap::new();
        for agent in snapshot.iter().filter(|a| a.status == AgentStatus::Active) {
            let mut agent_requests = Vec::new();
            self.collect_flocking_with_metrics(agent, &mut agent_requests, &mut flocking_sums, &mut flocking_samples);
            self.collect_formation_with_metrics(agent, &mut agent_requests, &mut formation_accuracy_sum, &mut formation_accuracy_samples);
            self.collect_obstacle(agent, &mut agent_requests);
            self.collect_leader_follower(agent, &mut agent_requests);
            requests.insert(agent.id, agent_requests);
        }

        let mut commands = Vec::new();
        for (agent_id, agent_requests) in requests {
            if let Some(command) = arbiter::arbitrate(agent_requests) {
                commands.push(command);
            }
            let _ = agent_id;
        }
        commands.sort_by_key(|c| c.agent_id);

        for command in &commands {
            self.integrate(*command, dt);
        }

        self.events.publish(Event::Commands(commands));
        self.emit_metrics(
            flocking_sums,
            flocking_samples,
            &vote_metrics,
            formation_accuracy_sum,
            formation_accuracy_samples,
        );
    }

    /// Runs the flocking producer and folds its sub-force magnitudes into
    /// `sums` (separation, alignment, cohesion) for the per-tick metrics.
    fn collect_flocking_with_metrics(
        &self,
        agent: &Agent,
        out: &mut Vec<BehaviorRequest>,
        sums: &mut (f64, f64, f64),
        samples: &mut u32,
    ) {
        let cfg = &self.config.flocking;
        let neighbors = neighbor::neighbors_within(&self.grid, &self.agents, agent.id, agent.position, cfg.cohesion_radius);
        let force = flocking::flocking_force(agent.position, agent.velocity, &neighbors, cfg);
        if !neighbors.is_empty() {
            sums.0 += flocking::separation(agent.position, &neighbors, cfg.separation_radius).magnitude();
            sums.1 += flocking::alignment(agent.velocity, &neighbors, cfg.separation_radius, cfg.alignment_radius).magnitude();
            sums.2 += flocking::cohesion(agent.position, &neighbors, cfg.alignment_radius, cfg.cohesion_radius).magnitude();
            *samples += 1;
        }
        out.push(BehaviorRequest::new(
            agent.id,
            BehaviorTag::Flocking,
            MovementCommand::new(agent.id, CommandParams::FlockingBehavior { combined_force: force }),
            self.now_ms,
        ));
    }

    /// Runs the formation-maintenance producer and folds each checked slot's
    /// normalized accuracy (1.0 at zero error, 0.0 at or beyond
    /// `epsilon_minor`) into `accuracy_sum`/`accuracy_samples` for the
    /// per-tick metric.
    fn collect_formation_with_metrics(
        &self,
        agent: &Agent,
        out: &mut Vec<BehaviorRequest>,
        accuracy_sum: &mut f64,
        accuracy_samples: &mut u32,
    ) {
        for formation in self.formations.values() {
            if let Some(target) = formation.slot_target(agent.id) {
                let error = (target - agent.position).magnitude();
                let accuracy = (1.0 - error / self.config.formation.epsilon_minor).clamp(0.0, 1.0);
                *accuracy_sum += accuracy;
                *accuracy_samples += 1;

                let band = formation::maintenance_band(agent.position, target, &self.config.formation, self.config.flocking.max_force);
                if let MaintenanceBand::Minor { correction_force } | MaintenanceBand::Major { correction_force } = band {
                    out.push(BehaviorRequest::new(
                        agent.id,
                        BehaviorTag::Formation,
                        MovementCommand::new(
                            agent.id,
                            CommandParams::FormationPosition { correction_force, target },
                        ),
                        self.now_ms,
                    ));
                }
            }
        }
    }

    /// Detection range and critical distance for [`obstacle::individual_repulsion`],
    /// and the clearance buffer the Collective/Pathfinding strategies add on
    /// top of an obstacle's own radius.
    const OBSTACLE_DETECTION_RANGE: f64 = 100.0;
    const OBSTACLE_CRITICAL_DISTANCE: f64 = 20.0;
    const OBSTACLE_BUFFER: f64 = 20.0;
    /// How far ahead of a stationary-goal agent Pathfinding projects a
    /// lookahead goal when the agent has no task assignment to steer toward.
    const PATHFINDING_LOOKAHEAD: f64 = 150.0;

    fn collect_obstacle(&self, agent: &Agent, out: &mut Vec<BehaviorRequest>) {
        let obstacles: Vec<Obstacle> = self.obstacles.all().copied().collect();
        if obstacles.is_empty() {
            return;
        }
        let active = self.agents.all_active();
        let strategy = obstacle::select_strategy(
            obstacles.iter().map(|o| o.radius).fold(0.0, f64::max),
            active.len(),
            obstacles.len(),
        );
        match strategy {
            AvoidanceStrategy::Individual => {
                let force = obstacle::individual_repulsion(
                    agent.position,
                    &obstacles,
                    Self::OBSTACLE_DETECTION_RANGE,
                    Self::OBSTACLE_CRITICAL_DISTANCE,
                    self.config.flocking.max_force,
                );
                if force.magnitude() > 1e-9 {
                    out.push(BehaviorRequest::new(
                        agent.id,
                        BehaviorTag::Evading,
                        MovementCommand::new(agent.id, CommandParams::AvoidObstacle { correction_force: force }),
                        self.now_ms,
                    ));
                }
            }
            AvoidanceStrategy::Collective => {
                let center = swarm_centroid(&active);
                let direction = swarm_heading(&active);
                let Some(obstacle) = obstacles
                    .iter()
                    .min_by(|a, b| {
                        geometry::distance(&center, &a.position)
                            .partial_cmp(&geometry::distance(&center, &b.position))
                            .unwrap()
                    })
                else {
                    return;
                };
                let waypoint = obstacle::collective_waypoint(center, direction, obstacle, Self::OBSTACLE_BUFFER);
                let target = obstacle::collective_target(waypoint, agent.position - center);
                out.push(BehaviorRequest::new(
                    agent.id,
                    BehaviorTag::Evading,
                    MovementCommand::new(agent.id, CommandParams::MoveToTarget { target }),
                    self.now_ms,
                ));
            }
            AvoidanceStrategy::Pathfinding => {
                let goal = self.tasks.current_target(agent.id).or_else(|| {
                    (agent.velocity.magnitude() > 1e-6)
                        .then(|| agent.position + agent.velocity.normalize().scale(Self::PATHFINDING_LOOKAHEAD))
                });
                let Some(goal) = goal else { return };
                let path = obstacle::plan_path(agent.position, goal, &obstacles, Self::OBSTACLE_BUFFER);
                if path.len() > 2 {
                    out.push(BehaviorRequest::new(
                        agent.id,
                        BehaviorTag::Evading,
                        MovementCommand::new(agent.id, CommandParams::MoveToTarget { target: path[1] }),
                        self.now_ms,
                    ));
                }
            }
        }
    }

    fn collect_leader_follower(&self, agent: &Agent, out: &mut Vec<BehaviorRequest>) {
        let Some(leader_id) = self.leader_agent_id else { return };
        if agent.id == leader_id {
            return;
        }
        let Some(leader_agent) = self.agents.get(leader_id) else { return };
        let Some(&offset) = self.follower_offsets.get(&agent.id) else { return };
        let target = leader::follower_target(leader_agent.position, offset, agent.position, self.config.leader.smooth_factor);
        if (target - agent.position).magnitude() > self.config.leader.position_tolerance {
            out.push(BehaviorRequest::new(
                agent.id,
                BehaviorTag::Follower,
                MovementCommand::new(agent.id, CommandParams::MoveToTarget { target }),
                self.now_ms,
            ));
        }
    }

    fn integrate(&mut self, command: MovementCommand, dt: f64) {
        let Some(agent) = self.agents.get(command.agent_id) else { return };
        let max_speed = agent.max_speed.min(self.config.flocking.max_speed);
        let acceleration = command.force();
        let mut new_velocity = agent.velocity + acceleration.scale(dt);
        if let Some(target) = command.target() {
            let to_target = target - agent.position;
            if to_target.magnitude() > 1e-6 {
                new_velocity = to_target.normalize().scale(max_speed);
            }
        }
        new_velocity = new_velocity.clip(max_speed);
        let new_position = agent.position + new_velocity.scale(dt);
        let _ = self.agents.apply_step(command.agent_id, new_position, new_velocity);
        let tag = match command.params {
            CommandParams::FlockingBehavior { .. } => BehaviorTag::Flocking,
            CommandParams::FormationPosition { .. } => BehaviorTag::Formation,
            CommandParams::AvoidObstacle { .. } => BehaviorTag::Evading,
            CommandParams::MoveToTarget { .. } => BehaviorTag::Follower,
            CommandParams::StopAndHold => BehaviorTag::Idle,
        };
        let _ = self.agents.set_behavior(command.agent_id, Some(tag));
    }

    fn advance_formations(&mut self, dt: f64) {
        let mut completed = Vec::new();
        for (id, formation) in self.formations.iter_mut() {
            if let Some((to_shape, transition)) = &mut formation.transition {
                transition.advance(dt);
                if transition.is_complete() {
                    formation.shape = *to_shape;
                    completed.push((*id, *to_shape));
                }
            }
        }
        for (id, shape) in completed {
            if let Some(formation) = self.formations.get_mut(&id) {
                formation.transition = None;
            }
            self.events.publish(Event::FormationTransitionComplete { formation_id: id, shape });
        }

        let mut disbanded = Vec::new();
        for (id, formation) in self.formations.iter() {
            let active_count = formation
                .agent_ids
                .iter()
                .filter(|id| self.agents.get(**id).map(|a| a.status == AgentStatus::Active).unwrap_or(false))
                .count() as u32;
            if active_count < minimum_agents(formation.shape) {
                disbanded.push(*id);
            }
        }
        for id in disbanded {
            self.formations.remove(&id);
            self.events.publish(Event::FormationDisbanded { formation_id: id });
        }
    }

    fn advance_leader_health(&mut self, dt_ms: u64) {
        let Some(leader_id) = self.leader_agent_id else { return };
        let Some(health) = &mut self.leader_health else { return };
        // A confirmed-Active leader is its own heartbeat: the decay clock
        // only advances while the leader is unreachable or gone, so
        // `is_lost()` reflects genuine unresponsiveness rather than wall
        // time since selection.
        let leader_active = self
            .agents
            .get(leader_id)
            .map(|a| a.status == AgentStatus::Active)
            .unwrap_or(false);
        if leader_active {
            health.heartbeat();
        } else {
            health.tick(dt_ms);
        }
        let low_battery = self
            .agents
            .get(leader_id)
            .map(|a| a.battery < self.config.leader.min_leader_battery)
            .unwrap_or(true);
        let unhealthy = !leader_active || low_battery || health.is_lost();
        if unhealthy {
            self.run_succession();
        }
    }

    /// Builds this tick's `MetricsSample` batch from the accumulators each
    /// producer fed during this tick, plus the allocator's own running state.
    fn emit_metrics(
        &mut self,
        flocking_sums: (f64, f64, f64),
        flocking_samples: u32,
        vote_metrics: &[(bool, u64)],
        formation_accuracy_sum: f64,
        formation_accuracy_samples: u32,
    ) {
        let mut samples = Vec::new();

        if flocking_samples > 0 {
            let n = flocking_samples as f64;
            samples.push(MetricsSample::new(names::FLOCKING_SEPARATION_SAFETY, flocking_sums.0 / n));
            samples.push(MetricsSample::new(names::FLOCKING_ALIGNMENT, flocking_sums.1 / n));
            samples.push(MetricsSample::new(names::FLOCKING_COHESION, flocking_sums.2 / n));
        }

        if formation_accuracy_samples > 0 {
            samples.push(MetricsSample::new(
                names::FORMATION_ACCURACY,
                formation_accuracy_sum / formation_accuracy_samples as f64,
            ));
        }

        if !vote_metrics.is_empty() {
            let successes: Vec<u64> = vote_metrics.iter().filter(|(ok, _)| *ok).map(|(_, ms)| *ms).collect();
            let success_rate = successes.len() as f64 / vote_metrics.len() as f64;
            samples.push(MetricsSample::new(names::VOTE_SUCCESS, success_rate));
            if !successes.is_empty() {
                let avg_ms = successes.iter().sum::<u64>() as f64 / successes.len() as f64;
                samples.push(MetricsSample::new(names::VOTE_CONSENSUS_TIME_MS, avg_ms));
                // Voting is the only cross-agent coordination channel this
                // core models, so its consensus latency doubles as the
                // general coordination-response metric.
                samples.push(MetricsSample::new(names::COORDINATION_AVG_RESPONSE_MS, avg_ms));
            }
        }

        if let Some(score) = self.tasks.average_score() {
            samples.push(MetricsSample::new(names::TASK_ASSIGNMENT_SCORE, score));
        }

        let agents = self.agents.all_active();
        let ids: Vec<AgentId> = agents.iter().map(|a| a.id).collect();
        let balanced = self.tasks.workload_balanced(&ids);
        samples.push(MetricsSample::new(
            names::TASK_WORKLOAD_BALANCE,
            if balanced { 1.0 } else { 0.0 },
        ));

        self.events.publish(Event::Metrics(samples));
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn break_vote_tie(&mut self, id: ProposalId, mode: TiebreakMode, leader_choice: Option<&str>) -> Option<String> {
        let mut rng = self.rng.clone();
        let result = self.voting.break_tie(id, mode, leader_choice, &mut rng);
        self.rng = rng;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_clips_velocity_to_max_speed() {
        let mut swarm = Swarm::new(Config::default(), 1).unwrap();
        let a = swarm.spawn(Vec2::new(0.0, 0.0));
        swarm.spawn(Vec2::new(5.0, 0.0));
        for _ in 0..10 {
            swarm.tick(1.0 / 60.0);
        }
        let agent = swarm.agent(a).unwrap();
        assert!(agent.velocity.magnitude() <= swarm.config.flocking.max_speed + 1e-6);
    }

    #[test]
    fn lone_agent_keeps_zero_force_and_preserves_velocity() {
        let mut swarm = Swarm::new(Config::default(), 1).unwrap();
        let a = swarm.spawn(Vec2::ZERO);
        swarm.tick(1.0 / 60.0);
        let agent = swarm.agent(a).unwrap();
        assert_eq!(agent.velocity, Vec2::ZERO);
    }

    #[test]
    fn formation_request_below_minimum_errors() {
        let mut swarm = Swarm::new(Config::default(), 1).unwrap();
        let a = swarm.spawn(Vec2::ZERO);
        let result = swarm.request_formation(FormationShape::Wedge, vec![a], Vec2::ZERO, 40.0, Vec2::new(1.0, 0.0));
        assert!(result.is_err());
    }

    #[test]
    fn follower_chases_its_fixed_offset_when_the_leader_moves() {
        let mut swarm = Swarm::new(Config::default(), 2).unwrap();
        let leader = swarm.spawn(Vec2::ZERO);
        let follower = swarm.spawn(Vec2::new(50.0, 0.0));
        swarm.set_leader(leader).unwrap();
        // First tick only captures the follower's fixed offset; the leader
        // hasn't moved yet, so there's nothing to correct.
        swarm.tick(1.0 / 60.0);
        assert_eq!(swarm.follower_offsets.get(&follower), Some(&Vec2::new(50.0, 0.0)));

        // Move the leader without touching the follower directly.
        swarm.agents.apply_step(leader, Vec2::new(200.0, 0.0), Vec2::ZERO).unwrap();
        swarm.tick(1.0 / 60.0);

        let follower_agent = swarm.agent(follower).unwrap();
        assert_eq!(follower_agent.behavior, Some(BehaviorTag::Follower));
        // Pulled toward leaderPos + offset = (250, 0), not stuck in place.
        assert!(follower_agent.position.x > 50.0);
    }

    #[test]
    fn leader_succession_on_low_battery() {
        let mut swarm = Swarm::new(Config::default(), 1).unwrap();
        let a = swarm.spawn(Vec2::ZERO);
        let b = swarm.spawn(Vec2::new(10.0, 0.0));
        swarm.agents.set_battery(a, 0.9).unwrap();
        swarm.agents.set_battery(b, 0.9).unwrap();
        swarm.set_leader(a).unwrap();
        swarm.agents.set_battery(a, 0.1).unwrap();
        swarm.tick(1.0);
        assert_eq!(swarm.leader_agent_id, Some(b));
    }
}
