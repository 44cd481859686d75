//! swarm-harness: a thin CLI for driving `swarmcore::Swarm` standalone.
//!
//! Spawns a flock, optionally requests a formation, ticks it for a fixed
//! duration, and prints the running-average metrics collected along the way.
//! Useful for poking at the core from a shell without writing a host
//! application first.

use clap::{Parser, ValueEnum};
use std::sync::{Arc, Mutex};
use swarmcore::event::EventKind;
use swarmcore::formation::FormationShape;
use swarmcore::metrics::{names, MetricsSample, RunningAverageSink};
use swarmcore::{Config, Event, Swarm, Vec2};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swarm-harness")]
#[command(about = "Run a swarmcore simulation from the command line")]
#[command(version)]
struct Args {
    /// Number of agents to spawn in a horizontal line.
    #[arg(short, long, default_value = "8")]
    agents: u32,

    /// Number of ticks to run.
    #[arg(short, long, default_value = "600")]
    ticks: u32,

    /// Fixed timestep in seconds.
    #[arg(long, default_value = "0.0166667")]
    dt: f64,

    /// Deterministic RNG seed.
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Request this formation shape for the spawned agents once running.
    #[arg(long, value_enum)]
    formation: Option<FormationArg>,

    /// Spacing between formation slots, in position units.
    #[arg(long, default_value = "40.0")]
    spacing: f64,

    /// Dump every collected metrics sample as JSON instead of printing
    /// running averages.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormationArg {
    Line,
    Wedge,
    Circle,
    Column,
    Diamond,
}

impl From<FormationArg> for FormationShape {
    fn from(value: FormationArg) -> Self {
        match value {
            FormationArg::Line => FormationShape::Line,
            FormationArg::Wedge => FormationShape::Wedge,
            FormationArg::Circle => FormationShape::Circle,
            FormationArg::Column => FormationShape::Column,
            FormationArg::Diamond => FormationShape::Diamond,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut swarm = Swarm::new(Config::default(), args.seed)?;
    let ids: Vec<_> = (0..args.agents)
        .map(|i| swarm.spawn(Vec2::new(i as f64 * 30.0, 0.0)))
        .collect();
    info!(count = args.agents, "spawned agents");

    if let Some(shape) = args.formation {
        let formation_id = swarm.request_formation(
            shape.into(),
            ids.clone(),
            Vec2::new(args.agents as f64 * 15.0, 0.0),
            args.spacing,
            Vec2::new(1.0, 0.0),
        )?;
        info!(formation_id, "requested formation");
    }

    let collected: Arc<Mutex<Vec<MetricsSample>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_handle = collected.clone();
    swarm.subscribe(
        EventKind::Metrics,
        Box::new(move |event| {
            if let Event::Metrics(batch) = event {
                sink_handle.lock().unwrap().extend(batch.iter().cloned());
            }
        }),
    );

    for tick in 0..args.ticks {
        swarm.tick(args.dt);
        if tick % 60 == 0 {
            info!(tick, "tick");
        }
    }

    let samples: Vec<MetricsSample> = collected.lock().unwrap().drain(..).collect();

    if args.json {
        #[cfg(feature = "serde")]
        {
            println!("{}", serde_json::to_string_pretty(&samples)?);
            return Ok(());
        }
        #[cfg(not(feature = "serde"))]
        {
            return Err("--json requires the `serde` feature".into());
        }
    }

    let mut sink = RunningAverageSink::new();
    for sample in samples {
        sink.record(sample);
    }
    for name in [
        names::FLOCKING_COHESION,
        names::FLOCKING_SEPARATION_SAFETY,
        names::FLOCKING_ALIGNMENT,
        names::FORMATION_ACCURACY,
        names::TASK_WORKLOAD_BALANCE,
    ] {
        if let Some(avg) = sink.average(name) {
            println!("{name} = {avg:.4}");
        }
    }

    Ok(())
}
