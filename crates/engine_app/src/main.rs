//! # engine_app — scheduler demo
//!
//! Registers a small movement/physics/AI/render set of systems, prints the
//! resulting task graph as JSON and Graphviz DOT, then runs a bounded number
//! of fixed-timestep ticks.
//!
//! Worker count and stall watchdog come from `ENGINE_WORKER_THREADS` and
//! `ENGINE_STALL_TIMEOUT_MS`; log levels from `RUST_LOG`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use engine_app::{Scheduler, SchedulerConfig, TickConfig, TickLoop};
use engine_component::{Archetype, Component, ComponentRegistry, codec};
use engine_system::{FnSystem, SystemConfig, TickContext};

struct Position;
struct Velocity;
struct Health;
struct AiState;
struct Transform;

impl Component for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

impl Component for Health {
    fn type_name() -> &'static str {
        "Health"
    }
}

impl Component for AiState {
    fn type_name() -> &'static str {
        "AiState"
    }
}

impl Component for Transform {
    fn type_name() -> &'static str {
        "Transform"
    }
}

fn logging_system(
    name: &'static str,
    archetype: Archetype,
    frames: Arc<AtomicU64>,
) -> FnSystem<impl Fn(&TickContext) + Send + Sync + 'static> {
    FnSystem::new(SystemConfig::new(name, archetype), move |ctx| {
        frames.fetch_add(1, Ordering::Relaxed);
        debug!(system = name, tick_id = ctx.tick_id, dt = ctx.delta_time, "system tick");
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let registry = ComponentRegistry::new();
    registry.register::<Position>();
    registry.register::<Velocity>();
    registry.register::<Health>();
    registry.register::<AiState>();
    registry.register::<Transform>();

    let config = SchedulerConfig::from_env()?;
    let mut scheduler = Scheduler::new(config)?;
    let frames = Arc::new(AtomicU64::new(0));

    let systems = [
        ("physics", Archetype::new().write::<Velocity>().read::<Position>()),
        ("movement", Archetype::new().read::<Velocity>().write::<Position>()),
        ("ai", Archetype::new().read::<Position>().write::<AiState>()),
        ("regen", Archetype::new().write::<Health>()),
        ("transform_sync", Archetype::new().read::<Position>().write::<Transform>()),
        ("render", Archetype::new().read::<Transform>().read::<Health>()),
    ];
    for (name, archetype) in systems {
        scheduler.register_system(logging_system(name, archetype, Arc::clone(&frames)));
    }

    // Archetypes persist as type ids only; check the render archetype
    // survives a trip through the registry.
    if let Some(render) = scheduler.systems().last() {
        let bytes = codec::encode(&render.archetype)?;
        let decoded = codec::decode(&bytes, &registry)?;
        info!(archetype = %decoded, bytes = bytes.len(), "render archetype round-tripped");
    }

    println!("{}", serde_json::to_string_pretty(&scheduler.snapshot())?);
    println!("{}", scheduler.to_dot());

    let tick_config = TickConfig {
        tick_rate: 60.0,
        max_ticks: 120,
    };
    let mut tick_loop = TickLoop::new(tick_config, scheduler);
    tick_loop.run()?;

    info!(
        ticks = tick_loop.tick_count(),
        system_ticks = frames.load(Ordering::Relaxed),
        "scheduler demo finished"
    );
    Ok(())
}
