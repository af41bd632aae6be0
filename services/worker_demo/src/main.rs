//! Worker demo entry point
//!
//! Drives the built-in workers through a local actor system:
//! - **counting**: tell `Request` N times, ask `Response`, log the count
//! - **deferred**: fire N concurrent requests through the completion bridge
//! - **scopes**: resolve singleton and prototype actor refs from the registry

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use deferred_actors::{
    register_workers, ActorError, ActorFactory, ActorRef, ActorSystem, BusinessService,
    ComponentContext, ComponentDefinition, ComponentRegistryExt, ConstructorArgs, Identity,
    InMemoryRegistry, Request, RequestHandler, Response, WorkerDescriptor, WorkerMessage,
    COUNTING_WORKER,
};
use deferred_config::{load_config, BridgeSettings, ServiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ASK_TIMEOUT: Duration = Duration::from_secs(1);
const SINGLETON_REF: &str = "singletonWorkerRef";
const PROTOTYPE_REF: &str = "workerRef";

type CounterRef = ActorRef<WorkerMessage, i64>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment overlay from config/environments
    #[arg(short, long)]
    environment: Option<String>,

    /// Requests per flow
    #[arg(short, long, default_value_t = 3)]
    requests: usize,

    /// Which flow to run
    #[arg(short, long, value_enum, default_value_t = Mode::All)]
    mode: Mode,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Counting,
    Deferred,
    Scopes,
    All,
}

impl Mode {
    fn includes(self, other: Mode) -> bool {
        self == Mode::All || self == other
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServiceConfig::load(Some(path.as_path()), args.environment.as_deref())?,
        None => load_config(args.environment.as_deref())?,
    };
    init_tracing(&config.global.log_level, args.json_logs);

    info!("Starting worker demo");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let system = ActorSystem::from_config(&config);
    let registry = Arc::new(InMemoryRegistry::new());
    register_workers(&registry, BusinessService::shared())?;
    let factory = ActorFactory::new(registry.clone());
    register_counter_refs(&registry, &system)?;

    if args.mode.includes(Mode::Counting) {
        run_counting(&system, &factory, args.requests).await?;
    }
    if args.mode.includes(Mode::Deferred) {
        run_deferred(&system, &factory, &config.bridge, args.requests).await?;
    }
    if args.mode.includes(Mode::Scopes) {
        run_scopes(&registry, args.requests).await?;
    }

    system.shutdown().await?;
    info!(stats = ?system.metrics().snapshot(), "Worker demo finished");
    Ok(())
}

fn init_tracing(default_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("worker_demo={0},deferred_actors={0},warn", default_level).into()
    });

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Counter actor refs as registry components, one per scope
fn register_counter_refs(registry: &Arc<InMemoryRegistry>, system: &ActorSystem) -> Result<()> {
    registry.register(
        ComponentDefinition::<CounterRef>::singleton(SINGLETON_REF).constructor(spawn_counter(
            registry,
            system,
            Some("singleton-worker-actor"),
        )),
    )?;
    registry.register(
        ComponentDefinition::<CounterRef>::prototype(PROTOTYPE_REF)
            .constructor(spawn_counter(registry, system, None)),
    )?;
    Ok(())
}

/// Constructor spawning a counting worker. The registry owns the
/// constructor, so it only holds the registry weakly.
fn spawn_counter(
    registry: &Arc<InMemoryRegistry>,
    system: &ActorSystem,
    name: Option<&'static str>,
) -> impl Fn(&ComponentContext<'_>) -> deferred_actors::Result<CounterRef> + Send + Sync + 'static
{
    let registry = Arc::downgrade(registry);
    let system = system.clone();
    move |ctx| {
        let registry = registry.upgrade().ok_or_else(|| {
            ActorError::resolution(ctx.identity().to_string(), "registry dropped")
        })?;
        ActorFactory::new(registry).spawn(
            &system,
            WorkerDescriptor::named(COUNTING_WORKER),
            name.map(str::to_string),
        )
    }
}

async fn run_counting(system: &ActorSystem, factory: &ActorFactory, requests: usize) -> Result<()> {
    let worker: CounterRef = factory
        .spawn(
            system,
            WorkerDescriptor::named(COUNTING_WORKER),
            Some("worker-actor".to_string()),
        )
        .context("Failed to spawn counting worker")?;

    for _ in 0..requests {
        worker.send(Request)?;
    }

    match worker.ask(Response, ASK_TIMEOUT).await {
        Ok(count) => info!("Response: {}", count),
        Err(e) => error!(error = %e, "Failed getting result"),
    }

    system.stop(&worker).await?;
    Ok(())
}

async fn run_deferred(
    system: &ActorSystem,
    factory: &ActorFactory,
    settings: &BridgeSettings,
    requests: usize,
) -> Result<()> {
    let handler = RequestHandler::from_settings(system.clone(), factory.clone(), settings);

    let pending: Vec<_> = (0..requests).map(|_| handler.handle()).collect();
    for outcome in futures::future::join_all(pending).await {
        match outcome {
            Ok(message) => info!("Deferred result: {}", serde_json::to_string(&message)?),
            Err(e) => warn!(error = %e, error_category = e.category(), "Deferred request failed"),
        }
    }
    Ok(())
}

async fn run_scopes(registry: &InMemoryRegistry, requests: usize) -> Result<()> {
    for name in [SINGLETON_REF, PROTOTYPE_REF] {
        let first: CounterRef = registry.resolve(&Identity::name(name), ConstructorArgs::new())?;
        let second: CounterRef = registry.resolve(&Identity::name(name), ConstructorArgs::new())?;

        for _ in 0..requests {
            first.send(Request)?;
        }
        let seen_by_second = second.ask(Response, ASK_TIMEOUT).await?;
        info!(
            component = name,
            same_actor = first.id() == second.id(),
            first = %first.path(),
            second = %second.path(),
            count_seen_by_second = seen_by_second,
            "Resolved counter twice"
        );
    }
    Ok(())
}
