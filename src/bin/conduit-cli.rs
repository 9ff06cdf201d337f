//! conduit-cli - demonstrates the bridge's public surface end to end.
//!
//! Initializes the store, wires the demo role adapters, starts one
//! consumer loop per queue, dispatches a single user turn, and prints
//! whatever `agent_response` comes back (spec §4.8/§6.3 component 13).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use conduit_bus::bridge::QueueBridge;
use conduit_bus::config::BusConfig;
use conduit_bus::consult::ConsultPlannerManager;
use conduit_bus::consumer::ConsumerRuntime;
use conduit_bus::consumer::executor::ExecutorConsumer;
use conduit_bus::consumer::planner::PlannerConsumer;
use conduit_bus::consumer::router_consumer::RouterConsumer;
use conduit_bus::database::{DatabaseConfig, DatabaseConnection, DatabasePath};
use conduit_bus::domain_types::TraceId;
use conduit_bus::orchestrator::Orchestrator;
use conduit_bus::roles::{DemoExecutorRole, DemoPlannerRole, DemoRouterRole};
use conduit_bus::store::SqliteStore;
use conduit_bus::time_provider::production_time_provider;
use conduit_bus::{Router, Store};

/// conduit-cli - send one turn through the message bus and print the reply.
#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// The user message to dispatch.
    message: String,

    /// Path to the `SQLite` database file.
    #[arg(long, default_value = "conduit-cli.db")]
    db_path: std::path::PathBuf,

    /// Seconds to wait for a response before giving up.
    #[arg(long, default_value_t = 30)]
    timeout_s: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = BusConfig {
        db_path: args.db_path,
        ..BusConfig::default()
    };

    let db_path = DatabasePath::new(config.db_path.clone())?;
    let connection = DatabaseConnection::initialize(DatabaseConfig::new(db_path)).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(connection));
    store.requeue_expired().await?;

    let router = Router::new(Arc::clone(&store));
    let consult = Arc::new(ConsultPlannerManager::new(
        Arc::clone(&store),
        router.clone(),
        config.consult_poll_interval_ms.as_duration(),
    ));

    let lease_duration = config.lease_duration.as_duration();
    let max_attempts = config.max_attempts.into_inner();

    let router_runtime = Arc::new(ConsumerRuntime::new(
        Arc::clone(&store),
        router.clone(),
        RouterConsumer::new(DemoRouterRole),
        max_attempts,
        lease_duration,
    ));
    let planner_runtime = Arc::new(ConsumerRuntime::new(
        Arc::clone(&store),
        router.clone(),
        PlannerConsumer::new(DemoPlannerRole),
        max_attempts,
        lease_duration,
    ));
    let executor_runtime = Arc::new(ConsumerRuntime::new(
        Arc::clone(&store),
        router.clone(),
        ExecutorConsumer::new(
            DemoExecutorRole,
            Arc::clone(&consult),
            Duration::from_secs(config.consult_timeout_s),
        ),
        max_attempts,
        lease_duration,
    ));

    let mut orchestrator = Orchestrator::new();
    let poll_interval = config.poll_interval_ms.as_duration();
    let time_provider = production_time_provider();
    orchestrator.spawn(router_runtime, poll_interval, Arc::clone(&time_provider));
    orchestrator.spawn(planner_runtime, poll_interval, Arc::clone(&time_provider));
    orchestrator.spawn(executor_runtime, poll_interval, time_provider);

    let bridge = QueueBridge::new(
        Arc::clone(&store),
        router,
        config.collect_poll_interval_ms.as_duration(),
    );
    let trace_id = TraceId::generate();
    bridge
        .dispatch_turn(&args.message, trace_id, None, None, None, None)
        .await?;

    match bridge
        .collect_response(trace_id, Duration::from_secs(args.timeout_s))
        .await?
    {
        Some(response) => println!("{}", response.payload_str("text")),
        None => eprintln!("no response within {}s", args.timeout_s),
    }

    orchestrator.stop().await?;
    Ok(())
}
