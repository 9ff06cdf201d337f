//! conduit-bus - a durable, lease-based, multi-queue message bus for local
//! agentic runtimes.
//!
//! This is the main entry point for the standalone bus server: it wires
//! up the store, router, and one consumer per queue, then runs until
//! interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use conduit_bus::config::BusConfig;
use conduit_bus::consult::ConsultPlannerManager;
use conduit_bus::consumer::ConsumerRuntime;
use conduit_bus::consumer::executor::ExecutorConsumer;
use conduit_bus::consumer::planner::PlannerConsumer;
use conduit_bus::consumer::router_consumer::RouterConsumer;
use conduit_bus::database::{DatabaseConfig, DatabaseConnection, DatabasePath};
use conduit_bus::orchestrator::Orchestrator;
use conduit_bus::roles::{DemoExecutorRole, DemoPlannerRole, DemoRouterRole};
use conduit_bus::store::SqliteStore;
use conduit_bus::time_provider::production_time_provider;
use conduit_bus::{Router, Store};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("conduit_bus=info".parse()?),
        )
        .init();

    info!("Starting conduit-bus message bus");

    let config = BusConfig::load()?;
    info!(db_path = %config.db_path.display(), "configuration loaded");

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

    info!("all consumer loops started, awaiting shutdown signal");
    tokio::signal::ctrl_c().await?;

    info!("shutdown signal received, stopping consumer loops");
    orchestrator.stop().await?;

    info!("conduit-bus shut down cleanly");
    Ok(())
}
