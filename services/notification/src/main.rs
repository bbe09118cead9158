//! Notification service binary: `service`, `worker` and `migrate`
//! subcommands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use emporium_amqp::{AmqpEventBus, AmqpIngress, AmqpTaskServer, AmqpTaskTransport};
use emporium_core::clock::SystemClock;
use emporium_postgres::{Migrator, OutboxRelay, PgUnitOfWork, PgWorkflowRunStore};
use emporium_workflow::WorkflowClient;

use emporium_notification::app::{NotificationAppService, UserProjectionService};
use emporium_notification::config::Config;
use emporium_notification::infrastructure::repository::PgNotificationProvider;
use emporium_notification::infrastructure::{activities, api, ingress, migrations};

#[derive(Parser)]
#[command(name = "notification-service", about = "Notification bounded context")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API, outbox relay and event ingress.
    Service,
    /// Run the workflow worker.
    Worker,
    /// Apply schema migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    match cli.command {
        Command::Service => run_service(config).await,
        Command::Worker => run_worker(config).await,
        Command::Migrate => run_migrate(config).await,
    }
}

async fn run_migrate(config: Config) -> anyhow::Result<()> {
    let pool = emporium_postgres::connect(&config.postgres)
        .await
        .context("connect to database")?;
    let applied = Migrator::new(pool)
        .apply(&migrations::migrations())
        .await
        .context("apply migrations")?;
    info!(applied, "migrations applied");
    Ok(())
}

async fn run_service(config: Config) -> anyhow::Result<()> {
    let pool = emporium_postgres::connect(&config.postgres)
        .await
        .context("connect to database")?;
    Migrator::new(pool.clone())
        .apply(&migrations::migrations())
        .await
        .context("apply migrations")?;

    let connection = Arc::new(
        emporium_amqp::connect(&config.amqp)
            .await
            .context("connect to broker")?,
    );
    let bus = Arc::new(
        AmqpEventBus::new(&connection, &config.amqp.exchange)
            .await
            .context("declare event exchange")?,
    );

    let transport = AmqpTaskTransport::new(&connection)
        .await
        .context("create task transport")?;
    let runs = Arc::new(PgWorkflowRunStore::new(pool.clone()));
    let workflow_client = Arc::new(WorkflowClient::new(transport, runs));

    let (shutdown_tx, _) = broadcast::channel(1);
    let relay = OutboxRelay::new(
        pool.clone(),
        bus,
        Duration::from_millis(config.outbox.poll_interval_ms),
        config.outbox.batch_size,
        shutdown_tx.subscribe(),
    )
    .spawn();
    let consumer = AmqpIngress::new(
        Arc::clone(&connection),
        config.amqp.clone(),
        Arc::new(ingress::event_router(workflow_client)),
        shutdown_tx.subscribe(),
    )
    .spawn();

    let app = api::router();
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "notification service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    let _ = shutdown_tx.send(());
    let _ = tokio::join!(relay, consumer);
    Ok(())
}

async fn run_worker(config: Config) -> anyhow::Result<()> {
    let pool = emporium_postgres::connect(&config.postgres)
        .await
        .context("connect to database")?;
    Migrator::new(pool.clone())
        .apply(&migrations::migrations())
        .await
        .context("apply migrations")?;

    let connection = Arc::new(
        emporium_amqp::connect(&config.amqp)
            .await
            .context("connect to broker")?,
    );
    let transport = AmqpTaskTransport::new(&connection)
        .await
        .context("create task transport")?;
    let runs = Arc::new(PgWorkflowRunStore::new(pool.clone()));

    let uow = PgUnitOfWork::<PgNotificationProvider>::new(pool);
    let notifications = Arc::new(NotificationAppService::new(
        uow.clone(),
        Arc::new(SystemClock),
    ));
    let users = Arc::new(UserProjectionService::new(uow));

    let worker = Arc::new(activities::build_worker(
        notifications,
        users,
        transport,
        runs,
    ));
    let resumed = worker.resume_unfinished().await?;
    if resumed > 0 {
        info!(resumed, "resumed unfinished workflow runs");
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let server = AmqpTaskServer::new(connection, worker, config.amqp.prefetch, shutdown_rx);

    tokio::select! {
        result = server.run() => result.context("task worker")?,
        () = shutdown_signal() => {
            let _ = shutdown_tx.send(());
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
