//! Feedcast Server
//!
//! One binary, three roles: the `feed` service writes feeds and publishes
//! `FeedCreated`, the `query` service lists and searches them, and the
//! `pusher` service streams new feeds to WebSocket clients.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::{Parser, Subcommand};
use config::{ConfigLoader, LoadedConfig, get_database_url};
use feedcast_core::broker::NatsBroker;
use feedcast_core::events::{BrokerEventStore, EventStore, FeedCreated};
use feedcast_core::framework::DatabaseProcessor;
use feedcast_core::processors::{FeedPusher, SearchIndexer, broadcast_hub};
use feedcast_core::search::{ElasticSearchRepository, SearchRepository};
use server::{feed_router, pusher_router, query_router, run_server};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use state::{FeedState, PusherState, QueryState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

type EventStoreImpl = BrokerEventStore<NatsBroker>;

/// Feedcast - CQRS feed services over NATS
#[derive(Parser, Debug)]
#[command(name = "feedcast-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./feedcast.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override the NATS server URL (e.g., nats://localhost:4222)
    #[arg(long, env = "NATS_ADDRESS")]
    nats: Option<String>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    #[command(subcommand)]
    role: Role,
}

/// Which service this process runs.
#[derive(Subcommand, Debug, Clone, Copy)]
enum Role {
    /// Write side: `POST /feeds`
    Feed,
    /// Read side: `GET /feeds`, `GET /feeds/search`, search indexing
    Query,
    /// Real-time side: `GET /ws`
    Pusher,
}

/// Everything a running role owns besides the event store.
struct Service {
    router: axum::Router,
    db_pool: Option<PgPool>,
    background: Vec<JoinHandle<()>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!(
        role = ?args.role,
        "Starting feedcast-server v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen, args.nats.clone());
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Connect to the broker; there is no retry
    tracing::info!("Connecting to NATS at {}...", config.nats_address);
    let store = Arc::new(
        EventStoreImpl::connect(&config.nats_address)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to NATS: {}", e);
                e
            })?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let service = match args.role {
        Role::Feed => start_feed(&args, store.clone()).await,
        Role::Query => start_query(&args, &config, store.clone()).await,
        Role::Pusher => start_pusher(store.clone(), shutdown_rx).await,
    };
    let service = match service {
        Ok(service) => service,
        Err(e) => {
            store.close().await;
            return Err(e);
        }
    };

    // Run the server
    tracing::info!("Starting HTTP server on {}", config.listen);
    let result = run_server(service.router, config.listen).await;

    // Stop processors, then the subscriptions feeding them
    shutdown_tx.send_replace(true);
    store.close().await;
    for task in service.background {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Background task failed");
        }
    }

    // Close database connections gracefully
    if let Some(db_pool) = service.db_pool {
        tracing::info!("Closing database connections...");
        db_pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

async fn start_feed(args: &Args, store: Arc<EventStoreImpl>) -> anyhow::Result<Service> {
    let db_pool = connect_database(args.migrate).await?;
    let state = FeedState {
        db: DatabaseProcessor::new(db_pool.clone()),
        events: store,
    };
    Ok(Service {
        router: feed_router(state),
        db_pool: Some(db_pool),
        background: Vec::new(),
    })
}

async fn start_query(
    args: &Args,
    config: &LoadedConfig,
    store: Arc<EventStoreImpl>,
) -> anyhow::Result<Service> {
    let search_url = config.require_elasticsearch()?.clone();
    let db_pool = connect_database(args.migrate).await?;

    let search: Arc<dyn SearchRepository> = Arc::new(ElasticSearchRepository::new(search_url));
    store
        .subscribe_push::<FeedCreated, _>(SearchIndexer::new(search.clone()))
        .await?;
    tracing::info!("SearchIndexer subscribed");

    let state = QueryState {
        db: DatabaseProcessor::new(db_pool.clone()),
        search,
    };
    Ok(Service {
        router: query_router(state),
        db_pool: Some(db_pool),
        background: Vec::new(),
    })
}

async fn start_pusher(
    store: Arc<EventStoreImpl>,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<Service> {
    let (hub, handle) = broadcast_hub();
    let hub_task = tokio::spawn(hub.run(shutdown_rx));

    store
        .subscribe_push::<FeedCreated, _>(FeedPusher::new(handle.clone()))
        .await?;
    tracing::info!("FeedPusher subscribed");

    Ok(Service {
        router: pusher_router(PusherState { hub: handle }),
        db_pool: None,
        background: vec![hub_task],
    })
}

/// Connect to Postgres using `DATABASE_URL`, running migrations if asked.
async fn connect_database(migrate: bool) -> anyhow::Result<PgPool> {
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    Ok(db_pool)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,async_nats=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
