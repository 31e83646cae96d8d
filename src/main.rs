//! Liquid Gateway - sharded Discord gateway
//!
//! This binary:
//! - Runs a pool of shard connections in one process
//! - Forwards selected dispatches to NATS JetStream
//! - Exposes health/ready endpoints for Kubernetes
//! - Exports Prometheus metrics for observability

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use liquid_gateway::client::{Client, ClientOptions};
use liquid_gateway::config::GatewayConfig;
use liquid_gateway::events::{chain, EventHandler, EventRegistry, GuildTracker};
use liquid_gateway::health::{self, AppState};
use liquid_gateway::metrics::{self, GatewayMetrics};
use liquid_gateway::nats::{NatsForwarder, NatsPublisher};
use liquid_gateway::shard::{self, pool_shard_range, ShardPool, ShardState};
use liquid_gateway::transport::WebSocketConnector;

/// Time shards get to close cleanly on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level
    let gateway_config = GatewayConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("liquid_gateway={}", gateway_config.log_level).parse()?)
                .add_directive("async_nats=warn".parse()?),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pool_id = gateway_config.pool_id,
        total_shards = gateway_config.total_shards,
        development = gateway_config.development,
        "Starting Liquid Gateway"
    );

    let recorder = match GatewayMetrics::install() {
        Ok(recorder) => {
            info!("Prometheus metrics initialized");
            Some(recorder)
        }
        Err(e) => {
            warn!(error = %e, "Metrics disabled");
            None
        }
    };

    // Connect to NATS if configured
    let nats = match gateway_config.nats_url {
        Some(ref url) => connect_nats(url).await,
        None => {
            info!("No NATS_URL configured - running in local mode");
            None
        }
    };

    let registry = Arc::new(build_registry(&gateway_config, nats.clone())?);

    let options: ClientOptions = gateway_config.client_options();
    info!(intents = ?options.intents, "Using Discord intents");

    let shard_ids = pool_shard_range(gateway_config.pool_id, gateway_config.total_shards);
    let state = ShardState::new(gateway_config.pool_id, shard_ids, gateway_config.total_shards);
    let client = Client::new(options, state);

    let pool = ShardPool::new(client, registry, Arc::new(WebSocketConnector))?;
    let pool_state = pool.state();
    let handles = pool.handles();
    info!(
        pool_id = gateway_config.pool_id,
        shard_count = pool_state.shard_count(),
        "Shard pool created"
    );

    // Start health server
    let app_state = AppState {
        shard_state: pool_state,
        nats: nats.clone(),
        metrics: recorder,
    };

    let health_router = health::router(app_state);
    let addr: SocketAddr = ([0, 0, 0, 0], gateway_config.http_port).into();

    info!(port = gateway_config.http_port, "Starting HTTP server");

    let http_server = axum::serve(tokio::net::TcpListener::bind(addr).await?, health_router);
    let mut pool_task = tokio::spawn(pool.run());

    tokio::select! {
        result = &mut pool_task => {
            if let Err(e) = result {
                error!(error = %e, "Shard pool task failed");
            }
        }
        result = http_server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // Graceful shutdown
    info!("Shutting down gateway...");

    shard::shutdown(&handles, SHUTDOWN_GRACE).await;
    if !pool_task.is_finished() {
        pool_task.abort();
    }

    if let Some(ref nats) = nats {
        nats.close().await;
    }

    info!("Gateway shutdown complete");
    Ok(())
}

async fn connect_nats(url: &str) -> Option<Arc<NatsPublisher>> {
    let publisher = match NatsPublisher::connect(url).await {
        Ok(publisher) => publisher,
        Err(e) => {
            error!(error = %e, "Failed to connect to NATS - running in local mode");
            metrics::set_nats_connected(false);
            return None;
        }
    };

    if let Err(e) = publisher.ensure_streams().await {
        warn!(error = %e, "Could not configure NATS streams");
    }

    info!(url, "Connected to NATS");
    metrics::set_nats_connected(true);
    Some(publisher)
}

/// Guild tracking always runs; forwarding only with a NATS connection.
fn build_registry(
    config: &GatewayConfig,
    nats: Option<Arc<NatsPublisher>>,
) -> Result<EventRegistry> {
    let mut registry = EventRegistry::default();

    let tracker: Arc<dyn EventHandler> = GuildTracker::new();
    registry.register_all(GuildTracker::EVENTS, Arc::clone(&tracker))?;

    if let Some(publisher) = nats {
        let forwarder: Arc<dyn EventHandler> = NatsForwarder::new(publisher);
        for name in &config.forward_events {
            let handler = if GuildTracker::EVENTS.contains(&name.as_str()) {
                chain(vec![Arc::clone(&tracker), Arc::clone(&forwarder)])
            } else {
                Arc::clone(&forwarder)
            };
            registry.register(name.as_str(), handler)?;
        }
    }

    info!(handlers = ?registry.names(), "Event handlers registered");
    Ok(registry)
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
