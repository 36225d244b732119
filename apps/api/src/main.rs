use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;
mod state;

use shared_config::{AppConfig, PersistenceBackend};
use shared_database::{InMemoryGateway, SupabaseClient, SupabaseGateway};
use state::AppServices;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting TeddyBridge API server");

    let config = Arc::new(AppConfig::from_env());

    let services = match config.persistence_backend {
        PersistenceBackend::Supabase => {
            let client = Arc::new(SupabaseClient::new(&config));
            AppServices::build(&config, Arc::new(SupabaseGateway::new(client)))
        }
        PersistenceBackend::Memory => {
            warn!("Using in-memory persistence, data is lost on restart");
            AppServices::build(&config, Arc::new(InMemoryGateway::new()))
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = if config.sweeper_enabled {
        Some(services.sweeper.clone().spawn(shutdown_rx))
    } else {
        info!("Missed-meeting sweeper disabled");
        None
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config.clone(), services)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            warn!("Sweeper task ended abnormally: {}", e);
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
