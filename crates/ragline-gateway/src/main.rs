// Ragline gateway server
//
// Receives LINE webhook deliveries, dispatches one workflow execution per
// message event, and answers the delivery as soon as dispatch concludes.

mod webhook;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ragline_bedrock::{GenerationConfig, RetrieveAndGenerateClient};
use ragline_core::SessionStore;
use ragline_line::{LineConfig, LineMessagingClient};
use ragline_storage::{Database, MemorySessionStore, PgSessionStore};
use ragline_worker::{EventDispatcher, WorkflowExecutor};

use webhook::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragline_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ragline-gateway starting...");

    let line_config = LineConfig::from_env().context("LINE channel configuration")?;
    let generation_config = GenerationConfig::from_env().context("generation configuration")?;

    // Session store: Postgres when configured, in-memory otherwise
    let sessions: Arc<dyn SessionStore> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let db = Database::from_url(&database_url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");
            Arc::new(PgSessionStore::new(db))
        }
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, using in-memory session store (sessions do not survive restarts)"
            );
            Arc::new(MemorySessionStore::new())
        }
    };

    let messaging = Arc::new(LineMessagingClient::new(&line_config));
    let generator = Arc::new(RetrieveAndGenerateClient::new(generation_config));

    let deadline = std::env::var("EXECUTION_DEADLINE_SECS")
        .ok()
        .and_then(|value| value.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(27));
    let retention = EventDispatcher::retention_from_env();
    tracing::info!(
        deadline_secs = deadline.as_secs(),
        dedup_retention_secs = retention.as_secs(),
        "Workflow orchestration configured"
    );

    let executor = Arc::new(
        WorkflowExecutor::new(sessions, generator, messaging.clone()).with_deadline(deadline),
    );
    let dispatcher = Arc::new(EventDispatcher::with_retention(executor, retention));

    let state = AppState {
        dispatcher,
        messaging,
        channel_secret: line_config.channel_secret.clone(),
    };

    let app = Router::new()
        .route("/health", get(health))
        .merge(webhook::routes(state))
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
