//! Gemini Chat - persona-driven chat page over a streaming LLM
//!
//! Serves a single page, keeps one in-memory session per client and
//! streams model replies to the browser as they arrive.

mod api;
mod config;
mod llm;
mod runtime;
mod session;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{GeminiService, LoggingService};
use runtime::{SessionLifetimes, SessionManager, TurnController};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; variables may come from the environment
    let dotenv_path = dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    if let Some(path) = dotenv_path {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    // Configuration
    let config = AppConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Configuration error");
    })?;

    // Initialize LLM client
    let gemini = GeminiService::new(
        config.api_key.clone(),
        &config.model,
        &config.api_base,
        config.request_timeout,
    )
    .inspect_err(|e| {
        tracing::error!(error = %e, "Error initializing Gemini client");
    })?;
    let llm = Arc::new(LoggingService::new(Arc::new(gemini)));

    tracing::info!(model = %config.model, "LLM client initialized");

    // Create application state
    let state = AppState::new(
        Arc::new(SessionManager::new(
            config.default_instruction.clone(),
            SessionLifetimes {
                disconnect_grace: config.session_grace,
                idle_timeout: config.session_idle_timeout,
            },
        )),
        Arc::new(TurnController::new(llm)),
    );

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // SSE responses are excluded by tower-http's default compression predicate
    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Gemini chat listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
