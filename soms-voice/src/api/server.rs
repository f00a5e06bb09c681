//! HTTP server setup and routing

use crate::error::{Error, Result};
use crate::producers::SpeechClient;
use crate::scheduler::PlaybackScheduler;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub scheduler: PlaybackScheduler,
    pub speech: SpeechClient,
    pub port: u16,
}

/// Build the router with all routes attached
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Scheduler control
        .route("/audio/status", get(super::handlers::get_status))
        .route("/audio/enabled", get(super::handlers::get_enabled))
        .route("/audio/enabled", post(super::handlers::set_enabled))
        .route("/audio/enqueue", post(super::handlers::enqueue))
        .route("/audio/speak", post(super::handlers::speak))
        .route("/audio/rejection", post(super::handlers::play_rejection))
        .route("/audio/tasks/completed", post(super::handlers::task_completed))
        .route("/audio/clear", post(super::handlers::clear_queue))
        .route("/audio/devices", get(super::handlers::list_audio_devices))

        // SSE streams
        .route("/audio/enabled/stream", get(super::sse::enabled_stream))
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local dashboard access
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
