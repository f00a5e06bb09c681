//! HTTP request handlers
//!
//! Requests dropped because audio is disabled are answered with
//! `202 Accepted` and `"accepted": false`; that is backpressure, not an error.

use crate::api::server::AppContext;
use crate::audio::output;
use crate::producers::random_accept_phrase;
use crate::scheduler::{EnqueueOutcome, SchedulerStatus};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use soms_common::{AudioPriority, MediaRef};
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnabledBody {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    media_ref: String,
    /// Level (0-2) or name; anything else plays at the lowest precedence
    #[serde(default)]
    priority: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub accepted: bool,
    pub status: String,
    pub item_id: Option<Uuid>,
    pub priority: AudioPriority,
}

#[derive(Debug, Deserialize)]
pub struct TaskCompletedRequest {
    #[serde(default)]
    task_id: Option<i64>,
    completion_audio_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpeakRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    priority: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProducerResponse {
    pub accepted: bool,
    pub priority: AudioPriority,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub dropped: usize,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    devices: Vec<String>,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "soms-voice".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: ctx.port,
    })
}

// ============================================================================
// Scheduler Endpoints
// ============================================================================

/// GET /audio/status - enabled flag, in-flight clip and pending queue
pub async fn get_status(State(ctx): State<AppContext>) -> Json<SchedulerStatus> {
    Json(ctx.scheduler.status())
}

/// GET /audio/enabled
pub async fn get_enabled(State(ctx): State<AppContext>) -> Json<EnabledBody> {
    Json(EnabledBody {
        enabled: ctx.scheduler.is_enabled(),
    })
}

/// POST /audio/enabled
pub async fn set_enabled(
    State(ctx): State<AppContext>,
    Json(req): Json<EnabledBody>,
) -> Json<EnabledBody> {
    ctx.scheduler.set_enabled(req.enabled);
    Json(EnabledBody {
        enabled: ctx.scheduler.is_enabled(),
    })
}

/// POST /audio/enqueue - queue a playable locator
pub async fn enqueue(
    State(ctx): State<AppContext>,
    Json(req): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), ApiError> {
    let locator = req.media_ref.trim();
    if locator.is_empty() {
        return Err(bad_request("media_ref must not be empty"));
    }

    let priority = AudioPriority::from_json_lenient(req.priority.as_ref());
    let outcome = ctx.scheduler.enqueue(MediaRef::new(locator), priority);
    Ok(enqueue_response(outcome, priority))
}

/// POST /audio/tasks/completed - play a task's completion clip
///
/// Always user-action priority. Relative URLs are resolved against the
/// backend.
pub async fn task_completed(
    State(ctx): State<AppContext>,
    Json(req): Json<TaskCompletedRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), ApiError> {
    let locator = req.completion_audio_url.trim();
    if locator.is_empty() {
        return Err(bad_request("completion_audio_url must not be empty"));
    }

    if let Some(task_id) = req.task_id {
        info!("Task {} completed, playing completion clip", task_id);
    }
    let media_ref = MediaRef::new(locator).resolve_against(ctx.speech.base_url());
    let outcome = ctx.scheduler.enqueue(media_ref, AudioPriority::UserAction);
    Ok(enqueue_response(outcome, AudioPriority::UserAction))
}

fn enqueue_response(
    outcome: EnqueueOutcome,
    priority: AudioPriority,
) -> (StatusCode, Json<EnqueueResponse>) {
    let (code, status) = match outcome {
        EnqueueOutcome::Queued(_) => (StatusCode::OK, "queued"),
        EnqueueOutcome::Overflowed(_) => (StatusCode::OK, "evicted"),
        EnqueueOutcome::Disabled => (StatusCode::ACCEPTED, "disabled"),
    };

    (
        code,
        Json(EnqueueResponse {
            accepted: outcome.is_queued(),
            status: status.to_string(),
            item_id: outcome.item_id(),
            priority,
        }),
    )
}

/// POST /audio/speak - synthesize text and queue the result
///
/// Without `text` a random acknowledgement line is spoken. Defaults to
/// user-action priority.
pub async fn speak(
    State(ctx): State<AppContext>,
    body: Option<Json<SpeakRequest>>,
) -> (StatusCode, Json<ProducerResponse>) {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let priority = match req.priority.as_ref() {
        None | Some(serde_json::Value::Null) => AudioPriority::UserAction,
        Some(value) => AudioPriority::from_json_lenient(Some(value)),
    };
    let text = req
        .text
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| random_accept_phrase().to_string());

    info!("Speak request at {}: {}", priority, text);
    let accepted = ctx.speech.speak(&ctx.scheduler, text, priority).is_some();
    producer_response(accepted, priority)
}

/// POST /audio/rejection - queue a random rejection clip
pub async fn play_rejection(State(ctx): State<AppContext>) -> (StatusCode, Json<ProducerResponse>) {
    let accepted = ctx.speech.play_rejection(&ctx.scheduler).is_some();
    producer_response(accepted, AudioPriority::UserAction)
}

fn producer_response(accepted: bool, priority: AudioPriority) -> (StatusCode, Json<ProducerResponse>) {
    (
        StatusCode::ACCEPTED,
        Json(ProducerResponse { accepted, priority }),
    )
}

/// POST /audio/clear - drop pending clips, keep the one playing
pub async fn clear_queue(State(ctx): State<AppContext>) -> Json<ClearResponse> {
    Json(ClearResponse {
        dropped: ctx.scheduler.clear(),
    })
}

/// GET /audio/devices - list output devices
pub async fn list_audio_devices() -> Result<Json<DeviceListResponse>, ApiError> {
    match tokio::task::spawn_blocking(output::list_devices).await {
        Ok(Ok(devices)) => Ok(Json(DeviceListResponse { devices })),
        Ok(Err(e)) => {
            error!("Failed to list audio devices: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Device listing task failed: {}", e),
            }),
        )),
    }
}
