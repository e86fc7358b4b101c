//! HTTP surface (axum).
//!
//! | method | path                 |                                   |
//! |--------|----------------------|-----------------------------------|
//! | GET    | `/`                  | banner                            |
//! | POST   | `/generate`          | submit a prompt                   |
//! | GET    | `/status/:task_id`   | task snapshot                     |
//! | GET    | `/health`            | service health                    |
//! | POST   | `/events/message`    | push-mode message ingest          |

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::app::{Bridge, HealthView, SubmitOutcome, TaskView};
use crate::domain::{BridgeError, ErrorKind, InboundMessage, TaskId, TaskStatus};

/// Header carrying the shared secret for `/events/message`.
pub const SECRET_HEADER: &str = "x-courier-secret";

pub struct ApiState {
    pub bridge: Arc<Bridge>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub task_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate))
        .route("/status/:task_id", get(status))
        .route("/health", get(health))
        .route("/events/message", post(ingest))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> &'static str {
    "courier is running"
}

async fn generate(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    let outcome = state
        .bridge
        .generate(&request.prompt, request.task_id.as_deref())
        .await?;

    let task = outcome.task();
    let (code, message, error) = match &outcome {
        SubmitOutcome::Accepted { task } => (
            StatusCode::ACCEPTED,
            Some(format!("prompt submitted; poll /status/{}", task.id)),
            None,
        ),
        SubmitOutcome::Rejected { status, detail, .. } => (
            StatusCode::BAD_GATEWAY,
            None,
            Some(format!("upstream returned {status}: {detail}")),
        ),
        SubmitOutcome::TransportFailed { detail, .. } => {
            (StatusCode::BAD_GATEWAY, None, Some(detail.clone()))
        }
        SubmitOutcome::TimedOut { task } => (StatusCode::GATEWAY_TIMEOUT, None, task.error.clone()),
    };

    let body = GenerateResponse {
        success: outcome.is_accepted(),
        task_id: task.id.clone(),
        status: task.status,
        message,
        error,
    };
    Ok((code, Json(body)).into_response())
}

async fn status(State(state): State<Arc<ApiState>>, Path(task_id): Path<String>) -> Response {
    match state.bridge.status(&task_id).await {
        Ok(view) => Json::<TaskView>(view).into_response(),
        Err(BridgeError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "not_found", "task_id": task_id })),
        )
            .into_response(),
        Err(other) => ApiError::from(other).into_response(),
    }
}

async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthView> {
    Json(state.bridge.health().await)
}

async fn ingest(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Result<Json<InboundMessage>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    if let Some(secret) = &state.webhook_secret {
        let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if presented != Some(secret.as_str()) {
            warn!("rejected pushed message with a missing or wrong secret");
            return Err(ApiError::Unauthorized);
        }
    }

    let Json(message) = body?;
    debug!(message_id = %message.id, author_id = %message.author_id, "pushed message");
    let task_id = state.bridge.ingest(&message).await;
    Ok(Json(IngestResponse {
        matched: task_id.is_some(),
        task_id,
    }))
}

/// Error body: `{ "error": <code>, "message": <text> }`.
#[derive(Debug)]
pub enum ApiError {
    Bridge(BridgeError),
    BadRequest(String),
    Unauthorized,
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        ApiError::Bridge(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid secret".to_string(),
            ),
            ApiError::Bridge(err) => {
                let status = match (&err, err.kind()) {
                    (BridgeError::AlreadyExists(_), _) => StatusCode::CONFLICT,
                    (BridgeError::NotFound(_), _) => StatusCode::NOT_FOUND,
                    (_, ErrorKind::Client) => StatusCode::BAD_REQUEST,
                    (_, ErrorKind::Operator) => StatusCode::SERVICE_UNAVAILABLE,
                    (BridgeError::UpstreamTimeout, _) => StatusCode::GATEWAY_TIMEOUT,
                    (_, ErrorKind::Upstream | ErrorKind::Transient) => StatusCode::BAD_GATEWAY,
                    (_, ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code(), err.to_string())
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}
