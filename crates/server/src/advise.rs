use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use krishi_agent::{AgentReply, AgentRuntime};
use krishi_core::{ApplicationError, ImageHandle, InterfaceError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

const MAX_TEXT_CHARS: usize = 2_000;

#[derive(Clone)]
pub struct AdviseState {
    runtime: Arc<AgentRuntime>,
}

impl AdviseState {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AdviseRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.user_message(),
            detail: self.0.to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AdviseState) -> Router {
    Router::new().route("/advise", post(advise)).with_state(state)
}

pub async fn advise(
    State(state): State<AdviseState>,
    payload: Result<Json<AdviseRequest>, JsonRejection>,
) -> Result<Json<AgentReply>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let Json(request) = payload.map_err(|rejection| {
        ApiError(InterfaceError::bad_request(rejection.body_text(), correlation_id.clone()))
    })?;

    let image = request
        .image
        .map(|handle| handle.trim().to_string())
        .filter(|handle| !handle.is_empty())
        .map(ImageHandle);
    let text = request.text.trim();

    if text.is_empty() && image.is_none() {
        warn!(
            event_name = "server.advise.rejected",
            correlation_id = %correlation_id,
            "advise request without text or image"
        );
        return Err(ApiError(InterfaceError::bad_request(
            "either text or image is required",
            correlation_id,
        )));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(ApiError(InterfaceError::bad_request(
            format!("text is longer than {MAX_TEXT_CHARS} characters"),
            correlation_id,
        )));
    }

    if state.runtime.adapters().is_empty() {
        warn!(
            event_name = "server.advise.unavailable",
            correlation_id = %correlation_id,
            "advise request with no data sources configured"
        );
        return Err(ApiError(
            ApplicationError::Integration("no data sources are configured".to_string())
                .into_interface(correlation_id),
        ));
    }

    info!(
        event_name = "server.advise.received",
        correlation_id = %correlation_id,
        text_chars = text.chars().count(),
        has_image = image.is_some(),
        "advise request received"
    );

    let reply = state.runtime.handle_message(text, image, Utc::now()).await;
    Ok(Json(reply))
}
