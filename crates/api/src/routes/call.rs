//! Call Routes

use axum::{extract::State, http::StatusCode, Json};
use interview::{CallEvent, CallOutcome, CallStatus, SessionMessage, StartCall};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{ApiError, AppState};

/// Call state as the UI sees it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallView {
    pub status: CallStatus,
    pub speaking: bool,
    pub transcript_len: usize,
    pub outcome: Option<CallOutcome>,
    /// Page to navigate to once the call has finished
    pub redirect: Option<String>,
}

impl CallView {
    fn from_state(state: &AppState) -> Self {
        let outcome = state.coordinator.outcome();
        Self {
            status: state.coordinator.status(),
            speaking: state.coordinator.is_speaking(),
            transcript_len: state.coordinator.transcript().len(),
            redirect: outcome.as_ref().map(|o| o.route.path()),
            outcome,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub call_id: Uuid,
}

/// Get call status
pub async fn get_call(State(state): State<Arc<AppState>>) -> Json<CallView> {
    Json(CallView::from_state(&state))
}

/// Place a call
pub async fn start_call(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartCall>,
) -> Result<(StatusCode, Json<StartResponse>), ApiError> {
    let call_id = state.coordinator.start_call(request).await?;
    Ok((StatusCode::ACCEPTED, Json(StartResponse { call_id })))
}

/// Disconnect the current call
pub async fn stop_call(State(state): State<Arc<AppState>>) -> Json<CallView> {
    state.coordinator.stop_call().await;
    Json(CallView::from_state(&state))
}

/// Deliver a voice session message (transcript etc.) to the running call
pub async fn post_message(State(state): State<Arc<AppState>>, body: String) -> Result<StatusCode, ApiError> {
    let message = SessionMessage::from_json(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.session.emit(CallEvent::Message(message));
    Ok(StatusCode::ACCEPTED)
}

/// The remote side ended the call
pub async fn remote_end(State(state): State<Arc<AppState>>) -> StatusCode {
    info!("Remote end requested");
    state.session.end_from_remote();
    StatusCode::ACCEPTED
}
