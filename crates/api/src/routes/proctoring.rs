//! Proctoring Routes

use alerting::ProctorSnapshot;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Response for proctoring endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProctoringResponse {
    #[serde(flatten)]
    pub snapshot: ProctorSnapshot,
    pub all_clear: bool,
}

/// Get the latest alert snapshot
pub async fn get_proctoring(State(state): State<Arc<AppState>>) -> Json<ProctoringResponse> {
    let snapshot = state.coordinator.board().snapshot();
    Json(ProctoringResponse {
        all_clear: snapshot.is_all_clear(),
        snapshot,
    })
}
