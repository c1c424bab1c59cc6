//! Feedback Routes

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use storage::FeedbackRecord;

use crate::{ApiError, AppState};

/// Response for interview feedback listing
#[derive(Debug, Serialize)]
pub struct FeedbackList {
    pub data: Vec<FeedbackRecord>,
    pub count: usize,
}

/// Get one feedback record
pub async fn get_feedback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FeedbackRecord>, ApiError> {
    Ok(Json(state.repository.get(&id)?))
}

/// List feedback for an interview, newest first
pub async fn list_for_interview(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
) -> Result<Json<FeedbackList>, ApiError> {
    let data = state.repository.for_interview(&interview_id)?;
    Ok(Json(FeedbackList {
        count: data.len(),
        data,
    }))
}
