//! Feedback hand-off at the end of a call

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::transcript::TranscriptMessage;
use crate::InterviewError;

/// Request to turn a finished interview into a stored feedback record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackRequest {
    pub interview_id: String,
    pub user_id: String,
    pub transcript: Vec<TranscriptMessage>,
    /// Existing record to overwrite, if any
    pub feedback_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackResponse {
    pub success: bool,
    pub feedback_id: Option<String>,
}

/// Feedback persistence capability
#[async_trait]
pub trait FeedbackPersister: Send + Sync {
    async fn create_feedback(&self, request: CreateFeedbackRequest) -> Result<CreateFeedbackResponse, InterviewError>;
}

/// Where the UI goes once a call is over
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Route {
    Landing,
    #[serde(rename_all = "camelCase")]
    Feedback { interview_id: String, feedback_id: String },
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Landing => "/".to_string(),
            Route::Feedback { interview_id, .. } => format!("/interview/{}/feedback", interview_id),
        }
    }
}
