//! Repository Implementation

use crate::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interview::{CreateFeedbackRequest, CreateFeedbackResponse, FeedbackPersister, InterviewError, TranscriptMessage};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Stored interview feedback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub id: String,
    pub interview_id: String,
    pub user_id: String,
    pub transcript: Vec<TranscriptMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Feedback repository (in-memory implementation for now)
pub struct FeedbackRepository {
    /// Feedback records, oldest first
    records: Mutex<VecDeque<FeedbackRecord>>,
    /// Max feedback records kept
    max_records: usize,
}

impl FeedbackRepository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(max_records: usize) -> Self {
        info!("Creating in-memory feedback repository (max {} records)", max_records);
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_records.min(1000))),
            max_records: max_records.max(1),
        }
    }

    /// Insert a new record or replace the one with the same id
    pub fn upsert(&self, request: CreateFeedbackRequest) -> Result<FeedbackRecord, StorageError> {
        if request.interview_id.is_empty() {
            return Err(StorageError::InvalidRecord("missing interview id".into()));
        }

        let mut records = self
            .records
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        let now = Utc::now();
        if let Some(id) = request.feedback_id.as_deref() {
            if let Some(existing) = records.iter_mut().find(|r| r.id == id) {
                existing.interview_id = request.interview_id;
                existing.user_id = request.user_id;
                existing.transcript = request.transcript;
                existing.updated_at = Some(now);
                debug!("Updated feedback {}", id);
                return Ok(existing.clone());
            }
        }

        let record = FeedbackRecord {
            id: request.feedback_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            interview_id: request.interview_id,
            user_id: request.user_id,
            transcript: request.transcript,
            created_at: now,
            updated_at: None,
        };

        // Enforce retention
        while records.len() >= self.max_records {
            records.pop_front();
        }

        records.push_back(record.clone());
        debug!("Inserted feedback {} for interview {}", record.id, record.interview_id);
        Ok(record)
    }

    /// Get a record by id
    pub fn get(&self, id: &str) -> Result<FeedbackRecord, StorageError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    /// Records for one interview, newest first
    pub fn for_interview(&self, interview_id: &str) -> Result<Vec<FeedbackRecord>, StorageError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        Ok(records
            .iter()
            .rev()
            .filter(|r| r.interview_id == interview_id)
            .cloned()
            .collect())
    }

    /// Get total record count
    pub fn count(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Default for FeedbackRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedbackPersister for FeedbackRepository {
    async fn create_feedback(&self, request: CreateFeedbackRequest) -> Result<CreateFeedbackResponse, InterviewError> {
        let record = self.upsert(request)?;
        info!("Feedback {} stored for interview {}", record.id, record.interview_id);
        Ok(CreateFeedbackResponse {
            success: true,
            feedback_id: Some(record.id),
        })
    }
}
