//! Storage Layer
//!
//! Feedback persistence with repository pattern.

mod repository;

pub use repository::{FeedbackRecord, FeedbackRepository};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl From<StorageError> for interview::InterviewError {
    fn from(e: StorageError) -> Self {
        interview::InterviewError::Persistence(e.to_string())
    }
}
