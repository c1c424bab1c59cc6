//! Interview Call Lifecycle
//!
//! Ties a voice call to in-call proctoring:
//! - Call status machine driven by session events
//! - Final transcript accumulation
//! - Feedback persistence and post-call routing
//! - Camera and model acquisition per call, released on every exit path

pub mod call;
pub mod coordinator;
pub mod feedback;
pub mod loopback;
pub mod transcript;

pub use call::{
    CallEvent, CallSession, CallStatus, EventHub, EventSubscription, Role, SessionDescriptor, SessionMessage,
    SessionVariables, TranscriptType,
};
pub use coordinator::{CallOutcome, CallType, CoordinatorConfig, LifecycleCoordinator, StartCall};
pub use feedback::{CreateFeedbackRequest, CreateFeedbackResponse, FeedbackPersister, Route};
pub use loopback::LoopbackSession;
pub use transcript::{format_questions, TranscriptBuffer, TranscriptMessage};

use thiserror::Error;

/// Interview error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterviewError {
    #[error("Invalid call state: {0}")]
    InvalidState(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}
