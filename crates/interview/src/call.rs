//! Voice call session: status, events and subscriptions

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::InterviewError;

/// Call lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Inactive,
    Connecting,
    Active,
    Finished,
}

impl CallStatus {
    /// Whether a new call may be started from this status
    pub fn can_start(&self) -> bool {
        matches!(self, CallStatus::Inactive | CallStatus::Finished)
    }
}

/// Speaker of a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptType {
    Partial,
    Final,
}

/// Message payload delivered by the voice session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionMessage {
    Transcript {
        role: Role,
        #[serde(rename = "transcriptType")]
        transcript_type: TranscriptType,
        transcript: String,
    },
    #[serde(other)]
    Other,
}

impl SessionMessage {
    /// Parse a message in the voice SDK's JSON shape
    pub fn from_json(raw: &str) -> Result<Self, InterviewError> {
        serde_json::from_str(raw).map_err(|e| InterviewError::Session(format!("bad message: {}", e)))
    }

    /// A final transcript line
    pub fn final_transcript(role: Role, text: impl Into<String>) -> Self {
        SessionMessage::Transcript {
            role,
            transcript_type: TranscriptType::Final,
            transcript: text.into(),
        }
    }
}

/// Lifecycle events emitted by a call session
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    CallStart,
    CallEnd,
    SpeechStart,
    SpeechEnd,
    Message(SessionMessage),
    Error(String),
}

/// What the session should connect to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SessionDescriptor {
    /// Interview-generation workflow
    Workflow(String),
    /// Interviewer assistant
    Assistant(String),
}

/// Template variables handed to the session
pub type SessionVariables = BTreeMap<String, String>;

/// Voice conversation capability
#[async_trait]
pub trait CallSession: Send + Sync {
    async fn start(&self, descriptor: &SessionDescriptor, variables: &SessionVariables) -> Result<(), InterviewError>;

    async fn stop(&self) -> Result<(), InterviewError>;

    /// Listen to lifecycle events until the subscription is dropped
    fn subscribe(&self) -> EventSubscription;
}

/// Fan-out of call events to subscribers
#[derive(Debug, Default)]
pub struct EventHub {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<CallEvent>>>,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>) -> EventSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.insert(id, tx);
        }
        debug!("Event subscriber {} registered", id);
        EventSubscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Deliver an event to every subscriber, in emission order
    pub fn emit(&self, event: CallEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn unsubscribe(&self, id: u64) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&id);
        }
        debug!("Event subscriber {} removed", id);
    }
}

/// Receives call events; unsubscribes on drop
#[derive(Debug)]
pub struct EventSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<CallEvent>,
    hub: Weak<EventHub>,
}

impl EventSubscription {
    pub async fn recv(&mut self) -> Option<CallEvent> {
        self.rx.recv().await
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}
