//! In-process call session

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::call::{CallEvent, CallSession, EventHub, EventSubscription, SessionDescriptor, SessionVariables};
use crate::InterviewError;

/// Call session that connects instantly and lets the host inject events.
///
/// Emits `CallStart` on start and `CallEnd` on stop. Used by the server when
/// no voice backend is wired and by tests.
#[derive(Debug)]
pub struct LoopbackSession {
    hub: Arc<EventHub>,
    active: AtomicBool,
    fail_next_start: AtomicBool,
    starts: AtomicUsize,
    last_start: Mutex<Option<(SessionDescriptor, SessionVariables)>>,
}

impl LoopbackSession {
    pub fn new() -> Self {
        Self {
            hub: EventHub::new(),
            active: AtomicBool::new(false),
            fail_next_start: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            last_start: Mutex::new(None),
        }
    }

    /// Inject an event as if the remote side sent it
    pub fn emit(&self, event: CallEvent) {
        self.hub.emit(event);
    }

    /// The remote side hangs up
    pub fn end_from_remote(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("Loopback session ended by remote");
            self.hub.emit(CallEvent::CallEnd);
        }
    }

    /// Make the next `start` fail
    pub fn fail_next_start(&self) {
        self.fail_next_start.store(true, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    /// Descriptor and variables of the most recent start
    pub fn last_start(&self) -> Option<(SessionDescriptor, SessionVariables)> {
        self.last_start.lock().ok().and_then(|s| s.clone())
    }
}

impl Default for LoopbackSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallSession for LoopbackSession {
    async fn start(&self, descriptor: &SessionDescriptor, variables: &SessionVariables) -> Result<(), InterviewError> {
        if self.fail_next_start.swap(false, Ordering::SeqCst) {
            warn!("Loopback session refused to start");
            return Err(InterviewError::Session("session refused to start".into()));
        }

        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_start.lock() {
            *last = Some((descriptor.clone(), variables.clone()));
        }
        self.active.store(true, Ordering::SeqCst);
        info!("Loopback session started ({:?})", descriptor);
        self.hub.emit(CallEvent::CallStart);
        Ok(())
    }

    async fn stop(&self) -> Result<(), InterviewError> {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("Loopback session stopped");
            self.hub.emit(CallEvent::CallEnd);
        }
        Ok(())
    }

    fn subscribe(&self) -> EventSubscription {
        self.hub.subscribe()
    }
}
