//! Lifecycle coordinator: one voice call plus its proctoring resources
//!
//! - Proctoring is brought up in parallel with the call and never delays it
//! - Camera and model are acquired fresh per call and released on finish
//! - Feedback is persisted exactly once, after proctoring is torn down

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alerting::AlertBoard;
use camera_capture::{CameraConfig, CameraDevice};
use landmarks::ModelLoader;
use proctor::{start_proctoring, FrameFeeder, ProctorConfig, ProctorSetup};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::call::{
    CallEvent, CallSession, CallStatus, EventSubscription, SessionDescriptor, SessionMessage, SessionVariables,
    TranscriptType,
};
use crate::feedback::{CreateFeedbackRequest, CreateFeedbackResponse, FeedbackPersister, Route};
use crate::transcript::{format_questions, TranscriptBuffer, TranscriptMessage};
use crate::InterviewError;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub camera: CameraConfig,

    pub proctor: ProctorConfig,

    /// Upper bound on landmark model load time in milliseconds
    pub model_timeout_ms: u64,

    /// Session target for interview-generation calls
    pub workflow_id: String,

    /// Session target for interviewer calls
    pub interviewer_id: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            proctor: ProctorConfig::default(),
            model_timeout_ms: 10_000,
            workflow_id: "interview-generator".to_string(),
            interviewer_id: "interviewer".to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }
}

/// Kind of call being placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    /// Collects preferences and generates an interview
    #[default]
    Generate,
    /// Runs the interview and produces feedback
    Feedback,
}

/// Parameters for a new call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartCall {
    pub user_name: String,
    pub user_id: String,
    pub interview_id: Option<String>,
    pub feedback_id: Option<String>,
    pub call_type: CallType,
    pub questions: Vec<String>,
}

impl StartCall {
    fn validate(&self) -> Result<(), InterviewError> {
        if self.call_type == CallType::Feedback && self.interview_id.as_deref().map_or(true, str::is_empty) {
            return Err(InterviewError::InvalidRequest(
                "feedback calls need an interview id".into(),
            ));
        }
        Ok(())
    }

    fn session_params(&self, config: &CoordinatorConfig) -> (SessionDescriptor, SessionVariables) {
        let mut variables = SessionVariables::new();
        match self.call_type {
            CallType::Generate => {
                variables.insert("username".into(), self.user_name.clone());
                variables.insert("userid".into(), self.user_id.clone());
                (SessionDescriptor::Workflow(config.workflow_id.clone()), variables)
            }
            CallType::Feedback => {
                variables.insert("questions".into(), format_questions(&self.questions));
                (SessionDescriptor::Assistant(config.interviewer_id.clone()), variables)
            }
        }
    }
}

/// Where a finished call leads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutcome {
    pub route: Route,
    pub feedback_id: Option<String>,
}

impl CallOutcome {
    fn landing() -> Self {
        Self {
            route: Route::Landing,
            feedback_id: None,
        }
    }
}

type ProctorSlot = Arc<Mutex<Option<FrameFeeder>>>;

struct ActiveCall {
    id: Uuid,
    request: StartCall,
    proctoring: ProctorSlot,
    setup: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl ActiveCall {
    /// Stop the event pump, cancel pending setup and release camera and model
    async fn release(self, board: &AlertBoard) {
        let ActiveCall {
            id,
            proctoring,
            setup,
            shutdown,
            ..
        } = self;

        let _ = shutdown.send(());

        setup.abort();
        match setup.await {
            Ok(()) => debug!("Proctoring setup for call {} had completed", id),
            Err(e) if e.is_cancelled() => debug!("Proctoring setup for call {} cancelled", id),
            Err(e) => warn!("Proctoring setup for call {} failed: {}", id, e),
        }

        let feeder = proctoring.lock().ok().and_then(|mut slot| slot.take());
        if let Some(mut feeder) = feeder {
            feeder.stop().await;
        }
        board.mark_stopped();
    }
}

#[derive(Default)]
struct CallTranscript {
    call_id: Option<Uuid>,
    buffer: TranscriptBuffer,
}

struct Inner {
    config: CoordinatorConfig,
    camera: Arc<dyn CameraDevice>,
    loader: Arc<dyn ModelLoader>,
    session: Arc<dyn CallSession>,
    persister: Arc<dyn FeedbackPersister>,
    board: AlertBoard,
    status: watch::Sender<CallStatus>,
    speaking: watch::Sender<bool>,
    outcome: watch::Sender<Option<CallOutcome>>,
    call: tokio::sync::Mutex<Option<ActiveCall>>,
    transcript: Mutex<CallTranscript>,
}

/// Owns the call status machine and the proctoring resources of the current call
#[derive(Clone)]
pub struct LifecycleCoordinator {
    inner: Arc<Inner>,
}

impl LifecycleCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        camera: Arc<dyn CameraDevice>,
        loader: Arc<dyn ModelLoader>,
        session: Arc<dyn CallSession>,
        persister: Arc<dyn FeedbackPersister>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                camera,
                loader,
                session,
                persister,
                board: AlertBoard::new(),
                status: watch::Sender::new(CallStatus::Inactive),
                speaking: watch::Sender::new(false),
                outcome: watch::Sender::new(None),
                call: tokio::sync::Mutex::new(None),
                transcript: Mutex::new(CallTranscript::default()),
            }),
        }
    }

    /// Place a new call. Returns once the session has been asked to start;
    /// proctoring comes up in the background.
    pub async fn start_call(&self, request: StartCall) -> Result<Uuid, InterviewError> {
        request.validate()?;

        let mut slot = self.inner.call.lock().await;
        let status = *self.inner.status.borrow();
        if slot.is_some() || !status.can_start() {
            return Err(InterviewError::InvalidState(format!(
                "cannot start a call while {:?}",
                status
            )));
        }

        let call_id = Uuid::new_v4();
        info!("Starting {:?} call {}", request.call_type, call_id);

        self.inner.status.send_replace(CallStatus::Connecting);
        self.inner.speaking.send_replace(false);
        self.inner.outcome.send_replace(None);
        self.inner.board.reset();
        if let Ok(mut transcript) = self.inner.transcript.lock() {
            transcript.call_id = Some(call_id);
            transcript.buffer.clear();
        }

        let events = self.inner.session.subscribe();
        let proctoring: ProctorSlot = Arc::new(Mutex::new(None));
        let setup = self.spawn_proctoring(call_id, proctoring.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(pump_events(self.clone(), call_id, events, shutdown_rx));

        let (descriptor, variables) = request.session_params(&self.inner.config);
        *slot = Some(ActiveCall {
            id: call_id,
            request,
            proctoring,
            setup,
            shutdown: shutdown_tx,
        });
        drop(slot);

        if let Err(e) = self.inner.session.start(&descriptor, &variables).await {
            warn!("Call {} failed to start: {}", call_id, e);
            self.abandon(call_id).await;
            return Err(e);
        }

        Ok(call_id)
    }

    /// User-initiated disconnect. Returns the outcome of the finished call,
    /// or the last known outcome if the call had already ended.
    pub async fn stop_call(&self) -> Option<CallOutcome> {
        if let Err(e) = self.inner.session.stop().await {
            warn!("Session stop failed: {}", e);
        }
        match self.finish(None).await {
            Some(outcome) => Some(outcome),
            None => self.outcome(),
        }
    }

    pub fn status(&self) -> CallStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<CallStatus> {
        self.inner.status.subscribe()
    }

    /// Proctoring alert board shared with the UI
    pub fn board(&self) -> &AlertBoard {
        &self.inner.board
    }

    pub fn outcome(&self) -> Option<CallOutcome> {
        self.inner.outcome.borrow().clone()
    }

    /// Final transcript lines of the current or last call
    pub fn transcript(&self) -> Vec<TranscriptMessage> {
        self.inner
            .transcript
            .lock()
            .map(|t| t.buffer.messages().to_vec())
            .unwrap_or_default()
    }

    pub fn is_speaking(&self) -> bool {
        *self.inner.speaking.borrow()
    }

    fn spawn_proctoring(&self, call_id: Uuid, slot: ProctorSlot) -> JoinHandle<()> {
        let camera = self.inner.camera.clone();
        let loader = self.inner.loader.clone();
        let camera_config = self.inner.config.camera.clone();
        let proctor_config = self.inner.config.proctor.clone();
        let model_timeout = self.inner.config.model_timeout();
        let board = self.inner.board.clone();

        tokio::spawn(async move {
            let setup = ProctorSetup {
                camera: camera.as_ref(),
                camera_config: &camera_config,
                loader: loader.as_ref(),
                model_timeout,
                config: proctor_config,
            };
            match start_proctoring(setup, board.clone()).await {
                Ok(feeder) => match slot.lock() {
                    Ok(mut slot) => *slot = Some(feeder),
                    Err(_) => warn!("Proctoring slot poisoned for call {}", call_id),
                },
                Err(e) => {
                    warn!("Proctoring unavailable for call {}: {}", call_id, e);
                    board.mark_unavailable(e.to_string());
                }
            }
        })
    }

    fn handle_event(&self, call_id: Uuid, event: CallEvent) {
        match event {
            CallEvent::CallStart => {
                let promoted = self.inner.status.send_if_modified(|status| {
                    if *status == CallStatus::Connecting {
                        *status = CallStatus::Active;
                        true
                    } else {
                        false
                    }
                });
                if promoted {
                    info!("Call {} active", call_id);
                }
            }
            CallEvent::SpeechStart => {
                self.inner.speaking.send_replace(true);
            }
            CallEvent::SpeechEnd => {
                self.inner.speaking.send_replace(false);
            }
            CallEvent::Message(SessionMessage::Transcript {
                role,
                transcript_type: TranscriptType::Final,
                transcript,
            }) => {
                if let Ok(mut current) = self.inner.transcript.lock() {
                    if current.call_id == Some(call_id) {
                        current.buffer.push(TranscriptMessage::new(role, transcript));
                    }
                }
            }
            CallEvent::Message(message) => debug!("Ignoring session message {:?}", message),
            CallEvent::Error(e) => warn!("Session error on call {}: {}", call_id, e),
            CallEvent::CallEnd => {}
        }
    }

    /// End the call and hand off the transcript. Runs at most once per call;
    /// `expected` restricts it to a specific call.
    async fn finish(&self, expected: Option<Uuid>) -> Option<CallOutcome> {
        let mut slot = self.inner.call.lock().await;
        let call = match slot.take() {
            Some(call) if expected.map_or(true, |id| id == call.id) => call,
            other => {
                *slot = other;
                return None;
            }
        };

        let call_id = call.id;
        let request = call.request.clone();
        call.release(&self.inner.board).await;

        self.inner.status.send_replace(CallStatus::Finished);
        self.inner.speaking.send_replace(false);
        info!("Call {} finished", call_id);

        let outcome = self.persist(call_id, &request).await;
        self.inner.outcome.send_replace(Some(outcome.clone()));
        Some(outcome)
    }

    /// Tear down a call whose session never started
    async fn abandon(&self, call_id: Uuid) {
        let mut slot = self.inner.call.lock().await;
        let call = match slot.take() {
            Some(call) if call.id == call_id => call,
            other => {
                *slot = other;
                return;
            }
        };
        call.release(&self.inner.board).await;
        self.inner.status.send_replace(CallStatus::Inactive);
        info!("Call {} abandoned", call_id);
    }

    async fn persist(&self, call_id: Uuid, request: &StartCall) -> CallOutcome {
        let interview_id = match (request.call_type, &request.interview_id) {
            (CallType::Feedback, Some(id)) => id.clone(),
            _ => return CallOutcome::landing(),
        };

        let transcript = self
            .inner
            .transcript
            .lock()
            .ok()
            .filter(|t| t.call_id == Some(call_id))
            .map(|t| t.buffer.messages().to_vec())
            .unwrap_or_default();

        let feedback = CreateFeedbackRequest {
            interview_id: interview_id.clone(),
            user_id: request.user_id.clone(),
            transcript,
            feedback_id: request.feedback_id.clone(),
        };

        match self.inner.persister.create_feedback(feedback).await {
            Ok(CreateFeedbackResponse {
                success: true,
                feedback_id: Some(feedback_id),
            }) => {
                info!("Feedback {} saved for interview {}", feedback_id, interview_id);
                CallOutcome {
                    route: Route::Feedback {
                        interview_id,
                        feedback_id: feedback_id.clone(),
                    },
                    feedback_id: Some(feedback_id),
                }
            }
            Ok(response) => {
                warn!("Feedback not saved for call {}: {:?}", call_id, response);
                CallOutcome::landing()
            }
            Err(e) => {
                warn!("Feedback persistence failed for call {}: {}", call_id, e);
                CallOutcome::landing()
            }
        }
    }
}

async fn pump_events(
    coordinator: LifecycleCoordinator,
    call_id: Uuid,
    mut events: EventSubscription,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(CallEvent::CallEnd) => {
                    coordinator.finish(Some(call_id)).await;
                    break;
                }
                Some(event) => coordinator.handle_event(call_id, event),
                None => break,
            },
        }
    }
    debug!("Event pump for call {} exiting", call_id);
}
