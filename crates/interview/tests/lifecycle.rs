//! End-to-end call lifecycle with synthetic camera, scripted model and loopback session

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alerting::{AlertLabel, ProctoringStatus};
use async_trait::async_trait;
use camera_capture::{CameraConfig, SyntheticCamera};
use interview::{
    CallEvent, CallStatus, CallType, CoordinatorConfig, CreateFeedbackRequest, CreateFeedbackResponse,
    FeedbackPersister, InterviewError, LifecycleCoordinator, LoopbackSession, Role, Route, SessionDescriptor,
    SessionMessage, StartCall, TranscriptMessage, TranscriptType,
};
use landmarks::{FaceBuilder, ScriptedLandmarkSource, ScriptedModelLoader};

#[derive(Default)]
struct RecordingPersister {
    requests: Mutex<Vec<CreateFeedbackRequest>>,
    fail: bool,
}

impl RecordingPersister {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<CreateFeedbackRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedbackPersister for RecordingPersister {
    async fn create_feedback(&self, request: CreateFeedbackRequest) -> Result<CreateFeedbackResponse, InterviewError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        if self.fail {
            return Err(InterviewError::Persistence("backend unreachable".into()));
        }
        Ok(CreateFeedbackResponse {
            success: true,
            feedback_id: Some(format!("fb-{}", requests.len())),
        })
    }
}

struct Harness {
    coordinator: LifecycleCoordinator,
    camera: Arc<SyntheticCamera>,
    loader: Arc<ScriptedModelLoader>,
    source: ScriptedLandmarkSource,
    session: Arc<LoopbackSession>,
    persister: Arc<RecordingPersister>,
}

fn harness(camera: SyntheticCamera, source: ScriptedLandmarkSource, persister: RecordingPersister) -> Harness {
    let config = CoordinatorConfig {
        camera: CameraConfig {
            width: 64,
            height: 48,
            ..CameraConfig::default()
        },
        ..CoordinatorConfig::default()
    };
    let camera = Arc::new(camera);
    let loader = Arc::new(ScriptedModelLoader::new(source.clone()));
    let session = Arc::new(LoopbackSession::new());
    let persister = Arc::new(persister);
    let coordinator = LifecycleCoordinator::new(
        config,
        camera.clone(),
        loader.clone(),
        session.clone(),
        persister.clone(),
    );
    Harness {
        coordinator,
        camera,
        loader,
        source,
        session,
        persister,
    }
}

fn feedback_call() -> StartCall {
    StartCall {
        user_name: "Ada".into(),
        user_id: "user-1".into(),
        interview_id: Some("int-1".into()),
        call_type: CallType::Feedback,
        questions: vec!["Tell me about a hard bug.".into()],
        ..StartCall::default()
    }
}

fn generate_call() -> StartCall {
    StartCall {
        user_name: "Ada".into(),
        user_id: "user-1".into(),
        ..StartCall::default()
    }
}

fn transcript(role: Role, transcript_type: TranscriptType, text: &str) -> CallEvent {
    CallEvent::Message(SessionMessage::Transcript {
        role,
        transcript_type,
        transcript: text.into(),
    })
}

async fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    for _ in 0..300 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test]
async fn camera_denied_call_still_completes_with_feedback() {
    let h = harness(
        SyntheticCamera::denied(),
        ScriptedLandmarkSource::new(vec![FaceBuilder::compliant().build()]),
        RecordingPersister::default(),
    );

    h.coordinator.start_call(feedback_call()).await.unwrap();
    wait_until("active call", || h.coordinator.status() == CallStatus::Active).await;
    wait_until("proctoring unavailable", || {
        matches!(h.coordinator.board().snapshot().status, ProctoringStatus::Unavailable { .. })
    })
    .await;

    h.session.emit(transcript(Role::Assistant, TranscriptType::Partial, "Tell me"));
    h.session.emit(transcript(Role::Assistant, TranscriptType::Final, "Tell me about a hard bug."));
    h.session.emit(transcript(Role::User, TranscriptType::Final, "A race in our cache."));
    wait_until("transcript", || h.coordinator.transcript().len() == 2).await;

    h.session.end_from_remote();
    wait_until("outcome", || h.coordinator.outcome().is_some()).await;

    let requests = h.persister.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].interview_id, "int-1");
    assert_eq!(requests[0].user_id, "user-1");
    assert_eq!(
        requests[0].transcript,
        vec![
            TranscriptMessage::new(Role::Assistant, "Tell me about a hard bug."),
            TranscriptMessage::new(Role::User, "A race in our cache."),
        ]
    );

    let outcome = h.coordinator.outcome().unwrap();
    assert_eq!(
        outcome.route,
        Route::Feedback {
            interview_id: "int-1".into(),
            feedback_id: "fb-1".into(),
        }
    );
    assert_eq!(h.coordinator.status(), CallStatus::Finished);

    let snapshot = h.coordinator.board().snapshot();
    assert!(!snapshot.has_evaluated_once);
    assert!(matches!(snapshot.status, ProctoringStatus::Unavailable { .. }));
    assert_eq!(h.source.calls(), 0);
}

#[tokio::test]
async fn proctoring_alerts_flow_until_stop() {
    let h = harness(
        SyntheticCamera::new(),
        ScriptedLandmarkSource::new(vec![FaceBuilder::compliant().eye_midpoint(0.7).build()]),
        RecordingPersister::default(),
    );

    h.coordinator.start_call(generate_call()).await.unwrap();
    wait_until("first evaluation", || h.coordinator.board().snapshot().has_evaluated_once).await;

    let snapshot = h.coordinator.board().snapshot();
    assert_eq!(snapshot.status, ProctoringStatus::Running);
    assert_eq!(snapshot.alerts.labels(), &[AlertLabel::HeadTurned]);

    let outcome = h.coordinator.stop_call().await.unwrap();
    assert_eq!(outcome.route, Route::Landing);
    assert_eq!(h.coordinator.status(), CallStatus::Finished);
    assert_eq!(h.coordinator.board().snapshot().status, ProctoringStatus::Stopped);

    let calls_at_stop = h.source.calls();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.source.calls(), calls_at_stop);
}

#[tokio::test]
async fn persister_failure_routes_to_landing() {
    let h = harness(
        SyntheticCamera::new(),
        ScriptedLandmarkSource::default(),
        RecordingPersister::failing(),
    );

    h.coordinator.start_call(feedback_call()).await.unwrap();
    wait_until("active call", || h.coordinator.status() == CallStatus::Active).await;

    let outcome = h.coordinator.stop_call().await.unwrap();
    assert_eq!(outcome.route, Route::Landing);
    assert_eq!(outcome.feedback_id, None);
    assert_eq!(h.persister.requests().len(), 1);
}

#[tokio::test]
async fn generate_call_skips_persister() {
    let h = harness(
        SyntheticCamera::new(),
        ScriptedLandmarkSource::default(),
        RecordingPersister::default(),
    );

    h.coordinator.start_call(generate_call()).await.unwrap();
    let (descriptor, variables) = h.session.last_start().unwrap();
    assert!(matches!(descriptor, SessionDescriptor::Workflow(_)));
    assert_eq!(variables.get("username").map(String::as_str), Some("Ada"));

    h.session.end_from_remote();
    wait_until("outcome", || h.coordinator.outcome().is_some()).await;

    assert_eq!(h.coordinator.outcome().unwrap().route, Route::Landing);
    assert!(h.persister.requests().is_empty());
}

#[tokio::test]
async fn each_call_acquires_fresh_camera_and_model() {
    let h = harness(
        SyntheticCamera::new(),
        ScriptedLandmarkSource::default(),
        RecordingPersister::default(),
    );

    for round in 1..=2 {
        h.coordinator.start_call(feedback_call()).await.unwrap();
        wait_until("proctoring running", || {
            h.coordinator.board().snapshot().status == ProctoringStatus::Running
        })
        .await;

        let outcome = h.coordinator.stop_call().await.unwrap();
        assert_eq!(
            outcome.feedback_id,
            Some(format!("fb-{}", round)),
            "round {} persisted once",
            round
        );
        wait_until("listeners released", || h.session.listener_count() == 0).await;
    }

    assert_eq!(h.camera.open_count(), 2);
    assert_eq!(h.loader.load_count(), 2);
    assert_eq!(h.persister.requests().len(), 2);
}

#[tokio::test]
async fn session_start_failure_returns_to_inactive() {
    let h = harness(
        SyntheticCamera::new(),
        ScriptedLandmarkSource::default(),
        RecordingPersister::default(),
    );

    h.session.fail_next_start();
    let result = h.coordinator.start_call(feedback_call()).await;
    assert!(matches!(result, Err(InterviewError::Session(_))));
    assert_eq!(h.coordinator.status(), CallStatus::Inactive);
    assert!(h.coordinator.outcome().is_none());
    assert!(h.persister.requests().is_empty());

    h.coordinator.start_call(feedback_call()).await.unwrap();
    wait_until("active call", || h.coordinator.status() == CallStatus::Active).await;
    h.coordinator.stop_call().await;
}

#[tokio::test]
async fn second_start_while_in_call_is_rejected() {
    let h = harness(
        SyntheticCamera::new(),
        ScriptedLandmarkSource::default(),
        RecordingPersister::default(),
    );

    h.coordinator.start_call(generate_call()).await.unwrap();
    let result = h.coordinator.start_call(generate_call()).await;
    assert!(matches!(result, Err(InterviewError::InvalidState(_))));
    assert_eq!(h.session.start_count(), 1);

    h.coordinator.stop_call().await;
}

#[tokio::test]
async fn feedback_call_without_interview_is_rejected() {
    let h = harness(
        SyntheticCamera::new(),
        ScriptedLandmarkSource::default(),
        RecordingPersister::default(),
    );

    let request = StartCall {
        interview_id: None,
        ..feedback_call()
    };
    let result = h.coordinator.start_call(request).await;
    assert!(matches!(result, Err(InterviewError::InvalidRequest(_))));
    assert_eq!(h.coordinator.status(), CallStatus::Inactive);
    assert_eq!(h.camera.open_count(), 0);
}

#[tokio::test]
async fn session_errors_and_speech_do_not_end_call() {
    let h = harness(
        SyntheticCamera::new(),
        ScriptedLandmarkSource::default(),
        RecordingPersister::default(),
    );

    h.coordinator.start_call(generate_call()).await.unwrap();
    wait_until("active call", || h.coordinator.status() == CallStatus::Active).await;

    h.session.emit(CallEvent::SpeechStart);
    wait_until("speaking", || h.coordinator.is_speaking()).await;
    h.session.emit(CallEvent::Error("jitter buffer overflow".into()));
    h.session.emit(CallEvent::SpeechEnd);
    wait_until("silent", || !h.coordinator.is_speaking()).await;

    assert_eq!(h.coordinator.status(), CallStatus::Active);
    h.coordinator.stop_call().await;
    assert_eq!(h.coordinator.status(), CallStatus::Finished);
}

#[tokio::test]
async fn finished_is_published_after_proctoring_released() {
    let h = harness(
        SyntheticCamera::new(),
        ScriptedLandmarkSource::default(),
        RecordingPersister::default(),
    );

    h.coordinator.start_call(generate_call()).await.unwrap();
    wait_until("proctoring running", || {
        h.coordinator.board().snapshot().status == ProctoringStatus::Running
    })
    .await;

    let mut status = h.coordinator.subscribe_status();
    let observe = async {
        status.wait_for(|s| *s == CallStatus::Finished).await.unwrap();
        (h.coordinator.board().snapshot().status, h.source.calls())
    };
    let (outcome, (board_at_finish, calls_at_finish)) = tokio::join!(h.coordinator.stop_call(), observe);

    assert_eq!(outcome.unwrap().route, Route::Landing);
    assert_eq!(board_at_finish, ProctoringStatus::Stopped);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.source.calls(), calls_at_finish);
}
