//! Frame loop: camera frames -> landmark source -> evaluator -> alert board

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alerting::AlertBoard;
use camera_capture::{CameraStream, FrameReceiver};
use landmarks::LandmarkSource;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::evaluator::ProctorEvaluator;

#[derive(Debug, Default)]
struct FeederCounters {
    frames: AtomicU64,
    evaluations: AtomicU64,
    inference_failures: AtomicU64,
}

/// Frame loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeederStats {
    pub frames_processed: u64,
    pub evaluations: u64,
    pub inference_failures: u64,
}

/// Drives the landmark source from a camera stream.
///
/// One frame is in flight at a time: the next frame is taken only after the
/// previous inference completed, and frames that arrived meanwhile are
/// dropped in favour of the newest.
pub struct FrameFeeder {
    task: Option<JoinHandle<()>>,
    stream: Option<CameraStream>,
    counters: Arc<FeederCounters>,
}

impl FrameFeeder {
    /// Start the frame loop. Takes ownership of the stream and the model.
    pub fn start(
        stream: CameraStream,
        source: Box<dyn LandmarkSource>,
        evaluator: ProctorEvaluator,
        board: AlertBoard,
    ) -> Self {
        let counters = Arc::new(FeederCounters::default());
        info!("Starting frame loop on stream {} with {}", stream.id(), source.name());

        board.mark_running();
        let task = tokio::spawn(frame_loop(
            stream.frames(),
            source,
            evaluator,
            board,
            counters.clone(),
        ));

        Self {
            task: Some(task),
            stream: Some(stream),
            counters,
        }
    }

    /// Cancel the loop, release the model and stop the camera. Idempotent.
    ///
    /// Once this returns no further landmark calls will happen.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            match task.await {
                Ok(()) => debug!("Frame loop had already finished"),
                Err(e) if e.is_cancelled() => debug!("Frame loop cancelled"),
                Err(e) => warn!("Frame loop ended abnormally: {}", e),
            }
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!("Frame feeder stopped ({:?})", self.stats());
        }
    }

    /// Whether the loop is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn stats(&self) -> FeederStats {
        FeederStats {
            frames_processed: self.counters.frames.load(Ordering::SeqCst),
            evaluations: self.counters.evaluations.load(Ordering::SeqCst),
            inference_failures: self.counters.inference_failures.load(Ordering::SeqCst),
        }
    }
}

impl Drop for FrameFeeder {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

async fn frame_loop(
    mut frames: FrameReceiver,
    mut source: Box<dyn LandmarkSource>,
    mut evaluator: ProctorEvaluator,
    board: AlertBoard,
    counters: Arc<FeederCounters>,
) {
    while let Some(frame) = frames.next_frame().await {
        counters.frames.fetch_add(1, Ordering::SeqCst);

        match source.estimate_faces(&frame).await {
            Ok(faces) => {
                if let Some(alerts) = evaluator.evaluate(&faces, Instant::now()) {
                    counters.evaluations.fetch_add(1, Ordering::SeqCst);
                    board.publish(alerts);
                }
            }
            Err(e) => {
                counters.inference_failures.fetch_add(1, Ordering::SeqCst);
                warn!("Inference failed on frame {}: {}", frame.sequence, e);
            }
        }
    }
    debug!("Frame stream closed, frame loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProctorConfig;
    use alerting::{AlertLabel, ProctoringStatus};
    use camera_capture::{frame_channel, FrameSender, MediaTrack, TrackKind, VideoFrame};
    use landmarks::{FaceBuilder, ScriptedLandmarkSource};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    struct FlagTrack(Arc<AtomicBool>);

    impl MediaTrack for FlagTrack {
        fn kind(&self) -> TrackKind {
            TrackKind::Video
        }

        fn stop(&self) {
            self.0.store(false, Ordering::SeqCst);
        }

        fn is_live(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn test_stream() -> (FrameSender, CameraStream, Arc<AtomicBool>) {
        let (tx, rx) = frame_channel();
        let live = Arc::new(AtomicBool::new(true));
        let stream = CameraStream::new(vec![Box::new(FlagTrack(live.clone()))], rx);
        (tx, stream, live)
    }

    fn frame(sequence: u32) -> VideoFrame {
        VideoFrame::blank(4, 4, 0, sequence)
    }

    async fn settle_until(mut done: impl FnMut() -> bool) {
        while !done() {
            tokio::task::yield_now().await;
        }
    }

    fn start(stream: CameraStream, source: &ScriptedLandmarkSource, board: &AlertBoard) -> FrameFeeder {
        FrameFeeder::start(
            stream,
            Box::new(source.clone()),
            ProctorEvaluator::new(ProctorConfig::default()),
            board.clone(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn alerts_follow_each_frame_in_rule_order() {
        let (tx, stream, _live) = test_stream();
        let source = ScriptedLandmarkSource::new(vec![]);
        source.push(vec![FaceBuilder::compliant().build()]);
        source.push(vec![FaceBuilder::compliant().eye_midpoint(0.7).vertical_span(0.3, 0.4).build()]);
        source.push(vec![FaceBuilder::compliant().build()]);
        source.push(vec![FaceBuilder::compliant().iris_offset(0.06).build()]);

        let board = AlertBoard::new();
        let mut feeder = start(stream, &source, &board);
        let mut rx = board.subscribe();

        let expected: [&[AlertLabel]; 4] = [
            &[],
            &[AlertLabel::HeadTurned, AlertLabel::TooFar],
            &[],
            &[AlertLabel::GazeOffScreen],
        ];
        for (sequence, labels) in expected.iter().enumerate() {
            tx.send(frame(sequence as u32));
            rx.changed().await.unwrap();
            let snapshot = rx.borrow_and_update().clone();
            assert_eq!(snapshot.alerts.labels(), *labels);
            assert!(snapshot.has_evaluated_once);
            tokio::time::advance(Duration::from_millis(1100)).await;
        }

        assert_eq!(feeder.stats().evaluations, 4);
        feeder.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn frames_within_window_are_not_evaluated() {
        let (tx, stream, _live) = test_stream();
        let source = ScriptedLandmarkSource::new(vec![]);
        let board = AlertBoard::new();
        let mut feeder = start(stream, &source, &board);

        for sequence in 0..3 {
            tx.send(frame(sequence));
            settle_until(|| source.calls() == sequence as usize + 1).await;
        }

        let stats = feeder.stats();
        assert_eq!(stats.frames_processed, 3);
        assert_eq!(stats.evaluations, 1);
        assert_eq!(board.snapshot().alerts.labels(), &[AlertLabel::NoFace]);
        feeder.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn inference_failure_skips_frame() {
        let (tx, stream, _live) = test_stream();
        let source = ScriptedLandmarkSource::new(vec![]);
        source.push_error("model crashed");
        let board = AlertBoard::new();
        let mut feeder = start(stream, &source, &board);

        tx.send(frame(0));
        settle_until(|| feeder.stats().inference_failures == 1).await;
        assert!(!board.snapshot().has_evaluated_once);

        tx.send(frame(1));
        settle_until(|| feeder.stats().evaluations == 1).await;
        assert!(feeder.is_running());
        feeder.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_inference_after_stop() {
        let (tx, stream, live) = test_stream();
        let source = ScriptedLandmarkSource::new(vec![FaceBuilder::compliant().build()]);
        let board = AlertBoard::new();
        let mut feeder = start(stream, &source, &board);
        assert_eq!(board.snapshot().status, ProctoringStatus::Running);

        tx.send(frame(0));
        settle_until(|| source.calls() == 1).await;

        feeder.stop().await;
        feeder.stop().await;
        assert!(!live.load(Ordering::SeqCst));
        assert!(!feeder.is_running());

        for sequence in 1..5 {
            tx.send(frame(sequence));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(source.calls(), 1);
    }
}
