//! In-process camera producing uniform frames at a fixed rate

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::stream::{frame_channel, CameraStream, MediaTrack, TrackKind};
use crate::{CameraConfig, CameraDevice, CameraError, VideoFrame};

/// Synthetic camera device
///
/// Stands in for a real webcam. Permission can be revoked to exercise the
/// `CameraError::Unavailable` path.
#[derive(Debug, Default)]
pub struct SyntheticCamera {
    deny_permission: AtomicBool,
    open_count: AtomicUsize,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// A camera whose permission prompt is always declined
    pub fn denied() -> Self {
        let camera = Self::default();
        camera.set_permission(false);
        camera
    }

    /// Grant or revoke camera permission for subsequent opens
    pub fn set_permission(&self, granted: bool) {
        self.deny_permission.store(!granted, Ordering::SeqCst);
    }

    /// Number of streams acquired so far
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraDevice for SyntheticCamera {
    async fn open(&self, config: &CameraConfig) -> Result<CameraStream, CameraError> {
        config.validate()?;
        if self.deny_permission.load(Ordering::SeqCst) {
            warn!("Camera permission denied");
            return Err(CameraError::Unavailable("permission denied".into()));
        }

        let (tx, rx) = frame_channel();
        let (width, height) = (config.width, config.height);
        let interval = Duration::from_micros(1_000_000 / config.fps as u64);

        let producer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut sequence: u32 = 0;
            loop {
                ticker.tick().await;
                let timestamp_ns = interval.as_nanos() as u64 * sequence as u64;
                tx.send(VideoFrame::blank(width, height, timestamp_ns, sequence));
                sequence = sequence.wrapping_add(1);
            }
        });

        let mut tracks: Vec<Box<dyn MediaTrack>> =
            vec![Box::new(SyntheticTrack::new(TrackKind::Video, Some(producer)))];
        if config.capture_audio {
            tracks.push(Box::new(SyntheticTrack::new(TrackKind::Audio, None)));
        }

        self.open_count.fetch_add(1, Ordering::SeqCst);
        info!(
            "Synthetic camera opened at {}x{} @ {}fps (audio: {})",
            width, height, config.fps, config.capture_audio
        );
        Ok(CameraStream::new(tracks, rx))
    }
}

/// Track backed by a producer task
struct SyntheticTrack {
    kind: TrackKind,
    live: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
}

impl SyntheticTrack {
    fn new(kind: TrackKind, producer: Option<JoinHandle<()>>) -> Self {
        Self {
            kind,
            live: Arc::new(AtomicBool::new(true)),
            producer,
        }
    }
}

impl MediaTrack for SyntheticTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            if let Some(producer) = &self.producer {
                producer.abort();
            }
            debug!("{:?} track stopped", self.kind);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}
