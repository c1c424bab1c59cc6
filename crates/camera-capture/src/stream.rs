//! Media streams, tracks and latest-frame channels

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::frame::VideoFrame;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// A single capture track owned by a [`CameraStream`]
pub trait MediaTrack: Send + Sync {
    /// Media kind
    fn kind(&self) -> TrackKind;

    /// Stop capturing. Calling stop on a stopped track is a no-op.
    fn stop(&self);

    /// Whether the track is still capturing
    fn is_live(&self) -> bool;
}

/// Create a latest-frame channel.
///
/// The channel holds only the newest frame: a consumer that falls behind
/// sees the most recent frame when it resumes and the frames in between
/// are dropped.
pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = watch::channel(None);
    (FrameSender { tx }, FrameReceiver { rx })
}

/// Producer half of a latest-frame channel
#[derive(Debug)]
pub struct FrameSender {
    tx: watch::Sender<Option<Arc<VideoFrame>>>,
}

impl FrameSender {
    /// Replace the current frame
    pub fn send(&self, frame: VideoFrame) {
        self.tx.send_replace(Some(Arc::new(frame)));
    }
}

/// Consumer half of a latest-frame channel
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    rx: watch::Receiver<Option<Arc<VideoFrame>>>,
}

impl FrameReceiver {
    /// Wait for a frame newer than the last one returned.
    ///
    /// Returns `None` once the producer is gone.
    pub async fn next_frame(&mut self) -> Option<Arc<VideoFrame>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return Some(frame);
            }
        }
    }
}

/// An acquired camera stream.
///
/// Owns its tracks for its whole lifetime. Stopping (explicitly or on drop)
/// stops every track.
pub struct CameraStream {
    id: Uuid,
    tracks: Vec<Box<dyn MediaTrack>>,
    frames: FrameReceiver,
    stopped: bool,
}

impl CameraStream {
    /// Assemble a stream from its tracks and frame channel
    pub fn new(tracks: Vec<Box<dyn MediaTrack>>, frames: FrameReceiver) -> Self {
        let id = Uuid::new_v4();
        debug!("Camera stream {} assembled with {} tracks", id, tracks.len());
        Self {
            id,
            tracks,
            frames,
            stopped: false,
        }
    }

    /// Stream identifier (unique per acquisition)
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// A receiver for the stream's frames
    pub fn frames(&self) -> FrameReceiver {
        self.frames.clone()
    }

    /// Tracks owned by this stream
    pub fn tracks(&self) -> &[Box<dyn MediaTrack>] {
        &self.tracks
    }

    /// Whether the stream carries an audio track
    pub fn has_audio(&self) -> bool {
        self.tracks.iter().any(|t| t.kind() == TrackKind::Audio)
    }

    /// Whether any track is still live
    pub fn is_active(&self) -> bool {
        !self.stopped && self.tracks.iter().any(|t| t.is_live())
    }

    /// Stop all tracks. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        for track in &self.tracks {
            track.stop();
        }
        self.stopped = true;
        info!("Camera stream {} stopped", self.id);
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .field("stopped", &self.stopped)
            .finish()
    }
}
