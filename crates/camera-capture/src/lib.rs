//! Camera Capture for Interview Proctoring
//!
//! Provides webcam acquisition for the proctoring pipeline:
//! - Camera device abstraction (permission prompt, device lookup)
//! - Owned media streams with stoppable video/audio tracks
//! - Latest-frame channels (slow consumers drop frames, never queue them)
//! - Synthetic camera for development and tests

pub mod frame;
pub mod stream;
pub mod synthetic;

pub use frame::VideoFrame;
pub use stream::{frame_channel, CameraStream, FrameReceiver, FrameSender, MediaTrack, TrackKind};
pub use synthetic::SyntheticCamera;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    /// Permission denied or no capture device present
    #[error("Camera unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid format: {0}")]
    Format(String),
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device identifier (empty selects the default webcam)
    pub device: String,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS
    pub fps: u32,
    /// Also request a microphone track alongside video
    pub capture_audio: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            width: 640,
            height: 480,
            fps: 30,
            capture_audio: false,
        }
    }
}

impl CameraConfig {
    /// Validate requested capture format
    pub fn validate(&self) -> Result<(), CameraError> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::Format(format!(
                "invalid resolution {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(CameraError::Format("fps must be non-zero".into()));
        }
        Ok(())
    }
}

/// A capture device that can be asked for a fresh stream.
///
/// Every call to [`CameraDevice::open`] acquires a new stream; streams are
/// never shared between calls.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Request camera access at the configured resolution
    async fn open(&self, config: &CameraConfig) -> Result<CameraStream, CameraError>;
}
