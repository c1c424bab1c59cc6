//! Interview Proctoring
//!
//! Real-time candidate monitoring over webcam frames:
//! - Face count (no face, multiple faces)
//! - Head turned away from the screen
//! - Gaze off-screen
//! - Too far from the camera / slouching
//!
//! Evaluation is rate-limited; each evaluation replaces the alert board.

pub mod config;
pub mod evaluator;
pub mod feeder;

pub use config::{EvaluatorMode, ProctorConfig};
pub use evaluator::{EvaluationClock, ProctorEvaluator};
pub use feeder::{FeederStats, FrameFeeder};

use std::time::Duration;

use alerting::AlertBoard;
use camera_capture::{CameraConfig, CameraDevice, CameraError};
use landmarks::{load_with_timeout, LandmarkError, ModelLoader};
use thiserror::Error;
use tracing::info;

/// Proctoring setup error types
#[derive(Error, Debug)]
pub enum ProctorError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Model(#[from] LandmarkError),
}

/// Everything needed to bring proctoring up for one call
pub struct ProctorSetup<'a> {
    pub camera: &'a dyn CameraDevice,
    pub camera_config: &'a CameraConfig,
    pub loader: &'a dyn ModelLoader,
    pub model_timeout: Duration,
    pub config: ProctorConfig,
}

/// Acquire a fresh camera stream and model, then start the frame loop.
///
/// Camera and model are acquired concurrently; the loop only starts once
/// both are ready. On failure anything already acquired is released.
pub async fn start_proctoring(setup: ProctorSetup<'_>, board: AlertBoard) -> Result<FrameFeeder, ProctorError> {
    board.mark_starting();

    let camera = async { setup.camera.open(setup.camera_config).await.map_err(ProctorError::from) };
    let model = async {
        load_with_timeout(setup.loader, setup.model_timeout)
            .await
            .map_err(ProctorError::from)
    };
    let (stream, source) = tokio::try_join!(camera, model)?;

    info!("Camera stream {} and model ready", stream.id());
    let evaluator = ProctorEvaluator::new(setup.config);
    Ok(FrameFeeder::start(stream, source, evaluator, board))
}
