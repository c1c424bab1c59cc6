//! Face Landmark Model
//!
//! Landmark source for the proctoring pipeline:
//! - Face mesh geometry with named accessors over a fixed index table
//! - Model loading with a bounded readiness wait
//! - tract-onnx face mesh inference
//! - Static and scripted sources for development and tests

pub mod config;
pub mod facemesh;
pub mod mesh;
pub mod mock;

pub use config::ModelConfig;
pub use facemesh::{FaceMeshLoader, FaceMeshSource};
pub use mesh::{FaceLandmarks, Landmark, MeshPoint};
pub use mock::{FaceBuilder, ScriptedLandmarkSource, ScriptedModelLoader, StaticLandmarkSource};

use std::time::Duration;

use async_trait::async_trait;
use camera_capture::VideoFrame;
use thiserror::Error;
use tracing::{info, warn};

/// Landmark model error types
#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Model not ready after {0}ms")]
    ModelLoadTimeout(u64),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
}

/// Produces face landmarks for one frame at a time.
///
/// Implementations are owned by a single frame loop, so calls never overlap.
#[async_trait]
pub trait LandmarkSource: Send {
    /// Detect faces in the frame, one entry per face
    async fn estimate_faces(&mut self, frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, LandmarkError>;

    /// Short name for logs
    fn name(&self) -> &str {
        "landmarks"
    }
}

/// Loads a landmark model.
///
/// Every call yields a fresh model handle; dropping the handle releases it.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Box<dyn LandmarkSource>, LandmarkError>;
}

/// Wait for a model to become ready, giving up after `timeout`
pub async fn load_with_timeout(
    loader: &dyn ModelLoader,
    timeout: Duration,
) -> Result<Box<dyn LandmarkSource>, LandmarkError> {
    match tokio::time::timeout(timeout, loader.load()).await {
        Ok(Ok(source)) => {
            info!("Landmark model ready ({})", source.name());
            Ok(source)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            let ms = timeout.as_millis() as u64;
            warn!("Landmark model not ready after {}ms", ms);
            Err(LandmarkError::ModelLoadTimeout(ms))
        }
    }
}
