//! Landmark model configuration

use serde::{Deserialize, Serialize};

use crate::LandmarkError;

/// Landmark model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX face mesh model path (static mock source when unset)
    pub model_path: Option<String>,

    /// Square input resolution expected by the model
    pub input_size: u32,

    /// Minimum face presence score for a detection to count
    pub face_confidence: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_size: 192,
            face_confidence: 0.5,
        }
    }
}

impl ModelConfig {
    /// Validate model input parameters
    pub fn validate(&self) -> Result<(), LandmarkError> {
        if self.input_size == 0 {
            return Err(LandmarkError::ModelLoad("input size must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.face_confidence) {
            return Err(LandmarkError::ModelLoad(format!(
                "face confidence {} outside 0..=1",
                self.face_confidence
            )));
        }
        Ok(())
    }
}
