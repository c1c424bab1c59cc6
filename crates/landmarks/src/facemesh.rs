//! Face mesh model using tract-onnx

use async_trait::async_trait;
use camera_capture::VideoFrame;
use image::imageops::FilterType;
use tracing::{debug, error, info, warn};
use tract_onnx::prelude::*;

use crate::mesh::{FaceLandmarks, Landmark};
use crate::mock::StaticLandmarkSource;
use crate::{LandmarkError, LandmarkSource, ModelConfig, ModelLoader};

type FaceMeshPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Loads the face mesh model on the blocking pool
pub struct FaceMeshLoader {
    config: ModelConfig,
}

impl FaceMeshLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ModelLoader for FaceMeshLoader {
    async fn load(&self) -> Result<Box<dyn LandmarkSource>, LandmarkError> {
        self.config.validate()?;

        let Some(path) = self.config.model_path.clone() else {
            warn!("No face mesh model path configured. Using static landmark source.");
            return Ok(Box::new(StaticLandmarkSource::default()));
        };

        let input_size = self.config.input_size;
        let plan = tokio::task::spawn_blocking(move || build_plan(&path, input_size))
            .await
            .map_err(|e| LandmarkError::ModelLoad(e.to_string()))??;

        Ok(Box::new(FaceMeshSource {
            plan,
            input_size,
            face_confidence: self.config.face_confidence,
        }))
    }
}

fn build_plan(path: &str, input_size: u32) -> Result<FaceMeshPlan, LandmarkError> {
    info!("Loading face mesh model from {}", path);
    let size = input_size as usize;

    tract_onnx::onnx()
        .model_for_path(path)
        .and_then(|model| model.with_input_fact(0, f32::fact([1, size, size, 3]).into()))
        .and_then(|model| model.into_optimized())
        .and_then(|model| model.into_runnable())
        .map_err(|e| {
            error!("Failed to load face mesh model: {}", e);
            LandmarkError::ModelLoad(e.to_string())
        })
}

/// Single-face mesh model.
///
/// Output 0 holds `x, y, z` triples in input pixel units; an optional
/// output 1 holds the face presence logit.
pub struct FaceMeshSource {
    plan: FaceMeshPlan,
    input_size: u32,
    face_confidence: f32,
}

#[async_trait]
impl LandmarkSource for FaceMeshSource {
    async fn estimate_faces(&mut self, frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, LandmarkError> {
        // 1. Preprocess: resize and scale to 0..1 (NHWC)
        let img = frame
            .to_rgb_image()
            .ok_or_else(|| LandmarkError::Inference("Frame buffer does not match dimensions".into()))?;
        let size = self.input_size;
        let resized = image::imageops::resize(&img, size, size, FilterType::Triangle);

        let s = size as usize;
        let input: Tensor = tract_ndarray::Array4::from_shape_fn((1, s, s, 3), |(_, y, x, c)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        })
        .into();

        // 2. Inference
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| LandmarkError::Inference(e.to_string()))?;

        // 3. Face presence gate
        if let Some(score) = outputs.get(1) {
            let logit = score
                .to_array_view::<f32>()
                .map_err(|e| LandmarkError::InvalidOutput(e.to_string()))?
                .iter()
                .next()
                .copied()
                .unwrap_or(f32::NEG_INFINITY);
            let presence = sigmoid(logit);
            if presence < self.face_confidence {
                debug!("Face presence {:.2} below threshold", presence);
                return Ok(Vec::new());
            }
        }

        // 4. Decode landmarks
        let coords = outputs
            .first()
            .ok_or_else(|| LandmarkError::InvalidOutput("model produced no outputs".into()))?
            .to_array_view::<f32>()
            .map_err(|e| LandmarkError::InvalidOutput(e.to_string()))?;
        let flat: Vec<f32> = coords.iter().copied().collect();

        Ok(vec![decode_landmarks(&flat, size)?])
    }

    fn name(&self) -> &str {
        "face-mesh"
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Convert flat pixel-unit triples to normalized landmarks
pub fn decode_landmarks(flat: &[f32], input_size: u32) -> Result<FaceLandmarks, LandmarkError> {
    if input_size == 0 {
        return Err(LandmarkError::InvalidOutput("input size must be non-zero".into()));
    }
    if flat.is_empty() || flat.len() % 3 != 0 {
        return Err(LandmarkError::InvalidOutput(format!(
            "expected x,y,z triples, got {} values",
            flat.len()
        )));
    }

    let scale = input_size as f32;
    let points = flat
        .chunks_exact(3)
        .map(|c| Landmark::new(c[0] / scale, c[1] / scale, c[2] / scale))
        .collect();
    Ok(FaceLandmarks::new(points))
}
