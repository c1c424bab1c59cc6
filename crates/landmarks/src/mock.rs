//! Mock landmark sources and face fixtures

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use camera_capture::VideoFrame;
use tracing::debug;

use crate::mesh::{FaceLandmarks, Landmark, MeshPoint};
use crate::{LandmarkError, LandmarkSource, ModelLoader};

/// Builds a refined mesh with controllable proctoring geometry.
///
/// Every point starts at the top edge of the face; the chin sits on the
/// bottom edge, so the vertical extent is exactly `bottom - top`.
#[derive(Debug, Clone)]
pub struct FaceBuilder {
    eye_midpoint_x: f32,
    eye_half_span: f32,
    eye_corners: Option<(f32, f32)>,
    iris_offset: f32,
    top: f32,
    bottom: f32,
    point_count: usize,
}

impl FaceBuilder {
    /// Centered, eyes forward, filling 40% of the frame height
    pub fn compliant() -> Self {
        Self {
            eye_midpoint_x: 0.5,
            eye_half_span: 0.1,
            eye_corners: None,
            iris_offset: 0.0,
            top: 0.25,
            bottom: 0.65,
            point_count: MeshPoint::REFINED_POINT_COUNT,
        }
    }

    /// Midpoint of the two outer eye corners
    pub fn eye_midpoint(mut self, x: f32) -> Self {
        self.eye_midpoint_x = x;
        self
    }

    /// Place the right and left outer eye corners directly
    pub fn eye_corners(mut self, right_x: f32, left_x: f32) -> Self {
        self.eye_corners = Some((right_x, left_x));
        self
    }

    /// Horizontal distance of each iris center from its outer eye corner
    pub fn iris_offset(mut self, offset: f32) -> Self {
        self.iris_offset = offset;
        self
    }

    /// Top and bottom face edges
    pub fn vertical_span(mut self, top: f32, bottom: f32) -> Self {
        self.top = top;
        self.bottom = bottom;
        self
    }

    /// Truncate the mesh (drops iris points below 478)
    pub fn point_count(mut self, count: usize) -> Self {
        self.point_count = count;
        self
    }

    pub fn build(&self) -> FaceLandmarks {
        let mut points = vec![Landmark::new(self.eye_midpoint_x, self.top, 0.0); MeshPoint::REFINED_POINT_COUNT];
        let eye_y = self.top + (self.bottom - self.top) * 0.4;
        let (right_x, left_x) = self.eye_corners.unwrap_or((
            self.eye_midpoint_x - self.eye_half_span,
            self.eye_midpoint_x + self.eye_half_span,
        ));

        points[MeshPoint::RightEyeOuterCorner.index()] = Landmark::new(right_x, eye_y, 0.0);
        points[MeshPoint::LeftEyeOuterCorner.index()] = Landmark::new(left_x, eye_y, 0.0);
        points[MeshPoint::RightIrisCenter.index()] = Landmark::new(right_x + self.iris_offset, eye_y, 0.0);
        points[MeshPoint::LeftIrisCenter.index()] = Landmark::new(left_x + self.iris_offset, eye_y, 0.0);
        points[MeshPoint::Forehead.index()] = Landmark::new(self.eye_midpoint_x, self.top, 0.0);
        points[MeshPoint::Chin.index()] = Landmark::new(self.eye_midpoint_x, self.bottom, 0.0);

        points.truncate(self.point_count);
        FaceLandmarks::new(points)
    }
}

/// Always returns the same faces. Used when no model is configured.
#[derive(Debug, Clone)]
pub struct StaticLandmarkSource {
    faces: Vec<FaceLandmarks>,
}

impl StaticLandmarkSource {
    pub fn new(faces: Vec<FaceLandmarks>) -> Self {
        Self { faces }
    }
}

impl Default for StaticLandmarkSource {
    fn default() -> Self {
        Self::new(vec![FaceBuilder::compliant().build()])
    }
}

#[async_trait]
impl LandmarkSource for StaticLandmarkSource {
    async fn estimate_faces(&mut self, _frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, LandmarkError> {
        Ok(self.faces.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

enum ScriptStep {
    Faces(Vec<FaceLandmarks>),
    Fail(String),
}

#[derive(Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    fallback: Vec<FaceLandmarks>,
}

/// Replays queued results, then repeats a fallback.
///
/// Clones share the script and call counter, so a test can keep a handle
/// after handing the source to a frame loop.
#[derive(Clone, Default)]
pub struct ScriptedLandmarkSource {
    state: Arc<Mutex<ScriptState>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedLandmarkSource {
    /// Source returning `fallback` whenever the script is empty
    pub fn new(fallback: Vec<FaceLandmarks>) -> Self {
        let source = Self::default();
        if let Ok(mut state) = source.state.lock() {
            state.fallback = fallback;
        }
        source
    }

    /// Queue a result for a future frame
    pub fn push(&self, faces: Vec<FaceLandmarks>) {
        if let Ok(mut state) = self.state.lock() {
            state.steps.push_back(ScriptStep::Faces(faces));
        }
    }

    /// Queue an inference failure for a future frame
    pub fn push_error(&self, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.steps.push_back(ScriptStep::Fail(message.to_string()));
        }
    }

    /// Number of `estimate_faces` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LandmarkSource for ScriptedLandmarkSource {
    async fn estimate_faces(&mut self, frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, LandmarkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self
            .state
            .lock()
            .map_err(|e| LandmarkError::Inference(format!("Lock error: {}", e)))?;

        debug!("Scripted inference for frame {}", frame.sequence);
        match state.steps.pop_front() {
            Some(ScriptStep::Faces(faces)) => Ok(faces),
            Some(ScriptStep::Fail(message)) => Err(LandmarkError::Inference(message)),
            None => Ok(state.fallback.clone()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Loader handing out clones of a scripted source
pub struct ScriptedModelLoader {
    source: ScriptedLandmarkSource,
    delay: Duration,
    failure: Option<String>,
    loads: AtomicUsize,
}

impl ScriptedModelLoader {
    pub fn new(source: ScriptedLandmarkSource) -> Self {
        Self {
            source,
            delay: Duration::ZERO,
            failure: None,
            loads: AtomicUsize::new(0),
        }
    }

    /// A loader whose every load fails
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(ScriptedLandmarkSource::default())
        }
    }

    /// Delay before the model reports ready
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of load attempts so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for ScriptedModelLoader {
    async fn load(&self) -> Result<Box<dyn LandmarkSource>, LandmarkError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(LandmarkError::ModelLoad(message.clone())),
            None => Ok(Box::new(self.source.clone())),
        }
    }
}
