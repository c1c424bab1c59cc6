//! Proctoring configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which battery of rules the evaluator runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorMode {
    /// Face count, then head turn, gaze and posture for a single face
    #[default]
    Detailed,
    /// Report face and people counts only
    Counting,
}

/// Proctoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    /// Minimum time between evaluations (milliseconds)
    pub evaluation_interval_ms: u64,

    /// Allowed horizontal offset of the eye-corner midpoint from frame center
    pub head_turn_tolerance: f64,

    /// Allowed horizontal offset of each iris center from its outer eye corner
    pub gaze_tolerance: f64,

    /// Minimum face height as a fraction of the frame height
    pub min_face_height: f64,

    pub mode: EvaluatorMode,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_ms: 1000,
            head_turn_tolerance: 0.12,
            gaze_tolerance: 0.04,
            min_face_height: 0.18,
            mode: EvaluatorMode::Detailed,
        }
    }
}

impl ProctorConfig {
    /// Create strict config (tighter tolerances)
    pub fn strict() -> Self {
        Self {
            head_turn_tolerance: 0.08,
            gaze_tolerance: 0.03,
            min_face_height: 0.22,
            ..Default::default()
        }
    }

    /// Create lenient config (looser tolerances)
    pub fn lenient() -> Self {
        Self {
            head_turn_tolerance: 0.16,
            gaze_tolerance: 0.06,
            min_face_height: 0.14,
            ..Default::default()
        }
    }

    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_millis(self.evaluation_interval_ms)
    }
}
