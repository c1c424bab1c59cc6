//! Proctoring heuristics

use alerting::{AlertLabel, AlertSet};
use landmarks::{FaceLandmarks, Landmark};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{EvaluatorMode, ProctorConfig};

/// Horizontal center of the frame in normalized coordinates
const FRAME_CENTER_X: f64 = 0.5;

/// Landmarks arrive in single precision. A measurement within this distance
/// of a threshold is treated as lying on it, so exclusive bounds stay exclusive.
const BOUNDARY_EPSILON: f64 = 1e-6;

/// Time of the last admitted evaluation
#[derive(Debug, Clone, Default)]
pub struct EvaluationClock {
    last: Option<Instant>,
}

impl EvaluationClock {
    /// Admit `now` if at least `interval` has passed since the last admission
    pub fn admit(&mut self, now: Instant, interval: Duration) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

/// Turns landmark results into alert sets, at most once per interval
#[derive(Debug, Clone)]
pub struct ProctorEvaluator {
    config: ProctorConfig,
    clock: EvaluationClock,
    evaluations: u64,
}

impl ProctorEvaluator {
    pub fn new(config: ProctorConfig) -> Self {
        Self {
            config,
            clock: EvaluationClock::default(),
            evaluations: 0,
        }
    }

    /// Evaluate one landmark result.
    ///
    /// Returns `None` without touching any state when called within the
    /// rate-limit window of the previous evaluation.
    pub fn evaluate(&mut self, faces: &[FaceLandmarks], now: Instant) -> Option<AlertSet> {
        if !self.clock.admit(now, self.config.evaluation_interval()) {
            return None;
        }
        self.evaluations += 1;

        let alerts = match self.config.mode {
            EvaluatorMode::Detailed => self.detailed(faces),
            EvaluatorMode::Counting => counting(faces),
        };
        Some(alerts)
    }

    /// Number of admitted evaluations
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    fn detailed(&self, faces: &[FaceLandmarks]) -> AlertSet {
        match faces {
            [] => AlertSet::from(vec![AlertLabel::NoFace]),
            [face] => self.geometry(face),
            _ => AlertSet::from(vec![AlertLabel::MultipleFaces]),
        }
    }

    fn geometry(&self, face: &FaceLandmarks) -> AlertSet {
        let mut alerts = AlertSet::new();
        let rules: [(AlertLabel, Option<bool>); 3] = [
            (AlertLabel::HeadTurned, self.head_turned(face)),
            (AlertLabel::GazeOffScreen, self.gaze_off_screen(face)),
            (AlertLabel::TooFar, self.too_far(face)),
        ];

        for (label, outcome) in rules {
            match outcome {
                Some(true) => alerts.push(label),
                Some(false) => {}
                None => debug!("Rule '{}' skipped: landmarks missing", label),
            }
        }
        alerts
    }

    fn head_turned(&self, face: &FaceLandmarks) -> Option<bool> {
        let right = face.right_eye_outer_corner()?;
        let left = face.left_eye_outer_corner()?;
        let midpoint = (f64::from(right.x) + f64::from(left.x)) / 2.0;
        Some(exceeds((midpoint - FRAME_CENTER_X).abs(), self.config.head_turn_tolerance))
    }

    fn gaze_off_screen(&self, face: &FaceLandmarks) -> Option<bool> {
        let right = horizontal_offset(face.right_iris_center()?, face.right_eye_outer_corner()?);
        let left = horizontal_offset(face.left_iris_center()?, face.left_eye_outer_corner()?);
        let tolerance = self.config.gaze_tolerance;
        Some(exceeds(right, tolerance) || exceeds(left, tolerance))
    }

    fn too_far(&self, face: &FaceLandmarks) -> Option<bool> {
        Some(face.vertical_extent()? < self.config.min_face_height - BOUNDARY_EPSILON)
    }
}

fn horizontal_offset(a: Landmark, b: Landmark) -> f64 {
    (f64::from(a.x) - f64::from(b.x)).abs()
}

/// Strictly greater than `limit`
fn exceeds(value: f64, limit: f64) -> bool {
    value > limit + BOUNDARY_EPSILON
}

fn counting(faces: &[FaceLandmarks]) -> AlertSet {
    let mut alerts = AlertSet::from(vec![AlertLabel::FaceCount(faces.len())]);
    if faces.len() > 1 {
        alerts.push(AlertLabel::PeopleDetected(faces.len()));
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use landmarks::FaceBuilder;
    use proptest::prelude::*;

    fn evaluator() -> ProctorEvaluator {
        ProctorEvaluator::new(ProctorConfig::default())
    }

    fn evaluate_once(faces: &[FaceLandmarks]) -> AlertSet {
        evaluator().evaluate(faces, Instant::now()).unwrap()
    }

    fn single(builder: FaceBuilder) -> AlertSet {
        evaluate_once(&[builder.build()])
    }

    #[test]
    fn no_face() {
        assert_eq!(evaluate_once(&[]).labels(), &[AlertLabel::NoFace]);
    }

    #[test]
    fn multiple_faces_suppress_geometry() {
        let turned = FaceBuilder::compliant().eye_midpoint(0.9).vertical_span(0.0, 0.05).build();
        let alerts = evaluate_once(&[turned.clone(), turned]);
        assert_eq!(alerts.labels(), &[AlertLabel::MultipleFaces]);
    }

    #[test]
    fn compliant_face_is_clear() {
        assert!(single(FaceBuilder::compliant()).is_empty());
    }

    #[test]
    fn head_turn_boundary() {
        assert!(!single(FaceBuilder::compliant().eye_midpoint(0.5)).contains(AlertLabel::HeadTurned));
        assert!(single(FaceBuilder::compliant().eye_midpoint(0.63)).contains(AlertLabel::HeadTurned));
        assert!(single(FaceBuilder::compliant().eye_midpoint(0.37)).contains(AlertLabel::HeadTurned));
    }

    #[test]
    fn gaze_boundary() {
        assert!(!single(FaceBuilder::compliant().iris_offset(0.0)).contains(AlertLabel::GazeOffScreen));
        assert!(single(FaceBuilder::compliant().iris_offset(0.05)).contains(AlertLabel::GazeOffScreen));
        assert!(single(FaceBuilder::compliant().iris_offset(-0.05)).contains(AlertLabel::GazeOffScreen));
    }

    #[test]
    fn posture_boundary_is_exclusive() {
        assert!(!single(FaceBuilder::compliant().vertical_span(0.0, 0.18)).contains(AlertLabel::TooFar));
        assert!(single(FaceBuilder::compliant().vertical_span(0.0, 0.10)).contains(AlertLabel::TooFar));
    }

    fn face_with_corners(right_x: f32, left_x: f32) -> FaceLandmarks {
        FaceBuilder::compliant().eye_corners(right_x, left_x).build()
    }

    #[test]
    fn head_turn_exactly_at_tolerance_does_not_fire() {
        let alerts = evaluate_once(&[face_with_corners(0.50, 0.74)]);
        assert!(!alerts.contains(AlertLabel::HeadTurned), "{:?}", alerts);

        let alerts = evaluate_once(&[face_with_corners(0.26, 0.50)]);
        assert!(!alerts.contains(AlertLabel::HeadTurned), "{:?}", alerts);

        let alerts = evaluate_once(&[face_with_corners(0.50, 0.7402)]);
        assert!(alerts.contains(AlertLabel::HeadTurned));
    }

    #[test]
    fn gaze_exactly_at_tolerance_does_not_fire() {
        let alerts = single(FaceBuilder::compliant().eye_corners(0.37, 0.63).iris_offset(0.04));
        assert!(!alerts.contains(AlertLabel::GazeOffScreen), "{:?}", alerts);

        let alerts = single(FaceBuilder::compliant().eye_corners(0.37, 0.63).iris_offset(0.0401));
        assert!(alerts.contains(AlertLabel::GazeOffScreen));
    }

    #[test]
    fn posture_exactly_at_minimum_does_not_fire() {
        for (top, bottom) in [(0.4, 0.58), (0.3, 0.48), (0.1, 0.28)] {
            let alerts = single(FaceBuilder::compliant().vertical_span(top, bottom));
            assert!(!alerts.contains(AlertLabel::TooFar), "span {}..{}: {:?}", top, bottom, alerts);
        }
        assert!(single(FaceBuilder::compliant().vertical_span(0.4, 0.5799)).contains(AlertLabel::TooFar));
    }

    #[test]
    fn rules_are_additive_in_fixed_order() {
        let alerts = single(
            FaceBuilder::compliant()
                .eye_midpoint(0.7)
                .iris_offset(0.08)
                .vertical_span(0.4, 0.5),
        );
        assert_eq!(
            alerts.labels(),
            &[AlertLabel::HeadTurned, AlertLabel::GazeOffScreen, AlertLabel::TooFar]
        );
    }

    #[test]
    fn missing_iris_only_disables_gaze_rule() {
        let face = FaceBuilder::compliant()
            .eye_midpoint(0.8)
            .vertical_span(0.0, 0.05)
            .point_count(468)
            .build();
        let alerts = evaluate_once(&[face]);
        assert_eq!(alerts.labels(), &[AlertLabel::HeadTurned, AlertLabel::TooFar]);
    }

    #[test]
    fn empty_mesh_fires_nothing() {
        let alerts = evaluate_once(&[FaceLandmarks::new(vec![])]);
        assert!(alerts.is_empty());
    }

    #[test]
    fn rate_limit_skips_within_window() {
        let mut evaluator = evaluator();
        let t0 = Instant::now();

        assert!(evaluator.evaluate(&[], t0).is_some());
        assert!(evaluator.evaluate(&[], t0 + Duration::from_millis(999)).is_none());
        assert_eq!(evaluator.evaluations(), 1);
        // The skipped call must not move the window.
        assert!(evaluator.evaluate(&[], t0 + Duration::from_millis(1000)).is_some());
    }

    #[test]
    fn counting_mode_reports_counts() {
        let mut evaluator = ProctorEvaluator::new(ProctorConfig {
            mode: EvaluatorMode::Counting,
            ..Default::default()
        });
        let t0 = Instant::now();
        let face = FaceBuilder::compliant().eye_midpoint(0.9).build();

        let one = evaluator.evaluate(&[face.clone()], t0).unwrap();
        assert_eq!(one.labels(), &[AlertLabel::FaceCount(1)]);

        let three = evaluator
            .evaluate(&[face.clone(), face.clone(), face], t0 + Duration::from_secs(1))
            .unwrap();
        assert_eq!(three.labels(), &[AlertLabel::FaceCount(3), AlertLabel::PeopleDetected(3)]);
    }

    fn rule_rank(label: &AlertLabel) -> usize {
        match label {
            AlertLabel::HeadTurned => 0,
            AlertLabel::GazeOffScreen => 1,
            AlertLabel::TooFar => 2,
            _ => usize::MAX,
        }
    }

    proptest! {
        #[test]
        fn count_alerts_exclude_geometry(
            faces in 0usize..5,
            mid in 0.0f32..1.0,
            iris in -0.2f32..0.2,
            bottom in 0.0f32..1.0,
        ) {
            let face = FaceBuilder::compliant()
                .eye_midpoint(mid)
                .iris_offset(iris)
                .vertical_span(0.0, bottom)
                .build();
            let alerts = evaluate_once(&vec![face; faces]);

            if faces == 1 {
                prop_assert!(alerts.labels().iter().all(|l| !l.is_count_alert()));
                let ranks: Vec<_> = alerts.labels().iter().map(rule_rank).collect();
                prop_assert!(ranks.windows(2).all(|w| w[0] < w[1]));
            } else {
                prop_assert_eq!(alerts.len(), 1);
                prop_assert!(alerts.labels()[0].is_count_alert());
            }
        }

        #[test]
        fn second_call_within_window_is_noop(gap_ms in 0u64..1000, faces in 0usize..3) {
            let mut evaluator = evaluator();
            let t0 = Instant::now();
            let batch = vec![FaceBuilder::compliant().build(); faces];

            prop_assert!(evaluator.evaluate(&batch, t0).is_some());
            prop_assert!(evaluator.evaluate(&[], t0 + Duration::from_millis(gap_ms)).is_none());
            prop_assert_eq!(evaluator.evaluations(), 1);
        }
    }
}
