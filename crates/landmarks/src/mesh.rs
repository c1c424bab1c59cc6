//! Face mesh geometry

use serde::{Deserialize, Serialize};

/// A single landmark in normalized image coordinates ([0, 1] on x and y)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Relative depth, same scale as x
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Named points on the refined (iris-level) face mesh.
///
/// This is the only place mesh indices appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshPoint {
    /// Subject's right eye, outer corner (image left)
    RightEyeOuterCorner,
    /// Subject's left eye, outer corner (image right)
    LeftEyeOuterCorner,
    RightIrisCenter,
    LeftIrisCenter,
    Forehead,
    Chin,
}

impl MeshPoint {
    /// Points in the base mesh, without iris refinement
    pub const BASE_POINT_COUNT: usize = 468;
    /// Points in the refined mesh
    pub const REFINED_POINT_COUNT: usize = 478;

    /// Index into the landmark sequence
    pub const fn index(self) -> usize {
        match self {
            MeshPoint::RightEyeOuterCorner => 33,
            MeshPoint::LeftEyeOuterCorner => 263,
            MeshPoint::RightIrisCenter => 468,
            MeshPoint::LeftIrisCenter => 473,
            MeshPoint::Forehead => 10,
            MeshPoint::Chin => 152,
        }
    }
}

/// Landmarks for one detected face in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    points: Vec<Landmark>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether iris landmarks are present
    pub fn is_refined(&self) -> bool {
        self.points.len() >= MeshPoint::REFINED_POINT_COUNT
    }

    /// Look up a named point. `None` if the mesh is too short or the point
    /// is not a finite coordinate.
    pub fn get(&self, point: MeshPoint) -> Option<Landmark> {
        self.points
            .get(point.index())
            .copied()
            .filter(Landmark::is_finite)
    }

    pub fn right_eye_outer_corner(&self) -> Option<Landmark> {
        self.get(MeshPoint::RightEyeOuterCorner)
    }

    pub fn left_eye_outer_corner(&self) -> Option<Landmark> {
        self.get(MeshPoint::LeftEyeOuterCorner)
    }

    pub fn right_iris_center(&self) -> Option<Landmark> {
        self.get(MeshPoint::RightIrisCenter)
    }

    pub fn left_iris_center(&self) -> Option<Landmark> {
        self.get(MeshPoint::LeftIrisCenter)
    }

    /// Height of the face: max y minus min y over every landmark
    pub fn vertical_extent(&self) -> Option<f64> {
        let mut iter = self.points.iter().map(|p| f64::from(p.y));
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), y| (lo.min(y), hi.max(y)));
        let extent = max - min;
        extent.is_finite().then_some(extent)
    }
}
