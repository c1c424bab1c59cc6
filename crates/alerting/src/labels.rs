//! Alert vocabulary

use serde::{Serialize, Serializer};
use std::fmt;

/// One proctoring concern. Presence only, no severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertLabel {
    NoFace,
    MultipleFaces,
    HeadTurned,
    GazeOffScreen,
    TooFar,
    /// Counting mode: number of faces seen
    FaceCount(usize),
    /// Counting mode: more than one person in frame
    PeopleDetected(usize),
}

impl AlertLabel {
    /// Whether this label concerns the number of faces rather than geometry
    pub fn is_count_alert(&self) -> bool {
        matches!(
            self,
            AlertLabel::NoFace
                | AlertLabel::MultipleFaces
                | AlertLabel::FaceCount(_)
                | AlertLabel::PeopleDetected(_)
        )
    }
}

impl fmt::Display for AlertLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLabel::NoFace => f.write_str("No face detected"),
            AlertLabel::MultipleFaces => f.write_str("Multiple faces detected"),
            AlertLabel::HeadTurned => f.write_str("Head turned away"),
            AlertLabel::GazeOffScreen => f.write_str("Eyes looking off-screen"),
            AlertLabel::TooFar => f.write_str("Too far / slouching"),
            AlertLabel::FaceCount(n) => write!(f, "Face count: {}", n),
            AlertLabel::PeopleDetected(n) => write!(f, "People detected: {}", n),
        }
    }
}

impl Serialize for AlertLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Labels from one evaluation, in rule order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AlertSet(Vec<AlertLabel>);

impl AlertSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: AlertLabel) {
        self.0.push(label);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, label: AlertLabel) -> bool {
        self.0.contains(&label)
    }

    pub fn labels(&self) -> &[AlertLabel] {
        &self.0
    }

    /// Human-readable labels
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl From<Vec<AlertLabel>> for AlertSet {
    fn from(labels: Vec<AlertLabel>) -> Self {
        Self(labels)
    }
}

impl FromIterator<AlertLabel> for AlertSet {
    fn from_iter<I: IntoIterator<Item = AlertLabel>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
