//! Latest-alert board

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::labels::AlertSet;

/// Whether proctoring is running for the current call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProctoringStatus {
    /// No call in progress
    #[default]
    Idle,
    /// Camera and model being acquired
    Starting,
    /// Frames are being evaluated
    Running,
    /// Setup failed; the interview continues without proctoring
    Unavailable { reason: String },
    /// Call ended and resources were released
    Stopped,
}

/// What the UI renders
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProctorSnapshot {
    pub status: ProctoringStatus,
    /// False until the first evaluation of the current call
    pub has_evaluated_once: bool,
    /// Alerts from the most recent evaluation
    pub alerts: AlertSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl ProctorSnapshot {
    /// Running, evaluated at least once, nothing flagged
    pub fn is_all_clear(&self) -> bool {
        self.status == ProctoringStatus::Running && self.has_evaluated_once && self.alerts.is_empty()
    }
}

/// Holds the latest [`ProctorSnapshot`] and notifies subscribers on change.
///
/// Each publish replaces the previous alert set; there is no history.
#[derive(Debug, Clone)]
pub struct AlertBoard {
    tx: Arc<watch::Sender<ProctorSnapshot>>,
}

impl AlertBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProctorSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current alert set
    pub fn publish(&self, alerts: AlertSet) {
        debug!("Publishing alerts: {:?}", alerts.to_strings());
        self.tx.send_modify(|snapshot| {
            snapshot.alerts = alerts;
            snapshot.has_evaluated_once = true;
            snapshot.evaluated_at = Some(Utc::now());
        });
    }

    /// Forget everything from the previous call
    pub fn reset(&self) {
        self.tx.send_replace(ProctorSnapshot::default());
    }

    pub fn mark_starting(&self) {
        self.set_status(ProctoringStatus::Starting);
    }

    pub fn mark_running(&self) {
        info!("Proctoring running");
        self.set_status(ProctoringStatus::Running);
    }

    pub fn mark_unavailable(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Proctoring unavailable: {}", reason);
        self.set_status(ProctoringStatus::Unavailable { reason });
    }

    /// Mark the end of proctoring. An unavailable status is kept so the UI
    /// can still tell that proctoring never ran.
    pub fn mark_stopped(&self) {
        self.tx.send_modify(|snapshot| {
            if !matches!(snapshot.status, ProctoringStatus::Unavailable { .. }) {
                snapshot.status = ProctoringStatus::Stopped;
            }
        });
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ProctorSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<ProctorSnapshot> {
        self.tx.subscribe()
    }

    fn set_status(&self, status: ProctoringStatus) {
        self.tx.send_modify(|snapshot| snapshot.status = status);
    }
}

impl Default for AlertBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::AlertLabel;

    #[test]
    fn not_evaluated_is_not_all_clear() {
        let board = AlertBoard::new();
        board.mark_running();

        let snapshot = board.snapshot();
        assert!(!snapshot.has_evaluated_once);
        assert!(!snapshot.is_all_clear());

        board.publish(AlertSet::new());
        assert!(board.snapshot().is_all_clear());
    }

    #[test]
    fn publish_replaces_previous_set() {
        let board = AlertBoard::new();
        board.mark_running();
        board.publish(AlertSet::from(vec![AlertLabel::HeadTurned, AlertLabel::TooFar]));
        board.publish(AlertSet::from(vec![AlertLabel::GazeOffScreen]));

        let snapshot = board.snapshot();
        assert_eq!(snapshot.alerts.labels(), &[AlertLabel::GazeOffScreen]);
    }

    #[test]
    fn snapshot_json_uses_camel_case_keys() {
        let board = AlertBoard::new();
        board.mark_running();
        board.publish(AlertSet::from(vec![AlertLabel::NoFace]));

        let json = serde_json::to_value(board.snapshot()).unwrap();
        assert_eq!(json["status"]["state"], "running");
        assert_eq!(json["hasEvaluatedOnce"], true);
        assert!(json["evaluatedAt"].is_string());
        assert!(json.get("has_evaluated_once").is_none());
    }

    #[test]
    fn unavailable_survives_stop() {
        let board = AlertBoard::new();
        board.mark_unavailable("camera denied");
        board.mark_stopped();

        assert!(matches!(board.snapshot().status, ProctoringStatus::Unavailable { .. }));

        board.reset();
        assert_eq!(board.snapshot(), ProctorSnapshot::default());
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let board = AlertBoard::new();
        let mut rx = board.subscribe();

        board.publish(AlertSet::from(vec![AlertLabel::NoFace]));

        rx.changed().await.unwrap();
        assert!(rx.borrow().alerts.contains(AlertLabel::NoFace));
    }
}
