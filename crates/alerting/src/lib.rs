//! Alerting System
//!
//! Provides the proctoring alert vocabulary and the alert board: the single
//! latest set of alerts, replaced on every evaluation and observed by the UI.

mod board;
mod labels;

pub use board::{AlertBoard, ProctorSnapshot, ProctoringStatus};
pub use labels::{AlertLabel, AlertSet};
