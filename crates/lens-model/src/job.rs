//! Job lifecycle types
//!
//! A job is one logical invocation of the remote analysis process. Handles
//! live only in memory; they are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No job has run yet
    Idle,
    /// Transport call in flight
    Running,
    /// Completed and merged
    Succeeded,
    /// Transport reported an error
    Failed,
    /// Cancelled before completion
    Cancelled,
}

impl JobStatus {
    /// Whether the job reached a terminal state
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether a transport call is in flight
    #[inline]
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Observable state of one job
///
/// `progress_percent` is advisory: while running it is simulated and capped
/// below 100; only real completion sets 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    /// Current lifecycle status
    pub status: JobStatus,
    /// 0-100, monotonically non-decreasing while running
    pub progress_percent: u8,
    /// When the job was started
    pub started_at: DateTime<Utc>,
    /// Terminal error message, if the job failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSnapshot {
    /// Snapshot of a dataset that has never run
    #[inline]
    #[must_use]
    pub fn idle() -> Self {
        Self {
            status: JobStatus::Idle,
            progress_percent: 0,
            started_at: Utc::now(),
            error: None,
        }
    }

    /// Snapshot of a freshly started job
    #[inline]
    #[must_use]
    pub fn running(started_at: DateTime<Utc>) -> Self {
        Self {
            status: JobStatus::Running,
            progress_percent: 0,
            started_at,
            error: None,
        }
    }
}

impl Default for JobSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
