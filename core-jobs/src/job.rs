//! # Job State Machine
//!
//! Manages the lifecycle of subtitle-generation jobs with validated state
//! transitions.
//!
//! ## State Machine
//!
//! ```text
//! Pending → Running → Completed
//!     ↑         ↓
//!     └────── Failed   (retry resets Failed → Pending)
//! ```
//!
//! No transition leaves `Completed`. Cancellation is not a state: a job can
//! only be cancelled by deleting its row while still `Pending`.

use crate::{JobError, Result};
use core_catalog::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Type
// ============================================================================

/// Unique identifier for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Create a new random job ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| JobError::InvalidJobId(e.to_string()))?,
        ))
    }

    /// Get the string representation of this ID
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Type
// ============================================================================

/// The current status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job has been created but not yet claimed by a worker
    Pending,
    /// Job is currently executing
    Running,
    /// Job finished successfully
    Completed,
    /// Job's operation raised an error
    Failed,
}

impl JobStatus {
    /// Check if this status represents a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `to` is a legal transition.
    ///
    /// The legal set is exactly {pending→running, running→completed,
    /// running→failed, failed→pending}.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        matches!(
            (self, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Failed, JobStatus::Pending)
        )
    }

    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl FromStr for JobStatus {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(JobError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Job Entity
// ============================================================================

/// A persisted subtitle-generation job.
///
/// One row per requested (item, language, operation); created once by an
/// external caller and mutated only by the dispatcher and explicit
/// retry/cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job
    pub id: JobId,
    /// The media item the job targets
    pub item_id: ItemId,
    /// Target language code
    pub language: String,
    /// Current status
    pub status: JobStatus,
    /// Error message captured from a failed operation
    pub error: Option<String>,
    /// Unix timestamp when the job was created
    pub created_at: i64,
    /// Unix timestamp when a worker claimed the job
    pub started_at: Option<i64>,
    /// Unix timestamp when the job reached a terminal state
    pub completed_at: Option<i64>,
}

impl Job {
    /// Create a new job in pending state.
    pub fn new(item_id: ItemId, language: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            item_id,
            language: language.into(),
            status: JobStatus::Pending,
            error: None,
            created_at: chrono::Utc::now().timestamp(),
            started_at: None,
            completed_at: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_round_trip() {
        let id = JobId::new();
        assert_eq!(JobId::from_string(&id.as_str()).unwrap(), id);
        assert!(JobId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_is_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_transition_table_is_exact() {
        use JobStatus::*;
        let all = [Pending, Running, Completed, Failed];
        let legal = [
            (Pending, Running),
            (Running, Completed),
            (Running, Failed),
            (Failed, Pending),
        ];

        for from in all {
            for to in all {
                let expected = legal.contains(&(from, to));
                assert_eq!(
                    from.can_transition(to),
                    expected,
                    "transition {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = Job::new(ItemId::new("item-1"), "es");

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.language, "es");
        assert!(job.error.is_none());
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
    }
}
