//! Job definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Job identifier
pub type JobId = Uuid;

/// Job lifecycle state
///
/// `Pending → Active → { Completed | PendingRetry → Pending | Exhausted }`.
/// `Completed` and `Exhausted` are terminal. An `Active` job whose holder
/// crashed is returned to `Pending` by the reclaim sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in queue
    Pending,
    /// Held by exactly one worker
    Active,
    /// Successfully completed
    Completed,
    /// Failed with attempts remaining, waiting out its backoff
    PendingRetry,
    /// Permanently failed after max attempts
    Exhausted,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::PendingRetry => "pending_retry",
            Self::Exhausted => "exhausted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "pending_retry" => Some(Self::PendingRetry),
            "exhausted" => Some(Self::Exhausted),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exhausted)
    }
}

/// Retry behaviour attached to a job at enqueue time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Ceiling on execution attempts.
    pub max_attempts: u32,
    /// Base backoff delay in seconds, doubled per attempt.
    pub backoff_base_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_secs: 2,
        }
    }
}

/// Longest backoff a single retry will wait, in seconds.
pub const MAX_BACKOFF_SECS: u64 = 3600;

impl RetryPolicy {
    /// Backoff before re-dispatching after the given failed attempt (1-based).
    /// Exponential: `base * 2^(attempt - 1)`, capped at [`MAX_BACKOFF_SECS`].
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let secs = self
            .backoff_base_secs
            .saturating_mul(1u64 << exp)
            .min(MAX_BACKOFF_SECS);
        Duration::from_secs(secs)
    }
}

/// Retention windows for terminal jobs. Completed jobs are pruned quickly;
/// exhausted jobs are kept around longer for inspection.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub completed_max_age: Duration,
    pub exhausted_max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed_max_age: Duration::from_secs(3600),
            exhausted_max_age: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

/// A persisted job entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEntry {
    pub id: JobId,
    /// Handler discriminator (`estimate`; unknown kinds are no-ops).
    pub kind: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    pub created_at: DateTime<Utc>,
    /// Earliest time the job may be dispatched (backoff gate).
    pub run_at: DateTime<Utc>,
    /// Set while Active; drives visibility-timeout reclaim.
    pub locked_at: Option<DateTime<Utc>>,
    /// Set when the job reaches a terminal state; drives retention pruning.
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl JobEntry {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base_secs: self.backoff_base_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1).as_secs(), 2);
        assert_eq!(policy.backoff(2).as_secs(), 4);
        assert_eq!(policy.backoff(3).as_secs(), 8);
        assert_eq!(policy.backoff(4).as_secs(), 16);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 50,
            backoff_base_secs: 2,
        };
        assert_eq!(policy.backoff(40).as_secs(), MAX_BACKOFF_SECS);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Active,
            JobStatus::Completed,
            JobStatus::PendingRetry,
            JobStatus::Exhausted,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("bogus"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Exhausted.is_terminal());
        assert!(!JobStatus::PendingRetry.is_terminal());
    }
}
