//! Outcomes of individual runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a run ended.
///
/// Per-run failures are never raised as errors past the executor; they are
/// carried here so the cause stays visible in diagnostics while halting
/// behaviour is uniform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Suite completed with every test passing
    Passed,

    /// Suite ran but reported failing tests
    Failed,

    /// Required external configuration was missing or invalid
    ConfigError,

    /// The suite runner could not be started or communicated with
    InvocationError,

    /// The run was interrupted by a cancellation request
    Cancelled,
}

/// Result of one suite run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunOutcome {
    /// Suite that was run.
    pub suite_id: String,

    /// How the run ended.
    pub status: RunStatus,

    /// Exit code of the suite process (-1 when no process ran).
    pub exit_code: i32,

    /// Captured diagnostic output, in order.
    pub diagnostics: Vec<String>,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// When the run started.
    pub started_at: DateTime<Utc>,
}

impl RunOutcome {
    /// Whether this run succeeded.
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Passed
    }

    /// Outcome for a run that never started because its configuration
    /// was missing or invalid.
    pub fn config_error(suite_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            suite_id: suite_id.into(),
            status: RunStatus::ConfigError,
            exit_code: -1,
            diagnostics: vec![message.into()],
            duration_ms: 0,
            started_at: Utc::now(),
        }
    }

    /// Outcome for a run whose runner could not be invoked.
    pub fn invocation_error(suite_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            suite_id: suite_id.into(),
            status: RunStatus::InvocationError,
            exit_code: -1,
            diagnostics: vec![message.into()],
            duration_ms: 0,
            started_at: Utc::now(),
        }
    }

    /// Outcome for a run interrupted by cancellation. No partial result is
    /// fabricated for the suite itself.
    pub fn cancelled(suite_id: impl Into<String>) -> Self {
        Self {
            suite_id: suite_id.into(),
            status: RunStatus::Cancelled,
            exit_code: -1,
            diagnostics: vec!["run cancelled before completion".to_string()],
            duration_ms: 0,
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_passed_counts_as_success() {
        let mut outcome = RunOutcome::config_error("postgres", "missing url");
        assert!(!outcome.succeeded());

        outcome.status = RunStatus::Passed;
        assert!(outcome.succeeded());

        for status in [
            RunStatus::Failed,
            RunStatus::ConfigError,
            RunStatus::InvocationError,
            RunStatus::Cancelled,
        ] {
            outcome.status = status;
            assert!(!outcome.succeeded());
        }
    }

    #[test]
    fn test_constructors_carry_cause_in_diagnostics() {
        let outcome = RunOutcome::config_error("postgres", "POSTGRES_DATABASE_URL is not set");
        assert_eq!(outcome.status, RunStatus::ConfigError);
        assert_eq!(outcome.exit_code, -1);
        assert!(outcome.diagnostics[0].contains("POSTGRES_DATABASE_URL"));

        let outcome = RunOutcome::invocation_error("mysql", "spawn failed");
        assert_eq!(outcome.status, RunStatus::InvocationError);
        assert!(outcome.diagnostics[0].contains("spawn"));
    }
}
