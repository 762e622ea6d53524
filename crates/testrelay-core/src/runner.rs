//! Suite runner trait and the cargo-based implementation.

use crate::outcome::{RunOutcome, RunStatus};
use crate::suite::Capability;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

/// Executes one suite to completion under a given configuration.
///
/// Implementations must be safe to call repeatedly and must not retain
/// state between calls. An `Err` means the runner itself could not be
/// invoked; the executor reports it as an invocation failure for that run
/// rather than a fatal error.
#[async_trait]
pub trait SuiteRunner: Send + Sync {
    async fn run(
        &self,
        suite_id: &str,
        env: &BTreeMap<String, String>,
        capabilities: &BTreeSet<Capability>,
        timeout_secs: u64,
    ) -> anyhow::Result<RunOutcome>;
}

/// Runs a suite as `cargo test` in a workspace, selecting the suite and its
/// capabilities via cargo features.
pub struct CargoSuiteRunner {
    /// Workspace directory containing the suites.
    pub workspace: PathBuf,

    /// Program invoked to run a suite (`cargo` from PATH by default).
    pub cargo: PathBuf,
}

impl CargoSuiteRunner {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            cargo: PathBuf::from("cargo"),
        }
    }

    /// Use a specific cargo binary.
    pub fn with_cargo(mut self, cargo: impl Into<PathBuf>) -> Self {
        self.cargo = cargo.into();
        self
    }

    /// Feature list for a run: the suite's own feature (the core suite has
    /// none) plus every enabled capability.
    fn features(suite_id: &str, capabilities: &BTreeSet<Capability>) -> String {
        let mut features: Vec<&str> = Vec::new();
        if suite_id != "core" {
            features.push(suite_id);
        }
        features.extend(capabilities.iter().map(|c| c.name()));
        features.join(" ")
    }

    /// Build the `cargo test` command for a run.
    fn build_command(
        &self,
        suite_id: &str,
        env: &BTreeMap<String, String>,
        capabilities: &BTreeSet<Capability>,
    ) -> Command {
        let mut cmd = Command::new(&self.cargo);
        cmd.current_dir(&self.workspace);
        // Cancellation and timeout drop the wait future; the suite process
        // must not outlive it and keep hitting the shared backend.
        cmd.kill_on_drop(true);
        cmd.arg("test");
        cmd.arg("--no-default-features");

        let features = Self::features(suite_id, capabilities);
        if !features.is_empty() {
            cmd.arg("--features");
            cmd.arg(features);
        }

        for (key, value) in env {
            cmd.env(key, value);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl SuiteRunner for CargoSuiteRunner {
    async fn run(
        &self,
        suite_id: &str,
        env: &BTreeMap<String, String>,
        capabilities: &BTreeSet<Capability>,
        timeout_secs: u64,
    ) -> anyhow::Result<RunOutcome> {
        let started_at = Utc::now();
        let start = Instant::now();

        debug!(
            suite = suite_id,
            features = %Self::features(suite_id, capabilities),
            "Spawning cargo test"
        );

        let child = self
            .build_command(suite_id, env, capabilities)
            .spawn()?;

        let output = if timeout_secs > 0 {
            tokio::time::timeout(
                std::time::Duration::from_secs(timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                anyhow::anyhow!("suite '{}' timed out after {} seconds", suite_id, timeout_secs)
            })??
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);

        let mut diagnostics: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        diagnostics.extend(
            String::from_utf8_lossy(&output.stderr)
                .lines()
                .map(str::to_string),
        );

        let status = if output.status.success() {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };

        info!(
            suite = suite_id,
            exit_code,
            duration_ms,
            passed = status == RunStatus::Passed,
            "Suite completed"
        );

        Ok(RunOutcome {
            suite_id: suite_id.to_string(),
            status,
            exit_code,
            diagnostics,
            duration_ms,
            started_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::Backend;

    #[test]
    fn test_core_suite_has_no_suite_feature() {
        let caps = Backend::MySql.default_capabilities();
        assert_eq!(CargoSuiteRunner::features("core", &BTreeSet::new()), "");
        assert_eq!(CargoSuiteRunner::features("core", &caps), "chrono");
    }

    #[test]
    fn test_backend_suite_feature_composition() {
        let caps = Backend::Postgres.default_capabilities();
        // BTreeSet ordering keeps the list deterministic.
        assert_eq!(
            CargoSuiteRunner::features("postgres", &caps),
            "postgres uuid chrono"
        );
    }

    #[test]
    fn test_build_command_does_not_panic() {
        let runner = CargoSuiteRunner::new(".");
        let env = BTreeMap::from([("DATABASE_URL".to_string(), "sqlite://:memory:".to_string())]);
        let _cmd = runner.build_command("sqlite", &env, &Backend::Sqlite.default_capabilities());
    }

    #[cfg(target_os = "linux")]
    fn process_running(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            // State is the first field after the parenthesised command name;
            // a zombie counts as gone.
            Ok(stat) => {
                let state = stat.rsplit(')').next().unwrap_or("").trim().chars().next();
                state != Some('Z')
            }
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timed_out_suite_process_is_killed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("suite.pid");
        let script = dir.path().join("fake-cargo");
        std::fs::write(&script, "#!/bin/sh\necho $$ > \"$PID_FILE\"\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner = CargoSuiteRunner::new(dir.path()).with_cargo(&script);
        let env = BTreeMap::from([("PID_FILE".to_string(), pid_file.display().to_string())]);

        let err = runner
            .run("core", &env, &BTreeSet::new(), 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));

        let pid = std::fs::read_to_string(&pid_file)
            .expect("suite never started")
            .trim()
            .to_string();

        // Dropping the wait future must take the suite process with it.
        let mut alive = true;
        for _ in 0..50 {
            alive = process_running(&pid);
            if !alive {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        assert!(!alive, "suite process {} survived the timeout", pid);
    }
}
