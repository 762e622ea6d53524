//! Plan execution: strictly sequential, fail-fast, configuration-scoped.

use crate::env::{self, EnvScope, Environment};
use crate::outcome::RunOutcome;
use crate::plan::RunPlan;
use crate::runner::SuiteRunner;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};
use uuid::Uuid;

/// Cooperative cancellation handle.
///
/// `cancel` may be called from any task (typically a signal handler); the
/// executor checks it before each run and races it against the in-flight
/// runner invocation.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            // Register interest before checking the flag, so a cancel that
            // lands between the check and the await is not lost.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Result of executing a whole plan.
///
/// Always well-formed: per-run errors are inside `outcomes`, never raised
/// past the executor.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationResult {
    /// Identity of this orchestration session.
    pub session_id: String,

    /// Digest of the executed plan.
    pub plan_digest: String,

    /// Number of planned runs.
    pub plan_len: usize,

    /// Outcomes of the runs actually executed, in plan order.
    pub outcomes: Vec<RunOutcome>,

    /// Whether the plan stopped before reaching its last spec.
    pub halted_early: bool,

    /// Suites skipped due to an earlier failure, in plan order.
    pub skipped: Vec<String>,
}

impl OrchestrationResult {
    /// Number of runs that passed.
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    /// Number of runs that did not pass.
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }

    /// The first run that did not pass, if any.
    pub fn first_failure(&self) -> Option<&RunOutcome> {
        self.outcomes.iter().find(|o| !o.succeeded())
    }

    /// Whether every planned run executed and passed.
    pub fn success(&self) -> bool {
        !self.halted_early && self.outcomes.iter().all(RunOutcome::succeeded)
    }

    /// Process exit code: 0 when everything passed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }
}

/// Executes a [`RunPlan`] against a suite runner, one run at a time.
///
/// The executor owns the only shared mutable resource (the ambient
/// environment) for each scope's lifetime; no run begins before the
/// previous run's scope has been released.
pub struct Executor {
    runner: Arc<dyn SuiteRunner>,
    env: Arc<dyn Environment>,
    cancel: Arc<CancelFlag>,
}

impl Executor {
    pub fn new(runner: Arc<dyn SuiteRunner>, env: Arc<dyn Environment>) -> Self {
        Self {
            runner,
            env,
            cancel: Arc::new(CancelFlag::new()),
        }
    }

    /// Handle for requesting cancellation of an in-progress execution.
    pub fn cancel_flag(&self) -> Arc<CancelFlag> {
        Arc::clone(&self.cancel)
    }

    /// Execute every run in order, stopping at the first that does not pass.
    ///
    /// A plan is validated at construction, so execution itself cannot fail
    /// fatally; whatever goes wrong during a run becomes that run's outcome.
    pub async fn execute(&self, plan: &RunPlan) -> OrchestrationResult {
        let session_id = Uuid::new_v4().to_string();
        let plan_digest = plan.digest();

        info!(
            session_id = %session_id,
            plan_digest = %&plan_digest[..12],
            runs = plan.len(),
            "Starting orchestration"
        );

        let mut outcomes: Vec<RunOutcome> = Vec::new();

        for spec in plan.iter() {
            if self.cancel.is_cancelled() {
                warn!(suite = %spec.suite_id, "Cancellation requested, halting plan");
                outcomes.push(RunOutcome::cancelled(&spec.suite_id));
                break;
            }

            info!(suite = %spec.suite_id, "Executing suite");

            // Bind lazy env values now, at execution time. A missing source
            // variable fails this run only.
            let resolved = match env::resolve(self.env.as_ref(), &spec.env) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(suite = %spec.suite_id, error = %e, "Configuration error");
                    outcomes.push(RunOutcome::config_error(&spec.suite_id, e.to_string()));
                    break;
                }
            };

            let outcome = {
                let _scope = EnvScope::apply(self.env.as_ref(), &resolved);
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        warn!(suite = %spec.suite_id, "Run cancelled mid-flight");
                        RunOutcome::cancelled(&spec.suite_id)
                    }
                    result = self.runner.run(
                        &spec.suite_id,
                        &resolved,
                        &spec.capabilities,
                        spec.timeout_secs,
                    ) => match result {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!(suite = %spec.suite_id, error = %e, "Runner invocation failed");
                            RunOutcome::invocation_error(
                                &spec.suite_id,
                                format!("suite runner invocation failed: {e}"),
                            )
                        }
                    }
                }
                // _scope drops here: overrides are rolled back on every path
                // before the next run can start.
            };

            let succeeded = outcome.succeeded();
            outcomes.push(outcome);

            if !succeeded {
                break;
            }
        }

        let halted_early = outcomes.len() < plan.len();
        let skipped: Vec<String> = plan
            .iter()
            .skip(outcomes.len())
            .map(|s| s.suite_id.clone())
            .collect();

        let result = OrchestrationResult {
            session_id,
            plan_digest,
            plan_len: plan.len(),
            outcomes,
            halted_early,
            skipped,
        };

        info!(
            session_id = %result.session_id,
            passed = result.passed_count(),
            failed = result.failed_count(),
            halted_early = result.halted_early,
            "Orchestration finished"
        );

        result
    }
}
