//! In-memory fakes for the executor's collaborators (testing only)
//!
//! Provides `MemoryEnv` and `ScriptedRunner` that satisfy the trait
//! contracts without touching the real process environment or spawning
//! subprocesses.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::env::Environment;
use crate::outcome::{RunOutcome, RunStatus};
use crate::runner::SuiteRunner;
use crate::suite::Capability;

// ---------------------------------------------------------------------------
// MemoryEnv
// ---------------------------------------------------------------------------

/// In-memory environment backed by a `Mutex<HashMap>`.
#[derive(Debug, Default)]
pub struct MemoryEnv {
    vars: Mutex<HashMap<String, String>>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every variable currently set, for before/after assertions.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let vars = self.vars.lock().unwrap();
        vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl Environment for MemoryEnv {
    fn var(&self, key: &str) -> Option<String> {
        let vars = self.vars.lock().unwrap();
        vars.get(key).cloned()
    }

    fn set_var(&self, key: &str, value: &str) {
        let mut vars = self.vars.lock().unwrap();
        vars.insert(key.to_string(), value.to_string());
    }

    fn remove_var(&self, key: &str) {
        let mut vars = self.vars.lock().unwrap();
        vars.remove(key);
    }
}

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

/// One recorded runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub suite_id: String,
    pub env: BTreeMap<String, String>,
    pub capabilities: BTreeSet<Capability>,
}

#[derive(Debug, Clone)]
enum Script {
    Fail,
    Error(String),
    Hang,
}

/// Suite runner with scripted outcomes and an invocation log.
///
/// Every suite passes unless scripted otherwise. The log records the order,
/// count and exact configuration of invocations, which is what the fail-fast
/// and isolation tests assert on.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: HashMap<String, Script>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    /// A runner where every suite passes.
    pub fn all_passing() -> Self {
        Self::default()
    }

    /// Script `suite_id` to report failing tests.
    pub fn failing(mut self, suite_id: impl Into<String>) -> Self {
        self.scripts.insert(suite_id.into(), Script::Fail);
        self
    }

    /// Script `suite_id` so the runner itself errors (spawn failure).
    pub fn erroring(mut self, suite_id: impl Into<String>, message: impl Into<String>) -> Self {
        self.scripts
            .insert(suite_id.into(), Script::Error(message.into()));
        self
    }

    /// Script `suite_id` to never complete; the run only ends when the
    /// executor drops it (cancellation).
    pub fn hanging(mut self, suite_id: impl Into<String>) -> Self {
        self.scripts.insert(suite_id.into(), Script::Hang);
        self
    }

    /// Invocations recorded so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Suite ids invoked so far, in order.
    pub fn invoked_suites(&self) -> Vec<String> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|i| i.suite_id.clone())
            .collect()
    }
}

#[async_trait]
impl SuiteRunner for ScriptedRunner {
    async fn run(
        &self,
        suite_id: &str,
        env: &BTreeMap<String, String>,
        capabilities: &BTreeSet<Capability>,
        _timeout_secs: u64,
    ) -> anyhow::Result<RunOutcome> {
        self.invocations.lock().unwrap().push(Invocation {
            suite_id: suite_id.to_string(),
            env: env.clone(),
            capabilities: capabilities.clone(),
        });

        match self.scripts.get(suite_id) {
            None => Ok(RunOutcome {
                suite_id: suite_id.to_string(),
                status: RunStatus::Passed,
                exit_code: 0,
                diagnostics: vec![format!("suite '{}' passed", suite_id)],
                duration_ms: 1,
                started_at: Utc::now(),
            }),
            Some(Script::Fail) => Ok(RunOutcome {
                suite_id: suite_id.to_string(),
                status: RunStatus::Failed,
                exit_code: 101,
                diagnostics: vec![format!("suite '{}' reported failing tests", suite_id)],
                duration_ms: 1,
                started_at: Utc::now(),
            }),
            Some(Script::Error(message)) => Err(anyhow::anyhow!("{}", message)),
            Some(Script::Hang) => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
        }
    }
}
