//! Run specifications: suites, backends, capabilities and env overrides.

use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Default per-run timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1200;

/// Optional capabilities a suite can be run with.
///
/// This is the full registry; a token outside it is a configuration
/// error, never silently ignored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// UUID column support
    Uuid,

    /// Date/time column support
    Chrono,

    /// JSON column support
    Json,

    /// TLS connections to the backend
    Tls,

    /// Compile-time checked query macros
    Macros,
}

impl Capability {
    /// Get the capability token as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Uuid => "uuid",
            Capability::Chrono => "chrono",
            Capability::Json => "json",
            Capability::Tls => "tls",
            Capability::Macros => "macros",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Capability {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uuid" => Ok(Capability::Uuid),
            "chrono" => Ok(Capability::Chrono),
            "json" => Ok(Capability::Json),
            "tls" => Ok(Capability::Tls),
            "macros" => Ok(Capability::Macros),
            other => Err(PlanError::UnknownCapability {
                token: other.to_string(),
            }),
        }
    }
}

/// Database backends with an integration suite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Postgres,
    MySql,
    Sqlite,
}

impl Backend {
    /// All backends, in the order their suites run.
    pub const ALL: [Backend; 3] = [Backend::Postgres, Backend::MySql, Backend::Sqlite];

    /// Suite identifier for this backend.
    pub fn suite_id(&self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::MySql => "mysql",
            Backend::Sqlite => "sqlite",
        }
    }

    /// Externally supplied variable holding this backend's connection string.
    pub fn url_var(&self) -> &'static str {
        match self {
            Backend::Postgres => "POSTGRES_DATABASE_URL",
            Backend::MySql => "MYSQL_DATABASE_URL",
            Backend::Sqlite => "SQLITE_DATABASE_URL",
        }
    }

    /// Capabilities enabled by default for this backend's suite.
    pub fn default_capabilities(&self) -> BTreeSet<Capability> {
        let caps: &[Capability] = match self {
            Backend::Postgres => &[Capability::Uuid, Capability::Chrono],
            Backend::MySql => &[Capability::Chrono],
            Backend::Sqlite => &[Capability::Chrono],
        };
        caps.iter().copied().collect()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suite_id())
    }
}

impl FromStr for Backend {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(Backend::Postgres),
            "mysql" => Ok(Backend::MySql),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(PlanError::UnknownBackend {
                name: other.to_string(),
            }),
        }
    }
}

/// An environment override value.
///
/// `FromVar` defers binding to execution time: the value is read from the
/// ambient environment when the run starts, not when the plan is built.
/// A missing source variable fails that run with a configuration error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnvValue {
    /// Fixed value known at plan construction
    Literal(String),

    /// Value of another environment variable, read at execution time
    FromVar(String),
}

impl EnvValue {
    pub fn literal(value: impl Into<String>) -> Self {
        EnvValue::Literal(value.into())
    }

    pub fn from_var(name: impl Into<String>) -> Self {
        EnvValue::FromVar(name.into())
    }
}

/// Specification of one test run: which suite, under which environment,
/// with which capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSpec {
    /// Suite identifier (logical name, not a path).
    pub suite_id: String,

    /// Environment overrides applied only for the duration of this run.
    /// Declaration order is preserved; keys must be unique.
    pub env: Vec<(String, EnvValue)>,

    /// Capabilities enabled for this run.
    pub capabilities: BTreeSet<Capability>,

    /// Timeout for this run, in seconds.
    pub timeout_secs: u64,
}

impl RunSpec {
    /// Create a bare run spec for the given suite.
    pub fn new(suite_id: impl Into<String>) -> Self {
        Self {
            suite_id: suite_id.into(),
            env: Vec::new(),
            capabilities: BTreeSet::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// The shared core suite: no backend, no overrides.
    pub fn core() -> Self {
        Self::new("core")
    }

    /// The conventional spec for a backend suite: `DATABASE_URL` bound
    /// lazily from the backend's external variable, default capabilities.
    pub fn backend(backend: Backend) -> Self {
        Self::new(backend.suite_id())
            .env("DATABASE_URL", EnvValue::from_var(backend.url_var()))
            .capabilities(backend.default_capabilities())
    }

    /// Add an environment override.
    pub fn env(mut self, key: impl Into<String>, value: EnvValue) -> Self {
        self.env.push((key.into(), value));
        self
    }

    /// Enable a capability.
    pub fn capability(mut self, cap: Capability) -> Self {
        self.capabilities.insert(cap);
        self
    }

    /// Enable a set of capabilities.
    pub fn capabilities(mut self, caps: BTreeSet<Capability>) -> Self {
        self.capabilities.extend(caps);
        self
    }

    /// Override the run timeout.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Check this spec's own invariants, reporting `index` on failure.
    pub(crate) fn validate(&self, index: usize) -> Result<(), PlanError> {
        if self.suite_id.is_empty() {
            return Err(PlanError::EmptySuiteId { index });
        }

        let mut seen = BTreeSet::new();
        for (key, _) in &self.env {
            if !seen.insert(key.as_str()) {
                return Err(PlanError::DuplicateEnvKey {
                    suite: self.suite_id.clone(),
                    key: key.clone(),
                });
            }
        }

        Ok(())
    }
}
