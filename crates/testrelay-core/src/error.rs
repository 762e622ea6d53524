//! Error types for plan construction.

use thiserror::Error;

/// Errors detected while building a [`crate::RunPlan`].
///
/// These are the only errors that abort orchestration before any run
/// executes. Everything that goes wrong during a run is captured as a
/// [`crate::RunOutcome`] instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// Plan declared with no runs
    #[error("run plan is empty")]
    EmptyPlan,

    /// A run spec with an empty suite identifier
    #[error("run spec at index {index} has an empty suite id")]
    EmptySuiteId { index: usize },

    /// Capability token not in the known registry
    #[error("unknown capability: {token}")]
    UnknownCapability { token: String },

    /// The same environment key declared twice within one run spec
    #[error("suite '{suite}' declares environment key '{key}' more than once")]
    DuplicateEnvKey { suite: String, key: String },

    /// Backend name not recognised
    #[error("unknown backend: {name}")]
    UnknownBackend { name: String },
}
