//! testrelay core - multi-backend test suite orchestration
//!
//! Provides the sequencing engine that:
//! - Models a run (suite id + environment overrides + capability set)
//! - Executes an ordered plan of runs, fail-fast, strictly sequential
//! - Scopes per-run configuration so no run leaks state into the next

pub mod env;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod outcome;
pub mod plan;
pub mod runner;
pub mod suite;
pub mod telemetry;

// Re-export key types
pub use env::{EnvScope, Environment, ProcessEnv};
pub use error::PlanError;
pub use executor::{CancelFlag, Executor, OrchestrationResult};
pub use outcome::{RunOutcome, RunStatus};
pub use plan::RunPlan;
pub use runner::{CargoSuiteRunner, SuiteRunner};
pub use suite::{Backend, Capability, EnvValue, RunSpec};
pub use telemetry::init_tracing;
