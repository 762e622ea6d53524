//! Run plans: validated, ordered sequences of run specs.

use crate::error::PlanError;
use crate::suite::RunSpec;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An ordered, validated sequence of [`RunSpec`]s.
///
/// Order is significant: the core suite runs first because later runs
/// assume a successful baseline. Construction is pure and deterministic;
/// environment values referenced by the specs are bound at execution time,
/// so a plan can be built and inspected without live external resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunPlan {
    specs: Vec<RunSpec>,
}

impl RunPlan {
    /// Build a plan, validating every spec.
    ///
    /// This is the only place construction errors surface; once a plan
    /// exists, execution can no longer fail fatally.
    pub fn new(specs: Vec<RunSpec>) -> Result<Self, PlanError> {
        if specs.is_empty() {
            return Err(PlanError::EmptyPlan);
        }

        for (index, spec) in specs.iter().enumerate() {
            spec.validate(index)?;
        }

        Ok(Self { specs })
    }

    /// Number of planned runs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// A validated plan is never empty, but clippy wants the pair.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Iterate the specs in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &RunSpec> {
        self.specs.iter()
    }

    /// The planned specs, in order.
    pub fn specs(&self) -> &[RunSpec] {
        &self.specs
    }

    /// SHA-256 digest of the ordered suite ids, hex-encoded.
    ///
    /// Order-sensitive by design: the same suites in a different order are
    /// a different plan.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for spec in &self.specs {
            hasher.update(spec.suite_id.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}
