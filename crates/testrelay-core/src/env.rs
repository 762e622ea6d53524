//! Environment abstraction and scoped configuration overrides.
//!
//! Process environment is global mutable state; this module turns it into an
//! explicitly scoped resource. Production code uses [`ProcessEnv`]; tests use
//! the in-memory fake from [`crate::fakes`] and never touch real variables.

use crate::suite::EnvValue;
use std::collections::BTreeMap;
use thiserror::Error;

/// Read/write access to an ambient environment.
///
/// Methods take `&self`; implementations provide their own interior
/// mutability where needed.
pub trait Environment: Send + Sync {
    /// Current value of a variable, if set.
    fn var(&self, key: &str) -> Option<String>;

    /// Set a variable.
    fn set_var(&self, key: &str, value: &str);

    /// Remove a variable.
    fn remove_var(&self, key: &str);
}

/// The real process environment.
#[derive(Debug, Default)]
pub struct ProcessEnv;

impl ProcessEnv {
    pub fn new() -> Self {
        Self
    }
}

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn set_var(&self, key: &str, value: &str) {
        std::env::set_var(key, value);
    }

    fn remove_var(&self, key: &str) {
        std::env::remove_var(key);
    }
}

/// A lazily bound override referenced a variable that is not set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("required variable '{var}' (for '{key}') is not set")]
pub struct MissingVar {
    /// Override key that could not be bound.
    pub key: String,

    /// Source variable that was absent.
    pub var: String,
}

/// Resolve a run spec's overrides into concrete values against `env`.
///
/// This is where `FromVar` bindings are read, at execution time. A missing
/// source variable fails resolution; the caller scopes that failure to the
/// one run it belongs to.
pub fn resolve(
    env: &dyn Environment,
    overrides: &[(String, EnvValue)],
) -> Result<BTreeMap<String, String>, MissingVar> {
    let mut resolved = BTreeMap::new();
    for (key, value) in overrides {
        let concrete = match value {
            EnvValue::Literal(v) => v.clone(),
            EnvValue::FromVar(var) => env.var(var).ok_or_else(|| MissingVar {
                key: key.clone(),
                var: var.clone(),
            })?,
        };
        resolved.insert(key.clone(), concrete);
    }
    Ok(resolved)
}

/// Scoped application of environment overrides.
///
/// Records each key's prior value on entry and restores it on drop, so the
/// ambient state after the scope is exactly the state before it, on every
/// exit path. Lifecycle is strictly linear; scopes are not nested because
/// runs are strictly sequential.
pub struct EnvScope<'e> {
    env: &'e dyn Environment,
    saved: Vec<(String, Option<String>)>,
}

impl<'e> EnvScope<'e> {
    /// Apply `overrides` to `env`, remembering what they replaced.
    pub fn apply(env: &'e dyn Environment, overrides: &BTreeMap<String, String>) -> Self {
        let mut saved = Vec::with_capacity(overrides.len());
        for (key, value) in overrides {
            saved.push((key.clone(), env.var(key)));
            env.set_var(key, value);
        }
        Self { env, saved }
    }
}

impl Drop for EnvScope<'_> {
    fn drop(&mut self) {
        // Reverse order, so the oldest saved value wins if a key repeats.
        for (key, prior) in self.saved.drain(..).rev() {
            match prior {
                Some(value) => self.env.set_var(&key, &value),
                None => self.env.remove_var(&key),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryEnv;

    #[test]
    fn test_resolve_literal_and_from_var() {
        let env = MemoryEnv::new();
        env.set_var("POSTGRES_DATABASE_URL", "postgres://localhost/test");

        let overrides = vec![
            ("DATABASE_URL".to_string(), EnvValue::from_var("POSTGRES_DATABASE_URL")),
            ("RUST_BACKTRACE".to_string(), EnvValue::literal("1")),
        ];

        let resolved = resolve(&env, &overrides).unwrap();
        assert_eq!(
            resolved.get("DATABASE_URL").map(String::as_str),
            Some("postgres://localhost/test")
        );
        assert_eq!(resolved.get("RUST_BACKTRACE").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_resolve_missing_source_var() {
        let env = MemoryEnv::new();
        let overrides = vec![(
            "DATABASE_URL".to_string(),
            EnvValue::from_var("MYSQL_DATABASE_URL"),
        )];

        let err = resolve(&env, &overrides).unwrap_err();
        assert_eq!(err.key, "DATABASE_URL");
        assert_eq!(err.var, "MYSQL_DATABASE_URL");
    }

    #[test]
    fn test_scope_restores_prior_value() {
        let env = MemoryEnv::new();
        env.set_var("DATABASE_URL", "original");

        let overrides = BTreeMap::from([("DATABASE_URL".to_string(), "scoped".to_string())]);
        {
            let _scope = EnvScope::apply(&env, &overrides);
            assert_eq!(env.var("DATABASE_URL").as_deref(), Some("scoped"));
        }
        assert_eq!(env.var("DATABASE_URL").as_deref(), Some("original"));
    }

    #[test]
    fn test_scope_removes_previously_unset_keys() {
        let env = MemoryEnv::new();
        let overrides = BTreeMap::from([("DATABASE_URL".to_string(), "scoped".to_string())]);
        {
            let _scope = EnvScope::apply(&env, &overrides);
            assert_eq!(env.var("DATABASE_URL").as_deref(), Some("scoped"));
        }
        assert_eq!(env.var("DATABASE_URL"), None);
    }

    #[test]
    fn test_scope_restores_on_panic() {
        let env = MemoryEnv::new();
        env.set_var("X", "before");

        let overrides = BTreeMap::from([("X".to_string(), "during".to_string())]);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = EnvScope::apply(&env, &overrides);
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(env.var("X").as_deref(), Some("before"));
    }
}
