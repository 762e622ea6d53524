//! Tracing initialisation for the testrelay binary.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter directives: the testrelay crates at the requested level,
/// third-party crates capped at warn so suite output stays readable.
fn default_directives(level: Level) -> String {
    format!("warn,testrelay_core={level},testrelay_cli={level}")
}

/// Initialise the global tracing subscriber.
///
/// * `json` — when `true`, emit newline-delimited JSON log lines with
///   targets included, for log aggregation.
/// * `level` — verbosity for the testrelay crates when `RUST_LOG` is not
///   set.
///
/// `RUST_LOG` overrides the defaults entirely. Safe to call more than
/// once; only the first call takes effect (the global subscriber can only
/// be set once per process).
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}
