//! testrelay - multi-backend test suite orchestrator
//!
//! Runs the shared core suite first, then each configured database backend
//! suite, strictly in order, halting at the first failure. Each backend run
//! gets its own scoped `DATABASE_URL` and capability set.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::Level;

use testrelay_core::{
    init_tracing, Backend, CargoSuiteRunner, Executor, OrchestrationResult, PlanError,
    ProcessEnv, RunPlan, RunSpec, RunStatus,
};

/// Exit code for fatal errors discovered before any run starts.
const EXIT_FATAL: i32 = 2;

#[derive(Parser)]
#[command(name = "testrelay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run the core test suite, then each database backend suite, fail-fast", long_about = None)]
struct Cli {
    /// Backend suites to run after core (comma-separated: postgres,mysql,sqlite)
    #[arg(short, long, default_value = "postgres,mysql,sqlite")]
    backends: String,

    /// Workspace containing the suites
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Per-run timeout in seconds (0 = no timeout)
    #[arg(long, default_value_t = testrelay_core::suite::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Write the orchestration result as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

/// Build the static plan: core first, then the selected backends in the
/// order given.
fn build_plan(backends: &str, timeout_secs: u64) -> Result<RunPlan, PlanError> {
    let mut specs = vec![RunSpec::core().timeout_secs(timeout_secs)];
    for name in backends.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let backend = Backend::from_str(name)?;
        specs.push(RunSpec::backend(backend).timeout_secs(timeout_secs));
    }
    RunPlan::new(specs)
}

fn status_mark(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Passed => "✓",
        RunStatus::Cancelled => "∅",
        _ => "✗",
    }
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Passed => "passed",
        RunStatus::Failed => "failed",
        RunStatus::ConfigError => "configuration error",
        RunStatus::InvocationError => "invocation error",
        RunStatus::Cancelled => "cancelled",
    }
}

fn print_result(result: &OrchestrationResult) {
    println!();
    for outcome in &result.outcomes {
        println!(
            "  {} {} ({}, {}ms, exit code: {})",
            status_mark(outcome.status),
            outcome.suite_id,
            status_label(outcome.status),
            outcome.duration_ms,
            outcome.exit_code
        );
    }
    for suite in &result.skipped {
        println!("  - {} (skipped due to earlier failure)", suite);
    }

    if let Some(failure) = result.first_failure() {
        println!();
        println!(
            "Suite '{}' {} — diagnostics:",
            failure.suite_id,
            status_label(failure.status)
        );
        for line in &failure.diagnostics {
            println!("  {}", line);
        }
    }

    println!();
    println!(
        "Summary: {}/{} runs passed{}",
        result.passed_count(),
        result.plan_len,
        if result.halted_early {
            " (halted early)"
        } else {
            ""
        }
    );
}

async fn run(cli: Cli) -> Result<i32> {
    let plan = match build_plan(&cli.backends, cli.timeout_secs) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("invalid run plan: {e}");
            return Ok(EXIT_FATAL);
        }
    };

    println!("Running {} suites (workspace: {:?})", plan.len(), cli.workspace);

    let runner = Arc::new(CargoSuiteRunner::new(cli.workspace));
    let env = Arc::new(ProcessEnv::new());
    let executor = Executor::new(runner, env);

    // Ctrl-C aborts the current run and halts the plan.
    let cancel = executor.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = executor.execute(&plan).await;
    print_result(&result);

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {:?}", path))?;
        println!("Report written to {:?}", path);
    }

    Ok(result.exit_code())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("testrelay: {e:#}");
            std::process::exit(EXIT_FATAL);
        }
    }
}
