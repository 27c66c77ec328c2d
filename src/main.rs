use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use regressoor::config::{Config, WorkloadMode};
use regressoor::harness::Measurement;
use regressoor::probe::EventChannel;
use regressoor::session::Session;
use regressoor::workload::{HttpWorkload, SimWorkload};

/// Runtime-telemetry-driven performance regression harness.
#[derive(Parser)]
#[command(name = "regressoor", about)]
struct Cli {
    /// Path to the YAML scenario configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

/// Build-time version info.
mod version {
    /// Release version string (set at build time).
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Handle version subcommand before anything else.
    if let Some(Command::Version) = &cli.command {
        println!("regressoor {}", version::full());
        return Ok(ExitCode::SUCCESS);
    }

    // Initialize tracing.
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;

    fmt().with_env_filter(filter).with_target(true).init();

    // Config is required for a measurement run.
    let config_path = cli
        .config
        .context("--config is required (use --help for usage)")?;

    let cfg = Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        "starting regressoor",
    );

    // Build and run the tokio runtime.
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async { run(cfg).await })
}

async fn run(cfg: Config) -> Result<ExitCode> {
    let channel = EventChannel::new();
    let session = Session::configure(&channel, &cfg.source_specs())
        .context("configuring capture session")?;

    let filter = cfg.event_filter();
    let gates = cfg.gate_rules();
    let mut measurement = Measurement::new(cfg.measurement_plan());

    let outcome = match cfg.workload.mode {
        WorkloadMode::Http => {
            let workload = HttpWorkload::new(
                cfg.workload.endpoint.clone(),
                cfg.workload.path_prefix.clone(),
                cfg.workload.timeout,
            )
            .context("building http workload")?;
            measurement
                .run(&session, &workload, &filter, &gates)
                .await
                .context("running measurement")?
        }
        WorkloadMode::Simulated => {
            let workload =
                SimWorkload::spawn(channel.publisher(), cfg.sim_profile(), cfg.workload.workers);
            measurement
                .run(&session, &workload, &filter, &gates)
                .await
                .context("running measurement")?
        }
    };

    for (kind, captured, suppressed) in channel.stats().snapshot() {
        tracing::debug!(kind = %kind, captured, suppressed, "capture stats");
    }

    report(&outcome);

    if outcome.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Thin reporting consumer over the harness outcome.
fn report(outcome: &regressoor::harness::Outcome) {
    let agg = &outcome.aggregate;
    tracing::info!(
        units = agg.total_units,
        events = agg.event_count,
        sum = agg.sum,
        per_unit = agg.per_unit,
        events_per_unit = agg.events_per_unit,
        "measurement complete",
    );

    for verdict in &outcome.verdicts {
        if verdict.passed {
            tracing::info!(rule = %verdict.rule, observed = verdict.observed, "gate passed");
        } else {
            tracing::error!(rule = %verdict.rule, observed = verdict.observed, "gate failed");
        }
    }
}
