//! rlsguard command-line entry point.
//!
//! Usage:
//!   rlsguard audit         - Full pass with isolation probing, exit 1 on Critical
//!   rlsguard completeness  - Catalog checks only, no fixtures written
//!   rlsguard monitor       - Full pass on an interval until Ctrl-C

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use rlsguard_alert::Dispatcher;
use rlsguard_core::scoring::ReportMode;
use rlsguard_db::{PgCatalog, PgIsolationStore, connect};
use rlsguard_monitor::{Auditor, EXIT_FAILURE, PassResult, run_continuous, run_pass};
use rlsguard_shared::{GuardConfig, init_tracing};

#[derive(Parser)]
#[command(name = "rlsguard")]
#[command(about = "Audits Postgres row-level security and probes tenant isolation")]
struct Cli {
    /// Directory for report artifacts (overrides `audit.report_dir`)
    #[arg(long, global = true)]
    report_dir: Option<String>,

    /// Wall-clock budget for one pass in seconds (overrides `audit.run_budget_secs`)
    #[arg(long, global = true)]
    budget_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full pass and exit nonzero on Critical
    Audit,
    /// Run classifier, inspector and verifier only
    Completeness,
    /// Run full passes on an interval until interrupted
    Monitor {
        /// Seconds between passes (overrides `audit.interval_secs`)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    match run(Cli::parse()).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("rlsguard: {err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = GuardConfig::load().context("failed to load configuration")?;
    if let Some(dir) = cli.report_dir {
        config.audit.report_dir = dir;
    }
    if let Some(budget) = cli.budget_secs {
        config.audit.run_budget_secs = budget;
    }
    if let Commands::Monitor {
        interval_secs: Some(interval),
    } = cli.command
    {
        config.audit.interval_secs = interval;
    }

    init_tracing(&config.log)?;

    let dispatcher = Dispatcher::from_config(&config.alerts, &config.audit)
        .context("failed to configure alert sinks")?;
    let mode = match cli.command {
        Commands::Completeness => ReportMode::Completeness,
        Commands::Audit | Commands::Monitor { .. } => ReportMode::Audit,
    };

    let auditor = match build_auditor(&config).await {
        Ok(auditor) => auditor,
        Err(err) => {
            error!(error = %err, "Database unreachable");
            let report = Auditor::structural_report(mode, &format!("{err:#}"));
            let outcome = dispatcher.dispatch(&report).await;
            print_pass(&PassResult { report, outcome });
            return Ok(EXIT_FAILURE);
        }
    };

    match cli.command {
        Commands::Audit | Commands::Completeness => {
            let result = run_pass(&auditor, &dispatcher, mode).await;
            print_pass(&result);
            Ok(result.exit_code())
        }
        Commands::Monitor { .. } => {
            let interval = config.audit.interval();
            info!(interval_secs = interval.as_secs(), "Continuous monitoring started");
            let shutdown = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    error!(error = %err, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            run_continuous(&auditor, &dispatcher, mode, interval, shutdown, print_pass).await;
            Ok(0)
        }
    }
}

async fn build_auditor(config: &GuardConfig) -> anyhow::Result<Auditor> {
    let db = &config.database;
    let admin = connect(&db.url, db)
        .await
        .context("failed to connect to the database")?;
    let app = if db.probe_url() == db.url {
        admin.clone()
    } else {
        connect(db.probe_url(), db)
            .await
            .context("failed to connect with the application URL")?
    };
    info!(probe_role = ?db.app_role, "Connected to database");

    let catalog = PgCatalog::new(admin.clone(), db);
    let store = PgIsolationStore::new(admin, app, db);
    Ok(Auditor::new(
        Arc::new(catalog),
        Arc::new(store),
        config.audit.run_budget(),
    ))
}

fn print_pass(result: &PassResult) {
    print!("{}", result.outcome.summary.render());
    match &result.outcome.written {
        Ok(path) => println!("  Report: {}", path.display()),
        Err(err) => println!("  Report not written: {err}"),
    }
}
