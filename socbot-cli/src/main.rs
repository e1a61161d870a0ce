//! socbot CLI
//!
//! Usage:
//!   socbot import --input overrides.xlsx [--soc 1234567]
//!   socbot export --soc 1234567 [--output SOC_1234567.xlsx]
//!   socbot control --soc 1234567
//!   socbot check --input overrides.xlsx

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use socbot::config::{Config, DEFAULT_CONFIG_FILE};
use socbot::workflow::{ControlWorkflow, ExportWorkflow, ImportWorkflow};
use socbot::{
    BatchSummary, ChromeOptions, ChromeSession, Failure, OperationResult, Portal, Session,
    Severity,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

mod logging;

#[derive(Parser)]
#[command(name = "socbot")]
#[command(about = "🤖 socbot - override sheet automation for the permit portal")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(long, short = 'c', env = "SOCBOT_CONFIG", default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Run the browser without a window
    #[arg(long, global = true)]
    headless: bool,

    /// Chrome or Chromium binary to launch instead of the detected one
    #[arg(long, env = "SOCBOT_CHROME", global = true)]
    chrome: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enter every override of a workbook into a SOC
    Import {
        /// Workbook to read
        #[arg(long, short)]
        input: PathBuf,
        /// SOC id, defaults to the one stamped in the workbook
        #[arg(long)]
        soc: Option<String>,
    },
    /// Save the overrides of a SOC to a workbook
    Export {
        #[arg(long)]
        soc: String,
        /// Target file, defaults to SOC_<id>_overrides_<timestamp>.xlsx
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Accept an approved SOC for apply and confirm its points for every role
    Control {
        #[arg(long)]
        soc: String,
    },
    /// Load a workbook and show what an import would enter, without a browser
    Check {
        #[arg(long, short)]
        input: PathBuf,
        #[arg(long)]
        soc: Option<String>,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
}

fn exit_code(failure: &Failure) -> ExitCode {
    match failure.severity {
        Severity::Recoverable => ExitCode::SUCCESS,
        Severity::Fatal => ExitCode::from(1),
        Severity::Terminal => ExitCode::from(2),
    }
}

fn report_failure(failure: &Failure) -> ExitCode {
    let label = match failure.severity {
        Severity::Terminal => "TERMINAL".red().bold(),
        Severity::Fatal => "FATAL".red().bold(),
        Severity::Recoverable => "WARNING".yellow().bold(),
    };
    eprintln!("{label} [{}] {}", failure.step, failure.message);
    exit_code(failure)
}

fn print_summary(summary: &BatchSummary) {
    let line = summary.describe();
    if summary.failed == 0 && !summary.stopped_early() {
        println!("{} {}", "✅".green(), line.green());
    } else {
        println!("{} {}", "❌".red(), line.red());
    }
    for failure in &summary.failures {
        println!(
            "   {} {} [{}] {}",
            format!("#{}", failure.index).dimmed(),
            failure.tag.bold(),
            failure.failure.step,
            failure.failure.message
        );
    }
}

async fn launch(cli: &Cli) -> Result<Arc<dyn Session>> {
    let options = ChromeOptions {
        headless: cli.headless,
        executable: cli.chrome.clone(),
        ..ChromeOptions::default()
    };
    let session = ChromeSession::launch(options)
        .await
        .context("Failed to launch the browser")?;
    Ok(Arc::new(session))
}

/// Leaves the window to the operator, then shuts the browser down.
async fn hand_over(session: Arc<dyn Session>, config: &Config, headless: bool) {
    if !headless && session.is_alive().await {
        println!("{}", "Close the browser window when you are done.".dimmed());
        let portal = Portal::new(session.clone(), config.settings.clone());
        portal
            .wait_for_browser_close(config.settings.user_input_timeout())
            .await;
    }
    if session.is_alive().await {
        if let Err(e) = session.close().await {
            error!("Failed to close the browser: {e}");
        }
    }
}

fn finish<T>(result: OperationResult<T>, on_success: impl FnOnce(T) -> ExitCode) -> ExitCode {
    match result {
        Ok(value) => on_success(value),
        Err(failure) => report_failure(&failure),
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    config.apply_env();
    for warning in &config.warnings {
        eprintln!("{} {}", "⚠️".yellow(), warning.yellow());
    }

    if let Commands::Check { input, soc, json } = &cli.command {
        let plan = ImportWorkflow::plan(&config, input, soc.as_deref(), None).await;
        return Ok(finish(plan, |plan| {
            if *json {
                match serde_json::to_string_pretty(&plan.workbook.records) {
                    Ok(text) => println!("{text}"),
                    Err(e) => eprintln!("Failed to render plan: {e}"),
                }
            } else {
                println!(
                    "{} SOC {} · {} overrides from sheet '{}'",
                    "📋".bold(),
                    plan.soc_id.bold(),
                    plan.workbook.records.len(),
                    plan.workbook.sheet
                );
                for (i, record) in plan.workbook.records.iter().enumerate() {
                    let chain = [
                        record.override_type.as_deref(),
                        record.override_method.as_deref(),
                        record.applied_state.as_deref(),
                        record.removed_state.as_deref(),
                    ]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" → ");
                    println!("  {:>3}. {:<16} {}", i + 1, record.tag.bold(), chain);
                }
                if !plan.workbook.skipped_rows.is_empty() {
                    println!(
                        "  {} rows without a tag: {:?}",
                        "skipped".yellow(),
                        plan.workbook.skipped_rows
                    );
                }
            }
            ExitCode::SUCCESS
        }));
    }

    let session = launch(&cli).await?;
    let code = match &cli.command {
        Commands::Import { input, soc } => {
            let result = ImportWorkflow::new(session.clone(), config.clone())
                .run(input, soc.as_deref())
                .await;
            finish(result, |report| {
                print_summary(&report.summary);
                match report.summary.outcome() {
                    Ok(()) => ExitCode::SUCCESS,
                    Err(failure) => exit_code(&failure),
                }
            })
        }
        Commands::Export { soc, output } => {
            let result = ExportWorkflow::new(session.clone(), config.clone())
                .run(soc, output.as_deref())
                .await;
            finish(result, |report| {
                match &report.path {
                    Some(path) => println!(
                        "{} {} overrides of SOC {} saved to {}",
                        "✅".green(),
                        report.rows,
                        report.soc_id,
                        path.display()
                    ),
                    None => println!("{} SOC {} has no overrides", "ℹ️".yellow(), report.soc_id),
                }
                ExitCode::SUCCESS
            })
        }
        Commands::Control { soc } => {
            let result = ControlWorkflow::new(session.clone(), config.clone())
                .run(soc)
                .await;
            finish(result, |report| {
                println!(
                    "{} SOC {}: {} → {}",
                    "✅".green(),
                    report.soc_id,
                    report.initial_status,
                    report.final_status.bold()
                );
                for role in &report.roles {
                    match role.points {
                        Some(points) => println!(
                            "   {} {} of {} points updated",
                            role.role.bold(),
                            points.changed,
                            points.total
                        ),
                        None => println!("   {} no editable points", role.role.bold()),
                    }
                }
                ExitCode::SUCCESS
            })
        }
        Commands::Check { .. } => ExitCode::SUCCESS,
    };

    hand_over(session, &config, cli.headless).await;
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match logging::init_logging() {
        Ok(dir) => info!("Logs are written to {}", dir.display()),
        Err(e) => eprintln!("Failed to initialize logging: {e}"),
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("{} {e:#}", "Error:".red().bold());
            ExitCode::from(1)
        }
    }
}
