//! ferrostage - snapshot, compare and stage changed files
//!
//! Captures directory inventories, diffs them into changesets and moves the
//! changed files into (and back out of) a staging area through a bounded pool
//! of transfer jobs.

mod display;
mod json_output;
mod logging;
mod progress;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use ferrostage_config::{Config, ConfigBuilder, ConfigLoader};
use ferrostage_engine::{
    plan_deployment, plan_staging, LocalTransferFacility, OrchestratorConfig, Plan, ProgressSink,
    RunSummary, TransferOrchestrator,
};
use ferrostage_sync::{
    load_changeset, load_error_paths, load_snapshot, save_changeset, save_snapshot, write_json,
    DiffEngine, Scanner,
};
use ferrostage_types::{Priority, TransferMode};
use json_output::{CompareResultJson, RunResultJson, SnapshotResultJson};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// ferrostage - snapshot, compare and stage changed files
#[derive(Parser)]
#[command(
    name = "ferrostage",
    version = env!("CARGO_PKG_VERSION"),
    about = "Snapshot directories, diff them and stage the changes",
    long_about = "ferrostage captures file inventories, compares two of them into a changeset\n\
                  and transfers the added and modified files into a staging area, or restores\n\
                  a staging area back to its original drives."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a snapshot of a directory tree
    Snapshot {
        /// Directory to capture
        root: PathBuf,
        /// Snapshot file to write
        #[arg(short, long)]
        output: PathBuf,
        /// Regex of paths to leave out, in addition to the configured ones
        #[arg(long)]
        exclude: Vec<String>,
        /// Follow symbolic links
        #[arg(long)]
        follow_links: bool,
    },
    /// Compare two snapshots into a changeset
    Compare {
        /// Earlier snapshot
        before: PathBuf,
        /// Later snapshot
        after: PathBuf,
        /// Changeset file to write
        #[arg(short, long)]
        output: PathBuf,
        /// JSON file with additional paths to leave out of the comparison
        #[arg(long)]
        exclude_file: Vec<PathBuf>,
    },
    /// Transfer the added and modified files of a changeset into a staging root
    Stage {
        /// Changeset produced by `compare`
        changeset: PathBuf,
        /// Staging root, overriding the configured one
        #[arg(long)]
        staging_root: Option<PathBuf>,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Transfer staged files back to their drives or beneath a target
    Deploy {
        /// Staging root, overriding the configured one
        staging_root: Option<PathBuf>,
        /// Restore beneath this directory instead of the original drives
        #[arg(long)]
        target: Option<PathBuf>,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Show the effective configuration or write a default one
    Config {
        /// Write a default configuration file here
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct TransferArgs {
    /// Copy or move
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,
    /// Maximum number of concurrent transfer jobs (1-10)
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,
    /// Priority passed to the transfer facility
    #[arg(short, long, value_enum)]
    priority: Option<PriorityArg>,
    /// Write the full run summary as JSON
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Write success.log and failure.log into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum ModeArg {
    Copy,
    Move,
}

impl From<ModeArg> for TransferMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Copy => Self::Copy,
            ModeArg::Move => Self::Move,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum PriorityArg {
    Low,
    Normal,
    High,
    Critical,
}

impl From<PriorityArg> for Priority {
    fn from(priority: PriorityArg) -> Self {
        match priority {
            PriorityArg::Low => Self::Low,
            PriorityArg::Normal => Self::Normal,
            PriorityArg::High => Self::High,
            PriorityArg::Critical => Self::Critical,
        }
    }
}

/// Output switches shared by every subcommand
#[derive(Clone, Copy)]
struct Output {
    quiet: bool,
    json: bool,
}

impl Output {
    fn text(self) -> bool {
        !self.quiet && !self.json
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let level = logging::resolve_level(&config.logging.level, cli.debug, cli.verbose, cli.quiet);
    let _guard = logging::init_logging(&config.logging, level)?;

    info!("ferrostage v{} starting", env!("CARGO_PKG_VERSION"));

    let output = Output {
        quiet: cli.quiet,
        json: cli.json,
    };

    match cli.command {
        Commands::Snapshot {
            root,
            output: path,
            exclude,
            follow_links,
        } => snapshot_command(&config, root, path, exclude, follow_links, output).await,
        Commands::Compare {
            before,
            after,
            output: path,
            exclude_file,
        } => compare_command(before, after, path, exclude_file, output).await,
        Commands::Stage {
            changeset,
            staging_root,
            transfer,
        } => stage_command(&config, changeset, staging_root, &transfer, output).await,
        Commands::Deploy {
            staging_root,
            target,
            transfer,
        } => deploy_command(&config, staging_root, target, &transfer, output).await,
        Commands::Config { output: path } => config_command(&config, path),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load_default(),
    }
    .context("failed to load configuration")?;
    ConfigBuilder::validate(&config).context("invalid configuration")?;
    Ok(config)
}

async fn snapshot_command(
    config: &Config,
    root: PathBuf,
    path: PathBuf,
    exclude: Vec<String>,
    follow_links: bool,
    output: Output,
) -> Result<ExitCode> {
    let patterns: Vec<String> = config.scan.exclude.iter().cloned().chain(exclude).collect();
    let scanner = Scanner::new()
        .with_exclude_patterns(&patterns)?
        .follow_links(follow_links || config.scan.follow_links);

    let spinner = display::create_spinner(
        &format!("Scanning {}...", root.display()),
        !output.text(),
    );
    let snapshot = tokio::task::spawn_blocking(move || scanner.capture(&root))
        .await
        .context("scan task failed")??;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    save_snapshot(&path, &snapshot).await?;

    if output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&SnapshotResultJson::new(&snapshot, &path))?
        );
    } else if !output.quiet {
        display::display_snapshot(&snapshot, &path);
    }
    Ok(ExitCode::SUCCESS)
}

async fn compare_command(
    before: PathBuf,
    after: PathBuf,
    path: PathBuf,
    exclude_files: Vec<PathBuf>,
    output: Output,
) -> Result<ExitCode> {
    let earlier = load_snapshot(&before).await?;
    let later = load_snapshot(&after).await?;

    let mut exclusions = Vec::new();
    for file in &exclude_files {
        exclusions.extend(load_error_paths(file).await?);
    }

    let changeset = DiffEngine::default().compare_excluding(&earlier, &later, &exclusions);
    save_changeset(&path, &changeset).await?;

    let summary = changeset.summary();
    if output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&CompareResultJson::new(&before, &after, summary, &path))?
        );
    } else if !output.quiet {
        display::display_changeset(&summary, &path);
    }
    Ok(ExitCode::SUCCESS)
}

async fn stage_command(
    config: &Config,
    changeset: PathBuf,
    staging_root: Option<PathBuf>,
    args: &TransferArgs,
    output: Output,
) -> Result<ExitCode> {
    let staging_root = staging_root
        .or_else(|| config.staging.staging_root.clone())
        .ok_or_else(|| anyhow!("no staging root given and none configured"))?;

    let changeset = load_changeset(&changeset).await?;
    let plan = plan_staging(&changeset, &staging_root).await;

    if output.text() {
        println!(
            "{} Staging {} files into {}",
            style("→").green().bold(),
            style(plan.operations.len()).cyan(),
            style(staging_root.display()).cyan()
        );
    }
    run_plan("stage", config, plan, args, output).await
}

async fn deploy_command(
    config: &Config,
    staging_root: Option<PathBuf>,
    target: Option<PathBuf>,
    args: &TransferArgs,
    output: Output,
) -> Result<ExitCode> {
    let staging_root = staging_root
        .or_else(|| config.staging.staging_root.clone())
        .ok_or_else(|| anyhow!("no staging root given and none configured"))?;
    let target = target.or_else(|| config.staging.deploy_target.clone());

    let plan = plan_deployment(&staging_root, target.as_deref()).await?;

    if output.text() {
        let destination = target
            .as_ref()
            .map_or_else(|| "original drives".to_string(), |t| t.display().to_string());
        println!(
            "{} Deploying {} files from {} to {}",
            style("→").green().bold(),
            style(plan.operations.len()).cyan(),
            style(staging_root.display()).cyan(),
            style(destination).cyan()
        );
    }
    run_plan("deploy", config, plan, args, output).await
}

async fn run_plan(
    operation: &str,
    config: &Config,
    plan: Plan,
    args: &TransferArgs,
    output: Output,
) -> Result<ExitCode> {
    let mut transfer = config.transfer.clone();
    if let Some(mode) = args.mode {
        transfer.mode = mode.into();
    }
    if let Some(concurrency) = args.concurrency {
        transfer.concurrency = concurrency;
    }
    if let Some(priority) = args.priority {
        transfer.priority = priority.into();
    }
    let orchestrator_config = OrchestratorConfig::from_config(&transfer)?;

    let (sink, receiver) = ProgressSink::channel();
    let tracker = progress::track(receiver, !output.text());

    let orchestrator = TransferOrchestrator::new(
        Arc::new(LocalTransferFacility::new()),
        orchestrator_config,
    )
    .with_progress(sink);
    let interrupts = tokio::spawn(watch_interrupts(
        orchestrator.cancellation_token(),
        orchestrator.abort_token(),
    ));

    let result = orchestrator.run(plan).await;
    interrupts.abort();
    drop(orchestrator);
    let _ = tracker.await;

    let (summary, aborted) = match result {
        Ok(summary) => (summary, None),
        Err(aborted) => (*aborted.summary, Some(aborted.reason)),
    };

    write_reports(&summary, args).await?;
    let reason = aborted.as_ref().map(ToString::to_string);

    if output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&RunResultJson::new(
                operation,
                &summary,
                reason.as_deref()
            ))?
        );
    } else if !output.quiet {
        display::display_run_summary(&summary);
        if let Some(reason) = &reason {
            display::display_error(&format!("Run aborted: {reason}"));
        } else if summary.has_failures() {
            display::display_warning(&format!(
                "{} operations failed",
                summary.failures_including_partial()
            ));
        } else {
            display::display_success("All operations completed");
        }
    }

    if let Some(reason) = aborted {
        bail!(reason);
    }
    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn write_reports(summary: &RunSummary, args: &TransferArgs) -> Result<()> {
    if let Some(path) = &args.summary {
        write_json(path, summary).await?;
    }

    if let Some(directory) = &args.log_dir {
        tokio::fs::create_dir_all(directory)
            .await
            .with_context(|| format!("cannot create {}", directory.display()))?;
        for (name, lines) in [
            ("success.log", summary.success_log()),
            ("failure.log", summary.failure_log()),
        ] {
            let mut contents = lines.join("\n");
            if !contents.is_empty() {
                contents.push('\n');
            }
            let path = directory.join(name);
            tokio::fs::write(&path, contents)
                .await
                .with_context(|| format!("cannot write {}", path.display()))?;
        }
    }
    Ok(())
}

/// First interrupt drains the run, the second aborts it
async fn watch_interrupts(cancel: CancellationToken, abort: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("Interrupt received, waiting for open transfers (interrupt again to abort)");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Second interrupt received, aborting open transfers");
        abort.cancel();
    }
}

fn config_command(config: &Config, path: Option<PathBuf>) -> Result<ExitCode> {
    match path {
        Some(path) => {
            ConfigLoader::generate_default_config(&path)?;
            display::display_success(&format!(
                "Default configuration written to {}",
                path.display()
            ));
        }
        None => {
            println!("{} Current configuration:", style("⚙").blue().bold());
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}
