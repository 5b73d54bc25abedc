//! syncsift - find duplicate content and nested sync roots across cloud-sync
//! folders.
//!
//! Usage:
//!   syncsift plan [ROOTS...]        Analyze roots and propose a plan
//!   syncsift nesting [ROOTS...]     Report structural problems only
//!   syncsift execute PLAN.json      Simulate or apply a saved plan
//!
//! Roots are written `[id=]path[:priority]`.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use syncsift_analyze::NestingAnalyzer;
use syncsift_core::{
    AnalysisConfig, ExecutionMode, ExecutionPlan, ExecutionReport, NestingIssue, StorageRoot,
    format_size,
};
use syncsift_ops::{AnalysisPipeline, AnalysisRun, ExecutionOptions, Executor};

#[derive(Parser)]
#[command(
    name = "syncsift",
    version,
    about = "Find duplicate content and nested sync roots",
    long_about = "syncsift inventories the local folders of your sync services, finds \
                  duplicate files and roots nested inside each other, and proposes a \
                  reviewable plan. Plans are simulated unless executed with --real."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze storage roots and propose a plan
    Plan {
        /// Storage roots as `[id=]path[:priority]`
        roots: Vec<String>,

        #[command(flatten)]
        settings: Settings,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Write the plan as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report nesting problems between storage roots
    Nesting {
        /// Storage roots as `[id=]path[:priority]`
        roots: Vec<String>,

        #[command(flatten)]
        settings: Settings,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Execute a plan written by `syncsift plan --output`
    Execute {
        /// Plan file
        plan: PathBuf,

        /// Apply changes instead of simulating
        #[arg(long)]
        real: bool,

        /// Minimum confidence for unconfirmed destructive actions
        /// (defaults to the configured value, 90 out of the box)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,

        /// Confirm an action by id (repeatable)
        #[arg(short, long = "confirm", value_name = "ID")]
        confirm: Vec<String>,

        /// Where per-run backup folders are created
        #[arg(short, long)]
        backup_dir: Option<PathBuf>,

        /// Configuration file (defaults to the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Options shared by the analysis commands.
#[derive(clap::Args)]
struct Settings {
    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Home directory used for Desktop/Documents/Pictures checks
    #[arg(long)]
    home: Option<PathBuf>,

    /// Maximum directory depth below each root
    #[arg(long)]
    max_depth: Option<u32>,

    /// Where per-run backup folders are created
    #[arg(long)]
    backup_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Plan {
            roots,
            settings,
            format,
            output,
        } => run_plan(&roots, &settings, format, output)?,
        Command::Nesting {
            roots,
            settings,
            format,
        } => run_nesting(&roots, &settings, format)?,
        Command::Execute {
            plan,
            real,
            threshold,
            confirm,
            backup_dir,
            config,
            format,
        } => {
            let overrides = ExecuteOverrides {
                real,
                threshold,
                confirm,
                backup_dir,
            };
            run_execute(&plan, config.as_deref(), overrides, format)?
        }
    }

    Ok(())
}

/// Install the stderr log subscriber.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("SYNCSIFT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line settings of `execute` that override the config file.
struct ExecuteOverrides {
    real: bool,
    threshold: Option<u8>,
    confirm: Vec<String>,
    backup_dir: Option<PathBuf>,
}

/// Read the config file at `path`, or the default location when it exists.
fn read_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let path = path.map(Path::to_path_buf).or_else(|| {
        dirs::config_dir()
            .map(|dir| dir.join("syncsift").join("config.toml"))
            .filter(|p| p.exists())
    });

    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Cannot read config {}", path.display()))?;
            toml::from_str::<AnalysisConfig>(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    debug!(roots = config.roots.len(), "configuration loaded");
    Ok(config)
}

/// Load the config file and apply command-line overrides.
fn load_config(roots: &[String], settings: &Settings) -> Result<AnalysisConfig> {
    let mut config = read_config(settings.config.as_deref())?;

    if !roots.is_empty() {
        config.roots = roots
            .iter()
            .enumerate()
            .map(|(i, arg)| parse_root(arg, i))
            .collect::<Result<_>>()?;
    }
    if config.roots.is_empty() {
        bail!("No storage roots given; pass them as arguments or list them in the config file");
    }

    if let Some(home) = &settings.home {
        config.home_dir = Some(home.clone());
    } else if config.home_dir.is_none() {
        config.home_dir = dirs::home_dir();
    }
    if let Some(depth) = settings.max_depth {
        config.max_depth = depth;
    }
    if let Some(dir) = &settings.backup_dir {
        config.backup_dir = Some(dir.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Parse `[id=]path[:priority]`.
fn parse_root(arg: &str, index: usize) -> Result<StorageRoot> {
    let (id, rest) = match arg.split_once('=') {
        Some((id, rest)) if !id.is_empty() => (Some(id), rest),
        _ => (None, arg),
    };

    let (path, priority) = match rest.rsplit_once(':') {
        Some((path, prio)) if !path.is_empty() => match prio.parse::<u32>() {
            Ok(prio) => (path, prio),
            Err(_) => (rest, index as u32),
        },
        _ => (rest, index as u32),
    };
    if path.is_empty() {
        bail!("Empty path in root '{arg}'");
    }

    let path = PathBuf::from(path);
    let id = match id {
        Some(id) => id.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| format!("root{}", index + 1)),
    };

    Ok(StorageRoot::new(id, path).with_priority(priority))
}

/// Analyze roots and print or save the plan.
fn run_plan(
    roots: &[String],
    settings: &Settings,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(roots, settings)?;

    eprintln!("Analyzing {} storage roots...", config.roots.len());
    let run = AnalysisPipeline::new()
        .run(&config, SystemTime::now(), &CancellationToken::new())
        .context("Analysis failed")?;

    if let Some(output_path) = &output {
        let json = serde_json::to_string_pretty(&run.plan)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("Cannot write {}", output_path.display()))?;
        eprintln!("Plan written to {}", output_path.display());
    }

    match format {
        OutputFormat::Text => print_run(&run),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run)?),
    }

    Ok(())
}

/// Report nesting issues only.
fn run_nesting(roots: &[String], settings: &Settings, format: OutputFormat) -> Result<()> {
    let config = load_config(roots, settings)?;
    let issues = NestingAnalyzer::from_config(&config).analyze(&config.roots, &CancellationToken::new());

    match format {
        OutputFormat::Text => {
            rule(" Nesting Report");
            print_issues(&issues);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&issues)?),
    }

    Ok(())
}

/// Simulate or apply a saved plan.
fn run_execute(
    plan_path: &Path,
    config_path: Option<&Path>,
    overrides: ExecuteOverrides,
    format: OutputFormat,
) -> Result<()> {
    let config = read_config(config_path)?;
    config.validate()?;

    let text = std::fs::read_to_string(plan_path)
        .with_context(|| format!("Cannot read plan {}", plan_path.display()))?;
    let mut plan: ExecutionPlan =
        serde_json::from_str(&text).with_context(|| format!("Invalid plan {}", plan_path.display()))?;

    plan.mode = if overrides.real {
        ExecutionMode::Real
    } else {
        ExecutionMode::Simulate
    };

    let mut options = ExecutionOptions::from_config(&config);
    if let Some(threshold) = overrides.threshold {
        options = options.with_threshold(threshold);
    }
    if let Some(dir) = overrides.backup_dir {
        plan.backup_root = Some(dir);
    } else if plan.backup_root.is_none() && options.backup_dir.is_none() {
        if let Some(dir) = dirs::data_local_dir() {
            options = options.with_backup_dir(dir.join("syncsift").join("backups"));
        }
    }

    for id in overrides.confirm {
        if !plan.actions.iter().any(|a| a.id.as_str() == id) {
            bail!("No action with id '{id}' in the plan");
        }
        options = options.confirm(id);
    }

    let report = Executor::with_options(options)
        .execute(&plan)
        .context("Execution failed")?;

    match format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn rule(title: &str) {
    println!();
    println!("{}", "─".repeat(70));
    println!("{title}");
    println!("{}", "─".repeat(70));
    println!();
}

fn print_run(run: &AnalysisRun) {
    rule(" Inventory");
    println!(
        " {} files, {} in {} directories",
        run.stats.files_seen,
        format_size(run.stats.bytes_seen),
        run.stats.dirs_seen
    );
    for (root, stats) in &run.stats.per_root {
        println!("   {:<20} {:>8} files {:>12}", root, stats.files, format_size(stats.bytes));
    }
    if run.stats.unanalyzable_files > 0 {
        println!(" {} files could not be analyzed", run.stats.unanalyzable_files);
    }
    if run.stats.limits_hit() {
        println!(" Scan limits were reached; results are partial");
    }
    if !run.warnings.is_empty() {
        println!(" {} warning(s) during scan", run.warnings.len());
    }
    if run.cancelled {
        println!(" Analysis was cancelled");
    }

    rule(" Nesting");
    print_issues(&run.issues);

    rule(" Plan");
    let summary = run.plan.summary();
    if run.plan.actions.is_empty() {
        println!(" Nothing to do.");
        println!();
        return;
    }
    println!(
        " {} actions ({} safe, {} review, {} manual), up to {} recoverable",
        summary.total_actions,
        summary.safe,
        summary.review,
        summary.manual_only,
        format_size(summary.total_estimated_bytes)
    );
    println!();

    for action in &run.plan.actions {
        let marker = match action.severity {
            Some(severity) => severity.to_string(),
            None => format!("{}%", action.confidence),
        };
        println!(
            " [{}] {:<10} {} {}",
            action.id,
            marker,
            action.kind,
            format_size(action.estimated_space_saved_bytes)
        );
        println!("   {}", action.description);
        for target in &action.targets {
            println!("   - {}", target.display());
        }
        for (i, step) in action.steps.iter().enumerate() {
            println!("   {}. {step}", i + 1);
        }
        if action.requires_confirmation {
            println!("   requires --confirm {}", action.id);
        }
        println!();
    }
}

fn print_issues(issues: &[NestingIssue]) {
    if issues.is_empty() {
        println!(" No nesting problems found.");
        println!();
        return;
    }
    for issue in issues {
        println!(
            " [{}] {}: {}",
            issue.severity, issue.kind, issue.description
        );
        if let Some(path) = &issue.path {
            println!("   {}", path.display());
        }
    }
    println!();
}

fn print_report(report: &ExecutionReport) {
    rule(&format!(" Execution Report ({})", report.mode));
    for outcome in &report.outcomes {
        println!(
            " [{}] {:<24} {:>12}",
            outcome.action_id,
            outcome.status.to_string(),
            format_size(outcome.bytes_freed)
        );
        for error in &outcome.errors {
            println!("   ! {}: {}", error.path.display(), error.message);
        }
    }
    println!();
    println!(" Space recovered:           {}", format_size(report.space_saved_bytes));
    println!(" Applied:                   {}", report.applied);
    println!(" Simulated:                 {}", report.simulated);
    println!(" Skipped below threshold:   {}", report.skipped_below_threshold);
    println!(" Awaiting confirmation:     {}", report.awaiting_confirmation);
    println!(" Advisory only:             {}", report.advisory);
    println!(" Failed:                    {}", report.failed_actions);
    println!(" Unanalyzable files:        {}", report.unanalyzable_files);
    if let Some(backup) = &report.backup_root {
        println!(" Backups in:                {}", backup.display());
    }
    if report.cancelled {
        println!(" Execution was cancelled");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_forms() {
        let root = parse_root("drive=/Cloud/Drive:2", 0).unwrap();
        assert_eq!(root.id, "drive");
        assert_eq!(root.path, PathBuf::from("/Cloud/Drive"));
        assert_eq!(root.priority, 2);

        let root = parse_root("/Cloud/Dropbox", 3).unwrap();
        assert_eq!(root.id, "dropbox");
        assert_eq!(root.priority, 3);

        let root = parse_root("box=/mnt/a:b", 1).unwrap();
        assert_eq!(root.path, PathBuf::from("/mnt/a:b"));
        assert_eq!(root.priority, 1);

        assert!(parse_root("x=", 0).is_err());
    }
}
