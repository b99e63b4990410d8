//! kimrun - match and run KIM Tests against Models
//!
//! ## Commands
//!
//! - `list`: List items of one kind
//! - `build`: Build items (drivers first)
//! - `match`: Check which runner/subject pairs are valid matches
//! - `run`: Build, match and run pairs, filing results in the result tree

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kimrun_core::{
    DeclaredOnly, ExecOptions, Executor, ItemKind, KimConfig, MakeBuilder, MatchEngine,
    NativeInterface, Pipeline, ProcessInterface, Registry, ResultSink, SurrealResultIndex,
};
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "kimrun")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Match KIM Tests and Verification Checks with Models and run them", long_about = None)]
struct Cli {
    /// Enable verbose output (debug logs, echo runner output)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./kimrun.toml when present)
    #[arg(long, global = true, env = "KIMRUN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List items of a kind (e.g. `tests`, `model`, `SM`)
    List {
        kind: String,

        /// Include every version, not only the freshest per lineage
        #[arg(long)]
        all_versions: bool,
    },

    /// Build an item or every item matching a glob
    Build {
        /// Identifier or glob pattern
        item: String,
    },

    /// Check runner/subject compatibility
    ///
    /// With one argument, each item is paired with every item of the
    /// complementary kinds.
    Match {
        /// Identifier or glob pattern
        first: String,

        /// Identifier or glob pattern to pair with
        second: Option<String>,

        /// Consider every version, not only the freshest per lineage
        #[arg(long)]
        all_versions: bool,

        /// Also list rejected pairs and why
        #[arg(long)]
        mismatches: bool,
    },

    /// Run matched pairs and file their results
    Run {
        /// Runner identifier or glob pattern
        runner: String,

        /// Subject identifier or glob pattern (default: every fresh counterpart)
        subject: Option<String>,

        /// Consider every version, not only the freshest per lineage
        #[arg(long)]
        all_versions: bool,

        /// Run inside the runner's directory and skip the result tree
        #[arg(long)]
        inplace: bool,

        /// Per-run timeout in seconds (0 = unbounded)
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    kimrun_core::init_tracing(cli.json, level);

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}. Aborting...", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config =
        KimConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    debug!(?config, "configuration resolved");

    match cli.command {
        Commands::List { kind, all_versions } => cmd_list(&config, &kind, all_versions),
        Commands::Build { item } => cmd_build(&config, &item).await,
        Commands::Match {
            first,
            second,
            all_versions,
            mismatches,
        } => cmd_match(&config, &first, second.as_deref(), all_versions, mismatches).await,
        Commands::Run {
            runner,
            subject,
            all_versions,
            inplace,
            timeout,
        } => {
            let options = ExecOptions {
                scratch_root: config.scratch.clone(),
                verbose: cli.verbose,
                inplace,
                timeout_secs: timeout.unwrap_or(config.timeout_secs),
            };
            cmd_run(&config, options, &runner, subject.as_deref(), all_versions).await
        }
    }
}

fn open_pipeline(config: &KimConfig) -> Result<Pipeline> {
    let builder = MakeBuilder::new(config.build_argv()).context("Invalid build command")?;
    let registry = Registry::open(&config.repository, Arc::new(builder)).with_context(|| {
        format!(
            "Failed to open repository {}",
            config.repository.display()
        )
    })?;

    let interface: Arc<dyn NativeInterface> = match &config.probe_program {
        Some(program) => Arc::new(ProcessInterface::new(program)),
        None => Arc::new(DeclaredOnly),
    };
    Ok(Pipeline::new(
        registry,
        MatchEngine::new(interface, &config.scratch),
    ))
}

async fn open_executor(config: &KimConfig, options: ExecOptions) -> Result<Executor> {
    let sink = ResultSink::new(&config.results).with_context(|| {
        format!(
            "Failed to prepare result tree {}",
            config.results.display()
        )
    })?;
    let mut executor = Executor::new(sink, options);

    if config.index {
        let index = SurrealResultIndex::connect(&config.index_url)
            .await
            .with_context(|| format!("Failed to connect to result index {}", config.index_url))?;
        executor = executor.with_index(Arc::new(index));
    }
    Ok(executor)
}

/// List items of one kind
fn cmd_list(config: &KimConfig, kind: &str, all_versions: bool) -> Result<()> {
    let kind: ItemKind = kind.parse().map_err(anyhow::Error::msg)?;
    let pipeline = open_pipeline(config)?;
    let items = pipeline.list(kind, all_versions);

    if items.is_empty() {
        println!("No {} items found", kind);
        return Ok(());
    }
    for item in items {
        println!("{}", item.id);
    }
    Ok(())
}

/// Build items
async fn cmd_build(config: &KimConfig, query: &str) -> Result<()> {
    let mut pipeline = open_pipeline(config)?;
    let built = pipeline.build(query).await?;
    for item in built {
        println!("Built {}", item.id);
    }
    Ok(())
}

/// Report matches (and optionally mismatches)
async fn cmd_match(
    config: &KimConfig,
    first: &str,
    second: Option<&str>,
    all_versions: bool,
    show_mismatches: bool,
) -> Result<()> {
    let mut pipeline = open_pipeline(config)?;
    let report = pipeline.match_items(first, second, all_versions).await?;

    for (runner, subject) in &report.matches {
        println!("MATCH     {} {}", runner, subject);
    }
    if show_mismatches {
        for mismatch in &report.mismatches {
            println!(
                "MISMATCH  {} {}: {}",
                mismatch.runner, mismatch.subject, mismatch.diagnostic
            );
            if let Some(log) = mismatch.diagnostic.log() {
                for line in log.lines() {
                    println!("          | {}", line);
                }
            }
        }
    }
    println!(
        "{} match(es), {} mismatch(es)",
        report.matches.len(),
        report.mismatches.len()
    );
    Ok(())
}

/// Run matched pairs
async fn cmd_run(
    config: &KimConfig,
    options: ExecOptions,
    runner: &str,
    subject: Option<&str>,
    all_versions: bool,
) -> Result<()> {
    let executor = open_executor(config, options).await?;
    let mut pipeline = open_pipeline(config)?;
    let report = pipeline
        .run(&executor, runner, subject, all_versions)
        .await?;

    for job in &report.jobs {
        let kind = job
            .result_kind
            .map(|k| k.to_string())
            .unwrap_or_else(|| "unclassified".to_string());
        let output = job
            .output_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!(
            "{:<20} {} ({:.2}s) -> {}",
            kind, job.job_id, job.runtime_seconds, output
        );
    }
    for mismatch in &report.mismatches {
        debug!(
            runner = %mismatch.runner,
            subject = %mismatch.subject,
            reason = %mismatch.diagnostic,
            "skipped"
        );
    }
    println!(
        "{} job(s) run, {} pair(s) skipped as mismatches",
        report.jobs.len(),
        report.mismatches.len()
    );
    Ok(())
}
