//! suite-orchestrator command-line interface
//!
//! Loads suites and pipelines from a configuration file, runs them, and keeps
//! execution history on disk between invocations.
//!
//! ## Usage
//!
//! ```bash
//! # Write an example configuration
//! suite-orchestrator config init
//!
//! # Run a suite together with its dependencies
//! suite-orchestrator run suite checkout --trigger commit --commit abc123
//!
//! # Run a pipeline
//! suite-orchestrator run pipeline nightly --build-id 1042
//!
//! # Inspect history and statistics
//! suite-orchestrator history --suite checkout --limit 50
//! suite-orchestrator stats --health
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod cli;

use cli::Args;
use suite_orchestrator::config::ConfigFile;
use suite_orchestrator::models::{RunOptions, RunReport, RunStatus, SuiteType, Trigger};
use suite_orchestrator::notify::{LogSink, SinkChain, WebhookSink};
use suite_orchestrator::output::{write_to_file, OutputFormat, ResultFormatter};
use suite_orchestrator::results::{ExportFormat, HistoryStore};
use suite_orchestrator::utils::{init_logger, LogLevel};
use suite_orchestrator::{runners, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(LogLevel::from_args(args.log_level.as_deref(), args.verbose));

    let config_path = args.config.clone().or_else(ConfigFile::find);

    match args.command {
        cli::Command::Run(run_args) => {
            run(config_path.as_deref(), run_args).await?;
        }
        cli::Command::List(list_args) => {
            list(config_path.as_deref(), list_args)?;
        }
        cli::Command::Validate => {
            validate(config_path.as_deref())?;
        }
        cli::Command::History(history_args) => {
            show_history(config_path.as_deref(), history_args)?;
        }
        cli::Command::Stats(stats_args) => {
            show_stats(config_path.as_deref(), stats_args)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_path.as_deref(), config_args)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ConfigFile> {
    match path {
        Some(path) => ConfigFile::load(path),
        None => {
            debug!("No configuration file found, using defaults");
            Ok(ConfigFile::default())
        }
    }
}

/// Build an orchestrator with every suite and pipeline of the config registered
fn build_orchestrator(config: &ConfigFile) -> Result<Orchestrator> {
    let runner = runners::from_config(&config.app.runner)?;
    let sink = SinkChain::new()
        .with(LogSink)
        .with(WebhookSink::new(config.app.runner.timeout_secs)?);

    let orchestrator = Orchestrator::builder(runner)
        .sink(Arc::new(sink))
        .config(config.app.scheduler.clone())
        .build();

    config.apply(&orchestrator)?;
    Ok(orchestrator)
}

fn history_store(config: &ConfigFile) -> HistoryStore {
    HistoryStore::from_config(config.app.history_dir.as_deref())
}

/// Orchestrator seeded with the stored history
fn orchestrator_with_history(config: &ConfigFile) -> Result<(Orchestrator, HistoryStore)> {
    let orchestrator = build_orchestrator(config)?;
    let store = history_store(config);
    orchestrator.import_history(store.load()?);
    Ok((orchestrator, store))
}

fn formatter(format: &str) -> ResultFormatter {
    ResultFormatter::new(OutputFormat::from_str(format).unwrap_or(OutputFormat::Table))
}

fn parse_trigger(kind: &str, cron: Option<String>) -> Result<Trigger> {
    if kind.eq_ignore_ascii_case("schedule") {
        let cron = cron.context("--cron is required for schedule triggers")?;
        return Ok(Trigger::Schedule { cron });
    }
    Trigger::from_str(kind).ok_or_else(|| anyhow::anyhow!("Unknown trigger: {kind}"))
}

fn run_options(build: cli::BuildArgs) -> RunOptions {
    let mut options = RunOptions::default();
    if let Some(build_id) = build.build_id {
        options = options.build(build_id);
    }
    if let Some(commit) = build.commit {
        options = options.commit(commit);
    }
    options
}

async fn run(config_path: Option<&Path>, args: cli::RunArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let (orchestrator, store) = orchestrator_with_history(&config)?;

    let output = args.output;
    let (handle, format) = match args.target {
        cli::RunTarget::Suite {
            id,
            trigger,
            cron,
            build,
            format,
        } => {
            let options = run_options(build).trigger(parse_trigger(&trigger, cron)?);
            (orchestrator.run_suite_with(&id, options)?, format)
        }
        cli::RunTarget::Pipeline { id, build, format } => {
            (orchestrator.run_pipeline_with(&id, run_options(build))?, format)
        }
    };

    info!(
        "Started run {} for {} ({} executions queued)",
        handle.run_id(),
        handle.target(),
        handle.execution_ids().len()
    );

    let run_id = handle.run_id().to_string();
    let wait = handle.wait();
    tokio::pin!(wait);

    let finished = tokio::select! {
        report = &mut wait => Some(report),
        _ = tokio::signal::ctrl_c() => None,
    };
    let report = match finished {
        Some(report) => report,
        None => {
            warn!("Interrupted, cancelling run {}", run_id);
            orchestrator.cancel(&run_id)?;
            wait.await
        }
    }
    .context("Run task failed")?;

    let rendered = formatter(&format).format_report(&report);
    match &output {
        Some(path) => {
            write_to_file(&path.to_string_lossy(), &rendered)?;
            println!("✓ Report written to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    persist(&orchestrator, &store, &config, &report)?;

    if report.status != RunStatus::Completed {
        anyhow::bail!("Run {} {}", report.run_id, report.status);
    }
    Ok(())
}

fn persist(
    orchestrator: &Orchestrator,
    store: &HistoryStore,
    config: &ConfigFile,
    report: &RunReport,
) -> Result<()> {
    store.append(
        &orchestrator.executions(),
        config.app.scheduler.history_limit,
    )?;
    let path = store.save_report(report)?;
    debug!("Run report written to {}", path.display());
    Ok(())
}

fn list(config_path: Option<&Path>, args: cli::ListArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let orchestrator = build_orchestrator(&config)?;
    let suites = orchestrator.suites();
    let formatter = ResultFormatter::default();

    let output = match &args.suite_type {
        Some(name) => {
            let suite_type = SuiteType::from_str(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown suite type: {name}"))?;
            formatter.format_suites(suites.list_by_type(suite_type))
        }
        None => formatter.format_suites(suites.list_all()),
    };

    if suites.is_empty() {
        println!("\nNo suites registered.");
        println!("   Create a configuration with: suite-orchestrator config init\n");
        return Ok(());
    }

    println!("\nSuites ({} registered)\n", suites.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print!("{output}");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if args.pipelines {
        let pipelines = orchestrator.pipelines();
        println!("\nPipelines ({} registered)\n", pipelines.len());
        for pipeline in pipelines.list_all() {
            let mode = if pipeline.parallel {
                "parallel"
            } else {
                "sequential"
            };
            println!(
                "  - {:20} [{}{}] {}",
                pipeline.id,
                mode,
                if pipeline.fail_fast { ", fail-fast" } else { "" },
                pipeline.suites.join(" -> ")
            );
        }
        println!();
    }

    Ok(())
}

fn validate(config_path: Option<&Path>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow::anyhow!("No configuration file found"))?;

    let result = ConfigFile::load(&path).and_then(|config| {
        let orchestrator = build_orchestrator(&config)?;
        Ok((orchestrator.suites().len(), orchestrator.pipelines().len()))
    });

    match result {
        Ok((suites, pipelines)) => {
            println!(
                "✓ Configuration file is valid: {} ({suites} suites, {pipelines} pipelines)",
                path.display()
            );
            Ok(())
        }
        Err(e) => {
            println!("✗ Configuration file is invalid: {}", path.display());
            println!("  Error: {e:#}");
            Err(e)
        }
    }
}

fn show_history(config_path: Option<&Path>, args: cli::HistoryArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let store = history_store(&config);

    let mut executions = store.load()?;
    if let Some(suite) = &args.suite {
        executions.retain(|e| &e.suite_id == suite);
    }
    executions.sort_by_key(|e| std::cmp::Reverse(e.sort_time()));
    executions.truncate(args.limit);

    if let Some(path) = &args.export {
        let format = ExportFormat::from_extension(path).unwrap_or(ExportFormat::Json);
        store.export(&executions, path, format)?;
        println!("✓ Exported {} executions to {}", executions.len(), path.display());
        return Ok(());
    }

    if executions.is_empty() {
        println!("\nNo stored executions found.");
        println!("   Run something with: suite-orchestrator run suite <id>\n");
        return Ok(());
    }

    println!("{}", formatter(&args.format).format_history(&executions));
    Ok(())
}

fn show_stats(config_path: Option<&Path>, args: cli::StatsArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let (orchestrator, _) = orchestrator_with_history(&config)?;
    let formatter = formatter(&args.format);

    if args.health {
        println!(
            "{}",
            formatter.format_health(&orchestrator.suite_health(args.window))
        );
    } else {
        let stats = orchestrator.stats(args.suite.as_deref(), args.window);
        println!("{}", formatter.format_stats(&stats));
    }
    Ok(())
}

fn manage_config(config_path: Option<&Path>, args: cli::ConfigArgs) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    output.display()
                );
            }

            ConfigFile::example().save(&output)?;
            println!("✓ Configuration file created: {}", output.display());
            println!("\nEdit the file to declare your suites and pipelines.");
        }

        cli::ConfigAction::Show { format } => {
            let config = load_config(config_path)?;
            let output = if format == "json" {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_yaml::to_string(&config)?
            };
            println!("{output}");
        }

        cli::ConfigAction::Path => match config_path {
            Some(path) => println!("{}", path.display()),
            None => {
                let store = HistoryStore::default_dir();
                println!("No configuration file found (history: {})", store.base_dir().display());
            }
        },
    }

    Ok(())
}
