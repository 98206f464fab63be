use anyhow::{Context, Result};
use pipeco::cli::commands::{HistoryCommand, RunCommand, StepsCommand, ValidateCommand};
use pipeco::cli::output::*;
use pipeco::cli::{Cli, Command};
use pipeco::core::config::PipelineConfig;
use pipeco::core::{registry, ExecutionStatus, RunContext};
use pipeco::persistence::{ExecutionSummary, InMemoryPersistence, PersistenceBackend};
use pipeco::steps::register_builtin_steps;
use pipeco::{ExecutionEvent, Pipeline};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    register_builtin_steps(registry::global()).context("Failed to register built-in steps")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Steps(cmd) => list_steps(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(pipeco::persistence::SqliteExecutionStore::with_default_path().await?))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    warn!("Built without sqlite, run history is not kept between invocations");
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline definition")?;
    eprintln!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let input = cmd.build_input()?;
    let pipeline = config.to_pipeline(registry::global())?;

    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_store().await?
    };

    let progress = create_progress_bar(pipeline.len());
    let bar = progress.clone();
    let pipeline = pipeline.with_event_handler(move |event| {
        bar.println(format_execution_event(event));
        if let ExecutionEvent::StepCompleted { .. } = event {
            bar.inc(1);
        }
    });

    // Ctrl-C stops the run before the next step starts
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let ctx = RunContext::new();
    let (run_id, started_at) = (ctx.run_id(), ctx.started_at());
    let (pipeline, result) = tokio::task::spawn_blocking(move || {
        let result = pipeline.run_interruptible(input, ctx, &interrupted);
        (pipeline, result)
    })
    .await
    .context("Pipeline run panicked")?;
    progress.finish_and_clear();

    let summary = ExecutionSummary::from_run(&pipeline, run_id, started_at, &result);
    store.save_execution(&summary).await?;
    if !cmd.no_history {
        eprintln!(
            "{} Run saved to history (ID: {})",
            INFO,
            style(&summary.execution_id.to_string()[..8]).dim()
        );
    }

    match result {
        Ok(run) => {
            eprintln!(
                "{} {} completed {}",
                CHECK,
                style(pipeline.name()).bold(),
                style("successfully").green()
            );
            println!("{}", serde_json::to_string_pretty(&run.output)?);
            Ok(())
        }
        Err(err) => {
            eprintln!("{} {} {}", CROSS, style(pipeline.name()).bold(), format_status(summary.status));
            error!("{}", err);
            std::process::exit(1);
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match load_pipeline(&cmd.file) {
        Ok((pipeline, config)) => {
            println!("{} Pipeline definition is valid!", CHECK);
            println!("  Name: {}", style(pipeline.name()).bold());
            println!("  Steps: {}", style(pipeline.len()).cyan());
            for (position, step) in pipeline.steps().iter().enumerate() {
                println!("    {}. {} ({})", position, style(step.label()).cyan(), step.name());
            }
            if let Some(first) = pipeline.steps().first() {
                println!("  Input: {}", format_schema(first.input_schema()));
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn load_pipeline(path: &str) -> Result<(Pipeline, PipelineConfig)> {
    let config = PipelineConfig::from_file(path)?;
    let pipeline = config.to_pipeline(registry::global())?;
    Ok((pipeline, config))
}

fn list_steps(cmd: &StepsCommand) -> Result<()> {
    let definitions = registry::global().definitions();

    if cmd.json {
        let data = serde_json::json!({ "steps": definitions.iter().map(|d| d.as_ref()).collect::<Vec<_>>() });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} Registered steps:", INFO);
    for definition in &definitions {
        println!("  {}", format_step_definition(definition));
    }
    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_store().await?;

    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id = uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;
        match store.load_execution(exec_id).await? {
            Some(summary) => print_execution_details(&summary, cmd.verbose)?,
            None => println!("{} Execution not found", WARN),
        }
        return Ok(());
    }

    let mut executions = match &cmd.pipeline {
        Some(pipeline_name) => store.list_executions(pipeline_name).await?,
        None => {
            let mut all_execs = Vec::new();
            for pipeline in store.list_pipelines().await? {
                all_execs.extend(store.list_executions(&pipeline).await?);
            }
            all_execs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all_execs
        }
    };
    executions.truncate(cmd.limit);

    if executions.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &executions {
        println!("  {}", format_execution_summary(summary));
    }
    let failed = executions
        .iter()
        .filter(|e| e.status == ExecutionStatus::Failed)
        .count();
    if failed > 0 {
        println!("  {} {} failed", WARN, style(failed).red());
    }

    Ok(())
}

fn print_execution_details(summary: &ExecutionSummary, verbose: bool) -> Result<()> {
    println!("{} Execution Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Progress: {} ({}/{})",
        style(format!("{:.0}%", summary.progress * 100.0)).cyan(),
        summary.completed_steps,
        summary.total_steps
    );
    if let Some(step) = &summary.failed_step {
        println!("  Failed step: {}", style(step).red());
    }
    if let Some(error) = &summary.error {
        println!("  Error: {}", style(error).red());
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
