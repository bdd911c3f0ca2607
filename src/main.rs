use anyhow::{Context, Result};
use streampipe::cli::commands::{RunCommand, ValidateCommand};
use streampipe::cli::output::*;
use streampipe::cli::{Cli, Command};
use streampipe::core::config::PipelineConfig;
use streampipe::core::{requires_progress, TopologyReport};
use streampipe::execution::scheduler::{build_waves, wave_names};
use streampipe::execution::{select_strategy, ExecutionEngine, ExecutionEvent, LogSink};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; stdout belongs to the pipeline's own output
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("streampipe={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let pipeline = config.to_pipeline();

    eprintln!("{} Loaded pipeline: {}", INFO, style(&pipeline.name).bold());

    let options = cmd.run_options();
    if let Some(dir) = &options.log_directory {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }

    let show_progress = options.use_strategy && requires_progress(&pipeline);
    let mut engine = ExecutionEngine::new(options).with_log(LogSink::stdout());

    // Console rendering of engine events; a progress bar counts finished
    // steps when the pipeline moves bulk data
    if show_progress {
        let progress = create_progress_bar(pipeline.steps.len());
        engine.add_event_handler(move |event| {
            match &event {
                ExecutionEvent::StepStarted { step } => progress.set_message(step.clone()),
                ExecutionEvent::StepCompleted { .. } | ExecutionEvent::StepFailed { .. } => {
                    progress.inc(1)
                }
                ExecutionEvent::PipelineCompleted { .. } => progress.finish_and_clear(),
                _ => {}
            }
            progress.println(format_execution_event(&event));
        });
    } else {
        engine.add_event_handler(|event| eprintln!("{}", format_execution_event(&event)));
    }

    match engine.execute(&pipeline).await {
        Ok(summary) => {
            eprintln!("\n{}", format_run_summary(&summary));
            Ok(())
        }
        Err(e) => {
            eprintln!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red()
            );
            error!("{}", e);
            eprintln!("  {}", style(&e).red());
            std::process::exit(1);
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let checked = PipelineConfig::from_file(&cmd.file).and_then(|config| {
        let pipeline = config.to_pipeline();
        pipeline.validate()?;
        Ok((config, pipeline))
    });

    let (config, pipeline) = match checked {
        Ok(checked) => checked,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    let report = TopologyReport::analyze(&pipeline);
    let planned = select_strategy(&pipeline, None)?;
    let waves = wave_names(&build_waves(&pipeline.steps)?);

    println!("{} Pipeline configuration is valid!", CHECK);
    println!("  Name: {}", style(&pipeline.name).bold());
    println!("  Steps: {}", style(pipeline.steps.len()).cyan());
    for line in format_topology(&report) {
        println!("{}", line);
    }
    println!("  Planned strategy: {}", format_strategy(Some(planned)));
    for (index, wave) in waves.iter().enumerate() {
        println!("  Wave {}: {}", index + 1, style(wave.join(", ")).cyan());
    }

    if cmd.json {
        let data = serde_json::json!({
            "pipeline": config,
            "topology": report,
            "strategy": planned,
            "waves": waves,
        });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}
