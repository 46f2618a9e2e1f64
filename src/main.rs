use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ledgerflow_artifact::FsSink;
use ledgerflow_config::PipelineDef;
use ledgerflow_pipeline::{Pacing, StepExecutor, TickOutcome, TracingBroadcaster, launch};
use ledgerflow_producer::{Script, ScriptedProducer};

/// Ledgerflow - an agent pipeline that drafts and files audit memos
#[derive(Parser)]
#[command(name = "ledgerflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.ledgerflow)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a pipeline to completion
  Run {
    /// Path to a pipeline definition (JSON). Defaults to the audit report.
    #[arg(long)]
    pipeline: Option<PathBuf>,

    /// Document the report is saved to
    #[arg(long)]
    target: Option<String>,

    /// Path to a producer script (JSON). Defaults to the demo script.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Skip the cosmetic delays between and within steps
    #[arg(long)]
    no_pacing: bool,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ledgerflow_pipeline=info,ledgerflow_producer=info".into()),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".ledgerflow"),
  };

  match cli.command {
    Some(Commands::Run {
      pipeline,
      target,
      script,
      no_pacing,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_pipeline(pipeline, target, script, no_pacing, data_dir))?;
    }
    None => {
      println!("ledgerflow - use --help to see available commands");
    }
  }

  Ok(())
}

async fn run_pipeline(
  pipeline_file: Option<PathBuf>,
  target: Option<String>,
  script_file: Option<PathBuf>,
  no_pacing: bool,
  data_dir: PathBuf,
) -> Result<()> {
  let mut def = match &pipeline_file {
    Some(path) => PipelineDef::load(path)
      .with_context(|| format!("failed to load pipeline file: {}", path.display()))?,
    None => PipelineDef::audit_report(None),
  };
  if target.is_some() {
    def.target_ref = target;
  }
  let target_ref = def
    .target_ref
    .get_or_insert_with(|| "engagement-file".to_string())
    .clone();

  eprintln!("Loaded pipeline: {} ({} steps)", def.name, def.steps.len());

  let script = match &script_file {
    Some(path) => {
      let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read script file: {}", path.display()))?;
      Script::from_json(&json)
        .with_context(|| format!("failed to parse script file: {}", path.display()))?
    }
    None => Script::demo(),
  };

  // Artifacts land in one JSON file per report under the data directory
  let sink = FsSink::new(data_dir.join("artifacts"));
  sink
    .create_container(&target_ref)
    .await
    .with_context(|| format!("failed to create container '{}'", target_ref))?;

  let mut executor = StepExecutor::from_def(
    &def,
    Arc::new(ScriptedProducer::new(script)),
    Arc::new(sink),
  )
  .with_broadcaster(Arc::new(TracingBroadcaster));
  if no_pacing {
    executor = executor.with_pacing(Pacing::disabled());
  }

  let driver = launch(&def, executor).context("invalid pipeline definition")?;
  let summary = driver
    .run_to_completion()
    .await
    .context("pipeline execution failed")?;

  eprintln!("Execution completed: {}", summary.execution_id);
  eprintln!("Steps executed: {}", summary.steps_executed);

  println!("{}", serde_json::to_string_pretty(&summary.snapshot)?);

  if let TickOutcome::Halted { index } = summary.outcome {
    bail!("pipeline halted at step {}", index);
  }

  Ok(())
}
