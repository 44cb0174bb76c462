//! Command-line entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use textsummarizer::config::ConfigurationManager;
use textsummarizer::core::StageKind;
use textsummarizer::observability::init_logging;
use textsummarizer::pipeline::{stage_for, PipelineBuilder};
use textsummarizer::predict::{is_blank, PredictionPipeline, Summarize, EMPTY_INPUT_WARNING};
use textsummarizer::web;

#[derive(Debug, Parser)]
#[command(name = "textsummarizer", version, about = "Dialogue summarization pipeline")]
struct Cli {
    /// Path/URL configuration file.
    #[arg(long, global = true, default_value = ConfigurationManager::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Hyperparameter file.
    #[arg(long, global = true, default_value = ConfigurationManager::DEFAULT_PARAMS_PATH)]
    params: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every stage in order.
    Run,
    /// Run a single stage (data_ingestion, data_validation, data_transformation,
    /// model_trainer, model_evaluation).
    Stage {
        /// Stage name.
        name: String,
    },
    /// Summarize one dialogue with the fine-tuned model.
    Predict {
        /// Dialogue text.
        #[arg(long)]
        text: String,
    },
    /// Serve the web UI.
    Serve {
        /// Listen address.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let manager = ConfigurationManager::from_files(&cli.config, &cli.params)
        .context("loading configuration")?;
    init_logging(&manager.get_logging_config()?).context("initializing logging")?;
    let manager = Arc::new(manager);

    match cli.command {
        Command::Run => {
            let pipeline = PipelineBuilder::standard().build(Arc::clone(&manager))?;
            let run = pipeline.run().await.context("pipeline failed")?;
            tracing::info!(pipeline = pipeline.name(), run_id = %run.run_id, "All stages completed");
        }
        Command::Stage { name } => {
            let kind: StageKind = name.parse()?;
            PipelineBuilder::new(kind.slug())
                .stage(stage_for(kind))
                .build(Arc::clone(&manager))?
                .run()
                .await
                .with_context(|| format!("stage '{}' failed", kind.slug()))?;
        }
        Command::Predict { text } => {
            if is_blank(&text) {
                eprintln!("{EMPTY_INPUT_WARNING}");
                return Ok(());
            }
            let pipeline = PredictionPipeline::from_manager(&manager)?;
            let summary = tokio::task::spawn_blocking(move || pipeline.predict(&text))
                .await
                .context("prediction task failed")??;
            println!("{summary}");
        }
        Command::Serve { addr } => {
            let pipeline = Arc::new(PredictionPipeline::from_manager(&manager)?);
            web::serve(addr, pipeline.clone()).await?;
            if pipeline.unload() {
                tracing::info!("Prediction model unloaded");
            }
        }
    }

    Ok(())
}
