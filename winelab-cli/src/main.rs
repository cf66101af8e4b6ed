//! WineLab CLI: run the training pipeline, single stages, and predictions.
//!
//! Commands:
//! - (none): run all five stages in order
//! - `stage <name>`: run one stage (ingest, validate, transform, train, evaluate)
//! - `predict --input <file>`: score a dataset file with the trained model

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use winelab_core::config::{
    ConfigPaths, ConfigurationManager, CONFIG_FILE_PATH, PARAMS_FILE_PATH, SCHEMA_FILE_PATH,
};
use winelab_core::logging::{LogContext, LogSettings};
use winelab_runner::{Pipeline, PipelineError, PipelineReport, PredictionPipeline, StageName};

#[derive(Parser)]
#[command(
    name = "winelab",
    about = "WineLab CLI: wine-quality training pipeline"
)]
struct Cli {
    /// Pipeline paths file.
    #[arg(long, global = true, default_value = CONFIG_FILE_PATH)]
    config: PathBuf,

    /// Hyperparameter file.
    #[arg(long, global = true, default_value = PARAMS_FILE_PATH)]
    params: PathBuf,

    /// Dataset schema file.
    #[arg(long, global = true, default_value = SCHEMA_FILE_PATH)]
    schema: PathBuf,

    /// Directory for `logging.log`.
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single stage.
    Stage {
        /// ingest, validate, transform, train or evaluate.
        name: StageName,
    },
    /// Predict with the trained model.
    Predict {
        /// `;`-delimited input file with the model's feature columns.
        #[arg(long)]
        input: PathBuf,

        /// Model artifact. Defaults to the trainer's output path from the config.
        #[arg(long)]
        model: Option<PathBuf>,
    },
}

impl Cli {
    fn config_paths(&self) -> ConfigPaths {
        ConfigPaths {
            config: self.config.clone(),
            params: self.params.clone(),
            schema: self.schema.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = LogSettings {
        log_dir: cli.log_dir.clone(),
        ..LogSettings::default()
    };
    let logging = LogContext::init(&settings).context("failed to initialise logging")?;

    let result = logging.in_scope(|| match &cli.command {
        None => run_stages(&cli, &[]),
        Some(Commands::Stage { name }) => run_stages(&cli, &[*name]),
        Some(Commands::Predict { input, model }) => run_predict(&cli, input, model.as_deref()),
    });

    logging.shutdown();
    result
}

fn load_config(cli: &Cli) -> Result<ConfigurationManager> {
    ConfigurationManager::new(&cli.config_paths()).context("failed to load configuration")
}

fn run_stages(cli: &Cli, selection: &[StageName]) -> Result<()> {
    info!("WineLab pipeline starting");
    let manager = load_config(cli)?;
    let mut pipeline =
        Pipeline::from_config(&manager, selection).context("failed to set up pipeline")?;

    match pipeline.run() {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(PipelineError::StageFailed {
            stage,
            source,
            report,
        }) => {
            print_report(&report);
            Err(anyhow::Error::new(source).context(format!("{stage} failed")))
        }
        Err(e) => Err(e.into()),
    }
}

fn run_predict(cli: &Cli, input: &Path, model: Option<&Path>) -> Result<()> {
    let model_path = match model {
        Some(path) => path.to_path_buf(),
        None => load_config(cli)?.model_trainer_config()?.model_path(),
    };
    let pipeline = PredictionPipeline::load(&model_path)
        .with_context(|| format!("failed to load model {}", model_path.display()))?;
    let predictions = pipeline
        .predict_file(input)
        .with_context(|| format!("failed to predict {}", input.display()))?;

    println!("{:<6} {:>12}", "Row", "Prediction");
    println!("{}", "-".repeat(19));
    for (i, prediction) in predictions.iter().enumerate() {
        match prediction {
            Some(value) => println!("{:<6} {:>12.4}", i + 1, value),
            None => println!("{:<6} {:>12}", i + 1, "missing"),
        }
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!();
    println!("=== Pipeline Report ===");
    println!("{:<28} {:<10} {:>10}  Summary", "Stage", "Status", "Time (ms)");
    println!("{}", "-".repeat(72));
    for stage in &report.stages {
        let status = format!("{:?}", stage.status).to_lowercase();
        let summary = stage.error.as_deref().unwrap_or(&stage.summary);
        println!(
            "{:<28} {:<10} {:>10}  {}",
            stage.stage.label(),
            status,
            stage.duration_ms,
            summary
        );
    }
}
