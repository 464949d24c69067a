//! trueno-eval - command-line entry point
//!
//! `run` evaluates the configured model and records the result; `history`
//! prints the dashboard series of a stored run as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use trueno_eval::config::EvalConfig;
use trueno_eval::dashboard::TrainingHistory;
use trueno_eval::dataset::ParquetDatasetProvider;
use trueno_eval::experiment::{
    ExperimentLogger, ExperimentRecord, FileTrackingStore, TrackingStore,
};
use trueno_eval::logging;
use trueno_eval::pipeline::{self, StageError};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a model and record the result
    Run(RunArgs),
    /// Print the training history and summary of a stored run
    History {
        /// Run ID
        #[arg(long)]
        run_id: String,
        /// Tracking store directory
        #[arg(long)]
        tracking_root: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Model artifact path
    #[arg(long)]
    model: Option<PathBuf>,
    /// Dataset root directory
    #[arg(long)]
    dataset_root: Option<PathBuf>,
    /// Dataset name
    #[arg(long)]
    dataset: Option<String>,
    /// Dataset version
    #[arg(long = "dataset-version")]
    dataset_version: Option<String>,
    /// Target column
    #[arg(long)]
    target: Option<String>,
    /// Fraction of rows held out for evaluation
    #[arg(long)]
    eval_fraction: Option<f64>,
    /// Split seed
    #[arg(long)]
    seed: Option<u64>,
    /// Tracking store directory
    #[arg(long)]
    tracking_root: Option<PathBuf>,
    /// Experiment ID
    #[arg(long)]
    experiment: Option<String>,
    /// Run name
    #[arg(long)]
    run_name: Option<String>,
}

impl RunArgs {
    fn apply(self, config: &mut EvalConfig) {
        if let Some(path) = self.model {
            config.model.path = path;
        }
        if let Some(root) = self.dataset_root {
            config.dataset.root = root;
        }
        if let Some(name) = self.dataset {
            config.dataset.name = name;
        }
        if let Some(version) = self.dataset_version {
            config.dataset.version = version;
        }
        if let Some(target) = self.target {
            config.dataset.target = target;
        }
        if let Some(fraction) = self.eval_fraction {
            config.split.eval_fraction = fraction;
        }
        if let Some(seed) = self.seed {
            config.split.seed = seed;
        }
        if let Some(root) = self.tracking_root {
            config.tracking.root = root;
        }
        if let Some(experiment) = self.experiment {
            config.tracking.experiment = experiment;
        }
        if let Some(run_name) = self.run_name {
            config.tracking.run_name = run_name;
        }
    }
}

/// Pipeline failure or bootstrap failure, mapped to distinct exit codes.
enum Failure {
    Stage(StageError),
    Bootstrap(anyhow::Error),
}

impl From<anyhow::Error> for Failure {
    fn from(e: anyhow::Error) -> Self {
        Self::Bootstrap(e)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
        .map_err(Failure::from)
        .and_then(|runtime| runtime.block_on(execute(cli)));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Stage(e)) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
        Err(Failure::Bootstrap(e)) => match e.downcast_ref::<trueno_eval::Error>() {
            Some(source) => {
                eprintln!("error: startup failed with {}: {e:#}", source.kind());
                ExitCode::from(source.exit_code())
            }
            None => {
                eprintln!("error: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn execute(cli: Cli) -> Result<(), Failure> {
    let mut config =
        EvalConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run(args) => {
            args.apply(&mut config);
            config.validate().context("Invalid configuration")?;
            logging::init(&config.logging).context("Failed to initialize logging")?;
            run(&config).await
        }
        Commands::History {
            run_id,
            tracking_root,
        } => {
            if let Some(root) = tracking_root {
                config.tracking.root = root;
            }
            logging::init(&config.logging).context("Failed to initialize logging")?;
            history(&config, &run_id).await.map_err(Failure::from)
        }
    }
}

async fn run(config: &EvalConfig) -> Result<(), Failure> {
    info!("Starting evaluation");

    let provider = ParquetDatasetProvider::new(&config.dataset.root, &config.dataset.target);
    let settings = config.pipeline_settings().context("Invalid configuration")?;
    let experiment =
        ExperimentRecord::new(&config.tracking.experiment, &config.tracking.experiment)
            .with_config(config.to_json().context("Failed to snapshot configuration")?);
    let root = config.tracking.root.clone();
    let policy = config.io_policy();

    let report = pipeline::run_deferred(&provider, &settings, || async move {
        let store = FileTrackingStore::open(root).await?;
        ExperimentLogger::new(store, experiment, policy).await
    })
    .await
    .map_err(Failure::Stage)?;

    info!(
        run_id = %report.run_id,
        accuracy = report.result.metric_value,
        correct = report.result.correct,
        total = report.result.total,
        train_rows = report.train_rows,
        eval_rows = report.eval_rows,
        "Evaluation recorded"
    );
    println!(
        "run_id={} {}={:.4}",
        report.run_id, report.result.metric_name, report.result.metric_value
    );
    Ok(())
}

async fn history(config: &EvalConfig, run_id: &str) -> Result<()> {
    let store = FileTrackingStore::open(&config.tracking.root).await?;
    if store.get_run(run_id).await?.is_none() {
        anyhow::bail!("run {run_id} not found in {}", store.location());
    }

    let history = TrainingHistory::from_store(&store, run_id).await?;
    let output = serde_json::json!({
        "run_id": run_id,
        "points": history.points(),
        "summary": history.summary(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
