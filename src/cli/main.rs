use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use obesity_risk::{
    config::Config,
    ml::{DiagnosisService, ModelArtifacts},
    models::RawInput,
    training::{Trainer, TrainingDataset},
};
use reqwest::Client;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use validator::Validate;

#[derive(Parser)]
#[command(name = "obesity-risk-cli")]
#[command(about = "Obesity risk model CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model from the survey CSV and write the artifact bundle
    Train {
        /// Dataset path (defaults to training.data_path)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output path (defaults to model.artifact_path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short = 'n', long)]
        trees: Option<usize>,

        #[arg(long)]
        max_depth: Option<usize>,

        #[arg(short, long)]
        seed: Option<u64>,

        /// Fraction of rows held out for evaluation
        #[arg(short, long)]
        test_size: Option<f64>,

        /// Keep every transport dummy column instead of dropping the first
        #[arg(long)]
        keep_first: bool,
    },

    /// Diagnose a JSON patient record with a local model
    Predict {
        /// JSON file holding one record, `-` for stdin
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Artifact bundle (defaults to model.artifact_path)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Print the encoded feature vector as well
        #[arg(short, long)]
        features: bool,
    },

    /// Diagnose a JSON patient record through a running server
    Diagnose {
        /// JSON file holding one record, `-` for stdin
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Print a patient record with the form's default answers
    Template,

    /// Show the model served by a running server
    Model,

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "obesity_risk=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Train {
            data,
            output,
            trees,
            max_depth,
            seed,
            test_size,
            keep_first,
        } => {
            let config = Config::load().context("loading configuration")?;
            let mut training = config.training.clone();
            if let Some(trees) = trees {
                training.n_trees = trees;
            }
            if max_depth.is_some() {
                training.max_depth = max_depth;
            }
            if let Some(seed) = seed {
                training.seed = seed;
            }
            if let Some(test_size) = test_size {
                training.test_size = test_size;
            }
            if keep_first {
                training.drop_first = false;
            }

            let data_path = data.unwrap_or_else(|| training.data_path.clone());
            let output = output.unwrap_or_else(|| config.model.artifact_path.clone());

            let dataset = TrainingDataset::from_csv(&data_path)
                .with_context(|| format!("reading {}", data_path.display()))?;
            let bundle = Trainer::new(training).train(&dataset)?;
            bundle
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;

            println!("Model written to {}", output.display());
            println!("Classes: {}", bundle.label_encoder.classes().join(", "));
            println!("Features: {}", bundle.feature_columns.join(", "));
            if let Some(metrics) = &bundle.metadata.validation_metrics {
                println!(
                    "Holdout accuracy: {:.2}%  macro F1: {:.3}",
                    metrics.accuracy * 100.0,
                    metrics.f1_score
                );
            }
        }

        Commands::Predict {
            input,
            model,
            features,
        } => {
            let raw = read_record(&input)?;
            if let Err(e) = raw.validate() {
                bail!("invalid record: {}", e);
            }

            let model_path = match model {
                Some(path) => path,
                None => Config::load().context("loading configuration")?.model.artifact_path,
            };
            let artifacts = ModelArtifacts::load(&model_path)
                .with_context(|| format!("loading {}", model_path.display()))?;
            let service = DiagnosisService::new(Arc::new(artifacts));

            if features {
                let vector = service.encode(&raw);
                println!("{}", serde_json::to_string_pretty(&vector)?);
            }

            let diagnosis = service.diagnose(&raw)?;
            println!("{}", serde_json::to_string_pretty(&diagnosis)?);
            eprintln!(
                "Diagnosis: {} ({} risk), confidence {:.2}%",
                diagnosis.label,
                diagnosis.risk_level,
                diagnosis.confidence * 100.0
            );
        }

        Commands::Diagnose { input } => {
            let raw = read_record(&input)?;
            let response = client
                .post(format!("{}/v1/diagnoses", cli.endpoint))
                .json(&raw)
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Template => {
            println!("{}", serde_json::to_string_pretty(&RawInput::default())?);
        }

        Commands::Model => {
            let response = client
                .get(format!("{}/v1/model", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

fn read_record(path: &Path) -> anyhow::Result<RawInput> {
    let text = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };

    serde_json::from_str(&text).context("parsing patient record")
}
