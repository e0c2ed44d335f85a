//! AdaptiveJudge - Command-line entry point
//!
//! Runs one calibration, stores the record and prints it as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use adaptivejudge::{
    Config,
    benchmark::{BenchmarkRequest, BenchmarkRunner, DockerRuntime, LanguageSubmission},
    constants::languages,
    db::JsonFileRepository,
    services::BenchmarkService,
};

/// Calibrate a target language's time limit against a reference solution
#[derive(Debug, Parser)]
#[command(name = "adaptivejudge", version)]
struct Args {
    /// Problem identifier the record is stored under
    #[arg(long)]
    problem_id: String,

    /// Reference solution source file
    #[arg(long)]
    reference: PathBuf,

    /// Target solution source file
    #[arg(long)]
    target: PathBuf,

    /// Input fixture piped to every run
    #[arg(long)]
    input: PathBuf,

    #[arg(long, default_value = languages::CPP)]
    reference_language: String,

    #[arg(long, default_value = languages::PYTHON)]
    target_language: String,

    /// Factor used when the target never succeeds (defaults to the target policy cap)
    #[arg(long, conflicts_with = "no_cap")]
    factor_cap: Option<f64>,

    /// Leave the factor undetermined when the target never succeeds
    #[arg(long)]
    no_cap: bool,

    /// Mark the new record active, attributed to NAME
    #[arg(long, value_name = "NAME")]
    activate_as: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;

    // Logs go to stderr; stdout carries the record
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log.rust_log.clone().into());
    tracing_subscriber::registry()
        .with(filter)
        .with(
            config
                .log
                .json
                .then(|| fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with(
            (!config.log.json).then(|| fmt::layer().with_writer(std::io::stderr)),
        )
        .init();

    tracing::info!("Starting AdaptiveJudge calibration...");

    let reference = tokio::fs::read_to_string(&args.reference)
        .await
        .with_context(|| format!("reading {}", args.reference.display()))?;
    let target = tokio::fs::read_to_string(&args.target)
        .await
        .with_context(|| format!("reading {}", args.target.display()))?;
    let input = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;

    let factor_cap = if args.no_cap {
        None
    } else {
        Some(
            args.factor_cap
                .unwrap_or_else(|| config.policies.for_language(&args.target_language).factor_cap),
        )
    };

    let request = BenchmarkRequest {
        problem_id: args.problem_id,
        reference: LanguageSubmission::new(args.reference_language, reference),
        target: LanguageSubmission::new(args.target_language, target),
        input,
        factor_cap,
    };

    tracing::info!("Connecting to Docker...");
    let runtime = DockerRuntime::connect(&config.docker).await?;

    let runner = BenchmarkRunner::new(
        Arc::new(runtime),
        config.benchmark.clone(),
        config.images.clone(),
        config.policies.clone(),
    );
    let repository = Arc::new(JsonFileRepository::new(config.storage.output_dir.clone()));
    let service = BenchmarkService::new(runner, repository);

    let (id, record) = match service
        .calibrate(&request, args.activate_as.as_deref())
        .await
    {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(
                code = e.error_code(),
                before_sampling = e.is_pre_measurement(),
                "Calibration failed: {}",
                e
            );
            return Err(e.into());
        }
    };

    if record.calibration_status.has_factor() {
        tracing::info!(benchmark_id = %id, "Calibration finished");
    } else {
        tracing::warn!(
            benchmark_id = %id,
            status = ?record.calibration_status,
            "Calibration finished without an adjustment factor"
        );
    }
    println!("{}", serde_json::to_string_pretty(&record)?);

    Ok(())
}
