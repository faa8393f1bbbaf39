//! Fraud Scoring - Main Entry Point
//!
//! `score` runs one CSV upload through the pipeline and prints/exports the
//! result. `serve` accepts CSV batches over NATS and replies with JSON reports.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fraud_scoring::{
    config::{AppConfig, LoggingConfig},
    consumer::{batch_id, BatchConsumer},
    display::{render_preview, render_summary},
    metrics::{MetricsReporter, ScoringMetrics},
    models::ModelLoader,
    pipeline::ScoringPipeline,
    producer::ReportProducer,
    types::{ScoringFailure, ScoringReport, TransactionBatch},
};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "fraud-score", about = "Score card transactions with a pre-trained fraud model")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "config/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a CSV file
    Score(ScoreArgs),
    /// Serve scoring requests over NATS
    Serve,
}

#[derive(Args)]
struct ScoreArgs {
    /// Transactions CSV with a header row
    #[arg(short, long)]
    input: PathBuf,

    /// Write the scored batch as CSV
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rows to show in the preview (default from config)
    #[arg(long)]
    preview: Option<usize>,

    /// Only keep rows predicted fraudulent in preview and export
    #[arg(long)]
    flagged_only: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from_path(&cli.config)?;
    init_logging(&config.logging)?;
    info!(config = %cli.config.display(), "Configuration loaded");

    match cli.cmd {
        Commands::Score(args) => run_score(&config, args),
        Commands::Serve => run_serve(config).await,
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("fraud_scoring={}", logging.level).parse()?)
        .add_directive(format!("fraud_score={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Load artifacts; failure here ends the process before any batch is read.
fn load_pipeline(config: &AppConfig) -> Result<ScoringPipeline> {
    let artifacts = ModelLoader::with_threads(config.artifacts.onnx_threads)
        .load_artifacts(&config.artifacts)
        .context("Failed to load model artifacts")?;
    Ok(ScoringPipeline::new(artifacts, config.scoring_options()))
}

fn run_score(config: &AppConfig, args: ScoreArgs) -> Result<()> {
    let pipeline = load_pipeline(config)?;

    let batch = TransactionBatch::from_csv_path(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    info!(
        input = %args.input.display(),
        rows = batch.len(),
        columns = batch.columns().len(),
        "Batch loaded"
    );

    let start_time = Instant::now();
    let (scored, summary) = pipeline.score(batch)?;
    info!(
        rows = summary.total,
        fraud_count = summary.fraud_count,
        fraud_rate = summary.fraud_rate,
        processing_time_us = start_time.elapsed().as_micros(),
        "Batch scored"
    );

    let scored = if args.flagged_only {
        scored.flagged_only()
    } else {
        scored
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let preview_rows = args.preview.unwrap_or(config.output.preview_rows);
        if preview_rows > 0 && !scored.is_empty() {
            println!("Prediction Results:");
            print!("{}", render_preview(&scored, preview_rows));
            println!();
        }
        print!("{}", render_summary(&summary));
    }

    if let Some(output) = &args.output {
        let file = std::fs::File::create(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        scored.write_csv(std::io::BufWriter::new(file))?;
        info!(output = %output.display(), rows = scored.len(), "Scored batch written");
    }

    Ok(())
}

async fn run_serve(config: AppConfig) -> Result<()> {
    info!("Starting fraud scoring service");

    let pipeline = Arc::new(load_pipeline(&config)?);
    info!(
        model = %pipeline.classifier().name(),
        features = pipeline.classifier().feature_names().len(),
        block = pipeline.options().thresholds.block,
        monitor = pipeline.options().thresholds.monitor,
        "Scoring pipeline ready"
    );

    let metrics = Arc::new(ScoringMetrics::new());

    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = BatchConsumer::new(client.clone(), &config.nats.request_subject);
    let producer = Arc::new(ReportProducer::new(client.clone(), &config.nats.result_subject));
    info!(
        requests = %consumer.subject(),
        results = %producer.subject(),
        workers = config.pipeline.workers,
        "Waiting for batches"
    );

    // Limits concurrently scored batches
    let semaphore = Arc::new(Semaphore::new(config.pipeline.workers));

    let metrics_clone = metrics.clone();
    let interval = config.pipeline.metrics_interval_secs;
    tokio::spawn(async move {
        MetricsReporter::new(metrics_clone, interval).start().await;
    });

    let mut subscription = consumer.subscribe().await?;

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        let permit = semaphore.clone().acquire_owned().await?;

        let pipeline = pipeline.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let batch_id = batch_id(&message);
            let reply = message.reply.as_ref();

            let outcome = match TransactionBatch::from_csv_reader(&message.payload[..]) {
                Ok(batch) => pipeline
                    .score(batch)
                    .map_err(|e| (e.kind(), e.to_string())),
                Err(e) => Err(("malformed_csv", e.to_string())),
            };

            match outcome {
                Ok((scored, summary)) => {
                    let processing_time = start_time.elapsed();

                    let delivered = match ScoringReport::new(batch_id.clone(), &scored, summary.clone()) {
                        Ok(report) => producer
                            .publish(reply, &report)
                            .await
                            .map_err(|e| format!("Failed to publish report: {:#}", e)),
                        Err(e) => Err(format!("Failed to encode scored batch: {}", e)),
                    };

                    match delivered {
                        Ok(()) => {
                            metrics.record_batch(processing_time, &scored, &summary);
                            info!(
                                batch_id = %batch_id,
                                rows = summary.total,
                                fraud_count = summary.fraud_count,
                                fraud_rate = summary.fraud_rate,
                                processing_time_us = processing_time.as_micros(),
                                "Batch scored"
                            );
                        }
                        Err(reason) => {
                            metrics.record_failure("publish");
                            error!(batch_id = %batch_id, error = %reason, "Report not delivered");

                            // The caller still gets an answer
                            let failure = ScoringFailure::new(batch_id.clone(), reason);
                            if let Err(e) = producer.publish_failure(reply, &failure).await {
                                error!(batch_id = %batch_id, error = %e, "Failed to publish failure");
                            }
                        }
                    }
                }
                Err((kind, reason)) => {
                    metrics.record_failure(kind);
                    warn!(batch_id = %batch_id, kind = kind, error = %reason, "Batch rejected");

                    let failure = ScoringFailure::new(batch_id.clone(), reason);
                    if let Err(e) = producer.publish_failure(reply, &failure).await {
                        error!(batch_id = %batch_id, error = %e, "Failed to publish failure");
                    }
                }
            }

            debug!(batch_id = %batch_id, "Batch done");
            drop(permit);
        });
    }

    // Wait for in-flight batches
    let _ = semaphore.acquire_many(config.pipeline.workers as u32).await;

    info!("Scoring service shutting down...");
    metrics.print_summary();

    Ok(())
}
