use anyhow::Result;
use clap::Parser;
use dealrisk::application::pipeline::train_pipeline;
use dealrisk::application::risk_model::ModelKind;
use dealrisk::config::RiskScoringConfig;
use dealrisk::infrastructure::{artifact_store, csv_store};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train the deal risk scoring model", long_about = None)]
struct Args {
    /// Path to historical deals CSV
    #[arg(long, default_value = "data/raw/sales_deals.csv")]
    input: PathBuf,

    /// Path to the output model artifact
    #[arg(long, default_value = "models/risk_model.json")]
    model: PathBuf,

    /// Path to the output segment statistics
    #[arg(long, default_value = "models/segment_stats.json")]
    segments: PathBuf,

    /// Classifier kind: logistic, random-forest or gradient-boosting
    #[arg(long, default_value = "gradient-boosting")]
    kind: String,

    /// Optional TOML config overriding thresholds and model profiles
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => RiskScoringConfig::from_toml_file(path)?,
        None => RiskScoringConfig::default(),
    };
    let kind = ModelKind::parse(&args.kind)?;

    let deals = csv_store::load_deals(&args.input)?;
    let (artifact, stats, metrics) = train_pipeline(&deals, kind, &config)?;

    info!(
        roc_auc = format!("{:.3}", metrics.roc_auc),
        avg_precision = format!("{:.3}", metrics.avg_precision),
        precision_positive = format!("{:.3}", metrics.precision_positive),
        recall_positive = format!("{:.3}", metrics.recall_positive),
        "Holdout metrics"
    );

    artifact_store::save_artifact(&args.model, &artifact)?;
    artifact_store::save_segment_stats(&args.segments, &stats)?;
    info!("Done. Model trained and saved.");
    Ok(())
}
