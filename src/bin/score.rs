use anyhow::Result;
use clap::Parser;
use dealrisk::application::pipeline::score_pipeline;
use dealrisk::config::RiskScoringConfig;
use dealrisk::domain::risk::RiskCategory;
use dealrisk::infrastructure::{artifact_store, csv_store};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Score open deals with a trained risk model", long_about = None)]
struct Args {
    /// Path to the input deals CSV (outcome column may be empty)
    #[arg(long)]
    input: PathBuf,

    /// Path for the scored output CSV
    #[arg(long)]
    output: PathBuf,

    /// Path to the trained model artifact
    #[arg(long, default_value = "models/risk_model.json")]
    model: PathBuf,

    /// Path to the segment statistics saved at training time
    #[arg(long, default_value = "models/segment_stats.json")]
    segments: PathBuf,

    /// Win rate to assume for segment values unseen at training time.
    /// Defaults to the training snapshot's global win rate.
    #[arg(long)]
    global_win_rate: Option<f64>,

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

    let deals = csv_store::load_deals(&args.input)?;
    let artifact = artifact_store::load_artifact(&args.model)?;
    let stats = artifact_store::load_segment_stats(&args.segments)?;
    let global_win_rate = args.global_win_rate.unwrap_or(stats.global_win_rate);

    let scored = score_pipeline(&deals, &artifact, &stats, global_win_rate, &config)?;

    let mut counts = [0usize; 4];
    for item in &scored {
        let slot = match item.risk_category {
            RiskCategory::Low => 0,
            RiskCategory::Medium => 1,
            RiskCategory::High => 2,
            RiskCategory::Critical => 3,
        };
        counts[slot] += 1;
    }
    info!(
        low = counts[0],
        medium = counts[1],
        high = counts[2],
        critical = counts[3],
        "Risk category distribution"
    );

    csv_store::write_scored_deals(&args.output, &scored)?;
    info!(path = ?args.output, "Risk scores saved");
    Ok(())
}
