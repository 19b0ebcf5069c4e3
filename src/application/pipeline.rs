use crate::application::explainer::identify_risk_factors;
use crate::application::feature_engineering::{BatchStatistics, FeatureEngineer};
use crate::application::recommendations::generate_recommendations;
use crate::application::risk_model::{
    EvaluationMetrics, ModelKind, RiskModel, evaluate,
};
use crate::application::segment_stats::SegmentStats;
use crate::config::RiskScoringConfig;
use crate::domain::deal::DealRecord;
use crate::domain::errors::PipelineError;
use crate::domain::features::{FeatureRow, MODEL_FEATURES};
use crate::domain::risk::{Recommendation, RiskCategory, RiskFactor};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything a scoring run needs from a training run, persisted as one blob.
/// Batch thresholds are pinned here so a deal's batch-relative bits do not
/// drift between training and scoring.
#[derive(Serialize, Deserialize)]
pub struct RiskArtifact {
    pub model: RiskModel,
    pub batch_stats: BatchStatistics,
}

/// One fully scored deal: features, loss probability, category, explanation
/// and action items. Ephemeral; recomputed per scoring run.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDeal {
    pub features: FeatureRow,
    pub loss_probability: f64,
    pub risk_category: RiskCategory,
    pub risk_factors: Vec<RiskFactor>,
    pub recommendations: Vec<Recommendation>,
}

/// Trains a risk model from historical deals: builds the segment snapshot,
/// engineers features, holds out a seeded split for evaluation.
pub fn train_pipeline(
    deals: &[DealRecord],
    kind: ModelKind,
    config: &RiskScoringConfig,
) -> Result<(RiskArtifact, SegmentStats, EvaluationMetrics), PipelineError> {
    let resolved: Vec<DealRecord> = deals
        .iter()
        .filter(|d| d.outcome.is_some())
        .cloned()
        .collect();
    if resolved.len() < 4 {
        return Err(PipelineError::EmptyBatch(format!(
            "need at least 4 deals with resolved outcomes to train, got {}",
            resolved.len()
        )));
    }
    info!(
        total = deals.len(),
        labeled = resolved.len(),
        kind = kind.as_str(),
        "Starting training pipeline"
    );

    let stats = SegmentStats::from_history(&resolved)?;
    let batch_stats = BatchStatistics::from_deals(&resolved, config.large_deal_percentile)?;
    let engineer = FeatureEngineer::new(&stats, config);
    let rows = engineer.engineer(&resolved, stats.global_win_rate, &batch_stats)?;

    let x: Vec<Vec<f64>> = rows.iter().map(FeatureRow::to_model_vector).collect();
    let y: Vec<u8> = resolved
        .iter()
        .map(|d| d.is_lost().unwrap_or(0))
        .collect();

    let (train_idx, test_idx) = shuffle_split(x.len(), config.holdout_fraction, config.random_seed);
    let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
    let y_train: Vec<u8> = train_idx.iter().map(|&i| y[i]).collect();
    let x_test: Vec<Vec<f64>> = test_idx.iter().map(|&i| x[i].clone()).collect();
    let y_test: Vec<u8> = test_idx.iter().map(|&i| y[i]).collect();

    let columns: Vec<String> = MODEL_FEATURES.iter().map(|s| s.to_string()).collect();
    let model = RiskModel::train(&x_train, &y_train, kind, columns, config)?;

    let probabilities = model.predict_loss_probability(&x_test)?;
    let y_pred: Vec<u8> = probabilities.iter().map(|&p| (p >= 0.5) as u8).collect();
    let metrics = evaluate(&y_test, &y_pred, &probabilities);
    info!(
        roc_auc = metrics.roc_auc,
        avg_precision = metrics.avg_precision,
        holdout = y_test.len(),
        "Holdout evaluation complete"
    );

    Ok((RiskArtifact { model, batch_stats }, stats, metrics))
}

/// Scores a deal batch with an existing artifact. The batch may lack outcomes
/// entirely; `global_win_rate` backs unseen-segment lookups (callers usually
/// pass the training snapshot's rate or the configured overall rate). Output
/// is order-preserving with the input.
pub fn score_pipeline(
    deals: &[DealRecord],
    artifact: &RiskArtifact,
    stats: &SegmentStats,
    global_win_rate: f64,
    config: &RiskScoringConfig,
) -> Result<Vec<ScoredDeal>, PipelineError> {
    let engineer = FeatureEngineer::new(stats, config);
    let rows = engineer.engineer(deals, global_win_rate, &artifact.batch_stats)?;

    let x: Vec<Vec<f64>> = rows.iter().map(FeatureRow::to_model_vector).collect();
    let probabilities = artifact.model.predict_loss_probability(&x)?;

    let scored = rows
        .into_iter()
        .zip(probabilities)
        .map(|(features, loss_probability)| {
            let risk_category = RiskCategory::from_loss_probability(
                loss_probability,
                &config.risk_category_bounds_pct,
            );
            let risk_factors = identify_risk_factors(
                &features,
                &artifact.model,
                config.top_n_risk_factors,
            );
            let recommendations =
                generate_recommendations(risk_category, &risk_factors, &features);
            ScoredDeal {
                features,
                loss_probability,
                risk_category,
                risk_factors,
                recommendations,
            }
        })
        .collect();
    Ok(scored)
}

/// Seeded shuffle split into (train, holdout) index sets. The holdout gets at
/// least one row and never swallows the whole batch.
fn shuffle_split(n: usize, holdout_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let holdout = ((n as f64 * holdout_fraction) as usize).clamp(1, n - 1);
    let test = indices.split_off(n - holdout);
    (indices, test)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffle_split_is_seeded_and_disjoint() {
        let (train_a, test_a) = shuffle_split(20, 0.2, 42);
        let (train_b, test_b) = shuffle_split(20, 0.2, 42);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(train_a.len(), 16);
        assert_eq!(test_a.len(), 4);
        for i in &test_a {
            assert!(!train_a.contains(i));
        }

        let (train_c, _) = shuffle_split(20, 0.2, 7);
        assert_ne!(train_a, train_c);
    }

    #[test]
    fn test_shuffle_split_never_empties_either_side() {
        let (train, test) = shuffle_split(2, 0.2, 42);
        assert_eq!(train.len(), 1);
        assert_eq!(test.len(), 1);

        let (train, test) = shuffle_split(3, 0.9, 42);
        assert!(!train.is_empty());
        assert!(!test.is_empty());
    }
}
