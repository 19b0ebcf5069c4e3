use crate::application::segment_stats::SegmentStats;
use crate::config::RiskScoringConfig;
use crate::domain::deal::{DealRecord, SegmentType};
use crate::domain::errors::PipelineError;
use crate::domain::features::{DealSizeSegment, FeatureRow};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};
use tracing::debug;

/// Batch-level thresholds used by the Feature Engineer. Computed once at
/// training time and carried in the model artifact so the same deal gets the
/// same `is_large_deal` / `sales_cycle_normalized` values regardless of which
/// scoring batch it arrives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchStatistics {
    /// deal_amount above this is a large deal (configured percentile of the
    /// batch distribution, median by default).
    pub large_deal_threshold: f64,
    /// Mean sales_cycle_days over the batch, denominator for normalization.
    pub mean_cycle_days: f64,
}

impl BatchStatistics {
    pub fn from_deals(
        deals: &[DealRecord],
        large_deal_percentile: usize,
    ) -> Result<Self, PipelineError> {
        if deals.is_empty() {
            return Err(PipelineError::EmptyBatch(
                "cannot derive batch statistics from zero deals".to_string(),
            ));
        }
        let amounts: Vec<f64> = deals.iter().map(|d| d.deal_amount).collect();
        let mut amounts = Data::new(amounts);
        let large_deal_threshold = amounts.percentile(large_deal_percentile);
        let mean_cycle_days =
            deals.iter().map(|d| d.sales_cycle_days).sum::<f64>() / deals.len() as f64;
        Ok(Self {
            large_deal_threshold,
            mean_cycle_days,
        })
    }
}

/// Derives the model feature row for each deal from a segment statistics
/// snapshot. Pure over its inputs; each row is independent once the batch
/// thresholds are fixed.
pub struct FeatureEngineer<'a> {
    stats: &'a SegmentStats,
    config: &'a RiskScoringConfig,
}

impl<'a> FeatureEngineer<'a> {
    pub fn new(stats: &'a SegmentStats, config: &'a RiskScoringConfig) -> Self {
        Self { stats, config }
    }

    /// Produces one feature row per deal, order-preserving.
    ///
    /// `global_win_rate` backs the lookup when a deal's category value was
    /// unseen at training time; callers scoring a batch without outcomes must
    /// supply it (the engineer never derives one itself).
    pub fn engineer(
        &self,
        deals: &[DealRecord],
        global_win_rate: f64,
        batch: &BatchStatistics,
    ) -> Result<Vec<FeatureRow>, PipelineError> {
        if deals.is_empty() {
            return Err(PipelineError::EmptyBatch(
                "cannot engineer features for zero deals".to_string(),
            ));
        }
        debug!(
            rows = deals.len(),
            large_deal_threshold = batch.large_deal_threshold,
            mean_cycle_days = batch.mean_cycle_days,
            "Engineering risk features"
        );
        let rows = deals
            .par_iter()
            .map(|deal| self.engineer_row(deal, global_win_rate, batch))
            .collect();
        Ok(rows)
    }

    fn engineer_row(
        &self,
        deal: &DealRecord,
        global_win_rate: f64,
        batch: &BatchStatistics,
    ) -> FeatureRow {
        let mut win_probs = [0.0f64; 4];
        let mut median_cycle_sum = 0.0;
        for (i, segment) in SegmentType::ALL.iter().enumerate() {
            let value = segment.value(deal);
            win_probs[i] = self
                .stats
                .win_rate(*segment, value)
                .unwrap_or(global_win_rate);
            median_cycle_sum += self
                .stats
                .cycle_median(*segment, value)
                .unwrap_or(self.stats.global_cycle_median);
        }
        let blended_win_prob = win_probs.iter().sum::<f64>() / 4.0;
        let segment_avg_median_cycle = median_cycle_sum / 4.0;

        let cycle = deal.sales_cycle_days;
        // Zero-cycle deals are brand new: no aging discount, no momentum.
        let aging_factor = if cycle == 0.0 {
            1.0
        } else {
            (segment_avg_median_cycle / cycle).min(1.0)
        };
        let rem_score = safe_divide(blended_win_prob * deal.deal_amount, cycle, 0.0);

        let month = deal.created_month();
        FeatureRow {
            deal: deal.clone(),
            win_prob_industry: win_probs[0],
            win_prob_product_type: win_probs[1],
            win_prob_lead_source: win_probs[2],
            win_prob_region: win_probs[3],
            blended_win_prob,
            blended_risk_prob: 1.0 - blended_win_prob,
            aging_factor,
            rapv_aging_value: deal.deal_amount * blended_win_prob * aging_factor,
            rem_score,
            deal_amount_log: (1.0 + deal.deal_amount).ln(),
            is_large_deal: (deal.deal_amount > batch.large_deal_threshold) as u8,
            sales_cycle_normalized: safe_divide(cycle, batch.mean_cycle_days, 0.0),
            is_long_cycle: (cycle > self.config.long_cycle_threshold_days) as u8,
            is_q4: (month >= 10) as u8,
            is_quarter_end: (month % 3 == 0) as u8,
            deal_size_segment: DealSizeSegment::from_amount(
                deal.deal_amount,
                &self.config.deal_size_bounds,
            ),
        }
    }
}

fn safe_divide(numerator: f64, denominator: f64, default: f64) -> f64 {
    if denominator == 0.0 {
        default
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deal::Outcome;
    use chrono::NaiveDate;

    fn deal(
        id: &str,
        industry: &str,
        product: &str,
        source: &str,
        region: &str,
        amount: f64,
        cycle: f64,
        outcome: Option<Outcome>,
    ) -> DealRecord {
        DealRecord {
            deal_id: id.to_string(),
            created_date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            closed_date: None,
            sales_rep_id: "R1".to_string(),
            industry: industry.to_string(),
            region: region.to_string(),
            product_type: product.to_string(),
            lead_source: source.to_string(),
            deal_stage: "Qualified".to_string(),
            deal_amount: amount,
            sales_cycle_days: cycle,
            outcome,
        }
    }

    fn two_deal_batch() -> Vec<DealRecord> {
        vec![
            deal("A", "Tech", "Core", "Inbound", "NA", 10_000.0, 30.0, Some(Outcome::Won)),
            deal("B", "Finance", "Core", "Partner", "EMEA", 20_000.0, 90.0, Some(Outcome::Lost)),
        ]
    }

    fn engineer_batch(deals: &[DealRecord]) -> Vec<FeatureRow> {
        let config = RiskScoringConfig::default();
        let stats = SegmentStats::from_history(deals).unwrap();
        let batch = BatchStatistics::from_deals(deals, config.large_deal_percentile).unwrap();
        let engineer = FeatureEngineer::new(&stats, &config);
        engineer
            .engineer(deals, stats.global_win_rate, &batch)
            .unwrap()
    }

    #[test]
    fn test_two_deal_scenario() {
        let rows = engineer_batch(&two_deal_batch());

        // Deal A: only Tech deal in history and it was won
        assert_eq!(rows[0].win_prob_industry, 1.0);
        assert_eq!(rows[1].win_prob_industry, 0.0);
        assert_eq!(rows[0].is_long_cycle, 0);
        assert_eq!(rows[1].is_long_cycle, 1);
        assert_eq!(rows[0].deal_amount_log, (10_001.0f64).ln());
    }

    #[test]
    fn test_probability_bounds_and_blend() {
        let rows = engineer_batch(&two_deal_batch());
        for row in &rows {
            for p in [
                row.win_prob_industry,
                row.win_prob_product_type,
                row.win_prob_lead_source,
                row.win_prob_region,
            ] {
                assert!((0.0..=1.0).contains(&p));
            }
            let mean = (row.win_prob_industry
                + row.win_prob_product_type
                + row.win_prob_lead_source
                + row.win_prob_region)
                / 4.0;
            assert!((row.blended_win_prob - mean).abs() < 1e-12);
            assert!((row.blended_win_prob + row.blended_risk_prob - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_cycle_sentinels() {
        let deals = vec![
            deal("A", "Tech", "Core", "Inbound", "NA", 10_000.0, 0.0, Some(Outcome::Won)),
            deal("B", "Tech", "Core", "Inbound", "NA", 5_000.0, 40.0, Some(Outcome::Lost)),
        ];
        let rows = engineer_batch(&deals);
        assert_eq!(rows[0].rem_score, 0.0);
        assert_eq!(rows[0].aging_factor, 1.0);
        assert!(rows[0].rapv_aging_value.is_finite());
        assert!(rows[0].sales_cycle_normalized.is_finite());
    }

    #[test]
    fn test_aging_factor_is_capped() {
        let rows = engineer_batch(&two_deal_batch());
        for row in &rows {
            assert!(row.aging_factor <= 1.0);
            assert!(row.aging_factor > 0.0);
        }
        // Deal B has run twice as long as its segment medians suggest
        assert!(rows[1].aging_factor < 1.0);
    }

    #[test]
    fn test_large_deal_is_batch_median_relative() {
        let deals = vec![
            deal("A", "Tech", "Core", "Inbound", "NA", 1_000.0, 30.0, Some(Outcome::Won)),
            deal("B", "Tech", "Core", "Inbound", "NA", 8_000.0, 30.0, Some(Outcome::Won)),
            deal("C", "Tech", "Core", "Inbound", "NA", 50_000.0, 30.0, Some(Outcome::Lost)),
        ];
        let rows = engineer_batch(&deals);
        // Median amount is 8000: only C strictly exceeds it
        assert_eq!(rows[0].is_large_deal, 0);
        assert_eq!(rows[1].is_large_deal, 0);
        assert_eq!(rows[2].is_large_deal, 1);
    }

    #[test]
    fn test_unseen_value_falls_back_to_global_rate() {
        let history = two_deal_batch();
        let config = RiskScoringConfig::default();
        let stats = SegmentStats::from_history(&history).unwrap();
        let scoring = vec![deal(
            "C", "Retail", "Core", "Inbound", "NA", 9_000.0, 20.0, None,
        )];
        let batch = BatchStatistics::from_deals(&scoring, config.large_deal_percentile).unwrap();
        let engineer = FeatureEngineer::new(&stats, &config);
        let rows = engineer.engineer(&scoring, 0.453, &batch).unwrap();
        assert_eq!(rows[0].win_prob_industry, 0.453); // Retail unseen
        assert_eq!(rows[0].win_prob_product_type, 0.5); // Core seen, 1 of 2 won
    }

    #[test]
    fn test_temporal_indicators() {
        let mut d = deal("A", "Tech", "Core", "Inbound", "NA", 10_000.0, 30.0, Some(Outcome::Won));
        d.created_date = NaiveDate::from_ymd_opt(2024, 11, 2).unwrap();
        let mut e = d.clone();
        e.deal_id = "B".to_string();
        e.created_date = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        e.outcome = Some(Outcome::Lost);
        let rows = engineer_batch(&[d, e]);
        assert_eq!((rows[0].is_q4, rows[0].is_quarter_end), (1, 0)); // November
        assert_eq!((rows[1].is_q4, rows[1].is_quarter_end), (0, 1)); // June
    }

    #[test]
    fn test_deterministic_output() {
        let deals = two_deal_batch();
        let first = engineer_batch(&deals);
        let second = engineer_batch(&deals);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        let history = two_deal_batch();
        let config = RiskScoringConfig::default();
        let stats = SegmentStats::from_history(&history).unwrap();
        let batch = BatchStatistics {
            large_deal_threshold: 1.0,
            mean_cycle_days: 1.0,
        };
        let engineer = FeatureEngineer::new(&stats, &config);
        assert!(engineer.engineer(&[], 0.5, &batch).is_err());
    }
}
