use crate::domain::deal::{DealRecord, Outcome, SegmentType};
use crate::domain::errors::PipelineError;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};
use std::collections::BTreeMap;
use tracing::debug;

/// Historical per-segment statistics, computed once per training snapshot and
/// persisted beside the model so scoring uses the same table the model was
/// trained on. Immutable after construction.
///
/// Keys are sorted (BTreeMap) so the serialized form is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentStats {
    /// segment type -> category value -> historical win rate in [0,1]
    pub win_rates: BTreeMap<String, BTreeMap<String, f64>>,
    /// segment type -> category value -> median sales_cycle_days
    pub cycle_medians: BTreeMap<String, BTreeMap<String, f64>>,
    /// Won fraction over the resolved history
    pub global_win_rate: f64,
    /// Median sales_cycle_days over the resolved history
    pub global_cycle_median: f64,
}

impl SegmentStats {
    /// Builds segment statistics from historical deals. Deals without a
    /// resolved outcome are excluded before any computation.
    pub fn from_history(deals: &[DealRecord]) -> Result<Self, PipelineError> {
        let resolved: Vec<&DealRecord> =
            deals.iter().filter(|d| d.outcome.is_some()).collect();
        if resolved.is_empty() {
            return Err(PipelineError::EmptyBatch(
                "no deals with a resolved outcome in the historical batch".to_string(),
            ));
        }

        let won = resolved
            .iter()
            .filter(|d| d.outcome == Some(Outcome::Won))
            .count();
        let global_win_rate = won as f64 / resolved.len() as f64;
        let global_cycle_median =
            median(resolved.iter().map(|d| d.sales_cycle_days).collect());

        let mut win_rates = BTreeMap::new();
        let mut cycle_medians = BTreeMap::new();

        for segment in SegmentType::ALL {
            let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
            let mut cycles: BTreeMap<String, Vec<f64>> = BTreeMap::new();

            for deal in &resolved {
                let value = segment.value(deal).to_string();
                let entry = counts.entry(value.clone()).or_insert((0, 0));
                entry.1 += 1;
                if deal.outcome == Some(Outcome::Won) {
                    entry.0 += 1;
                }
                cycles.entry(value).or_default().push(deal.sales_cycle_days);
            }

            let rates: BTreeMap<String, f64> = counts
                .into_iter()
                .map(|(value, (won, total))| (value, won as f64 / total as f64))
                .collect();
            let medians: BTreeMap<String, f64> = cycles
                .into_iter()
                .map(|(value, days)| (value, median(days)))
                .collect();

            debug!(
                segment = segment.as_str(),
                values = rates.len(),
                "Computed segment win rates"
            );
            win_rates.insert(segment.as_str().to_string(), rates);
            cycle_medians.insert(segment.as_str().to_string(), medians);
        }

        Ok(Self {
            win_rates,
            cycle_medians,
            global_win_rate,
            global_cycle_median,
        })
    }

    /// Historical win rate for a category value, None when the value was not
    /// seen at training time.
    pub fn win_rate(&self, segment: SegmentType, value: &str) -> Option<f64> {
        self.win_rates
            .get(segment.as_str())
            .and_then(|m| m.get(value))
            .copied()
    }

    /// Historical median cycle for a category value, None when unseen.
    pub fn cycle_median(&self, segment: SegmentType, value: &str) -> Option<f64> {
        self.cycle_medians
            .get(segment.as_str())
            .and_then(|m| m.get(value))
            .copied()
    }
}

fn median(values: Vec<f64>) -> f64 {
    let mut data = Data::new(values);
    data.median()
}
