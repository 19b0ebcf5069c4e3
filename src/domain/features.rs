use crate::domain::deal::DealRecord;
use serde::{Deserialize, Serialize};

/// Ordered list of feature columns fed to the model.
/// The model artifact records this order at training time; any change here is
/// a breaking change for saved models.
pub const MODEL_FEATURES: &[&str] = &[
    "win_prob_industry",
    "win_prob_product_type",
    "win_prob_lead_source",
    "win_prob_region",
    "blended_win_prob",
    "rem_score",
    "deal_amount_log",
    "is_large_deal",
    "sales_cycle_normalized",
    "is_long_cycle",
    "is_q4",
    "is_quarter_end",
];

/// Informational deal size bucket. Not fed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealSizeSegment {
    Small,
    Medium,
    Large,
    Enterprise,
}

impl DealSizeSegment {
    pub fn from_amount(amount: f64, bounds: &[f64; 3]) -> Self {
        if amount <= bounds[0] {
            DealSizeSegment::Small
        } else if amount <= bounds[1] {
            DealSizeSegment::Medium
        } else if amount <= bounds[2] {
            DealSizeSegment::Large
        } else {
            DealSizeSegment::Enterprise
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DealSizeSegment::Small => "small",
            DealSizeSegment::Medium => "medium",
            DealSizeSegment::Large => "large",
            DealSizeSegment::Enterprise => "enterprise",
        }
    }
}

/// Engineered features for one deal. Carries the source record so the
/// explainer can render raw attribute values alongside model features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub deal: DealRecord,
    pub win_prob_industry: f64,
    pub win_prob_product_type: f64,
    pub win_prob_lead_source: f64,
    pub win_prob_region: f64,
    pub blended_win_prob: f64,
    pub blended_risk_prob: f64,
    pub aging_factor: f64,
    pub rapv_aging_value: f64,
    pub rem_score: f64,
    pub deal_amount_log: f64,
    pub is_large_deal: u8,
    pub sales_cycle_normalized: f64,
    pub is_long_cycle: u8,
    pub is_q4: u8,
    pub is_quarter_end: u8,
    pub deal_size_segment: DealSizeSegment,
}

impl FeatureRow {
    /// Flattens the row into the model input vector, in `MODEL_FEATURES`
    /// order.
    pub fn to_model_vector(&self) -> Vec<f64> {
        vec![
            self.win_prob_industry,
            self.win_prob_product_type,
            self.win_prob_lead_source,
            self.win_prob_region,
            self.blended_win_prob,
            self.rem_score,
            self.deal_amount_log,
            self.is_large_deal as f64,
            self.sales_cycle_normalized,
            self.is_long_cycle as f64,
            self.is_q4 as f64,
            self.is_quarter_end as f64,
        ]
    }

    /// Value of a single model feature column by name.
    pub fn model_value(&self, name: &str) -> Option<f64> {
        MODEL_FEATURES
            .iter()
            .position(|&f| f == name)
            .map(|i| self.to_model_vector()[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deal::Outcome;
    use chrono::NaiveDate;

    fn sample_row() -> FeatureRow {
        FeatureRow {
            deal: DealRecord {
                deal_id: "D1".to_string(),
                created_date: NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
                closed_date: None,
                sales_rep_id: "R1".to_string(),
                industry: "Tech".to_string(),
                region: "NA".to_string(),
                product_type: "Core".to_string(),
                lead_source: "Inbound".to_string(),
                deal_stage: "Qualified".to_string(),
                deal_amount: 10_000.0,
                sales_cycle_days: 30.0,
                outcome: Some(Outcome::Won),
            },
            win_prob_industry: 0.6,
            win_prob_product_type: 0.5,
            win_prob_lead_source: 0.4,
            win_prob_region: 0.5,
            blended_win_prob: 0.5,
            blended_risk_prob: 0.5,
            aging_factor: 1.0,
            rapv_aging_value: 5_000.0,
            rem_score: 166.7,
            deal_amount_log: 9.21,
            is_large_deal: 1,
            sales_cycle_normalized: 0.5,
            is_long_cycle: 0,
            is_q4: 1,
            is_quarter_end: 1,
            deal_size_segment: DealSizeSegment::Medium,
        }
    }

    #[test]
    fn test_model_vector_matches_registry_length() {
        let row = sample_row();
        assert_eq!(row.to_model_vector().len(), MODEL_FEATURES.len());
    }

    #[test]
    fn test_model_value_lookup() {
        let row = sample_row();
        assert_eq!(row.model_value("win_prob_industry"), Some(0.6));
        assert_eq!(row.model_value("is_q4"), Some(1.0));
        assert_eq!(row.model_value("aging_factor"), None); // not a model column
    }

    #[test]
    fn test_deal_size_buckets() {
        let bounds = [5_000.0, 15_000.0, 30_000.0];
        assert_eq!(
            DealSizeSegment::from_amount(1_000.0, &bounds),
            DealSizeSegment::Small
        );
        assert_eq!(
            DealSizeSegment::from_amount(5_000.0, &bounds),
            DealSizeSegment::Small
        );
        assert_eq!(
            DealSizeSegment::from_amount(10_000.0, &bounds),
            DealSizeSegment::Medium
        );
        assert_eq!(
            DealSizeSegment::from_amount(20_000.0, &bounds),
            DealSizeSegment::Large
        );
        assert_eq!(
            DealSizeSegment::from_amount(50_000.0, &bounds),
            DealSizeSegment::Enterprise
        );
    }
}
