use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Hyperparameter profile for the logistic model kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogisticProfile {
    pub alpha: f64, // L2 regularization strength
}

impl Default for LogisticProfile {
    fn default() -> Self {
        Self { alpha: 0.0 }
    }
}

/// Hyperparameter profile for the random forest model kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RandomForestProfile {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
}

impl Default for RandomForestProfile {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
        }
    }
}

/// Hyperparameter profile for the gradient boosting model kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GradientBoostingProfile {
    pub n_estimators: usize,
    pub max_depth: u16,
    pub learning_rate: f64,
}

impl Default for GradientBoostingProfile {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 5,
            learning_rate: 0.1,
        }
    }
}

/// Risk scoring configuration. Passed explicitly into each pipeline stage so
/// parallel runs with different parameters never share state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskScoringConfig {
    /// Upper bound (in percent of loss probability) for each risk category,
    /// checked in order: low, medium, high. Anything above the last bound is
    /// critical.
    pub risk_category_bounds_pct: [f64; 3],
    /// Deals open longer than this many days count as long-cycle.
    pub long_cycle_threshold_days: f64,
    /// Percentile of the batch deal_amount distribution above which a deal is
    /// flagged as large.
    pub large_deal_percentile: usize,
    /// Deal size bucket upper bounds: small, medium, large. Above the last
    /// bound is enterprise.
    pub deal_size_bounds: [f64; 3],
    /// Fallback win rate when a scoring batch carries no outcomes to derive
    /// one from.
    pub overall_win_rate: f64,
    pub random_seed: u64,
    /// Fraction of labeled deals held out for evaluation during training.
    pub holdout_fraction: f64,
    /// Number of risk factors reported per deal.
    pub top_n_risk_factors: usize,
    /// Compute permutation importances for tree-ensemble models at training
    /// time. When false those models are explained with uniform weights.
    pub compute_importances: bool,
    pub logistic: LogisticProfile,
    pub random_forest: RandomForestProfile,
    pub gradient_boosting: GradientBoostingProfile,
}

impl Default for RiskScoringConfig {
    fn default() -> Self {
        Self {
            risk_category_bounds_pct: [25.0, 50.0, 75.0],
            long_cycle_threshold_days: 75.0,
            large_deal_percentile: 50,
            deal_size_bounds: [5_000.0, 15_000.0, 30_000.0],
            overall_win_rate: 0.453,
            random_seed: 42,
            holdout_fraction: 0.2,
            top_n_risk_factors: 3,
            compute_importances: true,
            logistic: LogisticProfile::default(),
            random_forest: RandomForestProfile::default(),
            gradient_boosting: GradientBoostingProfile::default(),
        }
    }
}

impl RiskScoringConfig {
    pub fn validate(&self) -> Result<(), String> {
        let bounds = &self.risk_category_bounds_pct;
        if !(bounds[0] < bounds[1] && bounds[1] < bounds[2]) {
            return Err(format!(
                "risk_category_bounds_pct must be strictly increasing: {:?}",
                bounds
            ));
        }
        if bounds[2] >= 100.0 {
            return Err(format!(
                "risk_category_bounds_pct must leave room for critical: {:?}",
                bounds
            ));
        }
        if self.large_deal_percentile == 0 || self.large_deal_percentile >= 100 {
            return Err(format!(
                "Invalid large_deal_percentile: {}",
                self.large_deal_percentile
            ));
        }
        if !(self.deal_size_bounds[0] < self.deal_size_bounds[1]
            && self.deal_size_bounds[1] < self.deal_size_bounds[2])
        {
            return Err(format!(
                "deal_size_bounds must be strictly increasing: {:?}",
                self.deal_size_bounds
            ));
        }
        if !(0.0..=1.0).contains(&self.overall_win_rate) {
            return Err(format!("Invalid overall_win_rate: {}", self.overall_win_rate));
        }
        if self.holdout_fraction <= 0.0 || self.holdout_fraction >= 1.0 {
            return Err(format!(
                "Invalid holdout_fraction: {}",
                self.holdout_fraction
            ));
        }
        if self.long_cycle_threshold_days <= 0.0 {
            return Err(format!(
                "Invalid long_cycle_threshold_days: {}",
                self.long_cycle_threshold_days
            ));
        }
        if self.top_n_risk_factors == 0 {
            return Err("top_n_risk_factors must be > 0".to_string());
        }
        if self.gradient_boosting.learning_rate <= 0.0 {
            return Err(format!(
                "Invalid gradient_boosting.learning_rate: {}",
                self.gradient_boosting.learning_rate
            ));
        }
        Ok(())
    }

    /// Loads configuration from a TOML file. Missing keys fall back to
    /// defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }
}
