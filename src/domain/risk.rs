use serde::{Deserialize, Serialize};

/// Risk bucket assigned from the predicted loss probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskCategory {
    /// Maps a loss probability in [0,1] onto a category using the configured
    /// percent bounds (upper bounds for low, medium, high).
    pub fn from_loss_probability(probability: f64, bounds_pct: &[f64; 3]) -> Self {
        let pct = probability.clamp(0.0, 1.0) * 100.0;
        if pct <= bounds_pct[0] {
            RiskCategory::Low
        } else if pct <= bounds_pct[1] {
            RiskCategory::Medium
        } else if pct <= bounds_pct[2] {
            RiskCategory::High
        } else {
            RiskCategory::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "low",
            RiskCategory::Medium => "medium",
            RiskCategory::High => "high",
            RiskCategory::Critical => "critical",
        }
    }
}

/// Urgency of a recommended action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Immediate,
    ThisWeek,
    Ongoing,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Immediate => "immediate",
            Priority::ThisWeek => "this_week",
            Priority::Ongoing => "ongoing",
        }
    }
}

/// One ranked contribution to a deal's risk, rendered for humans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    pub feature: String,
    pub impact: f64,
    pub description: String,
}

/// One action item for the deal owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub action: String,
    pub rationale: String,
}
