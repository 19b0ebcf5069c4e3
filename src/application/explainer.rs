use crate::application::risk_model::RiskModel;
use crate::domain::deal::SegmentType;
use crate::domain::features::FeatureRow;
use crate::domain::risk::RiskFactor;

/// Ranks the model's feature columns for one deal and renders the top-N as
/// human-readable risk factors. Ranking uses the model's resolved explanation
/// capability; ties keep feature-column order (stable sort).
pub fn identify_risk_factors(
    row: &FeatureRow,
    model: &RiskModel,
    top_n: usize,
) -> Vec<RiskFactor> {
    let weights = model.feature_weights();
    let mut ranked: Vec<(&String, f64)> = model
        .feature_columns
        .iter()
        .zip(weights)
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranked
        .into_iter()
        .take(top_n)
        .map(|(feature, impact)| RiskFactor {
            feature: feature.clone(),
            impact,
            description: describe_feature(feature, row),
        })
        .collect()
}

fn describe_feature(feature: &str, row: &FeatureRow) -> String {
    let value = row.model_value(feature);
    if let Some(segment) = SegmentType::from_feature_name(feature) {
        let segment_value = segment.value(&row.deal);
        return format!(
            "{}: {} (win rate: {:.2})",
            segment.label(),
            segment_value,
            value.unwrap_or(0.0)
        );
    }
    if feature == "is_long_cycle" && value == Some(1.0) {
        return format!("Long sales cycle ({:.0} days)", row.deal.sales_cycle_days);
    }
    if feature == "is_large_deal" {
        return format!("Deal size: {}", format_currency(row.deal.deal_amount));
    }
    match value {
        Some(v) => format!("{}: {}", feature, v),
        None => format!("{}: n/a", feature),
    }
}

/// "$1,234,567" with thousands separators, rounded to whole units.
pub fn format_currency(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if whole < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}
