use crate::domain::features::FeatureRow;
use crate::domain::risk::{Priority, Recommendation, RiskCategory, RiskFactor};

/// Maps a risk category and its risk factors onto prioritized action items.
/// Rules are additive and independent; output order is rule evaluation order,
/// not priority order.
pub fn generate_recommendations(
    category: RiskCategory,
    risk_factors: &[RiskFactor],
    row: &FeatureRow,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if category == RiskCategory::Critical {
        recommendations.push(Recommendation {
            priority: Priority::Immediate,
            action: "Schedule executive sponsor call within 24 hours".to_string(),
            rationale: "Deal has <25% win probability and needs senior intervention".to_string(),
        });
    }

    if matches!(category, RiskCategory::High | RiskCategory::Critical) {
        recommendations.push(Recommendation {
            priority: Priority::ThisWeek,
            action: "Provide ROI calculator and customer case studies".to_string(),
            rationale: "High-risk deals need a stronger value proposition".to_string(),
        });
    }

    for factor in risk_factors {
        if factor.feature.contains("lead_source") && factor.description.contains("Partner") {
            recommendations.push(Recommendation {
                priority: Priority::ThisWeek,
                action: "Engage partner account manager for joint call".to_string(),
                rationale: "Partner-sourced deals benefit from collaborative selling".to_string(),
            });
        }
        if factor.feature == "is_long_cycle" {
            recommendations.push(Recommendation {
                priority: Priority::Immediate,
                action: "Create timeline with clear milestones and next steps".to_string(),
                rationale: format!(
                    "Deal open {:.0} days (above average)",
                    row.deal.sales_cycle_days
                ),
            });
        }
    }

    if category != RiskCategory::Low {
        recommendations.push(Recommendation {
            priority: Priority::Ongoing,
            action: "Weekly check-in with decision maker".to_string(),
            rationale: "Regular engagement prevents deal stagnation".to_string(),
        });
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deal::{DealRecord, Outcome};
    use crate::domain::features::DealSizeSegment;
    use chrono::NaiveDate;

    fn row(cycle: f64) -> FeatureRow {
        FeatureRow {
            deal: DealRecord {
                deal_id: "D1".to_string(),
                created_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                closed_date: None,
                sales_rep_id: "R1".to_string(),
                industry: "Tech".to_string(),
                region: "NA".to_string(),
                product_type: "Core".to_string(),
                lead_source: "Partner".to_string(),
                deal_stage: "Qualified".to_string(),
                deal_amount: 12_000.0,
                sales_cycle_days: cycle,
                outcome: Some(Outcome::Lost),
            },
            win_prob_industry: 0.4,
            win_prob_product_type: 0.4,
            win_prob_lead_source: 0.4,
            win_prob_region: 0.4,
            blended_win_prob: 0.4,
            blended_risk_prob: 0.6,
            aging_factor: 1.0,
            rapv_aging_value: 4_800.0,
            rem_score: 50.0,
            deal_amount_log: 9.39,
            is_large_deal: 0,
            sales_cycle_normalized: 1.0,
            is_long_cycle: (cycle > 75.0) as u8,
            is_q4: 0,
            is_quarter_end: 1,
            deal_size_segment: DealSizeSegment::Medium,
        }
    }

    fn factor(feature: &str, description: &str) -> RiskFactor {
        RiskFactor {
            feature: feature.to_string(),
            impact: 0.5,
            description: description.to_string(),
        }
    }

    #[test]
    fn test_critical_always_has_immediate_escalation() {
        let recs = generate_recommendations(RiskCategory::Critical, &[], &row(30.0));
        assert!(recs.iter().any(|r| r.priority == Priority::Immediate));
        // critical also picks up the value-prop and check-in rules
        assert_eq!(recs.len(), 3);
        assert!(recs[0].action.contains("executive sponsor"));
    }

    #[test]
    fn test_low_without_factors_yields_nothing() {
        let recs = generate_recommendations(RiskCategory::Low, &[], &row(30.0));
        assert!(recs.is_empty());
    }

    #[test]
    fn test_low_with_long_cycle_factor_still_triggers() {
        let factors = [factor("is_long_cycle", "Long sales cycle (90 days)")];
        let recs = generate_recommendations(RiskCategory::Low, &factors, &row(90.0));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].priority, Priority::Immediate);
        assert!(recs[0].rationale.contains("90 days"));
    }

    #[test]
    fn test_partner_factor_adds_engagement_item() {
        let factors = [factor(
            "win_prob_lead_source",
            "Lead Source: Partner (win rate: 0.38)",
        )];
        let recs = generate_recommendations(RiskCategory::Medium, &factors, &row(30.0));
        assert!(recs.iter().any(|r| r.action.contains("partner account manager")));
        // medium adds the ongoing check-in as the last rule
        assert_eq!(recs.last().unwrap().priority, Priority::Ongoing);
    }

    #[test]
    fn test_rules_are_additive_with_stable_order() {
        let factors = [
            factor("win_prob_lead_source", "Lead Source: Partner (win rate: 0.38)"),
            factor("is_long_cycle", "Long sales cycle (120 days)"),
        ];
        let recs = generate_recommendations(RiskCategory::Critical, &factors, &row(120.0));
        let actions: Vec<&str> = recs.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(
            actions,
            vec![
                "Schedule executive sponsor call within 24 hours",
                "Provide ROI calculator and customer case studies",
                "Engage partner account manager for joint call",
                "Create timeline with clear milestones and next steps",
                "Weekly check-in with decision maker",
            ]
        );
    }

    #[test]
    fn test_non_partner_source_does_not_trigger_partner_rule() {
        let factors = [factor(
            "win_prob_lead_source",
            "Lead Source: Inbound (win rate: 0.55)",
        )];
        let recs = generate_recommendations(RiskCategory::High, &factors, &row(30.0));
        assert!(!recs.iter().any(|r| r.action.contains("partner")));
    }
}
