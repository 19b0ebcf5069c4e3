use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Resolved outcome of a closed deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Won,
    Lost,
}

impl Outcome {
    /// Parses an outcome cell. Anything that is not Won/Lost (open deals,
    /// blanks, pipeline stages) reads as unresolved.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            s if s.eq_ignore_ascii_case("won") => Some(Outcome::Won),
            s if s.eq_ignore_ascii_case("lost") => Some(Outcome::Lost),
            _ => None,
        }
    }
}

/// One sales opportunity as supplied by the deal store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealRecord {
    pub deal_id: String,
    pub created_date: NaiveDate,
    pub closed_date: Option<NaiveDate>,
    pub sales_rep_id: String,
    pub industry: String,
    pub region: String,
    pub product_type: String,
    pub lead_source: String,
    pub deal_stage: String,
    pub deal_amount: f64,
    pub sales_cycle_days: f64,
    pub outcome: Option<Outcome>,
}

impl DealRecord {
    /// Risk-framing label: 1 = Lost, 0 = Won, None = still open.
    pub fn is_lost(&self) -> Option<u8> {
        self.outcome.map(|o| match o {
            Outcome::Lost => 1,
            Outcome::Won => 0,
        })
    }

    pub fn created_month(&self) -> u32 {
        self.created_date.month()
    }
}

/// The categorical axes used for segment win-rate statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentType {
    Industry,
    ProductType,
    LeadSource,
    Region,
}

impl SegmentType {
    pub const ALL: [SegmentType; 4] = [
        SegmentType::Industry,
        SegmentType::ProductType,
        SegmentType::LeadSource,
        SegmentType::Region,
    ];

    /// Column name on the deal record.
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Industry => "industry",
            SegmentType::ProductType => "product_type",
            SegmentType::LeadSource => "lead_source",
            SegmentType::Region => "region",
        }
    }

    /// Name of the derived win-probability feature column.
    pub fn feature_name(&self) -> &'static str {
        match self {
            SegmentType::Industry => "win_prob_industry",
            SegmentType::ProductType => "win_prob_product_type",
            SegmentType::LeadSource => "win_prob_lead_source",
            SegmentType::Region => "win_prob_region",
        }
    }

    /// Human-readable label for risk factor descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            SegmentType::Industry => "Industry",
            SegmentType::ProductType => "Product Type",
            SegmentType::LeadSource => "Lead Source",
            SegmentType::Region => "Region",
        }
    }

    /// The deal's category value on this axis.
    pub fn value<'a>(&self, deal: &'a DealRecord) -> &'a str {
        match self {
            SegmentType::Industry => &deal.industry,
            SegmentType::ProductType => &deal.product_type,
            SegmentType::LeadSource => &deal.lead_source,
            SegmentType::Region => &deal.region,
        }
    }

    /// Maps a win-probability feature column back to its segment axis.
    pub fn from_feature_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.feature_name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal(outcome: Option<Outcome>) -> DealRecord {
        DealRecord {
            deal_id: "D1".to_string(),
            created_date: NaiveDate::from_ymd_opt(2024, 11, 5).unwrap(),
            closed_date: None,
            sales_rep_id: "R1".to_string(),
            industry: "Tech".to_string(),
            region: "NA".to_string(),
            product_type: "Core".to_string(),
            lead_source: "Inbound".to_string(),
            deal_stage: "Qualified".to_string(),
            deal_amount: 10_000.0,
            sales_cycle_days: 30.0,
            outcome,
        }
    }

    #[test]
    fn test_is_lost_label_convention() {
        assert_eq!(deal(Some(Outcome::Lost)).is_lost(), Some(1));
        assert_eq!(deal(Some(Outcome::Won)).is_lost(), Some(0));
        assert_eq!(deal(None).is_lost(), None);
    }

    #[test]
    fn test_outcome_parse() {
        assert_eq!(Outcome::parse("Won"), Some(Outcome::Won));
        assert_eq!(Outcome::parse("lost"), Some(Outcome::Lost));
        assert_eq!(Outcome::parse("Open"), None);
        assert_eq!(Outcome::parse(""), None);
    }

    #[test]
    fn test_segment_accessors() {
        let d = deal(None);
        assert_eq!(SegmentType::Industry.value(&d), "Tech");
        assert_eq!(SegmentType::LeadSource.value(&d), "Inbound");
        assert_eq!(
            SegmentType::from_feature_name("win_prob_region"),
            Some(SegmentType::Region)
        );
        assert_eq!(SegmentType::from_feature_name("rem_score"), None);
    }
}
