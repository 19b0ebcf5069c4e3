use crate::application::pipeline::ScoredDeal;
use crate::domain::deal::{DealRecord, Outcome};
use crate::domain::errors::PipelineError;
use chrono::NaiveDate;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Columns every deal batch must carry. Missing columns abort the load with
/// no partial result.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "deal_id",
    "created_date",
    "closed_date",
    "sales_rep_id",
    "industry",
    "region",
    "product_type",
    "lead_source",
    "deal_stage",
    "deal_amount",
    "sales_cycle_days",
    "outcome",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Loads a deal batch from CSV, validating the schema up front and every
/// numeric/date cell per row. Value errors name the offending column and deal.
pub fn load_deals(path: &Path) -> Result<Vec<DealRecord>, PipelineError> {
    let file = File::open(path)
        .map_err(|e| PipelineError::Io(format!("cannot open {:?}: {e}", path)))?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::Io(format!("cannot read headers of {:?}: {e}", path)))?
        .clone();
    let mut missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(PipelineError::MissingColumns {
            columns: missing.join(", "),
        });
    }
    let index = |name: &str| headers.iter().position(|h| h == name).unwrap();
    let columns: Vec<usize> = REQUIRED_COLUMNS.iter().map(|c| index(c)).collect();

    let mut deals = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| PipelineError::Io(format!("malformed CSV row: {e}")))?;
        let cell = |i: usize| record.get(columns[i]).unwrap_or("").trim();

        let deal_id = cell(0).to_string();
        let created_date = parse_date(cell(1), "created_date", &deal_id)?;
        let closed_date = match cell(2) {
            "" => None,
            raw => Some(parse_date(raw, "closed_date", &deal_id)?),
        };
        if let Some(closed) = closed_date
            && closed < created_date
        {
            return Err(PipelineError::InvalidValue {
                column: "closed_date".to_string(),
                deal_id,
                value: format!("{closed} precedes created_date {created_date}"),
            });
        }

        deals.push(DealRecord {
            deal_id: deal_id.clone(),
            created_date,
            closed_date,
            sales_rep_id: cell(3).to_string(),
            industry: cell(4).to_string(),
            region: cell(5).to_string(),
            product_type: cell(6).to_string(),
            lead_source: cell(7).to_string(),
            deal_stage: cell(8).to_string(),
            deal_amount: parse_non_negative(cell(9), "deal_amount", &deal_id)?,
            sales_cycle_days: parse_non_negative(cell(10), "sales_cycle_days", &deal_id)?,
            outcome: Outcome::parse(cell(11)),
        });
    }
    info!(rows = deals.len(), path = ?path, "Loaded deal batch");
    Ok(deals)
}

fn parse_date(raw: &str, column: &str, deal_id: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| PipelineError::InvalidValue {
        column: column.to_string(),
        deal_id: deal_id.to_string(),
        value: raw.to_string(),
    })
}

fn parse_non_negative(raw: &str, column: &str, deal_id: &str) -> Result<f64, PipelineError> {
    let invalid = || PipelineError::InvalidValue {
        column: column.to_string(),
        deal_id: deal_id.to_string(),
        value: raw.to_string(),
    };
    let value: f64 = raw.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Ok(value)
}

/// Flat output row for scored batches. The csv writer cannot flatten nested
/// structs, so the fields are spelled out.
#[derive(Debug, Serialize)]
struct ScoredDealCsvRow {
    deal_id: String,
    created_date: NaiveDate,
    closed_date: Option<NaiveDate>,
    sales_rep_id: String,
    industry: String,
    region: String,
    product_type: String,
    lead_source: String,
    deal_stage: String,
    deal_amount: f64,
    sales_cycle_days: f64,
    outcome: Option<Outcome>,
    win_prob_industry: f64,
    win_prob_product_type: f64,
    win_prob_lead_source: f64,
    win_prob_region: f64,
    blended_win_prob: f64,
    blended_risk_prob: f64,
    aging_factor: f64,
    rapv_aging_value: f64,
    rem_score: f64,
    deal_amount_log: f64,
    is_large_deal: u8,
    sales_cycle_normalized: f64,
    is_long_cycle: u8,
    is_q4: u8,
    is_quarter_end: u8,
    deal_size_segment: &'static str,
    loss_probability: f64,
    risk_category: &'static str,
}

/// Writes a scored batch to CSV, one row per input deal, input order.
pub fn write_scored_deals(path: &Path, scored: &[ScoredDeal]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| PipelineError::Io(format!("cannot create {:?}: {e}", parent)))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| PipelineError::Io(format!("cannot create {:?}: {e}", path)))?;
    for item in scored {
        let f = &item.features;
        let d = &f.deal;
        writer
            .serialize(ScoredDealCsvRow {
                deal_id: d.deal_id.clone(),
                created_date: d.created_date,
                closed_date: d.closed_date,
                sales_rep_id: d.sales_rep_id.clone(),
                industry: d.industry.clone(),
                region: d.region.clone(),
                product_type: d.product_type.clone(),
                lead_source: d.lead_source.clone(),
                deal_stage: d.deal_stage.clone(),
                deal_amount: d.deal_amount,
                sales_cycle_days: d.sales_cycle_days,
                outcome: d.outcome,
                win_prob_industry: f.win_prob_industry,
                win_prob_product_type: f.win_prob_product_type,
                win_prob_lead_source: f.win_prob_lead_source,
                win_prob_region: f.win_prob_region,
                blended_win_prob: f.blended_win_prob,
                blended_risk_prob: f.blended_risk_prob,
                aging_factor: f.aging_factor,
                rapv_aging_value: f.rapv_aging_value,
                rem_score: f.rem_score,
                deal_amount_log: f.deal_amount_log,
                is_large_deal: f.is_large_deal,
                sales_cycle_normalized: f.sales_cycle_normalized,
                is_long_cycle: f.is_long_cycle,
                is_q4: f.is_q4,
                is_quarter_end: f.is_quarter_end,
                deal_size_segment: f.deal_size_segment.as_str(),
                loss_probability: item.loss_probability,
                risk_category: item.risk_category.as_str(),
            })
            .map_err(|e| PipelineError::Io(format!("cannot write {:?}: {e}", path)))?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::Io(format!("cannot flush {:?}: {e}", path)))?;
    info!(rows = scored.len(), path = ?path, "Wrote scored batch");
    Ok(())
}
