use thiserror::Error;

/// Errors raised by the risk scoring pipeline. Schema and value errors abort
/// the whole batch; there is no row-level partial success.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing required columns: {columns}")]
    MissingColumns { columns: String },

    #[error("Invalid value in column '{column}' for deal '{deal_id}': {value}")]
    InvalidValue {
        column: String,
        deal_id: String,
        value: String,
    },

    #[error("Unsupported model kind: {0}. Must be 'logistic', 'random-forest' or 'gradient-boosting'")]
    UnsupportedModelKind(String),

    #[error("Empty batch: {0}")]
    EmptyBatch(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_names_column_and_deal() {
        let err = PipelineError::InvalidValue {
            column: "deal_amount".to_string(),
            deal_id: "D42".to_string(),
            value: "abc".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("deal_amount"));
        assert!(msg.contains("D42"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_missing_columns_formatting() {
        let err = PipelineError::MissingColumns {
            columns: "deal_amount, outcome".to_string(),
        };
        assert!(err.to_string().contains("deal_amount, outcome"));
    }
}
