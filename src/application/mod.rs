// Historical win-rate and cycle statistics per segment
pub mod segment_stats;

// Deal batch -> model-ready feature rows
pub mod feature_engineering;

// Classifier training, scoring and evaluation
pub mod risk_model;

// Per-deal risk factor ranking and rendering
pub mod explainer;

// Risk category + factors -> prioritized action items
pub mod recommendations;

// Train/score orchestration
pub mod pipeline;
