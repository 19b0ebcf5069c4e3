// Deal records and segment axes
pub mod deal;

// Pipeline error types
pub mod errors;

// Engineered feature rows and the model column registry
pub mod features;

// Risk categories, factors and recommendations
pub mod risk;
