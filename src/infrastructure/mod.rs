// Deal batch CSV input/output
pub mod csv_store;

// Model and segment-table persistence
pub mod artifact_store;
