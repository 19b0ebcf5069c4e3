use crate::application::pipeline::RiskArtifact;
use crate::application::segment_stats::SegmentStats;
use crate::domain::errors::PipelineError;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Persists the trained model artifact as JSON. The format is opaque to
/// callers; only this module reads it back.
pub fn save_artifact(path: &Path, artifact: &RiskArtifact) -> Result<(), PipelineError> {
    write_json(path, artifact)?;
    info!(path = ?path, kind = artifact.model.kind.as_str(), "Saved model artifact");
    Ok(())
}

pub fn load_artifact(path: &Path) -> Result<RiskArtifact, PipelineError> {
    let artifact: RiskArtifact = read_json(path)?;
    info!(path = ?path, kind = artifact.model.kind.as_str(), "Loaded model artifact");
    Ok(artifact)
}

/// Persists the segment win-rate snapshot beside the model so scoring uses
/// the same table the model was trained on. Keys serialize sorted, so the
/// file is diffable across training runs.
pub fn save_segment_stats(path: &Path, stats: &SegmentStats) -> Result<(), PipelineError> {
    write_json(path, stats)?;
    info!(path = ?path, "Saved segment statistics");
    Ok(())
}

pub fn load_segment_stats(path: &Path) -> Result<SegmentStats, PipelineError> {
    let stats: SegmentStats = read_json(path)?;
    info!(path = ?path, "Loaded segment statistics");
    Ok(stats)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| PipelineError::Io(format!("cannot create {:?}: {e}", parent)))?;
    }
    let file = File::create(path)
        .map_err(|e| PipelineError::Io(format!("cannot create {:?}: {e}", path)))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .map_err(|e| PipelineError::Artifact(format!("cannot serialize to {:?}: {e}", path)))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let file = File::open(path)
        .map_err(|e| PipelineError::Io(format!("cannot open {:?}: {e}", path)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| PipelineError::Artifact(format!("cannot deserialize {:?}: {e}", path)))
}
