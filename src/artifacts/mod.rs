/// Website artifacts: four JSON documents derived from one scored snapshot.
///
/// ```text
///   ScoredSet (all) ──► underrated ──► underrated_items.json
///   ScoredSet (test) ─► analysis   ──► analysis_stats.json
///   metadata tables ──► ranges     ──► feature_ranges.json
///   classifier + test ► model_info ──► model_metadata.json
/// ```
///
/// Generators are pure; nothing touches the disk until all four exist.

pub mod analysis;
pub mod model_info;
pub mod ranges;
pub mod underrated;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use crate::error::{PipelineError, Result};

pub use analysis::AnalysisStats;
pub use model_info::ModelMetadata;
pub use ranges::FeatureRanges;
pub use underrated::UnderratedList;

pub const UNDERRATED_FILE: &str = "underrated_items.json";
pub const ANALYSIS_FILE: &str = "analysis_stats.json";
pub const RANGES_FILE: &str = "feature_ranges.json";
pub const MODEL_FILE: &str = "model_metadata.json";

// ---------------------------------------------------------------------------
// RunStamp – the one timestamp embedded in every artifact
// ---------------------------------------------------------------------------

/// `last_updated` value shared by all artifacts of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStamp(pub NaiveDateTime);

impl RunStamp {
    pub fn now() -> Self {
        RunStamp(Local::now().naive_local())
    }

    /// ISO-8601 with microseconds, e.g. `2025-10-19T14:03:27.118204`.
    pub fn iso(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

// ---------------------------------------------------------------------------
// Artifacts – the complete output set of one run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Artifacts {
    pub underrated: UnderratedList,
    pub analysis: AnalysisStats,
    pub ranges: FeatureRanges,
    pub model: ModelMetadata,
}

impl Artifacts {
    /// Serialise everything first, then write each file atomically.
    ///
    /// Returns the written paths in a fixed order.
    pub fn write_all(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let documents = [
            (UNDERRATED_FILE, to_pretty_json("underrated items", &self.underrated)?),
            (ANALYSIS_FILE, to_pretty_json("analysis stats", &self.analysis)?),
            (RANGES_FILE, to_pretty_json("feature ranges", &self.ranges)?),
            (MODEL_FILE, to_pretty_json("model metadata", &self.model)?),
        ];

        fs::create_dir_all(output_dir).map_err(|e| PipelineError::io(output_dir, e))?;

        let mut written = Vec::with_capacity(documents.len());
        for (name, body) in documents {
            let path = output_dir.join(name);
            write_atomic(&path, body.as_bytes())?;
            written.push(path);
        }
        Ok(written)
    }
}

fn to_pretty_json<T: Serialize>(artifact: &'static str, value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|source| PipelineError::Json { artifact, source })
}

/// Write to a temp sibling first, then rename (atomic on POSIX).
/// The temp file is removed if any step fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let result = write_then_rename(&tmp, path, bytes);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(tmp).map_err(|e| PipelineError::io(tmp, e))?;
    file.write_all(bytes).map_err(|e| PipelineError::io(tmp, e))?;
    file.sync_all().map_err(|e| PipelineError::io(tmp, e))?;
    drop(file);
    fs::rename(tmp, path).map_err(|e| PipelineError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn stamp_formats_with_microseconds() {
        let stamp = RunStamp(
            NaiveDate::from_ymd_opt(2025, 10, 19)
                .unwrap()
                .and_hms_micro_opt(14, 3, 27, 118_204)
                .unwrap(),
        );
        assert_eq!(stamp.iso(), "2025-10-19T14:03:27.118204");
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.json");
        write_atomic(&path, b"{}").unwrap();
        write_atomic(&path, b"[]").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
        assert!(!dir.path().join("x.json.tmp").exists());
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory in the way makes the rename fail
        let path = dir.path().join("x.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"").unwrap();

        let err = write_atomic(&path, b"{}").unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(!dir.path().join("x.json.tmp").exists());
        assert!(path.is_dir());
    }
}
