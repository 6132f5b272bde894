//! Run configuration.
//!
//! Resolved once before a run, with priority:
//! 1. Command-line flags / `ART_*` environment variables (highest)
//! 2. TOML file given with `--config`
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::artifacts::underrated::{DEFAULT_COLLECTION_URL, DEFAULT_UNDERRATED_COUNT};
use crate::error::{PipelineError, Result};
use crate::pipeline::score::DEFAULT_THRESHOLD;

/// Columns removed from the matrices before scoring.
pub const DEFAULT_COLS_TO_REMOVE: [&str; 3] = ["isTimelineWork", "isPublicDomain", "accessionYear"];

/// Immutable settings for one generation run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// CatBoost model exported as JSON.
    pub model_path: PathBuf,
    /// Directory holding `train`, `val` and `test` partition files.
    pub splits_dir: PathBuf,
    /// Ordered feature names; defaults to `<splits_dir>/feature_columns.json`.
    pub feature_names_file: Option<PathBuf>,
    /// Model-aligned metadata, one row per train+val+test row.
    pub metadata_file: PathBuf,
    /// Full descriptive metadata, joined on `objectID` when present.
    pub full_metadata_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub cols_to_remove: Vec<String>,
    pub threshold: f64,
    pub underrated_count: usize,
    pub collection_url_base: String,
    pub label_column: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            model_path: PathBuf::from("models/catboost_model.json"),
            splits_dir: PathBuf::from("data/splits"),
            feature_names_file: None,
            metadata_file: PathBuf::from("data/meta_for_model.parquet"),
            full_metadata_file: Some(PathBuf::from("data/df_train_clean.parquet")),
            output_dir: PathBuf::from("output"),
            cols_to_remove: DEFAULT_COLS_TO_REMOVE.iter().map(|s| s.to_string()).collect(),
            threshold: DEFAULT_THRESHOLD,
            underrated_count: DEFAULT_UNDERRATED_COUNT,
            collection_url_base: DEFAULT_COLLECTION_URL.to_string(),
            label_column: "y".to_string(),
        }
    }
}

impl RunConfig {
    /// Load a TOML file; unspecified keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::MissingInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))
    }

    /// Resolve defaults, config file and command-line overrides, then validate.
    pub fn resolve(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_toml_file(path)?,
            None => RunConfig::default(),
        };
        args.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PipelineError::Config(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.label_column.trim().is_empty() {
            return Err(PipelineError::Config("label_column must not be empty".into()));
        }
        Ok(())
    }

    pub fn feature_names_path(&self) -> PathBuf {
        self.feature_names_file
            .clone()
            .unwrap_or_else(|| self.splits_dir.join("feature_columns.json"))
    }
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Generate the JSON data files for the collection website.
#[derive(Parser, Debug, Default)]
#[command(name = "art-insights", version)]
pub struct CliArgs {
    /// TOML configuration file
    #[arg(long, short = 'c', env = "ART_CONFIG")]
    pub config: Option<PathBuf>,

    /// CatBoost model exported as JSON
    #[arg(long, env = "ART_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Directory with train/val/test partition files
    #[arg(long, env = "ART_SPLITS_DIR")]
    pub splits_dir: Option<PathBuf>,

    /// Feature name list (JSON array or one name per line)
    #[arg(long, env = "ART_FEATURE_NAMES")]
    pub feature_names_file: Option<PathBuf>,

    /// Model-aligned metadata table
    #[arg(long, env = "ART_METADATA_FILE")]
    pub metadata_file: Option<PathBuf>,

    /// Full descriptive metadata table
    #[arg(long, env = "ART_FULL_METADATA_FILE")]
    pub full_metadata_file: Option<PathBuf>,

    /// Run without the full descriptive metadata table
    #[arg(long, conflicts_with = "full_metadata_file")]
    pub no_full_metadata: bool,

    /// Where the JSON artifacts are written
    #[arg(long, short = 'o', env = "ART_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Column to drop before scoring (repeatable; replaces the default list)
    #[arg(long = "drop-column", value_name = "NAME")]
    pub cols_to_remove: Vec<String>,

    /// Decision threshold on the positive-class probability
    #[arg(long, env = "ART_THRESHOLD")]
    pub threshold: Option<f64>,

    /// Number of underrated items to publish
    #[arg(long, env = "ART_UNDERRATED_COUNT")]
    pub underrated_count: Option<usize>,

    /// Base URL of collection object pages
    #[arg(long, env = "ART_COLLECTION_URL")]
    pub collection_url_base: Option<String>,

    /// Label column name in tabular partition files
    #[arg(long, env = "ART_LABEL_COLUMN")]
    pub label_column: Option<String>,
}

impl CliArgs {
    fn apply_to(&self, config: &mut RunConfig) {
        if let Some(v) = &self.model_path {
            config.model_path = v.clone();
        }
        if let Some(v) = &self.splits_dir {
            config.splits_dir = v.clone();
        }
        if let Some(v) = &self.feature_names_file {
            config.feature_names_file = Some(v.clone());
        }
        if let Some(v) = &self.metadata_file {
            config.metadata_file = v.clone();
        }
        if let Some(v) = &self.full_metadata_file {
            config.full_metadata_file = Some(v.clone());
        }
        if self.no_full_metadata {
            config.full_metadata_file = None;
        }
        if let Some(v) = &self.output_dir {
            config.output_dir = v.clone();
        }
        if !self.cols_to_remove.is_empty() {
            config.cols_to_remove = self.cols_to_remove.clone();
        }
        if let Some(v) = self.threshold {
            config.threshold = v;
        }
        if let Some(v) = self.underrated_count {
            config.underrated_count = v;
        }
        if let Some(v) = &self.collection_url_base {
            config.collection_url_base = v.clone();
        }
        if let Some(v) = &self.label_column {
            config.label_column = v.clone();
        }
    }
}
