use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Everything that can abort a generation run.
///
/// Unknown drop columns and single-class AUC are not errors; they are only
/// logged.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required input file does not exist or cannot be opened.
    #[error("missing input {path}: {reason}")]
    MissingInput { path: PathBuf, reason: String },

    /// An input file exists but its contents could not be understood.
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Two inputs that must line up row-for-row do not.
    #[error("row count mismatch: {left} has {left_rows} rows but {right} has {right_rows}")]
    RowCountMismatch {
        left: String,
        left_rows: usize,
        right: String,
        right_rows: usize,
    },

    /// A matrix is narrower or wider than its column list / the model expects.
    #[error("feature count mismatch in {context}: expected {expected}, found {found}")]
    FeatureCountMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    /// The classifier artifact is structurally invalid.
    #[error("invalid model: {0}")]
    Model(String),

    /// Run configuration rejected before the run started.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A metadata row cannot be tied to a collection object.
    #[error("row {row} of the model metadata has no usable objectID")]
    MissingObjectId { row: usize },

    /// The partition tags disagree with the partition files.
    #[error("partition bookkeeping is inconsistent: {0}")]
    Partition(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialise {artifact}: {source}")]
    Json {
        artifact: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    pub fn parse(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        PipelineError::Parse {
            path: path.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Update utility errors
// ---------------------------------------------------------------------------

/// Failures of the post-hoc `updated_since_retrain` patcher.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response from {url}: {message}")]
    Response { url: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} does not contain a JSON object")]
    NotAnObject(PathBuf),
}
