//! Art Insights: turns on-view classifier predictions into the JSON data
//! files served by the collection website.
//!
//! ```text
//!   config ─► data (load, align) ─► pipeline (score, join) ─► artifacts ─► output_dir
//!                                                                   │
//!                         update_recent_updates ◄── analysis_stats.json
//! ```

pub mod artifacts;
pub mod classifier;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod update;

pub use config::RunConfig;
pub use error::{PipelineError, Result, UpdateError};
