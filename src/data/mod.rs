/// Data layer: core types, loading, and column alignment.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → PartitionData / MetadataTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ FeatureMatrix │  Array2<f32>, column names
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  align    │  drop configured columns by position → aligned matrix
///   └──────────┘
/// ```

pub mod align;
pub mod loader;
pub mod model;
