/// Generation run: inputs on disk to four JSON files.
///
/// ```text
///   train ─┐
///   val   ─┼─► ColumnDrop ─► concatenate (tagged) ─► BatchScorer ─┐
///   test  ─┘                                                      ▼
///   model metadata ─────────────────────────────────────────────► join ─► ScoredSet
///   full metadata  ───────────────────────────────────────────────┘          │
///                                                                           ▼
///                                                                generators ─► write_all
/// ```

pub mod join;
pub mod score;

use std::fs;
use std::path::PathBuf;

use ndarray::{concatenate, Array2, Axis};

use crate::artifacts::{self, Artifacts, RunStamp};
use crate::classifier::{CatBoostModel, Classifier};
use crate::config::RunConfig;
use crate::data::align::ColumnDrop;
use crate::data::loader;
use crate::data::model::{FeatureMatrix, MetadataTable, Partition, PartitionData};
use crate::error::{PipelineError, Result};

use join::ScoredSet;
use score::BatchScorer;

/// Everything read from disk except the classifier.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub feature_names: Vec<String>,
    /// In `Partition::ALL` order.
    pub partitions: Vec<PartitionData>,
    pub aligned_metadata: MetadataTable,
    pub full_metadata: Option<MetadataTable>,
}

impl Inputs {
    fn rows_in(&self, partition: Partition) -> usize {
        self.partitions
            .iter()
            .filter(|p| p.partition == partition)
            .map(|p| p.features.nrows())
            .sum()
    }
}

/// The concatenated, aligned "all" sequence with one tag and label per row.
#[derive(Debug, Clone)]
pub struct Combined {
    pub features: FeatureMatrix,
    pub labels: Vec<u8>,
    pub partitions: Vec<Partition>,
}

pub fn load_inputs(config: &RunConfig) -> Result<Inputs> {
    let feature_names = loader::load_feature_names(&config.feature_names_path())?;
    log::info!("Loaded {} feature names", feature_names.len());

    let mut partitions = Vec::with_capacity(Partition::ALL.len());
    for partition in Partition::ALL {
        let path = loader::find_partition_file(&config.splits_dir, partition)?;
        let data = loader::load_partition(&path, partition, &feature_names, &config.label_column)?;
        log::info!("Loaded {partition} partition: {} rows", data.features.nrows());
        partitions.push(data);
    }

    let aligned_metadata = loader::load_table(&config.metadata_file)?;
    log::info!(
        "Loaded model metadata: {} rows, {} columns",
        aligned_metadata.len(),
        aligned_metadata.column_names.len()
    );

    let full_metadata = match &config.full_metadata_file {
        Some(path) if !path.exists() => {
            log::warn!(
                "Full metadata {} not found; continuing without descriptive columns",
                path.display()
            );
            None
        }
        Some(path) => {
            let table = loader::load_table(path)?;
            log::info!("Loaded full metadata: {} rows", table.len());
            Some(table)
        }
        None => {
            log::info!("No full metadata configured; descriptive columns stay as loaded");
            None
        }
    };

    Ok(Inputs {
        feature_names,
        partitions,
        aligned_metadata,
        full_metadata,
    })
}

/// Drop the configured columns from every partition with one shared plan,
/// then stack them in the given order, tagging each row with its partition.
pub fn combine(partitions: &[PartitionData], drop: &ColumnDrop) -> Result<Combined> {
    let aligned: Vec<FeatureMatrix> = partitions
        .iter()
        .map(|p| drop.apply(&p.features))
        .collect::<Result<_>>()?;

    let values = if aligned.is_empty() {
        Array2::zeros((0, drop.kept_columns().len()))
    } else {
        let views: Vec<_> = aligned.iter().map(FeatureMatrix::values).collect();
        concatenate(Axis(0), &views).map_err(|e| PipelineError::Partition(e.to_string()))?
    };

    let mut labels = Vec::with_capacity(values.nrows());
    let mut tags = Vec::with_capacity(values.nrows());
    for p in partitions {
        labels.extend_from_slice(&p.labels);
        tags.extend(std::iter::repeat(p.partition).take(p.labels.len()));
    }

    Ok(Combined {
        features: FeatureMatrix::new(values, drop.kept_columns().to_vec())?,
        labels,
        partitions: tags,
    })
}

/// Build all four artifacts in memory. Nothing is written.
pub fn generate(
    config: &RunConfig,
    classifier: &dyn Classifier,
    inputs: &Inputs,
    stamp: RunStamp,
) -> Result<Artifacts> {
    let drop = ColumnDrop::plan(&inputs.feature_names, &config.cols_to_remove);
    log::info!(
        "Aligned features: {} of {} columns kept",
        drop.kept_columns().len(),
        inputs.feature_names.len()
    );
    let combined = combine(&inputs.partitions, &drop)?;

    let scorer = BatchScorer::new(config.threshold);
    let scores = scorer.score(classifier, &combined.features)?;
    log::info!(
        "Scored {} rows at threshold {}",
        scores.len(),
        scorer.threshold()
    );

    let scored = join::join(
        &inputs.aligned_metadata,
        inputs.full_metadata.as_ref(),
        &scores,
        &combined.labels,
        &combined.partitions,
    )?;
    check_test_partition(&scored, inputs.rows_in(Partition::Test))?;
    let test = scored.test();

    Ok(Artifacts {
        underrated: artifacts::underrated::generate(
            scored.records(),
            config.underrated_count,
            &config.collection_url_base,
            stamp,
        ),
        analysis: artifacts::analysis::generate(&test, stamp),
        ranges: artifacts::ranges::generate(
            &inputs.aligned_metadata,
            inputs.full_metadata.as_ref(),
        ),
        model: artifacts::model_info::generate(classifier, drop.kept_columns(), &test, stamp),
    })
}

fn check_test_partition(scored: &ScoredSet, expected: usize) -> Result<()> {
    let tagged = scored.partition(Partition::Test).len();
    if tagged != expected {
        log::error!("{tagged} records tagged test, but the test partition has {expected} rows");
        return Err(PipelineError::Partition(format!(
            "{tagged} records tagged test, expected {expected}"
        )));
    }
    Ok(())
}

/// Full run: load, score, generate, write. Returns the written paths.
pub fn run(config: &RunConfig, stamp: RunStamp) -> Result<Vec<PathBuf>> {
    let classifier = CatBoostModel::load(&config.model_path)?;
    let inputs = load_inputs(config)?;
    let artifacts = generate(config, &classifier, &inputs, stamp)?;

    let written = artifacts.write_all(&config.output_dir)?;
    log::info!("Generated {} files in {}", written.len(), config.output_dir.display());
    for path in &written {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        log::info!("  {name} ({:.1} KB)", size as f64 / 1024.0);
    }
    Ok(written)
}
