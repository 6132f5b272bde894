//! Write a small, self-consistent input set for a smoke run:
//!
//! ```text
//! <out>/splits/{train,val,test}.parquet   feature columns + y
//! <out>/splits/feature_columns.json
//! <out>/meta_for_model.parquet            one row per partition row
//! <out>/df_train_clean.parquet            descriptive metadata, shuffled
//! <out>/catboost_model.json
//! <out>/run.toml                          config pointing at the above
//! ```
//!
//! Labels are drawn from the generated model's own probabilities, so the
//! metrics of a run over this data are meaningful but not perfect.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::print_batches;
use clap::Parser;
use ndarray::Array2;
use parquet::arrow::ArrowWriter;
use serde_json::json;

use art_insights::classifier::{CatBoostModel, Classifier};
use art_insights::config::{RunConfig, DEFAULT_COLS_TO_REMOVE};
use art_insights::data::align::ColumnDrop;
use art_insights::data::model::{FeatureMatrix, Partition};

const FEATURES: [&str; 8] = [
    "objectBeginDate",
    "objectEndDate",
    "isHighlight",
    "isPublicDomain",
    "isTimelineWork",
    "accessionYear",
    "hasImage",
    "departmentCode",
];

const DEPARTMENTS: [&str; 6] = [
    "Arms and Armor",
    "Asian Art",
    "Egyptian Art",
    "European Paintings",
    "Greek and Roman Art",
    "Photographs",
];
const CULTURES: [&str; 5] = ["Roman", "Japanese", "French", "Egyptian", "American"];
const MEDIUMS: [&str; 5] = ["Bronze", "Oil on canvas", "Terracotta", "Silk", "Gelatin silver print"];
const CLASSIFICATIONS: [&str; 4] = ["Paintings", "Sculpture", "Textiles", "Metalwork"];
const OBJECT_NAMES: [&str; 5] = ["Helmet", "Vase", "Painting", "Figure", "Print"];

/// Generate sample inputs for art-insights.
#[derive(Parser, Debug)]
struct Args {
    /// Output directory
    #[arg(default_value = "sample_data")]
    out_dir: PathBuf,

    /// Number of collection objects
    #[arg(long, default_value_t = 200)]
    objects: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.below(items.len())]
    }
}

struct ArtObject {
    id: i64,
    department: usize,
    title: String,
    object_name: &'static str,
    culture: Option<&'static str>,
    medium: &'static str,
    classification: &'static str,
    begin: i64,
    end: i64,
    accession_year: i64,
    is_highlight: bool,
    is_public_domain: bool,
    is_timeline: bool,
    has_image: bool,
}

impl ArtObject {
    fn random(id: i64, rng: &mut SimpleRng) -> Self {
        let begin = rng.below(4000) as i64 - 2000;
        let object_name = rng.pick(&OBJECT_NAMES);
        ArtObject {
            id,
            department: rng.below(DEPARTMENTS.len()),
            title: format!("{object_name} no. {id}"),
            object_name,
            culture: (!rng.chance(0.15)).then(|| rng.pick(&CULTURES)),
            medium: rng.pick(&MEDIUMS),
            classification: rng.pick(&CLASSIFICATIONS),
            begin,
            end: begin + rng.below(80) as i64,
            accession_year: 1870 + rng.below(150) as i64,
            is_highlight: rng.chance(0.1),
            is_public_domain: rng.chance(0.6),
            is_timeline: rng.chance(0.05),
            has_image: rng.chance(0.7),
        }
    }

    fn features(&self) -> [f64; 8] {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        [
            self.begin as f64,
            self.end as f64,
            flag(self.is_highlight),
            flag(self.is_public_domain),
            flag(self.is_timeline),
            self.accession_year as f64,
            flag(self.has_image),
            self.department as f64,
        ]
    }
}

/// Three shallow trees over the columns left after the default drop:
/// objectBeginDate, objectEndDate, isHighlight, hasImage, departmentCode.
fn sample_model() -> serde_json::Value {
    let float_features: Vec<_> = (0..5)
        .map(|i| json!({"feature_index": i, "flat_feature_index": i}))
        .collect();
    json!({
        "features_info": {"float_features": float_features},
        "oblivious_trees": [
            {
                "splits": [{"float_feature_index": 2, "border": 0.5, "split_type": "FloatFeature"}],
                "leaf_values": [-0.8, 1.6],
                "leaf_weights": [180.0, 20.0]
            },
            {
                "splits": [
                    {"float_feature_index": 3, "border": 0.5, "split_type": "FloatFeature"},
                    {"float_feature_index": 0, "border": 1800.0, "split_type": "FloatFeature"}
                ],
                "leaf_values": [-0.6, 0.4, -0.2, 0.9],
                "leaf_weights": [40.0, 100.0, 15.0, 45.0]
            },
            {
                "splits": [{"float_feature_index": 4, "border": 3.5, "split_type": "FloatFeature"}],
                "leaf_values": [0.3, -0.3],
                "leaf_weights": [130.0, 70.0]
            }
        ],
        "scale_and_bias": [1.0, [0.2]]
    })
}

fn write_parquet(path: &Path, columns: Vec<(&str, ArrayRef)>) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect::<Vec<_>>(),
    ));
    let batch = RecordBatch::try_new(
        schema.clone(),
        columns.into_iter().map(|(_, array)| array).collect(),
    )
    .context("Failed to create RecordBatch")?;

    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("Failed to create writer")?;
    writer.write(&batch).context("Failed to write batch")?;
    writer.close().context("Failed to close writer")?;
    Ok(batch)
}

fn f64_column(values: impl IntoIterator<Item = f64>) -> ArrayRef {
    Arc::new(Float64Array::from_iter_values(values))
}

fn i64_column(values: impl IntoIterator<Item = i64>) -> ArrayRef {
    Arc::new(Int64Array::from_iter_values(values))
}

fn str_column<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(values.into_iter().collect::<StringArray>())
}

fn write_partition(path: &Path, objects: &[&ArtObject], labels: &[u8]) -> Result<()> {
    let mut columns: Vec<(&str, ArrayRef)> = FEATURES
        .iter()
        .enumerate()
        .map(|(j, name)| (*name, f64_column(objects.iter().map(|o| o.features()[j]))))
        .collect();
    columns.push(("y", i64_column(labels.iter().map(|&y| i64::from(y)))));
    write_parquet(path, columns)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);
    let out = args.out_dir;
    let splits = out.join("splits");
    fs::create_dir_all(&splits).with_context(|| format!("Failed to create {}", splits.display()))?;

    let objects: Vec<ArtObject> = (0..args.objects)
        .map(|i| ArtObject::random(100_000 + i as i64, &mut rng))
        .collect();

    // Labels drawn from the model's own probabilities.
    let model_json = sample_model();
    let model = CatBoostModel::from_json(&model_json.to_string())?;
    let feature_names: Vec<String> = FEATURES.iter().map(|s| s.to_string()).collect();
    let remove: Vec<String> = DEFAULT_COLS_TO_REMOVE.iter().map(|s| s.to_string()).collect();
    let drop = ColumnDrop::plan(&feature_names, &remove);

    let flat: Vec<f32> = objects
        .iter()
        .flat_map(|o| o.features())
        .map(|v| v as f32)
        .collect();
    let matrix = FeatureMatrix::new(
        Array2::from_shape_vec((objects.len(), FEATURES.len()), flat)?,
        feature_names.clone(),
    )?;
    let probabilities = model.predict_proba(drop.apply(&matrix)?.values())?;
    let labels: Vec<u8> = probabilities
        .iter()
        .map(|&p| u8::from(rng.chance(p)))
        .collect();

    // 60 / 20 / 20 split, in row order
    let n = objects.len();
    let bounds = [0, n * 6 / 10, n * 8 / 10, n];
    for (k, partition) in Partition::ALL.iter().enumerate() {
        let rows = bounds[k]..bounds[k + 1];
        let part: Vec<&ArtObject> = objects[rows.clone()].iter().collect();
        let path = splits.join(format!("{}.parquet", partition.file_stem()));
        write_partition(&path, &part, &labels[rows])?;
        println!("Wrote {} rows to {}", part.len(), path.display());
    }

    let names_path = splits.join("feature_columns.json");
    fs::write(&names_path, serde_json::to_string_pretty(&feature_names)?)?;

    let meta_path = out.join("meta_for_model.parquet");
    write_parquet(
        &meta_path,
        vec![
            ("objectID", i64_column(objects.iter().map(|o| o.id))),
            ("objectBeginDate", i64_column(objects.iter().map(|o| o.begin))),
            ("objectEndDate", i64_column(objects.iter().map(|o| o.end))),
            ("accessionYear", i64_column(objects.iter().map(|o| o.accession_year))),
            (
                "isHighlight",
                f64_column(objects.iter().map(|o| if o.is_highlight { 1.0 } else { 0.0 })),
            ),
        ],
    )?;

    // Full metadata: reversed order, every 25th object missing.
    let described: Vec<&ArtObject> = objects
        .iter()
        .rev()
        .filter(|o| o.id % 25 != 0)
        .collect();
    let full_path = out.join("df_train_clean.parquet");
    let full = write_parquet(
        &full_path,
        vec![
            ("objectID", i64_column(described.iter().map(|o| o.id))),
            (
                "department",
                str_column(described.iter().map(|o| Some(DEPARTMENTS[o.department]))),
            ),
            ("title", str_column(described.iter().map(|o| Some(o.title.as_str())))),
            ("objectName", str_column(described.iter().map(|o| Some(o.object_name)))),
            ("culture", str_column(described.iter().map(|o| o.culture))),
            ("medium", str_column(described.iter().map(|o| Some(o.medium)))),
            (
                "classification",
                str_column(described.iter().map(|o| Some(o.classification))),
            ),
            ("objectBeginDate", i64_column(described.iter().map(|o| o.begin))),
            ("objectEndDate", i64_column(described.iter().map(|o| o.end))),
            ("accessionYear", i64_column(described.iter().map(|o| o.accession_year))),
        ],
    )?;
    print_batches(&[full.slice(0, full.num_rows().min(5))])?;

    let model_path = out.join("catboost_model.json");
    fs::write(&model_path, serde_json::to_string_pretty(&model_json)?)?;

    let config = RunConfig {
        model_path,
        splits_dir: splits,
        feature_names_file: Some(names_path),
        metadata_file: meta_path,
        full_metadata_file: Some(full_path),
        output_dir: out.join("output"),
        ..RunConfig::default()
    };
    let config_path = out.join("run.toml");
    fs::write(&config_path, toml::to_string_pretty(&config)?)?;

    let positives = labels.iter().filter(|&&y| y == 1).count();
    println!(
        "Wrote {n} objects ({positives} on view) to {}; run with --config {}",
        out.display(),
        config_path.display()
    );
    Ok(())
}
