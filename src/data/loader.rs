use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::model::{
    FeatureMatrix, LabelVector, MetadataRecord, MetadataTable, MetadataValue, Partition,
    PartitionData,
};
use crate::error::{PipelineError, Result};

/// Extensions tried, in order, when locating a partition file.
pub const PARTITION_EXTENSIONS: [&str; 3] = ["parquet", "csv", "json"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Fail with `MissingInput` unless `path` is an existing file.
pub fn require_file(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(PipelineError::MissingInput {
            path: path.to_path_buf(),
            reason: "not a regular file".into(),
        }),
        Err(e) => Err(PipelineError::MissingInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Load a metadata table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – any flat schema written by Pandas or Polars
/// * `.json`    – `[{ "objectID": 1, "department": "...", ... }, ...]`
/// * `.csv`     – header row, cell types guessed per value
pub fn load_table(path: &Path) -> Result<MetadataTable> {
    require_file(path)?;
    let loaded = match extension(path).as_str() {
        "parquet" | "pq" => load_table_parquet(path),
        "json" => load_table_json(path),
        "csv" => load_table_csv(path),
        other => Err(anyhow!("unsupported file extension: .{other}")),
    };
    let table = loaded.map_err(|e| PipelineError::parse(path, e))?;
    log::debug!(
        "loaded {} rows x {} columns from {}",
        table.len(),
        table.column_names.len(),
        path.display()
    );
    Ok(table)
}

/// Locate `<stem>.{parquet,csv,json}` for a partition inside `splits_dir`.
pub fn find_partition_file(splits_dir: &Path, partition: Partition) -> Result<PathBuf> {
    PARTITION_EXTENSIONS
        .iter()
        .map(|ext| splits_dir.join(format!("{}.{ext}", partition.file_stem())))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| PipelineError::MissingInput {
            path: splits_dir.join(partition.file_stem()),
            reason: format!(
                "no {} partition file (tried .{})",
                partition,
                PARTITION_EXTENSIONS.join(", .")
            ),
        })
}

/// Load one partition: a numeric feature matrix plus its label vector.
///
/// Tabular files hold one column per feature, in `feature_names` order, plus
/// `label_column`. The JSON form is `{"X": [[...], ...], "y": [...]}`.
pub fn load_partition(
    path: &Path,
    partition: Partition,
    feature_names: &[String],
    label_column: &str,
) -> Result<PartitionData> {
    require_file(path)?;
    let loaded = match extension(path).as_str() {
        "parquet" | "pq" => load_partition_parquet(path, label_column),
        "json" => load_partition_json(path, feature_names.len()),
        "csv" => load_partition_csv(path, label_column),
        other => Err(anyhow!("unsupported file extension: .{other}")),
    };
    let (values, labels) = loaded.map_err(|e| PipelineError::parse(path, e))?;

    if values.nrows() != labels.len() {
        return Err(PipelineError::RowCountMismatch {
            left: format!("{partition} features"),
            left_rows: values.nrows(),
            right: format!("{partition} labels"),
            right_rows: labels.len(),
        });
    }
    if values.ncols() != feature_names.len() {
        return Err(PipelineError::FeatureCountMismatch {
            context: path.display().to_string(),
            expected: feature_names.len(),
            found: values.ncols(),
        });
    }
    let features = FeatureMatrix::new(values, feature_names.to_vec())?;

    Ok(PartitionData {
        partition,
        features,
        labels,
    })
}

/// Load the ordered training-time feature names.
///
/// Accepts a JSON array of strings or plain text with one name per line.
pub fn load_feature_names(path: &Path) -> Result<Vec<String>> {
    require_file(path)?;
    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let names = if extension(path) == "json" {
        serde_json::from_str::<Vec<String>>(&text)
            .context("expected a JSON array of strings")
            .map_err(|e| PipelineError::parse(path, e))?
    } else {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    };
    if names.is_empty() {
        return Err(PipelineError::parse(path, anyhow!("no feature names found")));
    }
    Ok(names)
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// JSON loaders
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`.
fn load_table_json(path: &Path) -> anyhow::Result<MetadataTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let row: MetadataRecord = obj
            .iter()
            .map(|(key, val)| (key.clone(), json_to_metadata(val)))
            .collect();
        rows.push(row);
    }

    // Keep the file's key order for the column list rather than BTreeMap order.
    let mut column_names: Vec<String> = Vec::new();
    for rec in records.iter().filter_map(JsonValue::as_object) {
        for key in rec.keys() {
            if !column_names.contains(key) {
                column_names.push(key.clone());
            }
        }
    }

    Ok(MetadataTable::with_columns(column_names, rows))
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct JsonPartition {
    #[serde(rename = "X")]
    x: Vec<Vec<Option<f64>>>,
    y: Vec<f64>,
}

fn load_partition_json(
    path: &Path,
    expected_width: usize,
) -> anyhow::Result<(Array2<f32>, LabelVector)> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let parsed: JsonPartition =
        serde_json::from_str(&text).context("expected {\"X\": [[...]], \"y\": [...]}")?;

    // An empty partition carries no width of its own.
    let width = parsed.x.first().map_or(expected_width, Vec::len);
    let mut flat = Vec::with_capacity(parsed.x.len() * width);
    for (i, row) in parsed.x.iter().enumerate() {
        if row.len() != width {
            bail!("Row {i}: has {} values but row 0 has {width}", row.len());
        }
        flat.extend(row.iter().map(|v| v.map_or(f32::NAN, |v| v as f32)));
    }
    let values = Array2::from_shape_vec((parsed.x.len(), width), flat)
        .context("building feature matrix")?;

    let labels = parsed
        .y
        .iter()
        .enumerate()
        .map(|(i, &v)| to_label(v).with_context(|| format!("y[{i}]")))
        .collect::<anyhow::Result<LabelVector>>()?;

    Ok((values, labels))
}

// ---------------------------------------------------------------------------
// CSV loaders
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per row.
fn load_table_csv(path: &Path) -> anyhow::Result<MetadataTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row: MetadataRecord = headers
            .iter()
            .zip(record.iter())
            .map(|(col, value)| (col.clone(), guess_metadata_type(value)))
            .collect();
        rows.push(row);
    }

    Ok(MetadataTable::with_columns(headers, rows))
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" || s == "True" || s == "False" {
        return MetadataValue::Bool(s.eq_ignore_ascii_case("true"));
    }
    MetadataValue::String(s.to_string())
}

fn load_partition_csv(
    path: &Path,
    label_column: &str,
) -> anyhow::Result<(Array2<f32>, LabelVector)> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();
    let label_idx = headers
        .iter()
        .position(|h| h == label_column)
        .with_context(|| format!("CSV missing '{label_column}' column"))?;
    let width = headers.len() - 1;

    let mut flat = Vec::new();
    let mut labels = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, cell) in record.iter().enumerate() {
            if col_idx == label_idx {
                let raw: f64 = cell.trim().parse().with_context(|| {
                    format!("Row {row_no}, {label_column}: '{cell}' is not a number")
                })?;
                labels.push(to_label(raw).with_context(|| format!("Row {row_no}"))?);
            } else {
                flat.push(parse_feature_cell(cell).with_context(|| {
                    format!("Row {row_no}, {}: '{cell}' is not a number", &headers[col_idx])
                })?);
            }
        }
    }

    let values = Array2::from_shape_vec((labels.len(), width), flat)
        .context("building feature matrix")?;
    Ok((values, labels))
}

fn parse_feature_cell(s: &str) -> anyhow::Result<f32> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Ok(f32::NAN);
    }
    Ok(s.parse::<f32>()?)
}

fn to_label(v: f64) -> anyhow::Result<u8> {
    if v == 0.0 {
        Ok(0)
    } else if v == 1.0 {
        Ok(1)
    } else {
        bail!("label {v} is not 0 or 1")
    }
}

// ---------------------------------------------------------------------------
// Parquet loaders
// ---------------------------------------------------------------------------

/// Load a flat Parquet metadata table (Pandas `df.to_parquet()` / Polars).
fn load_table_parquet(path: &Path) -> anyhow::Result<MetadataTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let column_names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let columns = batch
            .columns()
            .iter()
            .zip(&column_names)
            .map(|(col, name)| {
                decode_metadata_column(col).with_context(|| format!("column '{name}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        for row in 0..batch.num_rows() {
            let mut record = BTreeMap::new();
            for (col, col_name) in columns.iter().zip(&column_names) {
                let value = extract_metadata_value(col, row)
                    .with_context(|| format!("column '{col_name}', row {row}"))?;
                record.insert(col_name.clone(), value);
            }
            rows.push(record);
        }
    }

    Ok(MetadataTable::with_columns(column_names, rows))
}

/// Load a Parquet partition: every column except `label_column` is a feature.
fn load_partition_parquet(
    path: &Path,
    label_column: &str,
) -> anyhow::Result<(Array2<f32>, LabelVector)> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let label_idx = schema
        .index_of(label_column)
        .map_err(|_| anyhow!("Parquet file missing '{label_column}' column"))?;
    let width = schema.fields().len() - 1;
    let reader = builder.build().context("building parquet reader")?;

    let mut flat = Vec::new();
    let mut labels = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            for col_idx in 0..batch.num_columns() {
                let cell = numeric_cell(batch.column(col_idx), row).with_context(|| {
                    format!("Row {row}: column '{}'", schema.field(col_idx).name())
                })?;
                if col_idx == label_idx {
                    if cell.is_nan() {
                        bail!("Row {row}: null label");
                    }
                    labels.push(to_label(cell)?);
                } else {
                    flat.push(cell as f32);
                }
            }
        }
    }

    let values = Array2::from_shape_vec((labels.len(), width), flat)
        .context("building feature matrix")?;
    Ok((values, labels))
}

// -- Parquet / Arrow helpers --

/// Read one numeric cell as `f64`; nulls become NaN.
fn numeric_cell(col: &ArrayRef, row: usize) -> anyhow::Result<f64> {
    if col.is_null(row) {
        return Ok(f64::NAN);
    }
    let value = match col.data_type() {
        DataType::Float64 => col.as_primitive::<Float64Type>().value(row),
        DataType::Float32 => col.as_primitive::<Float32Type>().value(row) as f64,
        DataType::Int64 => col.as_primitive::<Int64Type>().value(row) as f64,
        DataType::Int32 => col.as_primitive::<Int32Type>().value(row) as f64,
        DataType::Int16 => col.as_primitive::<Int16Type>().value(row) as f64,
        DataType::Int8 => col.as_primitive::<Int8Type>().value(row) as f64,
        DataType::UInt64 => col.as_primitive::<UInt64Type>().value(row) as f64,
        DataType::UInt32 => col.as_primitive::<UInt32Type>().value(row) as f64,
        DataType::UInt16 => col.as_primitive::<UInt16Type>().value(row) as f64,
        DataType::UInt8 => col.as_primitive::<UInt8Type>().value(row) as f64,
        DataType::Boolean => {
            if col.as_boolean().value(row) {
                1.0
            } else {
                0.0
            }
        }
        other => bail!("expected a numeric column, got {other:?}"),
    };
    Ok(value)
}

/// Bring a metadata column to one of the types `extract_metadata_value`
/// reads. Dictionary-encoded columns (pandas categoricals) decode to their
/// value type; dates and timestamps render as strings.
fn decode_metadata_column(col: &ArrayRef) -> anyhow::Result<ArrayRef> {
    match col.data_type() {
        DataType::Null
        | DataType::Boolean
        | DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Float32
        | DataType::Float64
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Ok(col.clone()),
        DataType::Dictionary(_, value_type) => {
            let decoded = cast(col, value_type).context("decoding dictionary column")?;
            decode_metadata_column(&decoded)
        }
        other if can_cast_types(other, &DataType::Utf8) => {
            cast(col, &DataType::Utf8).with_context(|| format!("casting {other} to string"))
        }
        other => bail!("unsupported metadata column type {other}"),
    }
}

fn integer_cell(col: &ArrayRef, row: usize) -> anyhow::Result<i64> {
    let value = match col.data_type() {
        DataType::Int64 => col.as_primitive::<Int64Type>().value(row),
        DataType::Int32 => i64::from(col.as_primitive::<Int32Type>().value(row)),
        DataType::Int16 => i64::from(col.as_primitive::<Int16Type>().value(row)),
        DataType::Int8 => i64::from(col.as_primitive::<Int8Type>().value(row)),
        DataType::UInt32 => i64::from(col.as_primitive::<UInt32Type>().value(row)),
        DataType::UInt16 => i64::from(col.as_primitive::<UInt16Type>().value(row)),
        DataType::UInt8 => i64::from(col.as_primitive::<UInt8Type>().value(row)),
        DataType::UInt64 => {
            let v = col.as_primitive::<UInt64Type>().value(row);
            i64::try_from(v).map_err(|_| anyhow!("value {v} does not fit in i64"))?
        }
        other => bail!("expected an integer column, got {other:?}"),
    };
    Ok(value)
}

/// Extract a single metadata value from a decoded Arrow column at a given row.
fn extract_metadata_value(col: &ArrayRef, row: usize) -> anyhow::Result<MetadataValue> {
    if col.data_type() == &DataType::Null || col.is_null(row) {
        return Ok(MetadataValue::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => MetadataValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => {
            MetadataValue::String(col.as_string::<i64>().value(row).to_string())
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => MetadataValue::Integer(integer_cell(col, row)?),
        DataType::Float32 | DataType::Float64 => MetadataValue::Float(numeric_cell(col, row)?),
        DataType::Boolean => MetadataValue::Bool(col.as_boolean().value(row)),
        other => bail!("unsupported metadata column type {other}"),
    };
    Ok(value)
}
