use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array2, ArrayView2};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value mirroring common Pandas dtypes.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

/// Renders the way Pandas stringifies a cell, so a float-typed category
/// keeps its decimal point (`1.0`, not `1`) and booleans are capitalised.
impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) if v.fract() == 0.0 && v.abs() < 1e16 => write!(f, "{v:.1}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(true) => write!(f, "True"),
            MetadataValue::Bool(false) => write!(f, "False"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Try to interpret the value as an `f64`.
    ///
    /// NaN floats count as missing, the way Pandas treats them.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) if v.is_nan() => None,
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Null or NaN.
    pub fn is_missing(&self) -> bool {
        match self {
            MetadataValue::Null => true,
            MetadataValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Interpret the value as an integral object identifier.
    pub fn as_object_id(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            MetadataValue::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            MetadataValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// One row of a metadata table: column name → value.
pub type MetadataRecord = BTreeMap<String, MetadataValue>;

// ---------------------------------------------------------------------------
// MetadataTable – a loaded metadata file
// ---------------------------------------------------------------------------

/// A metadata table with its column order as found in the file.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    /// All rows, in file order.
    pub rows: Vec<MetadataRecord>,
    /// Column names in first-appearance order.
    pub column_names: Vec<String>,
}

impl MetadataTable {
    /// Build the column index from the loaded rows.
    pub fn from_rows(rows: Vec<MetadataRecord>) -> Self {
        let mut column_names: Vec<String> = Vec::new();
        for row in &rows {
            for col in row.keys() {
                if !column_names.iter().any(|c| c == col) {
                    column_names.push(col.clone());
                }
            }
        }
        MetadataTable { rows, column_names }
    }

    /// Build a table whose columns are known up front (tabular files).
    pub fn with_columns(column_names: Vec<String>, rows: Vec<MetadataRecord>) -> Self {
        MetadataTable { rows, column_names }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_names.iter().any(|c| c == name)
    }

    /// Values of one column in row order; rows lacking the column yield `Null`.
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MetadataValue> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(name).unwrap_or(&MetadataValue::Null))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// FeatureMatrix – numeric model input with named columns
// ---------------------------------------------------------------------------

/// Row-major feature values plus the name of every column.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    values: Array2<f32>,
    columns: Vec<String>,
}

impl FeatureMatrix {
    /// Pair a matrix with its column names; the widths must agree.
    pub fn new(values: Array2<f32>, columns: Vec<String>) -> Result<Self> {
        if values.ncols() != columns.len() {
            return Err(PipelineError::FeatureCountMismatch {
                context: "feature matrix".into(),
                expected: columns.len(),
                found: values.ncols(),
            });
        }
        Ok(FeatureMatrix { values, columns })
    }

    pub fn values(&self) -> ArrayView2<'_, f32> {
        self.values.view()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }
}

/// Ground truth per row: 1 = on view, 0 = not on view.
pub type LabelVector = Vec<u8>;

// ---------------------------------------------------------------------------
// Partition – which split a row came from
// ---------------------------------------------------------------------------

/// The dataset split a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Train,
    Validation,
    Test,
}

impl Partition {
    /// Fixed concatenation order of the "all" sequence.
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Validation, Partition::Test];

    /// File stem of the partition inside the splits directory.
    pub fn file_stem(self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Validation => "val",
            Partition::Test => "test",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// One loaded partition file.
#[derive(Debug, Clone)]
pub struct PartitionData {
    pub partition: Partition,
    pub features: FeatureMatrix,
    pub labels: LabelVector,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn feature_matrix_rejects_width_mismatch() {
        let err = FeatureMatrix::new(array![[1.0, 2.0]], vec!["a".into()]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FeatureCountMismatch { expected: 1, found: 2, .. }
        ));
    }

    #[test]
    fn object_id_accepts_integral_floats_only() {
        assert_eq!(MetadataValue::Integer(7).as_object_id(), Some(7));
        assert_eq!(MetadataValue::Float(7.0).as_object_id(), Some(7));
        assert_eq!(MetadataValue::Float(7.5).as_object_id(), None);
        assert_eq!(MetadataValue::Null.as_object_id(), None);
    }

    #[test]
    fn float_labels_keep_their_decimal_point() {
        assert_eq!(MetadataValue::Float(1.0).to_string(), "1.0");
        assert_eq!(MetadataValue::Float(-300.0).to_string(), "-300.0");
        assert_eq!(MetadataValue::Float(2.5).to_string(), "2.5");
        assert_eq!(MetadataValue::Integer(1).to_string(), "1");
        assert_eq!(MetadataValue::Bool(true).to_string(), "True");
    }

    #[test]
    fn nan_counts_as_missing() {
        assert!(MetadataValue::Float(f64::NAN).is_missing());
        assert_eq!(MetadataValue::Float(f64::NAN).as_f64(), None);
        assert!(!MetadataValue::Integer(0).is_missing());
    }

    #[test]
    fn table_columns_keep_first_appearance_order() {
        let mut a = MetadataRecord::new();
        a.insert("z".into(), MetadataValue::Integer(1));
        let mut b = MetadataRecord::new();
        b.insert("a".into(), MetadataValue::Integer(2));
        b.insert("z".into(), MetadataValue::Integer(3));
        let table = MetadataTable::from_rows(vec![a, b]);
        assert_eq!(table.column_names, vec!["z", "a"]);
        assert_eq!(
            table.column("a").cloned().collect::<Vec<_>>(),
            vec![MetadataValue::Null, MetadataValue::Integer(2)]
        );
    }
}
