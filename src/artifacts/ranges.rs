use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::data::model::MetadataTable;

/// Numeric form fields, read from the model-aligned metadata.
pub const NUMERIC_FIELDS: [&str; 3] = ["objectBeginDate", "objectEndDate", "accessionYear"];

/// Dropdown fields, read from the full descriptive metadata.
pub const CATEGORICAL_FIELDS: [&str; 4] = ["department", "classification", "culture", "medium"];

/// Distinct raw values kept per dropdown before sorting.
pub const CATEGORY_CAP: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldRange {
    Numeric(NumericRange),
    Options(Vec<String>),
}

/// `feature_ranges.json`: field name → range or option list.
///
/// A missing field means "no constraint known", never "empty range".
pub type FeatureRanges = IndexMap<String, FieldRange>;

pub fn generate(aligned: &MetadataTable, full: Option<&MetadataTable>) -> FeatureRanges {
    let mut ranges = FeatureRanges::new();

    for field in NUMERIC_FIELDS {
        if !aligned.has_column(field) {
            continue;
        }
        let values: Vec<f64> = aligned.column(field).filter_map(|v| v.as_f64()).collect();
        match numeric_range(values) {
            Some(range) => {
                ranges.insert(field.to_string(), FieldRange::Numeric(range));
            }
            None => log::warn!("{field} has no numeric values, range omitted"),
        }
    }

    if let Some(full) = full {
        for field in CATEGORICAL_FIELDS {
            if full.has_column(field) {
                ranges.insert(field.to_string(), FieldRange::Options(capped_options(full, field)));
            }
        }
    }

    log::info!("Computed ranges for {} form fields", ranges.len());
    ranges
}

/// min / max / median over the given values; `None` when empty.
pub fn numeric_range(mut values: Vec<f64>) -> Option<NumericRange> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    let median = if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    };
    Some(NumericRange {
        min: values[0],
        max: values[n - 1],
        median,
    })
}

/// First `CATEGORY_CAP` distinct non-null values in table order, then sorted.
///
/// The cap is applied before sorting, so the result is not necessarily the
/// alphabetically first values of the whole column.
fn capped_options(table: &MetadataTable, field: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut options: Vec<String> = table
        .column(field)
        .filter(|v| !v.is_missing())
        .map(|v| v.to_string())
        .filter(|s| seen.insert(s.clone()))
        .take(CATEGORY_CAP)
        .collect();
    options.sort();
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{MetadataRecord, MetadataValue};

    fn table(column: &str, values: Vec<MetadataValue>) -> MetadataTable {
        let rows = values
            .into_iter()
            .map(|v| {
                let mut r = MetadataRecord::new();
                r.insert(column.to_string(), v);
                r
            })
            .collect();
        MetadataTable::with_columns(vec![column.to_string()], rows)
    }

    #[test]
    fn numeric_range_ignores_nulls_and_orders() {
        let t = table(
            "objectBeginDate",
            vec![
                MetadataValue::Integer(1900),
                MetadataValue::Null,
                MetadataValue::Integer(-500),
                MetadataValue::Float(1200.0),
                MetadataValue::Integer(1800),
            ],
        );
        let ranges = generate(&t, None);
        let FieldRange::Numeric(r) = &ranges["objectBeginDate"] else {
            panic!("expected numeric range");
        };
        assert_eq!((r.min, r.median, r.max), (-500.0, 1500.0, 1900.0));
        assert!(r.min <= r.median && r.median <= r.max);
        assert_eq!(ranges.len(), 1);
    }

    #[test]
    fn odd_count_median_is_middle_value() {
        let r = numeric_range(vec![3.0, 1.0, 2.0]).unwrap();
        assert_eq!(r.median, 2.0);
        assert!(numeric_range(Vec::new()).is_none());
    }

    #[test]
    fn all_null_numeric_column_is_omitted() {
        let t = table("accessionYear", vec![MetadataValue::Null]);
        assert!(generate(&t, None).is_empty());
    }

    #[test]
    fn options_are_deduplicated_and_sorted() {
        let s = |v: &str| MetadataValue::String(v.into());
        let full = table(
            "culture",
            vec![s("Roman"), s("Aztec"), MetadataValue::Null, s("Roman"), s("Greek")],
        );
        let ranges = generate(&MetadataTable::default(), Some(&full));
        assert_eq!(
            ranges["culture"],
            FieldRange::Options(vec!["Aztec".into(), "Greek".into(), "Roman".into()])
        );
        assert!(!ranges.contains_key("department"));
    }

    #[test]
    fn float_coded_categories_render_with_decimal_point() {
        let full = table(
            "classification",
            vec![MetadataValue::Float(2.0), MetadataValue::Float(1.0), MetadataValue::Float(2.0)],
        );
        let ranges = generate(&MetadataTable::default(), Some(&full));
        assert_eq!(
            ranges["classification"],
            FieldRange::Options(vec!["1.0".into(), "2.0".into()])
        );
    }

    #[test]
    fn cap_applies_before_sorting() {
        // 150 distinct values arriving in descending order
        let values = (0..150)
            .rev()
            .map(|i| MetadataValue::String(format!("v{i:03}")))
            .collect();
        let full = table("medium", values);
        let FieldRange::Options(opts) = &generate(&MetadataTable::default(), Some(&full))["medium"]
        else {
            panic!("expected options");
        };
        assert_eq!(opts.len(), CATEGORY_CAP);
        // the first 100 raw values are v149..v050, not v000..v099
        assert_eq!(opts.first().map(String::as_str), Some("v050"));
        assert_eq!(opts.last().map(String::as_str), Some("v149"));
    }

    #[test]
    fn numeric_fields_come_before_categorical_in_output() {
        let aligned = table("objectEndDate", vec![MetadataValue::Integer(10)]);
        let full = table("department", vec![MetadataValue::String("Arms".into())]);
        let keys: Vec<String> = generate(&aligned, Some(&full)).keys().cloned().collect();
        assert_eq!(keys, vec!["objectEndDate", "department"]);
    }
}
