use std::collections::HashMap;

use super::score::Scores;
use crate::data::model::{MetadataRecord, MetadataTable, MetadataValue, Partition};
use crate::error::{PipelineError, Result};

/// Join key shared by both metadata sources.
pub const OBJECT_ID: &str = "objectID";

/// Descriptive columns pulled from the full metadata table.
pub const JOINED_COLUMNS: [&str; 6] = [
    "department",
    "title",
    "objectName",
    "culture",
    "medium",
    "classification",
];

// ---------------------------------------------------------------------------
// ScoredRecord – one denormalised, scored item
// ---------------------------------------------------------------------------

/// Metadata of one item plus the model's verdict and the ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub object_id: i64,
    pub metadata: MetadataRecord,
    pub predicted_probability: f64,
    pub predicted_class: u8,
    pub actual_label: u8,
    pub partition: Partition,
}

impl ScoredRecord {
    /// Metadata cell, `None` when the column is absent from this record.
    pub fn field(&self, name: &str) -> Option<&MetadataValue> {
        self.metadata.get(name)
    }
}

/// All scored records of a run, in train → val → test row order.
#[derive(Debug, Clone, Default)]
pub struct ScoredSet {
    records: Vec<ScoredRecord>,
}

impl ScoredSet {
    pub fn records(&self) -> &[ScoredRecord] {
        &self.records
    }

    /// Records of one partition, selected by tag.
    pub fn partition(&self, partition: Partition) -> Vec<&ScoredRecord> {
        self.records
            .iter()
            .filter(|r| r.partition == partition)
            .collect()
    }

    /// The held-out records every metric is computed on.
    pub fn test(&self) -> Vec<&ScoredRecord> {
        self.partition(Partition::Test)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Merge scores and labels into the model-aligned metadata, row by row, and
/// left-join the descriptive columns of `full` on `objectID`.
///
/// `aligned`, `scores`, `labels` and `partitions` must all describe the same
/// rows in the same order.
pub fn join(
    aligned: &MetadataTable,
    full: Option<&MetadataTable>,
    scores: &Scores,
    labels: &[u8],
    partitions: &[Partition],
) -> Result<ScoredSet> {
    for (name, rows) in [
        ("scores", scores.len()),
        ("labels", labels.len()),
        ("partition tags", partitions.len()),
    ] {
        if rows != aligned.len() {
            return Err(PipelineError::RowCountMismatch {
                left: "model metadata".into(),
                left_rows: aligned.len(),
                right: name.into(),
                right_rows: rows,
            });
        }
    }

    let lookup = full.map(FullIndex::build);
    let mut unmatched = 0usize;
    let mut records = Vec::with_capacity(aligned.len());

    for (row, base) in aligned.rows.iter().enumerate() {
        let object_id = base
            .get(OBJECT_ID)
            .and_then(MetadataValue::as_object_id)
            .ok_or(PipelineError::MissingObjectId { row })?;

        let mut metadata = base.clone();
        if let Some(index) = &lookup {
            match index.rows.get(&object_id) {
                Some(found) => {
                    for col in &index.columns {
                        let value = found.get(*col).cloned().unwrap_or(MetadataValue::Null);
                        metadata.insert((*col).to_string(), value);
                    }
                }
                None => {
                    unmatched += 1;
                    for col in &index.columns {
                        metadata
                            .entry((*col).to_string())
                            .or_insert(MetadataValue::Null);
                    }
                }
            }
        }

        records.push(ScoredRecord {
            object_id,
            metadata,
            predicted_probability: scores.probabilities[row],
            predicted_class: scores.predicted_class[row],
            actual_label: labels[row],
            partition: partitions[row],
        });
    }

    if unmatched > 0 {
        log::warn!("{unmatched} items have no row in the full metadata table");
    }
    log::info!("Generated predictions for {} items (entire dataset)", records.len());
    Ok(ScoredSet { records })
}

/// `objectID` → first matching row of the full table.
struct FullIndex<'a> {
    rows: HashMap<i64, &'a MetadataRecord>,
    columns: Vec<&'static str>,
}

impl<'a> FullIndex<'a> {
    fn build(table: &'a MetadataTable) -> Self {
        let mut rows = HashMap::with_capacity(table.len());
        let mut duplicates = 0usize;
        for record in &table.rows {
            let Some(id) = record.get(OBJECT_ID).and_then(MetadataValue::as_object_id) else {
                continue;
            };
            if rows.contains_key(&id) {
                duplicates += 1;
            } else {
                rows.insert(id, record);
            }
        }
        if duplicates > 0 {
            log::debug!("{duplicates} duplicate objectIDs in full metadata, first row kept");
        }
        let columns = JOINED_COLUMNS
            .iter()
            .copied()
            .filter(|c| table.has_column(c))
            .collect();
        FullIndex { rows, columns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, MetadataValue)]) -> MetadataRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn scores(p: &[f64]) -> Scores {
        Scores {
            probabilities: p.to_vec(),
            predicted_class: p.iter().map(|&v| u8::from(v >= 0.5)).collect(),
        }
    }

    fn aligned() -> MetadataTable {
        MetadataTable::from_rows(vec![
            record(&[("objectID", MetadataValue::Integer(10)), ("objectBeginDate", MetadataValue::Integer(1875))]),
            record(&[("objectID", MetadataValue::Integer(11)), ("objectBeginDate", MetadataValue::Null)]),
            record(&[("objectID", MetadataValue::Float(12.0)), ("objectBeginDate", MetadataValue::Integer(-40))]),
        ])
    }

    #[test]
    fn joins_left_outer_and_preserves_order() {
        let full = MetadataTable::from_rows(vec![
            record(&[
                ("objectID", MetadataValue::Integer(12)),
                ("department", MetadataValue::String("Egyptian Art".into())),
                ("title", MetadataValue::String("Jar".into())),
            ]),
            record(&[
                ("objectID", MetadataValue::Integer(10)),
                ("department", MetadataValue::String("Arms and Armor".into())),
                ("title", MetadataValue::Null),
            ]),
        ]);
        let parts = [Partition::Train, Partition::Validation, Partition::Test];
        let set = join(&aligned(), Some(&full), &scores(&[0.9, 0.1, 0.6]), &[0, 0, 1], &parts)
            .unwrap();

        let ids: Vec<i64> = set.records().iter().map(|r| r.object_id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert_eq!(
            set.records()[0].field("department"),
            Some(&MetadataValue::String("Arms and Armor".into()))
        );
        // unmatched row: joined columns exist but are null
        assert_eq!(set.records()[1].field("department"), Some(&MetadataValue::Null));
        assert_eq!(set.records()[1].field("title"), Some(&MetadataValue::Null));
        // columns the full table lacks are not invented
        assert_eq!(set.records()[1].field("culture"), None);
        assert_eq!(set.records()[2].predicted_class, 1);
        assert_eq!(set.records()[2].actual_label, 1);
    }

    #[test]
    fn test_records_are_selected_by_tag() {
        let parts = [Partition::Test, Partition::Train, Partition::Test];
        let set = join(&aligned(), None, &scores(&[0.1, 0.2, 0.3]), &[0, 1, 0], &parts).unwrap();
        let test: Vec<i64> = set.test().iter().map(|r| r.object_id).collect();
        assert_eq!(test, vec![10, 12]);
        assert_eq!(set.partition(Partition::Validation).len(), 0);
    }

    #[test]
    fn row_count_mismatch_is_fatal() {
        let parts = [Partition::Train; 3];
        let err = join(&aligned(), None, &scores(&[0.1, 0.2]), &[0, 1, 0], &parts).unwrap_err();
        assert!(matches!(err, PipelineError::RowCountMismatch { right_rows: 2, .. }));
    }

    #[test]
    fn missing_object_id_is_fatal() {
        let table = MetadataTable::from_rows(vec![record(&[("title", MetadataValue::Null)])]);
        let err = join(&table, None, &scores(&[0.1]), &[0], &[Partition::Test]).unwrap_err();
        assert!(matches!(err, PipelineError::MissingObjectId { row: 0 }));
    }
}
