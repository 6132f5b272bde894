use indexmap::IndexMap;
use serde::Serialize;

use super::RunStamp;
use crate::data::model::MetadataValue;
use crate::pipeline::join::ScoredRecord;

pub const DEFAULT_UNDERRATED_COUNT: usize = 10;
pub const DEFAULT_COLLECTION_URL: &str = "https://www.metmuseum.org/art/collection/search";

/// Descriptive fields copied onto each item when present and non-null.
pub const DETAIL_FIELDS: [&str; 8] = [
    "title",
    "department",
    "culture",
    "medium",
    "classification",
    "objectBeginDate",
    "objectEndDate",
    "objectName",
];

/// Text stays text; anything numeric is emitted as a float.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetailValue {
    Text(String),
    Number(f64),
}

impl DetailValue {
    fn from_metadata(value: &MetadataValue) -> Option<Self> {
        match value {
            MetadataValue::String(s) => Some(DetailValue::Text(s.clone())),
            other => other.as_f64().map(DetailValue::Number),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderratedItem {
    #[serde(rename = "objectID")]
    pub object_id: i64,
    pub predicted_probability: f64,
    pub met_url: String,
    #[serde(flatten)]
    pub details: IndexMap<String, DetailValue>,
}

/// `underrated_items.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderratedList {
    pub last_updated: String,
    pub count: usize,
    pub items: Vec<UnderratedItem>,
}

/// Items the model confidently places on view although they are not:
/// false positives, highest probability first.
pub fn generate(
    records: &[ScoredRecord],
    limit: usize,
    url_base: &str,
    stamp: RunStamp,
) -> UnderratedList {
    let mut candidates: Vec<&ScoredRecord> = records
        .iter()
        .filter(|r| r.predicted_class == 1 && r.actual_label == 0)
        .collect();
    // sort_by is stable: equal probabilities keep row order
    candidates.sort_by(|a, b| b.predicted_probability.total_cmp(&a.predicted_probability));

    let url_base = url_base.trim_end_matches('/');
    let items: Vec<UnderratedItem> = candidates
        .into_iter()
        .take(limit)
        .map(|record| UnderratedItem {
            object_id: record.object_id,
            predicted_probability: record.predicted_probability,
            met_url: format!("{url_base}/{}", record.object_id),
            details: DETAIL_FIELDS
                .iter()
                .filter_map(|&field| {
                    let value = DetailValue::from_metadata(record.field(field)?)?;
                    Some((field.to_string(), value))
                })
                .collect(),
        })
        .collect();

    log::info!("Selected {} underrated items", items.len());
    UnderratedList {
        last_updated: stamp.iso(),
        count: items.len(),
        items,
    }
}
