use std::collections::BTreeMap;

use serde::Serialize;

use super::RunStamp;
use crate::metrics::{ratio, ConfusionCounts};
use crate::pipeline::join::ScoredRecord;

pub const DEPARTMENT_FIELD: &str = "department";
pub const BEGIN_DATE_FIELD: &str = "objectBeginDate";

/// `analysis_stats.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisStats {
    pub last_updated: String,
    pub total_items: usize,
    pub accuracy: f64,
    pub distribution: Distribution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_department: Option<Vec<DepartmentRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_century: Option<Vec<CenturyRow>>,
    pub errors: ErrorBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub on_view: usize,
    pub not_on_view: usize,
    pub on_view_percentage: f64,
    pub not_on_view_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentRow {
    pub department: String,
    pub count: usize,
    pub on_view_rate: f64,
    pub avg_prediction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CenturyRow {
    pub century: i64,
    pub count: usize,
    pub on_view_rate: f64,
    pub avg_prediction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBreakdown {
    pub correct: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub error_rate: f64,
}

/// Running totals for one group.
#[derive(Debug, Default)]
struct GroupAcc {
    count: usize,
    on_view: usize,
    probability_sum: f64,
}

impl GroupAcc {
    fn add(&mut self, record: &ScoredRecord) {
        self.count += 1;
        self.on_view += usize::from(record.actual_label);
        self.probability_sum += record.predicted_probability;
    }

    fn on_view_rate(&self) -> f64 {
        ratio(self.on_view, self.count)
    }

    fn avg_prediction(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.probability_sum / self.count as f64
        }
    }
}

/// `floor(year / 100) * 100`; 1875 → 1800, -40 → -100.
pub fn century_of(year: f64) -> i64 {
    (year / 100.0).floor() as i64 * 100
}

/// Chart data computed on the held-out records only.
pub fn generate(test: &[&ScoredRecord], stamp: RunStamp) -> AnalysisStats {
    let total = test.len();
    let cm = ConfusionCounts::from_pairs(test.iter().map(|r| (r.predicted_class, r.actual_label)));
    let accuracy = cm.accuracy();

    let on_view = test.iter().filter(|r| r.actual_label == 1).count();
    let not_on_view = total - on_view;

    let stats = AnalysisStats {
        last_updated: stamp.iso(),
        total_items: total,
        accuracy,
        distribution: Distribution {
            on_view,
            not_on_view,
            on_view_percentage: ratio(on_view, total) * 100.0,
            not_on_view_percentage: ratio(not_on_view, total) * 100.0,
        },
        by_department: by_department(test),
        by_century: by_century(test),
        errors: ErrorBreakdown {
            correct: cm.correct(),
            false_positives: cm.false_positives,
            false_negatives: cm.false_negatives,
            error_rate: 1.0 - accuracy,
        },
    };

    if total == 0 {
        log::warn!("Test partition is empty; analysis statistics are all zero");
    }
    log::info!("Computed analysis statistics over {total} test items");
    stats
}

fn has_field(test: &[&ScoredRecord], field: &str) -> bool {
    test.iter().all(|r| r.field(field).is_some())
}

fn by_department(test: &[&ScoredRecord]) -> Option<Vec<DepartmentRow>> {
    if !has_field(test, DEPARTMENT_FIELD) {
        return None;
    }
    let mut groups: BTreeMap<String, GroupAcc> = BTreeMap::new();
    for record in test {
        match record.field(DEPARTMENT_FIELD) {
            Some(value) if !value.is_missing() => {
                groups.entry(value.to_string()).or_default().add(record)
            }
            _ => {}
        }
    }
    Some(
        groups
            .into_iter()
            .map(|(department, acc)| DepartmentRow {
                department,
                count: acc.count,
                on_view_rate: acc.on_view_rate(),
                avg_prediction: acc.avg_prediction(),
            })
            .collect(),
    )
}

fn by_century(test: &[&ScoredRecord]) -> Option<Vec<CenturyRow>> {
    if !has_field(test, BEGIN_DATE_FIELD) {
        return None;
    }
    let mut groups: BTreeMap<i64, GroupAcc> = BTreeMap::new();
    for record in test {
        if let Some(year) = record.field(BEGIN_DATE_FIELD).and_then(|v| v.as_f64()) {
            groups.entry(century_of(year)).or_default().add(record);
        }
    }
    Some(
        groups
            .into_iter()
            .map(|(century, acc)| CenturyRow {
                century,
                count: acc.count,
                on_view_rate: acc.on_view_rate(),
                avg_prediction: acc.avg_prediction(),
            })
            .collect(),
    )
}
