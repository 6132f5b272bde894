use serde::Serialize;

use super::RunStamp;
use crate::classifier::Classifier;
use crate::metrics::{roc_auc, ConfusionCounts};
use crate::pipeline::join::ScoredRecord;

pub const MODEL_VERSION: &str = "1.0";
pub const TOP_FEATURES: usize = 30;

/// `model_metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetadata {
    pub version: String,
    pub last_updated: String,
    pub model_type: String,
    pub num_features: usize,
    pub metrics: ModelMetrics,
    pub top_features: Vec<FeatureImportance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub auc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f64,
}

impl ModelMetrics {
    /// Held-out metrics; AUC is 0.0 when the records hold a single class.
    pub fn compute(test: &[&ScoredRecord]) -> Self {
        let cm = ConfusionCounts::from_pairs(test.iter().map(|r| (r.predicted_class, r.actual_label)));
        let probabilities: Vec<f64> = test.iter().map(|r| r.predicted_probability).collect();
        let labels: Vec<u8> = test.iter().map(|r| r.actual_label).collect();
        let auc = roc_auc(&probabilities, &labels).unwrap_or_else(|| {
            log::warn!("test set holds a single class, AUC undefined; reporting 0.0");
            0.0
        });
        ModelMetrics {
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            f1_score: cm.f1(),
            auc,
        }
    }
}

/// Pair importances with names and keep the `TOP_FEATURES` largest.
///
/// Equal importances keep feature order.
pub fn top_features(names: &[String], importance: &[f64]) -> Vec<FeatureImportance> {
    if names.len() != importance.len() {
        log::warn!(
            "{} feature names but {} importance scores; pairing the common prefix",
            names.len(),
            importance.len()
        );
    }
    let mut paired: Vec<FeatureImportance> = names
        .iter()
        .zip(importance)
        .map(|(name, &importance)| FeatureImportance {
            name: name.clone(),
            importance,
        })
        .collect();
    paired.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    paired.truncate(TOP_FEATURES);
    paired
}

pub fn generate(
    classifier: &dyn Classifier,
    feature_names: &[String],
    test: &[&ScoredRecord],
    stamp: RunStamp,
) -> ModelMetadata {
    let metrics = ModelMetrics::compute(test);
    let top_features = top_features(feature_names, &classifier.feature_importance());
    log::info!(
        "Model metrics on {} test items: accuracy {:.4}, auc {:.4}",
        test.len(),
        metrics.accuracy,
        metrics.auc
    );
    ModelMetadata {
        version: MODEL_VERSION.to_string(),
        last_updated: stamp.iso(),
        model_type: classifier.model_type().to_string(),
        num_features: feature_names.len(),
        metrics,
        top_features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{MetadataRecord, Partition};
    use crate::error::Result;
    use chrono::NaiveDate;
    use ndarray::ArrayView2;

    struct Fixed(Vec<f64>);

    impl Classifier for Fixed {
        fn model_type(&self) -> &str {
            "Fixed"
        }
        fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f64>> {
            Ok(vec![0.5; features.nrows()])
        }
        fn feature_importance(&self) -> Vec<f64> {
            self.0.clone()
        }
    }

    fn rec(predicted: u8, actual: u8, p: f64) -> ScoredRecord {
        ScoredRecord {
            object_id: 0,
            metadata: MetadataRecord::new(),
            predicted_probability: p,
            predicted_class: predicted,
            actual_label: actual,
            partition: Partition::Test,
        }
    }

    fn stamp() -> RunStamp {
        RunStamp(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap())
    }

    #[test]
    fn metrics_over_mixed_test_set() {
        let records = [rec(1, 1, 0.9), rec(1, 0, 0.8), rec(0, 1, 0.3), rec(0, 0, 0.1)];
        let refs: Vec<&ScoredRecord> = records.iter().collect();
        let m = ModelMetrics::compute(&refs);
        assert_eq!(m.accuracy, 0.5);
        assert_eq!(m.precision, 0.5);
        assert_eq!(m.recall, 0.5);
        assert_eq!(m.f1_score, 0.5);
        assert!((m.auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn single_class_auc_is_zero() {
        let records = [rec(1, 1, 0.9), rec(0, 1, 0.3)];
        let refs: Vec<&ScoredRecord> = records.iter().collect();
        assert_eq!(ModelMetrics::compute(&refs).auc, 0.0);
        assert_eq!(ModelMetrics::compute(&[]).auc, 0.0);
    }

    #[test]
    fn top_features_sorted_and_capped() {
        let names: Vec<String> = (0..40).map(|i| format!("f{i}")).collect();
        let importance: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let top = top_features(&names, &importance);
        assert_eq!(top.len(), TOP_FEATURES);
        assert_eq!(top[0].name, "f39");
        assert_eq!(top[29].name, "f10");
    }

    #[test]
    fn fewer_features_than_cap() {
        let names = vec!["a".to_string(), "b".to_string()];
        let meta = generate(&Fixed(vec![1.0, 3.0]), &names, &[], stamp());
        assert_eq!(meta.num_features, 2);
        assert_eq!(meta.model_type, "Fixed");
        assert_eq!(meta.version, "1.0");
        let order: Vec<&str> = meta.top_features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }
}
