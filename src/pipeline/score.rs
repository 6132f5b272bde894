use crate::classifier::Classifier;
use crate::data::model::FeatureMatrix;
use crate::error::{PipelineError, Result};

/// Default decision threshold on the positive-class probability.
pub const DEFAULT_THRESHOLD: f64 = 0.748;

/// Probabilities and thresholded classes, aligned with the scored rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub probabilities: Vec<f64>,
    pub predicted_class: Vec<u8>,
}

impl Scores {
    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }
}

/// Stateless wrapper turning classifier probabilities into class labels.
#[derive(Debug, Clone, Copy)]
pub struct BatchScorer {
    threshold: f64,
}

impl BatchScorer {
    pub fn new(threshold: f64) -> Self {
        BatchScorer { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 1 when `probability >= threshold`; the boundary is inclusive.
    pub fn classify(&self, probability: f64) -> u8 {
        u8::from(probability >= self.threshold)
    }

    /// Score every row of an aligned matrix, preserving row order.
    pub fn score(&self, classifier: &dyn Classifier, matrix: &FeatureMatrix) -> Result<Scores> {
        let probabilities = classifier.predict_proba(matrix.values())?;
        if probabilities.len() != matrix.nrows() {
            return Err(PipelineError::RowCountMismatch {
                left: "classifier output".into(),
                left_rows: probabilities.len(),
                right: "feature matrix".into(),
                right_rows: matrix.nrows(),
            });
        }
        if let Some((row, p)) = probabilities.iter().enumerate().find(|(_, p)| !p.is_finite()) {
            return Err(PipelineError::Model(format!(
                "classifier returned non-finite probability {p} for row {row}"
            )));
        }
        let predicted_class = probabilities.iter().map(|&p| self.classify(p)).collect();
        Ok(Scores {
            probabilities,
            predicted_class,
        })
    }
}

impl Default for BatchScorer {
    fn default() -> Self {
        BatchScorer::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, ArrayView2};

    /// Echoes the first column as the probability.
    struct Echo;

    impl Classifier for Echo {
        fn model_type(&self) -> &str {
            "echo"
        }
        fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f64>> {
            Ok(features.column(0).iter().map(|&v| v as f64).collect())
        }
        fn feature_importance(&self) -> Vec<f64> {
            vec![1.0]
        }
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let scorer = BatchScorer::new(0.5);
        assert_eq!(scorer.classify(0.5), 1);
        assert_eq!(scorer.classify(0.499_999), 0);
        assert_eq!(BatchScorer::default().classify(DEFAULT_THRESHOLD), 1);
    }

    #[test]
    fn scores_every_row_in_order() {
        let m = FeatureMatrix::new(array![[0.25f32], [0.75], [0.5]], vec!["p".into()]).unwrap();
        let scores = BatchScorer::new(0.5).score(&Echo, &m).unwrap();
        assert_eq!(scores.probabilities, vec![0.25, 0.75, 0.5]);
        assert_eq!(scores.predicted_class, vec![0, 1, 1]);
        assert_eq!(scores, BatchScorer::new(0.5).score(&Echo, &m).unwrap());
    }

    #[test]
    fn non_finite_probability_is_an_error() {
        let m = FeatureMatrix::new(array![[0.25f32], [f32::NAN]], vec!["p".into()]).unwrap();
        let err = BatchScorer::new(0.5).score(&Echo, &m).unwrap_err();
        assert!(matches!(err, PipelineError::Model(msg) if msg.contains("row 1")));
    }
}
