//! Pre-trained binary classifier behind a narrow scoring interface.
//!
//! The pipeline only needs a positive-class probability per row and one
//! importance score per training feature; nothing downstream depends on the
//! model family.

pub mod catboost;

use ndarray::ArrayView2;

use crate::error::Result;

pub use catboost::CatBoostModel;

/// A read-only, already trained binary classifier.
pub trait Classifier {
    /// Human readable model family, shown on the website.
    fn model_type(&self) -> &str;

    /// Positive-class probability for every row, in row order.
    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f64>>;

    /// One importance score per training feature, in feature order.
    fn feature_importance(&self) -> Vec<f64>;
}
