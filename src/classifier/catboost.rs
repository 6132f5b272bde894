//! CatBoost model loaded from its JSON export
//! (`model.save_model(path, format="json")`).
//!
//! Only float-feature oblivious trees are evaluated, which covers every
//! model trained on a purely numeric matrix:
//!
//! ```text
//! leaf index  = Σ_i  [x[feature(split_i)] > border_i] << i
//! raw score   = scale * Σ_trees leaf_values[leaf index] + bias
//! probability = 1 / (1 + e^-raw)
//! ```

use std::path::Path;

use anyhow::Context;
use ndarray::ArrayView2;
use serde::Deserialize;

use super::Classifier;
use crate::data::loader::require_file;
use crate::error::{PipelineError, Result};

/// CatBoost caps oblivious tree depth at 16.
const MAX_TREE_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// JSON export schema (the subset we evaluate)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ModelJson {
    #[serde(default)]
    features_info: FeaturesInfo,
    oblivious_trees: Vec<TreeJson>,
    #[serde(default)]
    scale_and_bias: Option<(f64, Vec<f64>)>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FeaturesInfo {
    #[serde(default)]
    float_features: Vec<FloatFeatureJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct FloatFeatureJson {
    #[serde(default)]
    feature_index: usize,
    /// Column of the input matrix; absent in some older exports.
    flat_feature_index: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct TreeJson {
    splits: Vec<SplitJson>,
    leaf_values: Vec<f64>,
    #[serde(default)]
    leaf_weights: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct SplitJson {
    float_feature_index: Option<usize>,
    border: Option<f64>,
    #[serde(default)]
    split_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Evaluated model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Split {
    /// Input column compared against `border`.
    column: usize,
    border: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct ObliviousTree {
    splits: Vec<Split>,
    leaf_values: Vec<f64>,
    leaf_weights: Vec<f64>,
}

impl ObliviousTree {
    fn leaf_index(&self, row: &[f32]) -> usize {
        self.splits
            .iter()
            .enumerate()
            // NaN compares false: missing values fall below every border
            .filter(|(_, s)| row[s.column] > s.border)
            .fold(0, |idx, (depth, _)| idx | (1 << depth))
    }
}

/// An oblivious-tree ensemble with a logistic output.
#[derive(Debug, Clone, PartialEq)]
pub struct CatBoostModel {
    trees: Vec<ObliviousTree>,
    scale: f64,
    bias: f64,
    /// Number of input columns the model was trained on.
    num_features: usize,
}

impl CatBoostModel {
    /// Load a model from a CatBoost JSON export on disk.
    pub fn load(path: &Path) -> Result<Self> {
        require_file(path)?;
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let model = Self::from_json(&text).map_err(|e| match e {
            PipelineError::Model(message) => PipelineError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        log::info!(
            "Model loaded from {} ({} trees, {} features)",
            path.display(),
            model.trees.len(),
            model.num_features
        );
        Ok(model)
    }

    /// Parse a CatBoost JSON export held in memory.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: ModelJson = serde_json::from_str(json)
            .context("not a CatBoost JSON export")
            .map_err(|e| PipelineError::Model(format!("{e:#}")))?;
        Self::from_export(raw)
    }

    fn from_export(raw: ModelJson) -> Result<Self> {
        // float_feature_index in a split refers to a position in
        // features_info.float_features, not directly to an input column.
        let columns: Vec<usize> = raw
            .features_info
            .float_features
            .iter()
            .map(|f| f.flat_feature_index.unwrap_or(f.feature_index))
            .collect();
        let column_of = |idx: usize| columns.get(idx).copied().unwrap_or(idx);

        let mut trees = Vec::with_capacity(raw.oblivious_trees.len());
        for (t, tree) in raw.oblivious_trees.into_iter().enumerate() {
            let mut splits = Vec::with_capacity(tree.splits.len());
            for split in tree.splits {
                if let Some(kind) = split.split_type.as_deref() {
                    if kind != "FloatFeature" {
                        return Err(PipelineError::Model(format!(
                            "tree {t}: unsupported split type '{kind}'"
                        )));
                    }
                }
                let (Some(feature), Some(border)) = (split.float_feature_index, split.border)
                else {
                    return Err(PipelineError::Model(format!(
                        "tree {t}: split without float_feature_index/border"
                    )));
                };
                splits.push(Split {
                    column: column_of(feature),
                    border: border as f32,
                });
            }

            if splits.len() > MAX_TREE_DEPTH {
                return Err(PipelineError::Model(format!(
                    "tree {t}: depth {} exceeds {MAX_TREE_DEPTH}",
                    splits.len()
                )));
            }
            let leaves = 1usize << splits.len();
            if tree.leaf_values.len() != leaves {
                return Err(PipelineError::Model(format!(
                    "tree {t}: depth {} needs {leaves} leaf values, found {}",
                    splits.len(),
                    tree.leaf_values.len()
                )));
            }
            let leaf_weights = if tree.leaf_weights.len() == leaves {
                tree.leaf_weights
            } else {
                vec![1.0; leaves]
            };
            trees.push(ObliviousTree {
                splits,
                leaf_values: tree.leaf_values,
                leaf_weights,
            });
        }

        let max_split_column = trees
            .iter()
            .flat_map(|t| t.splits.iter().map(|s| s.column + 1))
            .max()
            .unwrap_or(0);
        let declared = columns.iter().map(|c| c + 1).max().unwrap_or(0);
        let num_features = declared.max(max_split_column);

        let (scale, bias) = match raw.scale_and_bias {
            Some((scale, biases)) => (scale, biases.first().copied().unwrap_or(0.0)),
            None => (1.0, 0.0),
        };

        Ok(CatBoostModel {
            trees,
            scale,
            bias,
            num_features,
        })
    }

    /// Number of input columns the model reads.
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    fn raw_score(&self, row: &[f32]) -> f64 {
        let sum: f64 = self
            .trees
            .iter()
            .map(|tree| tree.leaf_values[tree.leaf_index(row)])
            .sum();
        self.scale * sum + self.bias
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl Classifier for CatBoostModel {
    fn model_type(&self) -> &str {
        "CatBoost Classifier"
    }

    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f64>> {
        if features.ncols() < self.num_features {
            return Err(PipelineError::FeatureCountMismatch {
                context: "classifier input".into(),
                expected: self.num_features,
                found: features.ncols(),
            });
        }
        let mut row_buf = Vec::with_capacity(features.ncols());
        Ok(features
            .rows()
            .into_iter()
            .map(|row| {
                row_buf.clear();
                row_buf.extend(row.iter().copied());
                sigmoid(self.raw_score(&row_buf))
            })
            .collect())
    }

    /// PredictionValuesChange importance, normalised to sum to 100.
    fn feature_importance(&self) -> Vec<f64> {
        let mut importance = vec![0.0; self.num_features];
        for tree in &self.trees {
            for (depth, split) in tree.splits.iter().enumerate() {
                let bit = 1usize << depth;
                let mut change = 0.0;
                for left in (0..tree.leaf_values.len()).filter(|i| i & bit == 0) {
                    let right = left | bit;
                    let (v1, w1) = (tree.leaf_values[left], tree.leaf_weights[left]);
                    let (v2, w2) = (tree.leaf_values[right], tree.leaf_weights[right]);
                    let total = w1 + w2;
                    if total <= 0.0 {
                        continue;
                    }
                    let avg = (v1 * w1 + v2 * w2) / total;
                    change += w1 * (v1 - avg).powi(2) + w2 * (v2 - avg).powi(2);
                }
                importance[split.column] += change;
            }
        }

        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            for v in &mut importance {
                *v = *v * 100.0 / total;
            }
        }
        importance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // Two depth-1 trees over two features, feature 1 splits harder.
    const MODEL: &str = r#"{
        "features_info": {"float_features": [
            {"feature_index": 0, "flat_feature_index": 0, "borders": [0.5]},
            {"feature_index": 1, "flat_feature_index": 1, "borders": [10.0]}
        ]},
        "oblivious_trees": [
            {"splits": [{"float_feature_index": 0, "border": 0.5, "split_type": "FloatFeature"}],
             "leaf_values": [-1.0, 1.0], "leaf_weights": [5, 5]},
            {"splits": [{"float_feature_index": 1, "border": 10.0, "split_type": "FloatFeature"}],
             "leaf_values": [-2.0, 2.0], "leaf_weights": [5, 5]}
        ],
        "scale_and_bias": [1.0, [0.0]]
    }"#;

    #[test]
    fn scores_follow_leaf_sums() {
        let model = CatBoostModel::from_json(MODEL).unwrap();
        let probs = model
            .predict_proba(array![[0.0f32, 0.0], [1.0, 20.0], [1.0, 0.0]].view())
            .unwrap();
        assert!((probs[0] - sigmoid(-3.0)).abs() < 1e-12);
        assert!((probs[1] - sigmoid(3.0)).abs() < 1e-12);
        assert!((probs[2] - sigmoid(-1.0)).abs() < 1e-12);
    }

    #[test]
    fn border_itself_goes_left_and_nan_goes_left() {
        let model = CatBoostModel::from_json(MODEL).unwrap();
        let probs = model
            .predict_proba(array![[0.5f32, f32::NAN]].view())
            .unwrap();
        assert!((probs[0] - sigmoid(-3.0)).abs() < 1e-12);
    }

    #[test]
    fn scoring_is_deterministic() {
        let model = CatBoostModel::from_json(MODEL).unwrap();
        let x = array![[0.7f32, 3.0], [0.1, 11.0]];
        assert_eq!(
            model.predict_proba(x.view()).unwrap(),
            model.predict_proba(x.view()).unwrap()
        );
    }

    #[test]
    fn importance_is_normalised_and_ranks_stronger_split_first() {
        let model = CatBoostModel::from_json(MODEL).unwrap();
        let imp = model.feature_importance();
        assert_eq!(imp.len(), model.num_features());
        assert_eq!(imp.len(), 2);
        assert!((imp.iter().sum::<f64>() - 100.0).abs() < 1e-9);
        assert!(imp[1] > imp[0]);
        assert!((imp[0] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn too_narrow_input_is_rejected() {
        let model = CatBoostModel::from_json(MODEL).unwrap();
        let err = model.predict_proba(array![[1.0f32]].view()).unwrap_err();
        assert!(matches!(err, PipelineError::FeatureCountMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn leaf_count_must_match_depth() {
        let bad = r#"{"oblivious_trees": [{"splits": [{"float_feature_index": 0, "border": 1.0}],
                      "leaf_values": [0.1]}]}"#;
        assert!(matches!(CatBoostModel::from_json(bad), Err(PipelineError::Model(_))));
    }

    #[test]
    fn categorical_splits_are_unsupported() {
        let bad = r#"{"oblivious_trees": [{"splits": [{"split_index": 0, "split_type": "OnlineCtr"}],
                      "leaf_values": [0.1, 0.2]}]}"#;
        assert!(matches!(CatBoostModel::from_json(bad), Err(PipelineError::Model(_))));
    }

    #[test]
    fn trees_deeper_than_sixteen_are_rejected() {
        let splits: Vec<_> = (0..64)
            .map(|i| serde_json::json!({"float_feature_index": 0, "border": i as f64}))
            .collect();
        let bad = serde_json::json!({
            "oblivious_trees": [{"splits": splits, "leaf_values": [0.0]}]
        });
        let err = CatBoostModel::from_json(&bad.to_string()).unwrap_err();
        assert!(matches!(err, PipelineError::Model(msg) if msg.contains("exceeds 16")));
    }
}
