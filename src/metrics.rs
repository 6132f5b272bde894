//! Binary classification metrics over (predicted, actual) label pairs.
//!
//! Every ratio guards its denominator and reports 0.0 instead of dividing by
//! zero, matching scikit-learn's `zero_division=0`.

use std::cmp::Ordering;

// ---------------------------------------------------------------------------
// Confusion counts
// ---------------------------------------------------------------------------

/// 2×2 confusion matrix for the positive class `1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionCounts {
    /// Tally `(predicted, actual)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u8, u8)>) -> Self {
        let mut counts = ConfusionCounts::default();
        for (predicted, actual) in pairs {
            match (predicted, actual) {
                (1, 1) => counts.true_positives += 1,
                (1, _) => counts.false_positives += 1,
                (_, 1) => counts.false_negatives += 1,
                _ => counts.true_negatives += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn correct(&self) -> usize {
        self.true_positives + self.true_negatives
    }

    /// Correct / total; 0.0 for an empty set.
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// `TP / (TP + FP)`.
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// `TP / (TP + FN)`.
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// Harmonic mean of precision and recall.
    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

/// `num / den`, or 0.0 when `den` is zero.
pub fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

// ---------------------------------------------------------------------------
// ROC AUC
// ---------------------------------------------------------------------------

/// Area under the ROC curve, trapezoidal over distinct score thresholds.
///
/// Returns `None` when `labels` does not contain both classes: the curve is
/// undefined there.
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    debug_assert_eq!(scores.len(), labels.len());
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let p = positives as f64;
    let n = negatives as f64;
    let (mut tp, mut fp) = (0usize, 0usize);
    let (mut prev_fpr, mut prev_tpr) = (0.0, 0.0);
    let mut auc = 0.0;

    let mut i = 0;
    while i < order.len() {
        // all samples sharing a score form one threshold step
        let current = scores[order[i]];
        while i < order.len() && scores[order[i]].total_cmp(&current) == Ordering::Equal {
            if labels[order[i]] == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let fpr = fp as f64 / n;
        let tpr = tp as f64 / p;
        auc += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        prev_fpr = fpr;
        prev_tpr = tpr;
    }

    Some(auc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusion_counts_four_cases() {
        let cm = ConfusionCounts::from_pairs([(1, 0), (1, 1), (0, 0), (0, 1)]);
        assert_eq!(cm.true_positives, 1);
        assert_eq!(cm.false_positives, 1);
        assert_eq!(cm.true_negatives, 1);
        assert_eq!(cm.false_negatives, 1);
        assert_eq!(cm.accuracy(), 0.5);
        assert_eq!(cm.precision(), 0.5);
        assert_eq!(cm.recall(), 0.5);
        assert_eq!(cm.f1(), 0.5);
    }

    #[test]
    fn empty_and_degenerate_ratios_are_zero() {
        let cm = ConfusionCounts::default();
        assert_eq!(cm.accuracy(), 0.0);
        assert_eq!(cm.precision(), 0.0);
        assert_eq!(cm.f1(), 0.0);

        let all_negative = ConfusionCounts::from_pairs([(0, 0), (0, 0)]);
        assert_eq!(all_negative.accuracy(), 1.0);
        assert_eq!(all_negative.recall(), 0.0);
    }

    #[test]
    fn auc_perfect_random_and_inverted() {
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &[1, 1, 0, 0]), Some(1.0));
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &[1, 1, 0, 0]), Some(0.0));
        assert_eq!(roc_auc(&[0.5, 0.5, 0.5, 0.5], &[1, 0, 1, 0]), Some(0.5));
    }

    #[test]
    fn auc_counts_ties_as_half() {
        // one positive tied with one negative, one clean win
        let auc = roc_auc(&[0.7, 0.7, 0.3], &[1, 0, 0]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn auc_single_class_is_undefined() {
        assert_eq!(roc_auc(&[0.3, 0.9], &[1, 1]), None);
        assert_eq!(roc_auc(&[], &[]), None);
    }

    #[test]
    fn auc_terminates_on_nan_scores() {
        // NaN sorts above every finite score and forms its own step
        assert_eq!(roc_auc(&[f64::NAN, 0.9, 0.1], &[1, 1, 0]), Some(1.0));
    }
}
