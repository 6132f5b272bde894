use ndarray::Axis;

use super::model::FeatureMatrix;
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Column drop plan: names resolved once, removed by position everywhere
// ---------------------------------------------------------------------------

/// Columns to delete from every matrix of a run.
///
/// Names are looked up once against the training-time column list; the
/// resulting positions are then applied to each matrix, so all partitions
/// lose exactly the same columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDrop {
    source_width: usize,
    /// Ascending positions to remove.
    drop_indices: Vec<usize>,
    /// Column names that survive, in original order.
    kept_columns: Vec<String>,
}

impl ColumnDrop {
    /// Resolve `remove` against `columns`. Unknown names are ignored.
    pub fn plan(columns: &[String], remove: &[String]) -> Self {
        let mut drop_indices: Vec<usize> = remove
            .iter()
            .filter_map(|name| columns.iter().position(|c| c == name))
            .collect();
        drop_indices.sort_unstable();
        drop_indices.dedup();

        for name in remove {
            if !columns.contains(name) {
                log::debug!("drop column '{name}' not in feature set, ignoring");
            }
        }

        let kept_columns = columns
            .iter()
            .enumerate()
            .filter(|(i, _)| drop_indices.binary_search(i).is_err())
            .map(|(_, c)| c.clone())
            .collect();

        ColumnDrop {
            source_width: columns.len(),
            drop_indices,
            kept_columns,
        }
    }

    pub fn drop_indices(&self) -> &[usize] {
        &self.drop_indices
    }

    /// Column names after alignment.
    pub fn kept_columns(&self) -> &[String] {
        &self.kept_columns
    }

    /// Return a new matrix without the planned columns. The input is untouched.
    pub fn apply(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        if matrix.ncols() != self.source_width {
            return Err(PipelineError::FeatureCountMismatch {
                context: "column drop".into(),
                expected: self.source_width,
                found: matrix.ncols(),
            });
        }
        let keep: Vec<usize> = (0..self.source_width)
            .filter(|i| self.drop_indices.binary_search(i).is_err())
            .collect();
        let values = matrix.values().select(Axis(1), &keep);
        FeatureMatrix::new(values, self.kept_columns.clone())
    }
}

/// Remove `remove` from a single matrix, identified by name.
pub fn align(matrix: &FeatureMatrix, remove: &[String]) -> Result<FeatureMatrix> {
    ColumnDrop::plan(matrix.columns(), remove).apply(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> FeatureMatrix {
        FeatureMatrix::new(
            array![[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]],
            names(&["a", "isPublicDomain", "c", "accessionYear"]),
        )
        .unwrap()
    }

    #[test]
    fn drops_named_columns_and_keeps_order() {
        let m = sample();
        let out = align(&m, &names(&["accessionYear", "isPublicDomain"])).unwrap();
        assert_eq!(out.columns(), &names(&["a", "c"])[..]);
        assert_eq!(out.values(), array![[1.0f32, 3.0], [5.0, 7.0]]);
        assert_eq!(out.nrows(), m.nrows());
    }

    #[test]
    fn unknown_columns_are_ignored() {
        let m = sample();
        let out = align(&m, &names(&["isTimelineWork", "c"])).unwrap();
        assert_eq!(out.ncols(), 3);
        assert_eq!(out.columns(), &names(&["a", "isPublicDomain", "accessionYear"])[..]);
    }

    #[test]
    fn empty_intersection_returns_an_equal_copy() {
        let m = sample();
        let out = align(&m, &names(&["nope"])).unwrap();
        assert_eq!(out, m);
        // the caller's matrix is still intact
        assert_eq!(m.ncols(), 4);
    }

    #[test]
    fn column_count_shrinks_by_intersection_size() {
        let m = sample();
        for remove in [
            names(&[]),
            names(&["a"]),
            names(&["a", "a"]),
            names(&["a", "c", "zzz"]),
            names(&["a", "isPublicDomain", "c", "accessionYear"]),
        ] {
            let hit = m
                .columns()
                .iter()
                .filter(|c| remove.contains(c))
                .count();
            let out = align(&m, &remove).unwrap();
            assert_eq!(out.ncols(), m.ncols() - hit, "remove = {remove:?}");
            assert_eq!(out.nrows(), m.nrows());
        }
    }

    #[test]
    fn same_plan_applies_to_every_matrix() {
        let plan = ColumnDrop::plan(sample().columns(), &names(&["isPublicDomain"]));
        assert_eq!(plan.drop_indices(), &[1]);
        let other = FeatureMatrix::new(
            array![[9.0, 9.5, 10.0, 11.0]],
            names(&["a", "isPublicDomain", "c", "accessionYear"]),
        )
        .unwrap();
        assert_eq!(plan.apply(&other).unwrap().values(), array![[9.0f32, 10.0, 11.0]]);
    }

    #[test]
    fn plan_rejects_matrix_of_other_width() {
        let plan = ColumnDrop::plan(&names(&["a", "b"]), &names(&["a"]));
        let err = plan.apply(&sample()).unwrap_err();
        assert!(matches!(err, PipelineError::FeatureCountMismatch { expected: 2, found: 4, .. }));
    }
}
