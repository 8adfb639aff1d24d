//! Row-level delta computation between a source and target row

use crate::store::Row;
use std::collections::BTreeSet;

/// Classified difference between two rows.
///
/// The four sets are disjoint and their union is the union of both rows'
/// column sets. `added`/`removed` are schema drift (column present on one
/// side only); `changed`/`unchanged` partition the shared columns by typed
/// value equality.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Delta {
    /// Columns present on source but not on target.
    pub added: BTreeSet<String>,
    /// Columns present on target but not on source.
    pub removed: BTreeSet<String>,
    /// Columns present on both with differing values.
    pub changed: BTreeSet<String>,
    /// Columns present on both with equal values.
    pub unchanged: BTreeSet<String>,
}

impl Delta {
    /// Whether either side carries a column the other lacks.
    pub fn has_schema_drift(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// The columns an update would touch once `ignore` is excluded.
    pub fn updatable_columns(&self, ignore: &BTreeSet<String>) -> Vec<String> {
        self.changed
            .iter()
            .filter(|c| !ignore.contains(*c))
            .cloned()
            .collect()
    }
}

/// Compare two rows column by column.
///
/// Pure and deterministic: `diff(r, r)` yields everything unchanged, and
/// swapping the arguments swaps `added` with `removed` while keeping
/// `changed`/`unchanged` the same column sets.
pub fn diff(source: &Row, target: &Row) -> Delta {
    let mut delta = Delta::default();

    for (column, source_value) in source {
        match target.get(column) {
            None => {
                delta.added.insert(column.clone());
            }
            Some(target_value) if target_value == source_value => {
                delta.unchanged.insert(column.clone());
            }
            Some(_) => {
                delta.changed.insert(column.clone());
            }
        }
    }

    for column in target.keys() {
        if !source.contains_key(column) {
            delta.removed.insert(column.clone());
        }
    }

    delta
}
