use std::collections::HashMap;
use std::fmt::Display;

use crate::models::{
    AlignmentTolerance,
    IonMode,
};

/// A unique feature position of the master list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterEntry {
    pub mz: f64,
    pub secondary_axis_value: f64,
    pub ion_mode: IonMode,
    pub origin_file_id: usize,
    pub origin_peak_id: usize,
    /// Position in insertion order, breaks ties when sorting.
    pub insertion_order: usize,
}

type BucketKey = (i64, i64);

/// Spatial hash of master entries over `(secondary, mz)` buckets.
///
/// Buckets are twice as wide as the tolerance on each axis, so a similarity
/// search only has to look at the neighbouring buckets.
#[derive(Debug, Clone)]
pub struct MasterIndex {
    buckets: HashMap<BucketKey, Vec<MasterEntry>>,
    tolerance: AlignmentTolerance,
    mz_bucket_width: f64,
    secondary_bucket_width: f64,
    mz_search_width: i64,
    secondary_search_width: i64,
    len: usize,
}

impl Display for MasterIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let largest = self.buckets.values().map(|x| x.len()).max().unwrap_or(0);
        write!(
            f,
            "MasterIndex: \n    len={},\n    buckets={},\n    largest_bucket={},\n    bucket_widths=(mz: {}, secondary: {})",
            self.len,
            self.buckets.len(),
            largest,
            self.mz_bucket_width,
            self.secondary_bucket_width,
        )
    }
}

fn bucket_coordinate(value: f64, width: f64) -> i64 {
    // Zero-width buckets give infinite/NaN coordinates, the saturating cast
    // piles everything in a handful of buckets instead of panicking.
    (value / width).ceil() as i64
}

fn search_width(tolerance: f64, bucket_width: f64) -> i64 {
    ((tolerance / bucket_width).ceil() as i64).max(1)
}

impl MasterIndex {
    pub fn new(tolerance: &AlignmentTolerance) -> Self {
        let mz_bucket_width = 2.0 * tolerance.mz_tolerance;
        let secondary_bucket_width = 2.0 * tolerance.secondary_tolerance;
        Self {
            buckets: HashMap::new(),
            tolerance: tolerance.clone(),
            mz_bucket_width,
            secondary_bucket_width,
            mz_search_width: search_width(tolerance.mz_tolerance, mz_bucket_width),
            secondary_search_width: search_width(
                tolerance.secondary_tolerance,
                secondary_bucket_width,
            ),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn key(&self, mz: f64, secondary: f64) -> BucketKey {
        (
            bucket_coordinate(secondary, self.secondary_bucket_width),
            bucket_coordinate(mz, self.mz_bucket_width),
        )
    }

    /// Inserts without checking for similar entries, used to seed the index
    /// with the reference run.
    pub fn insert_unchecked(&mut self, entry: MasterEntry) {
        let key = self.key(entry.mz, entry.secondary_axis_value);
        self.buckets.entry(key).or_default().push(entry);
        self.len += 1;
    }

    /// Whether any entry lies within tolerance of `(mz, secondary)` on both axes.
    pub fn contains_similar(&self, mz: f64, secondary: f64) -> bool {
        let (secondary_key, mz_key) = self.key(mz, secondary);
        for ds in -self.secondary_search_width..=self.secondary_search_width {
            for dm in -self.mz_search_width..=self.mz_search_width {
                let key = (secondary_key.saturating_add(ds), mz_key.saturating_add(dm));
                let Some(bucket) = self.buckets.get(&key) else {
                    continue;
                };
                if bucket.iter().any(|x| {
                    self.tolerance
                        .is_similar((x.mz, x.secondary_axis_value), (mz, secondary))
                }) {
                    return true;
                }
            }
        }
        false
    }

    /// Inserts the entry unless a similar one is already present.
    ///
    /// Returns whether the entry was inserted.
    pub fn try_insert(&mut self, entry: MasterEntry) -> bool {
        if self.contains_similar(entry.mz, entry.secondary_axis_value) {
            return false;
        }
        self.insert_unchecked(entry);
        true
    }

    /// Flattens the index into a list sorted by (mz, secondary axis).
    pub fn into_sorted_entries(self) -> Vec<MasterEntry> {
        let mut entries: Vec<MasterEntry> = self.buckets.into_values().flatten().collect();
        entries.sort_by(|a, b| {
            a.mz.total_cmp(&b.mz)
                .then(a.secondary_axis_value.total_cmp(&b.secondary_axis_value))
                .then(a.insertion_order.cmp(&b.insertion_order))
        });
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mz: f64, secondary: f64, insertion_order: usize) -> MasterEntry {
        MasterEntry {
            mz,
            secondary_axis_value: secondary,
            ion_mode: IonMode::Positive,
            origin_file_id: 0,
            origin_peak_id: insertion_order,
            insertion_order,
        }
    }

    fn tolerance() -> AlignmentTolerance {
        AlignmentTolerance::default()
            .with_mz_tolerance(0.01)
            .with_secondary_tolerance(0.1)
    }

    #[test]
    fn test_similar_entries_are_rejected_across_buckets() {
        let mut index = MasterIndex::new(&tolerance());
        assert!(index.try_insert(entry(100.0, 5.0, 0)));
        // Different buckets on both axes but still within tolerance.
        assert!(!index.try_insert(entry(100.0 + 0.0099, 5.0 + 0.099, 1)));
        assert!(!index.try_insert(entry(100.0 - 0.0099, 5.0 - 0.099, 2)));
        assert!(index.try_insert(entry(100.0 + 0.0101, 5.0, 3)));
        assert!(index.try_insert(entry(100.0, 5.0 + 0.1001, 4)));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_seeding_keeps_duplicates() {
        let mut index = MasterIndex::new(&tolerance());
        index.insert_unchecked(entry(100.0, 5.0, 0));
        index.insert_unchecked(entry(100.0, 5.0, 1));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_sorted_entries() {
        let mut index = MasterIndex::new(&tolerance());
        index.insert_unchecked(entry(300.0, 1.0, 0));
        index.insert_unchecked(entry(100.0, 9.0, 1));
        index.insert_unchecked(entry(100.0, 2.0, 2));
        index.insert_unchecked(entry(100.0, 2.0, 3));
        let entries = index.into_sorted_entries();
        let order: Vec<usize> = entries.iter().map(|x| x.insertion_order).collect();
        assert_eq!(order, vec![2, 3, 1, 0]);
    }

    #[test]
    fn test_zero_tolerance_does_not_panic() {
        let tol = AlignmentTolerance::default()
            .with_mz_tolerance(0.0)
            .with_secondary_tolerance(0.0);
        let mut index = MasterIndex::new(&tol);
        assert!(index.try_insert(entry(100.0, 5.0, 0)));
        assert!(!index.try_insert(entry(100.0, 5.0, 1)));
        assert!(index.try_insert(entry(100.1, 5.0, 2)));
        assert_eq!(index.into_sorted_entries().len(), 2);
    }
}
