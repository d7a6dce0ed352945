use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::Result;
use crate::models::ScanProperty;
use crate::utils::TupleRange;

/// Source of the picked features of every registered analysis file.
///
/// Files are identified by a dense index `0..num_files()`, which is also the
/// position of each file's slot in [`AlignmentSpotProperty::aligned_peak_features`].
///
/// [`AlignmentSpotProperty::aligned_peak_features`]: crate::models::AlignmentSpotProperty
pub trait DataAccessor: Sync {
    fn num_files(&self) -> usize;

    fn file_ids(&self) -> std::ops::Range<usize> {
        0..self.num_files()
    }

    /// Picked features of one file, in the order the peak picker produced them.
    fn scan_properties(&self, file_id: usize) -> Result<Vec<ScanProperty>>;
}

/// One point of an extracted trace along the secondary axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RawTracePoint {
    pub secondary_axis_value: f64,
    /// m/z of the most intense signal in the window for this scan.
    pub mz: f64,
    pub intensity: f64,
}

/// Windowed access to the raw spectra of each file, used only for gap filling.
///
/// Implementations may block on I/O, the gap filler calls them from a bounded
/// worker pool.
pub trait RawDataProvider: Sync {
    /// Extracts a trace restricted to both windows, ordered by the secondary axis.
    ///
    /// Returns an empty vector when the file has no coverage for the window.
    fn extract_trace(
        &self,
        file_id: usize,
        mz_range: TupleRange<f64>,
        secondary_range: TupleRange<f64>,
    ) -> Result<Vec<RawTracePoint>>;
}
