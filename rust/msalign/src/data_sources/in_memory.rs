use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::{
    AlignmentError,
    Result,
};
use crate::models::ScanProperty;
use crate::traits::{
    DataAccessor,
    RawDataProvider,
    RawTracePoint,
};
use crate::utils::TupleRange;

/// Feature lists held in memory, one vector per file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryAccessor {
    pub files: Vec<Vec<ScanProperty>>,
}

impl InMemoryAccessor {
    pub fn new(files: Vec<Vec<ScanProperty>>) -> Self {
        Self { files }
    }
}

impl DataAccessor for InMemoryAccessor {
    fn num_files(&self) -> usize {
        self.files.len()
    }

    fn scan_properties(&self, file_id: usize) -> Result<Vec<ScanProperty>> {
        self.files
            .get(file_id)
            .cloned()
            .ok_or(AlignmentError::UnknownFile {
                file_id,
                registered: self.files.len(),
            })
    }
}

/// A centroided spectrum at one position of the secondary axis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawSpectrum {
    pub secondary_axis_value: f64,
    /// `(mz, intensity)` pairs, in any order.
    pub peaks: Vec<(f64, f64)>,
}

/// Raw spectra held in memory, one vector per file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryRawData {
    files: Vec<Vec<RawSpectrum>>,
}

impl InMemoryRawData {
    pub fn new(mut files: Vec<Vec<RawSpectrum>>) -> Self {
        for spectra in files.iter_mut() {
            spectra.sort_by(|a, b| a.secondary_axis_value.total_cmp(&b.secondary_axis_value));
        }
        Self { files }
    }

    pub fn num_files(&self) -> usize {
        self.files.len()
    }
}

impl RawDataProvider for InMemoryRawData {
    fn extract_trace(
        &self,
        file_id: usize,
        mz_range: TupleRange<f64>,
        secondary_range: TupleRange<f64>,
    ) -> Result<Vec<RawTracePoint>> {
        // A file we know nothing about simply has no coverage.
        let Some(spectra) = self.files.get(file_id) else {
            return Ok(Vec::new());
        };
        let start =
            spectra.partition_point(|x| x.secondary_axis_value < secondary_range.start());
        let mid_mz = 0.5 * (mz_range.start() + mz_range.end());

        let trace = spectra[start..]
            .iter()
            .take_while(|x| x.secondary_axis_value <= secondary_range.end())
            .map(|spectrum| {
                let mut intensity = 0.0;
                let mut top: Option<(f64, f64)> = None;
                for &(mz, inten) in spectrum.peaks.iter() {
                    if !mz_range.contains(mz) {
                        continue;
                    }
                    intensity += inten;
                    if top.is_none_or(|(_, best)| inten > best) {
                        top = Some((mz, inten));
                    }
                }
                RawTracePoint {
                    secondary_axis_value: spectrum.secondary_axis_value,
                    mz: top.map(|x| x.0).unwrap_or(mid_mz),
                    intensity,
                }
            })
            .collect();
        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(secondary: f64, peaks: Vec<(f64, f64)>) -> RawSpectrum {
        RawSpectrum {
            secondary_axis_value: secondary,
            peaks,
        }
    }

    #[test]
    fn test_extract_trace_respects_both_windows() {
        let raw = InMemoryRawData::new(vec![vec![
            spectrum(2.0, vec![(100.0, 5.0), (100.004, 10.0), (100.5, 50.0)]),
            spectrum(1.0, vec![(100.001, 3.0)]),
            spectrum(3.0, vec![(100.0, 7.0)]),
            spectrum(4.0, vec![(100.0, 9.0)]),
        ]]);
        let trace = raw
            .extract_trace(
                0,
                TupleRange::try_new(99.99, 100.01).unwrap(),
                TupleRange::try_new(1.0, 3.0).unwrap(),
            )
            .unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0].secondary_axis_value, 1.0);
        assert_eq!(trace[1].intensity, 15.0);
        assert_eq!(trace[1].mz, 100.004);
        assert_eq!(trace[2].intensity, 7.0);
    }

    #[test]
    fn test_extract_trace_without_coverage_is_empty() {
        let raw = InMemoryRawData::new(vec![vec![spectrum(10.0, vec![(100.0, 5.0)])]]);
        let mz_range = TupleRange::try_new(99.99, 100.01).unwrap();
        let rt_range = TupleRange::try_new(1.0, 3.0).unwrap();
        assert!(raw.extract_trace(0, mz_range, rt_range).unwrap().is_empty());
        assert!(raw.extract_trace(5, mz_range, rt_range).unwrap().is_empty());
    }

    #[test]
    fn test_accessor_unknown_file_is_error() {
        let accessor = InMemoryAccessor::new(vec![vec![]]);
        assert_eq!(accessor.num_files(), 1);
        assert!(accessor.scan_properties(0).unwrap().is_empty());
        assert!(accessor.scan_properties(1).is_err());
    }
}
