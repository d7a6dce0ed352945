use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
    warn,
};

use super::smoothing::{
    SmoothingMethod,
    apply_smoothing,
};
use crate::errors::Result;
use crate::models::{
    AlignedPeakFeature,
    AlignmentSpotProperty,
    AlignmentTolerance,
    FeatureStatus,
};
use crate::progress::{
    ParallelProgress,
    PipelineStage,
    ProgressReporter,
};
use crate::traits::{
    RawDataProvider,
    RawTracePoint,
};
use crate::utils::abs_tol_range;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GapFillingConfig {
    pub smoothing: SmoothingMethod,
    /// Half width of the extraction window, in units of the expected peak width.
    pub window_width_factor: f64,
    /// Worker threads for the filling pool, 0 lets rayon decide.
    pub threads: usize,
}

impl Default for GapFillingConfig {
    fn default() -> Self {
        Self {
            smoothing: SmoothingMethod::default(),
            window_width_factor: 1.5,
            threads: 0,
        }
    }
}

/// Where a spot's missing features are looked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpectedPosition {
    pub mass: f64,
    pub secondary_axis_center: f64,
    pub peak_width: f64,
}

/// Summary of one gap filling run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapFillingReport {
    pub spots_with_gaps: usize,
    pub missing_before: usize,
    pub filled: usize,
}

#[derive(Debug, Clone)]
pub struct GapFiller {
    tolerance: AlignmentTolerance,
    config: GapFillingConfig,
}

impl GapFiller {
    pub fn new(tolerance: AlignmentTolerance, config: GapFillingConfig) -> Self {
        Self { tolerance, config }
    }

    /// Expected position of the spot's missing features, from the detected ones.
    ///
    /// Mass comes from the most intense feature, the center is the mean apex
    /// position and the width is the widest detected peak. Spots without any
    /// populated feature have no expected position.
    pub fn expected_position(&self, spot: &AlignmentSpotProperty) -> Option<ExpectedPosition> {
        let mass = spot.most_intense_feature()?.mass;
        let (secondary_sum, count, max_width) = spot.populated_features().fold(
            (0.0, 0usize, 0.0f64),
            |(s, c, w), x| (s + x.secondary_axis_value, c + 1, w.max(x.peak_width)),
        );
        let peak_width = if max_width > 0.0 {
            max_width
        } else {
            self.tolerance.secondary_tolerance
        };
        Some(ExpectedPosition {
            mass,
            secondary_axis_center: secondary_sum / count as f64,
            peak_width,
        })
    }

    /// Re-extracts one file's signal around the expected position.
    ///
    /// Returns `None` when the file has no coverage, the provider fails, or
    /// (unless forced insertion is on) no usable apex is found.
    pub fn fill_feature(
        &self,
        provider: &dyn RawDataProvider,
        expected: &ExpectedPosition,
        file_id: usize,
        master_peak_id: usize,
    ) -> Option<AlignedPeakFeature> {
        let mz_range = self.tolerance.mz_range(expected.mass);
        let secondary_range = abs_tol_range(
            expected.secondary_axis_center,
            self.config.window_width_factor * expected.peak_width,
        );
        let trace = match provider.extract_trace(file_id, mz_range, secondary_range) {
            Ok(x) => x,
            Err(e) => {
                warn!(
                    "Unable to extract trace for file {} at mz {:.4}: {}",
                    file_id, expected.mass, e
                );
                return None;
            }
        };
        if trace.is_empty() {
            return None;
        }

        let intensities: Vec<f64> = trace.iter().map(|x| x.intensity).collect();
        let smoothed = apply_smoothing(&intensities, &self.config.smoothing);
        let apex = closest_local_maximum(&trace, &smoothed, expected.secondary_axis_center)
            .or_else(|| {
                if self.tolerance.force_insert_on_gap_fill {
                    highest_point(&trace, &smoothed, expected.secondary_axis_center)
                } else {
                    None
                }
            })?;

        let (left, right) = peak_edges(&smoothed, apex);
        let point = &trace[apex];
        let mass = if point.mz.is_finite() && point.mz > 0.0 {
            point.mz
        } else {
            expected.mass
        };
        Some(AlignedPeakFeature {
            file_id,
            master_peak_id,
            peak_id: None,
            mass,
            secondary_axis_value: point.secondary_axis_value,
            apex_intensity: smoothed[apex].max(0.0),
            peak_width: trace[right].secondary_axis_value - trace[left].secondary_axis_value,
            status: FeatureStatus::GapFilled,
        })
    }

    /// Fills every missing feature of one spot, returns how many were filled.
    pub fn fill_spot(&self, provider: &dyn RawDataProvider, spot: &mut AlignmentSpotProperty) -> usize {
        let Some(expected) = self.expected_position(spot) else {
            return 0;
        };
        let master_peak_id = spot.master_alignment_id;
        let mut filled = 0;
        for file_id in spot.missing_file_ids() {
            if let Some(feature) = self.fill_feature(provider, &expected, file_id, master_peak_id) {
                spot.aligned_peak_features[file_id] = feature;
                filled += 1;
            }
        }
        filled
    }

    /// Fills the gaps of all spots on a bounded worker pool.
    ///
    /// Spot centers are left as they were, they keep describing the
    /// detected features only.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn fill(
        &self,
        provider: &dyn RawDataProvider,
        spots: &mut [AlignmentSpotProperty],
        progress: &dyn ProgressReporter,
    ) -> Result<GapFillingReport> {
        let spots_with_gaps = spots
            .iter()
            .filter(|x| !x.missing_file_ids().is_empty())
            .count();
        let missing_before: usize = spots.iter().map(|x| x.missing_file_ids().len()).sum();
        let total = spots.len();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()?;
        debug!(
            "Gap filling {} spots on {} threads",
            spots_with_gaps,
            pool.current_num_threads()
        );

        let tracker = ParallelProgress::new(progress, PipelineStage::GapFilling, total);
        let filled: usize = pool.install(|| {
            spots
                .par_iter_mut()
                .map(|spot| {
                    if tracker.is_cancelled() {
                        return 0;
                    }
                    let filled = self.fill_spot(provider, spot);
                    tracker.tick();
                    filled
                })
                .sum()
        });
        tracker.finish()?;

        let report = GapFillingReport {
            spots_with_gaps,
            missing_before,
            filled,
        };
        info!(
            "Gap filling recovered {} of {} missing features",
            report.filled, report.missing_before
        );
        Ok(report)
    }
}

/// A positive point higher than its left neighbour and at least as high as
/// its right one. Missing neighbours at the trace edges never disqualify.
fn is_usable_apex(smoothed: &[f64], i: usize) -> bool {
    smoothed[i] > 0.0
        && (i == 0 || smoothed[i] > smoothed[i - 1])
        && smoothed.get(i + 1).is_none_or(|&next| smoothed[i] >= next)
}

/// Index of the usable apex closest to `center`.
fn closest_local_maximum(trace: &[RawTracePoint], smoothed: &[f64], center: f64) -> Option<usize> {
    (0..smoothed.len())
        .filter(|&i| is_usable_apex(smoothed, i))
        .min_by(|&a, &b| distance_to(trace, a, center).total_cmp(&distance_to(trace, b, center)))
}

fn distance_to(trace: &[RawTracePoint], i: usize, center: f64) -> f64 {
    (trace[i].secondary_axis_value - center).abs()
}

/// Highest smoothed point, ties go to the point closest to `center`.
fn highest_point(trace: &[RawTracePoint], smoothed: &[f64], center: f64) -> Option<usize> {
    (0..smoothed.len()).min_by(|&a, &b| {
        smoothed[b]
            .total_cmp(&smoothed[a])
            .then(distance_to(trace, a, center).total_cmp(&distance_to(trace, b, center)))
    })
}

/// Walks down from the apex on both sides until the signal stops decreasing.
fn peak_edges(smoothed: &[f64], apex: usize) -> (usize, usize) {
    let mut left = apex;
    while left > 0 && smoothed[left - 1] < smoothed[left] {
        left -= 1;
    }
    let mut right = apex;
    while right + 1 < smoothed.len() && smoothed[right + 1] < smoothed[right] {
        right += 1;
    }
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AlignmentError;
    use crate::data_sources::{
        InMemoryRawData,
        RawSpectrum,
    };
    use crate::models::IonMode;
    use crate::progress::NoProgress;

    fn tolerance() -> AlignmentTolerance {
        AlignmentTolerance::default()
            .with_mz_tolerance(0.01)
            .with_secondary_tolerance(0.1)
    }

    fn spot_with_file_a() -> AlignmentSpotProperty {
        let mut spot = AlignmentSpotProperty::new(0, 400.0, 10.0, IonMode::Positive, 2);
        spot.aligned_peak_features[0] = AlignedPeakFeature {
            file_id: 0,
            master_peak_id: 0,
            peak_id: Some(3),
            mass: 400.0,
            secondary_axis_value: 10.0,
            apex_intensity: 5000.0,
            peak_width: 0.2,
            status: FeatureStatus::Detected,
        };
        spot
    }

    /// A gaussian elution profile in file 1 around `apex`, plus an unrelated mass.
    fn raw_with_peak(apex: f64, mz: f64) -> InMemoryRawData {
        let spectra = (0..41)
            .map(|i| {
                let t = 9.6 + i as f64 * 0.02;
                let intensity = 1000.0 * (-0.5 * ((t - apex) / 0.05f64).powi(2)).exp();
                RawSpectrum {
                    secondary_axis_value: t,
                    peaks: vec![(mz, intensity), (450.0, 10_000.0)],
                }
            })
            .collect();
        InMemoryRawData::new(vec![Vec::new(), spectra])
    }

    #[test]
    fn test_expected_position() {
        let filler = GapFiller::new(tolerance(), GapFillingConfig::default());
        let expected = filler.expected_position(&spot_with_file_a()).unwrap();
        assert_eq!(expected.mass, 400.0);
        assert_eq!(expected.secondary_axis_center, 10.0);
        assert_eq!(expected.peak_width, 0.2);

        let empty = AlignmentSpotProperty::new(0, 400.0, 10.0, IonMode::Positive, 2);
        assert!(filler.expected_position(&empty).is_none());
    }

    #[test]
    fn test_fills_from_covered_window() {
        let filler = GapFiller::new(tolerance(), GapFillingConfig::default());
        let raw = raw_with_peak(10.04, 400.004);
        let mut spots = vec![spot_with_file_a()];
        let report = filler.fill(&raw, &mut spots, &NoProgress).unwrap();
        assert_eq!(report.filled, 1);
        assert_eq!(report.missing_before, 1);

        let feature = &spots[0].aligned_peak_features[1];
        assert_eq!(feature.status, FeatureStatus::GapFilled);
        assert!((feature.mass - 400.0).abs() <= 0.01);
        assert!((feature.secondary_axis_value - 10.04).abs() < 0.021);
        assert!(feature.apex_intensity > 0.0);
        assert!(feature.peak_width > 0.0);
        // Detected feature untouched.
        assert_eq!(spots[0].aligned_peak_features[0].status, FeatureStatus::Detected);
    }

    #[test]
    fn test_no_coverage_leaves_slot_empty() {
        let filler = GapFiller::new(tolerance(), GapFillingConfig::default());
        // Signal only at a different mass.
        let raw = raw_with_peak(10.0, 401.0);
        let mut spots = vec![spot_with_file_a()];
        let report = filler.fill(&raw, &mut spots, &NoProgress).unwrap();
        assert_eq!(report.filled, 0);
        assert!(!spots[0].aligned_peak_features[1].is_populated());

        let no_file = InMemoryRawData::new(Vec::new());
        filler.fill(&no_file, &mut spots, &NoProgress).unwrap();
        assert!(!spots[0].aligned_peak_features[1].is_populated());
    }

    /// Spectra for file 1 at the given positions, all with the same signal.
    fn raw_with_scans(positions: &[f64], mz: f64, intensity: f64) -> InMemoryRawData {
        let spectra = positions
            .iter()
            .map(|&t| RawSpectrum {
                secondary_axis_value: t,
                peaks: vec![(mz, intensity)],
            })
            .collect();
        InMemoryRawData::new(vec![Vec::new(), spectra])
    }

    #[test]
    fn test_single_scan_is_filled() {
        let filler = GapFiller::new(tolerance(), GapFillingConfig::default());
        let raw = raw_with_scans(&[10.0], 400.002, 3000.0);
        let mut spots = vec![spot_with_file_a()];
        let report = filler.fill(&raw, &mut spots, &NoProgress).unwrap();
        assert_eq!(report.filled, 1);
        let feature = &spots[0].aligned_peak_features[1];
        assert_eq!(feature.status, FeatureStatus::GapFilled);
        assert_eq!(feature.mass, 400.002);
        assert_eq!(feature.secondary_axis_value, 10.0);
        assert_eq!(feature.apex_intensity, 3000.0);
    }

    #[test]
    fn test_two_scans_are_filled() {
        let filler = GapFiller::new(tolerance(), GapFillingConfig::default());
        let raw = raw_with_scans(&[9.99, 10.01], 400.002, 3000.0);
        let mut spots = vec![spot_with_file_a()];
        let report = filler.fill(&raw, &mut spots, &NoProgress).unwrap();
        assert_eq!(report.filled, 1);
        let feature = &spots[0].aligned_peak_features[1];
        assert_eq!(feature.status, FeatureStatus::GapFilled);
        assert_eq!(feature.secondary_axis_value, 9.99);
    }

    #[test]
    fn test_apex_on_window_edge_is_filled() {
        // A rising ramp peaks on the last scan of the window.
        let spectra = (0..21)
            .map(|i| RawSpectrum {
                secondary_axis_value: 9.8 + i as f64 * 0.02,
                peaks: vec![(400.0, 10.0 + i as f64)],
            })
            .collect();
        let raw = InMemoryRawData::new(vec![Vec::new(), spectra]);
        let config = GapFillingConfig {
            smoothing: SmoothingMethod::None,
            ..Default::default()
        };
        let filler = GapFiller::new(tolerance(), config);
        let mut spots = vec![spot_with_file_a()];
        let report = filler.fill(&raw, &mut spots, &NoProgress).unwrap();
        assert_eq!(report.filled, 1);
        let feature = &spots[0].aligned_peak_features[1];
        assert_eq!(feature.apex_intensity, 30.0);
        assert!((feature.secondary_axis_value - 10.2).abs() < 1e-9);
    }

    #[test]
    fn test_force_insert_uses_best_effort_apex() {
        // Scans cover the window but hold no signal at the expected mass.
        let positions: Vec<f64> = (0..21).map(|i| 9.8 + i as f64 * 0.02).collect();
        let raw = raw_with_scans(&positions, 401.0, 500.0);
        let config = GapFillingConfig {
            smoothing: SmoothingMethod::None,
            ..Default::default()
        };

        let strict = GapFiller::new(tolerance(), config.clone());
        let mut spots = vec![spot_with_file_a()];
        strict.fill(&raw, &mut spots, &NoProgress).unwrap();
        assert!(!spots[0].aligned_peak_features[1].is_populated());

        let forced_tolerance = AlignmentTolerance {
            force_insert_on_gap_fill: true,
            ..tolerance()
        };
        let forced = GapFiller::new(forced_tolerance, config);
        forced.fill(&raw, &mut spots, &NoProgress).unwrap();
        let feature = &spots[0].aligned_peak_features[1];
        assert_eq!(feature.status, FeatureStatus::GapFilled);
        assert_eq!(feature.apex_intensity, 0.0);
        assert!((feature.secondary_axis_value - 10.0).abs() < 0.011);
        assert!((feature.mass - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_closest_local_maximum_wins() {
        let trace: Vec<RawTracePoint> = (0..9)
            .map(|i| RawTracePoint {
                secondary_axis_value: i as f64,
                mz: 100.0,
                intensity: 0.0,
            })
            .collect();
        let smoothed = vec![0.0, 50.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(closest_local_maximum(&trace, &smoothed, 5.0), Some(4));
        assert_eq!(closest_local_maximum(&trace, &smoothed, 0.5), Some(1));
        assert_eq!(closest_local_maximum(&trace, &[0.0; 9], 5.0), None);

        let edges = vec![40.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 5.0, 20.0];
        assert_eq!(closest_local_maximum(&trace, &edges, 1.0), Some(0));
        assert_eq!(closest_local_maximum(&trace, &edges, 7.0), Some(8));
        assert_eq!(closest_local_maximum(&trace, &[7.0], 0.0), Some(0));
        assert_eq!(closest_local_maximum(&trace, &[7.0, 7.0], 1.0), Some(0));
    }

    #[test]
    fn test_cancellation() {
        let filler = GapFiller::new(
            tolerance(),
            GapFillingConfig {
                threads: 1,
                ..Default::default()
            },
        );
        let raw = raw_with_peak(10.0, 400.0);
        let mut spots = vec![spot_with_file_a(), spot_with_file_a()];
        let cancel = |_stage: PipelineStage, _done: usize, _total: usize| {
            std::ops::ControlFlow::Break(())
        };
        let res = filler.fill(&raw, &mut spots, &cancel);
        assert!(matches!(
            res,
            Err(AlignmentError::Cancelled {
                stage: PipelineStage::GapFilling
            })
        ));
    }
}
