use std::collections::HashMap;

use tracing::{
    debug,
    info,
    warn,
};

use super::spatial_hash::{
    MasterEntry,
    MasterIndex,
};
use crate::errors::Result;
use crate::models::{
    AlignedPeakFeature,
    AlignmentSpotProperty,
    AlignmentTolerance,
    FeatureStatus,
    MatchResult,
    MatchSource,
    ScanProperty,
};
use crate::progress::{
    NoProgress,
    PipelineStage,
    ProgressReporter,
    check_progress,
};

/// Joins the picked features of many runs into alignment spots.
///
/// Joining happens in two passes. A master list of unique feature positions
/// is built first, seeded with the reference run and extended with every
/// feature of the other runs that has no similar entry yet. Then each run is
/// matched against the master list, every master entry claiming at most one
/// feature per run.
///
/// The master list depends on the order in which runs are visited
/// (reference run first, then ascending file id).
#[derive(Debug, Clone)]
pub struct PeakJoiner {
    tolerance: AlignmentTolerance,
    reference_file_id: usize,
}

/// Index of the claimed feature (within its run) for every (file, spot) pair.
type Claims = Vec<Vec<Option<usize>>>;

impl PeakJoiner {
    pub fn new(tolerance: AlignmentTolerance, reference_file_id: usize) -> Self {
        Self {
            tolerance,
            reference_file_id,
        }
    }

    pub fn tolerance(&self) -> &AlignmentTolerance {
        &self.tolerance
    }

    pub fn join_runs(&self, runs: &[Vec<ScanProperty>]) -> Vec<AlignmentSpotProperty> {
        self.join_runs_with_progress(runs, &NoProgress)
            .unwrap_or_default()
    }

    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn join_runs_with_progress(
        &self,
        runs: &[Vec<ScanProperty>],
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<AlignmentSpotProperty>> {
        let num_files = runs.len();
        if num_files == 0 {
            return Ok(Vec::new());
        }
        let total_steps = 2 * num_files;

        let masters = self.build_master_list(runs, |done| {
            check_progress(progress, PipelineStage::Joining, done, total_steps)
        })?;
        info!(
            "Master list has {} entries from {} runs",
            masters.len(),
            num_files
        );

        let mut spots = initialize_spots(&masters, num_files);
        let mut claims: Claims = Vec::with_capacity(num_files);
        for (file_id, run) in runs.iter().enumerate() {
            let assignment = self.match_run(&masters, run);
            for (spot, claim) in spots.iter_mut().zip(assignment.iter()) {
                if let Some(&run_index) = claim.as_ref() {
                    spot.aligned_peak_features[file_id] =
                        detected_feature(file_id, spot.alignment_id, &run[run_index]);
                }
            }
            debug!(
                "File {} populated {} spots",
                file_id,
                assignment.iter().filter(|x| x.is_some()).count()
            );
            claims.push(assignment);
            check_progress(
                progress,
                PipelineStage::Joining,
                num_files + file_id + 1,
                total_steps,
            )?;
        }

        finalize_spots(&mut spots, runs, &claims);
        Ok(spots)
    }

    fn effective_reference(&self, num_files: usize) -> usize {
        if self.reference_file_id < num_files {
            self.reference_file_id
        } else {
            warn!(
                "Reference file {} is not registered ({} files), using file 0",
                self.reference_file_id, num_files
            );
            0
        }
    }

    /// Builds the sorted master list of unique feature positions.
    ///
    /// `on_file_done` is called with the number of runs visited so far and may
    /// abort the construction.
    pub fn build_master_list(
        &self,
        runs: &[Vec<ScanProperty>],
        mut on_file_done: impl FnMut(usize) -> Result<()>,
    ) -> Result<Vec<MasterEntry>> {
        let mut index = MasterIndex::new(&self.tolerance);
        if runs.is_empty() {
            return Ok(Vec::new());
        }
        let reference = self.effective_reference(runs.len());
        let mut insertion_order = 0;

        for feature in runs[reference].iter() {
            index.insert_unchecked(master_entry(reference, feature, insertion_order));
            insertion_order += 1;
        }
        on_file_done(1)?;

        let others = (0..runs.len()).filter(|&x| x != reference);
        for (visited, file_id) in others.enumerate() {
            let mut inserted = 0;
            for feature in runs[file_id].iter() {
                if index.try_insert(master_entry(file_id, feature, insertion_order)) {
                    insertion_order += 1;
                    inserted += 1;
                }
            }
            debug!("File {} added {} master entries", file_id, inserted);
            on_file_done(visited + 2)?;
        }

        debug!("{}", index);
        Ok(index.into_sorted_entries())
    }

    /// Matches one run against the sorted master list.
    ///
    /// Returns, for every master entry, the index of the claimed feature in `run`.
    /// Features are visited by ascending (mz, secondary axis). Each goes to the
    /// best scoring master entry among those where it beats the feature
    /// currently held, displacing that feature (which then populates nothing).
    pub fn match_run(&self, masters: &[MasterEntry], run: &[ScanProperty]) -> Vec<Option<usize>> {
        let mut assignment: Vec<Option<usize>> = vec![None; masters.len()];
        let mut slot_best = vec![f64::NEG_INFINITY; masters.len()];

        let mut order: Vec<usize> = (0..run.len()).collect();
        order.sort_by(|&a, &b| {
            run[a]
                .precursor_mz
                .total_cmp(&run[b].precursor_mz)
                .then(
                    run[a]
                        .secondary_axis_value
                        .total_cmp(&run[b].secondary_axis_value),
                )
        });

        let mz_tol = self.tolerance.mz_tolerance;
        for run_index in order {
            let feature = &run[run_index];
            let position = (feature.precursor_mz, feature.secondary_axis_value);
            let lower = masters.partition_point(|x| x.mz < feature.precursor_mz - mz_tol);

            let mut best: Option<(usize, f64)> = None;
            for (offset, master) in masters[lower..].iter().enumerate() {
                if master.mz > feature.precursor_mz + mz_tol {
                    break;
                }
                let target = (master.mz, master.secondary_axis_value);
                if !self.tolerance.is_similar(target, position) {
                    continue;
                }
                let score = self.tolerance.similarity_score(target, position);
                let slot = lower + offset;
                let beats_target = best.map_or(true, |(_, s)| score > s);
                if score > slot_best[slot] && beats_target {
                    best = Some((slot, score));
                }
            }

            if let Some((slot, score)) = best {
                assignment[slot] = Some(run_index);
                slot_best[slot] = score;
            }
        }
        assignment
    }
}

fn master_entry(file_id: usize, feature: &ScanProperty, insertion_order: usize) -> MasterEntry {
    MasterEntry {
        mz: feature.precursor_mz,
        secondary_axis_value: feature.secondary_axis_value,
        ion_mode: feature.ion_mode,
        origin_file_id: file_id,
        origin_peak_id: feature.peak_id,
        insertion_order,
    }
}

/// One spot per master entry, with a missing slot for every file.
pub fn initialize_spots(masters: &[MasterEntry], num_files: usize) -> Vec<AlignmentSpotProperty> {
    masters
        .iter()
        .enumerate()
        .map(|(alignment_id, master)| {
            AlignmentSpotProperty::new(
                alignment_id,
                master.mz,
                master.secondary_axis_value,
                master.ion_mode,
                num_files,
            )
        })
        .collect()
}

fn detected_feature(
    file_id: usize,
    master_peak_id: usize,
    feature: &ScanProperty,
) -> AlignedPeakFeature {
    AlignedPeakFeature {
        file_id,
        master_peak_id,
        peak_id: Some(feature.peak_id),
        mass: feature.precursor_mz,
        secondary_axis_value: feature.secondary_axis_value,
        apex_intensity: feature.height,
        peak_width: feature.peak_width,
        status: FeatureStatus::Detected,
    }
}

/// Best match per source over all the features a spot holds.
fn collect_matches<'a>(scans: impl Iterator<Item = &'a ScanProperty>) -> Vec<MatchResult> {
    let mut best: Vec<MatchResult> = Vec::new();
    let scans: Vec<&ScanProperty> = scans.collect();
    for source in [MatchSource::ReferenceLibrary, MatchSource::TextDatabase] {
        let top = scans
            .iter()
            .filter_map(|x| x.best_match(source))
            .max_by(|a, b| a.score.total_cmp(&b.score));
        if let Some(top) = top {
            best.push(top.clone());
        }
    }
    best
}

fn finalize_spots(spots: &mut [AlignmentSpotProperty], runs: &[Vec<ScanProperty>], claims: &Claims) {
    let mut spot_of_peak: HashMap<(usize, usize), usize> = HashMap::new();
    for (file_id, assignment) in claims.iter().enumerate() {
        for (spot_index, claim) in assignment.iter().enumerate() {
            if let Some(&run_index) = claim.as_ref() {
                spot_of_peak.insert((file_id, runs[file_id][run_index].peak_id), spot_index);
            }
        }
    }

    for (spot_index, spot) in spots.iter_mut().enumerate() {
        spot.recompute_centers();
        let Some(representative) = spot.most_intense_feature().map(|x| x.file_id) else {
            continue;
        };
        spot.representative_file_id = Some(representative);

        let scans = claims
            .iter()
            .enumerate()
            .filter_map(|(file_id, assignment)| assignment[spot_index].map(|x| &runs[file_id][x]));
        spot.match_results = collect_matches(scans);

        let Some(run_index) = claims[representative][spot_index] else {
            continue;
        };
        let scan = &runs[representative][run_index];
        spot.ion_mode = scan.ion_mode;
        spot.charge = scan.isotope.map(|x| x.charge).unwrap_or(1);
        spot.isotope_weight_number = scan.isotope_weight_number();
        if let Some(isotope) = scan.isotope.filter(|x| x.weight_number > 0) {
            spot.parent_alignment_id = spot_of_peak
                .get(&(representative, isotope.parent_peak_id))
                .copied()
                .filter(|&x| x != spot_index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IsotopeAnnotation;

    fn scenario_tolerance() -> AlignmentTolerance {
        AlignmentTolerance::default()
            .with_mz_tolerance(0.01)
            .with_secondary_tolerance(0.02)
    }

    #[test]
    fn test_two_runs_join_into_one_spot() {
        let runs = vec![
            vec![ScanProperty::new(0, 300.10, 5.00, 1000.0)],
            vec![ScanProperty::new(0, 300.102, 5.01, 800.0)],
        ];
        let joiner = PeakJoiner::new(scenario_tolerance(), 0);
        let spots = joiner.join_runs(&runs);
        assert_eq!(spots.len(), 1);
        let spot = &spots[0];
        assert_eq!(spot.aligned_peak_features.len(), 2);
        assert!(spot.aligned_peak_features.iter().all(|x| x.is_populated()));
        assert_eq!(spot.representative_file_id, Some(0));
        assert!((spot.mass_center - 300.101).abs() < 1e-9);
        assert!((spot.secondary_axis_center - 5.005).abs() < 1e-9);

        let score = joiner
            .tolerance()
            .similarity_score((300.10, 5.00), (300.102, 5.01));
        let expected = 0.5 * (-0.5f64 * 0.2 * 0.2).exp() + 0.5 * (-0.5f64 * 0.5 * 0.5).exp();
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_self_join_identity() {
        let run: Vec<ScanProperty> = (0..20)
            .map(|i| ScanProperty::new(i, 100.0 + i as f64 * 1.5, 1.0 + i as f64 * 0.3, 100.0))
            .collect();
        let runs = vec![run.clone(), run.clone(), run];
        let spots = PeakJoiner::new(scenario_tolerance(), 0).join_runs(&runs);
        assert_eq!(spots.len(), 20);
        for spot in spots.iter() {
            assert_eq!(spot.fill_fraction(), 1.0);
            let ids: Vec<Option<usize>> =
                spot.aligned_peak_features.iter().map(|x| x.peak_id).collect();
            assert!(ids.windows(2).all(|w| w[0] == w[1]));
        }
    }

    #[test]
    fn test_tolerance_boundary_on_each_axis() {
        let eps = 1e-6;
        let tol = scenario_tolerance();
        let inside = vec![
            vec![ScanProperty::new(0, 300.0, 5.0, 10.0)],
            vec![
                ScanProperty::new(0, 300.01 - eps, 5.0, 10.0),
                ScanProperty::new(1, 400.0, 5.02 - eps, 10.0),
            ],
            vec![ScanProperty::new(0, 400.0, 5.0, 10.0)],
        ];
        let spots = PeakJoiner::new(tol.clone(), 0).join_runs(&inside);
        assert_eq!(spots.len(), 2);

        let outside = vec![
            vec![ScanProperty::new(0, 300.0, 5.0, 10.0)],
            vec![
                ScanProperty::new(0, 300.01 + eps, 5.0, 10.0),
                ScanProperty::new(1, 300.0, 5.02 + eps, 10.0),
            ],
        ];
        let spots = PeakJoiner::new(tol, 0).join_runs(&outside);
        assert_eq!(spots.len(), 3);
        assert!(spots.iter().all(|x| x.fill_fraction() == 0.5));
    }

    #[test]
    fn test_reference_run_seeds_master_list() {
        // Two reference features within tolerance of each other both survive,
        // while a near duplicate in another run is folded in.
        let runs = vec![
            vec![ScanProperty::new(7, 200.0, 2.0, 50.0)],
            vec![
                ScanProperty::new(0, 200.0, 2.0, 50.0),
                ScanProperty::new(1, 200.005, 2.0, 60.0),
            ],
        ];
        let spots = PeakJoiner::new(scenario_tolerance(), 1).join_runs(&runs);
        assert_eq!(spots.len(), 2);
        // File 0 only has one feature, it lands in its best scoring spot.
        let file0: Vec<Option<usize>> = spots
            .iter()
            .map(|x| x.aligned_peak_features[0].peak_id)
            .collect();
        assert_eq!(file0, vec![Some(7), None]);
    }

    fn master(mz: f64, secondary: f64, insertion_order: usize) -> MasterEntry {
        MasterEntry {
            mz,
            secondary_axis_value: secondary,
            ion_mode: Default::default(),
            origin_file_id: 0,
            origin_peak_id: insertion_order,
            insertion_order,
        }
    }

    #[test]
    fn test_closer_feature_displaces_claim() {
        let joiner = PeakJoiner::new(scenario_tolerance(), 0);
        let masters = vec![master(100.0, 1.0, 0)];
        // The farther feature is visited first and gets displaced.
        let run = vec![
            ScanProperty::new(0, 100.001, 1.0, 10.0),
            ScanProperty::new(1, 99.995, 1.0, 10.0),
        ];
        assert_eq!(joiner.match_run(&masters, &run), vec![Some(0)]);

        // A worse feature visited later does not displace the claim.
        let run = vec![
            ScanProperty::new(0, 100.001, 1.0, 10.0),
            ScanProperty::new(1, 100.004, 1.0, 10.0),
        ];
        assert_eq!(joiner.match_run(&masters, &run), vec![Some(0)]);
    }

    #[test]
    fn test_feature_falls_back_to_next_best_master() {
        let joiner = PeakJoiner::new(scenario_tolerance(), 0);
        let masters = vec![master(100.0, 1.0, 0), master(100.008, 1.0, 1)];
        let run = vec![
            ScanProperty::new(0, 100.003, 1.0, 10.0),
            ScanProperty::new(1, 100.001, 1.0, 10.0),
        ];
        assert_eq!(joiner.match_run(&masters, &run), vec![Some(1), Some(0)]);
    }

    #[test]
    fn test_dissimilar_secondary_is_not_claimed() {
        let joiner = PeakJoiner::new(scenario_tolerance(), 0);
        let masters = vec![master(100.0, 1.0, 0)];
        let run = vec![ScanProperty::new(0, 100.0, 1.5, 10.0)];
        assert_eq!(joiner.match_run(&masters, &run), vec![None]);
    }

    #[test]
    fn test_parent_spot_is_resolved() {
        let mono = ScanProperty {
            isotope: Some(IsotopeAnnotation::monoisotopic(1, 1)),
            ..ScanProperty::new(1, 500.0, 5.0, 1000.0)
        };
        let m1 = ScanProperty {
            isotope: Some(IsotopeAnnotation {
                weight_number: 1,
                parent_peak_id: 1,
                charge: 1,
            }),
            ..ScanProperty::new(2, 501.00336, 5.0, 400.0)
        };
        let runs = vec![vec![mono, m1]];
        let spots = PeakJoiner::new(scenario_tolerance(), 0).join_runs(&runs);
        assert_eq!(spots.len(), 2);
        assert_eq!(spots[0].isotope_weight_number, 0);
        assert_eq!(spots[1].isotope_weight_number, 1);
        assert_eq!(spots[1].parent_alignment_id, Some(0));
        assert_eq!(spots[0].parent_alignment_id, None);
    }

    #[test]
    fn test_best_match_per_source_is_kept() {
        let runs = vec![
            vec![ScanProperty::new(0, 255.0, 3.0, 10.0).with_identification(
                MatchResult::new(MatchSource::ReferenceLibrary, "a", 0.7),
            )],
            vec![ScanProperty::new(0, 255.001, 3.0, 20.0).with_identification(
                MatchResult::new(MatchSource::ReferenceLibrary, "b", 0.9),
            )],
        ];
        let spots = PeakJoiner::new(scenario_tolerance(), 0).join_runs(&runs);
        assert_eq!(spots.len(), 1);
        assert_eq!(spots[0].match_results.len(), 1);
        assert_eq!(spots[0].match_results[0].name, "b");
    }

    #[test]
    fn test_cancellation() {
        let runs = vec![
            vec![ScanProperty::new(0, 100.0, 1.0, 10.0)],
            vec![ScanProperty::new(0, 100.0, 1.0, 10.0)],
        ];
        let cancel = |_stage: PipelineStage, done: usize, _total: usize| {
            if done >= 2 {
                std::ops::ControlFlow::Break(())
            } else {
                std::ops::ControlFlow::Continue(())
            }
        };
        let res = PeakJoiner::new(scenario_tolerance(), 0).join_runs_with_progress(&runs, &cancel);
        assert!(matches!(
            res,
            Err(crate::errors::AlignmentError::Cancelled {
                stage: PipelineStage::Joining
            })
        ));
    }

    #[test]
    fn test_no_runs() {
        let spots = PeakJoiner::new(scenario_tolerance(), 3).join_runs(&[]);
        assert!(spots.is_empty());
    }
}
