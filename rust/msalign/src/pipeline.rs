use std::time::Instant;

use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    info,
    warn,
};

use crate::errors::Result;
use crate::gap_filling::{
    GapFiller,
    GapFillingConfig,
    GapFillingReport,
};
use crate::isotopes::{
    IsotopeClusterer,
    IsotopeClusteringParams,
    annotate_scan_properties,
};
use crate::joining::PeakJoiner;
use crate::models::{
    AlignmentSpotProperty,
    AlignmentTolerance,
    ScanProperty,
};
use crate::progress::{
    ParallelProgress,
    PipelineStage,
    ProgressReporter,
};
use crate::refining::{
    AlignmentRefiner,
    RefinementConfig,
    RefinementReport,
};
use crate::traits::{
    DataAccessor,
    RawDataProvider,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlignmentConfig {
    pub tolerance: AlignmentTolerance,
    /// File seeding the master list, falls back to file 0 when out of range.
    pub reference_file_id: usize,
    /// Secondary axis window grouping picked features into one spectrum
    /// for isotope clustering.
    pub isotope_secondary_margin: f64,
    pub gap_filling: GapFillingConfig,
    pub refinement: RefinementConfig,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            tolerance: AlignmentTolerance::default(),
            reference_file_id: 0,
            isotope_secondary_margin: 0.025,
            gap_filling: GapFillingConfig::default(),
            refinement: RefinementConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AlignmentStats {
    pub num_files: usize,
    pub input_features: usize,
    pub joined_spots: usize,
    /// `None` when no raw data was supplied.
    pub gap_filling: Option<GapFillingReport>,
    pub refinement: RefinementReport,
    pub timings: Vec<StageTiming>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub spots: Vec<AlignmentSpotProperty>,
    pub stats: AlignmentStats,
}

/// Runs isotope clustering, joining, gap filling and refinement in order.
#[derive(Debug, Clone, Default)]
pub struct AlignmentPipeline {
    config: AlignmentConfig,
}

impl AlignmentPipeline {
    pub fn new(config: AlignmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Reads every file, logging and skipping the ones that fail.
    fn load_runs(&self, accessor: &dyn DataAccessor) -> Vec<Vec<ScanProperty>> {
        accessor
            .file_ids()
            .map(|file_id| match accessor.scan_properties(file_id) {
                Ok(x) => x,
                Err(e) => {
                    warn!("Treating file {} as empty: {}", file_id, e);
                    Vec::new()
                }
            })
            .collect()
    }

    /// Annotates isotopes of every run in parallel.
    pub fn cluster_runs(
        &self,
        runs: &mut [Vec<ScanProperty>],
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        let params = IsotopeClusteringParams::from_tolerance(
            &self.config.tolerance,
            self.config.isotope_secondary_margin,
        );
        let clusterer = IsotopeClusterer::new(params);
        let tracker = ParallelProgress::new(progress, PipelineStage::IsotopeClustering, runs.len());
        runs.par_iter_mut().for_each(|run| {
            if tracker.is_cancelled() {
                return;
            }
            annotate_scan_properties(run, &clusterer);
            tracker.tick();
        });
        tracker.finish()
    }

    /// Aligns the files of `accessor`.
    ///
    /// Gap filling only runs when `raw` is given. The progress reporter may
    /// stop the run between files (or spots), which returns
    /// [`AlignmentError::Cancelled`](crate::errors::AlignmentError::Cancelled).
    pub fn run(
        &self,
        accessor: &dyn DataAccessor,
        raw: Option<&dyn RawDataProvider>,
        progress: &dyn ProgressReporter,
    ) -> Result<AlignmentResult> {
        let mut stats = AlignmentStats::default();
        let mut runs = self.load_runs(accessor);
        stats.num_files = runs.len();
        stats.input_features = runs.iter().map(|x| x.len()).sum();
        info!(
            "Aligning {} features from {} files",
            stats.input_features, stats.num_files
        );

        let st = Instant::now();
        self.cluster_runs(&mut runs, progress)?;
        stats.timings.push(timing(PipelineStage::IsotopeClustering, st));

        let st = Instant::now();
        let joiner = PeakJoiner::new(self.config.tolerance.clone(), self.config.reference_file_id);
        let mut spots = joiner.join_runs_with_progress(&runs, progress)?;
        stats.joined_spots = spots.len();
        stats.timings.push(timing(PipelineStage::Joining, st));

        if let Some(raw) = raw {
            let st = Instant::now();
            let filler = GapFiller::new(
                self.config.tolerance.clone(),
                self.config.gap_filling.clone(),
            );
            stats.gap_filling = Some(filler.fill(raw, &mut spots, progress)?);
            stats.timings.push(timing(PipelineStage::GapFilling, st));
        } else {
            info!("No raw data given, skipping gap filling");
        }

        let st = Instant::now();
        let refiner = AlignmentRefiner::new(
            self.config.tolerance.clone(),
            self.config.refinement.clone(),
        );
        let (spots, refinement) = refiner.refine(spots, progress)?;
        stats.refinement = refinement;
        stats.timings.push(timing(PipelineStage::Refinement, st));

        Ok(AlignmentResult { spots, stats })
    }
}

fn timing(stage: PipelineStage, start: Instant) -> StageTiming {
    let elapsed = start.elapsed();
    info!("Finished {} in {:#?}", stage, elapsed);
    StageTiming {
        stage,
        elapsed_ms: elapsed.as_millis(),
    }
}
