use serde::{
    Deserialize,
    Serialize,
};
use tracing::info;

use super::grouping::assign_peak_groups;
use super::links::{
    assign_correlation_links,
    assign_default_adducts,
    assign_identification_links,
    assign_representative_links,
};
use super::merge::select_retained;
use super::renumber::renumber;
use crate::errors::Result;
use crate::models::{
    AlignmentSpotProperty,
    AlignmentTolerance,
};
use crate::progress::{
    PipelineStage,
    ProgressReporter,
    check_progress,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefinementConfig {
    /// Above this mass the merge tolerance grows proportionally (fixed ppm).
    pub ppm_anchor_mass: f64,
    /// Fraction of the secondary tolerance used to call two spots duplicates.
    pub secondary_merge_factor: f64,
    pub correlation_min_files: usize,
    pub correlation_threshold: f64,
    /// Secondary axis window for spots to be considered co-eluting when linking.
    pub coelution_margin: f64,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            ppm_anchor_mass: 500.0,
            secondary_merge_factor: 0.5,
            correlation_min_files: 10,
            correlation_threshold: 0.95,
            coelution_margin: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementReport {
    pub input_spots: usize,
    pub empty_dropped: usize,
    pub duplicates_dropped: usize,
    pub orphan_isotopes_dropped: usize,
    pub retained: usize,
    pub isotope_links: usize,
    pub correlation_links: usize,
    pub identification_links: usize,
    pub representative_links: usize,
    pub peak_groups: usize,
}

/// Deduplicates spots, renumbers them and links related spots.
#[derive(Debug, Clone)]
pub struct AlignmentRefiner {
    tolerance: AlignmentTolerance,
    config: RefinementConfig,
}

const REFINEMENT_STEPS: usize = 4;

impl AlignmentRefiner {
    pub fn new(tolerance: AlignmentTolerance, config: RefinementConfig) -> Self {
        Self { tolerance, config }
    }

    /// Mass tolerance at `mass`, constant up to the anchor mass and a fixed
    /// ppm above it.
    ///
    /// ```
    /// use msalign::AlignmentTolerance;
    /// use msalign::refining::{AlignmentRefiner, RefinementConfig};
    ///
    /// let refiner = AlignmentRefiner::new(
    ///     AlignmentTolerance::default().with_mz_tolerance(0.01),
    ///     RefinementConfig::default(),
    /// );
    /// assert_eq!(refiner.mass_tolerance(200.0), 0.01);
    /// assert!((refiner.mass_tolerance(1000.0) - 0.02).abs() < 1e-12);
    /// ```
    pub fn mass_tolerance(&self, mass: f64) -> f64 {
        let anchor = self.config.ppm_anchor_mass;
        if mass > anchor && anchor > 0.0 {
            mass * self.tolerance.mz_tolerance / anchor
        } else {
            self.tolerance.mz_tolerance
        }
    }

    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn refine(
        &self,
        spots: Vec<AlignmentSpotProperty>,
        progress: &dyn ProgressReporter,
    ) -> Result<(Vec<AlignmentSpotProperty>, RefinementReport)> {
        let stage = PipelineStage::Refinement;
        let mut report = RefinementReport {
            input_spots: spots.len(),
            ..Default::default()
        };

        let mass_tolerance = |mass: f64| self.mass_tolerance(mass);
        let secondary_tolerance =
            self.tolerance.secondary_tolerance * self.config.secondary_merge_factor;
        let (retained, outcome) = select_retained(&spots, mass_tolerance, secondary_tolerance);
        report.empty_dropped = outcome.empty_dropped;
        report.duplicates_dropped = outcome.duplicates_dropped;
        report.orphan_isotopes_dropped = outcome.orphan_isotopes_dropped;
        check_progress(progress, stage, 1, REFINEMENT_STEPS)?;

        let (mut spots, isotope_links) = renumber(spots, &retained);
        report.retained = spots.len();
        report.isotope_links = isotope_links;
        check_progress(progress, stage, 2, REFINEMENT_STEPS)?;

        let margin = self.config.coelution_margin;
        report.correlation_links = assign_correlation_links(
            &mut spots,
            self.config.correlation_min_files,
            self.config.correlation_threshold,
            margin,
        );
        report.identification_links =
            assign_identification_links(&mut spots, margin, &mass_tolerance);
        report.representative_links =
            assign_representative_links(&mut spots, margin, &mass_tolerance);
        assign_default_adducts(&mut spots);
        check_progress(progress, stage, 3, REFINEMENT_STEPS)?;

        report.peak_groups = assign_peak_groups(&mut spots);
        check_progress(progress, stage, 4, REFINEMENT_STEPS)?;

        info!(
            "Refinement kept {} of {} spots ({} duplicates, {} orphan isotopes, {} empty)",
            report.retained,
            report.input_spots,
            report.duplicates_dropped,
            report.orphan_isotopes_dropped,
            report.empty_dropped
        );
        Ok((spots, report))
    }
}
