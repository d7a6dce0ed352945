use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::debug;

use super::profile::alkane_isotope_profile;
use super::{
    BR81_BR79_DIFF,
    C13_C12_DIFF,
    MAX_ISOTOPE_TRACE,
};
use crate::models::{
    AlignmentTolerance,
    IsotopeAnnotation,
    Peak,
};

/// Above this (charge-corrected) mass the envelope is judged against an
/// alkane isotope profile instead of requiring decreasing intensities.
const ALKANE_PROFILE_MIN_MASS: f64 = 800.0;
/// Largest accepted difference between observed and simulated slot ratios.
const MAX_RATIO_DIFFERENCE: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IsotopeClusteringParams {
    pub mz_tolerance: f64,
    pub max_charge: u32,
    pub consider_halogen_isotopes: bool,
    /// Secondary axis window used to decide which features share a spectrum
    /// when clustering picked features instead of a single spectrum.
    pub secondary_margin: f64,
}

impl Default for IsotopeClusteringParams {
    fn default() -> Self {
        Self {
            mz_tolerance: 0.015,
            max_charge: 2,
            consider_halogen_isotopes: false,
            secondary_margin: 0.025,
        }
    }
}

impl IsotopeClusteringParams {
    pub fn from_tolerance(tolerance: &AlignmentTolerance, secondary_margin: f64) -> Self {
        Self {
            mz_tolerance: tolerance.mz_tolerance,
            max_charge: tolerance.max_isotope_charge,
            consider_halogen_isotopes: tolerance.consider_halogen_isotopes,
            secondary_margin,
        }
    }
}

/// Groups the peaks of one spectrum into isotope envelopes.
///
/// Every processed peak ends with an [`IsotopeAnnotation`], peaks that already
/// carry one are never touched again, so running the clusterer twice over the
/// same list is a no-op.
///
/// # Example
///
/// ```
/// use msalign::isotopes::{IsotopeClusterer, IsotopeClusteringParams};
/// use msalign::models::Peak;
///
/// let clusterer = IsotopeClusterer::new(IsotopeClusteringParams {
///     mz_tolerance: 0.01,
///     max_charge: 1,
///     ..Default::default()
/// });
/// let mut peaks = vec![
///     Peak::new(0, 500.0, 1000.0),
///     Peak::new(1, 501.00336, 400.0),
/// ];
/// clusterer.annotate(&mut peaks);
/// assert_eq!(peaks[1].isotope_weight_number(), Some(1));
/// assert_eq!(peaks[1].isotope_parent_peak_id(), Some(0));
/// ```
#[derive(Debug, Clone)]
pub struct IsotopeClusterer {
    params: IsotopeClusteringParams,
}

type EnvelopeSlots = [Option<usize>; MAX_ISOTOPE_TRACE + 1];

impl IsotopeClusterer {
    pub fn new(params: IsotopeClusteringParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IsotopeClusteringParams {
        &self.params
    }

    /// Annotates every unprocessed peak of the list.
    ///
    /// The list is sorted by ascending mass first (stable, so already sorted
    /// input keeps its order).
    pub fn annotate(&self, peaks: &mut [Peak]) {
        if peaks.is_empty() {
            return;
        }
        peaks.sort_by(|a, b| a.mass.total_cmp(&b.mass));
        for i in 0..peaks.len() {
            self.annotate_candidate(peaks, i);
        }
    }

    /// Treats `peaks[index]` as a monoisotopic candidate and claims its isotopes
    /// among the heavier peaks of the list.
    ///
    /// Expects `peaks` to be sorted by ascending mass. No-op when the candidate
    /// is already annotated or out of bounds.
    pub fn annotate_candidate(&self, peaks: &mut [Peak], index: usize) {
        let Some(candidate) = peaks.get(index).copied() else {
            return;
        };
        if candidate.is_annotated() {
            return;
        }

        let charge = self.infer_charge(peaks, index);
        let slots = self.build_envelope(peaks, index, charge);
        let accepted = self.accepted_slots(peaks, index, &slots, charge);

        for &(weight_number, peak_index) in accepted.iter() {
            peaks[peak_index].isotope = Some(IsotopeAnnotation {
                weight_number: weight_number as u32,
                parent_peak_id: candidate.peak_id,
                charge,
            });
        }
        let final_charge = if accepted.is_empty() { 1 } else { charge };
        peaks[index].isotope = Some(IsotopeAnnotation::monoisotopic(
            candidate.peak_id,
            final_charge,
        ));
    }

    /// Guesses the charge from the first heavier peak that sits at a 13C spacing
    /// of `1/k` from the candidate.
    fn infer_charge(&self, peaks: &[Peak], index: usize) -> u32 {
        let mass = peaks[index].mass;
        let tol = self.params.mz_tolerance;
        let max_charge = self.params.max_charge.max(1);
        let diff_at = |k: u32, other: f64| (mass + C13_C12_DIFF / k as f64 - other).abs();

        let mut charge = 1;
        for other in peaks[index + 1..].iter() {
            if other.mass > mass + C13_C12_DIFF + tol {
                break;
            }
            for k in (1..=max_charge).rev() {
                let diff = diff_at(k, other.mass);
                if diff > tol {
                    continue;
                }
                charge = k;
                if k == 4 || k == 5 {
                    // A 1/4 spacing is easily confused with 1/3 (and 1/5 with 1/4).
                    if diff_at(k - 1, other.mass) < diff {
                        charge = k - 1;
                    }
                } else if k >= 6 {
                    let diff_lower = diff_at(k - 1, other.mass);
                    if diff_lower < diff {
                        charge = k - 1;
                        if diff_at(k - 2, other.mass) < diff_lower {
                            charge = k - 2;
                        }
                    }
                }
                break;
            }
            if charge != 1 {
                break;
            }
        }
        charge
    }

    /// Assigns the closest unclaimed peak (within tolerance) to each isotope slot.
    ///
    /// Slot 0 is the candidate itself. Tracing stops after two consecutive
    /// empty slots.
    fn build_envelope(&self, peaks: &[Peak], index: usize, charge: u32) -> EnvelopeSlots {
        let mass = peaks[index].mass;
        let tol = self.params.mz_tolerance;
        let spacing = C13_C12_DIFF / charge as f64;
        let halogen_spacing = BR81_BR79_DIFF / 2.0 / charge as f64;

        let mut slots: EnvelopeSlots = [None; MAX_ISOTOPE_TRACE + 1];
        slots[0] = Some(index);

        for j in 1..=MAX_ISOTOPE_TRACE {
            let carbon_prediction = mass + j as f64 * spacing;
            let halogen_prediction = (self.params.consider_halogen_isotopes && j % 2 == 0)
                .then(|| mass + j as f64 * halogen_spacing);
            let (low, high) = match halogen_prediction {
                Some(h) => (carbon_prediction.min(h), carbon_prediction.max(h)),
                None => (carbon_prediction, carbon_prediction),
            };

            let start = index + 1 + peaks[index + 1..].partition_point(|x| x.mass < low - tol);
            let mut best: Option<(usize, f64)> = None;
            for (k, other) in peaks.iter().enumerate().skip(start) {
                if other.mass > high + tol {
                    break;
                }
                if other.is_annotated() || slots[..j].contains(&Some(k)) {
                    continue;
                }
                let diff = halogen_prediction
                    .map(|h| (other.mass - h).abs())
                    .unwrap_or(f64::INFINITY)
                    .min((other.mass - carbon_prediction).abs());
                if diff <= tol && best.is_none_or(|(_, best_diff)| diff < best_diff) {
                    best = Some((k, diff));
                }
            }
            slots[j] = best.map(|x| x.0);

            if slots[j].is_none() && slots[j - 1].is_none() {
                break;
            }
        }
        slots
    }

    /// Walks the slots in order and returns `(weight_number, peak_index)` for
    /// the isotopes that pass the intensity checks, up to the first rejection.
    fn accepted_slots(
        &self,
        peaks: &[Peak],
        index: usize,
        slots: &EnvelopeSlots,
        charge: u32,
    ) -> Vec<(usize, usize)> {
        let monoisotopic_mass = peaks[index].mass * charge as f64;
        let simulated = (monoisotopic_mass > ALKANE_PROFILE_MIN_MASS)
            .then(|| alkane_isotope_profile(monoisotopic_mass, MAX_ISOTOPE_TRACE + 1));

        let mut accepted = Vec::new();
        for j in 1..=MAX_ISOTOPE_TRACE {
            // The slot after a gap has no previous intensity, only halogen mode accepts it.
            let Some(current) = slots[j] else {
                continue;
            };
            let previous = slots[j - 1].map(|x| peaks[x].intensity);
            let current_intensity = peaks[current].intensity;

            let keep = match &simulated {
                None if self.params.consider_halogen_isotopes => true,
                None => previous.is_some_and(|prev| prev >= current_intensity),
                Some(profile) => match previous {
                    // Zero denominators (observed or simulated) count as a mismatch.
                    Some(prev) if prev > 0.0 && profile[j - 1] > 0.0 => {
                        let observed_ratio = current_intensity / prev;
                        let simulated_ratio = profile[j] / profile[j - 1];
                        (observed_ratio - simulated_ratio).abs() < MAX_RATIO_DIFFERENCE
                    }
                    _ => false,
                },
            };
            if !keep {
                break;
            }
            accepted.push((j, current));
        }
        accepted
    }
}

/// Pure variant of [`IsotopeClusterer::annotate`], returns an annotated copy
/// sorted by ascending mass.
pub fn cluster_isotopes(peaks: &[Peak], params: &IsotopeClusteringParams) -> Vec<Peak> {
    let mut out = peaks.to_vec();
    IsotopeClusterer::new(params.clone()).annotate(&mut out);
    out
}

/// Clusters many independent spectra in parallel.
pub fn par_cluster_spectra(spectra: &mut [Vec<Peak>], params: &IsotopeClusteringParams) {
    let clusterer = IsotopeClusterer::new(params.clone());
    spectra
        .par_iter_mut()
        .for_each(|peaks| clusterer.annotate(peaks));
    debug!("Clustered isotopes of {} spectra", spectra.len());
}
