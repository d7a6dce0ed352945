use serde::{
    Deserialize,
    Serialize,
};

use crate::utils::{
    TupleRange,
    abs_tol_range,
};

/// Tolerance settings shared by every stage of the alignment.
///
/// All tolerances are absolute and symmetric, a tolerance of `t` on a value `x`
/// means the closed range `[x - t, x + t]`. The secondary axis is either
/// retention time or drift time, in whatever unit the input features use.
///
/// Example:
/// ```
/// use msalign::AlignmentTolerance;
///
/// let tolerance = AlignmentTolerance::default();
/// assert!(tolerance.is_similar((300.0, 5.0), (300.01, 5.05)));
/// ```
///
/// Values are not validated, negative or zero tolerances give degenerate
/// (but non-panicking) results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlignmentTolerance {
    pub mz_tolerance: f64,
    pub mz_factor: f64,
    pub secondary_tolerance: f64,
    pub secondary_factor: f64,
    pub max_isotope_charge: u32,
    pub consider_halogen_isotopes: bool,
    pub force_insert_on_gap_fill: bool,
}

impl Default for AlignmentTolerance {
    fn default() -> Self {
        Self {
            mz_tolerance: 0.015,
            mz_factor: 0.5,
            secondary_tolerance: 0.1,
            secondary_factor: 0.5,
            max_isotope_charge: 2,
            consider_halogen_isotopes: false,
            force_insert_on_gap_fill: false,
        }
    }
}

impl AlignmentTolerance {
    pub fn mz_range(&self, mz: f64) -> TupleRange<f64> {
        abs_tol_range(mz, self.mz_tolerance)
    }

    pub fn secondary_range(&self, secondary: f64) -> TupleRange<f64> {
        abs_tol_range(secondary, self.secondary_tolerance)
    }

    /// Whether two `(mz, secondary)` positions are within tolerance on both axes.
    ///
    /// Boundaries are inclusive.
    pub fn is_similar(&self, a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() <= self.mz_tolerance && (a.1 - b.1).abs() <= self.secondary_tolerance
    }

    /// Gaussian similarity between a reference position and a target position.
    ///
    /// `mz_factor * exp(-0.5 (dmz / mz_tol)^2) + secondary_factor * exp(-0.5 (dsec / sec_tol)^2)`
    pub fn similarity_score(&self, reference: (f64, f64), target: (f64, f64)) -> f64 {
        let mz_term = gaussian_term(reference.0 - target.0, self.mz_tolerance);
        let secondary_term = gaussian_term(reference.1 - target.1, self.secondary_tolerance);
        self.mz_factor * mz_term + self.secondary_factor * secondary_term
    }

    pub fn with_mz_tolerance(self, mz_tolerance: f64) -> Self {
        Self {
            mz_tolerance,
            ..self
        }
    }

    pub fn with_secondary_tolerance(self, secondary_tolerance: f64) -> Self {
        Self {
            secondary_tolerance,
            ..self
        }
    }
}

fn gaussian_term(diff: f64, tolerance: f64) -> f64 {
    if tolerance == 0.0 {
        // Only an exact hit is within a zero tolerance.
        return if diff == 0.0 { 1.0 } else { 0.0 };
    }
    let z = diff / tolerance;
    (-0.5 * z * z).exp()
}
