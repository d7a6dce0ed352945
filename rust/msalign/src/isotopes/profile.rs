//! Nominal-mass isotope profiles used to judge envelopes of heavier ions.

/// Nominal isotope abundances of carbon, index = extra neutrons.
const CARBON_ABUNDANCE: [f64; 2] = [0.9893, 0.0107];
/// Nominal isotope abundances of hydrogen, index = extra neutrons.
const HYDROGEN_ABUNDANCE: [f64; 2] = [0.999_885, 0.000_115];

const CH2_NOMINAL_MASS: f64 = 14.0;

/// Convolves two nominal distributions, keeping only the first `max_len` bins.
fn convolve(dist_a: &[f64], dist_b: &[f64], max_len: usize) -> Vec<f64> {
    let mut result = vec![0.0; max_len.min(dist_a.len() + dist_b.len() - 1)];
    for (i, &a) in dist_a.iter().enumerate() {
        for (j, &b) in dist_b.iter().enumerate() {
            if let Some(slot) = result.get_mut(i + j) {
                *slot += a * b;
            }
        }
    }
    result
}

/// Convolves a distribution with itself `n` times (square and multiply).
fn convolve_pow(dist: &[f64], n: u32, max_len: usize) -> Vec<f64> {
    let mut result = vec![1.0];
    let mut base = dist.to_vec();
    let mut remaining = n;
    while remaining > 0 {
        if remaining & 1 == 1 {
            result = convolve(&result, &base, max_len);
        }
        base = convolve(&base, &base, max_len);
        remaining >>= 1;
    }
    result
}

/// Relative nominal isotope profile of `C{carbon}H{hydrogen}`, normalized to a
/// base peak of 1.0 and padded with zeros to `len` entries.
///
/// # Example
///
/// ```
/// use msalign::isotopes::profile::nominal_isotope_profile;
///
/// let profile = nominal_isotope_profile(1, 0, 3);
/// assert_eq!(profile[0], 1.0);
/// assert!((profile[1] - 0.0107 / 0.9893).abs() < 1e-12);
/// assert_eq!(profile[2], 0.0);
/// ```
pub fn nominal_isotope_profile(carbon: u32, hydrogen: u32, len: usize) -> Vec<f64> {
    if len == 0 {
        return Vec::new();
    }
    let carbon_dist = convolve_pow(&CARBON_ABUNDANCE, carbon, len);
    let hydrogen_dist = convolve_pow(&HYDROGEN_ABUNDANCE, hydrogen, len);
    let mut profile = convolve(&carbon_dist, &hydrogen_dist, len);
    profile.resize(len, 0.0);

    let base = profile.iter().cloned().fold(0.0, f64::max);
    if base > 0.0 {
        profile.iter_mut().for_each(|x| *x /= base);
    }
    profile
}

/// Number of carbons of the `CnH2n` alkane whose nominal mass best fits `mass`.
pub fn alkane_carbon_count(mass: f64) -> u32 {
    let carbon = (mass / CH2_NOMINAL_MASS).floor();
    if carbon <= 1.0 { 1 } else { carbon as u32 }
}

/// Isotope profile of the alkane-like formula matching a monoisotopic mass.
///
/// Stands in for the unknown elemental composition of heavier ions.
pub fn alkane_isotope_profile(mass: f64, len: usize) -> Vec<f64> {
    let carbon = alkane_carbon_count(mass);
    nominal_isotope_profile(carbon, 2 * carbon, len)
}
