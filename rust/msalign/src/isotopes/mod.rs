pub mod clusterer;
pub mod coeluting;
pub mod profile;

pub use clusterer::{
    IsotopeClusterer,
    IsotopeClusteringParams,
    cluster_isotopes,
    par_cluster_spectra,
};
pub use coeluting::annotate_scan_properties;

/// Mass difference between 13C and 12C.
pub const C13_C12_DIFF: f64 = 1.003_355;
/// Mass difference between 81Br and 79Br.
pub const BR81_BR79_DIFF: f64 = 1.997_953;
/// Number of isotope slots traced beyond the monoisotopic peak.
pub const MAX_ISOTOPE_TRACE: usize = 15;
