use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IonMode {
    #[default]
    #[serde(rename = "positive")]
    Positive,
    #[serde(rename = "negative")]
    Negative,
}

/// Isotope envelope membership of a peak.
///
/// `weight_number == 0` marks the monoisotopic (representative) ion of the envelope,
/// in which case `parent_peak_id` is the peak's own id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IsotopeAnnotation {
    pub weight_number: u32,
    pub parent_peak_id: usize,
    pub charge: u32,
}

impl IsotopeAnnotation {
    pub fn monoisotopic(peak_id: usize, charge: u32) -> Self {
        Self {
            weight_number: 0,
            parent_peak_id: peak_id,
            charge,
        }
    }

    pub fn is_monoisotopic(&self) -> bool {
        self.weight_number == 0
    }
}

/// A centroided peak in a single spectrum.
///
/// Peaks start unprocessed (`isotope == None`) and are annotated exactly once
/// by the [`IsotopeClusterer`](crate::isotopes::IsotopeClusterer).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Peak {
    pub peak_id: usize,
    pub mass: f64,
    pub intensity: f64,
    #[serde(default)]
    pub isotope: Option<IsotopeAnnotation>,
}

impl Peak {
    pub fn new(peak_id: usize, mass: f64, intensity: f64) -> Self {
        Self {
            peak_id,
            mass,
            intensity,
            isotope: None,
        }
    }

    pub fn is_annotated(&self) -> bool {
        self.isotope.is_some()
    }

    pub fn isotope_weight_number(&self) -> Option<u32> {
        self.isotope.map(|x| x.weight_number)
    }

    pub fn isotope_parent_peak_id(&self) -> Option<usize> {
        self.isotope.map(|x| x.parent_peak_id)
    }

    /// Charge of the envelope, unannotated peaks are treated as singly charged.
    pub fn charge(&self) -> u32 {
        self.isotope.map(|x| x.charge).unwrap_or(1)
    }
}
