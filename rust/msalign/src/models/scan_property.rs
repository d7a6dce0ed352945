use serde::{
    Deserialize,
    Serialize,
};

use super::identification::{
    MatchResult,
    MatchSource,
};
use super::peak::{
    IonMode,
    IsotopeAnnotation,
    Peak,
};

/// A picked feature of one run, as handed over by the peak picker.
///
/// The `secondary_axis_value` is either a retention time or a drift time,
/// the engine does not care which one as long as the tolerances use the same unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanProperty {
    pub peak_id: usize,
    pub precursor_mz: f64,
    pub secondary_axis_value: f64,
    #[serde(default)]
    pub ion_mode: IonMode,
    pub height: f64,
    #[serde(default)]
    pub peak_width: f64,
    #[serde(default)]
    pub isotope: Option<IsotopeAnnotation>,
    #[serde(default)]
    pub identifications: Vec<MatchResult>,
}

impl ScanProperty {
    pub fn new(peak_id: usize, precursor_mz: f64, secondary_axis_value: f64, height: f64) -> Self {
        Self {
            peak_id,
            precursor_mz,
            secondary_axis_value,
            ion_mode: IonMode::default(),
            height,
            peak_width: 0.0,
            isotope: None,
            identifications: Vec::new(),
        }
    }

    pub fn with_peak_width(self, peak_width: f64) -> Self {
        Self { peak_width, ..self }
    }

    pub fn with_identification(mut self, identification: MatchResult) -> Self {
        self.identifications.push(identification);
        self
    }

    pub fn as_peak(&self) -> Peak {
        Peak {
            peak_id: self.peak_id,
            mass: self.precursor_mz,
            intensity: self.height,
            isotope: self.isotope,
        }
    }

    /// Isotope weight number, unannotated features count as monoisotopic.
    pub fn isotope_weight_number(&self) -> u32 {
        self.isotope.map(|x| x.weight_number).unwrap_or(0)
    }

    pub fn best_match(&self, source: MatchSource) -> Option<&MatchResult> {
        self.identifications
            .iter()
            .filter(|x| x.source == source)
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}
