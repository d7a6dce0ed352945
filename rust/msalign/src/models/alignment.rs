use serde::{
    Deserialize,
    Serialize,
};

use super::identification::{
    MatchResult,
    MatchSource,
};
use super::links::{
    LinkKind,
    SpotLink,
};
use super::peak::IonMode;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum FeatureStatus {
    /// Placeholder, no peak was picked or recovered for this file.
    #[default]
    #[serde(rename = "missing")]
    Missing,
    #[serde(rename = "detected")]
    Detected,
    #[serde(rename = "gap_filled")]
    GapFilled,
}

/// The value of one alignment spot in one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignedPeakFeature {
    pub file_id: usize,
    /// Index of the master list entry the spot was created from.
    pub master_peak_id: usize,
    pub peak_id: Option<usize>,
    pub mass: f64,
    pub secondary_axis_value: f64,
    pub apex_intensity: f64,
    pub peak_width: f64,
    pub status: FeatureStatus,
}

impl AlignedPeakFeature {
    pub fn placeholder(file_id: usize, master_peak_id: usize) -> Self {
        Self {
            file_id,
            master_peak_id,
            peak_id: None,
            mass: 0.0,
            secondary_axis_value: 0.0,
            apex_intensity: 0.0,
            peak_width: 0.0,
            status: FeatureStatus::Missing,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.status != FeatureStatus::Missing
    }
}

/// A cross-run cluster of features believed to be the same chemical entity.
///
/// Holds exactly one [`AlignedPeakFeature`] per registered file, indexed by file id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignmentSpotProperty {
    pub alignment_id: usize,
    pub master_alignment_id: usize,
    pub parent_alignment_id: Option<usize>,
    pub mass_center: f64,
    pub secondary_axis_center: f64,
    pub ion_mode: IonMode,
    pub charge: u32,
    pub isotope_weight_number: u32,
    pub representative_file_id: Option<usize>,
    pub aligned_peak_features: Vec<AlignedPeakFeature>,
    pub match_results: Vec<MatchResult>,
    pub adduct: Option<String>,
    pub correlation_links: Vec<SpotLink>,
    pub peak_links: Vec<SpotLink>,
    pub peak_group_id: Option<usize>,
}

impl AlignmentSpotProperty {
    pub fn new(
        alignment_id: usize,
        mass_center: f64,
        secondary_axis_center: f64,
        ion_mode: IonMode,
        num_files: usize,
    ) -> Self {
        Self {
            alignment_id,
            master_alignment_id: alignment_id,
            parent_alignment_id: None,
            mass_center,
            secondary_axis_center,
            ion_mode,
            charge: 1,
            isotope_weight_number: 0,
            representative_file_id: None,
            aligned_peak_features: (0..num_files)
                .map(|file_id| AlignedPeakFeature::placeholder(file_id, alignment_id))
                .collect(),
            match_results: Vec::new(),
            adduct: None,
            correlation_links: Vec::new(),
            peak_links: Vec::new(),
            peak_group_id: None,
        }
    }

    pub fn populated_features(&self) -> impl Iterator<Item = &AlignedPeakFeature> {
        self.aligned_peak_features
            .iter()
            .filter(|x| x.is_populated())
    }

    pub fn missing_file_ids(&self) -> Vec<usize> {
        self.aligned_peak_features
            .iter()
            .filter(|x| !x.is_populated())
            .map(|x| x.file_id)
            .collect()
    }

    /// Per-file apex intensities, zero for files without a value.
    pub fn heights(&self) -> Vec<f64> {
        self.aligned_peak_features
            .iter()
            .map(|x| if x.is_populated() { x.apex_intensity } else { 0.0 })
            .collect()
    }

    /// Mean apex intensity over the files holding a value.
    pub fn mean_height(&self) -> f64 {
        let (sum, count) = self
            .populated_features()
            .fold((0.0, 0usize), |(s, c), x| (s + x.apex_intensity, c + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    pub fn max_height(&self) -> f64 {
        self.populated_features()
            .map(|x| x.apex_intensity)
            .fold(0.0, f64::max)
    }

    pub fn fill_fraction(&self) -> f64 {
        if self.aligned_peak_features.is_empty() {
            return 0.0;
        }
        self.populated_features().count() as f64 / self.aligned_peak_features.len() as f64
    }

    /// The populated feature with the highest apex intensity.
    pub fn most_intense_feature(&self) -> Option<&AlignedPeakFeature> {
        self.populated_features()
            .max_by(|a, b| a.apex_intensity.total_cmp(&b.apex_intensity))
    }

    pub fn representative_feature(&self) -> Option<&AlignedPeakFeature> {
        self.representative_file_id
            .and_then(|x| self.aligned_peak_features.get(x))
            .filter(|x| x.is_populated())
    }

    pub fn best_match(&self, source: MatchSource) -> Option<&MatchResult> {
        self.match_results
            .iter()
            .filter(|x| x.source == source)
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }

    pub fn is_reference_matched(&self) -> bool {
        self.best_match(MatchSource::ReferenceLibrary).is_some()
    }

    pub fn is_text_db_matched(&self) -> bool {
        self.best_match(MatchSource::TextDatabase).is_some()
    }

    pub fn is_identified(&self) -> bool {
        !self.match_results.is_empty()
    }

    pub fn is_isotope(&self) -> bool {
        self.isotope_weight_number > 0
    }

    /// Recomputes mass and secondary axis centers as the mean over populated features.
    ///
    /// Leaves the centers untouched when no file holds a value.
    pub fn recompute_centers(&mut self) {
        let (mass, secondary, count) = self.populated_features().fold(
            (0.0, 0.0, 0usize),
            |(m, s, c), x| (m + x.mass, s + x.secondary_axis_value, c + 1),
        );
        if count > 0 {
            self.mass_center = mass / count as f64;
            self.secondary_axis_center = secondary / count as f64;
        }
    }

    pub fn add_link(&mut self, link: SpotLink) {
        let links = match link.kind {
            LinkKind::Correlation => &mut self.correlation_links,
            _ => &mut self.peak_links,
        };
        let exists = links
            .iter()
            .any(|x| x.to_id == link.to_id && x.kind == link.kind);
        if !exists {
            links.push(link);
        }
    }

    pub fn all_links(&self) -> impl Iterator<Item = &SpotLink> {
        self.correlation_links.iter().chain(self.peak_links.iter())
    }
}
