use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// Per-file heights of both spots correlate across the samples.
    #[serde(rename = "correlation")]
    Correlation,
    /// `to_id` is an isotopologue (or the parent) of `from_id`.
    #[serde(rename = "isotope")]
    Isotope,
    /// Adduct relation anchored on an identified spot.
    #[serde(rename = "adduct_by_identification")]
    AdductByIdentification,
    /// Adduct relation derived from the masses observed in a representative file.
    #[serde(rename = "adduct_by_representative")]
    AdductByRepresentative,
}

/// A directed edge between two alignment spots, by alignment id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpotLink {
    pub from_id: usize,
    pub to_id: usize,
    pub kind: LinkKind,
    pub score: f64,
}

impl SpotLink {
    pub fn new(from_id: usize, to_id: usize, kind: LinkKind, score: f64) -> Self {
        Self {
            from_id,
            to_id,
            kind,
            score,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            from_id: self.to_id,
            to_id: self.from_id,
            ..*self
        }
    }
}
