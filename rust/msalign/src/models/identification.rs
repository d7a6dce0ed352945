use serde::{
    Deserialize,
    Serialize,
};

use super::peak::IonMode;

pub const PROTON_MASS: f64 = 1.007_276_466_88;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MatchSource {
    /// Spectral (MS/MS) reference library match.
    #[serde(rename = "reference_library")]
    ReferenceLibrary,
    /// Mass (and optionally secondary axis) match against a text database.
    #[serde(rename = "text_database")]
    TextDatabase,
}

/// Identification attached to a feature by an upstream annotator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub source: MatchSource,
    pub name: String,
    pub score: f64,
    /// Adduct name as understood by [`AdductIon::from_name`], e.g. `"[M+Na]+"`.
    #[serde(default)]
    pub adduct: Option<String>,
}

impl MatchResult {
    pub fn new(source: MatchSource, name: impl Into<String>, score: f64) -> Self {
        Self {
            source,
            name: name.into(),
            score,
            adduct: None,
        }
    }

    pub fn with_adduct(self, adduct: impl Into<String>) -> Self {
        Self {
            adduct: Some(adduct.into()),
            ..self
        }
    }
}

/// An adduct ion type relating a neutral mass `M` to an observed m/z:
/// `mz = (multiplier * M + mass_shift) / charge`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdductIon {
    pub name: &'static str,
    pub mass_shift: f64,
    pub charge: u32,
    pub multiplier: u32,
    pub ion_mode: IonMode,
}

const fn adduct(
    name: &'static str,
    mass_shift: f64,
    charge: u32,
    multiplier: u32,
    ion_mode: IonMode,
) -> AdductIon {
    AdductIon {
        name,
        mass_shift,
        charge,
        multiplier,
        ion_mode,
    }
}

static KNOWN_ADDUCTS: [AdductIon; 12] = [
    adduct("[M+H]+", PROTON_MASS, 1, 1, IonMode::Positive),
    adduct("[M+NH4]+", 18.033_823, 1, 1, IonMode::Positive),
    adduct("[M+Na]+", 22.989_218, 1, 1, IonMode::Positive),
    adduct("[M+K]+", 38.963_158, 1, 1, IonMode::Positive),
    adduct("[M+H-H2O]+", -17.003_288, 1, 1, IonMode::Positive),
    adduct("[M+2H]2+", 2.0 * PROTON_MASS, 2, 1, IonMode::Positive),
    adduct("[2M+H]+", PROTON_MASS, 1, 2, IonMode::Positive),
    adduct("[M-H]-", -PROTON_MASS, 1, 1, IonMode::Negative),
    adduct("[M+Cl]-", 34.969_402, 1, 1, IonMode::Negative),
    adduct("[M+FA-H]-", 44.998_201, 1, 1, IonMode::Negative),
    adduct("[M-H2O-H]-", -19.018_390, 1, 1, IonMode::Negative),
    adduct("[M-2H]2-", -2.0 * PROTON_MASS, 2, 1, IonMode::Negative),
];

impl AdductIon {
    pub fn known_adducts(ion_mode: IonMode) -> impl Iterator<Item = &'static AdductIon> {
        KNOWN_ADDUCTS.iter().filter(move |x| x.ion_mode == ion_mode)
    }

    pub fn from_name(name: &str) -> Option<AdductIon> {
        KNOWN_ADDUCTS.iter().find(|x| x.name == name).copied()
    }

    /// The protonated/deprotonated adduct for the given charge, falling back to
    /// the singly charged form when no multiply charged one is tabulated.
    pub fn default_for(ion_mode: IonMode, charge: u32) -> AdductIon {
        let name = match (ion_mode, charge) {
            (IonMode::Positive, 2) => "[M+2H]2+",
            (IonMode::Positive, _) => "[M+H]+",
            (IonMode::Negative, 2) => "[M-2H]2-",
            (IonMode::Negative, _) => "[M-H]-",
        };
        Self::from_name(name).unwrap_or(KNOWN_ADDUCTS[0])
    }

    pub fn neutral_mass(&self, mz: f64) -> f64 {
        (mz * self.charge as f64 - self.mass_shift) / self.multiplier as f64
    }

    pub fn mz(&self, neutral_mass: f64) -> f64 {
        (neutral_mass * self.multiplier as f64 + self.mass_shift) / self.charge as f64
    }
}
