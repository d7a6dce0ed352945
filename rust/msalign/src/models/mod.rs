pub mod alignment;
pub mod identification;
pub mod links;
pub mod peak;
pub mod scan_property;
pub mod tolerance;

pub use alignment::{
    AlignedPeakFeature,
    AlignmentSpotProperty,
    FeatureStatus,
};
pub use identification::{
    AdductIon,
    MatchResult,
    MatchSource,
};
pub use links::{
    LinkKind,
    SpotLink,
};
pub use peak::{
    IonMode,
    IsotopeAnnotation,
    Peak,
};
pub use scan_property::ScanProperty;
pub use tolerance::AlignmentTolerance;
