pub mod data_sources;
pub mod errors;
pub mod gap_filling;
pub mod isotopes;
pub mod joining;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod refining;
pub mod traits;
pub mod utils;

pub use data_sources::{
    InMemoryAccessor,
    InMemoryRawData,
    RawSpectrum,
};
pub use errors::{
    AlignmentError,
    DataProcessingError,
    Result,
};
pub use gap_filling::{
    GapFiller,
    GapFillingConfig,
    SmoothingMethod,
};
pub use isotopes::{
    IsotopeClusterer,
    IsotopeClusteringParams,
    cluster_isotopes,
};
pub use joining::PeakJoiner;
pub use models::{
    AlignedPeakFeature,
    AlignmentSpotProperty,
    AlignmentTolerance,
    FeatureStatus,
    IonMode,
    MatchResult,
    MatchSource,
    Peak,
    ScanProperty,
};
pub use pipeline::{
    AlignmentConfig,
    AlignmentPipeline,
    AlignmentResult,
    AlignmentStats,
};
pub use progress::{
    NoProgress,
    PipelineStage,
    ProgressReporter,
};
pub use refining::{
    AlignmentRefiner,
    RefinementConfig,
};
pub use traits::{
    DataAccessor,
    RawDataProvider,
    RawTracePoint,
};
