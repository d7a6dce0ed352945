pub mod filler;
pub mod smoothing;

pub use filler::{
    ExpectedPosition,
    GapFiller,
    GapFillingConfig,
    GapFillingReport,
};
pub use smoothing::{
    SmoothingMethod,
    apply_smoothing,
};
