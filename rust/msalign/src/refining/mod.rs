pub mod grouping;
pub mod links;
pub mod merge;
pub mod refiner;
pub mod renumber;

pub use refiner::{
    AlignmentRefiner,
    RefinementConfig,
    RefinementReport,
};
