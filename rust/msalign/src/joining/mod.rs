pub mod joiner;
pub mod spatial_hash;

pub use joiner::PeakJoiner;
pub use spatial_hash::{
    MasterEntry,
    MasterIndex,
};
