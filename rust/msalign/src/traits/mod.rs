pub mod data_access;

pub use data_access::{
    DataAccessor,
    RawDataProvider,
    RawTracePoint,
};
