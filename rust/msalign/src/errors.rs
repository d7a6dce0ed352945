use thiserror::Error;

use crate::progress::PipelineStage;

#[derive(Debug, Error)]
pub enum DataProcessingError {
    #[error("Expected slices of the same length, got {expected} and {other} ({context})")]
    ExpectedSlicesSameLength {
        expected: usize,
        other: usize,
        context: String,
    },
    #[error("Expected non-empty data ({context:?})")]
    ExpectedNonEmptyData { context: Option<String> },
}

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("Alignment cancelled during {stage}")]
    Cancelled { stage: PipelineStage },
    #[error("Unknown file id {file_id}, registered files: {registered}")]
    UnknownFile { file_id: usize, registered: usize },
    #[error("Unable to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, AlignmentError>;
