use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Display;
use std::ops::ControlFlow;
use std::sync::atomic::{
    AtomicBool,
    AtomicUsize,
    Ordering,
};

use crate::errors::{
    AlignmentError,
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    IsotopeClustering,
    Joining,
    GapFilling,
    Refinement,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::IsotopeClustering => "isotope clustering",
            PipelineStage::Joining => "peak joining",
            PipelineStage::GapFilling => "gap filling",
            PipelineStage::Refinement => "alignment refinement",
        };
        write!(f, "{}", name)
    }
}

/// Coarse progress reporting, called between per-file or per-spot iterations.
///
/// Returning `ControlFlow::Break(())` asks the running stage to stop, which
/// surfaces as [`AlignmentError::Cancelled`]. Stages that run in parallel may
/// finish the items already in flight before stopping.
pub trait ProgressReporter: Sync {
    fn report(&self, stage: PipelineStage, done: usize, total: usize) -> ControlFlow<()>;
}

impl<F> ProgressReporter for F
where
    F: Fn(PipelineStage, usize, usize) -> ControlFlow<()> + Sync,
{
    fn report(&self, stage: PipelineStage, done: usize, total: usize) -> ControlFlow<()> {
        self(stage, done, total)
    }
}

/// Reporter that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _stage: PipelineStage, _done: usize, _total: usize) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

pub(crate) fn check_progress(
    progress: &dyn ProgressReporter,
    stage: PipelineStage,
    done: usize,
    total: usize,
) -> Result<()> {
    match progress.report(stage, done, total) {
        ControlFlow::Continue(()) => Ok(()),
        ControlFlow::Break(()) => Err(AlignmentError::Cancelled { stage }),
    }
}

/// Progress shared by the workers of a parallel stage.
///
/// Once the reporter asks to stop, `is_cancelled` turns true and workers are
/// expected to skip their remaining items.
pub(crate) struct ParallelProgress<'a> {
    progress: &'a dyn ProgressReporter,
    stage: PipelineStage,
    total: usize,
    done: AtomicUsize,
    cancelled: AtomicBool,
}

impl<'a> ParallelProgress<'a> {
    pub(crate) fn new(progress: &'a dyn ProgressReporter, stage: PipelineStage, total: usize) -> Self {
        Self {
            progress,
            stage,
            total,
            done: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Marks one item as done and forwards to the reporter.
    pub(crate) fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if self.progress.report(self.stage, done, self.total).is_break() {
            self.cancelled.store(true, Ordering::Relaxed);
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        if self.is_cancelled() {
            Err(AlignmentError::Cancelled { stage: self.stage })
        } else {
            Ok(())
        }
    }
}
