use crate::job::JobId;
use thiserror::Error;

/// Failure produced by a job or an after-flush callback. Opaque to the
/// scheduler; it only routes these.
pub type JobError = Box<dyn std::error::Error + 'static>;

#[derive(Debug, Error)]
pub enum FlushError {
    /// A flush was requested while one is already draining the queue.
    #[error("flush already in progress")]
    AlreadyFlushing,

    /// A flush was requested from inside a job evaluation. Allowing it
    /// would corrupt the cursor and queue invariants mid-run.
    #[error("flush requested while a job evaluation is on the stack")]
    ReentrantEvaluation,

    /// A job's `run` failed. Scheduler state was reset before this was
    /// returned, so the scheduler stays usable.
    #[error("{label} failed during flush")]
    Job {
        id: JobId,
        label: String,
        #[source]
        source: JobError,
    },
}
