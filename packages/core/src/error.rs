//! Error taxonomy for the rendering core.

use crate::scheduler::FiberId;

/// A structural invariant was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("duplicate sibling key `{0}`")]
    DuplicateKey(String),
}

/// A component failed to produce a tree. Returned by render thunks; the
/// scheduler records it and retires the fiber.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// Failures surfaced to the embedding through the scheduler's observer
/// channel (single subscriber, latest wins).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("fiber {fiber} panicked while rendering: {message}")]
    RenderPanic { fiber: FiberId, message: String },
    #[error("fiber {fiber} failed to render: {source}")]
    RenderFailed {
        fiber: FiberId,
        #[source]
        source: RenderError,
    },
    #[error(transparent)]
    Structure(#[from] StructureError),
}
