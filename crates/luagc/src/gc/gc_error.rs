// Collector error types
//
// - OutOfMemory: allocation over the configured limit, after one emergency collection
// - Finalizer: a finalizer returned an error or panicked; recorded, never propagated
// - InvariantViolation: debug-only consistency check failed
// - InvalidObject / TypeMismatch / InvalidTableKey: misuse of the mutator helpers

use crate::{GcId, GcObjectKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GcError {
    #[error("not enough memory: requested {requested} bytes, limit is {limit} bytes")]
    OutOfMemory { requested: usize, limit: usize },

    #[error("error in finalizer of object {object}: {message}")]
    Finalizer { object: GcId, message: String },

    /// A black object references a white one outside of a barrier
    #[error("tri-color invariant violated: black {holder} references white {target}")]
    InvariantViolation { holder: GcId, target: GcId },

    #[error("invalid object {0}")]
    InvalidObject(GcId),

    #[error("{expected} expected, got {found}")]
    TypeMismatch {
        expected: GcObjectKind,
        found: GcObjectKind,
    },

    #[error("table index is {0}")]
    InvalidTableKey(&'static str),

    /// Free-form error raised by finalizer bodies
    #[error("{0}")]
    Runtime(String),
}

pub type GcResult<T> = Result<T, GcError>;
