//! Framework error type.
//!
//! Sub-crates define their own error enums and either convert into `EpiError`
//! via `From` impls or wrap it as one variant.  Both patterns are acceptable;
//! prefer whichever keeps error sites clean.
//!
//! Most failures in a distributed run are *not* errors in the `Result` sense:
//! a node that bails out unilaterally deadlocks its peers at the next
//! collective round, so data inconsistencies are logged and clamped at the
//! site instead (see the `log` usage throughout the workspace).  `EpiError`
//! covers the cases where a caller can meaningfully react.

use thiserror::Error;

use crate::{PatchId, PersonId, UnitId};

/// The top-level error type for `ep-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum EpiError {
    #[error("person {0} not found")]
    PersonNotFound(PersonId),

    #[error("patch {0} not found")]
    PatchNotFound(PatchId),

    #[error("administrative unit {0} not found")]
    UnitNotFound(UnitId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for all `ep-*` crates.
pub type EpiResult<T> = Result<T, EpiError>;
