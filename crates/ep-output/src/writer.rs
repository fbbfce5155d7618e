//! The `OutputWriter` trait implemented by all backend writers.

use crate::{OutputResult, UnitCountsRow};

/// Trait implemented by the CSV and SQLite writers.
///
/// All methods are infallible from the observer's perspective — errors are
/// stored internally and retrieved with [`StepOutputObserver::take_error`].
///
/// [`StepOutputObserver::take_error`]: crate::StepOutputObserver::take_error
pub trait OutputWriter {
    /// Write one day's batch of unit-counter rows.
    fn write_unit_counts(&mut self, rows: &[UnitCountsRow]) -> OutputResult<()>;

    /// Flush and close all underlying file handles.
    ///
    /// Idempotent — safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}
