//! `StepOutputObserver<W>` — bridges `EngineObserver` to an `OutputWriter`.

use ep_core::Step;
use ep_pop::World;
use ep_sim::EngineObserver;

use crate::raster::{RasterGrid, RasterSink};
use crate::row::UnitCountsRow;
use crate::writer::OutputWriter;
use crate::OutputError;

/// An [`EngineObserver`] that writes per-day unit counters to any
/// [`OutputWriter`] backend, and optionally feeds a [`RasterSink`].
///
/// Errors from the writer are stored internally because `EngineObserver`
/// methods have no return value.  After `engine.run()` returns, check for
/// errors with [`take_error`][Self::take_error].
pub struct StepOutputObserver<W: OutputWriter> {
    writer:     W,
    raster:     Option<Box<dyn RasterSink>>,
    last_error: Option<OutputError>,
}

impl<W: OutputWriter> StepOutputObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, raster: None, last_error: None }
    }

    /// Also fill a [`RasterGrid`] every snapshot day and hand it to `sink`.
    pub fn with_raster(mut self, sink: Box<dyn RasterSink>) -> Self {
        self.raster = Some(sink);
        self
    }

    /// Take the stored write error (if any) after `engine.run()` returns.
    ///
    /// Returns `None` if all writes succeeded.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Unwrap the inner writer (e.g. to inspect files after the run).
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn store_err(&mut self, result: crate::OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: OutputWriter> EngineObserver for StepOutputObserver<W> {
    fn on_snapshot(&mut self, day: u64, world: &World) {
        let rows: Vec<UnitCountsRow> = world
            .units
            .iter()
            .map(|unit| UnitCountsRow::from_unit(day, unit))
            .collect();
        if !rows.is_empty() {
            let result = self.writer.write_unit_counts(&rows);
            self.store_err(result);
        }
        if let Some(sink) = self.raster.as_mut() {
            let grid = RasterGrid::from_world(world);
            let result = sink.write_raster(day, &grid);
            self.store_err(result);
        }
    }

    fn on_run_end(&mut self, _final_step: Step, _world: &World) {
        let result = self.writer.finish();
        self.store_err(result);
    }
}
