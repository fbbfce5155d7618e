//! `ep-output` — simulation output writers for epigrid.
//!
//! Two tabular backends are provided behind Cargo features:
//!
//! | Feature  | Backend | Files created     |
//! |----------|---------|-------------------|
//! | *(none)* | CSV     | `unit_counts.csv` |
//! | `sqlite` | SQLite  | `output.db`       |
//!
//! Both implement [`OutputWriter`] and are driven by [`StepOutputObserver`],
//! which implements `ep_sim::EngineObserver`.  Spatial snapshots go through
//! [`RasterGrid`] and the [`RasterSink`] seam; image encoding is out of
//! scope here.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ep_output::{CsvWriter, StepOutputObserver};
//!
//! let writer = CsvWriter::new(Path::new("./output")).unwrap();
//! let mut obs = StepOutputObserver::new(writer);
//! engine.run(&mut obs).unwrap();
//! obs.take_error().map(|e| eprintln!("output error: {e}"));
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod raster;
pub mod row;
pub mod writer;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::StepOutputObserver;
pub use raster::{RasterCell, RasterGrid, RasterSink};
pub use row::UnitCountsRow;
pub use writer::OutputWriter;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWriter;
