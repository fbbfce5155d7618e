//! CSV output backend.
//!
//! Creates `unit_counts.csv` in the configured output directory, one row per
//! unit per simulation day.

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::OutputWriter;
use crate::{OutputResult, UnitCountsRow};

pub(crate) const UNIT_COUNTS_HEADER: [&str; 13] = [
    "day",
    "unit",
    "population",
    "cases_today",
    "infections_today",
    "cum_cases_household",
    "cum_cases_place",
    "cum_cases_community",
    "cum_infections_household",
    "cum_infections_place",
    "cum_infections_community",
    "rolling_cases_10day",
    "rolling_infections_10day",
];

/// Writes unit counters to one CSV file.
pub struct CsvWriter {
    counts:   Writer<File>,
    finished: bool,
}

impl CsvWriter {
    /// Open (or create) `unit_counts.csv` in `dir` and write the header row.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let mut counts = Writer::from_path(dir.join("unit_counts.csv"))?;
        counts.write_record(UNIT_COUNTS_HEADER)?;
        Ok(Self { counts, finished: false })
    }
}

impl OutputWriter for CsvWriter {
    fn write_unit_counts(&mut self, rows: &[UnitCountsRow]) -> OutputResult<()> {
        for row in rows {
            self.counts.write_record(&[
                row.day.to_string(),
                row.unit.to_string(),
                row.population.to_string(),
                row.cases_today.to_string(),
                row.infections_today.to_string(),
                row.cum_cases_household.to_string(),
                row.cum_cases_place.to_string(),
                row.cum_cases_community.to_string(),
                row.cum_infections_household.to_string(),
                row.cum_infections_place.to_string(),
                row.cum_infections_community.to_string(),
                row.rolling_cases_10day.to_string(),
                row.rolling_infections_10day.to_string(),
            ])?;
        }
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.counts.flush()?;
        Ok(())
    }
}
