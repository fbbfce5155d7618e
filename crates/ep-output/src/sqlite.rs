//! SQLite output backend (feature `sqlite`).
//!
//! Creates a single `output.db` file in the configured output directory with
//! one `unit_counts` table keyed by (day, unit).

use std::path::Path;

use rusqlite::Connection;

use crate::writer::OutputWriter;
use crate::{OutputResult, UnitCountsRow};

/// Writes unit counters to an SQLite database.
pub struct SqliteWriter {
    conn:     Connection,
    finished: bool,
}

impl SqliteWriter {
    /// Open (or create) `output.db` in `dir` and initialise the schema.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let conn = Connection::open(dir.join("output.db"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS unit_counts (
                 day                       INTEGER NOT NULL,
                 unit                      INTEGER NOT NULL,
                 population                INTEGER NOT NULL,
                 cases_today               INTEGER NOT NULL,
                 infections_today          INTEGER NOT NULL,
                 cum_cases_household       INTEGER NOT NULL,
                 cum_cases_place           INTEGER NOT NULL,
                 cum_cases_community       INTEGER NOT NULL,
                 cum_infections_household  INTEGER NOT NULL,
                 cum_infections_place      INTEGER NOT NULL,
                 cum_infections_community  INTEGER NOT NULL,
                 rolling_cases_10day       INTEGER NOT NULL,
                 rolling_infections_10day  INTEGER NOT NULL,
                 PRIMARY KEY (day, unit)
             );",
        )?;

        Ok(Self { conn, finished: false })
    }
}

impl OutputWriter for SqliteWriter {
    fn write_unit_counts(&mut self, rows: &[UnitCountsRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO unit_counts \
                 (day, unit, population, cases_today, infections_today, \
                  cum_cases_household, cum_cases_place, cum_cases_community, \
                  cum_infections_household, cum_infections_place, \
                  cum_infections_community, rolling_cases_10day, \
                  rolling_infections_10day) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.day,
                    row.unit,
                    row.population,
                    row.cases_today,
                    row.infections_today,
                    row.cum_cases_household,
                    row.cum_cases_place,
                    row.cum_cases_community,
                    row.cum_infections_household,
                    row.cum_infections_place,
                    row.cum_infections_community,
                    row.rolling_cases_10day,
                    row.rolling_infections_10day,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}
