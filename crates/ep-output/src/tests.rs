//! Integration tests for ep-output.

use ep_core::{PersonId, RankId, SimConfig, Step};
use ep_kernel::{GridSpec, KernelParams, PatchGeometry};
use ep_pop::{DiseaseParams, World, WorldBuilder};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn grid() -> GridSpec {
    GridSpec {
        origin_lat: 50.0,
        origin_lon: 8.0,
        cell_deg_lat: 0.1,
        cell_deg_lon: 0.1,
    }
}

fn kernel() -> KernelParams {
    KernelParams { scale_km: 4.0, shape: 3.0, cutoff_km: 2000.0 }
}

/// Deterministic household-only outbreak: the seed infects its three
/// housemates at onset and everyone recovers on schedule.
fn seeded_household_world() -> (World, Vec<PersonId>) {
    let disease = DiseaseParams {
        b_household: 1e6,
        b_place: [0.0, 0.0],
        b_community: 0.0,
        p_symptomatic: 0.0,
        ..DiseaseParams::default()
    };
    let mut b = WorldBuilder::new(SimConfig::default(), grid(), disease);
    let unit = b.unit(None, kernel());
    let patch = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), 4);
    let (_, people) = b.household(patch, &[40, 38, 11, 8]).unwrap();
    b.seed(Step(0), people[0]);
    (b.build().unwrap(), people)
}

fn row(day: u64, unit: u16) -> crate::UnitCountsRow {
    crate::UnitCountsRow {
        day,
        unit,
        population: 100,
        cases_today: 2,
        infections_today: 5,
        cum_cases_household: 1,
        cum_cases_place: 0,
        cum_cases_community: 1,
        cum_infections_household: 3,
        cum_infections_place: 0,
        cum_infections_community: 2,
        rolling_cases_10day: 4,
        rolling_infections_10day: 9,
    }
}

// ── CSV tests ─────────────────────────────────────────────────────────────────

mod csv_tests {
    use tempfile::TempDir;

    use crate::csv::CsvWriter;
    use crate::writer::OutputWriter;

    use super::row;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    #[test]
    fn csv_file_created_with_header() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        assert!(dir.path().join("unit_counts.csv").exists());

        let mut rdr = csv::Reader::from_path(dir.path().join("unit_counts.csv")).unwrap();
        let headers: Vec<_> = rdr.headers().unwrap().iter().map(str::to_owned).collect();
        assert_eq!(headers, crate::csv::UNIT_COUNTS_HEADER);
    }

    #[test]
    fn csv_row_round_trip() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_unit_counts(&[row(3, 0), row(3, 1)]).unwrap();
        w.finish().unwrap();

        let mut rdr = csv::Reader::from_path(dir.path().join("unit_counts.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "3"); // day
        assert_eq!(&rows[0][1], "0"); // unit
        assert_eq!(&rows[1][1], "1");
        assert_eq!(&rows[0][8], "3"); // cum_infections_household
        assert_eq!(&rows[0][12], "9"); // rolling_infections_10day
    }

    #[test]
    fn csv_finish_idempotent() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        w.finish().unwrap(); // second call should not panic
    }

    #[test]
    fn csv_empty_batch_ok() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_unit_counts(&[]).unwrap();
    }
}

// ── Raster tests ──────────────────────────────────────────────────────────────

mod raster_tests {
    use ep_core::{RankId, SimConfig};
    use ep_kernel::PatchGeometry;
    use ep_pop::{CoreStatus, DiseaseParams, WorldBuilder};

    use crate::raster::RasterGrid;

    use super::{grid, kernel, seeded_household_world};

    #[test]
    fn raster_counts_claimed_and_immune() {
        let (world, people) = seeded_household_world();
        assert!(world.persons.status(people[0]).claim_susceptible());
        world.persons.status(people[1]).set_core(CoreStatus::Immune);

        let raster = RasterGrid::from_world(&world);
        assert_eq!((raster.width, raster.height), (1, 1));
        let cell = raster.at(0, 0);
        assert_eq!(cell.infected, 1);
        assert_eq!(cell.immune, 1);
    }

    #[test]
    fn raster_spans_remote_patches_but_counts_only_residents() {
        let config = SimConfig { ranks: 2, ..SimConfig::default() };
        let mut b = WorldBuilder::new(config, grid(), DiseaseParams::default());
        let unit = b.unit(None, kernel());
        let own = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), 1);
        b.patch(unit, PatchGeometry::new(3, 2, 1), RankId(1), 1_000);
        let (_, people) = b.household(own, &[25]).unwrap();
        let world = b.build().unwrap();
        world.persons.status(people[0]).set_core(CoreStatus::Immune);

        let raster = RasterGrid::from_world(&world);
        assert_eq!((raster.width, raster.height), (4, 3));
        assert_eq!(raster.at(0, 0).immune, 1);
        // The remote patch contributes extent, never counts.
        assert_eq!(*raster.at(3, 2), Default::default());
    }
}

// ── End-to-end engine runs ────────────────────────────────────────────────────

mod engine_tests {
    use std::sync::{Arc, Mutex};

    use ep_exchange::LocalCollective;
    use tempfile::TempDir;

    use crate::csv::CsvWriter;
    use crate::observer::StepOutputObserver;
    use crate::raster::{RasterGrid, RasterSink};
    use crate::OutputResult;

    use super::seeded_household_world;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    /// Captures the (0, 0) cell of every raster it is fed.
    struct CaptureSink(Arc<Mutex<Vec<(u64, u32, u32)>>>);

    impl RasterSink for CaptureSink {
        fn write_raster(&mut self, day: u64, grid: &RasterGrid) -> OutputResult<()> {
            let cell = grid.at(0, 0);
            self.0.lock().unwrap().push((day, cell.infected, cell.immune));
            Ok(())
        }
    }

    #[test]
    fn observer_writes_one_row_per_unit_per_day() {
        let (world, _) = seeded_household_world();
        let collective = LocalCollective::fabric(1).remove(0);
        let mut engine = ep_sim::Engine::new(world, Vec::new(), collective).unwrap();

        let dir = tmp();
        let writer = CsvWriter::new(dir.path()).unwrap();
        let captured = Arc::new(Mutex::new(Vec::new()));
        let mut obs = StepOutputObserver::new(writer)
            .with_raster(Box::new(CaptureSink(Arc::clone(&captured))));
        engine.run(&mut obs).unwrap();
        assert!(obs.take_error().is_none(), "no write errors expected");

        // Seed recovers at step 28, housemates at 36; the last day boundary
        // reached is day 8 (end of step 35), for 9 snapshot rows.
        let mut rdr = csv::Reader::from_path(dir.path().join("unit_counts.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 9);
        assert_eq!(&rows[0][0], "0");
        // Day 0: only the seed has been infected.
        assert_eq!(&rows[0][10], "1"); // cum_infections_community
        assert_eq!(&rows[0][8], "0"); //  cum_infections_household
        // Day 8: the three housemates landed on the household channel.
        assert_eq!(&rows[8][0], "8");
        assert_eq!(&rows[8][8], "3");
        assert_eq!(&rows[8][10], "1");

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 9);
        // Day 0: the seed is an active case.  Day 8: the seed has recovered
        // and its three housemates are still infected (they recover at 36).
        assert_eq!(captured[0], (0, 1, 0));
        assert_eq!(captured[8], (8, 3, 1));
    }
}

// ── SQLite tests ──────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
mod sqlite_tests {
    use tempfile::TempDir;

    use crate::sqlite::SqliteWriter;
    use crate::writer::OutputWriter;

    use super::row;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    #[test]
    fn sqlite_db_created() {
        let dir = tmp();
        let _w = SqliteWriter::new(dir.path()).unwrap();
        assert!(dir.path().join("output.db").exists());
    }

    #[test]
    fn sqlite_batch_insert_and_query() {
        let dir = tmp();
        let mut w = SqliteWriter::new(dir.path()).unwrap();
        w.write_unit_counts(&[row(0, 0), row(0, 1), row(1, 0)]).unwrap();
        w.finish().unwrap();

        let conn = rusqlite::Connection::open(dir.path().join("output.db")).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM unit_counts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 3);

        let (hh, rolling): (i64, i64) = conn
            .query_row(
                "SELECT cum_infections_household, rolling_infections_10day \
                 FROM unit_counts WHERE day = 1 AND unit = 0",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(hh, 3);
        assert_eq!(rolling, 9);
    }

    #[test]
    fn sqlite_empty_batch_ok() {
        let dir = tmp();
        let mut w = SqliteWriter::new(dir.path()).unwrap();
        w.write_unit_counts(&[]).unwrap();
        w.finish().unwrap();
    }
}
