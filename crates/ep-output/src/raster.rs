//! Dense per-cell infection rasters.
//!
//! The grid covers the full patch map; each local person is attributed to
//! the anchor cell of their patch.  In a distributed run every rank fills
//! only its own residents, so a global image is the cell-wise sum of the
//! per-rank grids.  Image encoding itself lives outside this crate — a
//! [`RasterSink`] receives the filled grid and does whatever it wants.

use ep_pop::{CoreStatus, World};

use crate::OutputResult;

/// Per-cell counts for one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterCell {
    /// Persons claimed or actively infected.
    pub infected: u32,
    /// Persons recovered or vaccinated.
    pub immune:   u32,
}

/// A dense row-major grid of [`RasterCell`]s, origin at the south-west cell.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    pub width:  u32,
    pub height: u32,
    cells:      Vec<RasterCell>,
}

impl RasterGrid {
    /// Size the grid from the patch map and fill it from the rank's own
    /// residents.
    pub fn from_world(world: &World) -> Self {
        let (mut width, mut height) = (0, 0);
        for patch in &world.patches {
            width = width.max(patch.geometry.x + patch.geometry.size);
            height = height.max(patch.geometry.y + patch.geometry.size);
        }
        let mut grid = RasterGrid {
            width,
            height,
            cells: vec![RasterCell::default(); (width as usize) * (height as usize)],
        };
        for person in world.persons.person_ids() {
            let geom = &world.patches[world.persons.patch[person.index()].index()].geometry;
            let cell = &mut grid.cells[(geom.y * width + geom.x) as usize];
            match world.persons.status(person).load().core() {
                CoreStatus::Susceptible => {}
                CoreStatus::Contacted => cell.infected += 1,
                CoreStatus::Immune => cell.immune += 1,
            }
        }
        grid
    }

    pub fn at(&self, x: u32, y: u32) -> &RasterCell {
        &self.cells[(y * self.width + x) as usize]
    }

    pub fn cells(&self) -> &[RasterCell] {
        &self.cells
    }
}

/// Receives one filled raster per snapshot day.
pub trait RasterSink {
    fn write_raster(&mut self, day: u64, grid: &RasterGrid) -> OutputResult<()>;
}
