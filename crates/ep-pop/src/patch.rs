//! Geographic patches: remote stubs and locally owned grid cells.

use std::ops::Range;

use ep_core::{PatchId, RankId, UnitId};
use ep_kernel::{PatchCdf, PatchGeometry};

/// A patch as known to every rank: geometry for distance computation plus
/// the rank that owns it.  Remote patches carry nothing else.
#[derive(Copy, Clone, Debug)]
pub struct Patch {
    pub geometry: PatchGeometry,
    pub owner: RankId,
    /// Total persons hosted (wherever they are owned).  Used as the CDF
    /// candidate weight; invariant after initialization.
    pub population: u32,
}

/// A patch owned by this rank: contiguous household/person ranges plus the
/// precomputed cumulative kernel distribution for community sampling.
#[derive(Debug, Default)]
pub struct LocalPatch {
    pub id: PatchId,

    /// The administrative unit this patch reports into.
    pub unit: UnitId,

    /// Contiguous household index range.
    pub households: Range<u32>,

    /// Contiguous person index range.
    pub people: Range<u32>,

    /// Cumulative kernel distribution over candidate target patches.
    /// Built once by `World::calculate_q`; empty until then.
    pub cdf: PatchCdf,
}

impl LocalPatch {
    pub fn population(&self) -> u32 {
        self.people.end - self.people.start
    }
}
