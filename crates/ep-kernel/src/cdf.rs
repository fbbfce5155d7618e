//! Per-patch cumulative kernel distribution.
//!
//! # Why this exists
//!
//! A community contact may land in any patch of the world.  Evaluating the
//! kernel against every patch per contact would cost O(patches) per draw.
//! Precomputing a cumulative distribution per *source* patch turns each draw
//! into one uniform sample plus a binary search — O(log candidates).
//!
//! The build is embarrassingly parallel: every local patch's distribution is
//! an independent normalization, so world construction can map over local
//! patches freely.

use ep_core::PatchId;

use crate::{GridSpec, KernelParams, PatchGeometry};

/// One candidate target patch for CDF construction.
#[derive(Copy, Clone, Debug)]
pub struct CdfCandidate {
    pub id: PatchId,
    pub geometry: PatchGeometry,
    /// Total persons hosted by the patch (on whichever rank owns it).
    pub population: u32,
}

// ── PatchCdf ──────────────────────────────────────────────────────────────────

/// Cumulative kernel distribution over candidate target patches.
///
/// `cum` is monotonically non-decreasing and its final element is exactly
/// 1.0, so every `r ∈ [0, 1)` maps to some entry.
#[derive(Clone, Debug, Default)]
pub struct PatchCdf {
    targets: Vec<PatchId>,
    cum: Vec<f64>,
}

impl PatchCdf {
    /// A distribution with no candidates; `select` always falls back to the
    /// source patch itself.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// The target patch for uniform draw `r ∈ [0, 1)`.
    ///
    /// Returns the *first* entry whose cumulative probability is ≥ `r`:
    /// a draw exactly on a boundary value resolves to the boundary entry
    /// itself, never the one below it, so distant low-mass patches are not
    /// undersampled.  With no candidates, returns `own`.
    pub fn select(&self, r: f64, own: PatchId) -> PatchId {
        if self.targets.is_empty() {
            return own;
        }
        let i = self.cum.partition_point(|&p| p < r);
        // r ≥ cum.last() can only arise from floating-point excess; clamp.
        self.targets[i.min(self.targets.len() - 1)]
    }

    /// Raw cumulative values, for invariant checks.
    pub fn cum(&self) -> &[f64] {
        &self.cum
    }

    /// Candidate patch IDs in cumulative order.
    pub fn targets(&self) -> &[PatchId] {
        &self.targets
    }
}

// ── Construction ──────────────────────────────────────────────────────────────

/// Build the cumulative kernel distribution for one source patch.
///
/// Candidate weight = `kernel_f(patch distance) × population`.  Candidates
/// with zero weight (beyond the cutoff, or unpopulated) are omitted entirely;
/// if *no* candidate qualifies the result is empty and `select` falls back
/// to the source patch.  The source patch itself is a candidate like any
/// other (distance 0, kernel value 1).
pub fn build_cdf(
    source: &PatchGeometry,
    candidates: &[CdfCandidate],
    params: &KernelParams,
    grid: &GridSpec,
) -> PatchCdf {
    let mut targets = Vec::new();
    let mut weights = Vec::new();
    let mut total = 0.0_f64;

    for cand in candidates {
        if cand.population == 0 {
            continue;
        }
        let d = crate::grid_distance_km(source, &cand.geometry, grid);
        let w = params.kernel_f(d) * f64::from(cand.population);
        if w <= 0.0 {
            continue;
        }
        targets.push(cand.id);
        weights.push(w);
        total += w;
    }

    if targets.is_empty() {
        return PatchCdf::empty();
    }

    let mut cum = Vec::with_capacity(weights.len());
    let mut acc = 0.0_f64;
    for w in &weights {
        acc += w / total;
        cum.push(acc);
    }
    // Normalization leaves the last entry within an ulp of 1; pin it so the
    // "final element ≥ any sampled value" invariant holds exactly.
    if let Some(last) = cum.last_mut() {
        *last = 1.0;
    }

    PatchCdf { targets, cum }
}
