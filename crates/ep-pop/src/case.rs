//! Infected-case registry and transient case state.
//!
//! An [`InfectedCase`] is a *scheduling token*, not part of the long-term
//! population model: it is created the instant a person leaves the
//! susceptible pool and destroyed when the recovery event fires.  Cross-rank
//! messages never carry addresses — a case is referenced remotely by its
//! [`CaseHandle`] (owning rank + registry slot) and resolved through the
//! owning rank's [`CaseRegistry`].

use ep_core::{CaseId, PatchId, PersonId, RankId, Step};

use crate::household::TimeWindow;

// ── CaseHandle ────────────────────────────────────────────────────────────────

/// Logical cross-rank reference to an infected case.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CaseHandle {
    pub rank: RankId,
    pub case: CaseId,
}

/// Transmission channel of a contact, for statistics bucketing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    Household,
    Place,
    Community,
}

// ── TravelPlan ────────────────────────────────────────────────────────────────

/// A temporary relocation episode: the case travels elsewhere, or a remote
/// visitor episode is attributed to this host.
#[derive(Clone, Debug)]
pub struct TravelPlan {
    /// Destination country code (reporting only).
    pub country: u16,
    /// The rank already chosen to host the episode.  Community contacts for
    /// the traveler are resolved against this rank even when the destination
    /// country spans further ranks — a documented approximation.
    pub target_rank: RankId,
    /// Person slot at the destination standing in for the traveler.
    pub sub_person: u32,
    /// When the episode is active.
    pub window: TimeWindow,
    /// Patch the episode resolves to, computed on first use and cached.
    pub resolved_patch: Option<PatchId>,
}

impl TravelPlan {
    #[inline]
    pub fn is_active(&self, step: Step) -> bool {
        self.window.contains(step)
    }
}

// ── TentativeContact ──────────────────────────────────────────────────────────

/// A locally claimed community contact awaiting the confirmation merge.
///
/// Household and place contacts are exempt from tentativeness — they need no
/// cross-rank arbitration and are committed immediately.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TentativeContact {
    pub person: PersonId,
    /// Position in the infector's global contact order.
    pub order: u16,
}

// ── InfectedCase ──────────────────────────────────────────────────────────────

/// Per-case state alive from infection to recovery.
#[derive(Debug)]
pub struct InfectedCase {
    pub person: PersonId,
    pub patch: PatchId,
    pub infected_at: Step,

    /// Steps from infection to infectiousness.
    pub latent_steps: u64,
    /// Steps of infectiousness; recovery fires at
    /// `infected_at + latent_steps + infectious_steps`.
    pub infectious_steps: u64,

    pub symptomatic: bool,
    pub severe: bool,

    /// Channel that produced this infection, for statistics bucketing.
    pub channel: Channel,

    /// Relative infectiousness multiplier; 1.0 baseline, reduced by treatment.
    pub infectiousness: f64,

    // ── Per-step community-draw state ─────────────────────────────────────
    /// The community-contact target sampled for the current step.
    pub n_contacts: u32,
    /// Next order index to hand out (shared across local and remote attempts).
    pub next_order: u16,
    /// Locally claimed contacts pending the confirmation merge.
    pub tentative: Vec<TentativeContact>,
    /// Ranks addressed by this case's remote attempts in the current step.
    pub remote_ranks: Vec<RankId>,

    pub travel: Option<TravelPlan>,
}

impl InfectedCase {
    pub fn new(person: PersonId, patch: PatchId, infected_at: Step) -> Self {
        Self {
            person,
            patch,
            infected_at,
            latent_steps: 0,
            infectious_steps: 0,
            symptomatic: false,
            severe: false,
            channel: Channel::Community,
            infectiousness: 1.0,
            n_contacts: 0,
            next_order: 0,
            tentative: Vec::new(),
            remote_ranks: Vec::new(),
            travel: None,
        }
    }

    /// The step at which the recovery event fires.
    #[inline]
    pub fn recovery_step(&self) -> Step {
        self.infected_at + self.latent_steps + self.infectious_steps
    }

    /// The step at which infectiousness (and any symptoms) begin.
    #[inline]
    pub fn onset_step(&self) -> Step {
        self.infected_at + self.latent_steps
    }

    /// Hand out the next contact-order index.
    #[inline]
    pub fn take_order(&mut self) -> u16 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    /// Reset the per-step draw state after the confirmation merge.
    pub fn clear_round(&mut self) {
        self.n_contacts = 0;
        self.next_order = 0;
        self.tentative.clear();
        self.remote_ranks.clear();
    }
}

// ── CaseRegistry ──────────────────────────────────────────────────────────────

/// Slab of live infected cases, addressed by `CaseId`.
///
/// Slots are recycled through a free list so `CaseId`s stay dense and the
/// slab never shrinks mid-run.  Only the recovery handler may call
/// [`remove`][Self::remove] — the scheduler invariant that every queued
/// event's case is still alive depends on it.
#[derive(Default)]
pub struct CaseRegistry {
    slots: Vec<Option<InfectedCase>>,
    free: Vec<CaseId>,
    live: usize,
}

impl CaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live cases.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn insert(&mut self, case: InfectedCase) -> CaseId {
        self.live += 1;
        match self.free.pop() {
            Some(id) => {
                self.slots[id.index()] = Some(case);
                id
            }
            None => {
                self.slots.push(Some(case));
                CaseId((self.slots.len() - 1) as u32)
            }
        }
    }

    pub fn get(&self, id: CaseId) -> Option<&InfectedCase> {
        self.slots.get(id.index()).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: CaseId) -> Option<&mut InfectedCase> {
        self.slots.get_mut(id.index()).and_then(|s| s.as_mut())
    }

    /// Free a case slot.  Recovery handler only.
    pub fn remove(&mut self, id: CaseId) -> Option<InfectedCase> {
        let case = self.slots.get_mut(id.index()).and_then(|s| s.take())?;
        self.free.push(id);
        self.live -= 1;
        Some(case)
    }

    /// IDs of all live cases, ascending.
    pub fn live_ids(&self) -> impl Iterator<Item = CaseId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| CaseId(i as u32))
    }
}
