//! Intent types produced by the parallel contact phase.
//!
//! Worker threads never mutate the case registry or schedule events
//! directly.  They emit a [`CaseDraw`] per infectious case and a list of
//! [`PendingInfection`]s; the engine writes the draws back into the cases
//! and commits the infections in the single-threaded phase that follows.
//! The only shared-state writes during the parallel phase are the status
//! claims and the household susceptible counters, both atomic.

use ep_core::{CaseId, PatchId, PersonId, RankId, Step};
use ep_pop::{CaseHandle, Channel, TentativeContact};

/// A claimed contact awaiting commit as an [`ep_pop::InfectedCase`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PendingInfection {
    pub person:  PersonId,
    pub channel: Channel,
    pub step:    Step,
    /// The infecting case; `None` for injected seeds.
    pub source:  Option<CaseHandle>,
}

/// One case's community-draw state for the current step, written back into
/// the case before the exchange round.
#[derive(Clone, Debug, Default)]
pub struct CaseDraw {
    pub case:       CaseId,
    /// The Poisson-sampled community-contact target.
    pub n_contacts: u32,
    next_order:     u16,
    /// Locally claimed contacts pending the confirmation merge.
    pub tentative:  Vec<TentativeContact>,
    /// Ranks addressed by this case's remote attempts, ascending, deduped.
    pub remote_ranks: Vec<RankId>,
    /// Travel episode patch resolved during this draw, to be cached on the
    /// case's travel plan.
    pub resolved_travel: Option<PatchId>,
}

impl CaseDraw {
    pub fn new(case: CaseId) -> Self {
        CaseDraw { case, ..CaseDraw::default() }
    }

    /// Hand out the next contact-order index.
    #[inline]
    pub fn take_order(&mut self) -> u16 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    #[inline]
    pub fn next_order(&self) -> u16 {
        self.next_order
    }

    /// The infector's locally-chosen orders, for the finalize step.
    pub fn local_orders(&self) -> Vec<u16> {
        self.tentative.iter().map(|t| t.order).collect()
    }

    pub fn note_remote(&mut self, rank: RankId) {
        if let Err(at) = self.remote_ranks.binary_search(&rank) {
            self.remote_ranks.insert(at, rank);
        }
    }
}

/// Everything one worker produced during the parallel contact phase.
#[derive(Debug, Default)]
pub struct WorkerOutcome {
    pub draws:      Vec<CaseDraw>,
    pub infections: Vec<PendingInfection>,
}

impl WorkerOutcome {
    pub fn clear(&mut self) {
        self.draws.clear();
        self.infections.clear();
    }
}
