//! The event-queue bundle driving one rank's timestep loop.

use ep_core::{CaseId, SimConfig, Step};

use crate::ring::RollingQueue;
use crate::{ScheduleError, ScheduleResult};

/// Rolling-window length in steps: two days of slack plus the latent and
/// infectious cutoffs.  Strictly exceeds any legal event horizon, so no slot
/// is ever reused before being drained.
pub fn window_len(config: &SimConfig) -> usize {
    ((2 + config.latent_cutoff_days + config.infectious_cutoff_days) * config.steps_per_day)
        as usize
}

/// The four queues of the timestep loop.
///
/// Contact, symptom, and recovery events ride full rolling windows; the
/// confirmation queue is a two-slot toggle because confirmation always fires
/// exactly one step after scheduling.  The queues never free a case — only
/// the recovery handler (in `ep-sim`) removes cases from the registry.
pub struct EventQueues {
    pub contact: RollingQueue<CaseId>,
    pub symptom: RollingQueue<CaseId>,
    pub recovery: RollingQueue<CaseId>,

    confirm: [Vec<CaseId>; 2],
    toggle: usize,

    now: Step,
}

impl EventQueues {
    pub fn new(config: &SimConfig) -> Self {
        let window = window_len(config);
        let workers = config.workers.max(1);
        Self {
            contact: RollingQueue::new(window, workers),
            symptom: RollingQueue::new(window, workers),
            recovery: RollingQueue::new(window, workers),
            confirm: [Vec::new(), Vec::new()],
            toggle: 0,
            now: Step::ZERO,
        }
    }

    #[inline]
    pub fn now(&self) -> Step {
        self.now
    }

    /// Total events pending across all queues.
    pub fn pending(&self) -> usize {
        self.contact.len()
            + self.symptom.len()
            + self.recovery.len()
            + self.confirm[0].len()
            + self.confirm[1].len()
    }

    // ── Scheduling ────────────────────────────────────────────────────────

    fn offset_for(&self, at: Step) -> ScheduleResult<u64> {
        if at < self.now {
            return Err(ScheduleError::PastEvent { at, now: self.now });
        }
        Ok(at - self.now)
    }

    pub fn schedule_contact(&mut self, at: Step, worker: usize, case: CaseId) -> ScheduleResult<()> {
        self.contact.push(self.offset_for(at)?, worker, case)
    }

    pub fn schedule_symptom(&mut self, at: Step, worker: usize, case: CaseId) -> ScheduleResult<()> {
        self.symptom.push(self.offset_for(at)?, worker, case)
    }

    pub fn schedule_recovery(&mut self, at: Step, worker: usize, case: CaseId) -> ScheduleResult<()> {
        self.recovery.push(self.offset_for(at)?, worker, case)
    }

    /// Schedule `case` for confirmation at the *next* step.
    pub fn schedule_confirmation(&mut self, case: CaseId) {
        self.confirm[1 - self.toggle].push(case);
    }

    // ── Draining ──────────────────────────────────────────────────────────

    pub fn due_contacts(&mut self) -> Vec<CaseId> {
        self.contact.drain_current()
    }

    pub fn due_symptoms(&mut self) -> Vec<CaseId> {
        self.symptom.drain_current()
    }

    pub fn due_recoveries(&mut self) -> Vec<CaseId> {
        self.recovery.drain_current()
    }

    /// Cases scheduled one step ago, due for confirmation now.
    pub fn due_confirmations(&mut self) -> Vec<CaseId> {
        std::mem::take(&mut self.confirm[self.toggle])
    }

    /// Advance all queues to the next step.
    ///
    /// Call only after the current slots are drained.
    pub fn advance(&mut self) {
        self.contact.advance();
        self.symptom.advance();
        self.recovery.advance();
        self.toggle = 1 - self.toggle;
        self.now = Step(self.now.0 + 1);
    }
}
