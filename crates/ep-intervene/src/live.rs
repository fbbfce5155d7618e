//! Per-unit intervention state machines.
//!
//! Each (`Intervention`, unit) pair gets one [`LiveIntervention`] holding the
//! active flag, the pending switch day, and the activation day.  Evaluation
//! runs in the single-threaded phase after statistics reduction, so it may
//! freely mutate the unit's live parameter fields that the next step's
//! parallel contact phase will read.

use ep_pop::AdminUnit;

use crate::def::{Intervention, Measure};

/// State machine: inactive ⇄ active, with an optional armed switch day while
/// a delayed start trigger counts down.
#[derive(Clone, Debug)]
pub struct LiveIntervention {
    /// Index into the shared definition table.
    pub def:           usize,
    pub active:        bool,
    /// Day the pending activation takes effect; `None` when nothing is armed.
    pub pending:       Option<u64>,
    /// Day of the most recent activation, for duration-based stop triggers.
    pub activated_day: Option<u64>,
}

impl LiveIntervention {
    pub fn new(def: usize) -> Self {
        LiveIntervention { def, active: false, pending: None, activated_day: None }
    }

    /// Run one evaluation at `day`.  Re-evaluating with an unchanged
    /// condition is a no-op: an armed switch is never re-armed and an active
    /// measure is never re-activated, so the switch day cannot drift.
    pub fn evaluate(&mut self, def: &Intervention, unit: &mut AdminUnit, day: u64) {
        if self.active {
            if def.stop.fires(unit, day, self.activated_day) {
                self.deactivate(def, unit);
                log::debug!("intervention '{}' deactivated in unit {} on day {day}", def.name, unit.id);
            }
        } else if let Some(switch) = self.pending {
            if day >= switch {
                self.activate(def, unit, day);
            }
        } else if def.start.fires(unit, day, None) {
            let delay = def.start.delay_days();
            if delay == 0 {
                self.activate(def, unit, day);
            } else {
                self.pending = Some(day + delay);
            }
        }
    }

    fn activate(&mut self, def: &Intervention, unit: &mut AdminUnit, day: u64) {
        self.active = true;
        self.pending = None;
        self.activated_day = Some(day);
        match def.measure {
            Measure::BorderControl { deny } => unit.live.border_deny = Some(deny),
            Measure::Treatment { infectiousness_mult } => {
                unit.live.treatment_mult = Some(infectiousness_mult);
            }
            Measure::Prophylaxis { susceptibility_mult } => {
                unit.live.prophylaxis_mult = Some(susceptibility_mult);
            }
            Measure::Vaccination { rate_per_day } => {
                unit.live.vaccination_rate = Some(rate_per_day);
            }
            Measure::Quarantine { contact_mult } => {
                unit.live.quarantine_mult = Some(contact_mult);
            }
            Measure::Closure { household_mult } => {
                unit.live.closure_mult = Some(household_mult);
            }
        }
        log::debug!("intervention '{}' activated in unit {} on day {day}", def.name, unit.id);
    }

    fn deactivate(&mut self, def: &Intervention, unit: &mut AdminUnit) {
        self.active = false;
        self.pending = None;
        self.activated_day = None;
        match def.measure {
            Measure::BorderControl { .. } => unit.live.border_deny = None,
            Measure::Treatment { .. } => unit.live.treatment_mult = None,
            Measure::Prophylaxis { .. } => unit.live.prophylaxis_mult = None,
            Measure::Vaccination { .. } => unit.live.vaccination_rate = None,
            Measure::Quarantine { .. } => unit.live.quarantine_mult = None,
            Measure::Closure { .. } => unit.live.closure_mult = None,
        }
    }

    /// Whether anything is armed or active — used by the fixed-point
    /// termination check.
    pub fn is_idle(&self) -> bool {
        !self.active && self.pending.is_none()
    }
}

/// All live state for one rank's units: `slots[unit][k]` pairs with
/// definition `k` of the shared table.
#[derive(Debug, Default)]
pub struct InterventionSet {
    pub defs:  Vec<Intervention>,
    pub slots: Vec<Vec<LiveIntervention>>,
}

impl InterventionSet {
    pub fn new(defs: Vec<Intervention>, units: usize) -> Self {
        let slots = (0..units)
            .map(|_| (0..defs.len()).map(LiveIntervention::new).collect())
            .collect();
        InterventionSet { defs, slots }
    }

    /// Evaluate every (definition, unit) pair at `day`.
    pub fn evaluate_all(&mut self, units: &mut [AdminUnit], day: u64) {
        for (unit, lives) in units.iter_mut().zip(&mut self.slots) {
            for live in lives {
                live.evaluate(&self.defs[live.def], unit, day);
            }
        }
    }
}
