//! Shared read-only context for one step of contact generation.

use ep_core::{PatchId, PersonId, RankId, Step, UnitId};
use ep_pop::status::flag;
use ep_pop::{Household, LiveParams, World};

/// Everything the per-case generators read but never write.  One instance is
/// built per step and shared by all workers.
pub struct StepCtx<'w> {
    pub world:          &'w World,
    pub step:           Step,
    /// Seasonal forcing for the current day.
    pub seasonality:    f64,
    pub hours_per_step: f64,
}

impl<'w> StepCtx<'w> {
    pub fn new(world: &'w World, step: Step) -> Self {
        let config = &world.config;
        let day = step.0 / u64::from(config.steps_per_day);
        StepCtx {
            world,
            step,
            seasonality: config.seasonality(day as f64),
            hours_per_step: 24.0 / f64::from(config.steps_per_day),
        }
    }

    #[inline]
    pub fn me(&self) -> RankId {
        self.world.config.rank
    }

    /// Live intervention multipliers of the unit owning `patch`, falling back
    /// to all-inactive for remote or unknown patches.
    pub fn live_of_patch(&self, patch: PatchId) -> LiveParams {
        self.world
            .local_patch(patch)
            .and_then(|lp| self.world.units.get(lp.unit.index()))
            .map(|u| u.live)
            .unwrap_or_default()
    }

    pub fn unit_of_patch(&self, patch: PatchId) -> Option<UnitId> {
        self.world.local_patch(patch).map(|lp| lp.unit)
    }

    pub fn household_of(&self, person: PersonId) -> &'w Household {
        let hh = self.world.persons.household[person.index()];
        &self.world.households[hh.index()]
    }

    /// Effective susceptibility of a person: the stored multiplier, reduced
    /// by prophylaxis (personal flag or household episode) when the owning
    /// unit has a prophylaxis measure live.
    pub fn susceptibility_of(&self, person: PersonId, live: &LiveParams) -> f64 {
        let mut s = f64::from(self.world.persons.susceptibility[person.index()]);
        if let Some(mult) = live.prophylaxis_mult {
            let flagged = self.world.persons.status(person).load().has(flag::PROPHYLAXED);
            if flagged || self.household_of(person).is_prophylaxed(self.step) {
                s *= mult;
            }
        }
        s
    }

    /// Infectiousness of a case after the treatment multiplier.
    pub fn infectiousness(&self, base: f64, live: &LiveParams) -> f64 {
        base * live.treatment_mult.unwrap_or(1.0)
    }
}
