//! Household transmission.
//!
//! Households never span ranks, so household contacts skip the distributed
//! round entirely: a successful claim is committed immediately.

use ep_core::WorkerRng;
use ep_pop::{CaseHandle, Channel, CoreStatus, InfectedCase, PersonId, PlaceId};

use crate::ctx::StepCtx;
use crate::outcome::PendingInfection;
use crate::stats::StatsDelta;

/// Per-member infection probability for one step.
///
/// `1 − exp(−B_hh · seasonality · infectiousness · (hours_home/24) /
/// (size − 1) / steps_per_day)` — the exponent is the member's share of the
/// infector's home-time force of infection for this step.  The rate picks up
/// the quarantine multiplier while the household sits in an active quarantine
/// window, and the closure multiplier while the infector's place is closed.
fn member_probability(ctx: &StepCtx<'_>, case: &InfectedCase, size: u32) -> f64 {
    let disease = &ctx.world.disease;
    let live = ctx.live_of_patch(case.patch);
    let mut rate_mult = 1.0;
    if ctx.household_of(case.person).is_quarantined(ctx.step) {
        rate_mult *= live.quarantine_mult.unwrap_or(1.0);
    }
    let place = ctx.world.persons.place[case.person.index()];
    if place != PlaceId::INVALID && ctx.world.places[place.index()].is_closed(ctx.step) {
        rate_mult *= live.closure_mult.unwrap_or(1.0);
    }
    let infectiousness = ctx.infectiousness(case.infectiousness, &live);
    let steps_per_day = f64::from(ctx.world.config.steps_per_day);
    let force = disease.b_household
        * ctx.seasonality
        * infectiousness
        * rate_mult
        * (disease.hours_home / 24.0)
        / f64::from(size - 1)
        / steps_per_day;
    1.0 - (-force).exp()
}

/// Expose the infector's household members for one step.
pub fn household_contacts(
    ctx: &StepCtx<'_>,
    handle: CaseHandle,
    case: &InfectedCase,
    rng: &mut WorkerRng,
    stats: &mut StatsDelta,
    out: &mut Vec<PendingInfection>,
) {
    let hh = ctx.household_of(case.person);
    let size = hh.size();
    if size <= 1 || hh.susceptible_left() == 0 {
        return;
    }
    let live = ctx.live_of_patch(case.patch);
    let p = member_probability(ctx, case, size);
    let unit = ctx.unit_of_patch(case.patch);

    for idx in hh.people.clone() {
        let member = PersonId(idx);
        if member == case.person {
            continue;
        }
        // Cheap pre-check before spending RNG draws on a settled person.
        if ctx.world.persons.status(member).load().core() != CoreStatus::Susceptible {
            continue;
        }
        let accept = p * ctx.susceptibility_of(member, &live);
        if !rng.gen_bool(accept) {
            continue;
        }
        if ctx.world.persons.status(member).claim_susceptible() {
            hh.note_claim();
            out.push(PendingInfection {
                person:  member,
                channel: Channel::Household,
                step:    ctx.step,
                source:  Some(handle),
            });
            if let Some(unit) = unit {
                stats.record_infection(unit, Channel::Household);
            }
        }
    }
}
