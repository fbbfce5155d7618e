//! Request servicing and contact-order reconciliation.
//!
//! The resolution pass services incoming request fragments against the local
//! population (workers stride the fragment sequence), gathers replies per
//! original infector, and merges accepted orders with the infector's local
//! tentative orders.  Remote acceptances stand wherever they land — the
//! person was claimed on the resolving rank — so the merge only arbitrates
//! which *local* tentative claims survive.

use ep_core::{RankId, WorkerRng};
use ep_exchange::wire::{ContactRecord, PlaceEvent, ReplyFragment, RequestFragment};
use ep_exchange::WorkerBuffers;
use ep_kernel::{center_distance_km, grid_distance_km};
use ep_pop::{
    CaseHandle, Channel, CoreStatus, InfectedCase, PersonId, TentativeContact, TimeWindow, World,
};

use crate::community::RETRY_BUDGET;
use crate::ctx::StepCtx;
use crate::outcome::PendingInfection;
use crate::stats::StatsDelta;

// ── Request servicing ─────────────────────────────────────────────────────

/// Spatial acceptance for a serviced record, from the *target* patch's
/// kernel (the resolver owns the target, not the source).
fn record_acceptance(world: &World, record: &ContactRecord, source_x: u32, source_y: u32) -> f64 {
    let Some(source) = world.patch_at(source_x, source_y) else {
        return 1.0;
    };
    let Some(target) = world.patch_at(record.target_x, record.target_y) else {
        return 0.0;
    };
    if source == target {
        return 1.0;
    }
    let Some(kernel) = world.kernel_of_patch(target) else {
        return 1.0;
    };
    let a = &world.patches[source.index()].geometry;
    let b = &world.patches[target.index()].geometry;
    let nearest = kernel.kernel_f(grid_distance_km(a, b, &world.grid));
    if nearest <= 0.0 {
        return 0.0;
    }
    (kernel.kernel_f(center_distance_km(a, b, &world.grid)) / nearest).min(1.0)
}

/// Service one request fragment: attempt every record against the local
/// population, push one reply fragment toward the infector's rank, and
/// return the accepted contacts as pending infections.
pub fn service_request(
    ctx: &StepCtx<'_>,
    frag: &RequestFragment,
    rng: &mut WorkerRng,
    buffers: &mut WorkerBuffers,
    stats: &mut StatsDelta,
    out: &mut Vec<PendingInfection>,
) {
    let world = ctx.world;
    let mut accepted = Vec::new();

    for record in &frag.records {
        let Some(target) = world.patch_at(record.target_x, record.target_y) else {
            log::warn!(
                "request record names unknown patch ({}, {}); skipped",
                record.target_x,
                record.target_y
            );
            continue;
        };
        let Some(lp) = world.local_patch(target) else {
            log::warn!("request record targets patch {target} this rank does not own; skipped");
            continue;
        };
        if lp.population() == 0 {
            continue;
        }
        if !rng.gen_bool(record_acceptance(world, record, frag.infector_x, frag.infector_y)) {
            continue;
        }
        let live = ctx.live_of_patch(target);

        // The claim races against local generation; retry the person pick
        // until somebody susceptible is found or the budget runs out.
        for _ in 0..RETRY_BUDGET {
            let person = PersonId(rng.gen_range(lp.people.clone()));
            if world.persons.status(person).load().core() != CoreStatus::Susceptible {
                continue;
            }
            if !rng.gen_bool(ctx.susceptibility_of(person, &live)) {
                break; // the contacted person refused; the record is spent
            }
            if world.persons.status(person).claim_susceptible() {
                ctx.household_of(person).note_claim();
                accepted.push(record.order);
                out.push(PendingInfection {
                    person,
                    channel: Channel::Community,
                    step: record.step,
                    source: Some(frag.case),
                });
                if let Some(unit) = ctx.unit_of_patch(target) {
                    stats.record_infection(unit, Channel::Community);
                }
                break;
            }
        }
    }

    buffers.push_reply(frag.case.rank, &ReplyFragment::new(frag.case.case, accepted));
}

// ── Order reconciliation ──────────────────────────────────────────────────

/// Outcome of merging an infector's local tentative orders with the orders
/// its peers accepted.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Local tentative contacts confirmed as infections.
    pub confirmed: Vec<TentativeContact>,
    /// Local tentative contacts to release back to the susceptible pool.
    pub discarded: Vec<TentativeContact>,
}

/// Keep the first `n_contacts` orders of the merged local + remote sequence.
///
/// Lists are short, so an insertion sort into one merged vector beats
/// anything cleverer.  Remote acceptances beyond the cutoff already stand on
/// their resolving rank and are not revisited here.
pub fn merge_orders(
    tentative: &[TentativeContact],
    remote_accepted: &[u16],
    n_contacts: u32,
) -> MergeOutcome {
    let mut merged: Vec<u16> = Vec::with_capacity(tentative.len() + remote_accepted.len());
    for order in tentative
        .iter()
        .map(|t| t.order)
        .chain(remote_accepted.iter().copied())
    {
        let at = merged
            .iter()
            .position(|&o| o > order)
            .unwrap_or(merged.len());
        merged.insert(at, order);
    }
    merged.truncate(n_contacts as usize);

    let mut outcome = MergeOutcome::default();
    for &t in tentative {
        if merged.binary_search(&t.order).is_ok() {
            outcome.confirmed.push(t);
        } else {
            outcome.discarded.push(t);
        }
    }
    outcome
}

/// Release the claims of discarded tentative contacts.  Sequential phase:
/// the parallel round that produced the claims has fully completed.
pub fn release_discarded(world: &World, discarded: &[TentativeContact]) {
    for t in discarded {
        world.persons.status(t.person).release_claim();
        let hh = world.persons.household[t.person.index()];
        world.households[hh.index()].note_release();
    }
}

// ── Establishment events ──────────────────────────────────────────────────

/// Effective susceptibility for the event path, mirroring the generation
/// path's prophylaxis handling.
fn event_susceptibility(world: &World, person: PersonId, step: ep_core::Step) -> f64 {
    use ep_pop::status::flag;
    let patch = world.persons.patch[person.index()];
    let live = world
        .local_patch(patch)
        .and_then(|lp| world.units.get(lp.unit.index()))
        .map(|u| u.live)
        .unwrap_or_default();
    let mut s = f64::from(world.persons.susceptibility[person.index()]);
    if let Some(mult) = live.prophylaxis_mult {
        let hh = world.persons.household[person.index()];
        let flagged = world.persons.status(person).load().has(flag::PROPHYLAXED);
        if flagged || world.households[hh.index()].is_prophylaxed(step) {
            s *= mult;
        }
    }
    s
}

/// Apply received place events.  Single-threaded, applied after the
/// resolution pass; infection events carry a precomputed infectiousness and
/// get no acceptance kernel.
pub fn apply_place_events(
    world: &mut World,
    now: ep_core::Step,
    events: &[PlaceEvent],
    from: RankId,
    rng: &mut WorkerRng,
    stats: &mut StatsDelta,
    out: &mut Vec<PendingInfection>,
) {
    for event in events {
        match *event {
            PlaceEvent::Infection { place, group, member, step, infectiousness, source } => {
                let Some(p) = world.places.get(place.index()) else {
                    log::warn!("place event from rank {} names unknown place {place}", from.0);
                    continue;
                };
                let members = p.local_in_group(ep_core::GroupId(group));
                let Some(&person) = members.get(member as usize) else {
                    log::warn!(
                        "place event from rank {} addresses member {member} of place {place} \
                         group {group}, which holds {}",
                        from.0,
                        members.len()
                    );
                    continue;
                };
                if world.persons.status(person).load().core() != CoreStatus::Susceptible {
                    continue;
                }
                let p_infect =
                    event_susceptibility(world, person, now) * f64::from(infectiousness);
                if !rng.gen_bool(p_infect) {
                    continue;
                }
                if world.persons.status(person).claim_susceptible() {
                    let hh = world.persons.household[person.index()];
                    world.households[hh.index()].note_claim();
                    out.push(PendingInfection {
                        person,
                        channel: Channel::Place,
                        step,
                        source: Some(source),
                    });
                    let patch = world.persons.patch[person.index()];
                    if let Some(unit) = world.local_patch(patch).map(|lp| lp.unit) {
                        stats.record_infection(unit, Channel::Place);
                    }
                }
            }
            PlaceEvent::Closure { place, until } => {
                if let Some(p) = world.places.get_mut(place.index()) {
                    p.closure = Some(TimeWindow::new(now, until));
                } else {
                    log::warn!("closure event names unknown place {place}");
                }
            }
            PlaceEvent::Prophylaxis { place, until } => {
                if let Some(p) = world.places.get_mut(place.index()) {
                    p.prophylaxis = Some(TimeWindow::new(now, until));
                } else {
                    log::warn!("prophylaxis event names unknown place {place}");
                }
            }
        }
    }
}

/// Confirmed-or-not bookkeeping for one infector after its replies arrived.
pub fn reconcile_case(
    world: &World,
    case: &mut InfectedCase,
    remote_accepted: &[u16],
) -> Vec<TentativeContact> {
    let outcome = merge_orders(&case.tentative, remote_accepted, case.n_contacts);
    release_discarded(world, &outcome.discarded);
    case.clear_round();
    outcome.confirmed
}

/// `CaseHandle` for a case owned by this rank.
#[inline]
pub fn own_handle(world: &World, case: ep_core::CaseId) -> CaseHandle {
    CaseHandle { rank: world.config.rank, case }
}
