//! Place (school/workplace) transmission.
//!
//! The contact count is one Binomial draw over the place's other members; a
//! `p_group` fraction of contacts stays inside the infector's own group.
//! Members are addressed by group-wide ordinal and mapped through the
//! invariant per-rank counts: local members resolve immediately, remote
//! members produce an establishment-event fragment carrying the precomputed
//! infectiousness, with no acceptance kernel on the receiving side.

use ep_core::{GroupId, WorkerRng};
use ep_exchange::{PlaceEvent, WorkerBuffers};
use ep_pop::{CaseHandle, Channel, CoreStatus, InfectedCase, Place, PlaceId};
use rand_distr::{Binomial, Distribution};

use crate::ctx::StepCtx;
use crate::outcome::PendingInfection;
use crate::stats::StatsDelta;

/// Pick a (group, group-wide ordinal) pair for one contact.
fn pick_ordinal(
    place: &Place,
    own_group: GroupId,
    p_group: f64,
    rng: &mut WorkerRng,
) -> Option<(usize, u32)> {
    let in_group = place
        .groups
        .get(own_group.index())
        .is_some_and(|g| g.hosts_total > 1)
        && rng.gen_bool(p_group);
    if in_group {
        let g = &place.groups[own_group.index()];
        return Some((own_group.index(), rng.gen_range(0..g.hosts_total)));
    }
    if place.total_hosts == 0 {
        return None;
    }
    // Uniform over the whole place, walking groups to localize the ordinal.
    let mut rest = rng.gen_range(0..place.total_hosts);
    for (gi, g) in place.groups.iter().enumerate() {
        if rest < g.hosts_total {
            return Some((gi, rest));
        }
        rest -= g.hosts_total;
    }
    None
}

/// Generate place contacts for one case.
pub fn place_contacts(
    ctx: &StepCtx<'_>,
    handle: CaseHandle,
    case: &InfectedCase,
    rng: &mut WorkerRng,
    buffers: &mut WorkerBuffers,
    stats: &mut StatsDelta,
    out: &mut Vec<PendingInfection>,
) {
    let persons = &ctx.world.persons;
    let place_id = persons.place[case.person.index()];
    if place_id == PlaceId::INVALID {
        return;
    }
    let place = &ctx.world.places[place_id.index()];
    if place.is_closed(ctx.step) || place.total_hosts <= 1 {
        return;
    }

    let disease = &ctx.world.disease;
    let live = ctx.live_of_patch(case.patch);
    let hh = ctx.household_of(case.person);
    let quarantine_mult = if hh.is_quarantined(ctx.step) {
        live.quarantine_mult.unwrap_or(1.0)
    } else {
        1.0
    };
    let infectiousness = ctx.infectiousness(case.infectiousness, &live);
    let hours_out = (24.0 - disease.hours_home).max(0.0);
    let steps_per_day = f64::from(ctx.world.config.steps_per_day);
    let force = disease.b_place[place.kind as usize]
        * ctx.seasonality
        * infectiousness
        * quarantine_mult
        * (hours_out / 24.0)
        / f64::from(place.total_hosts - 1)
        / steps_per_day;
    let p_contact = (1.0 - (-force).exp()).clamp(0.0, 1.0);
    if p_contact <= 0.0 {
        return;
    }

    let n = Binomial::new(u64::from(place.total_hosts - 1), p_contact)
        .map(|d| d.sample(rng.inner()))
        .unwrap_or(0);
    if n == 0 {
        return;
    }

    let own_group = persons.group[case.person.index()];
    let me = ctx.me();
    let unit = ctx.unit_of_patch(case.patch);

    for _ in 0..n {
        let Some((gi, ordinal)) = pick_ordinal(place, own_group, disease.p_group, rng) else {
            continue;
        };
        let group = &place.groups[gi];
        let Some((rank, within)) = group.locate(ordinal) else {
            log::warn!("place {place_id} group {gi} ordinal {ordinal} outside rank counts");
            continue;
        };

        if rank == me.index() {
            let members = place.local_in_group(GroupId(gi as u16));
            let Some(&member) = members.get(within as usize) else {
                log::warn!(
                    "place {place_id} group {gi} declares {} local hosts but holds {}",
                    group.rank_counts[rank],
                    members.len()
                );
                continue;
            };
            if member == case.person {
                continue;
            }
            if persons.status(member).load().core() != CoreStatus::Susceptible {
                continue;
            }
            if !rng.gen_bool(ctx.susceptibility_of(member, &live)) {
                continue;
            }
            if persons.status(member).claim_susceptible() {
                ctx.household_of(member).note_claim();
                out.push(PendingInfection {
                    person:  member,
                    channel: Channel::Place,
                    step:    ctx.step,
                    source:  Some(handle),
                });
                if let Some(unit) = unit {
                    stats.record_infection(unit, Channel::Place);
                }
            }
        } else {
            buffers.push_event(
                ep_core::RankId(rank as u16),
                &PlaceEvent::Infection {
                    place:          place_id,
                    group:          gi as u16,
                    member:         within,
                    step:           ctx.step,
                    infectiousness: infectiousness as f32,
                    source:         handle,
                },
            );
        }
    }
}
