//! Unit tests for ep-contact.

use ep_core::{CaseId, PersonId, RankId, SimConfig, Step, UnitId, WorkerRng};
use ep_exchange::wire::{ByteReader, ContactRecord, PlaceEvent, ReplyFragment, RequestFragment};
use ep_exchange::SendBuffers;
use ep_kernel::{GridSpec, KernelParams, PatchGeometry};
use ep_pop::{
    AdminUnit, CaseHandle, Channel, CoreStatus, DiseaseParams, InfectedCase, PlaceKind,
    TentativeContact, TimeWindow, TravelPlan, World, WorldBuilder,
};

use crate::ctx::StepCtx;
use crate::outcome::CaseDraw;
use crate::resolve::{
    apply_place_events, merge_orders, own_handle, reconcile_case, release_discarded,
    service_request,
};
use crate::stats::{StatsDelta, apply_delta};
use crate::{community_contacts, household_contacts, place_contacts};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// 0.1°-cell grid anchored at (50°N, 8°E).
fn grid() -> GridSpec {
    GridSpec {
        origin_lat: 50.0,
        origin_lon: 8.0,
        cell_deg_lat: 0.1,
        cell_deg_lon: 0.1,
    }
}

fn kernel() -> KernelParams {
    KernelParams { scale_km: 4.0, shape: 3.0, cutoff_km: 2000.0 }
}

fn config(ranks: u16) -> SimConfig {
    SimConfig { ranks, ..SimConfig::default() }
}

fn rng() -> WorkerRng {
    WorkerRng::new(42, 0, 0)
}

/// One unit, one local patch at (0, 0), one household of `ages.len()` persons.
fn household_world(ages: &[u8], ranks: u16, disease: DiseaseParams) -> (World, Vec<PersonId>) {
    let mut b = WorldBuilder::new(config(ranks), grid(), disease);
    let unit = b.unit(None, kernel());
    let patch = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), ages.len() as u32);
    let (_, people) = b.household(patch, ages).unwrap();
    (b.build().unwrap(), people)
}

/// One unit, one local patch at (0, 0), `n` single-person households.
fn village_world(n: usize, ranks: u16, disease: DiseaseParams) -> World {
    let mut b = WorldBuilder::new(config(ranks), grid(), disease);
    let unit = b.unit(None, kernel());
    let patch = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), n as u32);
    for _ in 0..n {
        b.household(patch, &[30]).unwrap();
    }
    b.build().unwrap()
}

/// Take `person` out of the susceptible pool, as seeding does.
fn claim(world: &World, person: PersonId) {
    assert!(world.persons.status(person).claim_susceptible());
    let hh = world.persons.household[person.index()];
    world.households[hh.index()].note_claim();
}

fn infectious_case(world: &World, person: PersonId) -> InfectedCase {
    let mut case = InfectedCase::new(person, world.persons.patch[person.index()], Step(0));
    case.infectious_steps = 40;
    case
}

fn core_of(world: &World, person: PersonId) -> CoreStatus {
    world.persons.status(person).load().core()
}

fn tc(person: u32, order: u16) -> TentativeContact {
    TentativeContact { person: PersonId(person), order }
}

// ── Household transmission ────────────────────────────────────────────────────

#[cfg(test)]
mod household {
    use super::*;

    #[test]
    fn saturating_force_reaches_every_member() {
        let disease = DiseaseParams { b_household: 1e6, ..DiseaseParams::default() };
        let (world, people) = household_world(&[40, 38, 11, 8], 1, disease);
        claim(&world, people[0]);
        let case = infectious_case(&world, people[0]);
        let ctx = StepCtx::new(&world, Step(0));
        let handle = own_handle(&world, CaseId(0));
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        household_contacts(&ctx, handle, &case, &mut rng(), &mut stats, &mut out);

        assert_eq!(out.len(), 3);
        for inf in &out {
            assert_eq!(inf.channel, Channel::Household);
            assert_eq!(inf.source, Some(handle));
            assert_eq!(core_of(&world, inf.person), CoreStatus::Contacted);
        }
        assert_eq!(world.households[0].susceptible_left(), 0);
        let deltas = stats.to_wire();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].infections.household, 3);
    }

    #[test]
    fn zero_force_is_inert() {
        let disease = DiseaseParams { b_household: 0.0, ..DiseaseParams::default() };
        let (world, people) = household_world(&[40, 38, 11], 1, disease);
        claim(&world, people[0]);
        let case = infectious_case(&world, people[0]);
        let ctx = StepCtx::new(&world, Step(0));
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        household_contacts(
            &ctx,
            own_handle(&world, CaseId(0)),
            &case,
            &mut rng(),
            &mut stats,
            &mut out,
        );
        assert!(out.is_empty());
        assert!(stats.is_empty());
    }

    #[test]
    fn settled_members_are_skipped() {
        let disease = DiseaseParams { b_household: 1e6, ..DiseaseParams::default() };
        let (world, people) = household_world(&[40, 38, 11, 8], 1, disease);
        claim(&world, people[0]);
        world.persons.status(people[2]).set_core(CoreStatus::Immune);
        let case = infectious_case(&world, people[0]);
        let ctx = StepCtx::new(&world, Step(0));
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        household_contacts(
            &ctx,
            own_handle(&world, CaseId(0)),
            &case,
            &mut rng(),
            &mut stats,
            &mut out,
        );
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|inf| inf.person != people[2]));
    }

    /// Household of four with the first member attending a school.
    fn schooled_household() -> (World, Vec<PersonId>) {
        let disease = DiseaseParams { b_household: 1e6, ..DiseaseParams::default() };
        let mut b = WorldBuilder::new(config(1), grid(), disease);
        let unit = b.unit(None, kernel());
        let patch = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), 4);
        let (_, people) = b.household(patch, &[40, 38, 11, 8]).unwrap();
        let place = b.place(PlaceKind::School, 4);
        let group = b.place_group(place, 4);
        b.assign_place(people[0], place, group);
        (b.build().unwrap(), people)
    }

    #[test]
    fn closure_multiplier_requires_a_closed_place() {
        // The closure measure is live but no closure window covers the step,
        // so the saturating household force still reaches every member.
        let (mut world, people) = schooled_household();
        world.units[0].live.closure_mult = Some(0.0);
        claim(&world, people[0]);
        let case = infectious_case(&world, people[0]);
        let ctx = StepCtx::new(&world, Step(0));
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        household_contacts(
            &ctx,
            own_handle(&world, CaseId(0)),
            &case,
            &mut rng(),
            &mut stats,
            &mut out,
        );
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn closed_place_scales_the_household_rate() {
        let (mut world, people) = schooled_household();
        world.units[0].live.closure_mult = Some(0.0);
        world.places[0].closure = Some(TimeWindow::new(Step(0), Step(100)));
        claim(&world, people[0]);
        let case = infectious_case(&world, people[0]);
        let ctx = StepCtx::new(&world, Step(0));
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        household_contacts(
            &ctx,
            own_handle(&world, CaseId(0)),
            &case,
            &mut rng(),
            &mut stats,
            &mut out,
        );
        assert!(out.is_empty());
        assert!(stats.is_empty());
    }

    #[test]
    fn quarantined_household_rate_is_scaled() {
        let disease = DiseaseParams { b_household: 1e6, ..DiseaseParams::default() };
        let (mut world, people) = household_world(&[40, 38, 11], 1, disease);
        world.units[0].live.quarantine_mult = Some(0.0);
        world.households[0].quarantine = Some(TimeWindow::new(Step(0), Step(100)));
        claim(&world, people[0]);
        let case = infectious_case(&world, people[0]);
        let ctx = StepCtx::new(&world, Step(0));
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        household_contacts(
            &ctx,
            own_handle(&world, CaseId(0)),
            &case,
            &mut rng(),
            &mut stats,
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn single_person_household_is_inert() {
        let disease = DiseaseParams { b_household: 1e6, ..DiseaseParams::default() };
        let (world, people) = household_world(&[40], 1, disease);
        claim(&world, people[0]);
        let case = infectious_case(&world, people[0]);
        let ctx = StepCtx::new(&world, Step(0));
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        household_contacts(
            &ctx,
            own_handle(&world, CaseId(0)),
            &case,
            &mut rng(),
            &mut stats,
            &mut out,
        );
        assert!(out.is_empty());
    }
}

// ── Place transmission ────────────────────────────────────────────────────────

#[cfg(test)]
mod place {
    use super::*;

    fn hot_place() -> DiseaseParams {
        DiseaseParams {
            b_household: 0.0,
            b_place: [1e6, 1e6],
            p_group: 1.0,
            ..DiseaseParams::default()
        }
    }

    #[test]
    fn local_group_contacts_commit_immediately() {
        let mut b = WorldBuilder::new(config(1), grid(), hot_place());
        let unit = b.unit(None, kernel());
        let patch = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), 8);
        let (_, people) = b.household(patch, &[30, 30, 30, 30, 30, 30, 30, 30]).unwrap();
        let place = b.place(PlaceKind::Workplace, 8);
        let group = b.place_group(place, 8);
        for &p in &people {
            b.assign_place(p, place, group);
        }
        let world = b.build().unwrap();
        claim(&world, people[0]);
        let case = infectious_case(&world, people[0]);
        let ctx = StepCtx::new(&world, Step(0));
        let handle = own_handle(&world, CaseId(0));
        let mut buffers = SendBuffers::new(1, 1);
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        place_contacts(
            &ctx,
            handle,
            &case,
            &mut rng(),
            &mut buffers.workers_mut()[0],
            &mut stats,
            &mut out,
        );

        assert!(!out.is_empty());
        for inf in &out {
            assert_eq!(inf.channel, Channel::Place);
            assert_ne!(inf.person, people[0]);
            assert_eq!(core_of(&world, inf.person), CoreStatus::Contacted);
        }
        // All traffic was local.
        let merged = buffers.merge();
        assert!(merged.event[0].is_empty());
    }

    #[test]
    fn closed_place_is_inert() {
        let mut b = WorldBuilder::new(config(1), grid(), hot_place());
        let unit = b.unit(None, kernel());
        let patch = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), 4);
        let (_, people) = b.household(patch, &[30, 30, 30, 30]).unwrap();
        let place = b.place(PlaceKind::School, 4);
        let group = b.place_group(place, 4);
        for &p in &people {
            b.assign_place(p, place, group);
        }
        let mut world = b.build().unwrap();
        world.places[0].closure = Some(TimeWindow::new(Step(0), Step(100)));
        claim(&world, people[0]);
        let case = infectious_case(&world, people[0]);
        let ctx = StepCtx::new(&world, Step(0));
        let mut buffers = SendBuffers::new(1, 1);
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        place_contacts(
            &ctx,
            own_handle(&world, CaseId(0)),
            &case,
            &mut rng(),
            &mut buffers.workers_mut()[0],
            &mut stats,
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn remote_members_become_events() {
        // 64-host group: one local host (the infector), 63 on rank 1.
        let mut b = WorldBuilder::new(config(2), grid(), hot_place());
        let unit = b.unit(None, kernel());
        let patch = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), 1);
        let (_, people) = b.household(patch, &[30]).unwrap();
        let place = b.place(PlaceKind::Workplace, 64);
        let group = b.place_group_split(place, vec![1, 63]);
        b.assign_place(people[0], place, group);
        let world = b.build().unwrap();
        claim(&world, people[0]);
        let case = infectious_case(&world, people[0]);
        let ctx = StepCtx::new(&world, Step(0));
        let handle = own_handle(&world, CaseId(0));
        let mut buffers = SendBuffers::new(1, 2);
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        place_contacts(
            &ctx,
            handle,
            &case,
            &mut rng(),
            &mut buffers.workers_mut()[0],
            &mut stats,
            &mut out,
        );

        // The only local member is the infector, so nothing commits here.
        assert!(out.is_empty());
        let merged = buffers.merge();
        assert!(merged.event[0].is_empty());
        let events = PlaceEvent::decode_all(&merged.event[1]).unwrap();
        assert!(!events.is_empty());
        for ev in &events {
            match *ev {
                PlaceEvent::Infection { place: p, group: g, member, step, source, .. } => {
                    assert_eq!(p, place);
                    assert_eq!(g, 0);
                    assert!(member < 63);
                    assert_eq!(step, Step(0));
                    assert_eq!(source, handle);
                }
                _ => panic!("unexpected event {ev:?}"),
            }
        }
    }
}

// ── Community transmission ────────────────────────────────────────────────────

#[cfg(test)]
mod community {
    use super::*;

    fn hot_community() -> DiseaseParams {
        DiseaseParams { b_household: 0.0, b_community: 400.0, ..DiseaseParams::default() }
    }

    #[test]
    fn local_targets_are_claimed_tentatively() {
        let world = village_world(40, 1, hot_community());
        let seed = PersonId(0);
        claim(&world, seed);
        let case = infectious_case(&world, seed);
        let ctx = StepCtx::new(&world, Step(0));
        let mut buffers = SendBuffers::new(1, 1);
        let mut draw = CaseDraw::new(CaseId(0));

        community_contacts(
            &ctx,
            own_handle(&world, CaseId(0)),
            &case,
            &mut rng(),
            &mut buffers.workers_mut()[0],
            &mut draw,
        );

        assert!(draw.n_contacts > 0);
        assert!(!draw.tentative.is_empty());
        assert!(draw.tentative.len() <= draw.n_contacts as usize);
        assert!(draw.remote_ranks.is_empty());
        for pair in draw.tentative.windows(2) {
            assert!(pair[0].order < pair[1].order);
        }
        for t in &draw.tentative {
            assert_ne!(t.person, seed);
            assert_eq!(core_of(&world, t.person), CoreStatus::Contacted);
        }
        // Orders are spent per examined candidate, never reused.
        assert!(usize::from(draw.next_order()) >= draw.tentative.len());
    }

    #[test]
    fn remote_targets_become_request_records() {
        // A neighbouring million-person patch on rank 1 absorbs nearly every
        // draw from the two-person local patch.
        let mut b = WorldBuilder::new(config(2), grid(), hot_community());
        let unit = b.unit(None, kernel());
        let patch = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), 2);
        let (_, people) = b.household(patch, &[30, 30]).unwrap();
        b.patch(unit, PatchGeometry::new(1, 0, 1), RankId(1), 1_000_000);
        let world = b.build().unwrap();
        claim(&world, people[0]);
        let case = infectious_case(&world, people[0]);
        let ctx = StepCtx::new(&world, Step(0));
        let handle = own_handle(&world, CaseId(0));
        let mut buffers = SendBuffers::new(1, 2);
        let mut draw = CaseDraw::new(CaseId(0));

        community_contacts(
            &ctx,
            handle,
            &case,
            &mut rng(),
            &mut buffers.workers_mut()[0],
            &mut draw,
        );

        assert_eq!(draw.remote_ranks, vec![RankId(1)]);
        let merged = buffers.merge();
        assert!(merged.req[0].is_empty());
        let frags = RequestFragment::decode_all(&merged.req[1]).unwrap();
        assert_eq!(frags.len(), 1);
        let frag = &frags[0];
        assert_eq!(frag.case, handle);
        assert_eq!((frag.infector_x, frag.infector_y), (0, 0));
        assert_eq!(frag.local_count, draw.tentative.len() as u16);
        assert_eq!(frag.orders.len(), draw.n_contacts as usize);
        assert_eq!(frag.ranks, vec![RankId(1)]);
        assert!(!frag.records.is_empty());
        for pair in frag.records.windows(2) {
            assert!(pair[0].order < pair[1].order);
        }
        for rec in &frag.records {
            assert_eq!((rec.target_x, rec.target_y), (1, 0));
        }
    }

    #[test]
    fn remote_travel_routes_every_attempt_to_the_host_rank() {
        let mut b = WorldBuilder::new(config(2), grid(), hot_community());
        let unit = b.unit(None, kernel());
        let patch = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), 1);
        let (_, people) = b.household(patch, &[30]).unwrap();
        let away = b.patch(unit, PatchGeometry::new(5, 0, 1), RankId(1), 1000);
        let world = b.build().unwrap();
        claim(&world, people[0]);
        let mut case = infectious_case(&world, people[0]);
        case.travel = Some(TravelPlan {
            country: 49,
            target_rank: RankId(1),
            sub_person: 0,
            window: TimeWindow::new(Step(0), Step(400)),
            resolved_patch: None,
        });
        let ctx = StepCtx::new(&world, Step(0));
        let handle = own_handle(&world, CaseId(0));
        let mut buffers = SendBuffers::new(1, 2);
        let mut draw = CaseDraw::new(CaseId(0));

        community_contacts(
            &ctx,
            handle,
            &case,
            &mut rng(),
            &mut buffers.workers_mut()[0],
            &mut draw,
        );

        assert_eq!(draw.resolved_travel, Some(away));
        assert!(draw.tentative.is_empty());
        let merged = buffers.merge();
        let frags = RequestFragment::decode_all(&merged.req[1]).unwrap();
        assert_eq!(frags.len(), 1);
        let frag = &frags[0];
        assert_eq!(frag.records.len(), draw.n_contacts as usize);
        for rec in &frag.records {
            assert_eq!((rec.target_x, rec.target_y), (5, 0));
        }
    }

    #[test]
    fn closed_place_scales_the_community_target() {
        let mut b = WorldBuilder::new(config(1), grid(), hot_community());
        let unit = b.unit(None, kernel());
        let patch = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), 10);
        for _ in 0..10 {
            b.household(patch, &[30]).unwrap();
        }
        let place = b.place(PlaceKind::Workplace, 1);
        let group = b.place_group(place, 1);
        b.assign_place(PersonId(0), place, group);
        let mut world = b.build().unwrap();
        world.units[0].live.closure_mult = Some(0.0);
        world.places[0].closure = Some(TimeWindow::new(Step(0), Step(100)));
        claim(&world, PersonId(0));
        let case = infectious_case(&world, PersonId(0));
        let ctx = StepCtx::new(&world, Step(0));
        let mut buffers = SendBuffers::new(1, 1);
        let mut draw = CaseDraw::new(CaseId(0));

        community_contacts(
            &ctx,
            own_handle(&world, CaseId(0)),
            &case,
            &mut rng(),
            &mut buffers.workers_mut()[0],
            &mut draw,
        );

        assert_eq!(draw.n_contacts, 0);
        assert!(draw.tentative.is_empty());
    }
}

// ── Request servicing ─────────────────────────────────────────────────────────

#[cfg(test)]
mod requests {
    use super::*;

    fn incoming(records: Vec<ContactRecord>) -> RequestFragment {
        RequestFragment {
            case: CaseHandle { rank: RankId(1), case: CaseId(7) },
            // Coordinates this rank has no geometry for: acceptance falls
            // back to 1.
            infector_x: 900,
            infector_y: 900,
            local_count: 1,
            orders: vec![2],
            records,
            ranks: vec![RankId(0)],
        }
    }

    #[test]
    fn accepted_record_claims_and_replies() {
        let world = village_world(20, 2, DiseaseParams::default());
        let ctx = StepCtx::new(&world, Step(3));
        let frag = incoming(vec![ContactRecord {
            target_x: 0,
            target_y: 0,
            target_size: 1,
            step: Step(3),
            order: 5,
        }]);
        let mut buffers = SendBuffers::new(1, 2);
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        service_request(
            &ctx,
            &frag,
            &mut rng(),
            &mut buffers.workers_mut()[0],
            &mut stats,
            &mut out,
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].channel, Channel::Community);
        assert_eq!(out[0].step, Step(3));
        assert_eq!(out[0].source, Some(frag.case));
        assert_eq!(core_of(&world, out[0].person), CoreStatus::Contacted);

        let merged = buffers.merge();
        let reply = ReplyFragment::decode(&mut ByteReader::new(&merged.reply[1])).unwrap();
        assert_eq!(reply, ReplyFragment::new(CaseId(7), vec![5]));
    }

    #[test]
    fn unknown_target_patch_is_skipped_but_still_answered() {
        let world = village_world(20, 2, DiseaseParams::default());
        let ctx = StepCtx::new(&world, Step(0));
        let frag = incoming(vec![ContactRecord {
            target_x: 9,
            target_y: 9,
            target_size: 1,
            step: Step(0),
            order: 5,
        }]);
        let mut buffers = SendBuffers::new(1, 2);
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        service_request(
            &ctx,
            &frag,
            &mut rng(),
            &mut buffers.workers_mut()[0],
            &mut stats,
            &mut out,
        );

        assert!(out.is_empty());
        let merged = buffers.merge();
        let reply = ReplyFragment::decode(&mut ByteReader::new(&merged.reply[1])).unwrap();
        assert_eq!(reply, ReplyFragment::new(CaseId(7), Vec::new()));
    }
}

// ── Order reconciliation ──────────────────────────────────────────────────────

#[cfg(test)]
mod merge {
    use super::*;

    #[test]
    fn cutoff_keeps_the_lowest_merged_orders() {
        // Local {0, 2, 5} + remote {1, 3}, budget 3: merged prefix {0, 1, 2}
        // confirms the local orders 0 and 2 and discards 5.
        let tentative = [tc(10, 0), tc(11, 2), tc(12, 5)];
        let outcome = merge_orders(&tentative, &[1, 3], 3);
        assert_eq!(outcome.confirmed, vec![tc(10, 0), tc(11, 2)]);
        assert_eq!(outcome.discarded, vec![tc(12, 5)]);
    }

    #[test]
    fn no_remote_acceptances_confirms_everything_in_budget() {
        let tentative = [tc(1, 0), tc(2, 1), tc(3, 2)];
        let outcome = merge_orders(&tentative, &[], 3);
        assert_eq!(outcome.confirmed.len(), 3);
        assert!(outcome.discarded.is_empty());
    }

    #[test]
    fn zero_budget_discards_everything() {
        let tentative = [tc(1, 0), tc(2, 1)];
        let outcome = merge_orders(&tentative, &[4], 0);
        assert!(outcome.confirmed.is_empty());
        assert_eq!(outcome.discarded.len(), 2);
    }

    #[test]
    fn released_claims_return_to_the_pool() {
        let (world, people) = household_world(&[30, 30, 30], 1, DiseaseParams::default());
        claim(&world, people[1]);
        claim(&world, people[2]);
        assert_eq!(world.households[0].susceptible_left(), 1);

        release_discarded(&world, &[tc(people[1].0, 0), tc(people[2].0, 1)]);
        assert_eq!(core_of(&world, people[1]), CoreStatus::Susceptible);
        assert_eq!(core_of(&world, people[2]), CoreStatus::Susceptible);
        assert_eq!(world.households[0].susceptible_left(), 3);
    }

    #[test]
    fn reconcile_releases_losers_and_clears_round_state() {
        let (world, people) = household_world(&[30, 30, 30], 1, DiseaseParams::default());
        claim(&world, people[0]);
        claim(&world, people[1]);
        claim(&world, people[2]);
        let mut case = infectious_case(&world, people[0]);
        case.n_contacts = 1;
        case.tentative = vec![tc(people[1].0, 0), tc(people[2].0, 5)];

        let confirmed = reconcile_case(&world, &mut case, &[3]);
        assert_eq!(confirmed, vec![tc(people[1].0, 0)]);
        assert_eq!(core_of(&world, people[1]), CoreStatus::Contacted);
        assert_eq!(core_of(&world, people[2]), CoreStatus::Susceptible);
        assert_eq!(case.n_contacts, 0);
        assert!(case.tentative.is_empty());
    }
}

// ── Establishment events ──────────────────────────────────────────────────────

#[cfg(test)]
mod events {
    use super::*;

    fn event_world() -> (World, Vec<PersonId>, ep_core::PlaceId) {
        let mut b = WorldBuilder::new(config(2), grid(), DiseaseParams::default());
        let unit = b.unit(None, kernel());
        let patch = b.patch(unit, PatchGeometry::new(0, 0, 1), RankId(0), 4);
        let (_, people) = b.household(patch, &[30, 30, 30, 30]).unwrap();
        let place = b.place(PlaceKind::School, 4);
        let group = b.place_group(place, 4);
        for &p in &people {
            b.assign_place(p, place, group);
        }
        (b.build().unwrap(), people, place)
    }

    #[test]
    fn infection_event_claims_the_addressed_member() {
        let (mut world, people, place) = event_world();
        let source = CaseHandle { rank: RankId(1), case: CaseId(9) };
        let events = [PlaceEvent::Infection {
            place,
            group: 0,
            member: 1,
            step: Step(3),
            infectiousness: 1.0,
            source,
        }];
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        apply_place_events(
            &mut world,
            Step(3),
            &events,
            RankId(1),
            &mut rng(),
            &mut stats,
            &mut out,
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].person, people[1]);
        assert_eq!(out[0].channel, Channel::Place);
        assert_eq!(out[0].step, Step(3));
        assert_eq!(out[0].source, Some(source));
        assert_eq!(core_of(&world, people[1]), CoreStatus::Contacted);
        assert_eq!(world.households[0].susceptible_left(), 3);
    }

    #[test]
    fn out_of_range_member_is_skipped() {
        let (mut world, _, place) = event_world();
        let events = [PlaceEvent::Infection {
            place,
            group: 0,
            member: 99,
            step: Step(0),
            infectiousness: 1.0,
            source: CaseHandle { rank: RankId(1), case: CaseId(9) },
        }];
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        apply_place_events(
            &mut world,
            Step(0),
            &events,
            RankId(1),
            &mut rng(),
            &mut stats,
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn closure_and_prophylaxis_events_set_windows() {
        let (mut world, _, place) = event_world();
        let events = [
            PlaceEvent::Closure { place, until: Step(8) },
            PlaceEvent::Prophylaxis { place, until: Step(12) },
        ];
        let mut stats = StatsDelta::default();
        let mut out = Vec::new();

        apply_place_events(
            &mut world,
            Step(2),
            &events,
            RankId(1),
            &mut rng(),
            &mut stats,
            &mut out,
        );

        let p = &world.places[place.index()];
        assert_eq!(p.closure, Some(TimeWindow::new(Step(2), Step(8))));
        assert_eq!(p.prophylaxis, Some(TimeWindow::new(Step(2), Step(12))));
        assert!(p.is_closed(Step(4)));
        assert!(!p.is_closed(Step(8)));
    }
}

// ── Statistics reduction ──────────────────────────────────────────────────────

#[cfg(test)]
mod stats {
    use super::*;

    fn unit_tree() -> Vec<AdminUnit> {
        vec![
            AdminUnit::new(UnitId(0), None, kernel()),
            AdminUnit::new(UnitId(1), Some(UnitId(0)), kernel()),
            AdminUnit::new(UnitId(2), Some(UnitId(1)), kernel()),
        ]
    }

    #[test]
    fn deltas_land_on_every_ancestor() {
        let mut units = unit_tree();
        let mut delta = StatsDelta::default();
        delta.record_infection(UnitId(2), Channel::Community);
        delta.record_infection(UnitId(2), Channel::Community);
        delta.record_case(UnitId(2), Channel::Household);

        delta.apply_to(&mut units);
        for unit in &units {
            assert_eq!(unit.new_infections.community, 2);
            assert_eq!(unit.new_cases.household, 1);
        }
        // apply_to drains the delta.
        assert!(delta.is_empty());
    }

    #[test]
    fn wire_deltas_are_sorted_by_unit() {
        let mut delta = StatsDelta::default();
        delta.record_infection(UnitId(2), Channel::Place);
        delta.record_infection(UnitId(0), Channel::Household);
        delta.record_infection(UnitId(1), Channel::Community);

        let wire = delta.to_wire();
        let ids: Vec<u16> = wire.iter().map(|d| d.unit.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn absorb_merges_worker_deltas() {
        let mut a = StatsDelta::default();
        let mut b = StatsDelta::default();
        a.record_infection(UnitId(1), Channel::Household);
        b.record_infection(UnitId(1), Channel::Household);
        b.record_case(UnitId(2), Channel::Place);

        a.absorb(&mut b);
        assert!(b.is_empty());
        let wire = a.to_wire();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].infections.household, 2);
        assert_eq!(wire[1].cases.place, 1);
    }

    #[test]
    fn unknown_unit_delta_is_dropped() {
        let mut units = unit_tree();
        let mut delta = StatsDelta::default();
        delta.record_infection(UnitId(40), Channel::Community);
        // Must not panic; the delta is logged and skipped.
        for d in delta.to_wire() {
            apply_delta(&mut units, &d);
        }
        assert_eq!(units[0].new_infections.total(), 0);
    }
}
