//! Community (spatial) transmission.
//!
//! Each infectious case draws a Poisson contact target, then samples one
//! target patch per attempt from its patch's cumulative kernel distribution.
//! Local targets go through the rejection test and an immediate tentative
//! claim; remote targets become request records for the owning rank.  Every
//! examined candidate consumes a contact-order index, so the confirmation
//! merge can arbitrate local and remote outcomes by order alone.
//!
//! An active travel episode substitutes the episode's location for the
//! case's home patch.  When the episode is hosted on another rank, all
//! attempts are routed there as request records against the resolved
//! destination patch; the search is restricted to that already-chosen rank
//! even when the destination country spans further ranks — a known
//! approximation, kept deliberately.

use ep_core::{PatchId, RankId, WorkerRng};
use ep_kernel::{center_distance_km, grid_distance_km};
use ep_pop::{CaseHandle, CoreStatus, InfectedCase, PersonId, PlaceId, TentativeContact, World};
use ep_exchange::wire::ContactRecord;
use ep_exchange::{RequestCursor, WorkerBuffers};
use rand_distr::{Distribution, Poisson};
use rustc_hash::FxHashMap;

use crate::ctx::StepCtx;
use crate::outcome::CaseDraw;

/// Bounded retries per attempt before it is abandoned.
pub const RETRY_BUDGET: u32 = 100;

/// The Poisson mean for one case and one step.
fn contact_target(ctx: &StepCtx<'_>, case: &InfectedCase) -> f64 {
    let disease = &ctx.world.disease;
    let live = ctx.live_of_patch(case.patch);
    let mut mean = disease.b_community
        * ctx.seasonality
        * ctx.infectiousness(case.infectiousness, &live)
        * (ctx.hours_per_step / 24.0);
    if case.symptomatic && ctx.step >= case.onset_step() {
        mean *= disease.symptomatic_community_mult;
    }
    if ctx.household_of(case.person).is_quarantined(ctx.step) {
        mean *= live.quarantine_mult.unwrap_or(1.0);
    }
    let place = ctx.world.persons.place[case.person.index()];
    if place != PlaceId::INVALID && ctx.world.places[place.index()].is_closed(ctx.step) {
        mean *= live.closure_mult.unwrap_or(1.0);
    }
    mean.max(0.0)
}

/// Acceptance probability correcting the CDF's optimistic nearest-point
/// distance toward the center distance.  Floating-point excess above 1 is
/// clamped, never treated as an error.
fn acceptance(world: &World, source: PatchId, target: PatchId) -> f64 {
    if source == target {
        return 1.0;
    }
    let Some(kernel) = world.kernel_of_patch(source) else {
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

struct FragmentSet {
    cursors: FxHashMap<RankId, RequestCursor>,
}

impl FragmentSet {
    fn new() -> Self {
        FragmentSet { cursors: FxHashMap::default() }
    }

    fn push(
        &mut self,
        buffers: &mut WorkerBuffers,
        handle: CaseHandle,
        source_geom: (u32, u32),
        order_slots: u16,
        dest: RankId,
        record: &ContactRecord,
        draw: &mut CaseDraw,
    ) {
        let cursor = self.cursors.entry(dest).or_insert_with(|| {
            draw.note_remote(dest);
            buffers.begin_request(dest, handle, source_geom.0, source_geom.1, order_slots)
        });
        buffers.push_record(cursor, record);
    }

    fn finalize(self, buffers: &mut WorkerBuffers, draw: &CaseDraw) {
        let orders = draw.local_orders();
        for (_, cursor) in self.cursors {
            buffers.finalize_request(cursor, orders.len() as u16, &orders, &draw.remote_ranks);
        }
    }
}

/// Generate community contacts for one case, filling `draw` and the worker's
/// request buffers.
pub fn community_contacts(
    ctx: &StepCtx<'_>,
    handle: CaseHandle,
    case: &InfectedCase,
    rng: &mut WorkerRng,
    buffers: &mut WorkerBuffers,
    draw: &mut CaseDraw,
) {
    let mean = contact_target(ctx, case);
    if mean <= 0.0 {
        return;
    }
    let n = Poisson::new(mean)
        .map(|d| d.sample(rng.inner()) as u32)
        .unwrap_or(0);
    draw.n_contacts = n;
    if n == 0 {
        return;
    }

    // Travel substitution: an active episode relocates the case.
    let me = ctx.me();
    if let Some(travel) = case.travel.as_ref().filter(|t| t.is_active(ctx.step)) {
        if travel.target_rank != me {
            remote_travel_attempts(ctx, handle, case, travel.target_rank, n, rng, buffers, draw);
            return;
        }
    }
    let source = travel_patch(ctx, case).unwrap_or(case.patch);

    let Some(lp) = ctx.world.local_patch(source) else {
        log::warn!("case {} draws from patch {} not owned by this rank", handle.case, source);
        return;
    };
    let source_geom = ctx.world.patches[source.index()].geometry;
    let live = ctx.live_of_patch(source);
    let mut fragments = FragmentSet::new();

    'attempts: for _ in 0..n {
        for _ in 0..RETRY_BUDGET {
            let order = draw.take_order();
            let target = lp.cdf.select(rng.uniform(), source);
            let owner = ctx.world.patch_owner(target);

            if owner != me {
                let geom = ctx.world.patches[target.index()].geometry;
                fragments.push(
                    buffers,
                    handle,
                    (source_geom.x, source_geom.y),
                    n as u16,
                    owner,
                    &ContactRecord {
                        target_x:    geom.x,
                        target_y:    geom.y,
                        target_size: geom.size as u16,
                        step:        ctx.step,
                        order,
                    },
                    draw,
                );
                continue 'attempts;
            }

            let Some(tlp) = ctx.world.local_patch(target) else {
                log::warn!("patch {target} owned by this rank but has no local state");
                continue 'attempts;
            };
            if tlp.population() == 0 {
                continue;
            }
            if !rng.gen_bool(acceptance(ctx.world, source, target)) {
                continue;
            }
            let person = PersonId(rng.gen_range(tlp.people.clone()));
            if person == case.person {
                continue;
            }
            if ctx.world.persons.status(person).load().core() != CoreStatus::Susceptible {
                continue;
            }
            if !rng.gen_bool(ctx.susceptibility_of(person, &live)) {
                continue;
            }
            if ctx.world.persons.status(person).claim_susceptible() {
                ctx.household_of(person).note_claim();
                // Tentative claims are not counted yet; statistics are
                // recorded when the confirmation merge settles them.
                draw.tentative.push(TentativeContact { person, order });
                continue 'attempts;
            }
        }
        // Retry budget exhausted; the attempt is abandoned, not fatal.
    }

    fragments.finalize(buffers, draw);
}

/// The patch a same-rank travel episode substitutes, if any.
fn travel_patch(ctx: &StepCtx<'_>, case: &InfectedCase) -> Option<PatchId> {
    let travel = case.travel.as_ref()?;
    if !travel.is_active(ctx.step) || travel.target_rank != ctx.me() {
        return None;
    }
    travel.resolved_patch
}

/// All attempts of a remotely hosted travel episode become request records
/// against the resolved destination patch, arbitrated by the hosting rank.
fn remote_travel_attempts(
    ctx: &StepCtx<'_>,
    handle: CaseHandle,
    case: &InfectedCase,
    dest: RankId,
    n: u32,
    rng: &mut WorkerRng,
    buffers: &mut WorkerBuffers,
    draw: &mut CaseDraw,
) {
    let resolved = case
        .travel
        .as_ref()
        .and_then(|t| t.resolved_patch)
        .or_else(|| resolve_travel_patch(ctx.world, dest, rng));
    let Some(target) = resolved else {
        log::warn!("travel episode of case {} has no patch on rank {}", handle.case, dest.0);
        return;
    };
    draw.resolved_travel = Some(target);

    let home_geom = ctx.world.patches[case.patch.index()].geometry;
    let geom = ctx.world.patches[target.index()].geometry;
    let mut fragments = FragmentSet::new();
    for _ in 0..n {
        let order = draw.take_order();
        fragments.push(
            buffers,
            handle,
            (home_geom.x, home_geom.y),
            n as u16,
            dest,
            &ContactRecord {
                target_x:    geom.x,
                target_y:    geom.y,
                target_size: geom.size as u16,
                step:        ctx.step,
                order,
            },
            draw,
        );
    }
    fragments.finalize(buffers, draw);
}

/// Pick a patch hosted by `dest` for an unresolved travel episode.  Uniform
/// over the destination rank's populated patches; cached on the case by the
/// write-back phase.
fn resolve_travel_patch(world: &World, dest: RankId, rng: &mut WorkerRng) -> Option<PatchId> {
    let candidates: Vec<PatchId> = world
        .patches
        .iter()
        .enumerate()
        .filter(|(_, p)| p.owner == dest && p.population > 0)
        .map(|(i, _)| PatchId(i as u32))
        .collect();
    rng.choose(&candidates).copied()
}
