//! The `Engine` struct and its timestep loop.

use ep_contact::{
    CaseDraw, PendingInfection, StatsDelta, StepCtx, WorkerOutcome, apply_delta,
    apply_place_events, community_contacts, household_contacts, merge_orders, place_contacts,
    release_discarded, service_request,
};
use ep_core::{CaseId, PersonId, RankId, SimClock, Step, UnitId, WorkerRng};
use ep_exchange::wire::{PlaceEvent, RequestFragment};
use ep_exchange::{
    Collective, SendBuffers, SizingBlock, WorkerBuffers, any_active, chain, link_replies,
    pack_payloads, split_payload,
};
use ep_intervene::{Intervention, InterventionSet};
use ep_pop::status::flag;
use ep_pop::{CaseHandle, Channel, CoreStatus, InfectedCase, PlaceId, TimeWindow, World};
use ep_schedule::EventQueues;
use rustc_hash::FxHashMap;

use crate::{EngineObserver, SimError, SimResult};

// ── Engine ────────────────────────────────────────────────────────────────────

/// The main simulation runner for one rank.
///
/// `Engine<C>` holds all simulation state and drives the phase sequence of
/// one timestep:
///
/// 1. **Seeding**: scheduled seed infections are claimed and committed.
/// 2. **Contact phase** (optionally parallel with the `parallel` feature):
///    workers stride the due-case list and generate household, place, and
///    community contacts against the read-only [`World`], emitting intents.
/// 3. **Collective rounds**: the merged send buffers are sized, packed, and
///    exchanged with every peer rank.
/// 4. **Confirmation**: received reply chains are linked and merged against
///    the *previous* round's tentative claims, in contact order.
/// 5. **Resolution** (optionally parallel): incoming request fragments are
///    serviced against the local population; replies ride the next round.
/// 6. **Write-back** (sequential): the contact phase's draws land on their
///    cases, zero-peer cases settle immediately, and committed infections
///    enter the registry and the event queues.
/// 7. **Events, symptoms, recoveries, interventions, statistics.**
///
/// The sole cross-thread writes during the parallel phases are the atomic
/// status claims and household counters; every other mutation happens in the
/// sequential phases, in deterministic order.
pub struct Engine<C: Collective> {
    pub world: World,

    /// Simulation clock — tracks the current step.
    pub clock: SimClock,

    queues:        EventQueues,
    interventions: InterventionSet,
    collective:    C,

    /// Per-worker send state; disjoint views during the parallel phases.
    buffers: SendBuffers,
    /// Per-worker deterministic RNGs.
    rngs: Vec<WorkerRng>,
    /// RNG for the sequential phases (commits, events, vaccination).
    seq_rng: WorkerRng,

    worker_stats: Vec<StatsDelta>,
    outcomes:     Vec<WorkerOutcome>,
    /// Deltas awaiting the next sizing round (sequential-phase recordings
    /// plus everything absorbed from the workers).
    stats: StatsDelta,

    workers: usize,
    ranks:   usize,
}

impl<C: Collective> Engine<C> {
    /// Build an engine around a fully constructed world.
    ///
    /// The collective must span exactly the ranks the configuration
    /// declares; intervention definitions are paired with every unit.
    pub fn new(world: World, defs: Vec<Intervention>, collective: C) -> SimResult<Engine<C>> {
        let ranks = usize::from(world.config.ranks);
        if ranks == 0 {
            return Err(SimError::Config("rank count must be at least 1".into()));
        }
        if collective.ranks() != ranks {
            return Err(SimError::RankCount { expected: ranks, got: collective.ranks() });
        }
        let workers = world.config.workers.max(1);
        let seed = world.config.seed;
        let rank = world.config.rank.0;

        Ok(Engine {
            clock: world.config.make_clock(),
            queues: EventQueues::new(&world.config),
            interventions: InterventionSet::new(defs, world.units.len()),
            collective,
            buffers: SendBuffers::new(workers, ranks),
            rngs: (0..workers).map(|w| WorkerRng::new(seed, rank, w)).collect(),
            seq_rng: WorkerRng::new(seed, rank, workers),
            worker_stats: (0..workers).map(|_| StatsDelta::default()).collect(),
            outcomes: (0..workers).map(|_| WorkerOutcome::default()).collect(),
            stats: StatsDelta::default(),
            workers,
            ranks,
            world,
        })
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Run until no rank reports pending work, or until the configured step
    /// ceiling.
    ///
    /// The continue flag rides the sizing round, so all ranks observe the
    /// same fixed point and leave their collective loops together.
    pub fn run<O: EngineObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        let ceiling = self.world.config.max_step();
        loop {
            if self.clock.current >= ceiling {
                log::warn!("run reached the step ceiling {} before quiescing", ceiling.0);
                break;
            }
            if !self.step(observer)? {
                break;
            }
        }
        observer.on_run_end(self.clock.current, &self.world);
        Ok(())
    }

    /// Process one timestep.  Returns `true` while any rank has pending work.
    pub fn step<O: EngineObserver>(&mut self, observer: &mut O) -> SimResult<bool> {
        let now = self.clock.current;
        let me = self.world.config.rank;

        // ── Phase 0: seed infections due at this step ─────────────────────
        let seeds = std::mem::take(&mut self.world.seeds);
        let (due_seeds, later): (Vec<_>, Vec<_>) =
            seeds.into_iter().partition(|&(at, _)| at <= now);
        self.world.seeds = later;
        for (_, person) in due_seeds {
            self.seed_case(person, now)?;
        }

        // ── Phase 1: contact generation ───────────────────────────────────
        let due = self.queues.due_contacts();
        let shares = stride(due.clone(), self.workers);
        {
            let ctx = StepCtx::new(&self.world, now);
            run_workers(
                &shares,
                &mut self.rngs,
                self.buffers.workers_mut(),
                &mut self.worker_stats,
                &mut self.outcomes,
                |share, rng, buffers, stats, out| {
                    generate_share(&ctx, share, rng, buffers, stats, out)
                },
            );
        }
        self.absorb_worker_state();
        let mut pending: Vec<PendingInfection> = Vec::new();
        for out in &mut self.outcomes {
            pending.append(&mut out.infections);
        }
        let draws: Vec<CaseDraw> =
            self.outcomes.iter_mut().flat_map(|o| o.draws.drain(..)).collect();

        // ── Phase 2: collective rounds ────────────────────────────────────
        let merged = self.buffers.merge();
        let outbound = (0..self.ranks).any(|dest| {
            let (r, p, e) = merged.sizes(dest);
            r + p + e > 0
        });
        let active = outbound
            || !self.world.cases.is_empty()
            || self.queues.pending() > 0
            || !self.world.seeds.is_empty();
        let deltas = std::mem::take(&mut self.stats).to_wire();
        let block = SizingBlock::from_merged(me, &merged, deltas, active);
        let grid = self.collective.exchange_sizes(block)?;
        let received = self.collective.all_to_all(pack_payloads(merged))?;

        // Every rank applies every block, its own included, so the unit
        // trees stay identical across ranks.
        for b in &grid {
            for d in &b.stats {
                apply_delta(&mut self.world.units, d);
            }
        }

        let mut request_bufs: Vec<Vec<u8>> = Vec::new();
        let mut reply_buf: Vec<u8> = Vec::new();
        let mut event_bufs: Vec<(RankId, Vec<u8>)> = Vec::new();
        for (src, payload) in received.into_iter().enumerate() {
            if src == me.index() {
                continue;
            }
            let from = RankId(src as u16);
            let (req, reply, event) = split_payload(from, payload, grid[src].toward(me.index()));
            if !req.is_empty() {
                request_bufs.push(req);
            }
            reply_buf.extend_from_slice(&reply);
            if !event.is_empty() {
                event_bufs.push((from, event));
            }
        }

        // ── Phase 3: confirmation merge for the previous round ────────────
        //
        // Runs before the draw write-back so the tentative claims still on
        // each case are the ones the incoming replies answer.
        let mut accepted_of: FxHashMap<CaseId, Vec<u16>> = FxHashMap::default();
        for head in link_replies(&mut reply_buf)? {
            let entry = accepted_of.entry(head.case).or_default();
            for frag in chain(&reply_buf, &head)? {
                entry.extend(frag.accepted);
            }
        }
        let contact_step = Step(now.0.saturating_sub(1));
        for id in self.queues.due_confirmations() {
            let accepted = accepted_of.remove(&id).unwrap_or_default();
            self.settle_case(id, &accepted, contact_step, &mut pending);
        }
        for id in accepted_of.keys() {
            log::warn!("reply chain for case {id} with no pending confirmation; dropped");
        }

        // ── Phase 4: service incoming requests ────────────────────────────
        let mut fragments: Vec<RequestFragment> = Vec::new();
        for buf in &request_bufs {
            fragments.extend(RequestFragment::decode_all(buf)?);
        }
        let shares = stride(fragments, self.workers);
        {
            let ctx = StepCtx::new(&self.world, now);
            run_workers(
                &shares,
                &mut self.rngs,
                self.buffers.workers_mut(),
                &mut self.worker_stats,
                &mut self.outcomes,
                |share, rng, buffers, stats, out| {
                    for frag in share {
                        service_request(&ctx, frag, rng, buffers, stats, &mut out.infections);
                    }
                },
            );
        }
        self.absorb_worker_state();
        for out in &mut self.outcomes {
            pending.append(&mut out.infections);
        }

        // ── Phase 5: draw write-back ──────────────────────────────────────
        for draw in draws {
            self.write_back(draw, now, &mut pending);
        }
        // Infectious cases keep generating until the step before recovery.
        let next = Step(now.0 + 1);
        for &id in &due {
            if let Some(case) = self.world.cases.get(id) {
                if next < case.recovery_step() {
                    self.queues.schedule_contact(next, id.index() % self.workers, id)?;
                }
            }
        }

        // ── Phase 6: establishment events ─────────────────────────────────
        for (from, buf) in event_bufs {
            let events = PlaceEvent::decode_all(&buf)?;
            let mut out = Vec::new();
            apply_place_events(
                &mut self.world,
                now,
                &events,
                from,
                &mut self.seq_rng,
                &mut self.stats,
                &mut out,
            );
            pending.append(&mut out);
        }

        // ── Phase 7: commit this step's infections ────────────────────────
        for inf in pending {
            self.commit_infection(inf)?;
        }

        // ── Phase 8: symptom onset ────────────────────────────────────────
        for id in self.queues.due_symptoms() {
            let Some(case) = self.world.cases.get(id) else { continue };
            let (person, channel, severe) = (case.person, case.channel, case.severe);
            let cell = self.world.persons.status(person);
            cell.set_flag(flag::SYMPTOMATIC);
            if severe {
                cell.set_flag(flag::SEVERE);
            }
            if let Some(unit) = self.world.unit_of_person(person) {
                self.stats.record_case(unit, channel);
            }
        }

        // ── Phase 9: recoveries ───────────────────────────────────────────
        //
        // The recovery handler is the sole remover of registry entries.
        for id in self.queues.due_recoveries() {
            if let Some(case) = self.world.cases.remove(id) {
                self.world.persons.status(case.person).set_core(CoreStatus::Immune);
                let place = self.world.persons.place[case.person.index()];
                if place != PlaceId::INVALID {
                    let p = &mut self.world.places[place.index()];
                    p.case_count = p.case_count.saturating_sub(1);
                }
            }
        }

        // ── Phase 10: statistics roll-over, interventions, observer ───────
        observer.on_step_end(now, &self.world);
        for unit in &mut self.world.units {
            unit.absorb_step();
        }
        let steps_per_day = u64::from(self.world.config.steps_per_day);
        if (now.0 + 1).is_multiple_of(steps_per_day) {
            let day = now.0 / steps_per_day;
            self.interventions.evaluate_all(&mut self.world.units, day);
            self.refresh_measure_windows(now);
            self.apply_vaccination();
            observer.on_snapshot(day, &self.world);
            for unit in &mut self.world.units {
                unit.close_day();
            }
        }

        self.queues.advance();
        self.clock.advance();
        Ok(any_active(&grid))
    }

    // ── Sequential helpers ────────────────────────────────────────────────

    /// Claim and commit one scheduled seed infection.
    fn seed_case(&mut self, person: PersonId, now: Step) -> SimResult<()> {
        if !self.world.persons.status(person).claim_susceptible() {
            log::debug!("seed person {person} is no longer susceptible; skipped");
            return Ok(());
        }
        let hh = self.world.persons.household[person.index()];
        self.world.households[hh.index()].note_claim();
        if let Some(unit) = self.world.unit_of_person(person) {
            self.stats.record_infection(unit, Channel::Community);
        }
        self.commit_infection(PendingInfection {
            person,
            channel: Channel::Community,
            step: now,
            source: None,
        })
    }

    /// Land one case's community draw, settling zero-peer cases immediately
    /// and arming the confirmation toggle otherwise.
    fn write_back(&mut self, draw: CaseDraw, now: Step, pending: &mut Vec<PendingInfection>) {
        let id = draw.case;
        let Some(case) = self.world.cases.get_mut(id) else {
            return;
        };
        let local_only = draw.remote_ranks.is_empty();
        case.n_contacts = draw.n_contacts;
        case.next_order = draw.next_order();
        case.tentative = draw.tentative;
        case.remote_ranks = draw.remote_ranks;
        if let Some(patch) = draw.resolved_travel {
            if let Some(travel) = case.travel.as_mut() {
                travel.resolved_patch = Some(patch);
            }
        }
        if local_only {
            // No peer was addressed: nothing can contest the claims.
            self.settle_case(id, &[], now, pending);
        } else {
            self.queues.schedule_confirmation(id);
        }
    }

    /// Merge one case's tentative claims with the orders its peers accepted,
    /// release the losers, and queue the winners for commit.
    fn settle_case(
        &mut self,
        id: CaseId,
        remote_accepted: &[u16],
        contact_step: Step,
        pending: &mut Vec<PendingInfection>,
    ) {
        let Some(case) = self.world.cases.get_mut(id) else {
            log::warn!("confirmation for case {id} which is no longer live; dropped");
            return;
        };
        let tentative = std::mem::take(&mut case.tentative);
        let budget = case.n_contacts;
        case.clear_round();

        let outcome = merge_orders(&tentative, remote_accepted, budget);
        release_discarded(&self.world, &outcome.discarded);
        let handle = CaseHandle { rank: self.world.config.rank, case: id };
        for t in outcome.confirmed {
            if let Some(unit) = self.world.unit_of_person(t.person) {
                self.stats.record_infection(unit, Channel::Community);
            }
            pending.push(PendingInfection {
                person: t.person,
                channel: Channel::Community,
                step: contact_step,
                source: Some(handle),
            });
        }
    }

    /// Turn a claimed contact into a registered case and schedule its
    /// lifecycle events.  The claim itself already happened.
    fn commit_infection(&mut self, inf: PendingInfection) -> SimResult<()> {
        let config = &self.world.config;
        let disease = &self.world.disease;
        let steps_per_day = u64::from(config.steps_per_day);
        let latent = ((disease.latent_days * steps_per_day as f64).round() as u64)
            .min(u64::from(config.latent_cutoff_days) * steps_per_day);
        let infectious = ((disease.infectious_days * steps_per_day as f64).round() as u64)
            .min(u64::from(config.infectious_cutoff_days) * steps_per_day);
        let p_symptomatic = disease.p_symptomatic;
        let p_severe = disease.p_severe;

        let person = inf.person;
        let mut case = InfectedCase::new(person, self.world.persons.patch[person.index()], inf.step);
        case.channel = inf.channel;
        case.latent_steps = latent;
        case.infectious_steps = infectious;
        case.symptomatic = self.seq_rng.gen_bool(p_symptomatic);
        case.severe = case.symptomatic && self.seq_rng.gen_bool(p_severe);

        // Attach any registered travel episode; a live border-control measure
        // at a locally resolvable destination may deny it outright.
        if let Some(plan) = self.world.travel_plan_of(person) {
            let deny = plan
                .resolved_patch
                .and_then(|p| self.world.local_patch(p))
                .and_then(|lp| self.world.units[lp.unit.index()].live.border_deny)
                .unwrap_or(0.0);
            if deny > 0.0 && self.seq_rng.gen_bool(deny) {
                log::debug!("travel episode of person {person} denied at the border");
            } else {
                case.travel = Some(plan.clone());
            }
        }

        let onset = case.onset_step();
        let recovery = case.recovery_step();
        let symptomatic = case.symptomatic;
        let id = self.world.cases.insert(case);

        let place = self.world.persons.place[person.index()];
        if place != PlaceId::INVALID {
            self.world.places[place.index()].case_count += 1;
        }

        // Events land strictly in the future; a zero-length latent period
        // still defers the first contact round to the next step.
        let next = Step(self.queues.now().0 + 1);
        let worker = id.index() % self.workers;
        self.queues.schedule_contact(onset.max(next), worker, id)?;
        if symptomatic {
            self.queues.schedule_symptom(onset.max(next), worker, id)?;
        }
        self.queues.schedule_recovery(recovery.max(next), worker, id)?;
        Ok(())
    }

    /// Fold the workers' statistic deltas into the engine-level accumulator.
    fn absorb_worker_state(&mut self) {
        for st in &mut self.worker_stats {
            self.stats.absorb(st);
        }
    }

    /// Renew household and place intervention windows at the day boundary.
    ///
    /// Quarantine and prophylaxis measures put a one-day window on every
    /// household currently holding a live case; closure (and prophylaxis)
    /// measures put one on every place with accumulated cases.  Windows are
    /// renewed while the measure stays live and lapse on their own once the
    /// measure deactivates or the last case recovers.  Peer ranks hosting
    /// members of an affected place learn of the window through the
    /// closure/prophylaxis events riding the next exchange.
    fn refresh_measure_windows(&mut self, now: Step) {
        let start = Step(now.0 + 1);
        let until = start + u64::from(self.world.config.steps_per_day);
        let window = TimeWindow::new(start, until);
        let me = self.world.config.rank;

        let case_people: Vec<PersonId> = self
            .world
            .cases
            .live_ids()
            .filter_map(|id| self.world.cases.get(id).map(|c| c.person))
            .collect();
        for person in case_people {
            let Some(unit) = self.world.unit_of_person(person) else { continue };
            let live = self.world.units[unit.index()].live;
            let hh = self.world.persons.household[person.index()];
            if live.quarantine_mult.is_some() {
                self.world.households[hh.index()].quarantine = Some(window);
            }
            if live.prophylaxis_mult.is_some() {
                self.world.households[hh.index()].prophylaxis = Some(window);
            }
        }

        for pi in 0..self.world.places.len() {
            if self.world.places[pi].case_count == 0 {
                continue;
            }
            let mut close = false;
            let mut prophylax = false;
            for &member in &self.world.places[pi].local_members {
                let Some(unit) = self.world.unit_of_person(member) else { continue };
                let live = self.world.units[unit.index()].live;
                close |= live.closure_mult.is_some();
                prophylax |= live.prophylaxis_mult.is_some();
                if close && prophylax {
                    break;
                }
            }
            if !close && !prophylax {
                continue;
            }
            let place = PlaceId(pi as u32);
            let peers: Vec<RankId> = (0..self.ranks as u16)
                .map(RankId)
                .filter(|&r| {
                    r != me
                        && self.world.places[pi]
                            .groups
                            .iter()
                            .any(|g| g.rank_counts.get(r.index()).copied().unwrap_or(0) > 0)
                })
                .collect();
            let p = &mut self.world.places[pi];
            if close {
                p.closure = Some(window);
            }
            if prophylax {
                p.prophylaxis = Some(window);
            }
            let events = &mut self.buffers.workers_mut()[0];
            for dest in peers {
                if close {
                    events.push_event(dest, &PlaceEvent::Closure { place, until });
                }
                if prophylax {
                    events.push_event(dest, &PlaceEvent::Prophylaxis { place, until });
                }
            }
        }
    }

    /// Daily vaccination pass for units with a live vaccination measure.
    ///
    /// Each susceptible person in the unit's patches is vaccinated with the
    /// per-day rate; vaccinated persons leave the susceptible pool for good.
    fn apply_vaccination(&mut self) {
        let rates: Vec<(UnitId, f64)> = self
            .world
            .units
            .iter()
            .filter_map(|u| u.live.vaccination_rate.map(|r| (u.id, r.clamp(0.0, 1.0))))
            .collect();
        if rates.is_empty() {
            return;
        }
        for i in 0..self.world.local_patches.len() {
            let lp = &self.world.local_patches[i];
            let (unit, people) = (lp.unit, lp.people.clone());
            let Some(&(_, rate)) = rates.iter().find(|(u, _)| *u == unit) else {
                continue;
            };
            for idx in people {
                let person = PersonId(idx);
                let cell = self.world.persons.status(person);
                if cell.load().core() != CoreStatus::Susceptible {
                    continue;
                }
                if !self.seq_rng.gen_bool(rate) {
                    continue;
                }
                if cell.claim_susceptible() {
                    cell.set_core(CoreStatus::Immune);
                    cell.set_flag(flag::VACCINATED);
                    let hh = self.world.persons.household[person.index()];
                    self.world.households[hh.index()].note_claim();
                }
            }
        }
    }
}

// ── Worker striding ───────────────────────────────────────────────────────────

/// Deal `items` across workers round-robin, preserving relative order within
/// each share.
fn stride<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let mut shares: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        shares[i % workers].push(item);
    }
    shares
}

/// Run one closure per worker over disjoint state slices.
///
/// With the `parallel` Cargo feature the workers run on Rayon's thread pool;
/// the closure only reads shared state (through `StepCtx`) and writes its own
/// slice, so the two paths are observationally identical per worker.
fn run_workers<T, F>(
    shares:   &[Vec<T>],
    rngs:     &mut [WorkerRng],
    buffers:  &mut [WorkerBuffers],
    stats:    &mut [StatsDelta],
    outcomes: &mut [WorkerOutcome],
    body:     F,
) where
    T: Sync,
    F: Fn(&[T], &mut WorkerRng, &mut WorkerBuffers, &mut StatsDelta, &mut WorkerOutcome)
        + Sync
        + Send,
{
    #[cfg(not(feature = "parallel"))]
    {
        for (w, rng) in rngs.iter_mut().enumerate() {
            body(&shares[w], rng, &mut buffers[w], &mut stats[w], &mut outcomes[w]);
        }
    }

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        shares
            .par_iter()
            .zip(rngs.par_iter_mut())
            .zip(buffers.par_iter_mut())
            .zip(stats.par_iter_mut())
            .zip(outcomes.par_iter_mut())
            .for_each(|((((share, rng), buf), st), out)| {
                body(share, rng, buf, st, out);
            });
    }
}

/// Generate all three contact channels for one worker's share of the due
/// cases.
fn generate_share(
    ctx: &StepCtx<'_>,
    share: &[CaseId],
    rng: &mut WorkerRng,
    buffers: &mut WorkerBuffers,
    stats: &mut StatsDelta,
    out: &mut WorkerOutcome,
) {
    let me = ctx.me();
    for &id in share {
        let Some(case) = ctx.world.cases.get(id) else {
            continue;
        };
        let handle = CaseHandle { rank: me, case: id };
        household_contacts(ctx, handle, case, rng, stats, &mut out.infections);
        place_contacts(ctx, handle, case, rng, buffers, stats, &mut out.infections);
        let mut draw = CaseDraw::new(id);
        community_contacts(ctx, handle, case, rng, buffers, &mut draw);
        out.draws.push(draw);
    }
}
