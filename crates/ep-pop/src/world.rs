//! The `World` simulation context and its builder.
//!
//! `World` replaces what a less careful design would make a global mutable
//! singleton: it is constructed once (by the external initialization
//! subsystem in production, by [`WorldBuilder`] in tests), handed to every
//! component explicitly, mutated every timestep, and dropped at shutdown.

use ep_core::{
    GroupId, HouseholdId, PatchId, PersonId, PlaceId, RankId, SimConfig, Step, UnitId,
};
use ep_kernel::cdf::CdfCandidate;
use ep_kernel::{GridSpec, KernelParams, PatchGeometry, build_cdf};
use rustc_hash::FxHashMap;

use crate::case::{CaseRegistry, TravelPlan};
use crate::household::Household;
use crate::patch::{LocalPatch, Patch};
use crate::person::PersonStore;
use crate::place::{Place, PlaceGroup, PlaceKind};
use crate::unit::AdminUnit;
use crate::{PopError, PopResult};

// ── DiseaseParams ─────────────────────────────────────────────────────────────

/// Baseline transmission parameters, shared by all ranks.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiseaseParams {
    /// Household transmission coefficient (B_hh).
    pub b_household: f64,
    /// Place transmission coefficient per place kind.
    pub b_place: [f64; PlaceKind::COUNT],
    /// Community (spatial) transmission coefficient (B_spat).
    pub b_community: f64,
    /// Fraction of place contacts constrained to the infector's group.
    pub p_group: f64,
    /// Simulated hours per day spent at home.
    pub hours_home: f64,
    /// Latent period in days (fixed per run).
    pub latent_days: f64,
    /// Infectious period in days (fixed per run).
    pub infectious_days: f64,
    /// Probability an infection develops symptoms.
    pub p_symptomatic: f64,
    /// Probability a symptomatic case turns severe.
    pub p_severe: f64,
    /// Absenteeism: community-contact multiplier for symptomatic cases.
    pub symptomatic_community_mult: f64,
}

impl Default for DiseaseParams {
    fn default() -> Self {
        Self {
            b_household: 0.47,
            b_place: [0.94, 0.47],
            b_community: 0.075,
            p_group: 0.75,
            hours_home: 14.0,
            latent_days: 2.0,
            infectious_days: 5.0,
            p_symptomatic: 0.5,
            p_severe: 0.1,
            symptomatic_community_mult: 0.5,
        }
    }
}

// ── World ─────────────────────────────────────────────────────────────────────

/// All simulation state owned by one rank.
pub struct World {
    pub config: SimConfig,
    pub grid: GridSpec,
    pub disease: DiseaseParams,

    pub persons: PersonStore,
    pub households: Vec<Household>,
    pub places: Vec<Place>,

    /// Geometry stubs for every patch in the world, indexed by `PatchId`.
    pub patches: Vec<Patch>,
    /// Full state for the patches this rank owns.
    pub local_patches: Vec<LocalPatch>,

    pub units: Vec<AdminUnit>,
    pub cases: CaseRegistry,

    /// Seeding schedule: persons forced out of the susceptible pool at the
    /// given step, before contact generation runs.
    pub seeds: Vec<(Step, PersonId)>,

    /// Travel episodes keyed by person, attached to the person's case when
    /// an infection commits.
    travel_plans: FxHashMap<PersonId, TravelPlan>,

    local_index: FxHashMap<PatchId, u32>,
    coord_index: FxHashMap<(u32, u32), PatchId>,
}

impl World {
    /// The local patch owning `id`, or `None` if it lives on another rank.
    pub fn local_patch(&self, id: PatchId) -> Option<&LocalPatch> {
        self.local_index
            .get(&id)
            .map(|&i| &self.local_patches[i as usize])
    }

    pub fn local_patch_mut(&mut self, id: PatchId) -> Option<&mut LocalPatch> {
        self.local_index
            .get(&id)
            .map(|&i| &mut self.local_patches[i as usize])
    }

    /// The patch whose south-west corner sits at grid cell `(x, y)`.
    ///
    /// `None` is a structural impossibility for coordinates that arrived in a
    /// well-formed wire record; callers log it and skip the unit of work.
    pub fn patch_at(&self, x: u32, y: u32) -> Option<PatchId> {
        self.coord_index.get(&(x, y)).copied()
    }

    #[inline]
    pub fn patch_owner(&self, id: PatchId) -> RankId {
        self.patches[id.index()].owner
    }

    /// The administrative unit of a locally owned person, via its patch.
    pub fn unit_of_person(&self, person: PersonId) -> Option<UnitId> {
        let patch = self.persons.patch[person.index()];
        self.local_patch(patch).map(|lp| lp.unit)
    }

    /// The travel episode registered for a person, if any.
    pub fn travel_plan_of(&self, person: PersonId) -> Option<&TravelPlan> {
        self.travel_plans.get(&person)
    }

    /// Kernel parameters governing a local patch, from its unit.
    pub fn kernel_of_patch(&self, patch: PatchId) -> Option<&KernelParams> {
        let unit = self.local_patch(patch)?.unit;
        self.units.get(unit.index()).map(|u| &u.kernel)
    }

    /// Precompute the cumulative kernel distribution of every local patch.
    ///
    /// Each patch's distribution is an independent normalization over all
    /// candidate patches, so callers may split `local_patches` across
    /// workers; this sequential form is the reference implementation.
    pub fn calculate_q(&mut self) {
        let candidates: Vec<CdfCandidate> = self
            .patches
            .iter()
            .enumerate()
            .map(|(i, p)| CdfCandidate {
                id: PatchId(i as u32),
                geometry: p.geometry,
                population: p.population,
            })
            .collect();

        for lp in &mut self.local_patches {
            let kernel = self.units[lp.unit.index()].kernel;
            let geometry = self.patches[lp.id.index()].geometry;
            lp.cdf = build_cdf(&geometry, &candidates, &kernel, &self.grid);
        }
    }
}

// ── WorldBuilder ──────────────────────────────────────────────────────────────

/// Assembles a `World` piece by piece.
///
/// In production the initialization subsystem drives this from binary
/// population files; tests drive it directly.  Households must be added
/// grouped by their patch (persons are laid out contiguously per patch).
pub struct WorldBuilder {
    config: SimConfig,
    grid: GridSpec,
    disease: DiseaseParams,

    units: Vec<AdminUnit>,
    patches: Vec<Patch>,
    local: Vec<LocalPatch>,

    households: Vec<Household>,
    person_patch: Vec<PatchId>,
    person_household: Vec<HouseholdId>,
    person_age: Vec<u8>,

    places: Vec<Place>,
    group_counts: Vec<Vec<Vec<u32>>>,
    place_members: Vec<Vec<Vec<PersonId>>>,
    person_place: Vec<(PersonId, PlaceId, GroupId)>,

    seeds: Vec<(Step, PersonId)>,
    travel: FxHashMap<PersonId, TravelPlan>,
}

impl WorldBuilder {
    pub fn new(config: SimConfig, grid: GridSpec, disease: DiseaseParams) -> Self {
        Self {
            config,
            grid,
            disease,
            units: Vec::new(),
            patches: Vec::new(),
            local: Vec::new(),
            households: Vec::new(),
            person_patch: Vec::new(),
            person_household: Vec::new(),
            person_age: Vec::new(),
            places: Vec::new(),
            group_counts: Vec::new(),
            place_members: Vec::new(),
            person_place: Vec::new(),
            seeds: Vec::new(),
            travel: FxHashMap::default(),
        }
    }

    /// Add an administrative unit.  Parents must be added before children.
    pub fn unit(&mut self, parent: Option<UnitId>, kernel: KernelParams) -> UnitId {
        let id = UnitId(self.units.len() as u16);
        self.units.push(AdminUnit::new(id, parent, kernel));
        id
    }

    /// Add a patch.  `population_hint` is the declared population for remote
    /// patches; for local patches it is cross-checked against the households
    /// actually added and clamped on disagreement.
    pub fn patch(
        &mut self,
        unit: UnitId,
        geometry: PatchGeometry,
        owner: RankId,
        population_hint: u32,
    ) -> PatchId {
        let id = PatchId(self.patches.len() as u32);
        self.patches.push(Patch {
            geometry,
            owner,
            population: population_hint,
        });
        if owner == self.config.rank {
            let next_hh = self.households.len() as u32;
            let next_person = self.person_patch.len() as u32;
            self.local.push(LocalPatch {
                id,
                unit,
                households: next_hh..next_hh,
                people: next_person..next_person,
                cdf: Default::default(),
            });
        }
        id
    }

    /// Add a household of `ages.len()` persons to the most recently added
    /// local patch.  Returns the new household ID and the IDs of its persons.
    pub fn household(&mut self, patch: PatchId, ages: &[u8]) -> PopResult<(HouseholdId, Vec<PersonId>)> {
        let lp = self
            .local
            .last_mut()
            .filter(|lp| lp.id == patch)
            .ok_or_else(|| {
                PopError::Build(format!(
                    "household must be added to the most recent local patch, got {patch}"
                ))
            })?;
        if ages.is_empty() {
            return Err(PopError::EmptyHousehold(HouseholdId(
                self.households.len() as u32
            )));
        }

        let hh_id = HouseholdId(self.households.len() as u32);
        let start = self.person_patch.len() as u32;
        let mut people = Vec::with_capacity(ages.len());
        for &age in ages {
            let pid = PersonId(self.person_patch.len() as u32);
            self.person_patch.push(patch);
            self.person_household.push(hh_id);
            self.person_age.push(age);
            people.push(pid);
        }
        let end = self.person_patch.len() as u32;

        self.households.push(Household::new(start..end));
        lp.households.end = self.households.len() as u32;
        lp.people.end = end;
        Ok((hh_id, people))
    }

    /// Add a place with a declared all-rank host total.
    pub fn place(&mut self, kind: PlaceKind, total_hosts: u32) -> PlaceId {
        let id = PlaceId(self.places.len() as u32);
        self.places.push(Place::new(kind, total_hosts));
        self.group_counts.push(Vec::new());
        self.place_members.push(Vec::new());
        id
    }

    /// Add a group to `place` whose declared hosts all live on this rank.
    pub fn place_group(&mut self, place: PlaceId, hosts_total: u32) -> GroupId {
        let mut counts = vec![0; self.config.ranks as usize];
        counts[self.config.rank.index()] = hosts_total;
        self.place_group_split(place, counts)
    }

    /// Add a group to `place` with declared host counts per rank.
    pub fn place_group_split(&mut self, place: PlaceId, rank_counts: Vec<u32>) -> GroupId {
        let counts = &mut self.group_counts[place.index()];
        let id = GroupId(counts.len() as u16);
        counts.push(rank_counts);
        self.place_members[place.index()].push(Vec::new());
        id
    }

    /// Assign a local person to a place group.
    pub fn assign_place(&mut self, person: PersonId, place: PlaceId, group: GroupId) {
        self.person_place.push((person, place, group));
        self.place_members[place.index()][group.index()].push(person);
    }

    /// Schedule a seed infection.
    pub fn seed(&mut self, step: Step, person: PersonId) {
        self.seeds.push((step, person));
    }

    /// Register a travel episode for a person.  The episode is attached to
    /// the person's case when an infection commits and relocates community
    /// contacts while its window is active.
    pub fn travel(&mut self, person: PersonId, plan: TravelPlan) {
        self.travel.insert(person, plan);
    }

    /// Validate, reconcile declared counts, and produce the `World`.
    pub fn build(mut self) -> PopResult<World> {
        let count = self.person_patch.len();

        // Unit tree must be cycle-free (parents added before children makes
        // forward references impossible, but check anyway for loaded data).
        for unit in &self.units {
            if let Some(parent) = unit.parent {
                if parent.index() >= self.units.len() || parent == unit.id {
                    return Err(PopError::UnitCycle(unit.id.0));
                }
            }
        }

        // ── Person store ──────────────────────────────────────────────────
        let mut persons = PersonStore::new(count);
        persons.household = self.person_household;
        persons.patch = self.person_patch;
        persons.age = self.person_age;
        for &(person, place, group) in &self.person_place {
            persons.place[person.index()] = place;
            persons.group[person.index()] = group;
        }

        // ── Reconcile declared patch populations (data inconsistency §a) ──
        for lp in &self.local {
            let actual = lp.people.end - lp.people.start;
            let declared = self.patches[lp.id.index()].population;
            if declared != actual {
                log::warn!(
                    "patch {} declares {} persons but overlay data holds {}; using {}",
                    lp.id, declared, actual, actual
                );
                self.patches[lp.id.index()].population = actual;
            }
        }

        // ── Unit populations (local share; remote shares merged by caller) ─
        for lp in &self.local {
            let pop = u64::from(lp.people.end - lp.people.start);
            self.units[lp.unit.index()].population += pop;
            let mut parent = self.units[lp.unit.index()].parent;
            while let Some(p) = parent {
                self.units[p.index()].population += pop;
                parent = self.units[p.index()].parent;
            }
        }

        // ── Flatten place membership into contiguous group slices ─────────
        for (pi, members_by_group) in self.place_members.iter().enumerate() {
            let place = &mut self.places[pi];
            let mut flat = Vec::new();
            for (gi, members) in members_by_group.iter().enumerate() {
                let start = flat.len() as u32;
                flat.extend_from_slice(members);
                let mut rank_counts = self.group_counts[pi][gi].clone();
                let declared = rank_counts[self.config.rank.index()];
                let local = members.len() as u32;
                if declared < local {
                    log::warn!(
                        "place {pi} group {gi} declares {declared} hosts but {local} are local; using {local}"
                    );
                    rank_counts[self.config.rank.index()] = local;
                }
                place.groups.push(PlaceGroup {
                    hosts_total: rank_counts.iter().sum(),
                    rank_counts,
                    local_members: start..flat.len() as u32,
                });
            }
            place.local_members = flat;
            let group_sum: u32 = place.groups.iter().map(|g| g.hosts_total).sum();
            if place.total_hosts < group_sum {
                log::warn!(
                    "place {pi} declares {} total hosts but groups sum to {group_sum}; using {group_sum}",
                    place.total_hosts
                );
                place.total_hosts = group_sum;
            }
        }

        let local_index: FxHashMap<PatchId, u32> = self
            .local
            .iter()
            .enumerate()
            .map(|(i, lp)| (lp.id, i as u32))
            .collect();
        let coord_index: FxHashMap<(u32, u32), PatchId> = self
            .patches
            .iter()
            .enumerate()
            .map(|(i, p)| ((p.geometry.x, p.geometry.y), PatchId(i as u32)))
            .collect();

        let mut world = World {
            config: self.config,
            grid: self.grid,
            disease: self.disease,
            persons,
            households: self.households,
            places: self.places,
            patches: self.patches,
            local_patches: self.local,
            units: self.units,
            cases: CaseRegistry::new(),
            seeds: self.seeds,
            travel_plans: self.travel,
            local_index,
            coord_index,
        };
        world.calculate_q();
        Ok(world)
    }
}
