//! Administrative units: the hierarchical policy/reporting tree.

use ep_core::UnitId;
use ep_kernel::KernelParams;

// ── LiveParams ────────────────────────────────────────────────────────────────

/// Intervention-derived multipliers currently active in a unit.
///
/// `None` means the corresponding measure is inactive — contact generation
/// falls back to the baseline parameter.  Written only by the intervention
/// state machine (single-threaded phase), read by the parallel contact phase.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LiveParams {
    /// Probability a border crossing into this unit is denied.
    pub border_deny: Option<f64>,
    /// Multiplier on infectiousness of treated cases.
    pub treatment_mult: Option<f64>,
    /// Multiplier on susceptibility of prophylaxed persons.
    pub prophylaxis_mult: Option<f64>,
    /// Fraction of the unit population vaccinated per day.
    pub vaccination_rate: Option<f64>,
    /// Multiplier on non-household contact rates of quarantined households.
    pub quarantine_mult: Option<f64>,
    /// Multiplier on household contact rates while places are closed.
    pub closure_mult: Option<f64>,
}

impl LiveParams {
    /// All measures inactive.
    pub fn inactive() -> Self {
        Self::default()
    }
}

// ── Counters ──────────────────────────────────────────────────────────────────

/// Infection counts split by transmission channel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelCounts {
    pub household: u64,
    pub place: u64,
    pub community: u64,
}

impl ChannelCounts {
    #[inline]
    pub fn total(&self) -> u64 {
        self.household + self.place + self.community
    }

    pub fn add(&mut self, other: &ChannelCounts) {
        self.household += other.household;
        self.place += other.place;
        self.community += other.community;
    }

    pub fn clear(&mut self) {
        *self = ChannelCounts::default();
    }
}

/// A rolling 10-day accumulator fed once per simulated day.
#[derive(Clone, Debug, Default)]
pub struct RollingWindow {
    ring: [u64; 10],
    pos: usize,
}

impl RollingWindow {
    /// Close out a day: the oldest day's count drops off.
    pub fn push_day(&mut self, count: u64) {
        self.ring[self.pos] = count;
        self.pos = (self.pos + 1) % self.ring.len();
    }

    /// Sum over the last 10 recorded days.
    pub fn sum(&self) -> u64 {
        self.ring.iter().sum()
    }
}

// ── AdminUnit ─────────────────────────────────────────────────────────────────

/// One node of the administrative tree.
///
/// Statistic deltas recorded against a unit are always also propagated up
/// every ancestor (the reduction step in `ep-sim` walks `parent` links), so
/// a parent's counters are the sums over its subtree plus its own patches.
#[derive(Debug)]
pub struct AdminUnit {
    pub id: UnitId,
    /// `None` for the root unit.
    pub parent: Option<UnitId>,

    /// Persons living in the unit, across all ranks.
    pub population: u64,

    /// This unit's contact kernel.
    pub kernel: KernelParams,

    /// Live intervention multipliers.
    pub live: LiveParams,

    // ── Per-step statistics (reset each step after output) ────────────────
    /// Symptomatic cases newly recorded this step, by channel.
    pub new_cases: ChannelCounts,
    /// All infections newly recorded this step, by channel.
    pub new_infections: ChannelCounts,

    // ── Cumulative statistics ─────────────────────────────────────────────
    pub cum_cases: ChannelCounts,
    pub cum_infections: ChannelCounts,

    // ── Rolling 10-day accumulators (fed at day boundaries) ───────────────
    pub cases_10day: RollingWindow,
    pub infections_10day: RollingWindow,
    /// Cases/infections recorded so far in the current (incomplete) day.
    pub cases_today: u64,
    pub infections_today: u64,
}

impl AdminUnit {
    pub fn new(id: UnitId, parent: Option<UnitId>, kernel: KernelParams) -> Self {
        Self {
            id,
            parent,
            population: 0,
            kernel,
            live: LiveParams::inactive(),
            new_cases: ChannelCounts::default(),
            new_infections: ChannelCounts::default(),
            cum_cases: ChannelCounts::default(),
            cum_infections: ChannelCounts::default(),
            cases_10day: RollingWindow::default(),
            infections_10day: RollingWindow::default(),
            cases_today: 0,
            infections_today: 0,
        }
    }

    /// Fold one step's new counts into the cumulative and daily totals.
    pub fn absorb_step(&mut self) {
        self.cum_cases.add(&self.new_cases);
        self.cum_infections.add(&self.new_infections);
        self.cases_today += self.new_cases.total();
        self.infections_today += self.new_infections.total();
        self.new_cases.clear();
        self.new_infections.clear();
    }

    /// Close out a simulated day: feed the rolling windows.
    pub fn close_day(&mut self) {
        self.cases_10day.push_day(self.cases_today);
        self.infections_10day.push_day(self.infections_today);
        self.cases_today = 0;
        self.infections_today = 0;
    }
}

/// Walk the ancestor chain of `unit`, excluding `unit` itself.
///
/// Assumes the tree is cycle-free; world construction validates this.
pub fn ancestors(units: &[AdminUnit], unit: UnitId) -> impl Iterator<Item = UnitId> + '_ {
    let mut current = units.get(unit.index()).and_then(|u| u.parent);
    std::iter::from_fn(move || {
        let next = current?;
        current = units.get(next.index()).and_then(|u| u.parent);
        Some(next)
    })
}
