//! Per-worker statistics accumulators.
//!
//! Workers record against their private [`StatsDelta`] during the parallel
//! phase; the engine reduces all deltas into the administrative-unit tree
//! (with ancestor propagation) in the sequential aggregation step, so unit
//! counters are never contended.

use ep_core::UnitId;
use ep_exchange::UnitDelta;
use ep_pop::unit::ancestors;
use ep_pop::{AdminUnit, Channel, ChannelCounts};
use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitCounts {
    pub cases:      ChannelCounts,
    pub infections: ChannelCounts,
}

fn bump(counts: &mut ChannelCounts, channel: Channel) {
    match channel {
        Channel::Household => counts.household += 1,
        Channel::Place => counts.place += 1,
        Channel::Community => counts.community += 1,
    }
}

/// One worker's statistic deltas for the current step.
#[derive(Debug, Default)]
pub struct StatsDelta {
    map: FxHashMap<UnitId, UnitCounts>,
}

impl StatsDelta {
    /// Record a new infection attributed to `unit`.
    pub fn record_infection(&mut self, unit: UnitId, channel: Channel) {
        bump(&mut self.map.entry(unit).or_default().infections, channel);
    }

    /// Record a new symptomatic case attributed to `unit`.
    pub fn record_case(&mut self, unit: UnitId, channel: Channel) {
        bump(&mut self.map.entry(unit).or_default().cases, channel);
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Fold another worker's delta into this one.
    pub fn absorb(&mut self, other: &mut StatsDelta) {
        for (unit, counts) in other.map.drain() {
            let mine = self.map.entry(unit).or_default();
            mine.cases.add(&counts.cases);
            mine.infections.add(&counts.infections);
        }
    }

    /// Deltas for units this rank does not own, for the sizing-round block.
    /// Deterministic order: ascending unit ID.
    pub fn to_wire(&self) -> Vec<UnitDelta> {
        let mut out: Vec<UnitDelta> = self
            .map
            .iter()
            .map(|(&unit, c)| UnitDelta { unit, cases: c.cases, infections: c.infections })
            .collect();
        out.sort_by_key(|d| d.unit);
        out
    }

    /// Reduce into the unit tree: every delta lands on its unit and every
    /// ancestor of that unit.  Sequential phase only.
    pub fn apply_to(&mut self, units: &mut [AdminUnit]) {
        let deltas = self.to_wire();
        for delta in &deltas {
            apply_delta(units, delta);
        }
        self.map.clear();
    }
}

/// Apply one delta (local or received over the wire) to a unit and its
/// ancestor chain.  Unknown units are logged and skipped.
pub fn apply_delta(units: &mut [AdminUnit], delta: &UnitDelta) {
    if delta.unit.index() >= units.len() {
        log::warn!("statistics delta names unknown unit {}; skipped", delta.unit);
        return;
    }
    let chain: Vec<UnitId> = ancestors(units, delta.unit).collect();
    let unit = &mut units[delta.unit.index()];
    unit.new_cases.add(&delta.cases);
    unit.new_infections.add(&delta.infections);
    for up in chain {
        let unit = &mut units[up.index()];
        unit.new_cases.add(&delta.cases);
        unit.new_infections.add(&delta.infections);
    }
}
