//! Plain data row types written by output backends.

use ep_pop::AdminUnit;

/// One administrative unit's counters at the end of one simulation day.
///
/// Cumulative counters are split by transmission channel; the rolling values
/// cover the trailing 10 days plus the day being reported, matching the
/// window the intervention triggers watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitCountsRow {
    pub day:        u64,
    pub unit:       u16,
    pub population: u64,

    /// Symptomatic cases and infections recorded during this day.
    pub cases_today:      u64,
    pub infections_today: u64,

    pub cum_cases_household: u64,
    pub cum_cases_place:     u64,
    pub cum_cases_community: u64,

    pub cum_infections_household: u64,
    pub cum_infections_place:     u64,
    pub cum_infections_community: u64,

    pub rolling_cases_10day:      u64,
    pub rolling_infections_10day: u64,
}

impl UnitCountsRow {
    /// Snapshot `unit` at the end of `day`, before the day's counters roll
    /// into the 10-day window.
    pub fn from_unit(day: u64, unit: &AdminUnit) -> Self {
        UnitCountsRow {
            day,
            unit: unit.id.0,
            population: unit.population,
            cases_today: unit.cases_today,
            infections_today: unit.infections_today,
            cum_cases_household: unit.cum_cases.household,
            cum_cases_place: unit.cum_cases.place,
            cum_cases_community: unit.cum_cases.community,
            cum_infections_household: unit.cum_infections.household,
            cum_infections_place: unit.cum_infections.place,
            cum_infections_community: unit.cum_infections.community,
            rolling_cases_10day: unit.cases_10day.sum() + unit.cases_today,
            rolling_infections_10day: unit.infections_10day.sum() + unit.infections_today,
        }
    }
}
