//! Shared, read-only intervention definitions.
//!
//! A definition pairs one [`Measure`] with a start and a stop [`Trigger`].
//! Definitions are loaded once and never mutated; all per-unit state lives
//! in [`crate::live::LiveIntervention`].

use ep_pop::AdminUnit;

/// Which counter a threshold trigger watches.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Metric {
    Cases,
    Infections,
}

/// How the watched counter accumulates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Accumulation {
    /// The rolling 10-day window plus the running current day.
    Rolling,
    /// Cumulative since the start of the run.
    Cumulative,
}

/// How the threshold value is interpreted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Basis {
    /// Plain count.
    Absolute,
    /// Fraction of the unit's population (0 to 1).
    PerPopulation,
}

/// A start or stop condition, evaluated once per step against the owning
/// unit's counters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Trigger {
    /// Never fires; e.g. a measure that runs to the end of the simulation.
    Never,
    /// Fires on and after a fixed calendar day.
    FixedDay { day: u64 },
    /// Fires a fixed number of days after the measure activated.  Only
    /// meaningful as a stop trigger.
    AfterDays { days: u64 },
    /// Fires while a windowed counter is at or above `threshold`, with an
    /// optional activation delay once it first fires.
    Threshold {
        metric:       Metric,
        accumulation: Accumulation,
        basis:        Basis,
        threshold:    f64,
        delay_days:   u64,
    },
}

impl Trigger {
    /// Evaluate against `unit` at `day`.  `activated_day` is the day the
    /// owning measure last became active, for [`Trigger::AfterDays`].
    pub fn fires(&self, unit: &AdminUnit, day: u64, activated_day: Option<u64>) -> bool {
        match *self {
            Trigger::Never => false,
            Trigger::FixedDay { day: d } => day >= d,
            Trigger::AfterDays { days } => {
                activated_day.is_some_and(|a| day >= a + days)
            }
            Trigger::Threshold { metric, accumulation, basis, threshold, .. } => {
                let count = match (metric, accumulation) {
                    (Metric::Cases, Accumulation::Rolling) => {
                        unit.cases_10day.sum() + unit.cases_today
                    }
                    (Metric::Cases, Accumulation::Cumulative) => unit.cum_cases.total(),
                    (Metric::Infections, Accumulation::Rolling) => {
                        unit.infections_10day.sum() + unit.infections_today
                    }
                    (Metric::Infections, Accumulation::Cumulative) => {
                        unit.cum_infections.total()
                    }
                };
                match basis {
                    Basis::Absolute => count as f64 >= threshold,
                    Basis::PerPopulation => {
                        unit.population > 0
                            && count as f64 / unit.population as f64 >= threshold
                    }
                }
            }
        }
    }

    /// Days between the trigger first firing and the measure switching.
    pub fn delay_days(&self) -> u64 {
        match *self {
            Trigger::Threshold { delay_days, .. } => delay_days,
            _ => 0,
        }
    }
}

/// The parameter payload copied into a unit's live fields on activation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Measure {
    /// Probability a border crossing into the unit is denied.
    BorderControl { deny: f64 },
    /// Multiplier on the infectiousness of treated cases.
    Treatment { infectiousness_mult: f64 },
    /// Multiplier on the susceptibility of prophylaxed persons.
    Prophylaxis { susceptibility_mult: f64 },
    /// Fraction of the unit population vaccinated per day.
    Vaccination { rate_per_day: f64 },
    /// Contact-rate multiplier for households under an active quarantine
    /// window.
    Quarantine { contact_mult: f64 },
    /// Contact-rate multiplier for persons whose place is closed.
    Closure { household_mult: f64 },
}

/// One policy definition, shared by every unit it applies to.
#[derive(Clone, Debug, PartialEq)]
pub struct Intervention {
    pub name:    String,
    pub measure: Measure,
    pub start:   Trigger,
    pub stop:    Trigger,
}
