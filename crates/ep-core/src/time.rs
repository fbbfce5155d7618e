//! Simulation time model.
//!
//! # Design
//!
//! Time is represented as a monotonically increasing `Step` counter.  The
//! mapping to simulated hours is held in `SimClock`:
//!
//!   hour = step * 24 / steps_per_day
//!
//! Using an integer step as the canonical time unit means all queue
//! arithmetic is exact (no floating-point drift) and slot indices are plain
//! modular arithmetic.  Event records that carry a time on the wire carry the
//! absolute step, never a floating-point hour.

use std::fmt;

pub const HOURS_PER_DAY: u32 = 24;

// ── Step ─────────────────────────────────────────────────────────────────────

/// An absolute simulation timestep counter.
///
/// Stored as `u64`: at 24 steps/day a run of `u64::MAX` steps lasts ~2
/// quadrillion years, so overflow is not a practical concern.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Step(pub u64);

impl Step {
    pub const ZERO: Step = Step(0);

    /// Return the step `n` ticks after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Step {
        Step(self.0 + n)
    }

    /// Steps elapsed from `earlier` to `self`.
    ///
    /// # Panics
    /// Panics in debug mode if `earlier > self`.
    #[inline]
    pub fn since(self, earlier: Step) -> u64 {
        self.0 - earlier.0
    }
}

impl std::ops::Add<u64> for Step {
    type Output = Step;
    #[inline]
    fn add(self, rhs: u64) -> Step {
        Step(self.0 + rhs)
    }
}

impl std::ops::Sub for Step {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Step) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Converts between step counts and simulated hours/days.
///
/// `SimClock` is cheap to copy and intentionally holds no heap data.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// Timesteps per simulated day.  Default: 4 (6-hour steps).
    pub steps_per_day: u32,
    /// The current step — advanced by `SimClock::advance()` each iteration.
    pub current: Step,
}

impl SimClock {
    pub fn new(steps_per_day: u32) -> Self {
        Self {
            steps_per_day,
            current: Step::ZERO,
        }
    }

    /// Advance the clock by one step.
    #[inline]
    pub fn advance(&mut self) {
        self.current = Step(self.current.0 + 1);
    }

    /// Simulated hours represented by a single step.
    #[inline]
    pub fn hours_per_step(&self) -> f64 {
        f64::from(HOURS_PER_DAY) / f64::from(self.steps_per_day)
    }

    /// Absolute simulated hour of `step`.
    #[inline]
    pub fn hour_of(&self, step: Step) -> f64 {
        step.0 as f64 * self.hours_per_step()
    }

    /// Whole simulated days elapsed at `step`.
    #[inline]
    pub fn day_of(&self, step: Step) -> u64 {
        step.0 / u64::from(self.steps_per_day)
    }

    // ── Step-count helpers ────────────────────────────────────────────────

    /// How many steps span `days` simulated days.
    #[inline]
    pub fn steps_for_days(&self, days: u64) -> u64 {
        days * u64::from(self.steps_per_day)
    }

    /// How many steps span `hours` simulated hours, rounding up so an event
    /// is never scheduled early.
    #[inline]
    pub fn steps_for_hours(&self, hours: f64) -> u64 {
        (hours / self.hours_per_step()).ceil() as u64
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let day = self.day_of(self.current);
        let hour = self.hour_of(self.current) % f64::from(HOURS_PER_DAY);
        write!(f, "{} (day {} {:02.0}h)", self.current, day, hour)
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level simulation configuration.
///
/// Typically loaded from a JSON/TOML file by the application crate and
/// shared by every component via the `World` context.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Timesteps per simulated day.
    pub steps_per_day: u32,

    /// Master RNG seed.  The same seed and rank layout always produce
    /// identical results.
    pub seed: u64,

    /// Worker thread count for the fork-join phases.
    pub workers: usize,

    /// This rank's identity within the distributed run.
    pub rank: crate::RankId,

    /// Total number of ranks participating in every collective round.
    pub ranks: u16,

    /// Upper bound on the latent period, in whole days.  Together with
    /// `infectious_cutoff_days` this sizes the rolling event window.
    pub latent_cutoff_days: u32,

    /// Upper bound on the infectious period, in whole days.
    pub infectious_cutoff_days: u32,

    /// Amplitude of the annual seasonality modulation, in `[0, 1]`.
    pub seasonality_amplitude: f64,

    /// Day of year at which seasonal transmission peaks.
    pub seasonality_peak_day: f64,

    /// Hard ceiling on simulated days, a guard against non-terminating
    /// parameter sets.  The run normally ends earlier, at the global
    /// no-pending-work fixed point.
    pub max_days: u64,
}

impl SimConfig {
    /// Construct a `SimClock` pre-configured for this run.
    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.steps_per_day)
    }

    /// Seasonal transmission multiplier for a given simulated day.
    ///
    /// `1 + A·cos(2π (day − peak)/365)` — equals `1 + A` at the peak day and
    /// `1 − A` half a year away.  Always non-negative for `A ≤ 1`.
    pub fn seasonality(&self, day: f64) -> f64 {
        let phase = (day - self.seasonality_peak_day) / 365.0 * std::f64::consts::TAU;
        1.0 + self.seasonality_amplitude * phase.cos()
    }

    /// Step ceiling implied by `max_days`.
    #[inline]
    pub fn max_step(&self) -> Step {
        Step(self.max_days * u64::from(self.steps_per_day))
    }
}

impl Default for SimConfig {
    /// Single-rank, single-worker defaults used by tests.
    fn default() -> Self {
        Self {
            steps_per_day: 4,
            seed: 0,
            workers: 1,
            rank: crate::RankId(0),
            ranks: 1,
            latent_cutoff_days: 14,
            infectious_cutoff_days: 21,
            seasonality_amplitude: 0.0,
            seasonality_peak_day: 0.0,
            max_days: 730,
        }
    }
}
