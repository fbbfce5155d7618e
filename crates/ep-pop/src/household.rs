//! Households and intervention time windows.

use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

use ep_core::Step;

// ── TimeWindow ────────────────────────────────────────────────────────────────

/// A half-open interval of absolute timesteps during which a measure applies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeWindow {
    pub start: Step,
    pub end: Step,
}

impl TimeWindow {
    pub fn new(start: Step, end: Step) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, step: Step) -> bool {
        self.start <= step && step < self.end
    }
}

/// `true` if `window` is set and covers `step`.
#[inline]
pub fn window_active(window: &Option<TimeWindow>, step: Step) -> bool {
    window.is_some_and(|w| w.contains(step))
}

// ── Household ─────────────────────────────────────────────────────────────────

/// A fixed set of contiguous persons sharing a dwelling.
///
/// Created at load time, mutated by intervention application (the two
/// windows) and by successful claims (the susceptible counter), never
/// destroyed during a run.  Households never span ranks, so household
/// contacts never enter the distributed round.
#[derive(Debug)]
pub struct Household {
    /// Contiguous person index range in `PersonStore`.
    pub people: Range<u32>,

    /// Persons in this household still in the susceptible pool.  Decremented
    /// on successful claims (parallel phase, hence atomic) and incremented
    /// when a tentative claim is released.
    pub susceptible_left: AtomicU32,

    /// Active household prophylaxis episode, if any.
    pub prophylaxis: Option<TimeWindow>,

    /// Active quarantine episode, if any.
    pub quarantine: Option<TimeWindow>,
}

impl Household {
    pub fn new(people: Range<u32>) -> Self {
        let size = people.end - people.start;
        Self {
            people,
            susceptible_left: AtomicU32::new(size),
            prophylaxis: None,
            quarantine: None,
        }
    }

    /// Number of persons in the household.
    #[inline]
    pub fn size(&self) -> u32 {
        self.people.end - self.people.start
    }

    #[inline]
    pub fn is_quarantined(&self, step: Step) -> bool {
        window_active(&self.quarantine, step)
    }

    #[inline]
    pub fn is_prophylaxed(&self, step: Step) -> bool {
        window_active(&self.prophylaxis, step)
    }

    /// Record a successful claim of one member.
    #[inline]
    pub fn note_claim(&self) {
        self.susceptible_left.fetch_sub(1, Ordering::AcqRel);
    }

    /// Record a released (discarded tentative) claim of one member.
    #[inline]
    pub fn note_release(&self) {
        self.susceptible_left.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub fn susceptible_left(&self) -> u32 {
        self.susceptible_left.load(Ordering::Acquire)
    }
}
