//! Person infection status: core state machine plus modifier flags.
//!
//! # Encoding
//!
//! One byte per person: bits 0–1 hold the core state (exactly one of
//! susceptible / contacted / immune), bits 2–6 are independent modifier
//! flags.  The byte lives in an `AtomicU8` because "claim susceptibility" —
//! the compare-exchange from Susceptible to Contacted — is the one operation
//! the parallel contact phase performs against shared state.  Every other
//! transition happens in single-threaded phases and uses plain stores.

use std::sync::atomic::{AtomicU8, Ordering};

const CORE_MASK: u8 = 0b0000_0011;

/// The mutually exclusive core infection state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CoreStatus {
    /// Never infected; may be claimed by a contact.
    Susceptible = 0,
    /// Claimed by a (possibly still tentative) contact, or actively infected.
    Contacted = 1,
    /// Recovered or vaccinated-immune; permanently out of the susceptible pool.
    Immune = 2,
}

impl CoreStatus {
    fn from_bits(bits: u8) -> CoreStatus {
        match bits & CORE_MASK {
            0 => CoreStatus::Susceptible,
            1 => CoreStatus::Contacted,
            _ => CoreStatus::Immune,
        }
    }
}

/// Modifier flags, orthogonal to the core state.
pub mod flag {
    pub const SYMPTOMATIC: u8 = 1 << 2;
    pub const DETECTED: u8 = 1 << 3;
    pub const SEVERE: u8 = 1 << 4;
    pub const PROPHYLAXED: u8 = 1 << 5;
    pub const VACCINATED: u8 = 1 << 6;
}

// ── Status ────────────────────────────────────────────────────────────────────

/// A decoded snapshot of one person's status byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Status(u8);

impl Status {
    pub fn new(core: CoreStatus, flags: u8) -> Self {
        Status((core as u8) | (flags & !CORE_MASK))
    }

    #[inline]
    pub fn core(self) -> CoreStatus {
        CoreStatus::from_bits(self.0)
    }

    #[inline]
    pub fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }
}

// ── StatusCell ────────────────────────────────────────────────────────────────

/// The shared, atomically claimable status byte of one person.
///
/// Stored per person in `PersonStore`; `Vec<StatusCell>` is `Sync`, so worker
/// threads can race on claims without any lock.
#[derive(Debug, Default)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    /// A fresh susceptible person with no modifier flags.
    pub fn susceptible() -> Self {
        StatusCell(AtomicU8::new(CoreStatus::Susceptible as u8))
    }

    /// Snapshot the current status.
    #[inline]
    pub fn load(&self) -> Status {
        Status(self.0.load(Ordering::Acquire))
    }

    /// Attempt the Susceptible → Contacted transition.
    ///
    /// Returns `true` iff this caller won the claim.  Exactly one of any
    /// number of concurrent claimants succeeds; modifier flags are preserved.
    pub fn claim_susceptible(&self) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if CoreStatus::from_bits(current) != CoreStatus::Susceptible {
                return false;
            }
            let next = (current & !CORE_MASK) | CoreStatus::Contacted as u8;
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Revert a tentative claim that lost the contact-order merge.
    ///
    /// Only valid for a claim this rank made in the current timestep; the
    /// person returns to the susceptible pool with flags intact.
    pub fn release_claim(&self) {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if CoreStatus::from_bits(current) != CoreStatus::Contacted {
                return;
            }
            let next = (current & !CORE_MASK) | CoreStatus::Susceptible as u8;
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Overwrite the core state, preserving flags.  Single-threaded phases only.
    pub fn set_core(&self, core: CoreStatus) {
        let current = self.0.load(Ordering::Acquire);
        self.0
            .store((current & !CORE_MASK) | core as u8, Ordering::Release);
    }

    /// Set a modifier flag.  Single-threaded phases only.
    pub fn set_flag(&self, flag: u8) {
        self.0.fetch_or(flag & !CORE_MASK, Ordering::AcqRel);
    }

    /// Clear a modifier flag.  Single-threaded phases only.
    pub fn clear_flag(&self, flag: u8) {
        self.0.fetch_and(!(flag & !CORE_MASK), Ordering::AcqRel);
    }
}

impl Clone for StatusCell {
    fn clone(&self) -> Self {
        StatusCell(AtomicU8::new(self.0.load(Ordering::Acquire)))
    }
}
