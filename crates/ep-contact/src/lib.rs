//! `ep-contact` — contact generation and cross-rank reconciliation for
//! epigrid.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                |
//! |---------------|---------------------------------------------------------|
//! | [`ctx`]       | `StepCtx` — per-step read-only view shared by workers   |
//! | [`outcome`]   | `CaseDraw`, `PendingInfection` — parallel-phase intents |
//! | [`household`] | household transmission (immediate commit)               |
//! | [`place`]     | place transmission (local commit / remote event)        |
//! | [`community`] | spatial transmission (tentative claim / remote request) |
//! | [`resolve`]   | request servicing, order merge, claim release, events   |
//! | [`stats`]     | per-worker statistic deltas and the unit-tree reduction |
//!
//! # Phases
//!
//! The generators run in the parallel phase against `&World`; they mutate
//! nothing but the atomic status cells and household counters, emitting
//! intents for the engine to commit.  Everything in [`resolve`] that needs
//! `&mut` state runs in the sequential phases around the exchange round.

pub mod community;
pub mod ctx;
pub mod household;
pub mod outcome;
pub mod place;
pub mod resolve;
pub mod stats;

#[cfg(test)]
mod tests;

pub use community::{RETRY_BUDGET, community_contacts};
pub use ctx::StepCtx;
pub use household::household_contacts;
pub use outcome::{CaseDraw, PendingInfection, WorkerOutcome};
pub use place::place_contacts;
pub use resolve::{
    MergeOutcome, apply_place_events, merge_orders, own_handle, reconcile_case,
    release_discarded, service_request,
};
pub use stats::{StatsDelta, UnitCounts, apply_delta};
