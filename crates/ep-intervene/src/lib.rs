//! `ep-intervene` — intervention policy definitions and trigger state
//! machines for epigrid.
//!
//! # Crate layout
//!
//! | Module   | Contents                                                    |
//! |----------|-------------------------------------------------------------|
//! | [`def`]  | `Intervention`, `Measure`, `Trigger` — shared read-only     |
//! |          | policy definitions                                          |
//! | [`live`] | `LiveIntervention` per-unit state machine, `InterventionSet`|
//!
//! Activation copies a measure's parameters into the owning unit's
//! [`ep_pop::LiveParams`] fields; deactivation clears them back to `None`.
//! Contact generation only ever reads those fields, so a measure's entire
//! effect is expressed through them.

pub mod def;
pub mod live;

#[cfg(test)]
mod tests;

pub use def::{Accumulation, Basis, Intervention, Measure, Metric, Trigger};
pub use live::{InterventionSet, LiveIntervention};
