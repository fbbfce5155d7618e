//! `ep-core` — foundational types for the `epigrid` epidemic simulator.
//!
//! This crate is a dependency of every other `ep-*` crate.  It intentionally
//! has no `ep-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                                  |
//! |-----------|-----------------------------------------------------------|
//! | [`ids`]   | `PersonId`, `HouseholdId`, `PlaceId`, `PatchId`, `UnitId`,|
//! |           | `CaseId`, `GroupId`, `RankId`                             |
//! | [`geo`]   | `GeoPoint`, haversine distance                            |
//! | [`time`]  | `Step`, `SimClock`, `SimConfig`                           |
//! | [`rng`]   | `WorkerRng` (per-worker), `SimRng` (global)               |
//! | [`error`] | `EpiError`, `EpiResult`                                   |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                      |
//! |---------|-------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.         |

pub mod error;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{EpiError, EpiResult};
pub use geo::GeoPoint;
pub use ids::{CaseId, GroupId, HouseholdId, PatchId, PersonId, PlaceId, RankId, UnitId};
pub use rng::{SimRng, WorkerRng};
pub use time::{SimClock, SimConfig, Step};
