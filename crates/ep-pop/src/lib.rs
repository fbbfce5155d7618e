//! `ep-pop` — the population data model for the epigrid simulator.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                |
//! |---------------|---------------------------------------------------------|
//! | [`status`]    | `Status` / `StatusCell` — core infection state machine  |
//! |               | plus modifier flags, packed in one atomic byte          |
//! | [`person`]    | `PersonStore` — SoA arrays of immutable memberships     |
//! | [`household`] | `Household`, `TimeWindow`                               |
//! | [`place`]     | `Place`, `PlaceGroup`, `PlaceKind`                      |
//! | [`patch`]     | `Patch` (remote stub) / `LocalPatch` (owned state)      |
//! | [`unit`]      | `AdminUnit` tree, live intervention multipliers,        |
//! |               | per-channel counters, rolling 10-day accumulators       |
//! | [`case`]      | `InfectedCase`, `CaseRegistry`, `CaseHandle`,           |
//! |               | `TravelPlan`                                            |
//! | [`world`]     | `World` context + `WorldBuilder`                        |
//!
//! # Ownership model
//!
//! Every person, household, and local patch is owned by exactly one rank and
//! never relocated — only status-mutated.  Cross-rank references are always
//! logical handles (`CaseHandle`, `RankId` + local index), never addresses.
//! The only state mutated from multiple threads during the parallel contact
//! phase is the per-person [`StatusCell`] and the per-household
//! remaining-susceptible counter; everything else is thread-private or
//! touched in single-threaded phases only.

pub mod case;
pub mod error;
pub mod household;
pub mod patch;
pub mod person;
pub mod place;
pub mod status;
pub mod unit;
pub mod world;


// ── Re-exports ────────────────────────────────────────────────────────────────

// ID types come from `ep-core`; re-exported so population code can name them
// without a second crate import.
pub use ep_core::{CaseId, GroupId, HouseholdId, PatchId, PersonId, PlaceId, RankId, UnitId};

pub use case::{CaseHandle, CaseRegistry, Channel, InfectedCase, TentativeContact, TravelPlan};
pub use error::{PopError, PopResult};
pub use household::{Household, TimeWindow};
pub use patch::{LocalPatch, Patch};
pub use person::PersonStore;
pub use place::{Place, PlaceGroup, PlaceKind};
pub use status::{CoreStatus, Status, StatusCell};
pub use unit::{AdminUnit, ChannelCounts, LiveParams, RollingWindow};
pub use world::{DiseaseParams, World, WorldBuilder};
