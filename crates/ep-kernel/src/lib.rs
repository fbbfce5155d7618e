//! `ep-kernel` — spatial kernel and patch sampling index.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                   |
//! |------------|------------------------------------------------------------|
//! | [`grid`]   | `GridSpec`, `PatchGeometry`, rectangle-to-rectangle        |
//! |            | great-circle distance                                      |
//! | [`kernel`] | `KernelParams`, the power-law decay `kernel_f`             |
//! | [`cdf`]    | `PatchCdf` — cumulative kernel distribution per patch,     |
//! |            | built once and binary-searched per community contact       |
//! | [`error`]  | `KernelError`, `KernelResult<T>`                           |
//!
//! # How the pieces fit
//!
//! Community-contact sampling is two-stage: first a *target patch* is drawn
//! from the source patch's precomputed [`PatchCdf`] (weight = kernel value at
//! patch-to-patch distance × target population), then the owning rank applies
//! a rejection test against the true person-to-person kernel value.  The CDF
//! is therefore only a proposal distribution; the rejection step in
//! `ep-contact` makes the final acceptance exact.

pub mod cdf;
pub mod error;
pub mod grid;
pub mod kernel;


pub use cdf::{PatchCdf, build_cdf};
pub use error::{KernelError, KernelResult};
pub use grid::{GridSpec, PatchGeometry, center_distance_km, grid_distance_km};
pub use kernel::KernelParams;
