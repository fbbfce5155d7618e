//! `ep-schedule` — rolling event queues for the epigrid timestep loop.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                 |
//! |------------|----------------------------------------------------------|
//! | [`ring`]   | `RollingQueue<T>` — fixed-window circular slot array     |
//! |            | with per-worker buckets                                  |
//! | [`queues`] | `EventQueues` — the contact/symptom/recovery queues plus |
//! |            | the two-slot confirmation toggle, and window sizing      |
//! | [`error`]  | `ScheduleError`, `ScheduleResult<T>`                     |
//!
//! # Design
//!
//! Events are dense in time (every infectious case produces activity every
//! step of its infectious period), so a sparse map keyed by step would buy
//! nothing.  Instead each queue is a fixed circular array of `W` slots — an
//! event `k` steps ahead lands in slot `(cursor + k) mod W` — with one bucket
//! per worker inside each slot so the parallel phase appends without
//! coordination.  `W` strictly exceeds the longest possible latent plus
//! infectious duration, so a slot is always drained before it can be reused.

pub mod error;
pub mod queues;
pub mod ring;

#[cfg(test)]
mod tests;

pub use error::{ScheduleError, ScheduleResult};
pub use queues::{EventQueues, window_len};
pub use ring::RollingQueue;
