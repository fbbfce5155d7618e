//! `ep-sim` — the timestep engine for epigrid.
//!
//! # Phase sequence of one step
//!
//! ```text
//! ① Seeds          — due seed infections are claimed and committed.
//! ② Generation     — workers stride the due infectious cases and run the
//!                    household, place, and community generators against
//!                    &World (parallel with the `parallel` feature).
//! ③ Exchange       — two collective rounds: sizing (byte lengths, unit
//!                    statistics deltas, continue flag), then one payload
//!                    all-to-all of the merged send buffers.
//! ④ Confirmation   — reply chains from the previous round are linked and
//!                    merged against each case's tentative claims, in
//!                    contact order; discarded claims are released.
//! ⑤ Servicing      — incoming request fragments are attempted against the
//!                    local population (parallel); replies ride the next
//!                    round.
//! ⑥ Events         — received place closure / prophylaxis / infection
//!                    events are applied.
//! ⑦ Commit         — pending infections become registered cases with
//!                    scheduled onset, symptom, and recovery events.
//! ⑧ Lifecycle      — draws land on their cases, contacts are rescheduled,
//!                    symptoms and recoveries fire.
//! ⑨ Bookkeeping    — unit statistics roll over; at day boundaries the
//!                    intervention triggers are evaluated and vaccination
//!                    runs.
//! ```
//!
//! The run terminates at the global fixed point: a step in which no rank
//! has outbound bytes, live cases, queued events, or remaining seeds.
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                  |
//! |------------|---------------------------------------------------------|
//! | `parallel` | Runs generation and servicing on Rayon's thread pool.   |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use ep_exchange::LocalCollective;
//! use ep_sim::{Engine, NoopObserver};
//!
//! let world = builder.build()?;
//! let collective = LocalCollective::fabric(1).remove(0);
//! let mut engine = Engine::new(world, interventions, collective)?;
//! engine.run(&mut NoopObserver)?;
//! ```

pub mod engine;
pub mod error;
pub mod observer;


pub use engine::Engine;
pub use error::{SimError, SimResult};
pub use observer::{EngineObserver, NoopObserver};
