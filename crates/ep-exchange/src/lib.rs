//! `ep-exchange` — the distributed contact-resolution protocol for epigrid.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                |
//! |----------------|---------------------------------------------------------|
//! | [`wire`]       | little-endian fixed-width codecs for request, reply,    |
//! |                | and establishment-event fragments                       |
//! | [`buffers`]    | per-worker per-destination send buffers, in-place       |
//! |                | finalize patching, per-destination merge                |
//! | [`collective`] | `SizingBlock`, `Collective` seam, `LocalCollective`     |
//! |                | in-process fabric, payload pack/split                   |
//! | [`link`]       | sequential reply-chain linking and traversal            |
//! | [`error`]      | `ExchangeError`, `ExchangeResult<T>`                    |
//!
//! # Protocol shape
//!
//! Each timestep every rank runs exactly two collective rounds with its
//! peers.  The sizing round exchanges the N×N grid of byte lengths for the
//! three message classes plus the per-unit statistics deltas and the
//! continue flag.  The payload round is one all-to-all move of the merged
//! byte buffers, pre-sized from the grid.  Everything else (building,
//! linking, resolving) is rank-local.

pub mod buffers;
pub mod collective;
pub mod error;
pub mod link;
pub mod wire;


pub use buffers::{MergedBuffers, RequestCursor, SendBuffers, WorkerBuffers};
pub use collective::{
    Collective, LocalCollective, SizeGrid, SizingBlock, UnitDelta, any_active, pack_payloads,
    split_payload,
};
pub use error::{ExchangeError, ExchangeResult};
pub use link::{ReplyHead, chain, link_replies};
pub use wire::{
    ByteReader, ByteWriter, ChainTag, ContactRecord, PlaceEvent, ReplyFragment, RequestFragment,
};
