//! The two collective rounds of a timestep: one small sizing exchange, then
//! one payload all-to-all.
//!
//! The sizing round ships a [`SizingBlock`] from every rank to every rank:
//! the byte lengths of the three message classes toward each destination,
//! the per-unit statistics deltas, and the continue flag.  After it, every
//! rank knows exactly how many bytes it will receive from every peer, so the
//! payload round moves pre-sized buffers with no dynamic growth.
//!
//! No communication library is prescribed; [`Collective`] is the seam.
//! [`LocalCollective`] implements it over in-process shared state for
//! single-process multi-rank runs and for tests.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use ep_core::{RankId, UnitId};
use ep_pop::ChannelCounts;

use crate::buffers::MergedBuffers;
use crate::error::{ExchangeError, ExchangeResult};

// ── Sizing round ──────────────────────────────────────────────────────────

/// New-case/new-infection counts for one administrative unit, accumulated on
/// a remote rank and folded into the unit (and its ancestors) at home.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UnitDelta {
    pub unit:       UnitId,
    pub cases:      ChannelCounts,
    pub infections: ChannelCounts,
}

/// One rank's row of the N×N sizing grid, plus the administrative block that
/// rides along to avoid a second small round.
#[derive(Clone, Debug, PartialEq)]
pub struct SizingBlock {
    pub from:   RankId,
    /// Request/reply/event byte lengths, indexed by destination rank.
    pub req:    Vec<u32>,
    pub reply:  Vec<u32>,
    pub event:  Vec<u32>,
    pub stats:  Vec<UnitDelta>,
    /// True while this rank still has pending work (§fixed-point termination).
    pub active: bool,
}

impl SizingBlock {
    pub fn from_merged(
        from: RankId,
        merged: &MergedBuffers,
        stats: Vec<UnitDelta>,
        active: bool,
    ) -> Self {
        let n = merged.req.len();
        let mut block = SizingBlock {
            from,
            req: Vec::with_capacity(n),
            reply: Vec::with_capacity(n),
            event: Vec::with_capacity(n),
            stats,
            active,
        };
        for dest in 0..n {
            let (r, p, e) = merged.sizes(dest);
            block.req.push(r);
            block.reply.push(p);
            block.event.push(e);
        }
        block
    }

    /// Declared bytes toward `dest`, all three classes.
    pub fn toward(&self, dest: usize) -> (u32, u32, u32) {
        (self.req[dest], self.reply[dest], self.event[dest])
    }
}

/// The full grid after the sizing round, indexed by source rank.
pub type SizeGrid = Vec<SizingBlock>;

/// True while any rank reports pending work.
pub fn any_active(grid: &SizeGrid) -> bool {
    grid.iter().any(|b| b.active)
}

// ── Payload packing ───────────────────────────────────────────────────────

/// Concatenate the three classes per destination for the single payload
/// round: request bytes, then reply bytes, then event bytes.
pub fn pack_payloads(merged: MergedBuffers) -> Vec<Vec<u8>> {
    let n = merged.req.len();
    let mut out = Vec::with_capacity(n);
    for (dest, req) in merged.req.into_iter().enumerate() {
        let mut buf = req;
        buf.extend_from_slice(&merged.reply[dest]);
        buf.extend_from_slice(&merged.event[dest]);
        out.push(buf);
    }
    out
}

/// Split one received payload back into classes using the sender's declared
/// lengths.  A byte-total disagreement is logged and clamped to what actually
/// arrived, so the step can proceed.
pub fn split_payload(
    from: RankId,
    buf: Vec<u8>,
    declared: (u32, u32, u32),
) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let (r, p, e) = declared;
    let total = (r + p + e) as usize;
    if buf.len() != total {
        log::warn!(
            "payload from rank {} holds {} bytes, sizing round declared {}; clamping",
            from.0,
            buf.len(),
            total
        );
    }
    let r_end = (r as usize).min(buf.len());
    let p_end = (r as usize + p as usize).min(buf.len());
    let event = buf[p_end..].to_vec();
    let reply = buf[r_end..p_end].to_vec();
    let mut req = buf;
    req.truncate(r_end);
    (req, reply, event)
}

// ── Collective seam ───────────────────────────────────────────────────────

/// Blocking collective operations over all ranks.  Both calls are barriers:
/// they return only once every rank has contributed.
pub trait Collective {
    fn ranks(&self) -> usize;

    /// Exchange sizing blocks; returns the full grid, indexed by source rank.
    fn exchange_sizes(&self, block: SizingBlock) -> ExchangeResult<SizeGrid>;

    /// All-to-all byte exchange.  `payloads[dest]` is what this rank sends to
    /// `dest`; the result is indexed by source rank.
    fn all_to_all(&self, payloads: Vec<Vec<u8>>) -> ExchangeResult<Vec<Vec<u8>>>;
}

// ── In-process fabric ─────────────────────────────────────────────────────

struct Round<T> {
    items:     Vec<Option<T>>,
    deposited: usize,
    ready:     Option<Arc<Vec<T>>>,
    taken:     usize,
}

/// A reusable all-gather point: every participant deposits one item and
/// receives a copy of all items.  A round must fully drain before the next
/// may begin, which the deposit wait enforces.
struct Rendezvous<T> {
    state: Mutex<Round<T>>,
    cv:    Condvar,
    n:     usize,
}

impl<T: Clone> Rendezvous<T> {
    fn new(n: usize) -> Self {
        Rendezvous {
            state: Mutex::new(Round {
                items:     (0..n).map(|_| None).collect(),
                deposited: 0,
                ready:     None,
                taken:     0,
            }),
            cv: Condvar::new(),
            n,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Round<T>> {
        // A poisoned lock means a peer rank panicked mid-round; the state
        // itself is still structurally sound, so carry on rather than
        // cascading the panic through every rank.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn exchange(&self, rank: usize, item: T) -> Vec<T> {
        let mut s = self.lock();
        while s.ready.is_some() {
            s = self.cv.wait(s).unwrap_or_else(|e| e.into_inner());
        }
        s.items[rank] = Some(item);
        s.deposited += 1;
        if s.deposited == self.n {
            let all: Vec<T> = s.items.iter_mut().map(|o| o.take().unwrap()).collect();
            s.ready = Some(Arc::new(all));
            s.deposited = 0;
            self.cv.notify_all();
        }
        while s.ready.is_none() {
            s = self.cv.wait(s).unwrap_or_else(|e| e.into_inner());
        }
        let out = s.ready.as_ref().unwrap().as_ref().clone();
        s.taken += 1;
        if s.taken == self.n {
            s.ready = None;
            s.taken = 0;
            self.cv.notify_all();
        }
        out
    }
}

struct Fabric {
    sizes:    Rendezvous<SizingBlock>,
    payloads: Rendezvous<Vec<Vec<u8>>>,
}

/// One rank's endpoint of the in-process collective fabric.
pub struct LocalCollective {
    rank:   usize,
    shared: Arc<Fabric>,
}

impl LocalCollective {
    /// Build endpoints for `ranks` participants sharing one fabric.
    pub fn fabric(ranks: usize) -> Vec<LocalCollective> {
        let shared = Arc::new(Fabric {
            sizes:    Rendezvous::new(ranks),
            payloads: Rendezvous::new(ranks),
        });
        (0..ranks)
            .map(|rank| LocalCollective { rank, shared: Arc::clone(&shared) })
            .collect()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

impl Collective for LocalCollective {
    fn ranks(&self) -> usize {
        self.shared.sizes.n
    }

    fn exchange_sizes(&self, block: SizingBlock) -> ExchangeResult<SizeGrid> {
        let n = self.ranks();
        if block.req.len() != n || block.reply.len() != n || block.event.len() != n {
            return Err(ExchangeError::RankCount { expected: n, got: block.req.len() });
        }
        Ok(self.shared.sizes.exchange(self.rank, block))
    }

    fn all_to_all(&self, payloads: Vec<Vec<u8>>) -> ExchangeResult<Vec<Vec<u8>>> {
        let n = self.ranks();
        if payloads.len() != n {
            return Err(ExchangeError::RankCount { expected: n, got: payloads.len() });
        }
        let rows = self.shared.payloads.exchange(self.rank, payloads);
        Ok(rows
            .into_iter()
            .map(|mut row| std::mem::take(&mut row[self.rank]))
            .collect())
    }
}
