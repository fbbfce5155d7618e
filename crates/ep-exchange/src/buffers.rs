//! Per-worker, per-destination send buffers for the exchange round.
//!
//! Worker threads own disjoint [`WorkerBuffers`] during the parallel contact
//! phase and append fragments without coordination.  Before the sizing round
//! the buffers are merged per destination rank, in worker order, into one
//! flat byte buffer per peer.
//!
//! Request fragments are built in place: the header goes down with
//! placeholder order slots and a zero local count, records are appended as
//! community sampling produces them, and the finalize step patches the
//! placeholders and appends the interested-rank list.  A fragment must be
//! finalized by the worker that began it before the merge.

use ep_core::RankId;
use ep_pop::CaseHandle;

use crate::wire::{
    self, ByteWriter, ContactRecord, ORDER_PLACEHOLDER, PlaceEvent, REQ_HEADER_LEN,
    REQ_RECORD_LEN, ReplyFragment, patch_u16,
};

/// Handle to an in-progress request fragment inside a worker's dest buffer.
///
/// Offsets are absolute within that buffer; the buffer is append-only until
/// the merge, so they stay valid across interleaved writes to *other*
/// destinations.
#[derive(Debug)]
pub struct RequestCursor {
    dest:     usize,
    base:     usize,
    n_orders: u16,
    records:  u16,
}

/// One worker thread's private send state.
#[derive(Debug, Default)]
pub struct WorkerBuffers {
    req:   Vec<Vec<u8>>,
    reply: Vec<Vec<u8>>,
    event: Vec<Vec<u8>>,
    /// Fragments begun but not yet finalized.
    open:  usize,
}

impl WorkerBuffers {
    fn new(ranks: usize) -> Self {
        WorkerBuffers {
            req:   vec![Vec::new(); ranks],
            reply: vec![Vec::new(); ranks],
            event: vec![Vec::new(); ranks],
            open:  0,
        }
    }

    /// Start a request fragment for one infector toward `dest`, reserving
    /// `order_slots` placeholder ordering slots.
    pub fn begin_request(
        &mut self,
        dest: RankId,
        case: CaseHandle,
        x: u32,
        y: u32,
        order_slots: u16,
    ) -> RequestCursor {
        let buf = &mut self.req[dest.index()];
        let base = buf.len();
        let mut w = ByteWriter::new(buf);
        w.put_u32(x);
        w.put_u32(y);
        w.put_u16(case.rank.0);
        w.put_u32(case.case.0);
        w.put_u16(0); // local count, patched at finalize
        w.put_u16(0); // record count, patched at finalize
        w.put_u16(order_slots);
        for _ in 0..order_slots {
            w.put_u16(ORDER_PLACEHOLDER);
        }
        self.open += 1;
        RequestCursor { dest: dest.index(), base, n_orders: order_slots, records: 0 }
    }

    /// Append one contact attempt to an open fragment.  Records of a fragment
    /// are contiguous; a worker processes one infector at a time, so no other
    /// fragment can interleave on the same destination buffer.
    pub fn push_record(&mut self, cur: &mut RequestCursor, rec: &ContactRecord) {
        let buf = &mut self.req[cur.dest];
        debug_assert_eq!(
            buf.len(),
            cur.base
                + REQ_HEADER_LEN
                + 2 * cur.n_orders as usize
                + REQ_RECORD_LEN * cur.records as usize,
        );
        rec.encode(&mut ByteWriter::new(buf));
        cur.records += 1;
    }

    /// Patch the placeholders and append the interested-rank list.
    ///
    /// `orders` is the infector's locally-chosen contact order; entries beyond
    /// the reserved slots are dropped (the slot count was the declared upper
    /// bound).  `ranks` must list every rank addressed by this infector.
    pub fn finalize_request(
        &mut self,
        cur: RequestCursor,
        local_count: u16,
        orders: &[u16],
        ranks: &[RankId],
    ) {
        let buf = &mut self.req[cur.dest];
        patch_u16(buf, cur.base + wire::REQ_LOCAL_COUNT_AT, local_count);
        patch_u16(buf, cur.base + wire::REQ_RECORD_COUNT_AT, cur.records);
        let slots = cur.base + wire::REQ_ORDER_SLOTS_AT;
        for (i, &o) in orders.iter().take(cur.n_orders as usize).enumerate() {
            patch_u16(buf, slots + 2 * i, o);
        }
        let mut w = ByteWriter::new(buf);
        w.put_u16(ranks.len() as u16);
        for r in ranks {
            w.put_u16(r.0);
        }
        self.open -= 1;
    }

    pub fn push_reply(&mut self, dest: RankId, frag: &ReplyFragment) {
        frag.encode(&mut self.reply[dest.index()]);
    }

    pub fn push_event(&mut self, dest: RankId, ev: &PlaceEvent) {
        ev.encode(&mut self.event[dest.index()]);
    }
}

/// Byte buffers for one message class, one `Vec<u8>` per destination rank.
pub type ClassBuffers = Vec<Vec<u8>>;

/// Everything this rank will send this step, merged per destination.
#[derive(Debug, Default)]
pub struct MergedBuffers {
    pub req:   ClassBuffers,
    pub reply: ClassBuffers,
    pub event: ClassBuffers,
}

impl MergedBuffers {
    /// Byte length of each class toward `dest`.
    pub fn sizes(&self, dest: usize) -> (u32, u32, u32) {
        (
            self.req[dest].len() as u32,
            self.reply[dest].len() as u32,
            self.event[dest].len() as u32,
        )
    }
}

/// All workers' send state for one rank.
#[derive(Debug)]
pub struct SendBuffers {
    workers: Vec<WorkerBuffers>,
    ranks:   usize,
}

impl SendBuffers {
    pub fn new(workers: usize, ranks: usize) -> Self {
        SendBuffers {
            workers: (0..workers).map(|_| WorkerBuffers::new(ranks)).collect(),
            ranks,
        }
    }

    pub fn ranks(&self) -> usize {
        self.ranks
    }

    /// Disjoint per-worker views for the parallel phase.
    pub fn workers_mut(&mut self) -> &mut [WorkerBuffers] {
        &mut self.workers
    }

    /// Concatenate worker buffers per destination, in worker order, emptying
    /// the worker buffers for the next step.  Every begun fragment must have
    /// been finalized.
    pub fn merge(&mut self) -> MergedBuffers {
        debug_assert!(self.workers.iter().all(|w| w.open == 0));
        let mut out = MergedBuffers {
            req:   vec![Vec::new(); self.ranks],
            reply: vec![Vec::new(); self.ranks],
            event: vec![Vec::new(); self.ranks],
        };
        for w in &mut self.workers {
            for dest in 0..self.ranks {
                out.req[dest].append(&mut w.req[dest]);
                out.reply[dest].append(&mut w.reply[dest]);
                out.event[dest].append(&mut w.event[dest]);
            }
        }
        out
    }
}
