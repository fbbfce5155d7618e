//! Little-endian fixed-width wire formats for the contact-resolution round.
//!
//! Field widths and byte offsets are load-bearing: peer ranks decode these
//! buffers byte-for-byte, so every layout change is a protocol change.
//!
//! # Request fragment
//!
//! One fragment groups all remote community-contact attempts of a single
//! infector toward a single destination rank:
//!
//! ```text
//! offset  width  field
//!      0      4  infector patch x
//!      4      4  infector patch y
//!      8      2  infector case handle: owning rank
//!     10      4  infector case handle: registry index
//!     14      2  local tentative-contact count        (0 until finalize)
//!     16      2  record count
//!     18      2  order-slot count n
//!     20    2*n  order slots                          (0xFFFF until finalize)
//!      …     16  records: target x u32, target y u32, size hint u16,
//!                contact step u32, order index u16
//!      …      2  interested-rank count k              (appended at finalize)
//!      …    2*k  interested ranks
//! ```
//!
//! The order slots and the local count are placeholders while worker threads
//! build the buffers; the per-case finalize step patches them in place and
//! appends the interested-rank list, so every recipient can reconstruct the
//! infector's global contact precedence without a second round.
//!
//! # Reply fragment
//!
//! ```text
//! offset  width  field
//!      0      1  chain tag (0 single, 1 first, 2 middle, 3 last)
//!      1      4  follow offset of the next fragment in this chain
//!      5      4  infector case registry index (on the receiving rank)
//!      9      2  accepted-order count m
//!     11    2*m  accepted order indices
//! ```
//!
//! Replies to one infector may be produced by different worker threads on the
//! resolving rank and therefore land at unrelated offsets of the flat buffer.
//! Fragments are always *sent* as `Single`; the receiver's linking pass
//! ([`crate::link`]) patches tags and follow offsets in place.
//!
//! # Place-establishment event fragment
//!
//! Tagged by a leading kind byte; infection events carry the precomputed
//! infectiousness (no acceptance kernel is applied on the receiving side).

use ep_core::{CaseId, PlaceId, RankId, Step};
use ep_pop::CaseHandle;

use crate::error::{ExchangeError, ExchangeResult};

// ── Primitive codec ───────────────────────────────────────────────────────

/// Append-only little-endian writer over a byte buffer.
pub struct ByteWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> ByteWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        ByteWriter { buf }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    #[inline]
    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
}

/// Overwrite a `u16` previously written at `at`.  Panics on out-of-range
/// offsets; callers only patch offsets they recorded while writing.
#[inline]
pub fn patch_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn patch_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

/// Bounds-checked little-endian reader.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, pos: 0 }
    }

    /// Start reading at `at` (used to follow reply-chain offsets).
    pub fn at(buf: &'a [u8], at: usize) -> ExchangeResult<Self> {
        if at > buf.len() {
            return Err(ExchangeError::Truncated { wanted: 0, at });
        }
        Ok(ByteReader { buf, pos: at })
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> ExchangeResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(ExchangeError::Truncated { wanted: n, at: self.pos });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn take_u8(&mut self) -> ExchangeResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn take_u16(&mut self) -> ExchangeResult<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn take_u32(&mut self) -> ExchangeResult<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn take_f32(&mut self) -> ExchangeResult<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }
}

// ── Request fragments ─────────────────────────────────────────────────────

/// Byte offsets within a request-fragment header.
pub const REQ_LOCAL_COUNT_AT: usize = 14;
pub const REQ_RECORD_COUNT_AT: usize = 16;
pub const REQ_ORDER_SLOTS_AT: usize = 20;
/// Header length excluding the variable order-slot block.
pub const REQ_HEADER_LEN: usize = 20;
pub const REQ_RECORD_LEN: usize = 16;

/// Placeholder written into order slots until the finalize step.
pub const ORDER_PLACEHOLDER: u16 = u16::MAX;

/// One remote community-contact attempt inside a request fragment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContactRecord {
    /// Grid coordinates of the target patch (owned by the destination rank).
    pub target_x: u32,
    pub target_y: u32,
    /// Patch size hint used by the resolver's rejection test.
    pub target_size: u16,
    /// Absolute step at which the contact would occur.
    pub step: Step,
    /// The infector's order index for this attempt.
    pub order: u16,
}

impl ContactRecord {
    pub fn encode(&self, w: &mut ByteWriter<'_>) {
        w.put_u32(self.target_x);
        w.put_u32(self.target_y);
        w.put_u16(self.target_size);
        w.put_u32(self.step.0 as u32);
        w.put_u16(self.order);
    }

    pub fn decode(r: &mut ByteReader<'_>) -> ExchangeResult<Self> {
        Ok(ContactRecord {
            target_x:    r.take_u32()?,
            target_y:    r.take_u32()?,
            target_size: r.take_u16()?,
            step:        Step(u64::from(r.take_u32()?)),
            order:       r.take_u16()?,
        })
    }
}

/// A fully decoded request fragment, as seen by the resolving rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestFragment {
    pub case:        CaseHandle,
    pub infector_x:  u32,
    pub infector_y:  u32,
    /// How many tentative contacts the infector claimed locally.
    pub local_count: u16,
    /// The infector's locally-chosen contact order, one entry per order slot.
    pub orders:      Vec<u16>,
    pub records:     Vec<ContactRecord>,
    /// Every rank addressed by this infector, in ascending order.
    pub ranks:       Vec<RankId>,
}

impl RequestFragment {
    /// Single-shot encode of an already-finalized fragment.  The streaming
    /// path in [`crate::buffers`] produces identical bytes via patching.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut w = ByteWriter::new(buf);
        w.put_u32(self.infector_x);
        w.put_u32(self.infector_y);
        w.put_u16(self.case.rank.0);
        w.put_u32(self.case.case.0);
        w.put_u16(self.local_count);
        w.put_u16(self.records.len() as u16);
        w.put_u16(self.orders.len() as u16);
        for &o in &self.orders {
            w.put_u16(o);
        }
        for rec in &self.records {
            rec.encode(&mut w);
        }
        w.put_u16(self.ranks.len() as u16);
        for r in &self.ranks {
            w.put_u16(r.0);
        }
    }

    pub fn decode(r: &mut ByteReader<'_>) -> ExchangeResult<Self> {
        let infector_x = r.take_u32()?;
        let infector_y = r.take_u32()?;
        let rank = RankId(r.take_u16()?);
        let case = CaseId(r.take_u32()?);
        let local_count = r.take_u16()?;
        let n_records = r.take_u16()?;
        let n_orders = r.take_u16()?;
        let mut orders = Vec::with_capacity(n_orders as usize);
        for _ in 0..n_orders {
            orders.push(r.take_u16()?);
        }
        let mut records = Vec::with_capacity(n_records as usize);
        for _ in 0..n_records {
            records.push(ContactRecord::decode(r)?);
        }
        let n_ranks = r.take_u16()?;
        let mut ranks = Vec::with_capacity(n_ranks as usize);
        for _ in 0..n_ranks {
            ranks.push(RankId(r.take_u16()?));
        }
        Ok(RequestFragment {
            case: CaseHandle { rank, case },
            infector_x,
            infector_y,
            local_count,
            orders,
            records,
            ranks,
        })
    }

    /// Decode every fragment in a received request buffer.
    pub fn decode_all(buf: &[u8]) -> ExchangeResult<Vec<RequestFragment>> {
        let mut r = ByteReader::new(buf);
        let mut out = Vec::new();
        while r.remaining() > 0 {
            out.push(RequestFragment::decode(&mut r)?);
        }
        Ok(out)
    }
}

// ── Reply fragments ───────────────────────────────────────────────────────

pub const REPLY_TAG_AT: usize = 0;
pub const REPLY_NEXT_AT: usize = 1;
pub const REPLY_CASE_AT: usize = 5;
/// Fixed-width prefix before the accepted-order list.
pub const REPLY_HEADER_LEN: usize = 11;

/// Sentinel follow offset for the end of a chain.
pub const NO_FOLLOW: u32 = u32::MAX;

/// Position of a reply fragment within its per-case chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ChainTag {
    Single = 0,
    First  = 1,
    Middle = 2,
    Last   = 3,
}

impl ChainTag {
    pub fn from_byte(b: u8) -> ExchangeResult<ChainTag> {
        match b {
            0 => Ok(ChainTag::Single),
            1 => Ok(ChainTag::First),
            2 => Ok(ChainTag::Middle),
            3 => Ok(ChainTag::Last),
            other => Err(ExchangeError::BadTag(other)),
        }
    }
}

/// One resolver's answer for one infector: the order indices it accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyFragment {
    pub tag:      ChainTag,
    /// Buffer offset of the next fragment in this chain, [`NO_FOLLOW`] if none.
    pub next:     u32,
    /// The infector's case registry index on the *receiving* rank.
    pub case:     CaseId,
    pub accepted: Vec<u16>,
}

impl ReplyFragment {
    /// A freshly produced reply; linking happens on the receiving side.
    pub fn new(case: CaseId, accepted: Vec<u16>) -> Self {
        ReplyFragment { tag: ChainTag::Single, next: NO_FOLLOW, case, accepted }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut w = ByteWriter::new(buf);
        w.put_u8(self.tag as u8);
        w.put_u32(self.next);
        w.put_u32(self.case.0);
        w.put_u16(self.accepted.len() as u16);
        for &o in &self.accepted {
            w.put_u16(o);
        }
    }

    pub fn decode(r: &mut ByteReader<'_>) -> ExchangeResult<Self> {
        let tag = ChainTag::from_byte(r.take_u8()?)?;
        let next = r.take_u32()?;
        let case = CaseId(r.take_u32()?);
        let n = r.take_u16()?;
        let mut accepted = Vec::with_capacity(n as usize);
        for _ in 0..n {
            accepted.push(r.take_u16()?);
        }
        Ok(ReplyFragment { tag, next, case, accepted })
    }
}

// ── Establishment events ──────────────────────────────────────────────────

/// Cross-rank place/household side effects applied single-threaded after the
/// resolution pass.  Infection events carry the sender's precomputed
/// infectiousness; the receiver applies no acceptance kernel.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaceEvent {
    Infection {
        place:          PlaceId,
        group:          u16,
        /// Member ordinal within the receiving rank's slice of the group.
        member:         u32,
        step:           Step,
        infectiousness: f32,
        source:         CaseHandle,
    },
    Closure {
        place: PlaceId,
        until: Step,
    },
    Prophylaxis {
        place: PlaceId,
        until: Step,
    },
}

const EVENT_INFECTION: u8 = 0;
const EVENT_CLOSURE: u8 = 1;
const EVENT_PROPHYLAXIS: u8 = 2;

impl PlaceEvent {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut w = ByteWriter::new(buf);
        match *self {
            PlaceEvent::Infection { place, group, member, step, infectiousness, source } => {
                w.put_u8(EVENT_INFECTION);
                w.put_u32(place.0);
                w.put_u16(group);
                w.put_u32(member);
                w.put_u32(step.0 as u32);
                w.put_f32(infectiousness);
                w.put_u16(source.rank.0);
                w.put_u32(source.case.0);
            }
            PlaceEvent::Closure { place, until } => {
                w.put_u8(EVENT_CLOSURE);
                w.put_u32(place.0);
                w.put_u32(until.0 as u32);
            }
            PlaceEvent::Prophylaxis { place, until } => {
                w.put_u8(EVENT_PROPHYLAXIS);
                w.put_u32(place.0);
                w.put_u32(until.0 as u32);
            }
        }
    }

    pub fn decode(r: &mut ByteReader<'_>) -> ExchangeResult<Self> {
        match r.take_u8()? {
            EVENT_INFECTION => Ok(PlaceEvent::Infection {
                place:          PlaceId(r.take_u32()?),
                group:          r.take_u16()?,
                member:         r.take_u32()?,
                step:           Step(u64::from(r.take_u32()?)),
                infectiousness: r.take_f32()?,
                source:         CaseHandle {
                    rank: RankId(r.take_u16()?),
                    case: CaseId(r.take_u32()?),
                },
            }),
            EVENT_CLOSURE => Ok(PlaceEvent::Closure {
                place: PlaceId(r.take_u32()?),
                until: Step(u64::from(r.take_u32()?)),
            }),
            EVENT_PROPHYLAXIS => Ok(PlaceEvent::Prophylaxis {
                place: PlaceId(r.take_u32()?),
                until: Step(u64::from(r.take_u32()?)),
            }),
            other => Err(ExchangeError::BadTag(other)),
        }
    }

    pub fn decode_all(buf: &[u8]) -> ExchangeResult<Vec<PlaceEvent>> {
        let mut r = ByteReader::new(buf);
        let mut out = Vec::new();
        while r.remaining() > 0 {
            out.push(PlaceEvent::decode(&mut r)?);
        }
        Ok(out)
    }
}
