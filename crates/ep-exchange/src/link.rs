//! Reply-chain linking.
//!
//! Reply fragments answering the same infector can arrive from several
//! source ranks, and within one rank from several worker threads, so they
//! sit at unrelated offsets of the flat received buffer.  This
//! single-threaded pass scans the buffer once, patches the chain tags and
//! follow offsets in place, and hands back one head per infector; the
//! resolution pass then walks each chain as a single logical reply.

use ep_core::CaseId;
use rustc_hash::FxHashMap;

use crate::error::{ExchangeError, ExchangeResult};
use crate::wire::{
    ByteReader, ChainTag, REPLY_CASE_AT, REPLY_HEADER_LEN, REPLY_NEXT_AT, REPLY_TAG_AT,
    ReplyFragment, patch_u32,
};

/// Head of one infector's linked reply chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReplyHead {
    pub case: CaseId,
    /// Byte offset of the first fragment in `buf`.
    pub head: u32,
}

#[inline]
fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline]
fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Link all fragments of `buf` into per-case chains, patching tags and
/// follow offsets in place.  Fragments arrive tagged `Single`; after this
/// pass a lone fragment stays `Single` and a chain reads
/// `First (Middle)* Last` in scan order.
pub fn link_replies(buf: &mut [u8]) -> ExchangeResult<Vec<ReplyHead>> {
    let mut heads = Vec::new();
    let mut last_of: FxHashMap<CaseId, usize> = FxHashMap::default();

    let mut at = 0usize;
    while at < buf.len() {
        if buf.len() - at < REPLY_HEADER_LEN {
            return Err(ExchangeError::Truncated { wanted: REPLY_HEADER_LEN, at });
        }
        ChainTag::from_byte(buf[at + REPLY_TAG_AT])?;
        let case = CaseId(read_u32(buf, at + REPLY_CASE_AT));
        let accepted = read_u16(buf, at + REPLY_CASE_AT + 4) as usize;
        let len = REPLY_HEADER_LEN + 2 * accepted;
        if buf.len() - at < len {
            return Err(ExchangeError::Truncated { wanted: len, at });
        }

        match last_of.get(&case) {
            None => heads.push(ReplyHead { case, head: at as u32 }),
            Some(&prev) => {
                patch_u32(buf, prev + REPLY_NEXT_AT, at as u32);
                buf[prev + REPLY_TAG_AT] = match ChainTag::from_byte(buf[prev + REPLY_TAG_AT])? {
                    ChainTag::Single => ChainTag::First as u8,
                    ChainTag::Last => ChainTag::Middle as u8,
                    // Only the most recent fragment of a case is re-linked.
                    other => other as u8,
                };
                buf[at + REPLY_TAG_AT] = ChainTag::Last as u8;
            }
        }
        last_of.insert(case, at);
        at += len;
    }
    Ok(heads)
}

/// Walk one linked chain, decoding every fragment.  The linker only ever
/// points forward, so a non-increasing follow offset means corruption.
pub fn chain(buf: &[u8], head: &ReplyHead) -> ExchangeResult<Vec<ReplyFragment>> {
    let mut out = Vec::new();
    let mut at = head.head;
    loop {
        let mut r = ByteReader::at(buf, at as usize)?;
        let frag = ReplyFragment::decode(&mut r)?;
        let next = frag.next;
        let done = matches!(frag.tag, ChainTag::Single | ChainTag::Last);
        out.push(frag);
        if done {
            return Ok(out);
        }
        if next <= at || next as usize >= buf.len() {
            return Err(ExchangeError::BrokenChain(at));
        }
        at = next;
    }
}
