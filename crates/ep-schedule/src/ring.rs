//! `RollingQueue<T>` — fixed-window circular slot array.

use crate::{ScheduleError, ScheduleResult};

/// A circular array of `window` slots, each holding one bucket per worker.
///
/// Slot 0 (relative to the cursor) is the *current* slot, drained this step;
/// an offset of `window - 1` is the furthest future a caller may schedule.
/// Offsets at or beyond the window would alias an earlier slot and are
/// rejected — the window is sized at construction to make that impossible
/// for any legal event (see [`window_len`][crate::window_len]).
pub struct RollingQueue<T> {
    /// `slots[slot][worker]` — flat in slot-major order.
    slots: Vec<Vec<T>>,
    window: usize,
    workers: usize,
    cursor: usize,
    len: usize,
}

impl<T> RollingQueue<T> {
    /// Create a queue of `window` slots with `workers` buckets each.
    ///
    /// # Panics
    /// Panics if `window` or `workers` is zero — both are derived from
    /// validated configuration.
    pub fn new(window: usize, workers: usize) -> Self {
        assert!(window > 0 && workers > 0);
        Self {
            slots: (0..window * workers).map(|_| Vec::new()).collect(),
            window,
            workers,
            cursor: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.window
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn bucket_index(&self, offset: usize, worker: usize) -> usize {
        ((self.cursor + offset) % self.window) * self.workers + worker
    }

    /// Schedule `item` for `offset` steps in the future on `worker`'s bucket.
    ///
    /// `offset` 0 targets the current slot (drained this step).  An offset
    /// reaching into the reused part of the ring is a window violation.
    pub fn push(&mut self, offset: u64, worker: usize, item: T) -> ScheduleResult<()> {
        if offset >= self.window as u64 {
            return Err(ScheduleError::WindowOverflow {
                offset,
                window: self.window,
            });
        }
        debug_assert!(worker < self.workers);
        let idx = self.bucket_index(offset as usize, worker);
        self.slots[idx].push(item);
        self.len += 1;
        Ok(())
    }

    /// Remove and return everything in the current slot, in worker order.
    ///
    /// Worker order makes the drain deterministic regardless of how the
    /// parallel phase interleaved its pushes.
    pub fn drain_current(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        for worker in 0..self.workers {
            let idx = self.bucket_index(0, worker);
            out.append(&mut self.slots[idx]);
        }
        self.len -= out.len();
        out
    }

    /// Move the cursor forward one slot.
    ///
    /// The departing slot must have been drained; anything left in it would
    /// silently time-travel a full window into the future.
    pub fn advance(&mut self) {
        debug_assert!(
            (0..self.workers).all(|w| self.slots[self.bucket_index(0, w)].is_empty()),
            "advancing over an undrained slot"
        );
        self.cursor = (self.cursor + 1) % self.window;
    }
}
