// crates/deltakit-diff/src/lookback.rs

//! Bounded lookback buffer for the correcting algorithm (Section 5).
//!
//! An insertion-ordered deque of *provisional* commands that have not been
//! committed to the output stream. The head is committed when displaced by a
//! push against a full buffer; the tail can be inspected, trimmed, or popped
//! by tail correction when a later match extends backward into the encoded
//! prefix. Entries cover disjoint, contiguous V-intervals in order.

use deltakit_core::Command;
use std::collections::VecDeque;

/// A provisional command covering `[v_start, v_end)` of V.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookbackEntry {
    /// First V offset this entry produces.
    pub v_start: usize,
    /// One past the last V offset this entry produces.
    pub v_end: usize,
    /// The provisional command.
    pub cmd: Command,
    /// Placeholder entries are dropped instead of committed.
    pub dummy: bool,
}

impl LookbackEntry {
    /// A live (non-dummy) entry.
    #[must_use]
    pub const fn new(v_start: usize, v_end: usize, cmd: Command) -> Self {
        Self {
            v_start,
            v_end,
            cmd,
            dummy: false,
        }
    }
}

/// Bounded FIFO with an editable tail. Holds at most `cap` entries after
/// every operation.
#[derive(Debug)]
pub struct LookbackBuffer {
    entries: VecDeque<LookbackEntry>,
    cap: usize,
}

impl LookbackBuffer {
    /// Create a buffer holding at most `cap` entries (`cap >= 1`).
    ///
    /// # Panics
    /// Panics if `cap` is zero.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        assert!(cap >= 1, "lookback buffer capacity must be >= 1");
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Entries currently buffered.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry, returning the displaced head when the buffer was
    /// full. The caller commits a displaced non-dummy entry to the output.
    pub fn push_back(&mut self, entry: LookbackEntry) -> Option<LookbackEntry> {
        let displaced = if self.entries.len() >= self.cap {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        displaced
    }

    /// Remove and return the oldest entry.
    pub fn pop_front(&mut self) -> Option<LookbackEntry> {
        self.entries.pop_front()
    }

    /// Remove and return the newest entry.
    pub fn pop_back(&mut self) -> Option<LookbackEntry> {
        self.entries.pop_back()
    }

    /// Peek the newest entry.
    #[must_use]
    pub fn back(&self) -> Option<&LookbackEntry> {
        self.entries.back()
    }

    /// Edit the newest entry in place (tail trimming).
    pub fn back_mut(&mut self) -> Option<&mut LookbackEntry> {
        self.entries.back_mut()
    }

    /// Drain every entry oldest-first (the final flush).
    pub fn drain(&mut self) -> impl Iterator<Item = LookbackEntry> + '_ {
        self.entries.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(v_start: usize, v_end: usize) -> LookbackEntry {
        LookbackEntry::new(
            v_start,
            v_end,
            Command::Add {
                data: vec![0u8; v_end - v_start],
            },
        )
    }

    #[test]
    fn push_under_capacity_displaces_nothing() {
        let mut buf = LookbackBuffer::new(4);
        for i in 0..4 {
            assert!(buf.push_back(add(i, i + 1)).is_none());
        }
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn push_at_capacity_displaces_head() {
        let mut buf = LookbackBuffer::new(2);
        assert!(buf.push_back(add(0, 1)).is_none());
        assert!(buf.push_back(add(1, 2)).is_none());
        let displaced = buf.push_back(add(2, 3)).unwrap();
        assert_eq!(displaced.v_start, 0);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut buf = LookbackBuffer::new(8);
        for i in 0..5 {
            let _ = buf.push_back(add(i, i + 1));
        }
        let starts: Vec<usize> = buf.drain().map(|e| e.v_start).collect();
        assert_eq!(starts, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn tail_editing() {
        let mut buf = LookbackBuffer::new(4);
        let _ = buf.push_back(add(0, 10));
        if let Some(tail) = buf.back_mut() {
            tail.v_end = 6;
            if let Command::Add { data } = &mut tail.cmd {
                data.truncate(6);
            }
        }
        let tail = buf.pop_back().unwrap();
        assert_eq!(tail.v_end, 6);
        assert_eq!(tail.cmd.output_len(), 6);
        assert!(buf.is_empty());
    }

    #[test]
    fn capacity_one_always_displaces() {
        let mut buf = LookbackBuffer::new(1);
        assert!(buf.push_back(add(0, 1)).is_none());
        for i in 1..5 {
            let displaced = buf.push_back(add(i, i + 1)).unwrap();
            assert_eq!(displaced.v_start, i - 1);
        }
    }
}
