// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Generators for ids and sequence numbers that wrap around inside a fixed range.

use std::sync::atomic::{AtomicU32, Ordering};

/// The last sequence number a secure channel may use before wrapping back to 1. Part 6 demands
/// the wrap happens somewhere below `u32::MAX - 1024`.
pub const LAST_CHANNEL_SEQUENCE_NUMBER: u32 = u32::MAX - 1024;

/// Issues numbers from `first` to `last` inclusive, then starts again at `first`.
#[derive(Debug, Clone, Serialize)]
pub struct Handle {
    next: u32,
    first: u32,
    last: u32,
}

impl Handle {
    /// Creates a handle factory that starts with the supplied number and wraps at `u32::MAX`
    pub fn new(first: u32) -> Handle {
        Self::with_range(first, u32::MAX)
    }

    /// Creates a handle factory over an explicit range. `last` below `first` is treated as
    /// `first`, i.e. the factory hands out the same number every time.
    pub fn with_range(first: u32, last: u32) -> Handle {
        Handle {
            next: first,
            first,
            last: last.max(first),
        }
    }

    /// A factory for the sequence numbers of chunks sent over a secure channel
    pub fn channel_sequence() -> Handle {
        Self::with_range(1, LAST_CHANNEL_SEQUENCE_NUMBER)
    }

    pub fn next(&mut self) -> u32 {
        let next = self.next;
        self.next = if next >= self.last {
            self.first
        } else {
            next + 1
        };
        next
    }

    /// The number returned by the next call to `next()`
    pub fn peek(&self) -> u32 {
        self.next
    }

    pub fn set_next(&mut self, next: u32) {
        self.next = next.clamp(self.first, self.last);
    }

    /// Resets the handle to its initial state
    pub fn reset(&mut self) {
        self.next = self.first;
    }

    /// Returns the number that follows `value` in this handle's range
    pub fn successor(&self, value: u32) -> u32 {
        if value >= self.last {
            self.first
        } else {
            value + 1
        }
    }
}

/// A handle factory that can be shared between threads without a lock
#[derive(Debug)]
pub struct AtomicHandle {
    next: AtomicU32,
    first: u32,
    last: u32,
}

impl AtomicHandle {
    pub fn new(first: u32) -> Self {
        Self::with_range(first, u32::MAX)
    }

    pub fn with_range(first: u32, last: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
            first,
            last: last.max(first),
        }
    }

    pub fn next(&self) -> u32 {
        let (first, last) = (self.first, self.last);
        // The closure never returns None so the update cannot fail
        match self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(if v >= last { first } else { v + 1 })
            }) {
            Ok(v) | Err(v) => v,
        }
    }

    pub fn set_next(&self, next: u32) {
        self.next
            .store(next.clamp(self.first, self.last), Ordering::Release);
    }

    /// Resets the handle to its initial state
    pub fn reset(&self) {
        self.set_next(self.first);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_increment() {
        let mut h = Handle::new(0);
        assert_eq!(h.next(), 0);
        assert_eq!(h.next(), 1);
        assert_eq!(h.next(), 2);
        let mut h = Handle::new(100);
        assert_eq!(h.next(), 100);
        assert_eq!(h.peek(), 101);
        assert_eq!(h.next(), 101);
    }

    #[test]
    fn handle_wrap() {
        let mut h = Handle::new(u32::MAX - 2);
        assert_eq!(h.next(), u32::MAX - 2);
        assert_eq!(h.next(), u32::MAX - 1);
        assert_eq!(h.next(), u32::MAX);
        assert_eq!(h.next(), u32::MAX - 2);
    }

    #[test]
    fn channel_sequence_wraps_to_one() {
        let mut h = Handle::channel_sequence();
        assert_eq!(h.next(), 1);
        h.set_next(LAST_CHANNEL_SEQUENCE_NUMBER);
        assert_eq!(h.next(), 4294966271);
        assert_eq!(h.next(), 1);
        assert_eq!(h.successor(LAST_CHANNEL_SEQUENCE_NUMBER), 1);
        assert_eq!(h.successor(7), 8);
    }

    #[test]
    fn atomic_handle_wrap() {
        let h = AtomicHandle::with_range(1, 3);
        assert_eq!(h.next(), 1);
        assert_eq!(h.next(), 2);
        assert_eq!(h.next(), 3);
        assert_eq!(h.next(), 1);
        h.set_next(3);
        assert_eq!(h.next(), 3);
        h.reset();
        assert_eq!(h.next(), 1);
    }

    #[test]
    fn atomic_handle_is_unique_across_threads() {
        use std::{collections::HashSet, sync::Arc, thread};

        let h = Arc::new(AtomicHandle::new(1));
        let threads = (0..4)
            .map(|_| {
                let h = h.clone();
                thread::spawn(move || (0..1000).map(|_| h.next()).collect::<Vec<_>>())
            })
            .collect::<Vec<_>>();
        let ids = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), 4000);
    }
}
