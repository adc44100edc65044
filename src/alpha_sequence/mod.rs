// src/alpha_sequence/mod.rs
//
// Monotone alphabetic ID generator.
//
// Represents the sequence as a fixed-width byte buffer and mutates it in
// place rather than formatting integers to letters on every call. The
// buffer is the least-significant-digit-on-the-right base-26 counter
// described in spec.md: 'aaa', 'aab', 'aac', ..., 'aaz', 'aba', ...,
// 'zzz', 'aaa' (wraps, does not error).
//
// Every operation takes the internal mutex for its full duration, so two
// threads racing `next()` always observe distinct, strictly increasing
// values — this is what lets `Engine::put` mint IDs without its own lock
// around the generator.

use std::sync::Mutex;

use crate::error::PChannelError;

struct Inner {
    buf: Vec<u8>,
    caps: bool,
}

impl Inner {
    fn base(&self) -> u8 {
        if self.caps {
            b'A'
        } else {
            b'a'
        }
    }

    fn top(&self) -> u8 {
        if self.caps {
            b'Z'
        } else {
            b'z'
        }
    }

    fn reset(&mut self) {
        let base = self.base();
        self.buf.iter_mut().for_each(|b| *b = base);
    }

    fn to_string(&self) -> String {
        // The buffer is always ASCII letters, so this is lossless.
        String::from_utf8(self.buf.clone()).expect("alpha buffer is always ASCII")
    }

    // Increment scans right-to-left. The first position not at the top
    // letter is bumped and the scan stops; positions scanned before it
    // roll back to the base letter. Overflow past 'zz...z' wraps silently
    // to 'aa...a' since the final position rolls with nothing left to bump.
    fn increment(&mut self) {
        let top = self.top();
        let base = self.base();
        for i in (0..self.buf.len()).rev() {
            if self.buf[i] < top {
                self.buf[i] += 1;
                return;
            }
            self.buf[i] = base;
        }
    }

    // Symmetric decrement. Note: spec.md §9 flags the source's decrement
    // guard (`> 'a' || (caps && < 'A')`) as buggy — the second clause is
    // unreachable for valid state. This uses the straightforward symmetric
    // condition instead: roll when the position already holds the base
    // letter.
    fn decrement(&mut self) {
        let top = self.top();
        let base = self.base();
        for i in (0..self.buf.len()).rev() {
            if self.buf[i] > base {
                self.buf[i] -= 1;
                return;
            }
            self.buf[i] = top;
        }
    }
}

/// Thread-safe monotone generator of fixed-width alphabetic IDs.
pub struct AlphaSequence {
    inner: Mutex<Inner>,
}

impl AlphaSequence {
    /// Create a generator of width `len`, seeded at `"aa...a"` (or
    /// `"AA...A"` when `caps`). Fails only if `len == 0`.
    pub fn new(len: usize, caps: bool) -> Result<Self, PChannelError> {
        if len == 0 {
            return Err(PChannelError::Config(
                "alpha sequence length must be > 0".to_string(),
            ));
        }
        let base = if caps { b'A' } else { b'a' };
        Ok(Self {
            inner: Mutex::new(Inner {
                buf: vec![base; len],
                caps,
            }),
        })
    }

    /// Reset to `"aa...a"` / `"AA...A"`.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.reset();
    }

    /// Reset, then advance `k - 1` times. `k` is 1-based: `set(1)` leaves
    /// the sequence at its reset value.
    pub fn set(&self, k: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.reset();
        for _ in 1..k {
            inner.increment();
        }
    }

    /// Replace the current value verbatim. No validation of alphabet or
    /// length — callers (recovery) are responsible for passing a value
    /// that matches this generator's width.
    pub fn set_string(&self, s: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.buf = s.as_bytes().to_vec();
    }

    /// Return the current value, then advance.
    pub fn next(&self) -> String {
        let mut inner = self.inner.lock().unwrap();
        let val = inner.to_string();
        inner.increment();
        val
    }

    /// Return the current value, then retreat. Calling `prev()` on the
    /// initial state returns the initial value and leaves the generator
    /// at `"zz...z"` — preserved from the source on purpose (see
    /// DESIGN.md).
    pub fn prev(&self) -> String {
        let mut inner = self.inner.lock().unwrap();
        let val = inner.to_string();
        inner.decrement();
        val
    }

    /// Read the current value without mutating it.
    pub fn get(&self) -> String {
        let inner = self.inner.lock().unwrap();
        inner.to_string()
    }
}
