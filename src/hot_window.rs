// src/hot_window.rs
//
// The hot window — a bounded, in-memory FIFO holding at most
// `MaxCacheCount` live messages. Backed by `crossbeam_channel::bounded`,
// which already provides exactly the two operations the engine needs:
// a blocking dequeue for consumers (`get`) and a non-blocking, capacity-
// checked enqueue for producers (`put`) that never grows the window past
// its configured size.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

pub(crate) struct HotWindow<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> HotWindow<T> {
    pub(crate) fn new(capacity: u64) -> Self {
        let (tx, rx) = bounded(capacity as usize);
        Self { tx, rx }
    }

    /// Push onto the back of the window. Returns `false` without blocking
    /// if the window is already at capacity — the caller is expected to
    /// leave the message on disk in that case.
    pub(crate) fn try_push(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                unreachable!("HotWindow keeps its own Sender/Receiver alive")
            }
        }
    }

    /// Block until a message is available, then pop it from the front.
    pub(crate) fn pop_blocking(&self) -> T {
        self.rx
            .recv()
            .expect("HotWindow keeps its own Sender/Receiver alive")
    }
}
