//! Bounded interrupt queue between the receiver and the main loop.
//!
//! The producer is a hardware-facing HTTP listener that must stay
//! responsive, so the back-pressure policy is drop-newest: `push` never
//! blocks, and an interrupt that arrives while the queue is full is dropped
//! and logged. The single consumer is the orchestrator loop, which fully
//! drains pending interrupts before processing a new voice transcript.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, warn};

/// Kinds of out-of-band events the hub can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    /// Motion sensor fired.
    Motion,
    /// A peripheral reported itself offline.
    DeviceOffline,
    /// A peripheral reported itself online.
    DeviceOnline,
    /// A peripheral reported an internal fault.
    SystemError,
}

impl std::fmt::Display for InterruptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InterruptKind::Motion => "motion",
            InterruptKind::DeviceOffline => "device_offline",
            InterruptKind::DeviceOnline => "device_online",
            InterruptKind::SystemError => "system_error",
        };
        f.write_str(name)
    }
}

/// An asynchronous hardware event. Immutable once queued.
#[derive(Debug, Clone)]
pub struct Interrupt {
    /// What happened.
    pub kind: InterruptKind,
    /// Opaque payload from the sender (JSON body fields, flattened).
    pub payload: HashMap<String, String>,
    /// When the receiver accepted the event.
    pub received_at: Instant,
    /// Socket address of the sender, when known.
    pub source: Option<SocketAddr>,
}

impl Interrupt {
    /// Build an interrupt stamped with the current time.
    #[must_use]
    pub fn new(kind: InterruptKind, payload: HashMap<String, String>, source: Option<SocketAddr>) -> Self {
        Self {
            kind,
            payload,
            received_at: Instant::now(),
            source,
        }
    }
}

/// Bounded FIFO queue of interrupts. Clone handles freely; both ends are
/// thread-safe and non-blocking.
#[derive(Clone)]
pub struct InterruptChannel {
    tx: crossbeam_channel::Sender<Interrupt>,
    rx: crossbeam_channel::Receiver<Interrupt>,
}

impl InterruptChannel {
    /// Create a channel with the given fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    /// Enqueue an interrupt. Returns `false` (dropping the interrupt, with a
    /// log line) when the queue is full; never blocks the producer.
    pub fn push(&self, interrupt: Interrupt) -> bool {
        let kind = interrupt.kind;
        match self.tx.try_send(interrupt) {
            Ok(()) => {
                debug!("queued {kind} interrupt");
                true
            }
            Err(crossbeam_channel::TrySendError::Full(_)) => {
                warn!("interrupt queue full, dropping {kind}");
                false
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                warn!("interrupt queue closed, dropping {kind}");
                false
            }
        }
    }

    /// Dequeue the next interrupt, if any. Non-blocking.
    #[must_use]
    pub fn poll(&self) -> Option<Interrupt> {
        self.rx.try_recv().ok()
    }

    /// Empty the queue, returning how many interrupts were discarded.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        while self.rx.try_recv().is_ok() {
            count += 1;
        }
        if count > 0 {
            debug!("drained {count} pending interrupts");
        }
        count
    }

    /// Current queue depth, for the health endpoint.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn motion() -> Interrupt {
        Interrupt::new(InterruptKind::Motion, HashMap::new(), None)
    }

    #[test]
    fn fifo_order() {
        let channel = InterruptChannel::new(10);
        channel.push(Interrupt::new(InterruptKind::Motion, HashMap::new(), None));
        channel.push(Interrupt::new(InterruptKind::DeviceOffline, HashMap::new(), None));
        assert_eq!(channel.poll().unwrap().kind, InterruptKind::Motion);
        assert_eq!(channel.poll().unwrap().kind, InterruptKind::DeviceOffline);
        assert!(channel.poll().is_none());
    }

    #[test]
    fn push_never_blocks_at_capacity() {
        let channel = InterruptChannel::new(100);
        for _ in 0..100 {
            assert!(channel.push(motion()));
        }
        // The 101st push is rejected and the queue stays at capacity.
        assert!(!channel.push(motion()));
        assert_eq!(channel.len(), 100);
        assert_eq!(channel.drain(), 100);
        assert!(channel.is_empty());
    }

    #[test]
    fn drain_on_empty_is_zero() {
        let channel = InterruptChannel::new(4);
        assert_eq!(channel.drain(), 0);
    }

    #[test]
    fn push_succeeds_again_after_poll() {
        let channel = InterruptChannel::new(1);
        assert!(channel.push(motion()));
        assert!(!channel.push(motion()));
        assert!(channel.poll().is_some());
        assert!(channel.push(motion()));
    }
}
