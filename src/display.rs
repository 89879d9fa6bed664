//! Display seam and local backends.
//!
//! The hub builds frames in [`crate::screens`] and pushes them through the
//! [`Display`] trait. The physical renderers (Pi OLED over SSH/serial, HTTP)
//! live outside this crate; what ships here is a terminal backend for
//! development and a recording backend for tests. All calls are
//! fire-and-forget: a `false` return is logged by the caller but never
//! changes state-machine behavior, and only the orchestrator ever holds a
//! display handle.

use crate::screens::Frame;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Rendering backend contract for the 4-line display.
#[async_trait]
pub trait Display: Send {
    /// Render a frame. Returns whether the backend accepted it.
    async fn show_lines(&mut self, frame: &Frame) -> bool;

    /// Blank the display.
    async fn clear(&mut self) -> bool;
}

/// Terminal backend: draws each frame as a boxed 4-line panel on stdout.
/// The development stand-in for the glasses OLED.
pub struct ConsoleDisplay;

#[async_trait]
impl Display for ConsoleDisplay {
    async fn show_lines(&mut self, frame: &Frame) -> bool {
        let width = crate::screens::CHARS_PER_LINE;
        println!("┌{}┐", "─".repeat(width + 2));
        for line in frame {
            println!("│ {line:<width$} │");
        }
        println!("└{}┘", "─".repeat(width + 2));
        true
    }

    async fn clear(&mut self) -> bool {
        debug!("display cleared");
        true
    }
}

/// Recording backend for tests. Clones share the same buffers, so a test
/// can keep one handle while the orchestrator owns the other.
#[derive(Clone, Default)]
pub struct RecordingDisplay {
    frames: Arc<Mutex<Vec<Frame>>>,
    clears: Arc<AtomicUsize>,
}

impl RecordingDisplay {
    /// All frames rendered so far, in order.
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Most recently rendered frame.
    #[must_use]
    pub fn last(&self) -> Option<Frame> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).last().cloned()
    }

    /// Number of clear calls.
    #[must_use]
    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    /// Whether any rendered frame contains `needle` on any line.
    #[must_use]
    pub fn saw(&self, needle: &str) -> bool {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|frame| frame.iter().any(|line| line.contains(needle)))
    }
}

#[async_trait]
impl Display for RecordingDisplay {
    async fn show_lines(&mut self, frame: &Frame) -> bool {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame.clone());
        true
    }

    async fn clear(&mut self) -> bool {
        self.clears.fetch_add(1, Ordering::SeqCst);
        true
    }
}
