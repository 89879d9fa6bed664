//! Audio source seam.
//!
//! Speech capture and speech-to-text live outside this crate; the hub only
//! consumes finished transcripts. The contract mirrors the hardware:
//! `listen` waits at most `timeout` for an utterance and returns `None` on
//! silence or capture failure; errors never propagate into the main loop.
//! Transcripts are expected lowercased and trimmed.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Source of voice transcripts for the command loop.
#[async_trait]
pub trait AudioSource: Send {
    /// Wait up to `timeout` for the next transcript.
    ///
    /// `None` means silence, a capture error, or source shutdown. The
    /// caller treats all three the same.
    async fn listen(&mut self, timeout: Duration) -> Option<String>;
}

/// Channel-fed audio source: whatever owns the microphone (or a test)
/// pushes transcripts into the sender half.
pub struct QueueAudioSource {
    rx: mpsc::Receiver<String>,
}

impl QueueAudioSource {
    /// Create a source and the sender that feeds it.
    #[must_use]
    pub fn new(buffer: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait]
impl AudioSource for QueueAudioSource {
    async fn listen(&mut self, timeout: Duration) -> Option<String> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(transcript)) => {
                let cleaned = transcript.trim().to_lowercase();
                (!cleaned.is_empty()).then_some(cleaned)
            }
            // Channel closed or nothing within the window.
            Ok(None) | Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn delivers_cleaned_transcripts() {
        let (tx, mut source) = QueueAudioSource::new(4);
        tx.send("  Hey Iris  ".to_owned()).await.unwrap();
        let transcript = source.listen(Duration::from_millis(100)).await;
        assert_eq!(transcript.as_deref(), Some("hey iris"));
    }

    #[tokio::test]
    async fn times_out_on_silence() {
        let (_tx, mut source) = QueueAudioSource::new(4);
        assert!(source.listen(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn closed_channel_reads_as_silence() {
        let (tx, mut source) = QueueAudioSource::new(4);
        drop(tx);
        assert!(source.listen(Duration::from_millis(20)).await.is_none());
    }
}
