//! Best-effort progress streaming from a running subprocess to an observer.
//!
//! The runner pushes raw stdout chunks into a [`ProgressSink`] as they arrive.
//! Delivery is fire-and-forget: a full or closed channel drops the chunk and
//! the run continues. A slow or broken consumer can never stall or fail the
//! underlying process.

use tokio::sync::mpsc;

/// Default channel capacity for [`ProgressSink::channel`].
pub const DEFAULT_CAPACITY: usize = 64;

/// Handle the process runner emits output chunks into.
///
/// Cheap to clone. A disabled sink ignores all chunks.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<String>>,
}

impl ProgressSink {
    /// Create a sink backed by a bounded channel, returning the receiver
    /// the observer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops everything.
    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    /// Whether anyone is listening.
    pub const fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Emit a chunk of partial output. Never blocks, never fails the caller.
    pub fn emit(&self, chunk: &str) {
        let Some(tx) = &self.tx else { return };
        match tx.try_send(chunk.to_string()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(bytes = chunk.len(), "progress channel full, dropping chunk");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("progress receiver gone, dropping chunk");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunks_arrive_in_emission_order() {
        let (sink, mut rx) = ProgressSink::channel(8);
        sink.emit("one");
        sink.emit("two");
        sink.emit("three");
        assert_eq!(rx.recv().await.as_deref(), Some("one"));
        assert_eq!(rx.recv().await.as_deref(), Some("two"));
        assert_eq!(rx.recv().await.as_deref(), Some("three"));
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (sink, mut rx) = ProgressSink::channel(1);
        sink.emit("kept");
        sink.emit("dropped");
        assert_eq!(rx.recv().await.as_deref(), Some("kept"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_receiver_is_harmless() {
        let (sink, rx) = ProgressSink::channel(1);
        drop(rx);
        sink.emit("into the void");
    }

    #[test]
    fn disabled_sink_ignores_chunks() {
        let sink = ProgressSink::disabled();
        assert!(!sink.is_enabled());
        sink.emit("anything");
    }
}
