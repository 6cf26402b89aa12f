use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use mailring_common::{Signal, internal};
use tokio::sync::broadcast;

/// Shared shutdown state
///
/// The flag is set before the signal is broadcast, so a task that subscribes
/// and then checks the flag can never miss a shutdown.
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle {
    signal: broadcast::Sender<Signal>,
    stopped: Arc<AtomicBool>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (signal, _) = broadcast::channel(4);

        Self {
            signal,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signal.subscribe()
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Returns `false` if shutdown had already been requested
    pub(crate) fn shutdown(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }

        if self.signal.send(Signal::Shutdown).is_err() {
            internal!("No running tasks to notify of shutdown");
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_once() {
        let lifecycle = Lifecycle::new();
        let mut receiver = lifecycle.subscribe();

        assert!(!lifecycle.is_stopped());
        assert!(lifecycle.shutdown());
        assert!(!lifecycle.shutdown());
        assert!(lifecycle.is_stopped());

        assert_eq!(receiver.recv().await.ok(), Some(Signal::Shutdown));
        assert!(receiver.try_recv().is_err());
    }
}
