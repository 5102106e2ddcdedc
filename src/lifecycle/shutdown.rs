//! Shutdown coordination for the relay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Coordinator for graceful shutdown.
///
/// Every in-flight delivery holds a receiver; the receiver count is the
/// number of deliveries still running.
#[derive(Debug)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Only the first call broadcasts.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    /// Subscribe for work that must not start once shutdown has begun.
    ///
    /// Returns `None` if shutdown was already triggered. A receiver returned
    /// here is guaranteed to observe the signal: it is created before the
    /// flag is checked, and `trigger` sets the flag before broadcasting.
    pub fn listen(&self) -> Option<broadcast::Receiver<()>> {
        let rx = self.tx.subscribe();
        if self.is_triggered() {
            None
        } else {
            Some(rx)
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait until every subscriber has finished or `deadline` passes.
    /// Returns `true` if all subscribers finished.
    pub async fn drain(&self, deadline: Duration) -> bool {
        let wait = async {
            while self.receiver_count() > 0 {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        };
        match tokio::time::timeout(deadline, wait).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = self.receiver_count(),
                    "Shutdown deadline reached with deliveries still running"
                );
                false
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
