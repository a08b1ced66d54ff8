//! The close signal.
//!
//! A [`CloseSignal`] coordinates server teardown: the accept loop selects
//! on it, and the innermost link of the server-install chain suspends on
//! it, which is what makes post-install work unwind in reverse order.
//!
//! The signal is level-triggered: a waiter arriving after the trigger
//! completes immediately. This is load-bearing for teardown that is
//! requested while installation is still running: installation always
//! runs to completion, and the innermost link then observes the
//! already-triggered signal and returns at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// A cloneable, idempotent close signal.
///
/// # Example
///
/// ```rust
/// use talos_pipeline::shutdown::CloseSignal;
///
/// let close = CloseSignal::new();
/// assert!(!close.is_closed());
///
/// close.trigger();
/// close.trigger(); // idempotent
/// assert!(close.is_closed());
/// ```
#[derive(Debug, Clone)]
pub struct CloseSignal {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl CloseSignal {
    /// Creates a new, untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Triggers the signal, waking every waiter. Idempotent.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine.
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once the signal has been triggered.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Completes when the signal is triggered.
    ///
    /// Completes immediately if the trigger already happened.
    pub async fn recv(&self) {
        // Subscribe before checking the flag: the trigger stores the flag
        // before broadcasting, so one of the two must observe it.
        let mut receiver = self.sender.subscribe();
        if self.triggered.load(Ordering::SeqCst) {
            return;
        }
        let _ = receiver.recv().await;
    }
}

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_trigger_is_idempotent() {
        let close = CloseSignal::new();
        close.trigger();
        close.trigger();
        assert!(close.is_closed());
    }

    #[test]
    fn test_clones_share_state() {
        let a = CloseSignal::new();
        let b = a.clone();
        a.trigger();
        assert!(b.is_closed());
    }

    #[tokio::test]
    async fn test_recv_completes_immediately_when_already_triggered() {
        let close = CloseSignal::new();
        close.trigger();

        tokio::time::timeout(Duration::from_millis(10), close.recv())
            .await
            .expect("recv should complete immediately");
    }

    #[tokio::test]
    async fn test_recv_completes_on_later_trigger() {
        let close = CloseSignal::new();
        let trigger = close.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        tokio::time::timeout(Duration::from_secs(1), close.recv())
            .await
            .expect("recv should complete");
    }

    #[tokio::test]
    async fn test_multiple_waiters_all_wake() {
        let close = CloseSignal::new();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let close = close.clone();
                tokio::spawn(async move { close.recv().await })
            })
            .collect();

        close.trigger();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter should complete")
                .expect("waiter should not panic");
        }
    }
}
