//! Coordinate shutdown across many tasks.

use futures::{channel::oneshot, future::Shared, ready, FutureExt};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

/// A one-time broadcast that can be awaited by many tasks.
///
/// Every long-running task (polling loops, sequencers, the gas price monitor) holds a
/// clone and selects on `&mut signal` each iteration. Once the [Signaler] fires (or is
/// dropped), every clone resolves and keeps resolving on subsequent polls.
///
/// # Example
///
/// ```rust
/// use swarm_utils::signal::Signaler;
///
/// # futures::executor::block_on(async {
/// let (signaler, signal) = Signaler::new();
/// let waiter = signal.clone();
/// drop(signal);
///
/// let completion = signaler.signal();
/// waiter.await;
/// completion.await.unwrap();
/// # });
/// ```
#[derive(Clone)]
pub enum Signal {
    /// Resolves once the associated [Signaler] fires.
    Open(Receiver),
    /// Already resolved.
    Closed,
}

impl Future for Signal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut *self {
            Signal::Open(live) => {
                let Some(inner) = live.inner.as_mut() else {
                    return Poll::Ready(());
                };

                // A dropped signaler is treated the same as an explicit signal
                let _ = ready!(Pin::new(inner).poll(cx));
                live.inner = None;
                Poll::Ready(())
            }
            Signal::Closed => Poll::Ready(()),
        }
    }
}

/// An open [Signal] that holds the completion guard until dropped.
#[derive(Clone)]
pub struct Receiver {
    inner: Option<Shared<oneshot::Receiver<()>>>,
    _guard: Arc<Guard>,
}

/// Resolves the completion channel once the last [Signal] clone is dropped.
struct Guard {
    tx: Option<oneshot::Sender<()>>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Fires all [Signal]s created from it.
pub struct Signaler {
    tx: oneshot::Sender<()>,
    completion: oneshot::Receiver<()>,
}

impl Signaler {
    /// Create a new [Signaler] and the first [Signal] associated with it.
    pub fn new() -> (Self, Signal) {
        let (tx, rx) = oneshot::channel();
        let (completion_tx, completion) = oneshot::channel();
        let signal = Signal::Open(Receiver {
            inner: Some(rx.shared()),
            _guard: Arc::new(Guard {
                tx: Some(completion_tx),
            }),
        });
        (Self { tx, completion }, signal)
    }

    /// Resolve all [Signal]s.
    ///
    /// The returned receiver resolves once every [Signal] clone has been dropped, so the
    /// caller must drop its own copies before awaiting it.
    pub fn signal(self) -> oneshot::Receiver<()> {
        let _ = self.tx.send(());
        self.completion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_resolves_all_clones() {
        let (signaler, signal) = Signaler::new();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let signal = signal.clone();
            handles.push(tokio::spawn(async move {
                signal.await;
            }));
        }
        drop(signal);

        let completion = signaler.signal();
        for handle in handles {
            handle.await.unwrap();
        }
        completion.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_signaler_resolves() {
        let (signaler, signal) = Signaler::new();
        drop(signaler);
        signal.await;
    }

    #[tokio::test]
    async fn test_repeated_poll() {
        let (signaler, mut signal) = Signaler::new();
        let _completion = signaler.signal();
        (&mut signal).await;
        (&mut signal).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_waits_for_holders() {
        let (signaler, signal) = Signaler::new();
        let held = signal.clone();
        drop(signal);
        let mut completion = signaler.signal();

        // Still held by a task that has not exited
        let pending = tokio::time::timeout(Duration::from_secs(1), &mut completion).await;
        assert!(pending.is_err());

        drop(held);
        completion.await.unwrap();
    }

    #[tokio::test]
    async fn test_select_loop() {
        let (signaler, mut signal) = Signaler::new();
        let handle = tokio::spawn(async move {
            let mut ticks = 0u32;
            loop {
                tokio::select! {
                    _ = &mut signal => break,
                    _ = tokio::time::sleep(Duration::from_millis(1)) => ticks += 1,
                }
            }
            ticks
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let completion = signaler.signal();
        handle.await.unwrap();
        completion.await.unwrap();
    }
}
