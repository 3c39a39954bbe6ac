// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity observation.
//!
//! The monitor records raw reachability observations (platform events or a
//! polling probe) and notifies subscribers once per *settled* transition into
//! the reachable state. A transition is settled when no further observation
//! arrives within the settle period, so rapid flapping yields at most one
//! notification.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default quiet period before a transition counts as settled.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);

/// Point-in-time reachability.
pub trait Reachability: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// Active reachability check.
pub trait ReachabilityProbe: Send + Sync {
    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Probe that attempts a TCP connect to the remote host.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        TcpProbe {
            addr: addr.into(),
            timeout,
        }
    }
}

impl ReachabilityProbe for TcpProbe {
    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            matches!(
                tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await,
                Ok(Ok(_))
            )
        })
    }
}

type Callback = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    state: watch::Sender<bool>,
    subscribers: Mutex<HashMap<u64, Callback>>,
    next_subscriber: AtomicU64,
    cancel: CancellationToken,
}

impl Inner {
    fn notify(&self) {
        let callbacks: Vec<Callback> = match self.subscribers.lock() {
            Ok(subs) => subs.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };
        for callback in callbacks {
            callback();
        }
    }
}

/// Observes reachability and fans out settled reconnects.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl ConnectivityMonitor {
    /// Creates a monitor and spawns its debounce task.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(initially_reachable: bool, settle: Duration) -> Self {
        let (state, rx) = watch::channel(initially_reachable);
        let inner = Arc::new(Inner {
            state,
            subscribers: Mutex::new(HashMap::new()),
            next_subscriber: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        });
        tokio::spawn(debounce(
            Arc::downgrade(&inner),
            rx,
            initially_reachable,
            settle,
            inner.cancel.clone(),
        ));
        ConnectivityMonitor { inner }
    }

    /// Latest raw observation.
    pub fn is_reachable(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Records an observation. Repeating the current value is a no-op.
    pub fn report(&self, reachable: bool) {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == reachable {
                false
            } else {
                *current = reachable;
                true
            }
        });
        if changed {
            debug!(reachable, "reachability changed");
        }
    }

    /// Registers `callback` to run once per settled transition into the
    /// reachable state.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        match self.inner.subscribers.lock() {
            Ok(mut subs) => subs.insert(id, Arc::new(callback)),
            Err(poisoned) => poisoned.into_inner().insert(id, Arc::new(callback)),
        };
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        match self.inner.subscribers.lock() {
            Ok(subs) => subs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Polls `probe` every `interval` and reports each result.
    pub fn spawn_probe<P>(&self, probe: P, interval: Duration)
    where
        P: ReachabilityProbe + 'static,
    {
        let monitor = Arc::downgrade(&self.inner);
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            loop {
                let reachable = tokio::select! {
                    _ = cancel.cancelled() => return,
                    reachable = probe.probe() => reachable,
                };
                match monitor.upgrade() {
                    Some(inner) => ConnectivityMonitor { inner }.report(reachable),
                    None => return,
                }
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });
    }

    /// Stops the debounce and probe tasks. Subscribers receive no further
    /// notifications.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

impl Reachability for ConnectivityMonitor {
    fn is_reachable(&self) -> bool {
        ConnectivityMonitor::is_reachable(self)
    }
}

/// Handle returned by [`ConnectivityMonitor::subscribe`].
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Stops delivery to this subscriber. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            match inner.subscribers.lock() {
                Ok(mut subs) => subs.remove(&self.id),
                Err(poisoned) => poisoned.into_inner().remove(&self.id),
            };
        }
    }
}

async fn debounce(
    inner: Weak<Inner>,
    mut rx: watch::Receiver<bool>,
    mut settled: bool,
    settle: Duration,
    cancel: CancellationToken,
) {
    // Reports made before this task first runs stay marked as changed.
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            changed = rx.changed() => if changed.is_err() { return },
        }

        // Restart the quiet period on every further observation.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = rx.changed() => if changed.is_err() { return },
                _ = tokio::time::sleep(settle) => break,
            }
        }

        let current = *rx.borrow_and_update();
        if current && !settled {
            info!("connectivity restored");
            match inner.upgrade() {
                Some(inner) => inner.notify(),
                None => return,
            }
        } else if !current && settled {
            info!("connectivity lost");
        }
        settled = current;
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
