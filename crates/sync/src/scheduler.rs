// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Drain scheduling.
//!
//! The [`Scheduler`] triggers drains from two sources: a periodic job
//! registered with a [`BackgroundExecutor`], and settled reconnects reported
//! by the [`ConnectivityMonitor`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::connectivity::{ConnectivityMonitor, Reachability, Subscription};
use crate::engine::SyncEngine;
use crate::remote::{RemoteClient, WebSocketRemote};

/// Result of one background job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    /// Run again after a backoff delay.
    Retry,
}

/// Future of one job run.
pub type JobFuture = Pin<Box<dyn Future<Output = JobOutcome> + Send>>;

/// A repeatable background job.
pub type Job = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Constraints for a periodic job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicRequest {
    pub interval: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    /// Skip runs while the network is unreachable.
    pub requires_network: bool,
}

/// Platform facility that runs jobs periodically, only when network-capable,
/// with exponential backoff after a failed run.
pub trait BackgroundExecutor: Send + Sync {
    /// Registers `job`. Cancelling the returned token stops future runs; a
    /// run already in progress completes.
    fn schedule_periodic(&self, request: PeriodicRequest, job: Job) -> CancellationToken;
}

/// [`BackgroundExecutor`] on Tokio timers.
pub struct TokioExecutor {
    reachability: Arc<dyn Reachability>,
}

impl TokioExecutor {
    pub fn new(reachability: Arc<dyn Reachability>) -> Self {
        TokioExecutor { reachability }
    }
}

impl BackgroundExecutor for TokioExecutor {
    fn schedule_periodic(&self, request: PeriodicRequest, job: Job) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let reachability = Arc::clone(&self.reachability);

        tokio::spawn(async move {
            let mut delay = request.interval;
            let mut backoff: Option<Duration> = None;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                if request.requires_network && !reachability.is_reachable() {
                    debug!("network unavailable, skipping periodic run");
                    delay = request.interval;
                    continue;
                }

                delay = match job().await {
                    JobOutcome::Success => {
                        backoff = None;
                        request.interval
                    }
                    JobOutcome::Retry => {
                        let next = match backoff {
                            None => request.backoff_initial,
                            Some(prev) => std::cmp::min(prev.saturating_mul(2), request.backoff_max),
                        };
                        backoff = Some(next);
                        debug!(delay_secs = next.as_secs(), "periodic run failed, backing off");
                        next
                    }
                };
            }
        });

        cancel
    }
}

/// Timing for the periodic drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            interval: Duration::from_secs(15 * 60),
            backoff_initial: Duration::from_secs(30),
            backoff_max: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Idle,
    /// A drain has been requested.
    Scheduled,
    Running,
    /// The last drain reported failures; the next periodic run is delayed.
    Backoff,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerState::Stopped => "stopped",
            SchedulerState::Idle => "idle",
            SchedulerState::Scheduled => "scheduled",
            SchedulerState::Running => "running",
            SchedulerState::Backoff => "backoff",
        };
        write!(f, "{}", s)
    }
}

struct Registration {
    periodic: CancellationToken,
    subscription: Subscription,
}

struct SchedulerInner<R: RemoteClient> {
    engine: Arc<SyncEngine<R>>,
    monitor: ConnectivityMonitor,
    executor: Arc<dyn BackgroundExecutor>,
    config: SchedulerConfig,
    state: watch::Sender<SchedulerState>,
    /// Set between a trigger and the start of its drain.
    pending: AtomicBool,
    registration: Mutex<Option<Registration>>,
}

impl<R: RemoteClient + 'static> SchedulerInner<R> {
    fn registration(&self) -> MutexGuard<'_, Option<Registration>> {
        match self.registration.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Moves to `to` unless stopped.
    fn transition(&self, to: SchedulerState) {
        self.state.send_if_modified(|current| {
            if *current == SchedulerState::Stopped || *current == to {
                false
            } else {
                *current = to;
                true
            }
        });
    }

    async fn run_drain(&self) -> JobOutcome {
        self.pending.store(false, Ordering::Release);
        if *self.state.borrow() == SchedulerState::Stopped {
            debug!("stopped before drain started");
            return JobOutcome::Success;
        }
        self.transition(SchedulerState::Running);
        let outcome = match self.engine.try_drain().await {
            None => {
                debug!("drain already in flight");
                self.transition(SchedulerState::Idle);
                return JobOutcome::Success;
            }
            Some(Ok(report)) if report.is_clean() => JobOutcome::Success,
            Some(Ok(_)) => JobOutcome::Retry,
            Some(Err(e)) => {
                error!(error = %e, "drain failed");
                JobOutcome::Retry
            }
        };
        self.transition(match outcome {
            JobOutcome::Success => SchedulerState::Idle,
            JobOutcome::Retry => SchedulerState::Backoff,
        });
        outcome
    }

    fn trigger_now(self: &Arc<Self>) -> bool {
        if *self.state.borrow() == SchedulerState::Stopped {
            return false;
        }
        if self.engine.is_draining() || self.pending.swap(true, Ordering::AcqRel) {
            debug!("drain already requested");
            return false;
        }
        self.transition(SchedulerState::Scheduled);
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.run_drain().await;
        });
        true
    }
}

/// Coordinates periodic and reconnect-triggered drains.
pub struct Scheduler<R: RemoteClient = WebSocketRemote> {
    inner: Arc<SchedulerInner<R>>,
}

impl<R: RemoteClient + 'static> Scheduler<R> {
    pub fn new(
        engine: Arc<SyncEngine<R>>,
        monitor: ConnectivityMonitor,
        executor: Arc<dyn BackgroundExecutor>,
        config: SchedulerConfig,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Stopped);
        Scheduler {
            inner: Arc::new(SchedulerInner {
                engine,
                monitor,
                executor,
                config,
                state,
                pending: AtomicBool::new(false),
                registration: Mutex::new(None),
            }),
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine<R>> {
        &self.inner.engine
    }

    pub fn state(&self) -> SchedulerState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.inner.state.subscribe()
    }

    pub fn is_started(&self) -> bool {
        self.inner.registration().is_some()
    }

    /// Registers the periodic drain and the reconnect trigger. No-op when
    /// already started.
    pub fn start(&self) {
        let mut registration = self.inner.registration();
        if registration.is_some() {
            return;
        }
        self.inner.state.send_replace(SchedulerState::Idle);

        let weak: Weak<SchedulerInner<R>> = Arc::downgrade(&self.inner);
        let job: Job = Arc::new(move || -> JobFuture {
            let weak = weak.clone();
            Box::pin(async move {
                match weak.upgrade() {
                    Some(inner) => {
                        inner.transition(SchedulerState::Scheduled);
                        inner.run_drain().await
                    }
                    None => JobOutcome::Success,
                }
            })
        });
        let periodic = self.inner.executor.schedule_periodic(
            PeriodicRequest {
                interval: self.inner.config.interval,
                backoff_initial: self.inner.config.backoff_initial,
                backoff_max: self.inner.config.backoff_max,
                requires_network: true,
            },
            job,
        );

        let weak = Arc::downgrade(&self.inner);
        let subscription = self.inner.monitor.subscribe(move || {
            if let Some(inner) = weak.upgrade() {
                debug!("reconnected, triggering drain");
                inner.trigger_now();
            }
        });

        *registration = Some(Registration {
            periodic,
            subscription,
        });
        info!(interval_secs = self.inner.config.interval.as_secs(), "scheduler started");
    }

    /// Requests an immediate drain. Returns false when stopped or when a
    /// drain is already in flight or requested.
    pub fn trigger_now(&self) -> bool {
        self.inner.trigger_now()
    }

    /// Cancels future drains. A drain in progress runs to completion.
    pub fn stop(&self) {
        let registration = self.inner.registration().take();
        if let Some(registration) = registration {
            registration.periodic.cancel();
            registration.subscription.unsubscribe();
            info!("scheduler stopped");
        }
        self.inner.state.send_replace(SchedulerState::Stopped);
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
