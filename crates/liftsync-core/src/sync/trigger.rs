//! When sync cycles run.
//!
//! Every trigger source (app start, timer, foreground, reconnect, local
//! mutation, manual request) funnels into [`SyncTrigger::fire`]. At most one
//! cycle runs at a time; triggers that arrive during a cycle collapse into a
//! single follow-up cycle that starts after the current one finishes.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::engine::SyncEngine;
use super::remote::RemoteBackend;
use super::report::SyncResult;
use crate::db::MutationHook;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    AppStart,
    Periodic,
    Foreground,
    NetworkReconnect,
    Mutation,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new cycle was started.
    Started,
    /// A cycle was already running; one follow-up cycle is scheduled.
    Coalesced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
}

#[derive(Debug, Clone, Copy)]
struct TriggerState {
    phase: SyncPhase,
    rerun: bool,
}

/// One sync cycle, as seen by the trigger policy.
#[async_trait]
pub trait SyncRunner: Send + Sync + 'static {
    async fn run(&self);
}

struct Inner<R> {
    runner: R,
    state: watch::Sender<TriggerState>,
    runs: AtomicU64,
    runtime: Handle,
}

/// Single-flight, coalescing sync trigger. Cheap to clone.
pub struct SyncTrigger<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for SyncTrigger<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: SyncRunner> SyncTrigger<R> {
    /// Create a trigger whose cycles run on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(runner: R) -> Self {
        Self::with_handle(runner, Handle::current())
    }

    pub fn with_handle(runner: R, runtime: Handle) -> Self {
        let (state, _) = watch::channel(TriggerState {
            phase: SyncPhase::Idle,
            rerun: false,
        });
        Self {
            inner: Arc::new(Inner {
                runner,
                state,
                runs: AtomicU64::new(0),
                runtime,
            }),
        }
    }

    pub fn runner(&self) -> &R {
        &self.inner.runner
    }

    /// Request a cycle. Never blocks and never waits for the cycle.
    pub fn fire(&self, reason: TriggerReason) -> TriggerOutcome {
        let mut started = false;
        self.inner.state.send_modify(|state| match state.phase {
            SyncPhase::Idle => {
                state.phase = SyncPhase::Syncing;
                state.rerun = false;
                started = true;
            }
            SyncPhase::Syncing => state.rerun = true,
        });

        if started {
            tracing::debug!("Sync started ({reason:?})");
            let inner = Arc::clone(&self.inner);
            self.inner.runtime.spawn(drive(inner));
            TriggerOutcome::Started
        } else {
            tracing::debug!("Sync already running; coalesced ({reason:?})");
            TriggerOutcome::Coalesced
        }
    }

    /// Hook for the mutation layer: each committed write fires a
    /// [`TriggerReason::Mutation`].
    pub fn mutation_hook(&self) -> MutationHook {
        let trigger = self.clone();
        Arc::new(move || {
            trigger.fire(TriggerReason::Mutation);
        })
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.state.borrow().phase
    }

    pub fn is_syncing(&self) -> bool {
        self.phase() == SyncPhase::Syncing
    }

    /// Resolve once no cycle is running or scheduled.
    pub async fn wait_idle(&self) {
        let mut state = self.inner.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = state.wait_for(|state| state.phase == SyncPhase::Idle).await;
    }

    /// Cycles started since creation, follow-ups included.
    pub fn run_count(&self) -> u64 {
        self.inner.runs.load(Ordering::SeqCst)
    }
}

async fn drive<R: SyncRunner>(inner: Arc<Inner<R>>) {
    loop {
        inner.runs.fetch_add(1, Ordering::SeqCst);
        if AssertUnwindSafe(inner.runner.run())
            .catch_unwind()
            .await
            .is_err()
        {
            tracing::error!("Sync cycle panicked");
        }

        let mut again = false;
        inner.state.send_modify(|state| {
            if state.rerun {
                state.rerun = false;
                again = true;
            } else {
                state.phase = SyncPhase::Idle;
            }
        });

        if !again {
            break;
        }
        tracing::debug!("Running coalesced follow-up sync");
    }
}

/// [`SyncRunner`] that syncs one user and publishes each result.
pub struct UserSync<B> {
    engine: Arc<SyncEngine<B>>,
    user_id: String,
    latest: watch::Sender<Option<SyncResult>>,
}

impl<B> UserSync<B> {
    pub fn new(engine: Arc<SyncEngine<B>>, user_id: impl Into<String>) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            engine,
            user_id: user_id.into(),
            latest,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Receives the result of every completed cycle; a change means local
    /// data may have changed and views should re-read.
    pub fn subscribe(&self) -> watch::Receiver<Option<SyncResult>> {
        self.latest.subscribe()
    }

    pub fn latest(&self) -> Option<SyncResult> {
        self.latest.borrow().clone()
    }
}

#[async_trait]
impl<B: RemoteBackend + 'static> SyncRunner for UserSync<B> {
    async fn run(&self) {
        let result = self.engine.sync(&self.user_id).await;
        if result.has_auth_failure() {
            tracing::warn!("Remote rejected credentials for {}; sign in again", self.user_id);
        }
        self.latest.send_replace(Some(result));
    }
}

/// Background trigger sources: the periodic timer and connectivity changes.
/// Dropping the scheduler stops both.
pub struct SyncScheduler {
    tasks: Vec<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Fire [`TriggerReason::AppStart`], then start the background sources.
    ///
    /// `online` reports connectivity; a change from offline to online fires
    /// [`TriggerReason::NetworkReconnect`]. A zero `interval` disables the
    /// timer.
    pub fn start<R: SyncRunner>(
        trigger: &SyncTrigger<R>,
        interval: Duration,
        online: Option<watch::Receiver<bool>>,
    ) -> Self {
        let runtime = trigger.inner.runtime.clone();
        let mut tasks = Vec::new();

        trigger.fire(TriggerReason::AppStart);

        if !interval.is_zero() {
            let periodic = trigger.clone();
            tasks.push(runtime.spawn(async move {
                let mut ticker = interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    periodic.fire(TriggerReason::Periodic);
                }
            }));
        }

        if let Some(mut online) = online {
            let reconnect = trigger.clone();
            tasks.push(runtime.spawn(async move {
                let mut was_online = *online.borrow_and_update();
                while online.changed().await.is_ok() {
                    let is_online = *online.borrow_and_update();
                    if is_online && !was_online {
                        reconnect.fire(TriggerReason::NetworkReconnect);
                    }
                    was_online = is_online;
                }
            }));
        }

        Self { tasks }
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
