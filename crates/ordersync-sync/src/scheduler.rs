//! Sync scheduler - turns cadences and requests into sync passes
//!
//! The [`SyncScheduler`] owns the only loop that drives the [`SyncEngine`].
//! Every trigger is serialized into it, so passes never overlap within one
//! scheduler:
//!
//! ```text
//!   full interval ──┐
//!  quick interval ──┼──→ SyncScheduler ──→ SyncEngine
//!  SyncHandle ──────┘         │
//!  (on-demand, changes)  RemoteChangeDebouncer
//! ```
//!
//! On-demand requests bypass the debounce window and are answered through a
//! oneshot channel. Change notifications are coalesced per order and synced
//! in one manual pass per acting user once they settle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ordersync_core::config::SyncConfig;
use ordersync_core::domain::{OrderId, UserId};

use crate::debounce::{ChangeKind, OrderChange, RemoteChangeDebouncer};
use crate::engine::SyncEngine;
use crate::pass::{OnDemandReport, SyncScope, SyncTrigger};
use crate::SyncError;

/// Pending requests a scheduler buffers before senders wait
const REQUEST_CAPACITY: usize = 64;

/// Lower bound for the debounce polling period
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Requests and handle
// ============================================================================

/// Work submitted to a running scheduler
#[derive(Debug)]
pub enum SyncRequest {
    /// Run a manual pass now and send back its report
    OnDemand {
        actor: UserId,
        scope: SyncScope,
        reply: oneshot::Sender<OnDemandReport>,
    },
    /// An order changed; sync it once changes settle
    Change(OrderChange),
}

/// Cloneable sender side of a [`SyncScheduler`]
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncRequest>,
}

impl SyncHandle {
    /// Runs a manual pass for `actor` and waits for its report
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SchedulerStopped`] if the scheduler has exited.
    pub async fn sync_now(&self, actor: UserId, scope: SyncScope) -> Result<OnDemandReport, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SyncRequest::OnDemand { actor, scope, reply })
            .await
            .map_err(|_| SyncError::SchedulerStopped)?;
        rx.await.map_err(|_| SyncError::SchedulerStopped)
    }

    /// Queues an order change notification
    pub async fn notify_change(&self, change: OrderChange) -> Result<(), SyncError> {
        self.tx
            .send(SyncRequest::Change(change))
            .await
            .map_err(|_| SyncError::SchedulerStopped)
    }

    /// Returns true once the scheduler has exited
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// SyncScheduler
// ============================================================================

/// Drives the engine from interval cadences, requests and change notifications
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    requests: mpsc::Receiver<SyncRequest>,
    debouncer: RemoteChangeDebouncer,
    quick_interval: Duration,
    full_interval: Duration,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl SyncScheduler {
    /// Creates a scheduler and the handle used to talk to it
    pub fn new(
        engine: Arc<SyncEngine>,
        config: &SyncConfig,
        shutdown: CancellationToken,
    ) -> (Self, SyncHandle) {
        let (tx, requests) = mpsc::channel(REQUEST_CAPACITY);
        let window = config.debounce_window();
        let poll_interval = (window / 2).max(MIN_POLL_INTERVAL);

        info!(
            quick_secs = config.quick_interval_secs,
            full_secs = config.full_interval_secs,
            debounce_ms = config.debounce_ms,
            "Creating sync scheduler"
        );

        let scheduler = Self {
            engine,
            requests,
            debouncer: RemoteChangeDebouncer::new(window),
            quick_interval: config.quick_interval(),
            full_interval: config.full_interval(),
            poll_interval,
            shutdown,
        };

        (scheduler, SyncHandle { tx })
    }

    /// Main loop; returns once the shutdown token is cancelled
    ///
    /// A full pass runs immediately, then each cadence fires on its own
    /// interval. A full pass restarts the quick cadence since it already
    /// covered invoices. Cancellation is observed between passes only.
    pub async fn run(mut self) {
        info!("Sync scheduler starting");

        let mut full = interval(self.full_interval);
        full.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut quick = interval_at(Instant::now() + self.quick_interval, self.quick_interval);
        quick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll = interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut requests_open = true;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }

                _ = full.tick() => {
                    let passes = self.engine.run_scheduled(SyncTrigger::ScheduledFull).await;
                    debug!(passes = passes.len(), "Full cadence finished");
                    quick.reset();
                }

                _ = quick.tick() => {
                    let passes = self.engine.run_scheduled(SyncTrigger::ScheduledQuick).await;
                    debug!(passes = passes.len(), "Quick cadence finished");
                }

                request = self.requests.recv(), if requests_open => match request {
                    Some(request) => self.handle(request).await,
                    None => {
                        debug!("All sync handles dropped");
                        requests_open = false;
                    }
                },

                _ = poll.tick() => self.flush_settled().await,
            }
        }

        if !self.debouncer.is_empty() {
            info!(pending = self.debouncer.len(), "Discarding unsynced order changes");
        }
        info!("Sync scheduler stopped");
    }

    async fn handle(&mut self, request: SyncRequest) {
        match request {
            SyncRequest::OnDemand { actor, scope, reply } => {
                info!(actor = %actor, "On-demand sync requested");
                let report = self.engine.run_on_demand(actor, scope).await;
                if reply.send(report).is_err() {
                    debug!("On-demand requester went away before the report");
                }
            }
            SyncRequest::Change(change) => self.debouncer.push(change),
        }
    }

    /// Syncs settled order changes, one manual pass per acting user
    async fn flush_settled(&mut self) {
        let settled = self.debouncer.poll();
        if settled.is_empty() {
            return;
        }

        let mut by_actor: BTreeMap<UserId, Vec<OrderId>> = BTreeMap::new();
        for change in settled {
            if change.kind == ChangeKind::Deleted {
                debug!(order_id = %change.order_id, "Order deleted, nothing to sync");
                continue;
            }
            by_actor.entry(change.actor).or_default().push(change.order_id);
        }

        for (user, order_ids) in by_actor {
            info!(actor = %user, orders = order_ids.len(), "Syncing changed orders");
            let actor = self.engine.acting_user(user).await;
            self.engine
                .run_pass(SyncTrigger::Manual, SyncScope::Orders(order_ids), &actor)
                .await;
        }
    }
}
