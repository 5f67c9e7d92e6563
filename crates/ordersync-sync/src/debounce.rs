//! Debounced order-change notifications
//!
//! Change notifications for orders tend to arrive in bursts (a courier
//! webhook fan-out, a bulk status edit). The [`RemoteChangeDebouncer`] keeps
//! only the latest notification per order and releases it once the order has
//! been quiet for the debounce window, so downstream consumers see one
//! change per order per burst. An order that never goes quiet is released
//! anyway once it has been held for the max hold time.
//!
//! ```text
//! notifications ──→ RemoteChangeDebouncer ──→ SyncScheduler ──→ SyncEngine::run_pass
//! ```

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use ordersync_core::domain::{OrderId, UserId};

/// What happened to an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// A notification that one order changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderChange {
    pub order_id: OrderId,
    /// User on whose behalf the follow-up sync runs
    pub actor: UserId,
    pub kind: ChangeKind,
}

impl OrderChange {
    pub fn new(order_id: OrderId, actor: UserId, kind: ChangeKind) -> Self {
        Self {
            order_id,
            actor,
            kind,
        }
    }
}

/// Default max hold, as a multiple of the debounce window
const MAX_HOLD_WINDOWS: u32 = 10;

struct Pending {
    change: OrderChange,
    first_seen: Instant,
    last_seen: Instant,
}

/// Coalesces rapid changes per order
///
/// A new notification for a pending order replaces the old one and restarts
/// its window, so an order that keeps changing is held until it settles or
/// until it has been pending for `max_hold`.
pub struct RemoteChangeDebouncer {
    pending: HashMap<OrderId, Pending>,
    window: Duration,
    max_hold: Duration,
}

impl RemoteChangeDebouncer {
    /// Debouncer holding changes for at most ten windows
    pub fn new(window: Duration) -> Self {
        Self::with_max_hold(window, window.saturating_mul(MAX_HOLD_WINDOWS))
    }

    /// `max_hold` below `window` is raised to `window`
    pub fn with_max_hold(window: Duration, max_hold: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            window,
            max_hold: max_hold.max(window),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_hold(&self) -> Duration {
        self.max_hold
    }

    /// Inserts or replaces the pending change for the order
    ///
    /// A replacement keeps the time the order was first queued.
    pub fn push(&mut self, change: OrderChange) {
        debug!(order_id = %change.order_id, kind = ?change.kind, "Order change queued");
        let now = Instant::now();
        let first_seen = self
            .pending
            .get(&change.order_id)
            .map_or(now, |p| p.first_seen);
        self.pending.insert(
            change.order_id.clone(),
            Pending {
                change,
                first_seen,
                last_seen: now,
            },
        );
    }

    /// Removes and returns every change quiet for the window or held for
    /// the max hold time
    ///
    /// Returned changes are ordered by order id.
    pub fn poll(&mut self) -> Vec<OrderChange> {
        let now = Instant::now();
        let window = self.window;
        let max_hold = self.max_hold;

        let settled_ids: Vec<OrderId> = self
            .pending
            .iter()
            .filter(|(_, p)| {
                now.duration_since(p.last_seen) >= window
                    || now.duration_since(p.first_seen) >= max_hold
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut settled: Vec<OrderChange> = settled_ids
            .into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|p| p.change))
            .collect();
        settled.sort_by(|a, b| a.order_id.cmp(&b.order_id));

        if !settled.is_empty() {
            debug!(settled = settled.len(), pending = self.pending.len(), "Order changes settled");
        }
        settled
    }

    /// Removes and returns everything pending, settled or not
    pub fn drain(&mut self) -> Vec<OrderChange> {
        let mut all: Vec<OrderChange> = self.pending.drain().map(|(_, p)| p.change).collect();
        all.sort_by(|a, b| a.order_id.cmp(&b.order_id));
        all
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
