//! In-process publish/subscribe of sync outcomes
//!
//! A [`SyncEventBus`] wraps a `tokio::sync::broadcast` channel. Publishing is
//! fire-and-forget: a pass never fails because nobody is listening, and a
//! subscriber that falls behind loses the oldest events and is told so.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use ordersync_core::domain::OrderId;

use crate::pass::{InvoiceLink, SyncPassResult};

/// Default number of buffered events per subscriber
pub const DEFAULT_CAPACITY: usize = 256;

/// A sync outcome delivered to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A pass finished
    PassCompleted(SyncPassResult),
    /// Orders were linked to a courier invoice
    InvoiceLinked(InvoiceLink),
    /// Orders were removed after disappearing from the courier
    OrdersDeleted { order_ids: Vec<OrderId> },
}

impl SyncEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::PassCompleted(_) => "pass_completed",
            SyncEvent::InvoiceLinked(_) => "invoice_linked",
            SyncEvent::OrdersDeleted { .. } => "orders_deleted",
        }
    }
}

/// Broadcasts [`SyncEvent`]s to any number of subscribers
#[derive(Clone)]
pub struct SyncEventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl SyncEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes to all current subscribers; returns how many received it
    pub fn publish(&self, event: SyncEvent) -> usize {
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(event = kind, receivers, "Sync event published");
                receivers
            }
            Err(_) => {
                debug!(event = kind, "No subscribers for sync event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SyncEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving end of the bus
pub struct EventSubscription {
    receiver: broadcast::Receiver<SyncEvent>,
}

impl EventSubscription {
    /// Waits for the next event; `None` once the bus is gone
    ///
    /// Lag is logged and skipped over rather than surfaced as an error.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Sync event subscriber lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already buffered event without waiting
    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Sync event subscriber lagging, events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}
