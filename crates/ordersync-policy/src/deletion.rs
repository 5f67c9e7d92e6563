//! Auto-deletion policy
//!
//! Consulted before an order that disappeared from the courier is removed
//! locally. Rules are evaluated in order and the first failing rule wins.

use serde::{Deserialize, Serialize};
use tracing::trace;

use ordersync_core::domain::{ActingUser, Order, OrderStatus};

use crate::ownership::OwnershipResolver;

/// Why an auto-deletion was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionDenial {
    /// The order was never handed to a courier
    LocalOrder,
    /// The actor may not delete the order
    OwnershipDenied,
    /// The courier invoice was already received
    ReceiptReceived,
    /// The order is completed
    Completed,
}

impl std::fmt::Display for DeletionDenial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeletionDenial::LocalOrder => "local_order",
            DeletionDenial::OwnershipDenied => "ownership_denied",
            DeletionDenial::ReceiptReceived => "receipt_received",
            DeletionDenial::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Outcome of the deletion policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionDecision {
    Allow,
    Deny(DeletionDenial),
}

impl DeletionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, DeletionDecision::Allow)
    }
}

/// Pure auto-deletion policy
#[derive(Debug, Clone, Copy)]
pub struct SafeDeletionGuard<'a> {
    ownership: OwnershipResolver<'a>,
}

impl<'a> SafeDeletionGuard<'a> {
    pub fn new(ownership: OwnershipResolver<'a>) -> Self {
        Self { ownership }
    }

    pub fn evaluate(&self, order: &Order, actor: &ActingUser) -> DeletionDecision {
        let decision = if order.is_local() {
            DeletionDecision::Deny(DeletionDenial::LocalOrder)
        } else if !self.ownership.resolve(order, actor).can_delete {
            DeletionDecision::Deny(DeletionDenial::OwnershipDenied)
        } else if order.receipt_received() {
            DeletionDecision::Deny(DeletionDenial::ReceiptReceived)
        } else if order.status() == OrderStatus::Completed {
            DeletionDecision::Deny(DeletionDenial::Completed)
        } else {
            DeletionDecision::Allow
        };

        trace!(order_id = %order.id(), actor = %actor.id(), ?decision, "Deletion policy evaluated");
        decision
    }

    pub fn can_auto_delete(&self, order: &Order, actor: &ActingUser) -> bool {
        self.evaluate(order, actor).is_allowed()
    }
}
