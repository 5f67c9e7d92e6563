//! Order store port (driven/secondary port)
//!
//! This module defines the interface for persisting and querying local
//! orders. The UI layer writes the same store concurrently, so every write
//! the engine issues is a single-row atomic operation.
//!
//! ## Design Notes
//!
//! - `StoreError` separates the two outcomes callers react to (`Conflict`,
//!   `NotFound`) from adapter-specific failures carried as `anyhow::Error`.
//! - The `OrderFilter` struct provides a composable query mechanism
//!   without exposing storage implementation details.

use thiserror::Error;

use crate::domain::{
    newtypes::{AccountUsername, OrderId, PartnerName, PartnerOrderId, TrackingNumber, UserId},
    Order, OrderStatus, OrderUpdate,
};

// ============================================================================
// OrderFilter
// ============================================================================

/// Filter criteria for querying orders
///
/// All fields are optional; when `None`, no filtering is applied for that field.
/// Multiple filters are combined with AND logic.
///
/// # Example
///
/// ```
/// use ordersync_core::ports::OrderFilter;
/// use ordersync_core::domain::{OrderStatus, UserId};
///
/// let filter = OrderFilter::new()
///     .with_created_by(UserId::new("emp1").unwrap())
///     .with_status(OrderStatus::Delivered)
///     .externally_tracked();
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Filter by owner
    pub created_by: Option<UserId>,
    /// Filter by normalized status
    pub status: Option<OrderStatus>,
    /// Filter by delivery partner
    pub delivery_partner: Option<PartnerName>,
    /// Filter by the courier account recorded on the order
    pub delivery_account: Option<AccountUsername>,
    /// Only orders with a courier order id
    pub externally_tracked: bool,
}

impl OrderFilter {
    /// Creates a new empty filter (matches all orders)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_created_by(mut self, user: UserId) -> Self {
        self.created_by = Some(user);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_delivery_partner(mut self, partner: PartnerName) -> Self {
        self.delivery_partner = Some(partner);
        self
    }

    pub fn with_delivery_account(mut self, account: AccountUsername) -> Self {
        self.delivery_account = Some(account);
        self
    }

    /// Restricts the query to orders handed to a courier
    pub fn externally_tracked(mut self) -> Self {
        self.externally_tracked = true;
        self
    }

    /// Returns true if no filters are set
    pub fn is_empty(&self) -> bool {
        self.created_by.is_none()
            && self.status.is_none()
            && self.delivery_partner.is_none()
            && self.delivery_account.is_none()
            && !self.externally_tracked
    }

    /// Evaluates the filter against an order in memory
    pub fn matches(&self, order: &Order) -> bool {
        self.created_by.as_ref().map_or(true, |u| order.created_by() == u)
            && self.status.map_or(true, |s| order.status() == s)
            && self
                .delivery_partner
                .as_ref()
                .map_or(true, |p| order.delivery_partner() == p)
            && self
                .delivery_account
                .as_ref()
                .map_or(true, |a| order.delivery_account() == Some(a))
            && (!self.externally_tracked || !order.is_local())
    }
}

// ============================================================================
// StoreError
// ============================================================================

/// Failure of an order store operation
#[derive(Debug, Error)]
pub enum StoreError {
    /// The row changed or disappeared underneath the write
    #[error("order {0} changed concurrently")]
    Conflict(OrderId),

    /// No order with the given id exists
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// Adapter-specific failure
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

// ============================================================================
// IOrderStore trait
// ============================================================================

/// Port trait for the local order table
#[async_trait::async_trait]
pub trait IOrderStore: Send + Sync {
    /// Retrieves an order by id
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// Queries orders matching the given filter
    async fn query(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// Retrieves an order by tracking number
    async fn find_by_tracking_number(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<Option<Order>, StoreError>;

    /// Retrieves an order by its courier-side id
    async fn find_by_partner_order_id(
        &self,
        partner: &PartnerName,
        partner_order_id: &PartnerOrderId,
    ) -> Result<Option<Order>, StoreError>;

    /// Inserts or replaces an order
    async fn upsert(&self, order: &Order) -> Result<(), StoreError>;

    /// Persists one order's update atomically
    ///
    /// Receipt fields are only written while `receipt_received` is false,
    /// and a stored `Completed` status is never replaced.
    /// Returns the order as stored after the write, or
    /// [`StoreError::Conflict`] when the row no longer exists.
    async fn apply_update(&self, id: &OrderId, update: &OrderUpdate) -> Result<Order, StoreError>;

    /// Deletes an order; returns false if it was already gone
    async fn delete(&self, id: &OrderId) -> Result<bool, StoreError>;

    /// Deletes an order only while it is still deletable
    ///
    /// The check and the delete are one atomic operation: the order must be
    /// externally tracked, without a receipt and not `Completed`. Returns
    /// false when the order is gone or no longer qualifies.
    async fn delete_if_deletable(&self, id: &OrderId) -> Result<bool, StoreError>;
}
