//! Order domain entity
//!
//! An [`Order`] is the local record of a customer order. Orders handed to a
//! courier carry the courier's identifier and the raw status text it
//! reports; orders without a courier identifier are local and never take
//! part in remote reconciliation.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    errors::DomainError,
    newtypes::{AccountUsername, InvoiceId, OrderId, PartnerName, PartnerOrderId, TrackingNumber, UserId},
};

/// Normalized lifecycle status of an order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, not yet being prepared
    #[default]
    Pending,
    /// Being prepared for hand-over
    Processing,
    /// Handed over to the courier
    Shipped,
    /// Out for delivery with a courier agent
    Delivery,
    /// Delivered to the customer
    Delivered,
    /// Delivered and the courier invoice confirmed by a manager
    Completed,
    /// Returned to the merchant
    Returned,
    /// Cancelled before delivery
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivery,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Returned,
        OrderStatus::Cancelled,
    ];

    /// Storage / wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivery => "delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Returned => "returned",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true once no further courier transitions are expected
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Returned | OrderStatus::Cancelled
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == needle)
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}

/// Canonical form of a courier status text used for table lookups
///
/// Trims, lower-cases and collapses internal whitespace runs to one space.
/// No other rewriting happens: lookups on the result are exact.
pub fn normalize_status_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// OrderUpdate
// ============================================================================

/// Receipt fields written when a courier invoice is linked to an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptUpdate {
    /// When the receipt was recorded
    pub received_at: DateTime<Utc>,
    /// Who recorded it (the acting user of the pass)
    pub received_by: Option<UserId>,
    /// Courier invoice covering the order
    pub invoice_id: InvoiceId,
}

/// The field set of one order persisted in a single atomic write
///
/// Every field is optional; `None` leaves the stored value untouched. An
/// update is never split across writes, so readers observe either the old
/// or the new combination of status, raw status and receipt fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// New normalized status
    pub status: Option<OrderStatus>,
    /// New raw courier status text
    pub delivery_status: Option<String>,
    /// Receipt / invoice fields
    pub receipt: Option<ReceiptUpdate>,
}

impl OrderUpdate {
    /// Creates an empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the update would not change anything
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.delivery_status.is_none() && self.receipt.is_none()
    }

    /// Merges another update into this one; fields set in `other` win
    pub fn merge(&mut self, other: OrderUpdate) {
        if other.status.is_some() {
            self.status = other.status;
        }
        if other.delivery_status.is_some() {
            self.delivery_status = other.delivery_status;
        }
        if other.receipt.is_some() {
            self.receipt = other.receipt;
        }
    }
}

// ============================================================================
// Order
// ============================================================================

/// Local record of a customer order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    tracking_number: TrackingNumber,
    created_by: UserId,
    status: OrderStatus,
    delivery_partner: PartnerName,
    delivery_partner_order_id: Option<PartnerOrderId>,
    delivery_account: Option<AccountUsername>,
    delivery_status: Option<String>,
    receipt_received: bool,
    receipt_received_at: Option<DateTime<Utc>>,
    receipt_received_by: Option<UserId>,
    delivery_partner_invoice_id: Option<InvoiceId>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a pending local order owned by `created_by`
    pub fn new(id: OrderId, tracking_number: TrackingNumber, created_by: UserId) -> Self {
        Self {
            id,
            tracking_number,
            created_by,
            status: OrderStatus::Pending,
            delivery_partner: PartnerName::local(),
            delivery_partner_order_id: None,
            delivery_account: None,
            delivery_status: None,
            receipt_received: false,
            receipt_received_at: None,
            receipt_received_by: None,
            delivery_partner_invoice_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Attaches the courier side of the order
    pub fn with_delivery_partner(
        mut self,
        partner: PartnerName,
        partner_order_id: Option<PartnerOrderId>,
    ) -> Self {
        self.delivery_partner = partner;
        self.delivery_partner_order_id = partner_order_id;
        self
    }

    /// Records the courier account the order was handed over with
    pub fn with_delivery_account(mut self, account: Option<AccountUsername>) -> Self {
        self.delivery_account = account;
        self
    }

    /// Sets the normalized status
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the raw courier status text
    pub fn with_delivery_status(mut self, raw: Option<String>) -> Self {
        self.delivery_status = raw;
        self
    }

    /// Sets the receipt fields (used when reconstituting from storage)
    pub fn with_receipt(
        mut self,
        received: bool,
        received_at: Option<DateTime<Utc>>,
        received_by: Option<UserId>,
        invoice_id: Option<InvoiceId>,
    ) -> Self {
        self.receipt_received = received;
        self.receipt_received_at = received_at;
        self.receipt_received_by = received_by;
        self.delivery_partner_invoice_id = invoice_id;
        self
    }

    /// Sets the last-modified timestamp (used when reconstituting from storage)
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    // --- Getters ---

    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn tracking_number(&self) -> &TrackingNumber {
        &self.tracking_number
    }

    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn delivery_partner(&self) -> &PartnerName {
        &self.delivery_partner
    }

    pub fn delivery_partner_order_id(&self) -> Option<&PartnerOrderId> {
        self.delivery_partner_order_id.as_ref()
    }

    pub fn delivery_account(&self) -> Option<&AccountUsername> {
        self.delivery_account.as_ref()
    }

    pub fn delivery_status(&self) -> Option<&str> {
        self.delivery_status.as_deref()
    }

    pub fn receipt_received(&self) -> bool {
        self.receipt_received
    }

    pub fn receipt_received_at(&self) -> Option<DateTime<Utc>> {
        self.receipt_received_at
    }

    pub fn receipt_received_by(&self) -> Option<&UserId> {
        self.receipt_received_by.as_ref()
    }

    pub fn delivery_partner_invoice_id(&self) -> Option<&InvoiceId> {
        self.delivery_partner_invoice_id.as_ref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the order was never handed to a courier
    ///
    /// Local orders are never subject to remote reconciliation.
    pub fn is_local(&self) -> bool {
        self.delivery_partner_order_id.is_none()
    }

    /// Applies an update in memory, mirroring what the store persists
    ///
    /// Receipt fields are written once; a receipt on an already received
    /// order is ignored.
    pub fn apply(&mut self, update: &OrderUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(raw) = &update.delivery_status {
            self.delivery_status = Some(raw.clone());
        }
        if let Some(receipt) = update.receipt.as_ref().filter(|_| !self.receipt_received) {
            self.receipt_received = true;
            self.receipt_received_at = Some(receipt.received_at);
            self.receipt_received_by = receipt.received_by.clone();
            self.delivery_partner_invoice_id = Some(receipt.invoice_id.clone());
        }
        if !update.is_empty() {
            self.updated_at = Utc::now();
        }
    }
}
