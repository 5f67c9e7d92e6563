//! Courier API port (driven/secondary port)
//!
//! This module defines the interface for reading order and invoice state
//! from a delivery partner. Every call is a read and may be repeated.
//!
//! ## Design Notes
//!
//! - Unlike the store ports, failures here are classified in [`RemoteError`]
//!   because the sync engine reacts differently to each class.
//! - `RemoteOrder` and `RemoteInvoice` are port-level DTOs, not domain
//!   entities; the engine maps them onto local `Order`s.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    newtypes::{InvoiceId, PartnerOrderId, TrackingNumber},
    DeliveryAccountToken,
};

// ============================================================================
// DTOs
// ============================================================================

/// One order as the courier reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrder {
    /// Courier-side order id
    pub id: PartnerOrderId,
    /// Tracking number / scan code
    pub tracking_number: TrackingNumber,
    /// Status text exactly as returned by the courier
    pub raw_status: String,
    /// Invoice covering this order, once issued
    pub invoice_id: Option<InvoiceId>,
}

impl RemoteOrder {
    pub fn new(id: PartnerOrderId, tracking_number: TrackingNumber, raw_status: impl Into<String>) -> Self {
        Self {
            id,
            tracking_number,
            raw_status: raw_status.into(),
            invoice_id: None,
        }
    }

    pub fn with_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }
}

/// A courier-issued merchant invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInvoice {
    pub id: InvoiceId,
    /// Raw status text of the invoice (e.g. "received by merchant")
    pub status: String,
    /// Number of orders the courier says the invoice covers
    pub orders_count: Option<u32>,
}

// ============================================================================
// RemoteError
// ============================================================================

/// Classified failure of a courier call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The courier rejected the credential
    #[error("courier rejected the credential")]
    Unauthorized,

    /// Network failure, timeout, rate limiting or a 5xx response
    #[error("courier unavailable: {0}")]
    Unavailable(String),

    /// The response did not have the expected shape
    #[error("malformed courier response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Short machine-readable kind, used in pass reports
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::Unauthorized => "unauthorized",
            RemoteError::Unavailable(_) => "remote_unavailable",
            RemoteError::Malformed(_) => "remote_malformed",
        }
    }
}

// ============================================================================
// ICourierApi
// ============================================================================

/// Port trait for courier partner APIs
#[async_trait::async_trait]
pub trait ICourierApi: Send + Sync {
    /// Lists every order visible to the credential
    async fn list_orders(&self, token: &DeliveryAccountToken) -> Result<Vec<RemoteOrder>, RemoteError>;

    /// Looks up a single order by tracking number
    ///
    /// Returns `Ok(None)` when the courier no longer knows the order.
    async fn get_order_detail(
        &self,
        token: &DeliveryAccountToken,
        tracking_number: &TrackingNumber,
    ) -> Result<Option<RemoteOrder>, RemoteError>;

    /// Lists the merchant invoices issued to the credential
    async fn list_invoices(&self, token: &DeliveryAccountToken) -> Result<Vec<RemoteInvoice>, RemoteError>;

    /// Lists the orders covered by one invoice
    async fn get_invoice_orders(
        &self,
        token: &DeliveryAccountToken,
        invoice_id: &InvoiceId,
    ) -> Result<Vec<RemoteOrder>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RemoteError::Unauthorized.kind(), "unauthorized");
        assert_eq!(RemoteError::Unavailable("timeout".into()).kind(), "remote_unavailable");
        assert_eq!(RemoteError::Malformed("eof".into()).kind(), "remote_malformed");
    }

    #[test]
    fn test_remote_order_builder() {
        let order = RemoteOrder::new(
            PartnerOrderId::new("1").unwrap(),
            TrackingNumber::new("99319996").unwrap(),
            "تم التسليم للزبون",
        )
        .with_invoice(InvoiceId::new("inv42").unwrap());
        assert_eq!(order.invoice_id.unwrap().as_str(), "inv42");
    }
}
