//! HttpCourierApi - ICourierApi implementation over the merchant HTTP API
//!
//! Wraps the [`CourierClient`] and converts its wire DTOs into the port-level
//! [`RemoteOrder`] / [`RemoteInvoice`] types, classifying every failure as a
//! [`RemoteError`].

use tracing::debug;

use ordersync_core::domain::{
    DeliveryAccountToken, InvoiceId, PartnerOrderId, TrackingNumber,
};
use ordersync_core::ports::{ICourierApi, RemoteError, RemoteInvoice, RemoteOrder};

use crate::client::{CourierClient, CourierInvoice, CourierOrder};

/// Converts a wire order into a port-level [`RemoteOrder`]
fn to_remote_order(order: CourierOrder) -> Result<RemoteOrder, RemoteError> {
    let id = PartnerOrderId::new(order.id)
        .map_err(|e| RemoteError::Malformed(format!("order id: {e}")))?;
    let tracking_number = TrackingNumber::new(order.tracking_number)
        .map_err(|e| RemoteError::Malformed(format!("tracking number: {e}")))?;
    let invoice_id = order
        .invoice_id
        .map(InvoiceId::new)
        .transpose()
        .map_err(|e| RemoteError::Malformed(format!("invoice id: {e}")))?;

    Ok(RemoteOrder {
        id,
        tracking_number,
        raw_status: order.raw_status,
        invoice_id,
    })
}

fn to_remote_invoice(invoice: CourierInvoice) -> Result<RemoteInvoice, RemoteError> {
    let id = InvoiceId::new(invoice.id)
        .map_err(|e| RemoteError::Malformed(format!("invoice id: {e}")))?;
    Ok(RemoteInvoice {
        id,
        status: invoice.status,
        orders_count: invoice.orders_count,
    })
}

fn to_remote_orders(orders: Vec<CourierOrder>) -> Result<Vec<RemoteOrder>, RemoteError> {
    orders.into_iter().map(to_remote_order).collect()
}

/// Courier port backed by the merchant HTTP API
pub struct HttpCourierApi {
    client: CourierClient,
}

impl HttpCourierApi {
    pub fn new(client: CourierClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &CourierClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl ICourierApi for HttpCourierApi {
    async fn list_orders(&self, token: &DeliveryAccountToken) -> Result<Vec<RemoteOrder>, RemoteError> {
        debug!(credential = %token.key(), "Listing courier orders");
        let orders = self.client.merchant_orders(token.token().expose()).await?;
        to_remote_orders(orders)
    }

    async fn get_order_detail(
        &self,
        token: &DeliveryAccountToken,
        tracking_number: &TrackingNumber,
    ) -> Result<Option<RemoteOrder>, RemoteError> {
        debug!(credential = %token.key(), tracking_number = %tracking_number, "Fetching courier order");
        self.client
            .order_by_qr(token.token().expose(), tracking_number.as_str())
            .await?
            .map(to_remote_order)
            .transpose()
    }

    async fn list_invoices(&self, token: &DeliveryAccountToken) -> Result<Vec<RemoteInvoice>, RemoteError> {
        debug!(credential = %token.key(), "Listing courier invoices");
        let invoices = self.client.merchant_invoices(token.token().expose()).await?;
        invoices.into_iter().map(to_remote_invoice).collect()
    }

    async fn get_invoice_orders(
        &self,
        token: &DeliveryAccountToken,
        invoice_id: &InvoiceId,
    ) -> Result<Vec<RemoteOrder>, RemoteError> {
        debug!(credential = %token.key(), invoice_id = %invoice_id, "Fetching invoice orders");
        let orders = self
            .client
            .invoice_orders(token.token().expose(), invoice_id.as_str())
            .await?;
        to_remote_orders(orders)
    }
}
