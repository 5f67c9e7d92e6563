//! Courier invoice reconciliation
//!
//! When the courier reports an invoice as received by the merchant, every
//! local order it covers gets its receipt fields stamped and its status
//! moved on. Orders that already carry a receipt are counted and left alone,
//! so running reconciliation twice changes nothing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use ordersync_core::domain::{
    DeliveryAccountToken, InvoiceId, Order, OrderId, OrderStatus, OrderUpdate, PartnerName,
    PartnerOrderId, ReceiptUpdate, Role, TrackingNumber, UserId,
};
use ordersync_core::ports::{
    resolve_acting_user, ICourierApi, IOrderStore, IUserDirectory, OrderFilter, RemoteError,
};
use ordersync_policy::StatusMap;

use crate::pass::{InvoiceLink, PassError};
use crate::SyncError;

/// Result of reconciling one credential's invoices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Newly linked orders, grouped by invoice
    pub linked: Vec<InvoiceLink>,
    /// Matched orders that already had a receipt
    pub already_linked: usize,
    /// Per-invoice or per-order problems; siblings were still processed
    pub errors: Vec<PassError>,
}

impl ReconcileOutcome {
    pub fn linked_orders(&self) -> usize {
        self.linked.iter().map(|l| l.order_ids.len()).sum()
    }
}

/// True if the stored order carries exactly the receipt this update wrote
///
/// Receipt stamps are write-once, so a concurrent pass that linked the order
/// first leaves a different timestamp behind.
pub(crate) fn receipt_taken(stored: &Order, update: &OrderUpdate) -> bool {
    match &update.receipt {
        Some(receipt) => {
            stored.receipt_received_at() == Some(receipt.received_at)
                && stored.delivery_partner_invoice_id() == Some(&receipt.invoice_id)
        }
        None => false,
    }
}

/// Links received courier invoices to local orders
pub struct InvoiceReconciler {
    orders: Arc<dyn IOrderStore>,
    courier: Arc<dyn ICourierApi>,
    users: Arc<dyn IUserDirectory>,
    status_map: Arc<StatusMap>,
    partner: PartnerName,
}

impl InvoiceReconciler {
    pub fn new(
        orders: Arc<dyn IOrderStore>,
        courier: Arc<dyn ICourierApi>,
        users: Arc<dyn IUserDirectory>,
        status_map: Arc<StatusMap>,
        partner: PartnerName,
    ) -> Self {
        Self {
            orders,
            courier,
            users,
            status_map,
            partner,
        }
    }

    /// Receipt part of an order update for a newly received invoice
    ///
    /// Returns `None` when the order already carries a receipt. Orders of
    /// managers become `completed`; orders of employees stop at `delivered`
    /// until a manager confirms them. A completed order keeps its status.
    pub fn link_update(
        order: &Order,
        invoice_id: &InvoiceId,
        owner_role: Role,
        received_by: Option<&UserId>,
    ) -> Option<OrderUpdate> {
        if order.receipt_received() {
            return None;
        }

        let target = if owner_role.is_manager() {
            OrderStatus::Completed
        } else {
            OrderStatus::Delivered
        };
        let status = (order.status() != OrderStatus::Completed && order.status() != target)
            .then_some(target);

        Some(OrderUpdate {
            status,
            delivery_status: None,
            receipt: Some(ReceiptUpdate {
                received_at: Utc::now(),
                received_by: received_by.cloned(),
                invoice_id: invoice_id.clone(),
            }),
        })
    }

    /// Role of an order's owner; unknown owners are employees
    pub async fn owner_role(&self, owner: &UserId) -> Role {
        resolve_acting_user(self.users.as_ref(), owner.clone()).await.role()
    }

    /// Ids of the credential's invoices the merchant has received
    pub async fn received_invoices(
        &self,
        token: &DeliveryAccountToken,
    ) -> Result<HashSet<InvoiceId>, RemoteError> {
        let invoices = self.courier.list_invoices(token).await?;
        Ok(invoices
            .into_iter()
            .filter(|invoice| self.status_map.is_invoice_received(&invoice.status))
            .map(|invoice| invoice.id)
            .collect())
    }

    /// Reconciles every order belonging to the credential
    ///
    /// Candidates are orders recorded under the credential's courier account,
    /// plus the credential owner's orders that record no account.
    #[tracing::instrument(skip_all, fields(credential = %token.key()))]
    pub async fn reconcile(
        &self,
        token: &DeliveryAccountToken,
        received_by: Option<&UserId>,
    ) -> Result<ReconcileOutcome, SyncError> {
        let base = OrderFilter::new()
            .with_delivery_partner(self.partner.clone())
            .externally_tracked();

        let mut candidates = self
            .orders
            .query(&base.clone().with_delivery_account(token.account_username().clone()))
            .await?;

        if let Some(owner) = token.user_id() {
            let owned = self.orders.query(&base.with_created_by(owner.clone())).await?;
            candidates.extend(owned.into_iter().filter(|o| o.delivery_account().is_none()));
        }

        debug!(candidates = candidates.len(), "Reconciling invoices");
        Ok(self.reconcile_orders(token, &candidates, received_by).await?)
    }

    /// Reconciles the credential's received invoices against `orders`
    ///
    /// Only a failure to list invoices aborts; a failing invoice or order is
    /// recorded in the outcome and the rest continue.
    pub async fn reconcile_orders(
        &self,
        token: &DeliveryAccountToken,
        orders: &[Order],
        received_by: Option<&UserId>,
    ) -> Result<ReconcileOutcome, RemoteError> {
        let key = token.key();
        let mut outcome = ReconcileOutcome::default();

        let received = self.received_invoices(token).await?;
        if received.is_empty() || orders.is_empty() {
            return Ok(outcome);
        }

        let by_partner_id: HashMap<&PartnerOrderId, &Order> = orders
            .iter()
            .filter_map(|o| o.delivery_partner_order_id().map(|id| (id, o)))
            .collect();
        let by_tracking: HashMap<&TrackingNumber, &Order> =
            orders.iter().map(|o| (o.tracking_number(), o)).collect();

        let mut invoice_ids: Vec<InvoiceId> = received.into_iter().collect();
        invoice_ids.sort();

        let mut seen: HashSet<OrderId> = HashSet::new();
        let mut roles: HashMap<UserId, Role> = HashMap::new();

        for invoice_id in invoice_ids {
            let remote_orders = match self.courier.get_invoice_orders(token, &invoice_id).await {
                Ok(remote_orders) => remote_orders,
                Err(e) => {
                    warn!(invoice_id = %invoice_id, error = %e, "Failed to fetch invoice orders");
                    outcome.errors.push(PassError::remote(key.clone(), None, &e));
                    continue;
                }
            };

            let mut link = InvoiceLink::new(invoice_id.clone());
            for remote in &remote_orders {
                let Some(order) = by_partner_id
                    .get(&remote.id)
                    .or_else(|| by_tracking.get(&remote.tracking_number))
                    .copied()
                else {
                    continue;
                };
                if !seen.insert(order.id().clone()) {
                    continue;
                }
                if order.receipt_received() {
                    outcome.already_linked += 1;
                    continue;
                }

                let role = match roles.get(order.created_by()) {
                    Some(role) => *role,
                    None => {
                        let role = self.owner_role(order.created_by()).await;
                        roles.insert(order.created_by().clone(), role);
                        role
                    }
                };

                let Some(update) = Self::link_update(order, &invoice_id, role, received_by) else {
                    continue;
                };
                match self.orders.apply_update(order.id(), &update).await {
                    Ok(stored) if receipt_taken(&stored, &update) => {
                        link.order_ids.push(order.id().clone());
                    }
                    Ok(_) => outcome.already_linked += 1,
                    Err(e) => {
                        warn!(order_id = %order.id(), error = %e, "Failed to link order to invoice");
                        outcome
                            .errors
                            .push(PassError::store(Some(key.clone()), Some(order.id().clone()), &e));
                    }
                }
            }

            if !link.order_ids.is_empty() {
                info!(invoice_id = %invoice_id, orders = link.order_ids.len(), "Invoice linked");
                outcome.linked.push(link);
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: OrderStatus) -> Order {
        Order::new(
            OrderId::new("o1").unwrap(),
            TrackingNumber::new("T1").unwrap(),
            UserId::new("emp1").unwrap(),
        )
        .with_delivery_partner(
            PartnerName::new("alwaseet").unwrap(),
            Some(PartnerOrderId::new("T1").unwrap()),
        )
        .with_status(status)
    }

    fn invoice() -> InvoiceId {
        InvoiceId::new("inv1").unwrap()
    }

    #[test]
    fn test_employee_orders_stop_at_delivered() {
        let update =
            InvoiceReconciler::link_update(&order(OrderStatus::Delivery), &invoice(), Role::Employee, None)
                .unwrap();
        assert_eq!(update.status, Some(OrderStatus::Delivered));
        let receipt = update.receipt.unwrap();
        assert_eq!(receipt.invoice_id, invoice());
        assert!(receipt.received_by.is_none());
    }

    #[test]
    fn test_manager_orders_complete() {
        let mgr = UserId::new("mgr").unwrap();
        let update = InvoiceReconciler::link_update(
            &order(OrderStatus::Delivered),
            &invoice(),
            Role::Manager,
            Some(&mgr),
        )
        .unwrap();
        assert_eq!(update.status, Some(OrderStatus::Completed));
        assert_eq!(update.receipt.unwrap().received_by, Some(mgr));
    }

    #[test]
    fn test_completed_order_is_not_regressed() {
        let update =
            InvoiceReconciler::link_update(&order(OrderStatus::Completed), &invoice(), Role::Employee, None)
                .unwrap();
        assert_eq!(update.status, None);
        assert!(update.receipt.is_some());
    }

    #[test]
    fn test_received_order_yields_no_update() {
        let received = order(OrderStatus::Delivered).with_receipt(true, Some(Utc::now()), None, Some(invoice()));
        assert!(InvoiceReconciler::link_update(&received, &invoice(), Role::Manager, None).is_none());
    }

    #[test]
    fn test_receipt_taken_compares_stamp() {
        let update =
            InvoiceReconciler::link_update(&order(OrderStatus::Delivery), &invoice(), Role::Employee, None)
                .unwrap();
        let mut stored = order(OrderStatus::Delivery);
        stored.apply(&update);
        assert!(receipt_taken(&stored, &update));

        let earlier = Utc::now() - chrono::Duration::minutes(5);
        let other = order(OrderStatus::Delivery).with_receipt(true, Some(earlier), None, Some(invoice()));
        assert!(!receipt_taken(&other, &update));
        assert!(!receipt_taken(&stored, &OrderUpdate::new()));
    }
}
