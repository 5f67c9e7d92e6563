//! Shared fixtures for engine and scheduler tests
//!
//! Orders, credentials and roles live in an in-memory SQLite store; the
//! courier is a [`ScriptedCourier`] answering from per-account scripts.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use ordersync_core::config::Config;
use ordersync_core::domain::{
    AccountUsername, CourierToken, DeliveryAccountToken, InvoiceId, Order, OrderId, OrderStatus,
    OrderUpdate, PartnerName, PartnerOrderId, ReceiptUpdate, Role, TrackingNumber, UserId,
};
use ordersync_core::ports::{
    ICourierApi, IOrderStore, ITokenStore, OrderFilter, RemoteError, RemoteInvoice, RemoteOrder,
    StoreError,
};
use ordersync_store::{DatabasePool, SqliteOrderStore};
use ordersync_sync::SyncEngine;

// ============================================================================
// Identifiers
// ============================================================================

pub const MANAGER: &str = "mgr";
pub const EMP1: &str = "emp1";
pub const EMP2: &str = "emp2";
pub const SELLER1: &str = "seller-1";
pub const SELLER2: &str = "seller-2";
pub const MANAGER_ACCOUNT: &str = "mgr-account";

pub const OUT_FOR_DELIVERY: &str = "قيد التوصيل الى الزبون (في عهدة المندوب)";
pub const INVOICE_DELIVERED: &str = "تم تسليم الفاتورة";

pub fn uid(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn oid(id: &str) -> OrderId {
    OrderId::new(id).unwrap()
}

pub fn inv(id: &str) -> InvoiceId {
    InvoiceId::new(id).unwrap()
}

pub fn account(name: &str) -> AccountUsername {
    AccountUsername::new(name).unwrap()
}

pub fn alwaseet() -> PartnerName {
    PartnerName::new("alwaseet").unwrap()
}

pub fn token(account_name: &str, owner: Option<&str>) -> DeliveryAccountToken {
    DeliveryAccountToken::new(
        alwaseet(),
        account(account_name),
        owner.map(uid),
        CourierToken::new(format!("secret-{account_name}")),
    )
}

/// A processing courier order; the partner id equals the tracking number
pub fn courier_order(id: &str, tracking: &str, owner: &str, account_name: Option<&str>) -> Order {
    Order::new(oid(id), TrackingNumber::new(tracking).unwrap(), uid(owner))
        .with_delivery_partner(alwaseet(), Some(PartnerOrderId::new(tracking).unwrap()))
        .with_delivery_account(account_name.map(account))
        .with_status(OrderStatus::Processing)
}

pub fn local_order(id: &str, owner: &str) -> Order {
    Order::new(oid(id), TrackingNumber::generate_local(), uid(owner))
}

pub fn remote(tracking: &str, raw_status: &str) -> RemoteOrder {
    RemoteOrder::new(
        PartnerOrderId::new(tracking).unwrap(),
        TrackingNumber::new(tracking).unwrap(),
        raw_status,
    )
}

pub fn received_invoice(id: &str) -> RemoteInvoice {
    RemoteInvoice {
        id: inv(id),
        status: "received".to_string(),
        orders_count: None,
    }
}

// ============================================================================
// Store setup
// ============================================================================

/// Fresh store with roles and one credential per employee
///
/// `emp1` owns `seller-1`, `emp2` owns `seller-2`, `mgr` is a manager
/// without a credential of their own.
pub async fn seeded_store() -> SqliteOrderStore {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = SqliteOrderStore::new(pool.pool().clone());

    store.set_role(&uid(MANAGER), Role::Manager).await.unwrap();
    store.set_role(&uid(EMP1), Role::Employee).await.unwrap();
    store.set_role(&uid(EMP2), Role::Employee).await.unwrap();
    store.save_token(&token(SELLER1, Some(EMP1))).await.unwrap();
    store.save_token(&token(SELLER2, Some(EMP2))).await.unwrap();
    store
}

pub async fn insert(store: &SqliteOrderStore, orders: &[Order]) {
    for order in orders {
        store.upsert(order).await.unwrap();
    }
}

pub async fn stored(store: &SqliteOrderStore, id: &str) -> Option<Order> {
    store.get(&oid(id)).await.unwrap()
}

/// Engine over `store` for every port but the courier
pub fn engine(store: &SqliteOrderStore, courier: Arc<ScriptedCourier>, config: &Config) -> SyncEngine {
    let shared = Arc::new(store.clone());
    SyncEngine::new(shared.clone(), courier, shared.clone(), shared, config).expect("engine")
}

// ============================================================================
// ScriptedCourier
// ============================================================================

#[derive(Default)]
struct Script {
    orders: HashMap<String, Result<Vec<RemoteOrder>, RemoteError>>,
    details: HashMap<String, RemoteOrder>,
    invoices: HashMap<String, Vec<RemoteInvoice>>,
    invoice_orders: HashMap<String, Vec<RemoteOrder>>,
    calls: Vec<String>,
}

/// Courier fake answering from per-account scripts and logging every call
///
/// Unscripted accounts list no orders and no invoices.
#[derive(Default)]
pub struct ScriptedCourier {
    script: Mutex<Script>,
}

impl ScriptedCourier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_orders(&self, account_name: &str, orders: Vec<RemoteOrder>) {
        self.script.lock().unwrap().orders.insert(account_name.to_string(), Ok(orders));
    }

    pub fn fail_orders(&self, account_name: &str, error: RemoteError) {
        self.script.lock().unwrap().orders.insert(account_name.to_string(), Err(error));
    }

    pub fn set_detail(&self, order: RemoteOrder) {
        self.script
            .lock()
            .unwrap()
            .details
            .insert(order.tracking_number.to_string(), order);
    }

    pub fn set_invoices(&self, account_name: &str, invoices: Vec<RemoteInvoice>) {
        self.script
            .lock()
            .unwrap()
            .invoices
            .insert(account_name.to_string(), invoices);
    }

    pub fn set_invoice_orders(&self, invoice_id: &str, orders: Vec<RemoteOrder>) {
        self.script
            .lock()
            .unwrap()
            .invoice_orders
            .insert(invoice_id.to_string(), orders);
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.script.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ICourierApi for ScriptedCourier {
    async fn list_orders(&self, token: &DeliveryAccountToken) -> Result<Vec<RemoteOrder>, RemoteError> {
        let account_name = token.account_username().to_string();
        self.record(format!("list_orders:{account_name}"));
        self.script
            .lock()
            .unwrap()
            .orders
            .get(&account_name)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_order_detail(
        &self,
        token: &DeliveryAccountToken,
        tracking_number: &TrackingNumber,
    ) -> Result<Option<RemoteOrder>, RemoteError> {
        self.record(format!("order_detail:{}:{tracking_number}", token.account_username()));
        Ok(self
            .script
            .lock()
            .unwrap()
            .details
            .get(tracking_number.as_str())
            .cloned())
    }

    async fn list_invoices(&self, token: &DeliveryAccountToken) -> Result<Vec<RemoteInvoice>, RemoteError> {
        let account_name = token.account_username().to_string();
        self.record(format!("list_invoices:{account_name}"));
        Ok(self
            .script
            .lock()
            .unwrap()
            .invoices
            .get(&account_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_invoice_orders(
        &self,
        _token: &DeliveryAccountToken,
        invoice_id: &InvoiceId,
    ) -> Result<Vec<RemoteOrder>, RemoteError> {
        self.record(format!("invoice_orders:{invoice_id}"));
        Ok(self
            .script
            .lock()
            .unwrap()
            .invoice_orders
            .get(invoice_id.as_str())
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Port wrappers for failure injection
// ============================================================================

/// Token store whose per-account lookup no longer finds one account
///
/// Listing still returns it, as if it was revoked mid-pass.
pub struct RevokingTokens {
    pub inner: SqliteOrderStore,
    pub revoked: AccountUsername,
}

#[async_trait]
impl ITokenStore for RevokingTokens {
    async fn list_tokens(&self, partner: &PartnerName) -> anyhow::Result<Vec<DeliveryAccountToken>> {
        self.inner.list_tokens(partner).await
    }

    async fn get_token(
        &self,
        partner: &PartnerName,
        account_name: &AccountUsername,
    ) -> anyhow::Result<Option<DeliveryAccountToken>> {
        if account_name == &self.revoked {
            return Ok(None);
        }
        self.inner.get_token(partner, account_name).await
    }
}

/// Order store that reports a write conflict for one order
pub struct ConflictingStore {
    pub inner: SqliteOrderStore,
    pub conflict_on: OrderId,
}

#[async_trait]
impl IOrderStore for ConflictingStore {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        self.inner.get(id).await
    }

    async fn query(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        self.inner.query(filter).await
    }

    async fn find_by_tracking_number(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<Option<Order>, StoreError> {
        self.inner.find_by_tracking_number(tracking_number).await
    }

    async fn find_by_partner_order_id(
        &self,
        partner: &PartnerName,
        partner_order_id: &PartnerOrderId,
    ) -> Result<Option<Order>, StoreError> {
        self.inner.find_by_partner_order_id(partner, partner_order_id).await
    }

    async fn upsert(&self, order: &Order) -> Result<(), StoreError> {
        self.inner.upsert(order).await
    }

    async fn apply_update(&self, id: &OrderId, update: &OrderUpdate) -> Result<Order, StoreError> {
        if id == &self.conflict_on {
            return Err(StoreError::Conflict(id.clone()));
        }
        self.inner.apply_update(id, update).await
    }

    async fn delete(&self, id: &OrderId) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }

    async fn delete_if_deletable(&self, id: &OrderId) -> Result<bool, StoreError> {
        self.inner.delete_if_deletable(id).await
    }
}

/// Courier that records a receipt on the local order while its detail is
/// being looked up, as a UI user confirming receipt mid-pass would
pub struct ReceiptDuringDetail {
    pub inner: Arc<ScriptedCourier>,
    pub store: SqliteOrderStore,
    pub invoice_id: InvoiceId,
}

#[async_trait]
impl ICourierApi for ReceiptDuringDetail {
    async fn list_orders(&self, token: &DeliveryAccountToken) -> Result<Vec<RemoteOrder>, RemoteError> {
        self.inner.list_orders(token).await
    }

    async fn get_order_detail(
        &self,
        token: &DeliveryAccountToken,
        tracking_number: &TrackingNumber,
    ) -> Result<Option<RemoteOrder>, RemoteError> {
        if let Some(order) = self.store.find_by_tracking_number(tracking_number).await.unwrap() {
            let update = OrderUpdate {
                receipt: Some(ReceiptUpdate {
                    received_at: Utc::now(),
                    received_by: Some(uid(MANAGER)),
                    invoice_id: self.invoice_id.clone(),
                }),
                ..OrderUpdate::new()
            };
            self.store.apply_update(order.id(), &update).await.unwrap();
        }
        self.inner.get_order_detail(token, tracking_number).await
    }

    async fn list_invoices(&self, token: &DeliveryAccountToken) -> Result<Vec<RemoteInvoice>, RemoteError> {
        self.inner.list_invoices(token).await
    }

    async fn get_invoice_orders(
        &self,
        token: &DeliveryAccountToken,
        invoice_id: &InvoiceId,
    ) -> Result<Vec<RemoteOrder>, RemoteError> {
        self.inner.get_invoice_orders(token, invoice_id).await
    }
}
