//! Order reconciliation engine
//!
//! The [`SyncEngine`] reconciles the local order store with the courier's
//! view of the same orders, on behalf of one acting user per pass.
//!
//! ## Pass Flow
//!
//! 1. **Collect credentials**: snapshot the partner's usable credentials
//! 2. **Load scope**: explicit order ids or every order the actor may see
//! 3. **Group**: resolve ownership per order and group by sync credential
//! 4. **Per group** (concurrently): re-validate the credential, claim it in
//!    the in-flight registry, fetch remote state, diff, link the courier
//!    invoice the order carries, persist one update per order, consult the
//!    deletion guard for orders the courier no longer lists
//! 5. **Publish**: `InvoiceLinked`, `OrdersDeleted` and `PassCompleted`
//!
//! Groups run concurrently and each order's diff, link and write happen
//! together, so the pass-level [`PassState`] goes straight from
//! `FetchingRemote` to a terminal state on full passes. Invoice-only passes
//! use `ReconcilingInvoices` instead of `FetchingRemote`.
//!
//! ## Unlisted Orders
//!
//! Only the account recorded on an order can confirm it missing, through a
//! detail lookup. Any other account reports the order as `DeletionBlocked`
//! when the deletion guard protects it and `UnconfirmedMissing` otherwise.
//! Deletion itself is a conditional store delete that re-checks the
//! protected fields.
//!
//! A pass never fails as a whole. Problems are recorded per credential group
//! or per order and the remaining groups and orders carry on.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use ordersync_core::config::Config;
use ordersync_core::domain::{
    ActingUser, CredentialKey, DeliveryAccountToken, InvoiceId, Order, OrderId, OrderStatus,
    OrderUpdate, PartnerName, PartnerOrderId, Role, TrackingNumber, UserId,
};
use ordersync_core::ports::{
    resolve_acting_user, ICourierApi, IOrderStore, ITokenStore, IUserDirectory, OrderFilter,
    RemoteOrder, StoreError,
};
use ordersync_policy::{
    AccountTokenRegistry, DeletionDecision, OwnershipReason, OwnershipResolver, SafeDeletionGuard,
    StatusMap, StatusMapping,
};

use crate::events::{SyncEvent, SyncEventBus};
use crate::inflight::InFlightRegistry;
use crate::invoice::{receipt_taken, InvoiceReconciler};
use crate::pass::{
    InvoiceLink, OnDemandReport, PassDepth, PassError, PassState, SkipReason, SkippedOrder,
    SyncPassResult, SyncScope, SyncTrigger, UnmappedStatus,
};
use crate::SyncError;

// ============================================================================
// Credential groups
// ============================================================================

/// Orders that sync through the same credential
struct CredentialGroup {
    token: DeliveryAccountToken,
    orders: Vec<Order>,
}

/// What one credential group contributed to the pass
#[derive(Default)]
struct GroupOutcome {
    attempted: bool,
    orders_updated: usize,
    skipped: Vec<SkippedOrder>,
    deletions: Vec<OrderId>,
    links: Vec<InvoiceLink>,
    already_linked: usize,
    unmapped: Vec<UnmappedStatus>,
    errors: Vec<PassError>,
}

impl GroupOutcome {
    fn skip_all(orders: &[Order], reason: SkipReason) -> Self {
        Self {
            skipped: orders
                .iter()
                .map(|o| SkippedOrder {
                    order_id: o.id().clone(),
                    reason,
                })
                .collect(),
            ..Self::default()
        }
    }

    fn skip(&mut self, order_id: OrderId, reason: SkipReason) {
        self.skipped.push(SkippedOrder { order_id, reason });
    }

    fn record_link(&mut self, invoice_id: &InvoiceId, order_id: OrderId) {
        match self.links.iter_mut().find(|l| &l.invoice_id == invoice_id) {
            Some(link) => link.order_ids.push(order_id),
            None => {
                let mut link = InvoiceLink::new(invoice_id.clone());
                link.order_ids.push(order_id);
                self.links.push(link);
            }
        }
    }
}

fn absorb(result: &mut SyncPassResult, outcome: GroupOutcome) {
    if outcome.attempted {
        result.credentials_attempted += 1;
    }
    result.orders_updated += outcome.orders_updated;
    result.orders_skipped.extend(outcome.skipped);
    result.deletions_applied.extend(outcome.deletions);
    result.invoices_linked.extend(outcome.links);
    result.orders_already_linked += outcome.already_linked;
    result.unmapped_statuses.extend(outcome.unmapped);
    result.errors.extend(outcome.errors);
}

fn advance(result: &mut SyncPassResult, state: PassState) {
    debug!(pass_id = %result.pass_id, from = %result.state, to = %state, "Pass state changed");
    result.state = state;
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Runs reconciliation passes between the order store and the courier
pub struct SyncEngine {
    orders: Arc<dyn IOrderStore>,
    courier: Arc<dyn ICourierApi>,
    users: Arc<dyn IUserDirectory>,
    registry: AccountTokenRegistry,
    status_map: Arc<StatusMap>,
    invoices: InvoiceReconciler,
    events: SyncEventBus,
    in_flight: InFlightRegistry,
    partner: PartnerName,
    auto_delete: bool,
}

impl SyncEngine {
    /// Creates an engine for the configured delivery partner
    ///
    /// # Errors
    ///
    /// Returns an error if the configured partner name is invalid.
    pub fn new(
        orders: Arc<dyn IOrderStore>,
        courier: Arc<dyn ICourierApi>,
        tokens: Arc<dyn ITokenStore>,
        users: Arc<dyn IUserDirectory>,
        config: &Config,
    ) -> Result<Self, SyncError> {
        let partner = PartnerName::new(config.courier.partner.clone())?;
        let status_map = Arc::new(StatusMap::from_config(&config.status_mapping));
        let invoices = InvoiceReconciler::new(
            Arc::clone(&orders),
            Arc::clone(&courier),
            Arc::clone(&users),
            Arc::clone(&status_map),
            partner.clone(),
        );

        info!(
            partner = %partner,
            status_entries = status_map.len(),
            auto_delete = config.sync.auto_delete,
            "Sync engine created"
        );

        Ok(Self {
            orders,
            courier,
            users,
            registry: AccountTokenRegistry::new(tokens),
            status_map,
            invoices,
            events: SyncEventBus::default(),
            in_flight: InFlightRegistry::new(),
            partner,
            auto_delete: config.sync.auto_delete,
        })
    }

    /// Publishes pass outcomes on an existing bus
    pub fn with_event_bus(mut self, events: SyncEventBus) -> Self {
        self.events = events;
        self
    }

    /// Shares an in-flight registry with other engines
    pub fn with_in_flight(mut self, in_flight: InFlightRegistry) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub fn events(&self) -> &SyncEventBus {
        &self.events
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    pub fn registry(&self) -> &AccountTokenRegistry {
        &self.registry
    }

    pub fn invoices(&self) -> &InvoiceReconciler {
        &self.invoices
    }

    pub fn partner(&self) -> &PartnerName {
        &self.partner
    }

    /// Looks up the user's role; unknown users act as employees
    pub async fn acting_user(&self, user: UserId) -> ActingUser {
        resolve_acting_user(self.users.as_ref(), user).await
    }

    // ------------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------------

    /// Runs one pass for `actor`
    #[tracing::instrument(skip_all, fields(trigger = %trigger, actor = %actor.id()))]
    pub async fn run_pass(
        &self,
        trigger: SyncTrigger,
        scope: SyncScope,
        actor: &ActingUser,
    ) -> SyncPassResult {
        let started = Instant::now();
        let mut result = SyncPassResult::new(trigger, actor.id().clone());
        let depth = result.depth;
        info!(pass_id = %result.pass_id, depth = %depth, "Sync pass started");

        advance(&mut result, PassState::CollectingCredentials);
        let snapshot = match self.registry.snapshot(&self.partner).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to collect credentials");
                result.errors.push(PassError::credential(None, e.to_string()));
                return self.finish(result, started);
            }
        };

        let orders = match self.load_scope(&scope, actor, &mut result).await {
            Ok(orders) => orders,
            Err(e) => {
                warn!(error = %e, "Failed to load orders");
                result.errors.push(PassError::store(None, None, &e));
                return self.finish(result, started);
            }
        };

        let resolver = OwnershipResolver::new(&snapshot);
        let groups = self.group_by_credential(orders, actor, resolver, &mut result);
        debug!(groups = groups.len(), "Orders grouped by credential");

        if !groups.is_empty() {
            let next = match depth {
                PassDepth::Full => PassState::FetchingRemote,
                PassDepth::InvoicesOnly => PassState::ReconcilingInvoices,
            };
            advance(&mut result, next);

            let outcomes = join_all(
                groups
                    .into_values()
                    .map(|group| self.run_group(group, actor, depth, resolver)),
            )
            .await;
            for outcome in outcomes {
                absorb(&mut result, outcome);
            }
        }

        self.finish(result, started)
    }

    /// Runs one all-visible pass per user holding a usable credential
    ///
    /// Passes run concurrently; a credential shared by several principals is
    /// synced by whichever pass claims it first.
    #[tracing::instrument(skip_all, fields(trigger = %trigger))]
    pub async fn run_scheduled(&self, trigger: SyncTrigger) -> Vec<SyncPassResult> {
        let principals = match self.registry.principals(&self.partner).await {
            Ok(principals) => principals,
            Err(e) => {
                warn!(error = %e, "Failed to list sync principals");
                return Vec::new();
            }
        };
        if principals.is_empty() {
            debug!("No user holds a usable credential");
            return Vec::new();
        }

        let mut actors = Vec::with_capacity(principals.len());
        for user in principals {
            actors.push(self.acting_user(user).await);
        }

        join_all(
            actors
                .iter()
                .map(|actor| self.run_pass(trigger, SyncScope::AllVisible, actor)),
        )
        .await
    }

    /// Runs a manual pass for a user and summarizes it for display
    pub async fn run_on_demand(&self, user: UserId, scope: SyncScope) -> OnDemandReport {
        let actor = self.acting_user(user).await;
        let result = self.run_pass(SyncTrigger::Manual, scope, &actor).await;
        OnDemandReport::from(&result)
    }

    // ------------------------------------------------------------------------
    // Scope and grouping
    // ------------------------------------------------------------------------

    async fn load_scope(
        &self,
        scope: &SyncScope,
        actor: &ActingUser,
        result: &mut SyncPassResult,
    ) -> Result<Vec<Order>, StoreError> {
        let ids = match scope {
            SyncScope::AllVisible => {
                let mut filter = OrderFilter::new()
                    .with_delivery_partner(self.partner.clone())
                    .externally_tracked();
                if !actor.is_manager() {
                    filter = filter.with_created_by(actor.id().clone());
                }
                return self.orders.query(&filter).await;
            }
            SyncScope::Orders(ids) => ids,
        };

        let mut seen: HashSet<&OrderId> = HashSet::new();
        let mut orders = Vec::new();
        for id in ids {
            if !seen.insert(id) {
                continue;
            }
            match self.orders.get(id).await {
                Ok(None) => result.skip(id.clone(), SkipReason::NotFound),
                Ok(Some(order)) if order.is_local() => result.skip(id.clone(), SkipReason::LocalOrder),
                Ok(Some(order)) if order.delivery_partner() != &self.partner => {
                    result.skip(id.clone(), SkipReason::OtherPartner)
                }
                Ok(Some(order)) => orders.push(order),
                Err(e) => {
                    warn!(order_id = %id, error = %e, "Failed to load order");
                    result.errors.push(PassError::store(None, Some(id.clone()), &e));
                }
            }
        }
        Ok(orders)
    }

    fn group_by_credential(
        &self,
        orders: Vec<Order>,
        actor: &ActingUser,
        resolver: OwnershipResolver<'_>,
        result: &mut SyncPassResult,
    ) -> BTreeMap<CredentialKey, CredentialGroup> {
        let mut groups: BTreeMap<CredentialKey, CredentialGroup> = BTreeMap::new();

        for order in orders {
            let ownership = resolver.resolve(&order, actor);
            if !ownership.can_sync {
                let reason = match ownership.reason {
                    OwnershipReason::OwnerWithoutCredential => SkipReason::NoCredential,
                    _ => SkipReason::OwnershipDenied,
                };
                result.skip(order.id().clone(), reason);
                continue;
            }
            let Some(token) = ownership.sync_token else {
                result.skip(order.id().clone(), SkipReason::NoCredential);
                continue;
            };

            let key = token.key();
            groups
                .entry(key)
                .or_insert_with(|| CredentialGroup {
                    token,
                    orders: Vec::new(),
                })
                .orders
                .push(order);
        }

        groups
    }

    // ------------------------------------------------------------------------
    // Per-group work
    // ------------------------------------------------------------------------

    #[tracing::instrument(skip_all, fields(credential = %group.token.key(), orders = group.orders.len()))]
    async fn run_group(
        &self,
        group: CredentialGroup,
        actor: &ActingUser,
        depth: PassDepth,
        resolver: OwnershipResolver<'_>,
    ) -> GroupOutcome {
        let CredentialGroup { token, orders } = group;

        if !self.registry.is_valid(&token).await {
            info!("Credential no longer valid, skipping group");
            return GroupOutcome::skip_all(&orders, SkipReason::CredentialInvalid);
        }

        let Some(_claim) = self.in_flight.try_acquire(token.key()) else {
            info!("Credential already syncing, skipping group");
            return GroupOutcome::skip_all(&orders, SkipReason::Coalesced);
        };

        let mut outcome = GroupOutcome {
            attempted: true,
            ..GroupOutcome::default()
        };

        match depth {
            PassDepth::Full => {
                self.sync_orders(&token, orders, actor, resolver, &mut outcome)
                    .await
            }
            PassDepth::InvoicesOnly => {
                match self
                    .invoices
                    .reconcile_orders(&token, &orders, Some(actor.id()))
                    .await
                {
                    Ok(reconciled) => {
                        outcome.orders_updated += reconciled.linked_orders();
                        outcome.links = reconciled.linked;
                        outcome.already_linked = reconciled.already_linked;
                        outcome.errors.extend(reconciled.errors);
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to list invoices");
                        outcome.errors.push(PassError::remote(token.key(), None, &e));
                    }
                }
            }
        }

        outcome
    }

    /// Full-depth work for one credential group
    async fn sync_orders(
        &self,
        token: &DeliveryAccountToken,
        orders: Vec<Order>,
        actor: &ActingUser,
        resolver: OwnershipResolver<'_>,
        outcome: &mut GroupOutcome,
    ) {
        let key = token.key();

        let remote = match self.courier.list_orders(token).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "Failed to list remote orders");
                outcome.errors.push(PassError::remote(key, None, &e));
                return;
            }
        };
        debug!(remote = remote.len(), local = orders.len(), "Remote orders fetched");

        let by_partner_id: HashMap<&PartnerOrderId, &RemoteOrder> =
            remote.iter().map(|r| (&r.id, r)).collect();
        let by_tracking: HashMap<&TrackingNumber, &RemoteOrder> =
            remote.iter().map(|r| (&r.tracking_number, r)).collect();

        let guard = SafeDeletionGuard::new(resolver);
        let mut matched: Vec<(Order, RemoteOrder)> = Vec::with_capacity(orders.len());

        for order in orders {
            let listed = order
                .delivery_partner_order_id()
                .and_then(|id| by_partner_id.get(id))
                .or_else(|| by_tracking.get(order.tracking_number()))
                .map(|r| (*r).clone());
            if let Some(remote_order) = listed {
                matched.push((order, remote_order));
                continue;
            }

            // Only the account that holds an order can vouch for its absence
            if order.delivery_account() != Some(token.account_username()) {
                let reason = match guard.evaluate(&order, actor) {
                    DeletionDecision::Deny(denial) => SkipReason::DeletionBlocked(denial),
                    DeletionDecision::Allow => SkipReason::UnconfirmedMissing,
                };
                debug!(order_id = %order.id(), reason = %reason, "Order not listed by this account, retained");
                outcome.skip(order.id().clone(), reason);
                continue;
            }

            match self.courier.get_order_detail(token, order.tracking_number()).await {
                Ok(Some(remote_order)) => matched.push((order, remote_order)),
                Ok(None) => self.remove_missing(&order, actor, guard, &key, outcome).await,
                Err(e) => {
                    warn!(order_id = %order.id(), error = %e, "Failed to confirm missing order");
                    outcome
                        .errors
                        .push(PassError::remote(key.clone(), Some(order.id().clone()), &e));
                }
            }
        }

        debug!(state = %PassState::Diffing, matched = matched.len(), "Diffing orders");
        debug!(state = %PassState::ApplyingUpdates, "Applying order updates");
        let mut roles: HashMap<UserId, Role> = HashMap::new();

        for (order, remote_order) in matched {
            let mut update = self.diff(&order, &remote_order, outcome);

            match remote_order.invoice_id.as_ref() {
                Some(_) if order.receipt_received() => outcome.already_linked += 1,
                Some(invoice_id) => {
                    let role = match roles.get(order.created_by()) {
                        Some(role) => *role,
                        None => {
                            let role = self.invoices.owner_role(order.created_by()).await;
                            roles.insert(order.created_by().clone(), role);
                            role
                        }
                    };
                    if let Some(link) =
                        InvoiceReconciler::link_update(&order, invoice_id, role, Some(actor.id()))
                    {
                        update.merge(link);
                    }
                }
                None => {}
            }

            if update.is_empty() {
                continue;
            }

            match self.orders.apply_update(order.id(), &update).await {
                Ok(stored) => {
                    outcome.orders_updated += 1;
                    if let Some(receipt) = update.receipt.as_ref() {
                        if receipt_taken(&stored, &update) {
                            outcome.record_link(&receipt.invoice_id, order.id().clone());
                        } else {
                            debug!(order_id = %order.id(), "Receipt recorded concurrently, link kept");
                            outcome.already_linked += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(order_id = %order.id(), error = %e, "Failed to persist order update");
                    outcome
                        .errors
                        .push(PassError::store(Some(key.clone()), Some(order.id().clone()), &e));
                }
            }
        }
    }

    /// Status part of an order's update
    fn diff(&self, order: &Order, remote: &RemoteOrder, outcome: &mut GroupOutcome) -> OrderUpdate {
        let mut update = OrderUpdate::new();

        if order.delivery_status() != Some(remote.raw_status.as_str()) {
            update.delivery_status = Some(remote.raw_status.clone());
        }

        match self.status_map.map(&remote.raw_status) {
            StatusMapping::Mapped(status) => {
                if order.status() != OrderStatus::Completed && order.status() != status {
                    update.status = Some(status);
                }
            }
            StatusMapping::Unmapped => {
                debug!(order_id = %order.id(), raw_status = %remote.raw_status, "Unmapped courier status");
                outcome.unmapped.push(UnmappedStatus {
                    order_id: order.id().clone(),
                    raw_status: remote.raw_status.clone(),
                });
            }
        }

        update
    }

    /// Handles an order the holding account no longer knows
    async fn remove_missing(
        &self,
        order: &Order,
        actor: &ActingUser,
        guard: SafeDeletionGuard<'_>,
        key: &CredentialKey,
        outcome: &mut GroupOutcome,
    ) {
        if let DeletionDecision::Deny(denial) = guard.evaluate(order, actor) {
            info!(order_id = %order.id(), reason = %denial, "Order gone remotely, deletion blocked");
            outcome.skip(order.id().clone(), SkipReason::DeletionBlocked(denial));
            return;
        }
        if !self.auto_delete {
            info!(order_id = %order.id(), "Order gone remotely, auto-delete disabled");
            outcome.skip(order.id().clone(), SkipReason::AutoDeleteDisabled);
            return;
        }

        // Re-checks the protected fields in the same statement as the delete
        match self.orders.delete_if_deletable(order.id()).await {
            Ok(true) => {
                info!(order_id = %order.id(), "Order gone remotely, deleted");
                outcome.deletions.push(order.id().clone());
            }
            Ok(false) => {
                info!(order_id = %order.id(), "Order changed during pass, not deleted");
                outcome.skip(order.id().clone(), SkipReason::ChangedDuringPass);
            }
            Err(e) => {
                warn!(order_id = %order.id(), error = %e, "Failed to delete order");
                outcome
                    .errors
                    .push(PassError::store(Some(key.clone()), Some(order.id().clone()), &e));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------------

    fn finish(&self, mut result: SyncPassResult, started: Instant) -> SyncPassResult {
        result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let state = if result.errors.is_empty() {
            PassState::Completed
        } else {
            PassState::PartiallyFailed
        };
        advance(&mut result, state);

        info!(
            pass_id = %result.pass_id,
            state = %result.state,
            credentials = result.credentials_attempted,
            updated = result.orders_updated,
            skipped = result.orders_skipped.len(),
            deleted = result.deletions_applied.len(),
            linked = result.orders_linked(),
            already_linked = result.orders_already_linked,
            unmapped = result.unmapped_statuses.len(),
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "Sync pass finished"
        );
        for error in &result.errors {
            debug!(error = %error, "Pass error");
        }

        for link in &result.invoices_linked {
            self.events.publish(SyncEvent::InvoiceLinked(link.clone()));
        }
        if !result.deletions_applied.is_empty() {
            self.events.publish(SyncEvent::OrdersDeleted {
                order_ids: result.deletions_applied.clone(),
            });
        }
        self.events.publish(SyncEvent::PassCompleted(result.clone()));

        result
    }
}
