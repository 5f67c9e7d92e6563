//! Per-order ownership decisions
//!
//! [`OwnershipResolver`] is the single authority consulted before any remote
//! call or deletion for an order. It works on a [`CredentialSnapshot`] taken
//! at the start of a pass and is rebuilt for every pass, so a credential
//! revoked between passes is never used.

use serde::{Deserialize, Serialize};

use ordersync_core::domain::{ActingUser, CredentialKey, DeliveryAccountToken, Order};

use crate::registry::CredentialSnapshot;

/// Why an [`OwnershipContext`] grants or withholds permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipReason {
    /// The actor is a manager
    Manager,
    /// The actor created the order and holds a usable credential for it
    Owner,
    /// The actor created the order but holds no usable credential for it
    OwnerWithoutCredential,
    /// The order belongs to someone else
    NotOwner,
}

impl std::fmt::Display for OwnershipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OwnershipReason::Manager => "manager",
            OwnershipReason::Owner => "owner",
            OwnershipReason::OwnerWithoutCredential => "owner_without_credential",
            OwnershipReason::NotOwner => "not_owner",
        };
        f.write_str(s)
    }
}

/// Permissions of one actor over one order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipContext {
    pub can_view: bool,
    pub can_sync: bool,
    pub can_delete: bool,
    pub reason: OwnershipReason,
    /// Credential remote calls for this order must use
    pub sync_token: Option<DeliveryAccountToken>,
}

impl OwnershipContext {
    fn denied() -> Self {
        Self {
            can_view: false,
            can_sync: false,
            can_delete: false,
            reason: OwnershipReason::NotOwner,
            sync_token: None,
        }
    }

    /// Key of the sync credential, if any
    pub fn sync_key(&self) -> Option<CredentialKey> {
        self.sync_token.as_ref().map(DeliveryAccountToken::key)
    }
}

/// Decides view/sync/delete permissions per (order, actor)
#[derive(Debug, Clone, Copy)]
pub struct OwnershipResolver<'a> {
    credentials: &'a CredentialSnapshot,
}

impl<'a> OwnershipResolver<'a> {
    pub fn new(credentials: &'a CredentialSnapshot) -> Self {
        Self { credentials }
    }

    pub fn resolve(&self, order: &Order, actor: &ActingUser) -> OwnershipContext {
        if actor.is_manager() {
            return OwnershipContext {
                can_view: true,
                can_sync: true,
                can_delete: true,
                reason: OwnershipReason::Manager,
                sync_token: self.manager_token(order, actor),
            };
        }

        if order.created_by() != actor.id() {
            return OwnershipContext::denied();
        }

        let sync_token = self.owner_token(order, actor);
        let has_credential = sync_token.is_some();
        OwnershipContext {
            can_view: true,
            can_sync: has_credential,
            can_delete: has_credential,
            reason: if has_credential {
                OwnershipReason::Owner
            } else {
                OwnershipReason::OwnerWithoutCredential
            },
            sync_token,
        }
    }

    /// Manager's own credential first, then the owner's
    ///
    /// An order that records its courier account only ever resolves to that
    /// account's credential.
    fn manager_token(&self, order: &Order, actor: &ActingUser) -> Option<DeliveryAccountToken> {
        if let Some(account) = order.delivery_account() {
            return self.credentials.for_account(account).cloned();
        }
        self.credentials
            .for_user(actor.id())
            .or_else(|| self.credentials.resolve(order.created_by()))
            .cloned()
    }

    /// The acting owner's credential (or the shared one)
    ///
    /// When the order records its courier account, the owner's credential
    /// is used only if it is that account.
    fn owner_token(&self, order: &Order, actor: &ActingUser) -> Option<DeliveryAccountToken> {
        match order.delivery_account() {
            Some(account) => self
                .credentials
                .for_account(account)
                .filter(|t| t.is_shared() || t.user_id() == Some(actor.id()))
                .cloned(),
            None => self.credentials.resolve(actor.id()).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ordersync_core::domain::{
        AccountUsername, CourierToken, OrderId, PartnerName, PartnerOrderId, TrackingNumber, UserId,
    };

    use super::*;

    fn uid(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn token(account: &str, user: Option<&str>) -> DeliveryAccountToken {
        DeliveryAccountToken::new(
            PartnerName::new("alwaseet").unwrap(),
            AccountUsername::new(account).unwrap(),
            user.map(uid),
            CourierToken::new(format!("secret-{account}")),
        )
    }

    fn snapshot(tokens: Vec<DeliveryAccountToken>) -> CredentialSnapshot {
        CredentialSnapshot::from_tokens(tokens, Utc::now())
    }

    fn order(owner: &str, account: Option<&str>) -> Order {
        Order::new(
            OrderId::new(format!("o-{owner}")).unwrap(),
            TrackingNumber::new("99319996").unwrap(),
            uid(owner),
        )
        .with_delivery_partner(
            PartnerName::new("alwaseet").unwrap(),
            Some(PartnerOrderId::new("99319996").unwrap()),
        )
        .with_delivery_account(account.map(|a| AccountUsername::new(a).unwrap()))
    }

    #[test]
    fn test_manager_gets_everything_with_own_token() {
        let creds = snapshot(vec![token("boss", Some("mgr")), token("seller-1", Some("emp1"))]);
        let ctx = OwnershipResolver::new(&creds).resolve(&order("emp1", None), &ActingUser::manager(uid("mgr")));
        assert!(ctx.can_view && ctx.can_sync && ctx.can_delete);
        assert_eq!(ctx.reason, OwnershipReason::Manager);
        assert_eq!(ctx.sync_token.unwrap().account_username().as_str(), "boss");
    }

    #[test]
    fn test_manager_falls_back_to_owner_token() {
        let creds = snapshot(vec![token("seller-1", Some("emp1"))]);
        let ctx = OwnershipResolver::new(&creds).resolve(&order("emp1", None), &ActingUser::manager(uid("mgr")));
        assert!(ctx.can_sync);
        assert_eq!(ctx.sync_token.unwrap().account_username().as_str(), "seller-1");
    }

    #[test]
    fn test_manager_without_any_token_keeps_permissions() {
        let creds = snapshot(vec![]);
        let ctx = OwnershipResolver::new(&creds).resolve(&order("emp1", None), &ActingUser::manager(uid("mgr")));
        assert!(ctx.can_view && ctx.can_sync && ctx.can_delete);
        assert!(ctx.sync_token.is_none());
    }

    #[test]
    fn test_owner_with_credential() {
        let creds = snapshot(vec![token("seller-1", Some("emp1"))]);
        let ctx = OwnershipResolver::new(&creds).resolve(&order("emp1", None), &ActingUser::employee(uid("emp1")));
        assert!(ctx.can_view && ctx.can_sync && ctx.can_delete);
        assert_eq!(ctx.reason, OwnershipReason::Owner);
        assert_eq!(ctx.sync_key().unwrap().to_string(), "alwaseet/seller-1");
    }

    #[test]
    fn test_owner_without_credential_is_view_only() {
        let creds = snapshot(vec![token("seller-2", Some("emp2"))]);
        let ctx = OwnershipResolver::new(&creds).resolve(&order("emp1", None), &ActingUser::employee(uid("emp1")));
        assert!(ctx.can_view);
        assert!(!ctx.can_sync && !ctx.can_delete);
        assert_eq!(ctx.reason, OwnershipReason::OwnerWithoutCredential);
    }

    #[test]
    fn test_owner_with_expired_credential_is_view_only() {
        let expired = token("seller-1", Some("emp1")).with_expires_at(Some(Utc::now() - chrono::Duration::days(1)));
        let creds = snapshot(vec![expired]);
        let ctx = OwnershipResolver::new(&creds).resolve(&order("emp1", None), &ActingUser::employee(uid("emp1")));
        assert!(ctx.can_view && !ctx.can_sync);
    }

    #[test]
    fn test_employee_cannot_see_other_orders() {
        let creds = snapshot(vec![token("seller-1", Some("emp1")), token("seller-2", Some("emp2"))]);
        let resolver = OwnershipResolver::new(&creds);
        for owner in ["emp1", "emp3", "mgr"] {
            let ctx = resolver.resolve(&order(owner, None), &ActingUser::employee(uid("emp2")));
            assert!(!ctx.can_view && !ctx.can_sync && !ctx.can_delete, "owner {owner}");
            assert_eq!(ctx.reason, OwnershipReason::NotOwner);
            assert!(ctx.sync_token.is_none());
        }
    }

    #[test]
    fn test_recorded_account_restricts_manager_token() {
        let creds = snapshot(vec![token("boss", Some("mgr")), token("seller-2", Some("emp1"))]);
        let ctx = OwnershipResolver::new(&creds)
            .resolve(&order("emp1", Some("seller-2")), &ActingUser::manager(uid("mgr")));
        assert_eq!(ctx.sync_token.unwrap().account_username().as_str(), "seller-2");
    }

    #[test]
    fn test_recorded_account_unknown_yields_no_token() {
        let creds = snapshot(vec![token("boss", Some("mgr"))]);
        let ctx = OwnershipResolver::new(&creds)
            .resolve(&order("emp1", Some("seller-9")), &ActingUser::manager(uid("mgr")));
        assert!(ctx.can_sync);
        assert!(ctx.sync_token.is_none());
    }

    #[test]
    fn test_owner_cannot_borrow_another_users_account() {
        let creds = snapshot(vec![token("seller-1", Some("emp1")), token("seller-2", Some("emp2"))]);
        let ctx = OwnershipResolver::new(&creds)
            .resolve(&order("emp1", Some("seller-2")), &ActingUser::employee(uid("emp1")));
        assert!(ctx.can_view);
        assert!(!ctx.can_sync);
        assert!(ctx.sync_token.is_none());
    }

    #[test]
    fn test_owner_may_use_shared_recorded_account() {
        let creds = snapshot(vec![token("shop", None)]);
        let ctx = OwnershipResolver::new(&creds)
            .resolve(&order("emp1", Some("shop")), &ActingUser::employee(uid("emp1")));
        assert!(ctx.can_sync);
        assert!(ctx.sync_token.unwrap().is_shared());
    }
}
