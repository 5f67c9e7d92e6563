//! Courier credential registry
//!
//! Resolves which courier account credential applies to a user or a named
//! courier account, and whether a credential may be used right now. The
//! registry only reads from the token store.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use ordersync_core::{
    domain::{AccountUsername, DeliveryAccountToken, PartnerName, UserId},
    ports::ITokenStore,
};

use crate::error::PolicyError;

// ============================================================================
// CredentialSnapshot
// ============================================================================

/// Active credentials of one partner, captured once per sync pass
///
/// Ownership decisions are made against a snapshot so they need no I/O and
/// see a single consistent view of the credentials for the whole pass.
#[derive(Debug, Clone, Default)]
pub struct CredentialSnapshot {
    by_user: HashMap<UserId, DeliveryAccountToken>,
    by_account: HashMap<AccountUsername, DeliveryAccountToken>,
    shared: Option<DeliveryAccountToken>,
}

impl CredentialSnapshot {
    /// Indexes the credentials that are usable at `now`
    ///
    /// When a user holds several credentials the one with the smallest
    /// account username is their default.
    pub fn from_tokens(tokens: impl IntoIterator<Item = DeliveryAccountToken>, now: DateTime<Utc>) -> Self {
        let mut usable: Vec<_> = tokens.into_iter().filter(|t| t.is_valid_at(now)).collect();
        usable.sort_by(|a, b| a.account_username().cmp(b.account_username()));

        let mut snapshot = Self::default();
        for token in usable {
            match token.user_id() {
                Some(user) => {
                    snapshot
                        .by_user
                        .entry(user.clone())
                        .or_insert_with(|| token.clone());
                }
                None => {
                    if snapshot.shared.is_none() {
                        snapshot.shared = Some(token.clone());
                    }
                }
            }
            snapshot
                .by_account
                .insert(token.account_username().clone(), token);
        }
        snapshot
    }

    /// The user's own credential, ignoring shared ones
    pub fn for_user(&self, user: &UserId) -> Option<&DeliveryAccountToken> {
        self.by_user.get(user)
    }

    /// The user's own credential, falling back to the shared one
    pub fn resolve(&self, user: &UserId) -> Option<&DeliveryAccountToken> {
        self.for_user(user).or(self.shared.as_ref())
    }

    /// The credential of one courier account
    pub fn for_account(&self, account: &AccountUsername) -> Option<&DeliveryAccountToken> {
        self.by_account.get(account)
    }

    /// Number of distinct usable credentials
    pub fn len(&self) -> usize {
        self.by_account.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_account.is_empty()
    }
}

// ============================================================================
// AccountTokenRegistry
// ============================================================================

/// Resolves and validates courier credentials
pub struct AccountTokenRegistry {
    tokens: Arc<dyn ITokenStore>,
}

impl AccountTokenRegistry {
    pub fn new(tokens: Arc<dyn ITokenStore>) -> Self {
        Self { tokens }
    }

    /// The user's active credential for a partner, else the shared one
    #[tracing::instrument(skip_all, fields(user = %user, partner = %partner))]
    pub async fn resolve(
        &self,
        user: &UserId,
        partner: &PartnerName,
    ) -> Result<DeliveryAccountToken, PolicyError> {
        let tokens = self.tokens.list_tokens(partner).await?;
        let mut active: Vec<_> = tokens.into_iter().filter(|t| t.is_active()).collect();
        active.sort_by(|a, b| a.account_username().cmp(b.account_username()));

        let own = active.iter().position(|t| t.user_id() == Some(user));
        let chosen = own.or_else(|| active.iter().position(|t| t.is_shared()));

        match chosen {
            Some(index) => {
                let token = active.swap_remove(index);
                debug!(account = %token.account_username(), shared = token.is_shared(), "Credential resolved");
                Ok(token)
            }
            None => Err(PolicyError::CredentialNotFound {
                user: user.to_string(),
                partner: partner.to_string(),
            }),
        }
    }

    /// The active credential of a named courier account
    ///
    /// The username is normalized first, so `" Seller 1 "` and `"seller-1"`
    /// resolve to the same record.
    #[tracing::instrument(skip_all, fields(account = %account_username, partner = %partner))]
    pub async fn resolve_account(
        &self,
        account_username: &str,
        partner: &PartnerName,
    ) -> Result<DeliveryAccountToken, PolicyError> {
        let not_found = || PolicyError::AccountNotFound {
            account: account_username.to_string(),
            partner: partner.to_string(),
        };

        let account = AccountUsername::new(account_username).map_err(|_| not_found())?;
        match self.tokens.get_token(partner, &account).await? {
            Some(token) if token.is_active() => Ok(token),
            _ => Err(not_found()),
        }
    }

    /// Re-reads the credential and checks that it is usable now
    ///
    /// Fails closed: lookup errors, a missing or rotated record, an inactive
    /// flag or a past expiry all yield `false`.
    pub async fn is_valid(&self, token: &DeliveryAccountToken) -> bool {
        match self
            .tokens
            .get_token(token.partner_name(), token.account_username())
            .await
        {
            Ok(Some(current)) => current.token() == token.token() && current.is_valid(),
            Ok(None) => {
                debug!(credential = %token.key(), "Credential no longer recorded");
                false
            }
            Err(e) => {
                warn!(credential = %token.key(), error = %e, "Credential lookup failed");
                false
            }
        }
    }

    /// Usable credentials of a partner, indexed for ownership decisions
    pub async fn snapshot(&self, partner: &PartnerName) -> Result<CredentialSnapshot, PolicyError> {
        let tokens = self.tokens.list_tokens(partner).await?;
        let snapshot = CredentialSnapshot::from_tokens(tokens, Utc::now());
        debug!(partner = %partner, credentials = snapshot.len(), "Credential snapshot taken");
        Ok(snapshot)
    }

    /// Distinct users holding a usable credential for the partner
    pub async fn principals(&self, partner: &PartnerName) -> Result<Vec<UserId>, PolicyError> {
        let now = Utc::now();
        let tokens = self.tokens.list_tokens(partner).await?;
        let users: BTreeSet<UserId> = tokens
            .into_iter()
            .filter(|t| t.is_valid_at(now))
            .filter_map(|t| t.user_id().cloned())
            .collect();
        Ok(users.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Duration;
    use ordersync_core::domain::CourierToken;

    use super::*;

    #[derive(Default)]
    struct MemoryTokens {
        tokens: Mutex<Vec<DeliveryAccountToken>>,
        fail: bool,
    }

    impl MemoryTokens {
        fn with(tokens: Vec<DeliveryAccountToken>) -> Arc<Self> {
            Arc::new(Self {
                tokens: Mutex::new(tokens),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                tokens: Mutex::new(vec![]),
                fail: true,
            })
        }
    }

    #[async_trait::async_trait]
    impl ITokenStore for MemoryTokens {
        async fn list_tokens(&self, partner: &PartnerName) -> anyhow::Result<Vec<DeliveryAccountToken>> {
            if self.fail {
                anyhow::bail!("token store offline");
            }
            Ok(self
                .tokens
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.partner_name() == partner)
                .cloned()
                .collect())
        }

        async fn get_token(
            &self,
            partner: &PartnerName,
            account: &AccountUsername,
        ) -> anyhow::Result<Option<DeliveryAccountToken>> {
            if self.fail {
                anyhow::bail!("token store offline");
            }
            Ok(self
                .tokens
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.partner_name() == partner && t.account_username() == account)
                .cloned())
        }
    }

    fn partner() -> PartnerName {
        PartnerName::new("alwaseet").unwrap()
    }

    fn token(account: &str, user: Option<&str>, secret: &str) -> DeliveryAccountToken {
        DeliveryAccountToken::new(
            partner(),
            AccountUsername::new(account).unwrap(),
            user.map(|u| UserId::new(u).unwrap()),
            CourierToken::new(secret),
        )
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_prefers_user_credential() {
        let registry = AccountTokenRegistry::new(MemoryTokens::with(vec![
            token("shop", None, "shared"),
            token("seller-1", Some("emp1"), "own"),
        ]));
        let resolved = registry.resolve(&user("emp1"), &partner()).await.unwrap();
        assert_eq!(resolved.token().expose(), "own");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_shared() {
        let registry = AccountTokenRegistry::new(MemoryTokens::with(vec![
            token("shop", None, "shared"),
            token("seller-1", Some("emp1"), "own"),
        ]));
        let resolved = registry.resolve(&user("emp2"), &partner()).await.unwrap();
        assert_eq!(resolved.token().expose(), "shared");
    }

    #[tokio::test]
    async fn test_resolve_skips_inactive_and_reports_not_found() {
        let registry = AccountTokenRegistry::new(MemoryTokens::with(vec![
            token("seller-1", Some("emp1"), "own").with_active(false),
        ]));
        let err = registry.resolve(&user("emp1"), &partner()).await.unwrap_err();
        assert!(matches!(err, PolicyError::CredentialNotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_propagates_storage_errors() {
        let registry = AccountTokenRegistry::new(MemoryTokens::failing());
        let err = registry.resolve(&user("emp1"), &partner()).await.unwrap_err();
        assert!(matches!(err, PolicyError::Storage(_)));
    }

    #[tokio::test]
    async fn test_resolve_account_normalizes_username() {
        let registry =
            AccountTokenRegistry::new(MemoryTokens::with(vec![token("Seller 1", Some("emp1"), "own")]));
        let a = registry.resolve_account(" Seller 1 ", &partner()).await.unwrap();
        let b = registry.resolve_account("seller-1", &partner()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.account_username().as_str(), "seller-1");
    }

    #[tokio::test]
    async fn test_resolve_account_unknown_or_blank() {
        let registry = AccountTokenRegistry::new(MemoryTokens::with(vec![token("seller-1", None, "s")]));
        assert!(matches!(
            registry.resolve_account("seller-2", &partner()).await,
            Err(PolicyError::AccountNotFound { .. })
        ));
        assert!(matches!(
            registry.resolve_account("   ", &partner()).await,
            Err(PolicyError::AccountNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_is_valid_fails_closed() {
        let live = token("seller-1", Some("emp1"), "own");
        let store = MemoryTokens::with(vec![live.clone()]);
        let registry = AccountTokenRegistry::new(store.clone());
        assert!(registry.is_valid(&live).await);

        // rotated secret
        *store.tokens.lock().unwrap() = vec![token("seller-1", Some("emp1"), "rotated")];
        assert!(!registry.is_valid(&live).await);

        // expired
        *store.tokens.lock().unwrap() =
            vec![live.clone().with_expires_at(Some(Utc::now() - Duration::minutes(5)))];
        assert!(!registry.is_valid(&live).await);

        // deactivated
        *store.tokens.lock().unwrap() = vec![live.clone().with_active(false)];
        assert!(!registry.is_valid(&live).await);

        // removed
        store.tokens.lock().unwrap().clear();
        assert!(!registry.is_valid(&live).await);

        // lookup error
        let broken = AccountTokenRegistry::new(MemoryTokens::failing());
        assert!(!broken.is_valid(&live).await);
    }

    #[tokio::test]
    async fn test_principals_lists_distinct_valid_users() {
        let registry = AccountTokenRegistry::new(MemoryTokens::with(vec![
            token("a", Some("emp2"), "1"),
            token("b", Some("emp1"), "2"),
            token("c", Some("emp1"), "3"),
            token("d", None, "4"),
            token("e", Some("emp3"), "5").with_active(false),
        ]));
        let principals = registry.principals(&partner()).await.unwrap();
        assert_eq!(principals, vec![user("emp1"), user("emp2")]);
    }

    #[test]
    fn test_snapshot_indexes_valid_tokens() {
        let now = Utc::now();
        let snapshot = CredentialSnapshot::from_tokens(
            vec![
                token("seller-2", Some("emp1"), "second"),
                token("seller-1", Some("emp1"), "first"),
                token("shop", None, "shared"),
                token("old", Some("emp2"), "x").with_expires_at(Some(now - Duration::hours(1))),
            ],
            now,
        );
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.for_user(&user("emp1")).unwrap().token().expose(), "first");
        assert!(snapshot.for_user(&user("emp2")).is_none());
        assert_eq!(snapshot.resolve(&user("emp2")).unwrap().token().expose(), "shared");
        assert_eq!(
            snapshot
                .for_account(&AccountUsername::new("seller-2").unwrap())
                .unwrap()
                .token()
                .expose(),
            "second"
        );
        assert!(snapshot.for_account(&AccountUsername::new("old").unwrap()).is_none());
    }
}
