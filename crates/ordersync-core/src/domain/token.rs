//! Courier account credentials
//!
//! A [`DeliveryAccountToken`] authorizes calls to a courier API on behalf of
//! one courier account. Tokens are created and rotated outside this
//! workspace; the sync engine only reads them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{AccountUsername, PartnerName, UserId};

/// Opaque courier API secret
///
/// `Debug` and `Display` never print the secret itself.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourierToken(String);

impl CourierToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the raw secret for building requests
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CourierToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CourierToken(***)")
    }
}

impl fmt::Display for CourierToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Identity of a credential: one courier account of one partner
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CredentialKey {
    pub partner: PartnerName,
    pub account: AccountUsername,
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partner, self.account)
    }
}

/// Credential for one (user, partner) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAccountToken {
    partner_name: PartnerName,
    account_username: AccountUsername,
    /// `None` marks a shared/default credential
    user_id: Option<UserId>,
    token: CourierToken,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl DeliveryAccountToken {
    /// Creates an active, non-expiring credential
    pub fn new(
        partner_name: PartnerName,
        account_username: AccountUsername,
        user_id: Option<UserId>,
        token: CourierToken,
    ) -> Self {
        Self {
            partner_name,
            account_username,
            user_id,
            token,
            expires_at: None,
            is_active: true,
        }
    }

    pub fn with_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn partner_name(&self) -> &PartnerName {
        &self.partner_name
    }

    pub fn account_username(&self) -> &AccountUsername {
        &self.account_username
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn token(&self) -> &CourierToken {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns true if the credential is not bound to a user
    pub fn is_shared(&self) -> bool {
        self.user_id.is_none()
    }

    /// Valid iff active and not expired at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |expires| expires > now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn key(&self) -> CredentialKey {
        CredentialKey {
            partner: self.partner_name.clone(),
            account: self.account_username.clone(),
        }
    }
}
