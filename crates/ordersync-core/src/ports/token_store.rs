//! Token store port (driven/secondary port)
//!
//! Read-only access to courier account credentials. Creation and rotation
//! belong to an external auth flow.

use crate::domain::{
    newtypes::{AccountUsername, PartnerName},
    DeliveryAccountToken,
};

/// Port trait for courier credential storage
#[async_trait::async_trait]
pub trait ITokenStore: Send + Sync {
    /// Lists every credential recorded for a partner, active or not
    async fn list_tokens(&self, partner: &PartnerName) -> anyhow::Result<Vec<DeliveryAccountToken>>;

    /// Retrieves the credential for one courier account
    async fn get_token(
        &self,
        partner: &PartnerName,
        account: &AccountUsername,
    ) -> anyhow::Result<Option<DeliveryAccountToken>>;
}
