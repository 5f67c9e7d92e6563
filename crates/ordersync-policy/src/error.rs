//! Error types for the policy crate

use thiserror::Error;

/// Errors that can occur while resolving credentials
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Neither a user-bound nor a shared active credential exists
    #[error("no active {partner} credential for user {user}")]
    CredentialNotFound { user: String, partner: String },

    /// No active credential is recorded for the named courier account
    #[error("no active {partner} credential for account {account:?}")]
    AccountNotFound { account: String, partner: String },

    /// Token store error
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
