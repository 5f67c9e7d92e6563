//! User directory port (driven/secondary port)
//!
//! Resolves the capability tier of a user. This replaces comparing user ids
//! against a fixed privileged identity.

use crate::domain::{ActingUser, Role, UserId};

/// Port trait for role lookups
#[async_trait::async_trait]
pub trait IUserDirectory: Send + Sync {
    /// Returns the role recorded for a user, or `None` if the user is unknown
    async fn role_of(&self, user: &UserId) -> anyhow::Result<Option<Role>>;
}

/// Builds an acting-user context with a single role lookup
///
/// Unknown users and lookup failures resolve to [`Role::Employee`].
pub async fn resolve_acting_user(directory: &dyn IUserDirectory, user: UserId) -> ActingUser {
    let role = match directory.role_of(&user).await {
        Ok(Some(role)) => role,
        Ok(None) | Err(_) => Role::Employee,
    };
    ActingUser::new(user, role)
}
