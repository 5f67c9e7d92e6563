//! Acting users and their roles

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{errors::DomainError, newtypes::UserId};

/// Capability tier of an application user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees and syncs every order; confirms invoices as `completed`
    Manager,
    /// Sees and syncs only the orders they created
    #[default]
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::Employee => "employee",
        }
    }

    pub fn is_manager(&self) -> bool {
        matches!(self, Role::Manager)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manager" => Ok(Role::Manager),
            "employee" => Ok(Role::Employee),
            other => Err(DomainError::UnknownRole(other.to_string())),
        }
    }
}

/// The user on whose behalf a sync pass runs
///
/// The role is resolved once from the user directory when the context is
/// built and then travels with the id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActingUser {
    id: UserId,
    role: Role,
}

impl ActingUser {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn manager(id: UserId) -> Self {
        Self::new(id, Role::Manager)
    }

    pub fn employee(id: UserId) -> Self {
        Self::new(id, Role::Employee)
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_manager(&self) -> bool {
        self.role.is_manager()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("Manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!("employee".parse::<Role>().unwrap(), Role::Employee);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_default_role_is_employee() {
        assert_eq!(Role::default(), Role::Employee);
    }

    #[test]
    fn test_acting_user() {
        let mgr = ActingUser::manager(UserId::new("mgr").unwrap());
        assert!(mgr.is_manager());
        let emp = ActingUser::employee(UserId::new("emp1").unwrap());
        assert!(!emp.is_manager());
        assert_eq!(emp.id().as_str(), "emp1");
    }
}
