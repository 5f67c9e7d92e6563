//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Opaque string identifiers
// ============================================================================

/// Declares a non-empty, trimmed string identifier.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier, rejecting empty or blank values
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::InvalidId(format!("{} cannot be empty", $label)));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Returns the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

string_id!(
    /// Store-owned identifier of a local order
    OrderId,
    "order id"
);

string_id!(
    /// Identifier of an application user (manager or employee)
    UserId,
    "user id"
);

string_id!(
    /// Identifier the courier assigned to an order on its side
    PartnerOrderId,
    "partner order id"
);

string_id!(
    /// Identifier of a courier-issued invoice
    InvoiceId,
    "invoice id"
);

// ============================================================================
// PartnerName
// ============================================================================

/// Name of a delivery partner, stored lower-case (e.g. `alwaseet`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartnerName(String);

impl PartnerName {
    /// Partner name used for orders that never leave the shop
    pub const LOCAL: &'static str = "local";

    /// Creates a partner name, trimming and lower-casing the input
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let normalized = value.into().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::InvalidId(
                "partner name cannot be empty".to_string(),
            ));
        }
        Ok(Self(normalized))
    }

    /// The pseudo-partner for locally fulfilled orders
    pub fn local() -> Self {
        Self(Self::LOCAL.to_string())
    }

    /// Returns true for the local pseudo-partner
    pub fn is_local(&self) -> bool {
        self.0 == Self::LOCAL
    }

    /// Returns the partner name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PartnerName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PartnerName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PartnerName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PartnerName> for String {
    fn from(value: PartnerName) -> Self {
        value.0
    }
}

// ============================================================================
// AccountUsername
// ============================================================================

/// A courier account username in canonical form
///
/// Normalization trims the input, lower-cases it and collapses every run of
/// whitespace into a single hyphen, so `" Seller 1 "` and `"seller-1"` compare
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountUsername(String);

impl AccountUsername {
    /// Normalizes and wraps a courier account username
    pub fn new(raw: impl AsRef<str>) -> Result<Self, DomainError> {
        let normalized = Self::normalize(raw.as_ref());
        if normalized.is_empty() {
            return Err(DomainError::InvalidAccountUsername(raw.as_ref().to_string()));
        }
        Ok(Self(normalized))
    }

    /// Canonical form of a raw username without validation
    pub fn normalize(raw: &str) -> String {
        raw.split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Returns the normalized username
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AccountUsername {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountUsername {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountUsername {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountUsername> for String {
    fn from(value: AccountUsername) -> Self {
        value.0
    }
}

// ============================================================================
// TrackingNumber
// ============================================================================

/// Tracking number of an order, doubling as its scan-code / QR identifier
///
/// Assigned by the courier for partner orders; locally generated numbers
/// carry the [`TrackingNumber::LOCAL_PREFIX`] prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingNumber(String);

impl TrackingNumber {
    /// Prefix of tracking numbers generated for local orders
    pub const LOCAL_PREFIX: &'static str = "LOCAL-";

    /// Creates a tracking number; must be non-empty and free of whitespace
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidTrackingNumber(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Generates a fresh tracking number for a local order
    pub fn generate_local() -> Self {
        let suffix = Uuid::new_v4().simple().to_string()[..10].to_uppercase();
        Self(format!("{}{}", Self::LOCAL_PREFIX, suffix))
    }

    /// Returns true if the number was generated locally
    pub fn is_local(&self) -> bool {
        self.0.starts_with(Self::LOCAL_PREFIX)
    }

    /// Returns the tracking number as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TrackingNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TrackingNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TrackingNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TrackingNumber> for String {
    fn from(value: TrackingNumber) -> Self {
        value.0
    }
}

// ============================================================================
// Tests
// ============================================================================
