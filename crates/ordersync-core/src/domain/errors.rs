//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and malformed identifiers.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was empty or otherwise unusable
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// A tracking number was empty or contained whitespace
    #[error("Invalid tracking number: {0}")]
    InvalidTrackingNumber(String),

    /// A courier account username normalized to an empty string
    #[error("Invalid account username: {0}")]
    InvalidAccountUsername(String),

    /// An order status string did not match any known status
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// A role string did not match any known role
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
