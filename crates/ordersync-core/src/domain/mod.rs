//! Domain entities and business rules
//!
//! This module contains the core domain types for order synchronization:
//! - Newtypes for type-safe identifiers and validated values
//! - The local `Order` entity and its atomic `OrderUpdate`
//! - Courier account credentials
//! - Acting users and roles
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod order;
pub mod token;
pub mod user;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::*;
pub use order::{normalize_status_text, Order, OrderStatus, OrderUpdate, ReceiptUpdate};
pub use token::{CourierToken, CredentialKey, DeliveryAccountToken};
pub use user::{ActingUser, Role};
