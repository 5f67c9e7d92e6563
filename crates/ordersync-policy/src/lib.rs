//! OrderSync Policy - Rules that gate every remote call and deletion
//!
//! Provides:
//! - Courier credential resolution and validity checks (`AccountTokenRegistry`)
//! - Per-order view/sync/delete decisions (`OwnershipResolver`)
//! - The auto-deletion policy (`SafeDeletionGuard`)
//! - Courier status text lookup (`StatusMap`)

pub mod deletion;
pub mod error;
pub mod ownership;
pub mod registry;
pub mod status_map;

pub use deletion::{DeletionDecision, DeletionDenial, SafeDeletionGuard};
pub use error::PolicyError;
pub use ownership::{OwnershipContext, OwnershipReason, OwnershipResolver};
pub use registry::{AccountTokenRegistry, CredentialSnapshot};
pub use status_map::{StatusMap, StatusMapping};
