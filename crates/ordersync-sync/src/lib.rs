//! OrderSync Sync - Order reconciliation engine
//!
//! Provides:
//! - Reconciliation passes between the local order store and the courier
//! - Invoice-to-order linking
//! - Per-credential in-flight coalescing
//! - A typed broadcast bus for pass outcomes
//! - Interval and on-demand scheduling with debounced change notifications
//!
//! ## Modules
//!
//! - [`engine`] - `SyncEngine` running one pass per trigger
//! - [`pass`] - Pass triggers, scope, states and the `SyncPassResult`
//! - [`invoice`] - `InvoiceReconciler`
//! - [`inflight`] - `InFlightRegistry` with RAII guards
//! - [`events`] - `SyncEventBus`
//! - [`debounce`] - `RemoteChangeDebouncer`
//! - [`scheduler`] - `SyncScheduler` and its `SyncHandle`

pub mod debounce;
pub mod engine;
pub mod events;
pub mod inflight;
pub mod invoice;
pub mod pass;
pub mod scheduler;

pub use debounce::{ChangeKind, OrderChange, RemoteChangeDebouncer};
pub use engine::SyncEngine;
pub use events::{EventSubscription, SyncEvent, SyncEventBus};
pub use inflight::{InFlightGuard, InFlightRegistry};
pub use invoice::{InvoiceReconciler, ReconcileOutcome};
pub use pass::{
    ErrorKind, InvoiceLink, OnDemandReport, PassDepth, PassError, PassState, SkipReason,
    SkippedOrder, SyncPassResult, SyncScope, SyncTrigger, UnmappedStatus,
};
pub use scheduler::{SyncHandle, SyncRequest, SyncScheduler};

use thiserror::Error;

use ordersync_core::domain::DomainError;
use ordersync_core::ports::{RemoteError, StoreError};
use ordersync_policy::PolicyError;

/// Errors that can occur outside a pass
///
/// A pass itself never fails; its problems are reported in
/// [`SyncPassResult::errors`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid configured value (e.g. partner name)
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),

    /// Credential lookup failed
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// The order store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The courier call failed
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The scheduler loop is no longer running
    #[error("Sync scheduler stopped")]
    SchedulerStopped,
}
