//! Pass vocabulary: triggers, scope, states and results
//!
//! A [`SyncPassResult`] is produced once per `run_pass`, published on the
//! event bus and never persisted.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ordersync_core::domain::{CredentialKey, InvoiceId, OrderId, UserId};
use ordersync_core::ports::{RemoteError, StoreError};
use ordersync_policy::DeletionDenial;

// ============================================================================
// Trigger, depth, scope
// ============================================================================

/// What started a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// A user asked for it
    Manual,
    /// Short-interval cadence
    ScheduledQuick,
    /// Long-interval cadence
    ScheduledFull,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Manual => "manual",
            SyncTrigger::ScheduledQuick => "scheduled_quick",
            SyncTrigger::ScheduledFull => "scheduled_full",
        }
    }

    /// Quick passes only reconcile invoices
    pub fn depth(&self) -> PassDepth {
        match self {
            SyncTrigger::ScheduledQuick => PassDepth::InvoicesOnly,
            SyncTrigger::Manual | SyncTrigger::ScheduledFull => PassDepth::Full,
        }
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of the reconciliation a pass performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassDepth {
    /// Status diff, missing-order handling and in-pass invoice linking
    Full,
    /// Received-invoice linking only
    InvoicesOnly,
}

impl fmt::Display for PassDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PassDepth::Full => "full",
            PassDepth::InvoicesOnly => "invoices_only",
        })
    }
}

/// Which orders a pass considers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    /// Exactly these orders
    Orders(Vec<OrderId>),
    /// Every externally tracked order the actor may see
    AllVisible,
}

// ============================================================================
// State
// ============================================================================

/// Where a pass is in its run
///
/// The pass-level state moves `CollectingCredentials` then `FetchingRemote`
/// (full) or `ReconcilingInvoices` (invoices only), then a terminal state.
/// Full-depth groups diff, apply and link each order in a single write, so
/// `Diffing` and `ApplyingUpdates` only appear in per-group logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    #[default]
    Idle,
    CollectingCredentials,
    FetchingRemote,
    Diffing,
    ApplyingUpdates,
    ReconcilingInvoices,
    Completed,
    PartiallyFailed,
}

impl PassState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassState::Idle => "idle",
            PassState::CollectingCredentials => "collecting_credentials",
            PassState::FetchingRemote => "fetching_remote",
            PassState::Diffing => "diffing",
            PassState::ApplyingUpdates => "applying_updates",
            PassState::ReconcilingInvoices => "reconciling_invoices",
            PassState::Completed => "completed",
            PassState::PartiallyFailed => "partially_failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, PassState::Completed | PassState::PartiallyFailed)
    }
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Result entries
// ============================================================================

/// Why an order was left untouched by a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Never handed to a courier
    LocalOrder,
    /// No such order in the store
    NotFound,
    /// Tracked by a different delivery partner
    OtherPartner,
    /// The actor may not sync the order
    OwnershipDenied,
    /// No usable credential covers the order
    NoCredential,
    /// The credential failed re-validation
    CredentialInvalid,
    /// Another pass is already running for the credential
    Coalesced,
    /// Missing remotely but the deletion policy refused removal
    DeletionBlocked(DeletionDenial),
    /// Missing remotely and removable, but auto-deletion is switched off
    AutoDeleteDisabled,
    /// Not listed, and the credential is not the one that holds the order
    UnconfirmedMissing,
    /// Became non-deletable between the guard check and the delete
    ChangedDuringPass,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::LocalOrder => f.write_str("local_order"),
            SkipReason::NotFound => f.write_str("not_found"),
            SkipReason::OtherPartner => f.write_str("other_partner"),
            SkipReason::OwnershipDenied => f.write_str("ownership_denied"),
            SkipReason::NoCredential => f.write_str("no_credential"),
            SkipReason::CredentialInvalid => f.write_str("credential_invalid"),
            SkipReason::Coalesced => f.write_str("coalesced"),
            SkipReason::DeletionBlocked(denial) => write!(f, "deletion_blocked:{denial}"),
            SkipReason::AutoDeleteDisabled => f.write_str("auto_delete_disabled"),
            SkipReason::UnconfirmedMissing => f.write_str("unconfirmed_missing"),
            SkipReason::ChangedDuringPass => f.write_str("changed_during_pass"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedOrder {
    pub order_id: OrderId,
    pub reason: SkipReason,
}

/// Courier status text with no entry in the status map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedStatus {
    pub order_id: OrderId,
    pub raw_status: String,
}

/// Orders linked to one courier invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLink {
    pub invoice_id: InvoiceId,
    pub order_ids: Vec<OrderId>,
}

impl InvoiceLink {
    pub fn new(invoice_id: InvoiceId) -> Self {
        Self {
            invoice_id,
            order_ids: Vec::new(),
        }
    }
}

/// Classification of a recorded pass error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials could not be collected
    Credential,
    /// The courier rejected the credential
    Unauthorized,
    RemoteUnavailable,
    RemoteMalformed,
    /// The order changed or vanished underneath the write
    PersistenceConflict,
    /// Any other store failure
    Store,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Credential => "credential",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RemoteUnavailable => "remote_unavailable",
            ErrorKind::RemoteMalformed => "remote_malformed",
            ErrorKind::PersistenceConflict => "persistence_conflict",
            ErrorKind::Store => "store",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&RemoteError> for ErrorKind {
    fn from(e: &RemoteError) -> Self {
        match e {
            RemoteError::Unauthorized => ErrorKind::Unauthorized,
            RemoteError::Unavailable(_) => ErrorKind::RemoteUnavailable,
            RemoteError::Malformed(_) => ErrorKind::RemoteMalformed,
        }
    }
}

impl From<&StoreError> for ErrorKind {
    fn from(e: &StoreError) -> Self {
        match e {
            StoreError::Conflict(_) | StoreError::NotFound(_) => ErrorKind::PersistenceConflict,
            StoreError::Backend(_) => ErrorKind::Store,
        }
    }
}

/// A non-fatal problem met during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassError {
    /// Credential group the error belongs to, if any
    pub credential: Option<CredentialKey>,
    pub kind: ErrorKind,
    pub message: String,
    /// Order the error is scoped to, if any
    pub order_id: Option<OrderId>,
}

impl PassError {
    pub fn credential(credential: Option<CredentialKey>, message: impl Into<String>) -> Self {
        Self {
            credential,
            kind: ErrorKind::Credential,
            message: message.into(),
            order_id: None,
        }
    }

    pub fn remote(credential: CredentialKey, order_id: Option<OrderId>, error: &RemoteError) -> Self {
        Self {
            credential: Some(credential),
            kind: error.into(),
            message: error.to_string(),
            order_id,
        }
    }

    pub fn store(credential: Option<CredentialKey>, order_id: Option<OrderId>, error: &StoreError) -> Self {
        Self {
            credential,
            kind: error.into(),
            message: error.to_string(),
            order_id,
        }
    }
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.credential {
            Some(key) => write!(f, "[{key}] {}: {}", self.kind, self.message)?,
            None => write!(f, "{}: {}", self.kind, self.message)?,
        }
        if let Some(order_id) = &self.order_id {
            write!(f, " (order {order_id})")?;
        }
        Ok(())
    }
}

// ============================================================================
// SyncPassResult
// ============================================================================

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPassResult {
    pub pass_id: Uuid,
    pub trigger: SyncTrigger,
    pub depth: PassDepth,
    pub state: PassState,
    /// User the pass ran for
    pub actor: UserId,
    /// Credential groups that reached the courier
    pub credentials_attempted: usize,
    pub orders_updated: usize,
    pub orders_skipped: Vec<SkippedOrder>,
    pub deletions_applied: Vec<OrderId>,
    pub invoices_linked: Vec<InvoiceLink>,
    /// Orders whose courier invoice was already recorded
    #[serde(default)]
    pub orders_already_linked: usize,
    pub unmapped_statuses: Vec<UnmappedStatus>,
    pub errors: Vec<PassError>,
    pub duration_ms: u64,
}

impl SyncPassResult {
    pub fn new(trigger: SyncTrigger, actor: UserId) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            trigger,
            depth: trigger.depth(),
            state: PassState::Idle,
            actor,
            credentials_attempted: 0,
            orders_updated: 0,
            orders_skipped: Vec::new(),
            deletions_applied: Vec::new(),
            invoices_linked: Vec::new(),
            orders_already_linked: 0,
            unmapped_statuses: Vec::new(),
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    pub(crate) fn skip(&mut self, order_id: OrderId, reason: SkipReason) {
        self.orders_skipped.push(SkippedOrder { order_id, reason });
    }

    /// Reason the order was skipped in this pass, if it was
    pub fn skip_reason(&self, order_id: &OrderId) -> Option<SkipReason> {
        self.orders_skipped
            .iter()
            .find(|s| &s.order_id == order_id)
            .map(|s| s.reason)
    }

    /// Number of orders that received an invoice link
    pub fn orders_linked(&self) -> usize {
        self.invoices_linked.iter().map(|l| l.order_ids.len()).sum()
    }

    /// Distinct credentials with at least one recorded error
    pub fn failed_credentials(&self) -> BTreeSet<&CredentialKey> {
        self.errors.iter().filter_map(|e| e.credential.as_ref()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

// ============================================================================
// OnDemandReport
// ============================================================================

/// What the on-demand path tells the user
///
/// Carries counts and a summary line, never raw error details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnDemandReport {
    pub pass_id: Uuid,
    pub state: PassState,
    pub orders_updated: usize,
    pub orders_deleted: usize,
    pub orders_linked: usize,
    pub orders_skipped: usize,
    pub unmapped_statuses: usize,
    pub failed_accounts: usize,
    pub message: String,
}

impl From<&SyncPassResult> for OnDemandReport {
    fn from(result: &SyncPassResult) -> Self {
        let mut failed_accounts = result.failed_credentials().len();
        if failed_accounts == 0 && !result.errors.is_empty() {
            failed_accounts = 1;
        }
        let message = if failed_accounts == 0 {
            format!("sync completed: {} orders updated", result.orders_updated)
        } else {
            format!("sync failed for {failed_accounts} accounts")
        };

        Self {
            pass_id: result.pass_id,
            state: result.state,
            orders_updated: result.orders_updated,
            orders_deleted: result.deletions_applied.len(),
            orders_linked: result.orders_linked(),
            orders_skipped: result.orders_skipped.len(),
            unmapped_statuses: result.unmapped_statuses.len(),
            failed_accounts,
            message,
        }
    }
}

impl fmt::Display for OnDemandReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
