//! Courier status text lookup
//!
//! Maps the free-text status a courier reports onto [`OrderStatus`] through
//! a configured table. Lookups are exact after normalization; a text missing
//! from the table yields [`StatusMapping::Unmapped`] so it can be surfaced
//! for review instead of guessed.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use ordersync_core::{
    config::StatusMappingConfig,
    domain::{normalize_status_text, OrderStatus},
};

/// Outcome of a status text lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "status")]
pub enum StatusMapping {
    Mapped(OrderStatus),
    Unmapped,
}

impl StatusMapping {
    pub fn status(&self) -> Option<OrderStatus> {
        match self {
            StatusMapping::Mapped(status) => Some(*status),
            StatusMapping::Unmapped => None,
        }
    }
}

/// Compiled status text table
#[derive(Debug, Clone)]
pub struct StatusMap {
    entries: HashMap<String, OrderStatus>,
    invoice_received: HashSet<String>,
}

impl StatusMap {
    /// Compiles the configured tables
    ///
    /// Blank texts are skipped; for duplicate texts the first entry wins.
    pub fn from_config(config: &StatusMappingConfig) -> Self {
        let mut entries = HashMap::with_capacity(config.entries.len());
        for entry in &config.entries {
            let key = normalize_status_text(&entry.text);
            if key.is_empty() {
                warn!("Skipping blank status mapping entry");
                continue;
            }
            if entries.contains_key(&key) {
                warn!(text = %entry.text, "Skipping duplicate status mapping entry");
                continue;
            }
            entries.insert(key, entry.status);
        }

        let invoice_received = config
            .invoice_received
            .iter()
            .map(|text| normalize_status_text(text))
            .filter(|text| !text.is_empty())
            .collect::<HashSet<_>>();

        debug!(
            entries = entries.len(),
            invoice_texts = invoice_received.len(),
            "StatusMap initialized"
        );

        Self {
            entries,
            invoice_received,
        }
    }

    /// Looks up a raw courier status text
    pub fn map(&self, raw: &str) -> StatusMapping {
        match self.entries.get(&normalize_status_text(raw)) {
            Some(status) => {
                trace!(raw = %raw, status = %status, "Status text mapped");
                StatusMapping::Mapped(*status)
            }
            None => {
                trace!(raw = %raw, "Status text unmapped");
                StatusMapping::Unmapped
            }
        }
    }

    /// Returns true if an invoice status text means the merchant received it
    pub fn is_invoice_received(&self, raw: &str) -> bool {
        self.invoice_received.contains(&normalize_status_text(raw))
    }

    /// Number of status texts in the table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StatusMap {
    fn default() -> Self {
        Self::from_config(&StatusMappingConfig::default())
    }
}
