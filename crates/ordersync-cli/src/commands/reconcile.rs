//! Reconcile-invoices command - link received invoices for one account

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use ordersync_core::domain::UserId;
use ordersync_sync::ReconcileOutcome;

use super::{load_valid_config, open_engine};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct ReconcileCommand {
    /// Courier account whose invoices are checked
    #[arg(long)]
    pub account: String,

    /// User recorded as having received the linked invoices
    #[arg(long)]
    pub received_by: Option<String>,
}

impl ReconcileCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let received_by = self
            .received_by
            .as_deref()
            .map(UserId::new)
            .transpose()
            .context("Invalid user id")?;
        let config = load_valid_config(config_path)?;
        let (engine, _pool) = open_engine(&config).await?;

        let token = match engine.registry().resolve_account(&self.account, engine.partner()).await {
            Ok(token) => token,
            Err(e) => {
                formatter.error(&e.to_string());
                return Ok(());
            }
        };

        info!(account = %token.account_username(), "Reconciling invoices");
        formatter.info(&format!("Checking invoices for {}...", token.account_username()));

        let outcome = engine
            .invoices()
            .reconcile(&token, received_by.as_ref())
            .await
            .context("Invoice reconciliation failed")?;

        if format.is_json() {
            formatter.print_json(&outcome_json(&self.account, &outcome)?);
        } else {
            print_outcome(formatter.as_ref(), &outcome);
        }
        Ok(())
    }
}

fn outcome_json(account: &str, outcome: &ReconcileOutcome) -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "account": account,
        "linked_orders": outcome.linked_orders(),
        "already_linked": outcome.already_linked,
        "invoices": serde_json::to_value(&outcome.linked).context("Failed to serialize links")?,
        "errors": serde_json::to_value(&outcome.errors).context("Failed to serialize errors")?,
    }))
}

fn print_outcome(formatter: &dyn OutputFormatter, outcome: &ReconcileOutcome) {
    if outcome.linked.is_empty() {
        formatter.success("No new received invoices");
    } else {
        formatter.success(&format!(
            "Linked {} order(s) to {} invoice(s)",
            outcome.linked_orders(),
            outcome.linked.len()
        ));
    }
    for link in &outcome.linked {
        formatter.field(link.invoice_id.as_str(), &link.order_ids.len());
    }
    formatter.field("Already linked", &outcome.already_linked);
    for error in &outcome.errors {
        formatter.warn(&error.message);
    }
}
