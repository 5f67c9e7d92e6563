//! Sync command - run one on-demand pass from the terminal
//!
//! Opens the database, runs a manual pass for the given user and prints the
//! same summary the on-demand path returns to the application.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use ordersync_core::domain::{OrderId, UserId};
use ordersync_sync::{OnDemandReport, SyncScope};

use super::{load_valid_config, open_engine};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// User the pass runs as; ownership rules apply to them
    #[arg(long)]
    pub user: String,

    /// Only sync these orders (repeatable)
    #[arg(long = "order", value_name = "ORDER_ID")]
    pub orders: Vec<String>,
}

impl SyncCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let user = UserId::new(&self.user).context("Invalid user id")?;
        let scope = self.scope()?;
        let config = load_valid_config(config_path)?;
        let (engine, _pool) = open_engine(&config).await?;

        info!(user = %user, "Starting on-demand sync");
        formatter.info("Synchronizing orders...");

        let report = engine.run_on_demand(user, scope).await;

        if format.is_json() {
            let json = serde_json::to_value(&report).context("Failed to serialize sync report")?;
            formatter.print_json(&json);
        } else {
            print_report(formatter.as_ref(), &report);
        }
        Ok(())
    }

    fn scope(&self) -> Result<SyncScope> {
        if self.orders.is_empty() {
            return Ok(SyncScope::AllVisible);
        }
        let ids = self
            .orders
            .iter()
            .map(|id| OrderId::new(id).with_context(|| format!("Invalid order id '{id}'")))
            .collect::<Result<Vec<_>>>()?;
        Ok(SyncScope::Orders(ids))
    }
}

fn print_report(formatter: &dyn OutputFormatter, report: &OnDemandReport) {
    if report.failed_accounts == 0 {
        formatter.success(&report.message);
    } else {
        formatter.error(&report.message);
    }
    formatter.field("Pass", &report.pass_id);
    formatter.field("State", &report.state);
    formatter.field("Updated", &report.orders_updated);
    formatter.field("Deleted", &report.orders_deleted);
    formatter.field("Invoice-linked", &report.orders_linked);
    formatter.field("Skipped", &report.orders_skipped);
    if report.unmapped_statuses > 0 {
        formatter.warn(&format!(
            "{} courier status text(s) have no mapping",
            report.unmapped_statuses
        ));
    }
}
