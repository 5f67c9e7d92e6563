//! SQLite implementation of the store ports
//!
//! [`SqliteOrderStore`] implements `IOrderStore`, `ITokenStore` and
//! `IUserDirectory` over one connection pool. It handles all domain type
//! conversion and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type                         | SQL Type | Strategy                                   |
//! |-------------------------------------|----------|--------------------------------------------|
//! | OrderId, UserId, PartnerOrderId ... | TEXT     | `.as_str()` / `::new()`                    |
//! | AccountUsername                     | TEXT     | normalized form via `.as_str()`            |
//! | OrderStatus, Role                   | TEXT     | `.as_str()` / `FromStr`                    |
//! | CourierToken                        | TEXT     | `.expose()` / `CourierToken::new()`        |
//! | bool                                | INTEGER  | 0 / 1                                      |
//! | DateTime<Utc>                       | TEXT     | ISO 8601 via `to_rfc3339()`                |

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use ordersync_core::domain::{
    AccountUsername, CourierToken, DeliveryAccountToken, DomainError, InvoiceId, Order, OrderId,
    OrderStatus, OrderUpdate, PartnerName, PartnerOrderId, Role, TrackingNumber, UserId,
};
use ordersync_core::ports::{IOrderStore, ITokenStore, IUserDirectory, OrderFilter, StoreError};

use crate::CacheError;

/// SQLite-based implementation of the order, token and user-directory ports
#[derive(Clone)]
pub struct SqliteOrderStore {
    pool: SqlitePool,
}

impl SqliteOrderStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a courier credential
    ///
    /// Credentials are issued outside this system; this is the write path
    /// used by provisioning tools and tests.
    pub async fn save_token(&self, token: &DeliveryAccountToken) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO delivery_account_tokens \
             (partner_name, account_username, user_id, token, expires_at, is_active) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (partner_name, account_username) DO UPDATE SET \
             user_id = excluded.user_id, token = excluded.token, \
             expires_at = excluded.expires_at, is_active = excluded.is_active",
        )
        .bind(token.partner_name().as_str())
        .bind(token.account_username().as_str())
        .bind(token.user_id().map(UserId::as_str))
        .bind(token.token().expose())
        .bind(token.expires_at().map(|dt| dt.to_rfc3339()))
        .bind(token.is_active())
        .execute(&self.pool)
        .await?;

        tracing::trace!(credential = %token.key(), "Saved courier credential");
        Ok(())
    }

    /// Records the role of an application user
    pub async fn set_role(&self, user: &UserId, role: Role) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role) VALUES (?, ?) \
             ON CONFLICT (user_id) DO UPDATE SET role = excluded.role",
        )
        .bind(user.as_str())
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        tracing::trace!(user = %user, role = %role, "Saved user role");
        Ok(())
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn backend(e: impl Into<CacheError>) -> StoreError {
    StoreError::Backend(anyhow::Error::new(e.into()))
}

fn domain(column: &'static str, e: DomainError) -> CacheError {
    CacheError::decode(column, e)
}

/// Parses an RFC 3339 column, accepting SQLite's `datetime('now')` text too
fn parse_datetime(column: &'static str, s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| CacheError::decode(column, format!("{s:?}: {e}")))
}

fn parse_optional_datetime(
    column: &'static str,
    s: Option<String>,
) -> Result<Option<DateTime<Utc>>, CacheError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(column, val).map(Some),
        _ => Ok(None),
    }
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn order_from_row(row: &SqliteRow) -> Result<Order, CacheError> {
    let id: String = row.try_get("id")?;
    let tracking_number: String = row.try_get("tracking_number")?;
    let created_by: String = row.try_get("created_by")?;
    let status: String = row.try_get("status")?;
    let delivery_partner: String = row.try_get("delivery_partner")?;
    let partner_order_id: Option<String> = row.try_get("delivery_partner_order_id")?;
    let delivery_account: Option<String> = row.try_get("delivery_account")?;
    let delivery_status: Option<String> = row.try_get("delivery_status")?;
    let receipt_received: bool = row.try_get("receipt_received")?;
    let receipt_received_at: Option<String> = row.try_get("receipt_received_at")?;
    let receipt_received_by: Option<String> = row.try_get("receipt_received_by")?;
    let invoice_id: Option<String> = row.try_get("delivery_partner_invoice_id")?;
    let updated_at: String = row.try_get("updated_at")?;

    let order = Order::new(
        OrderId::new(id).map_err(|e| domain("id", e))?,
        TrackingNumber::new(tracking_number).map_err(|e| domain("tracking_number", e))?,
        UserId::new(created_by).map_err(|e| domain("created_by", e))?,
    )
    .with_delivery_partner(
        PartnerName::new(delivery_partner).map_err(|e| domain("delivery_partner", e))?,
        partner_order_id
            .map(PartnerOrderId::new)
            .transpose()
            .map_err(|e| domain("delivery_partner_order_id", e))?,
    )
    .with_delivery_account(
        delivery_account
            .map(AccountUsername::new)
            .transpose()
            .map_err(|e| domain("delivery_account", e))?,
    )
    .with_status(OrderStatus::from_str(&status).map_err(|e| domain("status", e))?)
    .with_delivery_status(delivery_status)
    .with_receipt(
        receipt_received,
        parse_optional_datetime("receipt_received_at", receipt_received_at)?,
        receipt_received_by
            .map(UserId::new)
            .transpose()
            .map_err(|e| domain("receipt_received_by", e))?,
        invoice_id
            .map(InvoiceId::new)
            .transpose()
            .map_err(|e| domain("delivery_partner_invoice_id", e))?,
    )
    .with_updated_at(parse_datetime("updated_at", &updated_at)?);

    Ok(order)
}

fn token_from_row(row: &SqliteRow) -> Result<DeliveryAccountToken, CacheError> {
    let partner_name: String = row.try_get("partner_name")?;
    let account_username: String = row.try_get("account_username")?;
    let user_id: Option<String> = row.try_get("user_id")?;
    let token: String = row.try_get("token")?;
    let expires_at: Option<String> = row.try_get("expires_at")?;
    let is_active: bool = row.try_get("is_active")?;

    Ok(DeliveryAccountToken::new(
        PartnerName::new(partner_name).map_err(|e| domain("partner_name", e))?,
        AccountUsername::new(account_username).map_err(|e| domain("account_username", e))?,
        user_id
            .map(UserId::new)
            .transpose()
            .map_err(|e| domain("user_id", e))?,
        CourierToken::new(token),
    )
    .with_expires_at(parse_optional_datetime("expires_at", expires_at)?)
    .with_active(is_active))
}

fn orders_from_rows(rows: &[SqliteRow]) -> Result<Vec<Order>, CacheError> {
    rows.iter().map(order_from_row).collect()
}

// ============================================================================
// IOrderStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IOrderStore for SqliteOrderStore {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(order_from_row).transpose().map_err(backend)
    }

    async fn query(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let mut sql = String::from("SELECT * FROM orders WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref created_by) = filter.created_by {
            sql.push_str(" AND created_by = ?");
            binds.push(created_by.as_str().to_string());
        }

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            binds.push(status.as_str().to_string());
        }

        if let Some(ref partner) = filter.delivery_partner {
            sql.push_str(" AND delivery_partner = ?");
            binds.push(partner.as_str().to_string());
        }

        if let Some(ref account) = filter.delivery_account {
            sql.push_str(" AND delivery_account = ?");
            binds.push(account.as_str().to_string());
        }

        if filter.externally_tracked {
            sql.push_str(" AND delivery_partner_order_id IS NOT NULL");
        }

        sql.push_str(" ORDER BY id ASC");

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;
        orders_from_rows(&rows).map_err(backend)
    }

    async fn find_by_tracking_number(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE tracking_number = ?")
            .bind(tracking_number.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(order_from_row).transpose().map_err(backend)
    }

    async fn find_by_partner_order_id(
        &self,
        partner: &PartnerName,
        partner_order_id: &PartnerOrderId,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM orders \
             WHERE delivery_partner = ? AND delivery_partner_order_id = ? \
             ORDER BY id ASC LIMIT 1",
        )
        .bind(partner.as_str())
        .bind(partner_order_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(order_from_row).transpose().map_err(backend)
    }

    async fn upsert(&self, order: &Order) -> Result<(), StoreError> {
        // created_by is immutable once the row exists
        sqlx::query(
            "INSERT INTO orders \
             (id, tracking_number, created_by, status, delivery_partner, \
              delivery_partner_order_id, delivery_account, delivery_status, \
              receipt_received, receipt_received_at, receipt_received_by, \
              delivery_partner_invoice_id, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
             tracking_number = excluded.tracking_number, \
             status = excluded.status, \
             delivery_partner = excluded.delivery_partner, \
             delivery_partner_order_id = excluded.delivery_partner_order_id, \
             delivery_account = excluded.delivery_account, \
             delivery_status = excluded.delivery_status, \
             receipt_received = excluded.receipt_received, \
             receipt_received_at = excluded.receipt_received_at, \
             receipt_received_by = excluded.receipt_received_by, \
             delivery_partner_invoice_id = excluded.delivery_partner_invoice_id, \
             updated_at = excluded.updated_at",
        )
        .bind(order.id().as_str())
        .bind(order.tracking_number().as_str())
        .bind(order.created_by().as_str())
        .bind(order.status().as_str())
        .bind(order.delivery_partner().as_str())
        .bind(order.delivery_partner_order_id().map(PartnerOrderId::as_str))
        .bind(order.delivery_account().map(AccountUsername::as_str))
        .bind(order.delivery_status())
        .bind(order.receipt_received())
        .bind(order.receipt_received_at().map(|dt| dt.to_rfc3339()))
        .bind(order.receipt_received_by().map(UserId::as_str))
        .bind(order.delivery_partner_invoice_id().map(InvoiceId::as_str))
        .bind(order.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        tracing::trace!(order_id = %order.id(), "Saved order");
        Ok(())
    }

    async fn apply_update(&self, id: &OrderId, update: &OrderUpdate) -> Result<Order, StoreError> {
        if update.is_empty() {
            return self.get(id).await?.ok_or_else(|| StoreError::Conflict(id.clone()));
        }

        let receipt = update.receipt.as_ref();
        let has_receipt = receipt.is_some();

        // One statement so a concurrent UI write sees all or nothing.
        // Receipt stamps are never overwritten once set, nor is a completed
        // status, even one written after the caller read the order.
        let row = sqlx::query(
            "UPDATE orders SET \
             status = CASE WHEN status = ? THEN status ELSE COALESCE(?, status) END, \
             delivery_status = COALESCE(?, delivery_status), \
             receipt_received_at = CASE WHEN ? AND receipt_received = 0 THEN ? ELSE receipt_received_at END, \
             receipt_received_by = CASE WHEN ? AND receipt_received = 0 THEN ? ELSE receipt_received_by END, \
             delivery_partner_invoice_id = CASE WHEN ? AND receipt_received = 0 THEN ? ELSE delivery_partner_invoice_id END, \
             receipt_received = CASE WHEN ? THEN 1 ELSE receipt_received END, \
             updated_at = ? \
             WHERE id = ? \
             RETURNING *",
        )
        .bind(OrderStatus::Completed.as_str())
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.delivery_status.as_deref())
        .bind(has_receipt)
        .bind(receipt.map(|r| r.received_at.to_rfc3339()))
        .bind(has_receipt)
        .bind(receipt.and_then(|r| r.received_by.as_ref()).map(UserId::as_str))
        .bind(has_receipt)
        .bind(receipt.map(|r| r.invoice_id.as_str()))
        .bind(has_receipt)
        .bind(Utc::now().to_rfc3339())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(ref r) => {
                let order = order_from_row(r).map_err(backend)?;
                tracing::trace!(order_id = %id, "Applied order update");
                Ok(order)
            }
            None => {
                tracing::debug!(order_id = %id, "Order vanished before update");
                Err(StoreError::Conflict(id.clone()))
            }
        }
    }

    async fn delete(&self, id: &OrderId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        tracing::trace!(order_id = %id, deleted = result.rows_affected() > 0, "Deleted order");
        Ok(result.rows_affected() > 0)
    }

    async fn delete_if_deletable(&self, id: &OrderId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM orders \
             WHERE id = ? \
             AND receipt_received = 0 \
             AND status <> ? \
             AND delivery_partner_order_id IS NOT NULL",
        )
        .bind(id.as_str())
        .bind(OrderStatus::Completed.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        let deleted = result.rows_affected() > 0;
        tracing::trace!(order_id = %id, deleted, "Conditionally deleted order");
        Ok(deleted)
    }
}

// ============================================================================
// ITokenStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ITokenStore for SqliteOrderStore {
    async fn list_tokens(&self, partner: &PartnerName) -> anyhow::Result<Vec<DeliveryAccountToken>> {
        let rows = sqlx::query(
            "SELECT * FROM delivery_account_tokens WHERE partner_name = ? \
             ORDER BY account_username ASC",
        )
        .bind(partner.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut tokens = Vec::with_capacity(rows.len());
        for row in &rows {
            tokens.push(token_from_row(row)?);
        }
        Ok(tokens)
    }

    async fn get_token(
        &self,
        partner: &PartnerName,
        account: &AccountUsername,
    ) -> anyhow::Result<Option<DeliveryAccountToken>> {
        let row = sqlx::query(
            "SELECT * FROM delivery_account_tokens \
             WHERE partner_name = ? AND account_username = ?",
        )
        .bind(partner.as_str())
        .bind(account.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(token_from_row(r)?)),
            None => Ok(None),
        }
    }
}

// ============================================================================
// IUserDirectory implementation
// ============================================================================

#[async_trait::async_trait]
impl IUserDirectory for SqliteOrderStore {
    async fn role_of(&self, user: &UserId) -> anyhow::Result<Option<Role>> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = ?")
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await?;

        role.map(|r| Role::from_str(&r))
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid role stored for {}: {}", user, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_formats() {
        let rfc = parse_datetime("updated_at", "2026-03-01T10:00:00+00:00").unwrap();
        let sqlite = parse_datetime("updated_at", "2026-03-01 10:00:00").unwrap();
        assert_eq!(rfc, sqlite);
        assert!(parse_datetime("updated_at", "yesterday").is_err());
    }

    #[test]
    fn test_parse_optional_datetime_treats_empty_as_none() {
        assert_eq!(parse_optional_datetime("expires_at", None).unwrap(), None);
        assert_eq!(parse_optional_datetime("expires_at", Some(String::new())).unwrap(), None);
        assert!(parse_optional_datetime("expires_at", Some("2026-03-01T10:00:00Z".into()))
            .unwrap()
            .is_some());
    }
}
