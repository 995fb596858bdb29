//! Append-only log of every order the service has accepted, together with
//! its lifecycle trail. Rows are created on intake and updated by the
//! execution worker; nothing here ever deletes a row.

use sqlx::{
    PgConnection,
    types::chrono::{DateTime, Utc},
};

/// Mirrors [`model::Status`] for the `status` column.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "OrderStatus")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Queued,
    Routing,
    Building,
    Submitted,
    Confirmed,
    Failed,
}

/// One row in the `order_history` table.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct OrderHistory {
    pub order_id: String,
    pub order_type: String,
    pub token_in: String,
    pub token_out: String,
    pub amount: sqlx::types::BigDecimal,
    pub status: OrderStatus,
    pub venue: Option<String>,
    pub tx_hash: Option<String>,
    pub executed_amount: Option<sqlx::types::BigDecimal>,
    pub quote_response: Option<serde_json::Value>,
    /// JSON array of `{status, detail?, link?, recordedAt}` entries in
    /// emission order.
    pub status_history: serde_json::Value,
    pub last_error: Option<String>,
    pub explorer_link: Option<String>,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for OrderHistory {
    fn default() -> Self {
        let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        Self {
            order_id: Default::default(),
            order_type: "market".to_string(),
            token_in: Default::default(),
            token_out: Default::default(),
            amount: Default::default(),
            status: Default::default(),
            venue: Default::default(),
            tx_hash: Default::default(),
            executed_amount: Default::default(),
            quote_response: Default::default(),
            status_history: serde_json::Value::Array(vec![]),
            last_error: Default::default(),
            explorer_link: Default::default(),
            received_at: epoch,
            updated_at: epoch,
        }
    }
}

/// Inserts a new order row. Idempotent on the primary key so that retried
/// intake requests cannot fail on a duplicate.
pub async fn insert(ex: &mut PgConnection, order: &OrderHistory) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO order_history (
    order_id,
    order_type,
    token_in,
    token_out,
    amount,
    status,
    venue,
    tx_hash,
    executed_amount,
    quote_response,
    status_history,
    last_error,
    explorer_link,
    received_at,
    updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
ON CONFLICT (order_id) DO NOTHING
    "#;
    sqlx::query(QUERY)
        .bind(&order.order_id)
        .bind(&order.order_type)
        .bind(&order.token_in)
        .bind(&order.token_out)
        .bind(&order.amount)
        .bind(order.status)
        .bind(&order.venue)
        .bind(&order.tx_hash)
        .bind(&order.executed_amount)
        .bind(&order.quote_response)
        .bind(&order.status_history)
        .bind(&order.last_error)
        .bind(&order.explorer_link)
        .bind(order.received_at)
        .bind(order.updated_at)
        .execute(ex)
        .await?;
    Ok(())
}

/// Everything a lifecycle transition may change on the order row. The
/// optional side fields only overwrite when set.
#[derive(Clone, Debug, Default)]
pub struct StatusUpdate {
    pub order_id: String,
    pub status: OrderStatus,
    pub detail: Option<String>,
    pub link: Option<String>,
    pub venue: Option<String>,
    pub tx_hash: Option<String>,
    pub executed_amount: Option<sqlx::types::BigDecimal>,
    pub last_error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl StatusUpdate {
    fn trail_entry(&self) -> serde_json::Value {
        let mut entry = serde_json::json!({
            "status": status_str(self.status),
            "recordedAt": self.recorded_at.to_rfc3339(),
        });
        if let Some(detail) = &self.detail {
            entry["detail"] = serde_json::Value::String(detail.clone());
        }
        if let Some(link) = &self.link {
            entry["link"] = serde_json::Value::String(link.clone());
        }
        entry
    }
}

fn status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Queued => "queued",
        OrderStatus::Routing => "routing",
        OrderStatus::Building => "building",
        OrderStatus::Submitted => "submitted",
        OrderStatus::Confirmed => "confirmed",
        OrderStatus::Failed => "failed",
    }
}

/// Atomically sets the latest status, appends one entry to the status trail
/// and bumps `updated_at`. Side fields only change when the update carries
/// them. A missing row is logged and tolerated because history writes must
/// never take the worker down.
pub async fn append_status(ex: &mut PgConnection, update: &StatusUpdate) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
UPDATE order_history
SET status = $2,
    status_history = status_history || $3::jsonb,
    updated_at = $4,
    venue = COALESCE($5, venue),
    tx_hash = COALESCE($6, tx_hash),
    executed_amount = COALESCE($7, executed_amount),
    last_error = COALESCE($8, last_error),
    explorer_link = COALESCE($9, explorer_link)
WHERE order_id = $1
    "#;
    let result = sqlx::query(QUERY)
        .bind(&update.order_id)
        .bind(update.status)
        .bind(update.trail_entry())
        .bind(update.recorded_at)
        .bind(&update.venue)
        .bind(&update.tx_hash)
        .bind(&update.executed_amount)
        .bind(&update.last_error)
        .bind(&update.link)
        .execute(ex)
        .await?;
    if result.rows_affected() == 0 {
        tracing::warn!(order_id = %update.order_id, status = ?update.status, "status update for unknown order");
    }
    Ok(())
}

/// Stores the winning quote on the order row. Not a lifecycle transition:
/// does not touch the status trail or `updated_at`.
pub async fn record_routing_decision(
    ex: &mut PgConnection,
    order_id: &str,
    venue: &str,
    quote: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
UPDATE order_history
SET venue = $2,
    quote_response = $3
WHERE order_id = $1
    "#;
    sqlx::query(QUERY)
        .bind(order_id)
        .bind(venue)
        .bind(quote)
        .execute(ex)
        .await?;
    Ok(())
}

/// Returns up to `limit` rows ordered by `updated_at` descending, starting
/// strictly below `cursor` when one is given. `limit` outside [1, 200] is
/// clamped.
pub async fn list(
    ex: &mut PgConnection,
    cursor: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<OrderHistory>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT *
FROM order_history
WHERE $1::timestamptz IS NULL OR updated_at < $1
ORDER BY updated_at DESC
LIMIT $2
    "#;
    sqlx::query_as(QUERY)
        .bind(cursor)
        .bind(limit.clamp(1, 200))
        .fetch_all(ex)
        .await
}

pub async fn get(
    ex: &mut PgConnection,
    order_id: &str,
) -> Result<Option<OrderHistory>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT *
FROM order_history
WHERE order_id = $1
    "#;
    sqlx::query_as(QUERY).bind(order_id).fetch_optional(ex).await
}
