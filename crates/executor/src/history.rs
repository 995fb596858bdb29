//! The durable order log as the rest of the service sees it: a writer
//! seam the worker and intake record through and a reader seam the API
//! serves from. Postgres backs both in production; tests swap in
//! recorders.

use {
    chrono::{DateTime, Utc},
    database::order_history,
    model::{OrderJob, QuoteResponse, Status},
    serde::Serialize,
    sqlx::{PgPool, types::BigDecimal},
};

/// One lifecycle transition on its way into the log.
#[derive(Clone, Debug)]
pub struct StatusRecord {
    pub order_id: String,
    pub status: Status,
    pub detail: Option<String>,
    pub link: Option<String>,
    pub tx_hash: Option<String>,
    pub executed_amount: Option<u64>,
    pub last_error: Option<String>,
}

impl StatusRecord {
    pub fn new(order_id: impl Into<String>, status: Status) -> Self {
        Self {
            order_id: order_id.into(),
            status,
            detail: None,
            link: None,
            tx_hash: None,
            executed_amount: None,
            last_error: None,
        }
    }
}

/// Writer side used by intake and the worker.
#[async_trait::async_trait]
pub trait OrderHistory: Send + Sync {
    /// Creates the order row with the initial `pending` trail entry.
    /// Idempotent on the order id.
    async fn insert_new(&self, job: &OrderJob) -> anyhow::Result<()>;

    async fn append_status(&self, record: StatusRecord) -> anyhow::Result<()>;

    /// Stores the winning quote on the order row without touching the
    /// status trail.
    async fn record_routing_decision(
        &self,
        order_id: &str,
        quote: &QuoteResponse,
    ) -> anyhow::Result<()>;
}

/// A history row shaped for the API: camelCase, amounts as strings.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub order_id: String,
    pub order_type: String,
    pub token_in: String,
    pub token_out: String,
    pub amount: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_response: Option<serde_json::Value>,
    pub status_history: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_link: Option<String>,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reader side used by the API.
#[async_trait::async_trait]
pub trait HistoryReader: Send + Sync {
    /// Rows by `updated_at` descending, strictly older than `cursor` when
    /// given. `limit` is clamped to [1, 200].
    async fn list(
        &self,
        cursor: Option<DateTime<Utc>>,
        limit: i64,
    ) -> anyhow::Result<Vec<HistoryRecord>>;

    async fn get(&self, order_id: &str) -> anyhow::Result<Option<HistoryRecord>>;
}

/// Both seams backed by the `order_history` table.
pub struct Postgres(pub PgPool);

#[async_trait::async_trait]
impl OrderHistory for Postgres {
    async fn insert_new(&self, job: &OrderJob) -> anyhow::Result<()> {
        let row = order_history::OrderHistory {
            order_id: job.order_id.clone(),
            order_type: "market".to_string(),
            token_in: job.request.token_in.clone(),
            token_out: job.request.token_out.clone(),
            amount: BigDecimal::from(job.request.amount),
            status: order_history::OrderStatus::Pending,
            status_history: serde_json::json!([{
                "status": Status::Pending,
                "detail": "Order accepted",
                "recordedAt": job.received_at.to_rfc3339(),
            }]),
            received_at: job.received_at,
            updated_at: job.received_at,
            ..Default::default()
        };
        let mut ex = self.0.acquire().await?;
        order_history::insert(&mut ex, &row).await?;
        Ok(())
    }

    async fn append_status(&self, record: StatusRecord) -> anyhow::Result<()> {
        let update = order_history::StatusUpdate {
            order_id: record.order_id,
            status: status_to_db(record.status),
            detail: record.detail,
            link: record.link,
            venue: None,
            tx_hash: record.tx_hash,
            executed_amount: record.executed_amount.map(BigDecimal::from),
            last_error: record.last_error,
            recorded_at: Utc::now(),
        };
        let mut ex = self.0.acquire().await?;
        order_history::append_status(&mut ex, &update).await?;
        Ok(())
    }

    async fn record_routing_decision(
        &self,
        order_id: &str,
        quote: &QuoteResponse,
    ) -> anyhow::Result<()> {
        let mut ex = self.0.acquire().await?;
        order_history::record_routing_decision(
            &mut ex,
            order_id,
            &quote.venue,
            &serde_json::to_value(quote)?,
        )
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl HistoryReader for Postgres {
    async fn list(
        &self,
        cursor: Option<DateTime<Utc>>,
        limit: i64,
    ) -> anyhow::Result<Vec<HistoryRecord>> {
        let mut ex = self.0.acquire().await?;
        let rows = order_history::list(&mut ex, cursor, limit).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get(&self, order_id: &str) -> anyhow::Result<Option<HistoryRecord>> {
        let mut ex = self.0.acquire().await?;
        let row = order_history::get(&mut ex, order_id).await?;
        Ok(row.map(Into::into))
    }
}

impl From<order_history::OrderHistory> for HistoryRecord {
    fn from(row: order_history::OrderHistory) -> Self {
        Self {
            order_id: row.order_id,
            order_type: row.order_type,
            token_in: row.token_in,
            token_out: row.token_out,
            amount: row.amount.to_string(),
            status: status_from_db(row.status),
            venue: row.venue,
            tx_hash: row.tx_hash,
            executed_amount: row.executed_amount.map(|amount| amount.to_string()),
            quote_response: row.quote_response,
            status_history: row.status_history,
            last_error: row.last_error,
            explorer_link: row.explorer_link,
            received_at: row.received_at,
            updated_at: row.updated_at,
        }
    }
}

fn status_to_db(status: Status) -> order_history::OrderStatus {
    match status {
        Status::Pending => order_history::OrderStatus::Pending,
        Status::Queued => order_history::OrderStatus::Queued,
        Status::Routing => order_history::OrderStatus::Routing,
        Status::Building => order_history::OrderStatus::Building,
        Status::Submitted => order_history::OrderStatus::Submitted,
        Status::Confirmed => order_history::OrderStatus::Confirmed,
        Status::Failed => order_history::OrderStatus::Failed,
    }
}

fn status_from_db(status: order_history::OrderStatus) -> Status {
    match status {
        order_history::OrderStatus::Pending => Status::Pending,
        order_history::OrderStatus::Queued => Status::Queued,
        order_history::OrderStatus::Routing => Status::Routing,
        order_history::OrderStatus::Building => Status::Building,
        order_history::OrderStatus::Submitted => Status::Submitted,
        order_history::OrderStatus::Confirmed => Status::Confirmed,
        order_history::OrderStatus::Failed => Status::Failed,
    }
}
