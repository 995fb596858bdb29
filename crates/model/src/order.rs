use {
    crate::{order_id, status::Status},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::collections::HashSet,
};

/// Only immediate execution orders are supported. The tag leaves room for
/// limit or conditional variants without a wire format change.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Market,
}

/// A client submitted swap intent. Immutable once accepted; `amount` is in
/// the smallest on-chain unit of `token_in`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount: u64,
    pub order_type: OrderType,
}

/// The unit of work flowing through the queue. Owned by the queue between
/// enqueue and dequeue and by exactly one worker while processing.
///
/// `emitted_statuses` rides along on the payload so that queue redeliveries
/// of the same job do not produce duplicate lifecycle entries.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderJob {
    pub order_id: String,
    #[serde(flatten)]
    pub request: OrderRequest,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub emitted_statuses: HashSet<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tx_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl OrderJob {
    pub fn new(request: OrderRequest) -> Self {
        Self {
            order_id: order_id::generate(),
            request,
            received_at: Utc::now(),
            emitted_statuses: HashSet::new(),
            last_tx_signature: None,
            last_error: None,
        }
    }

    /// Returns true the first time `status` is marked for this job. Used by
    /// the worker to keep lifecycle emissions idempotent across queue
    /// redeliveries.
    pub fn mark_emitted(&mut self, status: Status) -> bool {
        self.emitted_statuses.insert(status)
    }
}
