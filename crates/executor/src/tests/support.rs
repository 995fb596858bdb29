//! Stand-ins for the durable collaborators. Each records what flowed
//! through it so scenario tests can assert on the exact trail an order
//! left behind.

use {
    crate::history::{HistoryRecord, HistoryReader, OrderHistory, StatusRecord},
    chain::{BuiltTransaction, Submitter, Wallet},
    chrono::{DateTime, Utc},
    model::{OrderJob, QuoteResponse, Status},
    solana_sdk::signature::Signature,
    std::sync::Mutex,
};

/// In-memory order log: the writer seam records, the reader seam serves
/// whatever was seeded.
#[derive(Default)]
pub struct RecordingHistory {
    pub inserted: Mutex<Vec<OrderJob>>,
    pub statuses: Mutex<Vec<StatusRecord>>,
    pub decisions: Mutex<Vec<(String, QuoteResponse)>>,
    pub listing: Mutex<Vec<HistoryRecord>>,
}

impl RecordingHistory {
    pub fn statuses_for(&self, order_id: &str) -> Vec<Status> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.order_id == order_id)
            .map(|record| record.status)
            .collect()
    }

    pub fn last_record(&self, order_id: &str) -> Option<StatusRecord> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.order_id == order_id)
            .next_back()
            .cloned()
    }

    pub fn seed_listing(&self, order_id: &str, offset_secs: i64) {
        let updated_at = DateTime::<Utc>::from_timestamp(offset_secs, 0).unwrap();
        self.listing.lock().unwrap().push(HistoryRecord {
            order_id: order_id.to_string(),
            order_type: "market".to_string(),
            token_in: "MINTA".to_string(),
            token_out: "MINTB".to_string(),
            amount: "1000000".to_string(),
            status: Status::Pending,
            venue: None,
            tx_hash: None,
            executed_amount: None,
            quote_response: None,
            status_history: serde_json::json!([]),
            last_error: None,
            explorer_link: None,
            received_at: updated_at,
            updated_at,
        });
    }
}

#[async_trait::async_trait]
impl OrderHistory for RecordingHistory {
    async fn insert_new(&self, job: &OrderJob) -> anyhow::Result<()> {
        self.inserted.lock().unwrap().push(job.clone());
        Ok(())
    }

    async fn append_status(&self, record: StatusRecord) -> anyhow::Result<()> {
        self.statuses.lock().unwrap().push(record);
        Ok(())
    }

    async fn record_routing_decision(
        &self,
        order_id: &str,
        quote: &QuoteResponse,
    ) -> anyhow::Result<()> {
        self.decisions
            .lock()
            .unwrap()
            .push((order_id.to_string(), quote.clone()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl HistoryReader for RecordingHistory {
    async fn list(
        &self,
        cursor: Option<DateTime<Utc>>,
        limit: i64,
    ) -> anyhow::Result<Vec<HistoryRecord>> {
        let mut rows = self.listing.lock().unwrap().clone();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(cursor) = cursor {
            rows.retain(|row| row.updated_at < cursor);
        }
        rows.truncate(usize::try_from(limit.clamp(1, 200)).unwrap());
        Ok(rows)
    }

    async fn get(&self, order_id: &str) -> anyhow::Result<Option<HistoryRecord>> {
        Ok(self
            .listing
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.order_id == order_id)
            .cloned())
    }
}

/// Producer-side queue stub.
#[derive(Default)]
pub struct InMemoryQueue {
    pub jobs: Mutex<Vec<OrderJob>>,
    pub fail: bool,
}

impl InMemoryQueue {
    pub fn failing() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait::async_trait]
impl queue::Enqueue for InMemoryQueue {
    async fn enqueue(&self, job: &OrderJob) -> Result<(), queue::Error> {
        if self.fail {
            return Err(queue::Error::Transport(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "stub enqueue failure",
            ))));
        }
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}

/// Chain stub with a fixed signature and scriptable failure points.
pub struct StubSubmitter {
    pub signature: Signature,
    pub fail_submit: bool,
    pub fail_confirm: bool,
    pub submissions: Mutex<u32>,
}

impl StubSubmitter {
    pub fn confirming() -> Self {
        Self {
            signature: Signature::new_unique(),
            fail_submit: false,
            fail_confirm: false,
            submissions: Mutex::new(0),
        }
    }

    pub fn failing_submit() -> Self {
        Self {
            fail_submit: true,
            ..Self::confirming()
        }
    }

    pub fn failing_confirm() -> Self {
        Self {
            fail_confirm: true,
            ..Self::confirming()
        }
    }
}

#[async_trait::async_trait]
impl Submitter for StubSubmitter {
    async fn submit(
        &self,
        _built: BuiltTransaction,
        _wallet: &Wallet,
    ) -> Result<Signature, chain::Error> {
        if self.fail_submit {
            return Err(chain::Error::Transport("stub submit failure".to_string()));
        }
        *self.submissions.lock().unwrap() += 1;
        Ok(self.signature)
    }

    async fn confirm(&self, signature: &Signature) -> Result<(), chain::Error> {
        if self.fail_confirm {
            return Err(chain::Error::TransactionFailed(
                *signature,
                "stub confirm failure".to_string(),
            ));
        }
        Ok(())
    }
}
