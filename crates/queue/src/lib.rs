//! The reliable queue between intake and the execution workers. Delivery
//! is at least once: a consumer crash mid-job leaves the payload on a
//! processing list from which it is reclaimed on the next startup, so
//! handlers must tolerate redelivery. Failed attempts are retried with
//! exponential backoff up to a fixed attempt ceiling; exhausted and
//! completed payloads are retained for inspection.

pub mod redis;

pub use self::redis::RedisQueue;

use {model::OrderJob, serde::{Deserialize, Serialize}, std::time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("queue transport error: {0}")]
    Transport(#[from] ::redis::RedisError),
    #[error("corrupt job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// What a consumer does with a dequeued job.
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Processes one job. The job is mutable so that progress markers
    /// (emitted statuses, last error) survive into the retried payload.
    /// An error propagates to the retry policy.
    async fn process(&self, job: &mut OrderJob) -> anyhow::Result<()>;

    /// Called once after the final attempt failed and the job moved to the
    /// failed retention list.
    async fn on_exhausted(&self, job: &OrderJob, error: &str);
}

/// Producer side of the queue, the only part intake needs.
#[async_trait::async_trait]
pub trait Enqueue: Send + Sync {
    async fn enqueue(&self, job: &OrderJob) -> Result<(), Error>;
}

/// Marks an error as pointless to retry: the same job will fail the same
/// way again. The queue skips the remaining attempts and moves the job
/// straight to the failed retention list.
#[derive(Debug)]
pub struct Permanent(anyhow::Error);

impl Permanent {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(err.into())
    }
}

impl std::fmt::Display for Permanent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for Permanent {}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(2_000),
            backoff_factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after the given failed attempt (1 based):
    /// `initial * factor^(attempt - 1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff * self.backoff_factor.saturating_pow(exponent)
    }
}

/// The payload that actually sits in the queue: the job plus attempt
/// bookkeeping. Retries carry the job as mutated by the failed attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub job: OrderJob,
    pub attempt: u32,
}

impl Envelope {
    pub fn first(job: OrderJob) -> Self {
        Self { job, attempt: 1 }
    }
}
