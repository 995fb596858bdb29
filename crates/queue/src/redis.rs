//! Redis implementation. The layout under the configured namespace is the
//! classic reliable list pattern:
//!
//! - `<ns>:wait` — list of envelopes ready to run
//! - `<ns>:processing` — envelopes currently held by a consumer
//! - `<ns>:delayed` — zset of retry envelopes scored by due time (ms)
//! - `<ns>:completed` / `<ns>:failed` — capped retention lists
//!
//! Consumers move payloads from wait to processing atomically with
//! RPOPLPUSH, so a crash mid-job leaves the payload on the processing list
//! where [`RedisQueue::reclaim_orphans`] finds it on the next startup.

use {
    crate::{Enqueue, Envelope, Error, JobHandler, RetryPolicy},
    ::redis::{AsyncCommands, aio::ConnectionManager},
    chrono::Utc,
    model::OrderJob,
    std::{sync::Arc, time::Duration},
    tokio::sync::watch,
};

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const PROMOTE_INTERVAL: Duration = Duration::from_millis(500);
const PROMOTE_BATCH: isize = 64;
/// How many completed/failed payloads to keep around for inspection.
const RETENTION: isize = 1_000;

#[derive(Clone, Debug)]
struct Keys {
    wait: String,
    processing: String,
    delayed: String,
    completed: String,
    failed: String,
}

impl Keys {
    fn new(namespace: &str) -> Self {
        Self {
            wait: format!("{namespace}:wait"),
            processing: format!("{namespace}:processing"),
            delayed: format!("{namespace}:delayed"),
            completed: format!("{namespace}:completed"),
            failed: format!("{namespace}:failed"),
        }
    }
}

pub struct RedisQueue {
    connection: ConnectionManager,
    keys: Keys,
    policy: RetryPolicy,
}

impl RedisQueue {
    pub async fn connect(url: &str, namespace: &str, policy: RetryPolicy) -> Result<Self, Error> {
        let client = ::redis::Client::open(url)?;
        let connection = client.get_connection_manager().await?;
        Ok(Self {
            connection,
            keys: Keys::new(namespace),
            policy,
        })
    }

    /// Moves payloads a crashed consumer left on the processing list back
    /// to the wait list. Returns how many were reclaimed. Run once at
    /// startup before consumers begin.
    pub async fn reclaim_orphans(&self) -> Result<u64, Error> {
        let mut connection = self.connection.clone();
        let mut reclaimed = 0;
        loop {
            let moved: Option<String> = connection
                .rpoplpush(&self.keys.processing, &self.keys.wait)
                .await?;
            if moved.is_none() {
                return Ok(reclaimed);
            }
            reclaimed += 1;
        }
    }

    /// Runs the consumer pool until `shutdown` flips to true. In-flight
    /// jobs finish before their consumer exits; queued jobs simply stay in
    /// redis for the next process.
    pub async fn run(
        self: Arc<Self>,
        handler: Arc<dyn JobHandler>,
        concurrency: usize,
        shutdown: watch::Receiver<bool>,
    ) {
        let mut tasks = Vec::new();
        {
            let queue = self.clone();
            let shutdown = shutdown.clone();
            tasks.push(tokio::spawn(async move { queue.promoter(shutdown).await }));
        }
        for index in 0..concurrency.max(1) {
            let queue = self.clone();
            let handler = handler.clone();
            let shutdown = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                queue.consumer(index, handler, shutdown).await;
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    async fn promoter(&self, mut shutdown: watch::Receiver<bool>) {
        let mut connection = self.connection.clone();
        while !*shutdown.borrow() {
            if let Err(err) = self.promote_due(&mut connection).await {
                tracing::warn!(?err, "promoting delayed jobs failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(PROMOTE_INTERVAL) => (),
                _ = shutdown.changed() => (),
            }
        }
    }

    /// Moves due retries from the delayed zset to the wait list. Only this
    /// process promotes, the ZREM guard merely protects against races with
    /// a restarting replica.
    async fn promote_due(&self, connection: &mut ConnectionManager) -> Result<u64, Error> {
        let now = Utc::now().timestamp_millis();
        let due: Vec<String> = connection
            .zrangebyscore_limit(&self.keys.delayed, "-inf", now, 0, PROMOTE_BATCH)
            .await?;
        let mut promoted = 0;
        for payload in due {
            let removed: i64 = connection.zrem(&self.keys.delayed, &payload).await?;
            if removed > 0 {
                let _: () = connection.lpush(&self.keys.wait, &payload).await?;
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    async fn consumer(
        &self,
        index: usize,
        handler: Arc<dyn JobHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut connection = self.connection.clone();
        while !*shutdown.borrow() {
            match self.step(&mut connection, handler.as_ref()).await {
                // Processed something; immediately look for more work.
                Ok(true) => (),
                Ok(false) => {
                    tokio::select! {
                        _ = tokio::time::sleep(POLL_INTERVAL) => (),
                        _ = shutdown.changed() => (),
                    }
                }
                Err(err) => {
                    tracing::warn!(index, ?err, "queue consumer error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
        tracing::debug!(index, "queue consumer stopped");
    }

    /// Takes and processes at most one job. Returns whether there was one.
    async fn step(
        &self,
        connection: &mut ConnectionManager,
        handler: &dyn JobHandler,
    ) -> Result<bool, Error> {
        let payload: Option<String> = connection
            .rpoplpush(&self.keys.wait, &self.keys.processing)
            .await?;
        let Some(payload) = payload else {
            return Ok(false);
        };
        let mut envelope: Envelope = match serde_json::from_str(&payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!(?err, "dead-lettering corrupt queue payload");
                let _: () = connection.lrem(&self.keys.processing, 1, &payload).await?;
                self.retain(connection, &self.keys.failed, &payload)
                    .await?;
                return Ok(true);
            }
        };

        let result = handler.process(&mut envelope.job).await;
        let _: () = connection.lrem(&self.keys.processing, 1, &payload).await?;

        match result {
            Ok(()) => {
                let record = serde_json::to_string(&serde_json::json!({
                    "job": envelope.job,
                    "completedAt": Utc::now().to_rfc3339(),
                }))?;
                self.retain(connection, &self.keys.completed, &record)
                    .await?;
            }
            Err(err) => {
                let error = format!("{err:#}");
                let retryable = !err.is::<crate::Permanent>();
                if retryable && envelope.attempt < self.policy.max_attempts {
                    let backoff = self.policy.backoff(envelope.attempt);
                    envelope.attempt += 1;
                    let due = now_millis() + i64::try_from(backoff.as_millis()).unwrap_or(i64::MAX);
                    // The retried payload carries the job as the failed
                    // attempt left it, emitted statuses included.
                    let retry = serde_json::to_string(&envelope)?;
                    let _: () = connection.zadd(&self.keys.delayed, retry, due).await?;
                    tracing::info!(
                        order_id = %envelope.job.order_id,
                        attempt = envelope.attempt,
                        ?backoff,
                        %error,
                        "job failed, retry scheduled",
                    );
                } else {
                    let record = serde_json::to_string(&serde_json::json!({
                        "job": envelope.job,
                        "error": error,
                        "failedAt": Utc::now().to_rfc3339(),
                    }))?;
                    self.retain(connection, &self.keys.failed, &record)
                        .await?;
                    tracing::error!(
                        order_id = %envelope.job.order_id,
                        attempts = envelope.attempt,
                        %error,
                        "job exhausted its retries",
                    );
                    handler.on_exhausted(&envelope.job, &error).await;
                }
            }
        }
        Ok(true)
    }

    async fn retain(
        &self,
        connection: &mut ConnectionManager,
        key: &str,
        record: &str,
    ) -> Result<(), Error> {
        let _: () = connection.lpush(key, record).await?;
        let _: () = connection.ltrim(key, 0, RETENTION - 1).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Enqueue for RedisQueue {
    async fn enqueue(&self, job: &OrderJob) -> Result<(), Error> {
        let payload = serde_json::to_string(&Envelope::first(job.clone()))?;
        let mut connection = self.connection.clone();
        let _: () = connection.lpush(&self.keys.wait, payload).await?;
        Ok(())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        model::{OrderRequest, OrderType},
        std::sync::Mutex,
    };

    struct FlakyHandler {
        attempts: Mutex<u32>,
        fail_first: u32,
        exhausted: Mutex<Vec<String>>,
        done: watch::Sender<bool>,
    }

    #[async_trait::async_trait]
    impl JobHandler for FlakyHandler {
        async fn process(&self, job: &mut OrderJob) -> anyhow::Result<()> {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            job.last_error = Some(format!("attempt {}", *attempts));
            if *attempts <= self.fail_first {
                anyhow::bail!("transient failure {}", *attempts);
            }
            let _ = self.done.send(true);
            Ok(())
        }

        async fn on_exhausted(&self, _job: &OrderJob, error: &str) {
            self.exhausted.lock().unwrap().push(error.to_string());
            let _ = self.done.send(true);
        }
    }

    fn job() -> OrderJob {
        OrderJob::new(OrderRequest {
            token_in: "A".to_string(),
            token_out: "B".to_string(),
            amount: 1,
            order_type: OrderType::Market,
        })
    }

    // Requires a local redis, mirrors the ignored postgres tests in the
    // database crate.
    #[tokio::test(flavor = "multi_thread")]
    #[ignore]
    async fn redis_retries_until_success() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            backoff_factor: 2,
        };
        let queue = Arc::new(
            RedisQueue::connect("redis://127.0.0.1/", "test:retries", policy)
                .await
                .unwrap(),
        );
        let (done_tx, mut done_rx) = watch::channel(false);
        let handler = Arc::new(FlakyHandler {
            attempts: Mutex::new(0),
            fail_first: 1,
            exhausted: Mutex::new(Vec::new()),
            done: done_tx,
        });

        queue.enqueue(&job()).await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = tokio::spawn(queue.clone().run(handler.clone(), 2, shutdown_rx));

        tokio::time::timeout(Duration::from_secs(5), done_rx.changed())
            .await
            .expect("job did not finish in time")
            .unwrap();
        let _ = shutdown_tx.send(true);
        runner.await.unwrap();

        assert_eq!(*handler.attempts.lock().unwrap(), 2);
        assert!(handler.exhausted.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore]
    async fn redis_exhausts_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(10),
            backoff_factor: 2,
        };
        let queue = Arc::new(
            RedisQueue::connect("redis://127.0.0.1/", "test:exhaust", policy)
                .await
                .unwrap(),
        );
        let (done_tx, mut done_rx) = watch::channel(false);
        let handler = Arc::new(FlakyHandler {
            attempts: Mutex::new(0),
            // Always fails.
            fail_first: u32::MAX,
            exhausted: Mutex::new(Vec::new()),
            done: done_tx,
        });

        queue.enqueue(&job()).await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = tokio::spawn(queue.clone().run(handler.clone(), 1, shutdown_rx));

        tokio::time::timeout(Duration::from_secs(5), done_rx.changed())
            .await
            .expect("job was not exhausted in time")
            .unwrap();
        let _ = shutdown_tx.send(true);
        runner.await.unwrap();

        assert_eq!(*handler.attempts.lock().unwrap(), 2);
        assert_eq!(handler.exhausted.lock().unwrap().len(), 1);
    }
}
