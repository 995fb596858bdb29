//! Drains the order queue and drives each job through the lifecycle state
//! machine:
//!
//! ```text
//! (enter) -> queued -> routing -> building -> submitted -> confirmed
//!                                     |
//!                                  failed  <- (from any non-terminal, on error)
//! ```
//!
//! Every transition is recorded to history and fanned out to the hub.
//! Emissions are idempotent across queue redeliveries through the
//! `emitted_statuses` set carried on the job payload; `failed` is the one
//! status that may recur, with refreshed detail, as retries burn down.

use {
    crate::{
        history::{OrderHistory, StatusRecord},
        hub::Hub,
        rate_limit::FixedWindow,
    },
    chain::{Cluster, Submitter, Wallet, explorer_tx_link},
    model::{OrderJob, Status},
    prometheus::IntCounter,
    std::sync::Arc,
};

pub struct Worker {
    router: router::Router,
    history: Arc<dyn OrderHistory>,
    hub: Arc<Hub>,
    submitter: Arc<dyn Submitter>,
    wallet: Arc<Wallet>,
    limiter: Arc<FixedWindow>,
    explorer_url: String,
    cluster: Cluster,
    metrics: Metrics,
}

struct Metrics {
    confirmed: IntCounter,
    failed: IntCounter,
}

impl Metrics {
    fn new() -> Self {
        let confirmed =
            IntCounter::new("orders_confirmed", "Orders that reached confirmation").unwrap();
        let failed = IntCounter::new("orders_failed", "Order attempts that failed").unwrap();
        // Re-registration only happens in tests where several workers
        // share the process registry.
        let _ = observe::metrics::get_registry().register(Box::new(confirmed.clone()));
        let _ = observe::metrics::get_registry().register(Box::new(failed.clone()));
        Self { confirmed, failed }
    }
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        router: router::Router,
        history: Arc<dyn OrderHistory>,
        hub: Arc<Hub>,
        submitter: Arc<dyn Submitter>,
        wallet: Arc<Wallet>,
        limiter: Arc<FixedWindow>,
        explorer_url: String,
        cluster: Cluster,
    ) -> Self {
        Self {
            router,
            history,
            hub,
            submitter,
            wallet,
            limiter,
            explorer_url,
            cluster,
            metrics: Metrics::new(),
        }
    }

    async fn execute(&self, job: &mut OrderJob) -> anyhow::Result<()> {
        let queued = StatusRecord::new(&job.order_id, Status::Queued);
        self.emit(job, queued).await;
        let routing = StatusRecord::new(&job.order_id, Status::Routing);
        self.emit(job, routing).await;

        self.limiter.acquire().await;

        let routed = self.router.find_best_route(job).await?;
        let quote = routed.plan.quote.clone();
        if let Err(err) = self
            .history
            .record_routing_decision(&job.order_id, &quote)
            .await
        {
            tracing::warn!(order_id = %job.order_id, ?err, "failed to persist routing decision");
        }

        let building = StatusRecord::new(&job.order_id, Status::Building);
        self.emit(job, building).await;
        let built = router::build_transaction(&routed.plan, job, self.wallet.pubkey())
            .await
            .map_err(permanence)?;

        let signature = self.submitter.submit(built, &self.wallet).await?;
        let sig = signature.to_string();
        job.last_tx_signature = Some(sig.clone());
        let link = explorer_tx_link(&self.explorer_url, &sig, self.cluster);
        let mut submitted = StatusRecord::new(&job.order_id, Status::Submitted);
        submitted.detail = Some(sig.clone());
        submitted.link = Some(link.clone());
        submitted.tx_hash = Some(sig.clone());
        self.emit(job, submitted).await;

        self.submitter.confirm(&signature).await?;
        let mut confirmed = StatusRecord::new(&job.order_id, Status::Confirmed);
        confirmed.detail = Some(sig.clone());
        confirmed.link = Some(link);
        confirmed.tx_hash = Some(sig);
        confirmed.executed_amount = Some(quote.estimated_out);
        self.emit(job, confirmed).await;
        self.metrics.confirmed.inc();
        Ok(())
    }

    /// Records the status to history and delivers it to the hub. Skipped
    /// when the job already emitted the status; `failed` always goes out
    /// so retries can refresh the error detail.
    async fn emit(&self, job: &mut OrderJob, record: StatusRecord) {
        let first = job.mark_emitted(record.status);
        if !first && record.status != Status::Failed {
            return;
        }
        if let Err(err) = self.history.append_status(record.clone()).await {
            tracing::warn!(
                order_id = %record.order_id,
                status = %record.status,
                ?err,
                "failed to record status",
            );
        }
        self.hub
            .send_status(&record.order_id, record.status, record.detail, record.link);
    }
}

/// Errors that repeat identically on retry are wrapped so the queue stops
/// retrying them.
fn permanence(err: dex::Error) -> anyhow::Error {
    if err.is_permanent() {
        anyhow::Error::new(queue::Permanent::new(err))
    } else {
        err.into()
    }
}

#[async_trait::async_trait]
impl queue::JobHandler for Worker {
    async fn process(&self, job: &mut OrderJob) -> anyhow::Result<()> {
        match self.execute(job).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let message = format!("{err:#}");
                job.last_error = Some(message.clone());
                let mut record = StatusRecord::new(&job.order_id, Status::Failed);
                record.detail = Some(message.clone());
                record.last_error = Some(message);
                self.emit(job, record).await;
                self.metrics.failed.inc();
                // The queue applies the retry policy.
                Err(err)
            }
        }
    }

    async fn on_exhausted(&self, job: &OrderJob, error: &str) {
        // Final failure: make sure the history row carries the terminal
        // state even if the last attempt's write was lost.
        let mut record = StatusRecord::new(&job.order_id, Status::Failed);
        record.detail = Some(error.to_string());
        record.last_error = Some(error.to_string());
        if let Err(err) = self.history.append_status(record).await {
            tracing::warn!(order_id = %job.order_id, ?err, "failed to record exhausted job");
        }
    }
}
