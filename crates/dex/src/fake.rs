//! A scriptable venue for tests. Behaves like a real venue from the
//! router's point of view while letting tests dictate prices, failures and
//! latency per instance.

use {
    crate::Error,
    chain::BuiltTransaction,
    model::{OrderJob, QuoteRequest, QuoteResponse},
    solana_sdk::{pubkey::Pubkey, transaction::Transaction},
    std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    },
};

#[derive(Clone, Debug)]
enum QuoteBehavior {
    Ok { estimated_out: u64, fee_bps: u32 },
    Fail(Error),
    /// Sleeps for the given duration before failing; long enough values
    /// let tests exercise the router deadline.
    Hang(Duration),
}

#[derive(Clone, Debug)]
enum BuildBehavior {
    Ok,
    Fail(Error),
}

#[derive(Clone)]
pub struct Fake {
    label: String,
    quote_behavior: QuoteBehavior,
    build_behavior: BuildBehavior,
    quote_calls: Arc<AtomicUsize>,
    build_calls: Arc<AtomicUsize>,
}

impl Fake {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            quote_behavior: QuoteBehavior::Ok {
                estimated_out: 1_000_000,
                fee_bps: 30,
            },
            build_behavior: BuildBehavior::Ok,
            quote_calls: Arc::new(AtomicUsize::new(0)),
            build_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn quoting(mut self, estimated_out: u64) -> Self {
        self.quote_behavior = QuoteBehavior::Ok {
            estimated_out,
            fee_bps: 30,
        };
        self
    }

    pub fn failing_quotes(mut self, error: Error) -> Self {
        self.quote_behavior = QuoteBehavior::Fail(error);
        self
    }

    pub fn hanging_quotes(mut self, delay: Duration) -> Self {
        self.quote_behavior = QuoteBehavior::Hang(delay);
        self
    }

    pub fn failing_builds(mut self, error: Error) -> Self {
        self.build_behavior = BuildBehavior::Fail(error);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn build_calls(&self) -> usize {
        self.build_calls.load(Ordering::SeqCst)
    }

    pub async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, Error> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        match &self.quote_behavior {
            QuoteBehavior::Ok {
                estimated_out,
                fee_bps,
            } => Ok(QuoteResponse {
                venue: self.label.clone(),
                estimated_out: *estimated_out,
                min_out: model::quote::min_out(*estimated_out, request.slippage_bps),
                price_impact_bps: 10,
                fee_bps: *fee_bps,
                pool_id: format!("{}-pool", self.label),
                route_meta: None,
                request: request.clone(),
            }),
            QuoteBehavior::Fail(error) => Err(error.clone()),
            QuoteBehavior::Hang(delay) => {
                tokio::time::sleep(*delay).await;
                Err(Error::Transport("venue timed out".to_string()))
            }
        }
    }

    pub async fn build_swap(
        &self,
        _job: &OrderJob,
        _quote: &QuoteResponse,
        _payer: Pubkey,
    ) -> Result<BuiltTransaction, Error> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        match &self.build_behavior {
            BuildBehavior::Ok => Ok(BuiltTransaction {
                transaction: Transaction::default(),
                extra_signers: vec![],
            }),
            BuildBehavior::Fail(error) => Err(error.clone()),
        }
    }
}
