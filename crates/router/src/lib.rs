//! Picks the venue an order executes on. Every registered venue is asked
//! for a quote concurrently under its own deadline; the best admitted
//! quote wins. The router is stateless and never retries — redelivery is
//! the queue's job.

use {
    dex::Venue,
    model::{OrderJob, QuoteRequest, QuoteResponse},
    serde::Serialize,
    std::time::Duration,
    thiserror::Error as ThisError,
};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Unable to fetch quotes: {}", format_reasons(.reasons))]
    NoQuotes {
        /// Venue label and why it did not quote, in registration order.
        reasons: Vec<(String, String)>,
    },
}

fn format_reasons(reasons: &[(String, String)]) -> String {
    reasons
        .iter()
        .map(|(venue, reason)| format!("{venue}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// The winning venue together with its quote. The worker builds the swap
/// through [`build_transaction`], at most once.
#[derive(Clone, Debug)]
pub struct RoutePlan {
    pub winner: Venue,
    pub quote: QuoteResponse,
}

/// Builds the transaction for a finished routing pass. Free function
/// instead of a closure on the plan so that nothing captures hidden state.
pub async fn build_transaction(
    plan: &RoutePlan,
    job: &OrderJob,
    payer: solana_sdk::pubkey::Pubkey,
) -> Result<chain::BuiltTransaction, dex::Error> {
    plan.winner.build_swap(job, &plan.quote, payer).await
}

/// One venue's showing in a routing pass.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueOutcome {
    pub venue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_out: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Everything that happened during one routing pass, losers included.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub order_id: String,
    pub outcomes: Vec<VenueOutcome>,
    pub winner: String,
}

pub struct Routed {
    pub plan: RoutePlan,
    pub decision: RoutingDecision,
}

pub struct Router {
    venues: Vec<Venue>,
    quote_timeout: Duration,
    slippage_bps: u32,
}

impl Router {
    pub fn new(venues: Vec<Venue>, quote_timeout: Duration, slippage_bps: u32) -> Self {
        Self {
            venues,
            quote_timeout,
            slippage_bps: slippage_bps.clamp(1, 10_000),
        }
    }

    pub fn venues(&self) -> &[Venue] {
        &self.venues
    }

    /// Queries every venue concurrently and picks the admitted quote with
    /// the highest output. Ties go to the venue registered first.
    pub async fn find_best_route(&self, job: &OrderJob) -> Result<Routed, Error> {
        let request = QuoteRequest {
            token_in: job.request.token_in.clone(),
            token_out: job.request.token_out.clone(),
            amount: job.request.amount,
            slippage_bps: self.slippage_bps,
        };

        let quotes = futures::future::join_all(self.venues.iter().map(|venue| async {
            tokio::time::timeout(self.quote_timeout, venue.quote(&request)).await
        }))
        .await;

        let mut outcomes = Vec::with_capacity(self.venues.len());
        let mut best: Option<(&Venue, QuoteResponse)> = None;
        for (venue, quote) in self.venues.iter().zip(quotes) {
            match quote {
                Ok(Ok(quote)) => {
                    outcomes.push(VenueOutcome {
                        venue: venue.label().to_string(),
                        estimated_out: Some(quote.estimated_out),
                        reason: None,
                    });
                    if best
                        .as_ref()
                        .is_none_or(|(_, best)| quote.estimated_out > best.estimated_out)
                    {
                        best = Some((venue, quote));
                    }
                }
                Ok(Err(err)) => outcomes.push(VenueOutcome {
                    venue: venue.label().to_string(),
                    estimated_out: None,
                    reason: Some(err.to_string()),
                }),
                Err(_) => outcomes.push(VenueOutcome {
                    venue: venue.label().to_string(),
                    estimated_out: None,
                    reason: Some(format!(
                        "no quote within {}ms",
                        self.quote_timeout.as_millis()
                    )),
                }),
            }
        }

        let Some((winner, quote)) = best else {
            let reasons = outcomes
                .into_iter()
                .map(|outcome| {
                    let reason = outcome.reason.unwrap_or_else(|| "no quote".to_string());
                    (outcome.venue, reason)
                })
                .collect();
            return Err(Error::NoQuotes { reasons });
        };

        let decision = RoutingDecision {
            order_id: job.order_id.clone(),
            outcomes,
            winner: winner.label().to_string(),
        };
        tracing::info!(
            order_id = %job.order_id,
            decision = %serde_json::to_string(&decision).unwrap_or_default(),
            "routing decision",
        );

        Ok(Routed {
            plan: RoutePlan {
                winner: winner.clone(),
                quote,
            },
            decision,
        })
    }
}
