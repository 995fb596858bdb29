//! Accepts raw order payloads: validates, assigns the order id, seeds the
//! history row and hands the job to the queue. Fast and non-blocking —
//! nothing here waits on routing or the chain.

use {
    crate::{history::OrderHistory, hub::Hub},
    anyhow::Context,
    model::{OrderJob, OrderRequest, OrderType, Status},
    queue::Enqueue,
    serde_json::Value,
    std::sync::Arc,
    thiserror::Error as ThisError,
};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Invalid payload")]
    Validation { issues: Vec<String> },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct Intake {
    history: Arc<dyn OrderHistory>,
    queue: Arc<dyn Enqueue>,
    hub: Arc<Hub>,
}

impl Intake {
    pub fn new(history: Arc<dyn OrderHistory>, queue: Arc<dyn Enqueue>, hub: Arc<Hub>) -> Self {
        Self {
            history,
            queue,
            hub,
        }
    }

    /// Validates and enqueues one order. On success the `pending` status
    /// has been recorded and delivered before the job is returned.
    pub async fn submit(&self, payload: &Value) -> Result<OrderJob, Error> {
        let request = validate(payload)?;
        let job = OrderJob::new(request);
        self.history
            .insert_new(&job)
            .await
            .context("recording new order")?;
        self.queue.enqueue(&job).await.context("enqueueing order")?;
        self.hub.send_status(
            &job.order_id,
            Status::Pending,
            Some("Order accepted".to_string()),
            None,
        );
        tracing::info!(order_id = %job.order_id, token_in = %job.request.token_in, token_out = %job.request.token_out, "order accepted");
        Ok(job)
    }
}

/// Checks the payload against the market order schema, collecting every
/// violation instead of stopping at the first.
fn validate(payload: &Value) -> Result<OrderRequest, Error> {
    let mut issues = Vec::new();

    let token = |field: &str, issues: &mut Vec<String>| {
        match payload.get(field).and_then(Value::as_str) {
            Some(value) if !value.trim().is_empty() => Some(value.to_string()),
            _ => {
                issues.push(format!("{field} must be a non-empty string"));
                None
            }
        }
    };
    let token_in = token("tokenIn", &mut issues);
    let token_out = token("tokenOut", &mut issues);
    if let (Some(token_in), Some(token_out)) = (&token_in, &token_out) {
        if token_in == token_out {
            issues.push("tokenIn and tokenOut must differ".to_string());
        }
    }

    let amount = match payload.get("amount").and_then(Value::as_u64) {
        Some(amount) if amount > 0 => Some(amount),
        _ => {
            issues.push("amount must be a positive integer".to_string());
            None
        }
    };

    match payload.get("orderType").and_then(Value::as_str) {
        Some("market") => (),
        _ => issues.push("orderType must be \"market\"".to_string()),
    }

    if !issues.is_empty() {
        return Err(Error::Validation { issues });
    }
    Ok(OrderRequest {
        token_in: token_in.unwrap(),
        token_out: token_out.unwrap(),
        amount: amount.unwrap(),
        order_type: OrderType::Market,
    })
}
