use serde::{Deserialize, Serialize};

/// Describes where an order is in the execution pipeline.
///
/// Statuses occur in the order they are declared. `Failed` is reachable
/// from any non terminal state and is mutually exclusive with `Confirmed`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Accepted by intake and persisted, not yet picked up by a worker.
    Pending,
    /// A worker dequeued the job.
    Queued,
    /// Quotes are being collected from the registered venues.
    Routing,
    /// The swap transaction is being built against the winning venue.
    Building,
    /// The transaction was sent to the chain. Detail carries the signature.
    Submitted,
    /// The transaction reached the configured commitment level.
    Confirmed,
    /// Processing failed. Detail carries the last error message.
    Failed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Routing => "routing",
            Self::Building => "building",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle update as delivered to subscribers and recorded in the
/// history trail.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub order_id: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl StatusMessage {
    pub fn new(order_id: impl Into<String>, status: Status) -> Self {
        Self {
            order_id: order_id.into(),
            status,
            detail: None,
            link: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}
