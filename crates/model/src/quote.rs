use serde::{Deserialize, Serialize};

/// The request every registered venue prices. Built once per routing pass
/// so all venues compete on identical terms.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount: u64,
    /// Slippage tolerance in basis points, 1 to 10000 inclusive.
    pub slippage_bps: u32,
}

/// A venue's priced offer for a [`QuoteRequest`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    /// Label of the venue that produced the quote.
    pub venue: String,
    pub estimated_out: u64,
    /// On-chain minimum output floor after applying the request's slippage.
    pub min_out: u64,
    pub price_impact_bps: u32,
    pub fee_bps: u32,
    pub pool_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_meta: Option<serde_json::Value>,
    pub request: QuoteRequest,
}

/// Floors `estimated_out` by the slippage tolerance:
/// `estimated_out * (10000 - slippage_bps) / 10000`, rounded down.
pub fn min_out(estimated_out: u64, slippage_bps: u32) -> u64 {
    let slippage_bps = u128::from(slippage_bps.min(10_000));
    (u128::from(estimated_out) * (10_000 - slippage_bps) / 10_000) as u64
}

/// Converts the fractional slippage configuration value (e.g. 0.01 for 1%)
/// to basis points, clamped to the valid range.
pub fn slippage_to_bps(slippage: f64) -> u32 {
    ((slippage * 10_000.0).floor() as i64).clamp(1, 10_000) as u32
}
