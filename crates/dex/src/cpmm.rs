//! Constant product pool math. All venues this service routes to price
//! swaps with x * y = k against live reserves; only program ids, account
//! layouts and fee schedules differ.

/// Output amount for swapping `amount_in` against the given reserves with
/// the venue's fee taken from the input side. Returns `None` when either
/// reserve is zero or the fee is nonsensical.
///
/// `out = (in * (10000 - fee) * reserve_out) / (reserve_in * 10000 + in * (10000 - fee))`
pub fn amount_out(amount_in: u64, reserve_in: u64, reserve_out: u64, fee_bps: u32) -> Option<u64> {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 || fee_bps >= 10_000 {
        return None;
    }
    let amount_in_after_fee = u128::from(amount_in) * u128::from(10_000 - fee_bps);
    let numerator = amount_in_after_fee.checked_mul(u128::from(reserve_out))?;
    let denominator = u128::from(reserve_in)
        .checked_mul(10_000)?
        .checked_add(amount_in_after_fee)?;
    Some((numerator / denominator) as u64)
}

/// How far the executed price deviates from the fee free spot price, in
/// basis points. Includes both pool depth and the venue fee.
pub fn price_impact_bps(
    amount_in: u64,
    reserve_in: u64,
    reserve_out: u64,
    amount_out: u64,
) -> u32 {
    if reserve_in == 0 || amount_in == 0 {
        return 0;
    }
    let spot_out = u128::from(amount_in) * u128::from(reserve_out) / u128::from(reserve_in);
    if spot_out == 0 {
        return 0;
    }
    let shortfall = spot_out.saturating_sub(u128::from(amount_out));
    (shortfall * 10_000 / spot_out).min(10_000) as u32
}
