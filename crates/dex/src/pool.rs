use {
    crate::{Error, cpmm},
    model::QuoteRequest,
    serde::Deserialize,
    solana_client::nonblocking::rpc_client::RpcClient,
    solana_sdk::pubkey::Pubkey,
    std::{path::Path, str::FromStr},
};

/// How many matching pools a venue evaluates per quote. More pools mean
/// better prices but more RPC calls inside the routing deadline.
pub const MAX_POOL_FAN_OUT: usize = 3;

/// One liquidity pool a venue can route through. Vault accounts hold the
/// live reserves; everything else is static account wiring for the swap
/// instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pool {
    pub id: Pubkey,
    pub authority: Pubkey,
    pub token_a_mint: Pubkey,
    pub token_b_mint: Pubkey,
    pub token_a_vault: Pubkey,
    pub token_b_vault: Pubkey,
    pub fee_bps: u32,
    /// LP mint; required by token-swap style venues, unused by others.
    pub pool_mint: Option<Pubkey>,
    /// Account collecting trading fees; required by token-swap style venues.
    pub fee_account: Option<Pubkey>,
}

/// A pool viewed in the direction of a concrete swap.
#[derive(Clone, Copy, Debug)]
pub struct Oriented<'a> {
    pub pool: &'a Pool,
    pub mint_in: Pubkey,
    pub mint_out: Pubkey,
    pub vault_in: Pubkey,
    pub vault_out: Pubkey,
}

impl Pool {
    /// Orients the pool for swapping `mint_in` into `mint_out`. Returns
    /// `None` when the pair does not match in either direction.
    pub fn orient(&self, mint_in: &Pubkey, mint_out: &Pubkey) -> Option<Oriented<'_>> {
        if (&self.token_a_mint, &self.token_b_mint) == (mint_in, mint_out) {
            Some(Oriented {
                pool: self,
                mint_in: self.token_a_mint,
                mint_out: self.token_b_mint,
                vault_in: self.token_a_vault,
                vault_out: self.token_b_vault,
            })
        } else if (&self.token_b_mint, &self.token_a_mint) == (mint_in, mint_out) {
            Some(Oriented {
                pool: self,
                mint_in: self.token_b_mint,
                mint_out: self.token_a_mint,
                vault_in: self.token_b_vault,
                vault_out: self.token_a_vault,
            })
        } else {
            None
        }
    }
}

/// Reads both vault balances of an oriented pool.
pub(crate) async fn fetch_reserves(
    rpc: &RpcClient,
    oriented: &Oriented<'_>,
) -> Result<(u64, u64), Error> {
    let (vault_in, vault_out) = futures::future::try_join(
        rpc.get_token_account_balance(&oriented.vault_in),
        rpc.get_token_account_balance(&oriented.vault_out),
    )
    .await
    .map_err(|err| Error::Transport(err.to_string()))?;
    let parse = |amount: &str| {
        amount
            .parse::<u64>()
            .map_err(|_| Error::StaleData(format!("unparsable vault balance {amount:?}")))
    };
    Ok((parse(&vault_in.amount)?, parse(&vault_out.amount)?))
}

/// Quote driver shared by the constant product venues: evaluate up to
/// [`MAX_POOL_FAN_OUT`] matching pools against live reserves and keep the
/// highest output.
pub(crate) async fn best_quote(
    venue: &str,
    rpc: &RpcClient,
    pools: &[Pool],
    fee_bps_default: u32,
    request: &QuoteRequest,
) -> Result<model::QuoteResponse, Error> {
    let no_pool = || Error::NoPool {
        token_in: request.token_in.clone(),
        token_out: request.token_out.clone(),
    };
    let mint_in = Pubkey::from_str(&request.token_in).map_err(|_| no_pool())?;
    let mint_out = Pubkey::from_str(&request.token_out).map_err(|_| no_pool())?;

    let candidates: Vec<_> = pools
        .iter()
        .filter_map(|pool| pool.orient(&mint_in, &mint_out))
        .take(MAX_POOL_FAN_OUT)
        .collect();
    if candidates.is_empty() {
        return Err(no_pool());
    }

    let reserves = futures::future::join_all(
        candidates
            .iter()
            .map(|oriented| fetch_reserves(rpc, oriented)),
    )
    .await;

    let mut best: Option<model::QuoteResponse> = None;
    let mut last_error = None;
    for (oriented, reserves) in candidates.iter().zip(reserves) {
        let (reserve_in, reserve_out) = match reserves {
            Ok(reserves) => reserves,
            Err(err) => {
                tracing::debug!(pool = %oriented.pool.id, ?err, "skipping pool");
                last_error = Some(err);
                continue;
            }
        };
        let fee_bps = if oriented.pool.fee_bps > 0 {
            oriented.pool.fee_bps
        } else {
            fee_bps_default
        };
        let Some(estimated_out) =
            cpmm::amount_out(request.amount, reserve_in, reserve_out, fee_bps)
        else {
            continue;
        };
        if estimated_out == 0 {
            continue;
        }
        if best
            .as_ref()
            .is_some_and(|best| best.estimated_out >= estimated_out)
        {
            continue;
        }
        best = Some(model::QuoteResponse {
            venue: venue.to_string(),
            estimated_out,
            min_out: model::quote::min_out(estimated_out, request.slippage_bps),
            price_impact_bps: cpmm::price_impact_bps(
                request.amount,
                reserve_in,
                reserve_out,
                estimated_out,
            ),
            fee_bps,
            pool_id: oriented.pool.id.to_string(),
            route_meta: Some(serde_json::json!({
                "reserveIn": reserve_in,
                "reserveOut": reserve_out,
            })),
            request: request.clone(),
        });
    }

    match (best, last_error) {
        (Some(best), _) => Ok(best),
        // Every candidate errored on the reserve fetch.
        (None, Some(err)) => Err(err),
        // Candidates existed but none had usable liquidity.
        (None, None) => Err(no_pool()),
    }
}

/// On disk pool registry, one TOML table per pool.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RegistryFile {
    #[serde(default)]
    pub pools: Vec<PoolEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PoolEntry {
    /// Which venue routes through this pool: "raydium" or "orca".
    pub venue: String,
    pub id: String,
    pub authority: String,
    pub token_a_mint: String,
    pub token_b_mint: String,
    pub token_a_vault: String,
    pub token_b_vault: String,
    #[serde(default)]
    pub fee_bps: u32,
    pub pool_mint: Option<String>,
    pub fee_account: Option<String>,
}

/// The parsed registry, pools grouped per venue in file order.
#[derive(Debug, Default)]
pub struct Registry {
    pub raydium: Vec<Pool>,
    pub orca: Vec<Pool>,
}

impl Registry {
    pub fn from_toml(data: &str) -> anyhow::Result<Self> {
        let file: RegistryFile = toml::de::from_str(data)?;
        let mut registry = Self::default();
        for entry in file.pools {
            let pool = entry.parse()?;
            match entry.venue.as_str() {
                "raydium" => registry.raydium.push(pool),
                "orca" => {
                    anyhow::ensure!(
                        pool.pool_mint.is_some() && pool.fee_account.is_some(),
                        "orca pool {} needs pool-mint and fee-account",
                        pool.id,
                    );
                    registry.orca.push(pool);
                }
                other => anyhow::bail!("unknown venue {other:?} for pool {}", entry.id),
            }
        }
        Ok(registry)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_toml(&data)
    }
}

impl PoolEntry {
    fn parse(&self) -> anyhow::Result<Pool> {
        let pubkey = |field: &str, value: &str| {
            Pubkey::from_str(value)
                .map_err(|_| anyhow::anyhow!("pool {}: {field} is not a pubkey", self.id))
        };
        Ok(Pool {
            id: pubkey("id", &self.id)?,
            authority: pubkey("authority", &self.authority)?,
            token_a_mint: pubkey("token-a-mint", &self.token_a_mint)?,
            token_b_mint: pubkey("token-b-mint", &self.token_b_mint)?,
            token_a_vault: pubkey("token-a-vault", &self.token_a_vault)?,
            token_b_vault: pubkey("token-b-vault", &self.token_b_vault)?,
            fee_bps: self.fee_bps,
            pool_mint: self
                .pool_mint
                .as_deref()
                .map(|value| pubkey("pool-mint", value))
                .transpose()?,
            fee_account: self
                .fee_account
                .as_deref()
                .map(|value| pubkey("fee-account", value))
                .transpose()?,
        })
    }
}
