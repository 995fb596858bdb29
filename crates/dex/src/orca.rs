//! Orca token-swap venue. Same constant product pricing as Raydium with a
//! different fee schedule and instruction wiring; token-swap pools route
//! trading fees through a dedicated fee account and the LP mint.

use {
    crate::{Error, pool, swap},
    chain::BuiltTransaction,
    model::{OrderJob, QuoteRequest, QuoteResponse},
    solana_client::nonblocking::rpc_client::RpcClient,
    solana_sdk::{
        instruction::{AccountMeta, Instruction},
        pubkey,
        pubkey::Pubkey,
    },
    std::sync::Arc,
};

pub const PROGRAM_ID: Pubkey = pubkey!("9W959DqEETiGZocYWCQPaJ6sBmUzgfxXfqGeTEdp3aQP");

const DEFAULT_FEE_BPS: u32 = 30;

/// token-swap Swap discriminator.
const SWAP_INSTRUCTION: u8 = 1;

#[derive(Clone)]
pub struct Orca {
    rpc: Arc<RpcClient>,
    pools: Vec<pool::Pool>,
}

impl Orca {
    pub const LABEL: &'static str = "orca";

    pub fn new(rpc: Arc<RpcClient>, pools: Vec<pool::Pool>) -> Self {
        Self { rpc, pools }
    }

    pub async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, Error> {
        pool::best_quote(Self::LABEL, &self.rpc, &self.pools, DEFAULT_FEE_BPS, request).await
    }

    pub async fn build_swap(
        &self,
        job: &OrderJob,
        quote: &QuoteResponse,
        payer: Pubkey,
    ) -> Result<BuiltTransaction, Error> {
        let prepared = swap::prepare(&self.rpc, &self.pools, job, quote, payer).await?;
        let swap_instruction = token_swap(&prepared, payer, job.request.amount, quote.min_out)?;
        Ok(swap::assemble(prepared, swap_instruction, payer))
    }
}

fn token_swap(
    prepared: &swap::Prepared<'_>,
    payer: Pubkey,
    amount_in: u64,
    minimum_amount_out: u64,
) -> Result<Instruction, Error> {
    let pool = prepared.oriented.pool;
    // Registry loading guarantees these for orca pools; a pool that lost
    // them was swapped out from under us.
    let pool_mint = pool
        .pool_mint
        .ok_or_else(|| Error::PoolChanged(pool.id.to_string()))?;
    let fee_account = pool
        .fee_account
        .ok_or_else(|| Error::PoolChanged(pool.id.to_string()))?;

    let mut data = Vec::with_capacity(17);
    data.push(SWAP_INSTRUCTION);
    data.extend_from_slice(&amount_in.to_le_bytes());
    data.extend_from_slice(&minimum_amount_out.to_le_bytes());

    Ok(Instruction {
        program_id: PROGRAM_ID,
        accounts: vec![
            AccountMeta::new_readonly(pool.id, false),
            AccountMeta::new_readonly(pool.authority, false),
            AccountMeta::new_readonly(payer, true),
            AccountMeta::new(prepared.user_source, false),
            AccountMeta::new(prepared.oriented.vault_in, false),
            AccountMeta::new(prepared.oriented.vault_out, false),
            AccountMeta::new(prepared.user_destination, false),
            AccountMeta::new(pool_mint, false),
            AccountMeta::new(fee_account, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_requires_fee_wiring() {
        let pool = pool::Pool {
            id: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            token_a_mint: Pubkey::new_unique(),
            token_b_mint: Pubkey::new_unique(),
            token_a_vault: Pubkey::new_unique(),
            token_b_vault: Pubkey::new_unique(),
            fee_bps: 30,
            pool_mint: None,
            fee_account: None,
        };
        let oriented = pool.orient(&pool.token_a_mint, &pool.token_b_mint).unwrap();
        let prepared = swap::Prepared {
            oriented,
            user_source: Pubkey::new_unique(),
            user_destination: Pubkey::new_unique(),
            prelude: vec![],
        };
        assert!(matches!(
            token_swap(&prepared, Pubkey::new_unique(), 1, 1),
            Err(Error::PoolChanged(_))
        ));
    }

    #[test]
    fn swap_embeds_quoted_floor() {
        let pool = pool::Pool {
            id: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            token_a_mint: Pubkey::new_unique(),
            token_b_mint: Pubkey::new_unique(),
            token_a_vault: Pubkey::new_unique(),
            token_b_vault: Pubkey::new_unique(),
            fee_bps: 30,
            pool_mint: Some(Pubkey::new_unique()),
            fee_account: Some(Pubkey::new_unique()),
        };
        let oriented = pool.orient(&pool.token_b_mint, &pool.token_a_mint).unwrap();
        let prepared = swap::Prepared {
            oriented,
            user_source: Pubkey::new_unique(),
            user_destination: Pubkey::new_unique(),
            prelude: vec![],
        };
        let instruction = token_swap(&prepared, Pubkey::new_unique(), 2_000_000, 1_900_000).unwrap();
        assert_eq!(instruction.data[9..17], 1_900_000u64.to_le_bytes());
    }
}
