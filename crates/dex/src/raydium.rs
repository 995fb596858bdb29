//! Raydium AMM venue. Quotes from the pool vault reserves and emits the
//! program's swap_base_in instruction with the quoted minimum out as the
//! on-chain floor.

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

pub const PROGRAM_ID: Pubkey = pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");

/// Raydium's AMM fee when the pool config does not carry one.
const DEFAULT_FEE_BPS: u32 = 25;

/// swap_base_in discriminator.
const SWAP_INSTRUCTION: u8 = 9;

#[derive(Clone)]
pub struct Raydium {
    rpc: Arc<RpcClient>,
    pools: Vec<pool::Pool>,
}

impl Raydium {
    pub const LABEL: &'static str = "raydium";

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
        let swap_instruction = swap_base_in(
            &prepared,
            payer,
            job.request.amount,
            quote.min_out,
        );
        Ok(swap::assemble(prepared, swap_instruction, payer))
    }
}

fn swap_base_in(
    prepared: &swap::Prepared<'_>,
    payer: Pubkey,
    amount_in: u64,
    minimum_amount_out: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(17);
    data.push(SWAP_INSTRUCTION);
    data.extend_from_slice(&amount_in.to_le_bytes());
    data.extend_from_slice(&minimum_amount_out.to_le_bytes());

    let pool = prepared.oriented.pool;
    Instruction {
        program_id: PROGRAM_ID,
        accounts: vec![
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new(pool.id, false),
            AccountMeta::new_readonly(pool.authority, false),
            AccountMeta::new(prepared.user_source, false),
            AccountMeta::new(prepared.oriented.vault_in, false),
            AccountMeta::new(prepared.oriented.vault_out, false),
            AccountMeta::new(prepared.user_destination, false),
            AccountMeta::new_readonly(payer, true),
        ],
        data,
    }
}
