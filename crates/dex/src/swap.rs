//! Swap building steps shared by the venues: resolving the quoted pool,
//! re-checking it still honors the quote, verifying the payer can fund the
//! input side and assembling the preparatory instructions.

use {
    crate::{Error, cpmm, pool},
    chain::BuiltTransaction,
    model::{OrderJob, QuoteResponse},
    solana_client::nonblocking::rpc_client::RpcClient,
    solana_sdk::{
        compute_budget::ComputeBudgetInstruction,
        instruction::Instruction,
        pubkey::Pubkey,
        system_instruction,
        transaction::Transaction,
    },
    spl_associated_token_account::{
        get_associated_token_address,
        instruction::create_associated_token_account_idempotent,
    },
    std::str::FromStr,
};

const COMPUTE_UNIT_LIMIT: u32 = 200_000;
const COMPUTE_UNIT_PRICE_MICRO_LAMPORTS: u64 = 1_000;

/// Everything a venue needs to emit its swap instruction.
pub(crate) struct Prepared<'a> {
    pub oriented: pool::Oriented<'a>,
    pub user_source: Pubkey,
    pub user_destination: Pubkey,
    /// Compute budget, destination account creation and wrapped SOL funding.
    pub prelude: Vec<Instruction>,
}

pub(crate) async fn prepare<'a>(
    rpc: &RpcClient,
    pools: &'a [pool::Pool],
    job: &OrderJob,
    quote: &QuoteResponse,
    payer: Pubkey,
) -> Result<Prepared<'a>, Error> {
    let mint_in =
        Pubkey::from_str(&job.request.token_in).map_err(|_| Error::InvalidDirection)?;
    let mint_out =
        Pubkey::from_str(&job.request.token_out).map_err(|_| Error::InvalidDirection)?;

    let pool = pools
        .iter()
        .find(|pool| pool.id.to_string() == quote.pool_id)
        .ok_or_else(|| Error::PoolChanged(quote.pool_id.clone()))?;
    let oriented = pool.orient(&mint_in, &mint_out).ok_or(Error::InvalidDirection)?;

    // The pool may have moved since the quote. Re-price against current
    // reserves and refuse to build when the quoted floor is no longer
    // reachable; the caller decides whether to re-route.
    let (reserve_in, reserve_out) = pool::fetch_reserves(rpc, &oriented).await?;
    let current_out = cpmm::amount_out(job.request.amount, reserve_in, reserve_out, quote.fee_bps);
    if current_out.is_none_or(|out| out < quote.min_out) {
        return Err(Error::PoolChanged(quote.pool_id.clone()));
    }

    let user_source = get_associated_token_address(&payer, &mint_in);
    let user_destination = get_associated_token_address(&payer, &mint_out);

    let native_input = mint_in == spl_token::native_mint::id();
    if native_input {
        let lamports = rpc
            .get_balance(&payer)
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;
        if lamports < job.request.amount {
            return Err(Error::InsufficientBalance(format!(
                "wallet holds {lamports} lamports, order needs {}",
                job.request.amount,
            )));
        }
    } else {
        let balance = rpc
            .get_token_account_balance(&user_source)
            .await
            .map_err(|err| {
                Error::InsufficientBalance(format!("source token account unavailable: {err}"))
            })?;
        let balance = balance.amount.parse::<u64>().unwrap_or(0);
        if balance < job.request.amount {
            return Err(Error::InsufficientBalance(format!(
                "source token account holds {balance}, order needs {}",
                job.request.amount,
            )));
        }
    }

    let mut prelude = vec![
        ComputeBudgetInstruction::set_compute_unit_limit(COMPUTE_UNIT_LIMIT),
        ComputeBudgetInstruction::set_compute_unit_price(COMPUTE_UNIT_PRICE_MICRO_LAMPORTS),
        create_associated_token_account_idempotent(&payer, &payer, &mint_out, &spl_token::id()),
    ];
    if native_input {
        // Fund the wrapped SOL account that pays the input side. The
        // account creation is idempotent; sync_native picks up the
        // transferred lamports.
        prelude.push(create_associated_token_account_idempotent(
            &payer,
            &payer,
            &mint_in,
            &spl_token::id(),
        ));
        prelude.push(system_instruction::transfer(
            &payer,
            &user_source,
            job.request.amount,
        ));
        prelude.push(
            spl_token::instruction::sync_native(&spl_token::id(), &user_source)
                .map_err(|err| Error::Transport(err.to_string()))?,
        );
    }

    Ok(Prepared {
        oriented,
        user_source,
        user_destination,
        prelude,
    })
}

pub(crate) fn assemble(
    prepared: Prepared<'_>,
    swap: Instruction,
    payer: Pubkey,
) -> BuiltTransaction {
    let mut instructions = prepared.prelude;
    instructions.push(swap);
    BuiltTransaction {
        transaction: Transaction::new_with_payer(&instructions, Some(&payer)),
        extra_signers: vec![],
    }
}
