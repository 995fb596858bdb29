//! The venue layer. Each supported DEX backend is one variant of
//! [`Venue`] exposing the same two capabilities: price a swap against its
//! pools and build the corresponding transaction. Adding a venue means
//! adding a variant and registering it at startup; the router never
//! branches on venue identity.

pub mod cpmm;
#[cfg(feature = "testkit")]
pub mod fake;
pub mod orca;
pub mod pool;
pub mod raydium;
mod swap;

pub use pool::{Pool, Registry};

use {
    chain::BuiltTransaction,
    model::{OrderJob, QuoteRequest, QuoteResponse},
    solana_sdk::pubkey::Pubkey,
    thiserror::Error as ThisError,
};

#[derive(Clone, Debug, ThisError)]
pub enum Error {
    #[error("no pool for pair {token_in}/{token_out}")]
    NoPool { token_in: String, token_out: String },
    #[error("stale pool data: {0}")]
    StaleData(String),
    #[error("venue transport error: {0}")]
    Transport(String),
    #[error("pool {0} changed since quoting")]
    PoolChanged(String),
    #[error("order pair does not match the quoted pool")]
    InvalidDirection,
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),
}

impl Error {
    /// Building again with the same inputs will fail the same way for
    /// these; the queue should not retry them.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::InvalidDirection)
    }
}

#[derive(Clone)]
pub enum Venue {
    Raydium(raydium::Raydium),
    Orca(orca::Orca),
    #[cfg(feature = "testkit")]
    Fake(fake::Fake),
}

impl Venue {
    pub fn label(&self) -> &str {
        match self {
            Self::Raydium(_) => raydium::Raydium::LABEL,
            Self::Orca(_) => orca::Orca::LABEL,
            #[cfg(feature = "testkit")]
            Self::Fake(fake) => fake.label(),
        }
    }

    /// Safe to call concurrently; venues never hold state across quotes.
    pub async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, Error> {
        match self {
            Self::Raydium(venue) => venue.quote(request).await,
            Self::Orca(venue) => venue.quote(request).await,
            #[cfg(feature = "testkit")]
            Self::Fake(venue) => venue.quote(request).await,
        }
    }

    /// Builds the swap transaction for a quote this venue produced. The
    /// quoted `min_out` goes into the instruction unchanged; slippage was
    /// already applied when quoting.
    pub async fn build_swap(
        &self,
        job: &OrderJob,
        quote: &QuoteResponse,
        payer: Pubkey,
    ) -> Result<BuiltTransaction, Error> {
        match self {
            Self::Raydium(venue) => venue.build_swap(job, quote, payer).await,
            Self::Orca(venue) => venue.build_swap(job, quote, payer).await,
            #[cfg(feature = "testkit")]
            Self::Fake(venue) => venue.build_swap(job, quote, payer).await,
        }
    }
}

impl std::fmt::Debug for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Venue").field(&self.label()).finish()
    }
}
