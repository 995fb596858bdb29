//! Solana specific plumbing: the cluster the service runs against, signer
//! key handling and transaction submission.

pub mod rpc;
pub mod wallet;

pub use {
    rpc::{BuiltTransaction, Error, SolRpc, Submitter},
    wallet::Wallet,
};

use std::{str::FromStr, time::Duration};

/// Represents each Solana cluster the service can target.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Cluster {
    MainnetBeta,
    #[default]
    Devnet,
    Testnet,
}

impl Cluster {
    /// The value explorers expect in their `cluster` query parameter.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MainnetBeta => "mainnet-beta",
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
        }
    }

    /// Expected slot time. Useful for picking confirmation poll intervals.
    pub fn slot_time(&self) -> Duration {
        Duration::from_millis(400)
    }
}

impl std::fmt::Display for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Cluster {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet-beta" | "mainnet" => Ok(Self::MainnetBeta),
            "devnet" => Ok(Self::Devnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(format!("unknown cluster {other:?}")),
        }
    }
}

/// Builds the explorer page for a transaction signature:
/// `{base}/tx/{signature}?cluster={cluster}`.
pub fn explorer_tx_link(base: &str, signature: &str, cluster: Cluster) -> String {
    format!("{}/tx/{signature}?cluster={cluster}", base.trim_end_matches('/'))
}
