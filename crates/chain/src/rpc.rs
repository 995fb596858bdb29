use {
    crate::wallet::Wallet,
    solana_client::nonblocking::rpc_client::RpcClient,
    solana_sdk::{
        commitment_config::CommitmentConfig,
        signature::{Keypair, Signature},
        signer::Signer,
        transaction::Transaction,
    },
    std::{
        sync::Arc,
        time::{Duration, Instant},
    },
    thiserror::Error,
};

/// A transaction ready for signing and submission. Opaque to the rest of
/// the pipeline; only the venue that built it knows what is inside.
pub struct BuiltTransaction {
    pub transaction: Transaction,
    /// Additional signers the transaction requires beyond the service
    /// wallet, e.g. a throwaway wrapped-SOL account.
    pub extra_signers: Vec<Keypair>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("chain rpc error: {0}")]
    Transport(String),
    #[error("failed to sign transaction: {0}")]
    Signing(String),
    #[error("transaction {0} failed on chain: {1}")]
    TransactionFailed(Signature, String),
    #[error("transaction {0} was not confirmed in time")]
    ConfirmationTimeout(Signature),
}

/// Two phase submission: `submit` returns as soon as the chain has assigned
/// a signature, `confirm` waits until the configured commitment level is
/// reached. The worker records the `submitted` status between the two
/// calls, which is what makes that status impossible to double-emit.
#[async_trait::async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, built: BuiltTransaction, wallet: &Wallet) -> Result<Signature, Error>;

    async fn confirm(&self, signature: &Signature) -> Result<(), Error>;
}

/// [`Submitter`] backed by a Solana JSON RPC node.
pub struct SolRpc {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl SolRpc {
    pub fn new(url: &str, commitment: CommitmentConfig) -> Self {
        Self {
            client: Arc::new(RpcClient::new_with_commitment(url.to_string(), commitment)),
            commitment,
            confirmation_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn client(&self) -> Arc<RpcClient> {
        self.client.clone()
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }
}

#[async_trait::async_trait]
impl Submitter for SolRpc {
    async fn submit(&self, built: BuiltTransaction, wallet: &Wallet) -> Result<Signature, Error> {
        let BuiltTransaction {
            mut transaction,
            extra_signers,
        } = built;
        let blockhash = self
            .client
            .get_latest_blockhash()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;
        let mut signers: Vec<&dyn Signer> = vec![wallet.keypair()];
        signers.extend(extra_signers.iter().map(|keypair| keypair as &dyn Signer));
        transaction
            .try_sign(&signers, blockhash)
            .map_err(|err| Error::Signing(err.to_string()))?;
        self.client
            .send_transaction(&transaction)
            .await
            .map_err(|err| Error::Transport(err.to_string()))
    }

    async fn confirm(&self, signature: &Signature) -> Result<(), Error> {
        let deadline = Instant::now() + self.confirmation_timeout;
        loop {
            match self
                .client
                .get_signature_status_with_commitment(signature, self.commitment)
                .await
            {
                Ok(Some(Ok(()))) => return Ok(()),
                Ok(Some(Err(err))) => {
                    return Err(Error::TransactionFailed(*signature, err.to_string()));
                }
                // Not yet visible at the requested commitment.
                Ok(None) => (),
                Err(err) => {
                    tracing::debug!(%signature, ?err, "signature status poll failed");
                }
            }
            if Instant::now() >= deadline {
                return Err(Error::ConfirmationTimeout(*signature));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
