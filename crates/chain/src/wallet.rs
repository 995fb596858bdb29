use {
    base64::Engine,
    solana_sdk::{
        pubkey::Pubkey,
        signature::Keypair,
        signer::Signer,
    },
    thiserror::Error,
};

/// The single signing identity of the service. Pays for and signs every
/// swap transaction.
pub struct Wallet {
    keypair: Keypair,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("wallet key is empty")]
    Empty,
    #[error("wallet key is not valid base58, base64 or a JSON byte array")]
    UnknownEncoding,
    #[error("wallet key has {0} bytes, expected 64")]
    WrongLength(usize),
    #[error("wallet key bytes do not form a keypair: {0}")]
    InvalidKeypair(String),
}

impl Wallet {
    /// Accepts the three encodings wallets are commonly exported in: a JSON
    /// byte array (solana-keygen), base58 (browser wallets) or base64.
    pub fn from_encoded(raw: &str) -> Result<Self, ParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ParseError::Empty);
        }
        let bytes = if raw.starts_with('[') {
            serde_json::from_str::<Vec<u8>>(raw).map_err(|_| ParseError::UnknownEncoding)?
        } else if let Ok(bytes) = bs58::decode(raw).into_vec() {
            bytes
        } else if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(raw) {
            bytes
        } else {
            return Err(ParseError::UnknownEncoding);
        };
        if bytes.len() != 64 {
            return Err(ParseError::WrongLength(bytes.len()));
        }
        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|err| ParseError::InvalidKeypair(err.to_string()))?;
        Ok(Self { keypair })
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret.
        f.debug_struct("Wallet").field("pubkey", &self.pubkey()).finish()
    }
}
