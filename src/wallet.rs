use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::info;
use thiserror::Error;

use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto::{self, Address, CryptoError, KeyPair};
use crate::transaction::Transaction;

/// Errors that can occur during wallet operations
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wallet file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wallet file contains invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("unknown key id {0}")]
    UnknownKey(u32),

    #[error("wallet record {0}: public key does not match its private key")]
    KeyMismatch(u32),
}

/// The local key store
///
/// Persisted as a JSON array of `[id, base64(public), base64(private)]`
/// triples. Public keys are normalized to the 65-byte uncompressed form
/// on load: each record's public key is checked against the one derived
/// from its private key.
#[derive(Debug)]
pub struct Wallet {
    path: PathBuf,
    keys: Vec<(u32, KeyPair)>,
}

impl Wallet {
    /// Loads the wallet file, or starts an empty wallet if none exists
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            info!("no wallet file at {}, starting empty", path.display());
            return Ok(Wallet {
                path,
                keys: Vec::new(),
            });
        }

        let records: Vec<(u32, String, String)> = serde_json::from_str(&fs::read_to_string(&path)?)?;

        let mut keys = Vec::with_capacity(records.len());
        for (id, public, private) in records {
            let keypair = KeyPair::from_secret_bytes(&BASE64.decode(private)?)?;

            if BASE64.decode(public)? != keypair.address().as_bytes() {
                return Err(WalletError::KeyMismatch(id));
            }

            keys.push((id, keypair));
        }

        info!("loaded {} keys from {}", keys.len(), path.display());
        Ok(Wallet { path, keys })
    }

    /// Generates, persists, and returns the id of a new keypair
    pub fn generate_key(&mut self) -> Result<u32, WalletError> {
        let id = self
            .keys
            .iter()
            .map(|(id, _)| *id)
            .max()
            .map_or(0, |max| max + 1);

        self.keys.push((id, KeyPair::generate()));
        self.save()?;

        info!("generated wallet key {id}");
        Ok(id)
    }

    /// Looks up a keypair by id
    pub fn keypair(&self, id: u32) -> Result<&KeyPair, WalletError> {
        self.keys
            .iter()
            .find(|(key_id, _)| *key_id == id)
            .map(|(_, keypair)| keypair)
            .ok_or(WalletError::UnknownKey(id))
    }

    /// The lowest key id, generating one if the wallet is empty
    pub fn default_key(&mut self) -> Result<u32, WalletError> {
        match self.keys.iter().map(|(id, _)| *id).min() {
            Some(id) => Ok(id),
            None => self.generate_key(),
        }
    }

    pub fn key_ids(&self) -> Vec<u32> {
        self.keys.iter().map(|(id, _)| *id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Signs a transfer from the given key with a random nonce
    ///
    /// The nonce is drawn fresh each call; on an `InvalidNonce`
    /// rejection the caller signs again.
    ///
    /// # Arguments
    ///
    /// * `key_id` - The wallet key to spend from
    /// * `to` - The recipient's public key
    /// * `amount` - The amount to transfer
    /// * `transaction_fee` - The fee offered to the miner
    pub fn sign_transfer(
        &self,
        key_id: u32,
        to: Address,
        amount: u64,
        transaction_fee: u64,
    ) -> Result<Transaction, WalletError> {
        let keypair = self.keypair(key_id)?;
        let nonce = crypto::random_u64();

        Ok(Transaction::create(keypair, to, amount, transaction_fee, nonce))
    }

    /// Credentials for mining: the key's address and its self-proof
    pub fn miner_credentials(&self, key_id: u32) -> Result<(Address, Vec<u8>), WalletError> {
        let keypair = self.keypair(key_id)?;
        let address = *keypair.address();
        let proof = keypair.sign(address.as_bytes());

        Ok((address, proof))
    }

    fn save(&self) -> Result<(), WalletError> {
        let records: Vec<(u32, String, String)> = self
            .keys
            .iter()
            .map(|(id, keypair)| {
                (
                    *id,
                    BASE64.encode(keypair.address().as_bytes()),
                    BASE64.encode(keypair.secret_bytes()),
                )
            })
            .collect();

        fs::write(&self.path, serde_json::to_vec_pretty(&records)?)?;
        Ok(())
    }
}
