use log::warn;
use thiserror::Error;

use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use crate::account::AccountError;
use crate::chain::{Blockchain, BlockchainError, ChainParams};
use crate::config::NodeConfig;
use crate::crypto::{Address, Hash};
use crate::mempool::{MempoolError, TransactionPool};
use crate::miner;
use crate::transaction::Transaction;
use crate::wallet::{Wallet, WalletError};

/// Number of fresh nonces tried before a transfer gives up
const NONCE_RETRIES: u32 = 8;

/// Errors that can occur during node operations
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Chain(#[from] BlockchainError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Mempool(#[from] MempoolError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A complete node: chain engine, account state, mempool, and wallet
/// behind one handle
#[derive(Debug)]
pub struct Node {
    chain: Blockchain,
    mempool: TransactionPool,
    wallet: Mutex<Wallet>,
}

impl Node {
    /// Opens a node with the protocol parameters
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        Self::open_with_params(config, ChainParams::default())
    }

    /// Opens a node with explicit chain parameters
    ///
    /// Creates the data directories, loads the wallet, and replays the
    /// chain file into account state. Replay failures are unrecoverable
    /// and surface here.
    pub fn open_with_params(config: NodeConfig, params: ChainParams) -> Result<Self, NodeError> {
        config.ensure_dirs()?;

        let wallet = Wallet::load_or_create(config.wallet_path())?;
        let chain = Blockchain::load(config.db_path(), params)?;

        Ok(Node {
            chain,
            mempool: TransactionPool::new(),
            wallet: Mutex::new(wallet),
        })
    }

    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    pub fn mempool(&self) -> &TransactionPool {
        &self.mempool
    }

    /// The wallet's default key id, generating a key if needed
    pub fn default_key(&self) -> Result<u32, NodeError> {
        Ok(self.wallet.lock().unwrap().default_key()?)
    }

    /// Address of a wallet key
    pub fn key_address(&self, key_id: u32) -> Result<Address, NodeError> {
        Ok(*self.wallet.lock().unwrap().keypair(key_id)?.address())
    }

    /// Registers an externally built transaction with the mempool
    pub fn submit_transaction(&self, transaction: Transaction) -> Result<Hash, NodeError> {
        Ok(self.mempool.register(self.chain.accounts(), transaction)?)
    }

    /// Signs and registers a transfer from a wallet key
    ///
    /// Nonces are drawn at random; a collision with an already spent
    /// nonce is retried with a fresh one.
    pub fn transfer(
        &self,
        from_key: u32,
        to: Address,
        amount: u64,
        transaction_fee: u64,
    ) -> Result<Hash, NodeError> {
        let mut attempts = 0;

        loop {
            let transaction = self
                .wallet
                .lock()
                .unwrap()
                .sign_transfer(from_key, to, amount, transaction_fee)?;

            match self.mempool.register(self.chain.accounts(), transaction) {
                Ok(hash) => return Ok(hash),
                Err(MempoolError::Rejected(AccountError::InvalidNonce(nonce)))
                    if attempts < NONCE_RETRIES =>
                {
                    warn!("nonce {nonce} already spent, retrying with a fresh one");
                    attempts += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Assembles, mines, and submits one block rewarded to the given
    /// wallet key
    ///
    /// # Returns
    ///
    /// The accepted block's hash, or `None` when mining was cancelled.
    pub fn mine_block(&self, key_id: u32, cancel: &AtomicBool) -> Result<Option<Hash>, NodeError> {
        let (miner_pub_key, miner_proof) =
            self.wallet.lock().unwrap().miner_credentials(key_id)?;

        let candidate = miner::assemble_block(&self.chain, &self.mempool, miner_pub_key, miner_proof);

        match miner::mine(candidate, cancel) {
            Some(block) => Ok(Some(self.chain.register_mined(block, &self.mempool)?)),
            None => Ok(None),
        }
    }

    pub fn height(&self) -> u64 {
        self.chain.height()
    }

    pub fn newest_hash(&self) -> Hash {
        self.chain.newest_hash()
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.chain.balance(address)
    }

    pub fn pending_count(&self) -> usize {
        self.mempool.len()
    }
}
