use log::info;
use thiserror::Error;

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::account::AccountStore;
use crate::block::Block;
use crate::crypto::{self, Hash};
use crate::mempool::TransactionPool;
use crate::storage::{ChainFile, StorageError};
use crate::validator::{self, ValidationError};

/// Preimage of the prev-hash carried by the genesis block
pub const GENESIS_SEED: &[u8] = b"GENESIS";

/// Hash of the one genesis block this node trusts
pub const GENESIS_HASH: Hash = Hash([
    0x00, 0x00, 0x03, 0xD7, 0xFF, 0xFE, 0xF8, 0xEC, 0xDC, 0xDC, 0x56, 0x37, 0x88, 0x55, 0xC9,
    0x71, 0x73, 0x43, 0xD3, 0x95, 0xE5, 0xCA, 0x5E, 0x7E, 0xF1, 0x4F, 0x39, 0xA8, 0x1C, 0xCC,
    0x1C, 0xA9,
]);

/// The prev-hash every chain starts from: `SHA256("GENESIS")`
pub fn genesis_prev_hash() -> Hash {
    crypto::sha256(GENESIS_SEED)
}

/// Consensus parameters
///
/// `Default` is the protocol constants; tests construct low-difficulty
/// variants so chain scenarios can mine real blocks.
#[derive(Debug, Clone)]
pub struct ChainParams {
    /// Required leading zero bits on every block hash
    pub difficulty: u8,

    /// Pinned hash of the genesis block
    pub genesis_hash: Hash,

    /// Reward paid at height 1
    pub base_reward: u64,

    /// Number of blocks between reward halvings
    pub halving_interval: u64,

    /// Maximum transactions per block
    pub max_block_transactions: usize,
}

impl Default for ChainParams {
    fn default() -> Self {
        ChainParams {
            difficulty: 20,
            genesis_hash: GENESIS_HASH,
            base_reward: 5_000_000,
            halving_interval: 1000,
            max_block_transactions: 100,
        }
    }
}

impl ChainParams {
    /// The reward for the block at a 1-based height, halving every
    /// `halving_interval` blocks
    pub fn block_reward(&self, height: u64) -> u64 {
        let halvings = height / self.halving_interval;

        if halvings >= 64 {
            return 0;
        }

        self.base_reward >> halvings
    }
}

/// Errors that can occur during chain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("block does not extend the current chain head")]
    InvalidPrevBlock,

    #[error("block difficulty {got} does not match required difficulty {want}")]
    InvalidDifficulty { got: u8, want: u8 },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("genesis block {hash} is corrupted: {reason}")]
    CorruptedGenesisBlock { hash: Hash, reason: String },

    #[error("genesis block {hash} does not match the pinned genesis hash")]
    UnknownGenesisBlock { hash: Hash },

    #[error("chain is corrupted at block {hash}: {reason}")]
    CorruptedChain { hash: Hash, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The chain engine: in-memory block list, derived account state, and
/// the persistent chain file
///
/// Blocks are held newest first; the decoded chain file installs
/// directly. All mutation serializes on the chain lock, and
/// [`register_mined`](Blockchain::register_mined) performs its disk,
/// account, and mempool effects while holding it.
#[derive(Debug)]
pub struct Blockchain {
    chain: Mutex<Vec<Block>>,
    accounts: Arc<AccountStore>,
    storage: ChainFile,
    params: ChainParams,
}

impl Blockchain {
    /// Loads the chain from disk and replays it into account state
    ///
    /// An absent chain file yields an empty chain. Any inconsistency in
    /// an existing file is unrecoverable: the error names the offending
    /// block and nothing is partially applied to the returned state.
    pub fn load<P: AsRef<Path>>(db_path: P, params: ChainParams) -> Result<Self, BlockchainError> {
        let storage = ChainFile::new(db_path);
        let accounts = Arc::new(AccountStore::new());

        let blocks = storage.load()?.unwrap_or_default();

        // Replay oldest first; the decoded list is newest first.
        let mut prev_hash: Option<Hash> = None;
        let mut height: u64 = 1;

        for block in blocks.iter().rev() {
            let hash = block.hash();

            match prev_hash {
                None => {
                    // The genesis block is identified by its pinned
                    // hash; it is not PoW- or signature-verified.
                    if block.header.prev_hash != genesis_prev_hash() {
                        return Err(BlockchainError::CorruptedGenesisBlock {
                            hash,
                            reason: format!(
                                "prev_hash {} is not the genesis sentinel",
                                block.header.prev_hash
                            ),
                        });
                    }
                    if hash != params.genesis_hash {
                        return Err(BlockchainError::UnknownGenesisBlock { hash });
                    }
                }
                Some(prev) => {
                    if block.header.prev_hash != prev {
                        return Err(BlockchainError::CorruptedChain {
                            hash,
                            reason: format!(
                                "prev_hash {} does not link to {}",
                                block.header.prev_hash, prev
                            ),
                        });
                    }

                    validator::verify_block(block, &accounts, params.max_block_transactions)
                        .map_err(|e| BlockchainError::CorruptedChain {
                            hash,
                            reason: e.to_string(),
                        })?;
                }
            }

            Self::apply_block(&accounts, block, height, &params)?;

            prev_hash = Some(hash);
            height += 1;
        }

        info!(
            "loaded chain at height {} with {} known accounts",
            blocks.len(),
            accounts.len()
        );

        Ok(Blockchain {
            chain: Mutex::new(blocks),
            accounts,
            storage,
            params,
        })
    }

    /// Accepts a freshly mined block
    ///
    /// Checks linkage and difficulty, runs full validation, rehearses
    /// the account application on a ledger copy, then commits: chain
    /// file append first, then the in-memory prepend, account
    /// application, miner reward, and mempool purge, all under the
    /// chain lock. A rejected block leaves every store untouched.
    ///
    /// # Returns
    ///
    /// The hash of the accepted block
    pub fn register_mined(
        &self,
        block: Block,
        mempool: &TransactionPool,
    ) -> Result<Hash, BlockchainError> {
        let mut chain = self.chain.lock().unwrap();

        let newest = chain
            .first()
            .map(Block::hash)
            .unwrap_or_else(genesis_prev_hash);
        if block.header.prev_hash != newest {
            return Err(BlockchainError::InvalidPrevBlock);
        }

        if block.header.difficulty != self.params.difficulty {
            return Err(BlockchainError::InvalidDifficulty {
                got: block.header.difficulty,
                want: self.params.difficulty,
            });
        }

        validator::verify_block(&block, &self.accounts, self.params.max_block_transactions)?;

        let hash = block.hash();
        let height = chain.len() as u64 + 1;

        // Per-transaction validation checks every body against the same
        // starting state, so a block can still jointly overdraw an
        // account. Rehearse the full application on a copy of the
        // ledger; only a block that applies cleanly reaches the disk or
        // the live stores.
        let rehearsal = self.accounts.as_ref().clone();
        Self::apply_block(&rehearsal, &block, height, &self.params)?;

        // Disk before memory: a failed append rejects the block with no
        // state change, and a crash after it replays the block on the
        // next startup.
        self.storage.append(&block)?;

        Self::apply_block(&self.accounts, &block, height, &self.params)?;
        mempool.remove_confirmed(&self.accounts, &block.body.transactions);

        info!(
            "accepted block {} at height {} with {} transactions",
            hash,
            height,
            block.body.transactions.len()
        );
        chain.insert(0, block);

        Ok(hash)
    }

    fn apply_block(
        accounts: &AccountStore,
        block: &Block,
        height: u64,
        params: &ChainParams,
    ) -> Result<(), BlockchainError> {
        let corrupted = |e: crate::account::AccountError| BlockchainError::CorruptedChain {
            hash: block.hash(),
            reason: e.to_string(),
        };

        for transaction in &block.body.transactions {
            accounts
                .apply_transaction_body(&transaction.body, &block.header.miner_pub_key)
                .map_err(&corrupted)?;
        }

        accounts
            .reward_miner(&block.header.miner_pub_key, params.block_reward(height))
            .map_err(&corrupted)?;

        Ok(())
    }

    /// Hash of the chain head, or the genesis sentinel when empty
    pub fn newest_hash(&self) -> Hash {
        self.chain
            .lock()
            .unwrap()
            .first()
            .map(Block::hash)
            .unwrap_or_else(genesis_prev_hash)
    }

    /// Number of blocks in the chain
    pub fn height(&self) -> u64 {
        self.chain.lock().unwrap().len() as u64
    }

    pub fn current_difficulty(&self) -> u8 {
        self.params.difficulty
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// The account state derived from the chain
    pub fn accounts(&self) -> &Arc<AccountStore> {
        &self.accounts
    }

    /// Balance of an account
    ///
    /// Takes the chain lock so a concurrently committing block is
    /// observed either fully applied or not at all.
    pub fn balance(&self, address: &crate::crypto::Address) -> u64 {
        let _chain = self.chain.lock().unwrap();
        self.accounts.balance(address)
    }

    /// Snapshot of all blocks, newest first
    pub fn blocks(&self) -> Vec<Block> {
        self.chain.lock().unwrap().clone()
    }
}
