// Single-node permissioned toy blockchain
//
// The crate is organized one concern per module:
// - Wire codec for blocks and transactions
// - Cryptography (SHA-256, ECDSA over secp256k1)
// - Account state machine
// - Transaction mempool
// - Block validation rules
// - Chain engine and on-disk chain file
// - Wallet, miner and node composition

pub mod account;
pub mod block;
pub mod chain;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod mempool;
pub mod miner;
pub mod node;
pub mod storage;
pub mod transaction;
pub mod validator;
pub mod wallet;

// Re-export main components for easier access
pub use account::AccountStore;
pub use block::{Block, BlockBody, BlockHeader};
pub use chain::{Blockchain, ChainParams};
pub use config::NodeConfig;
pub use crypto::{Address, Hash, KeyPair};
pub use mempool::TransactionPool;
pub use node::Node;
pub use transaction::{Transaction, TransactionBody};
pub use wallet::Wallet;
