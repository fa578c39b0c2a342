use log::debug;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::block::{Block, BlockBody, BlockHeader};
use crate::chain::Blockchain;
use crate::crypto::{self, Address};
use crate::mempool::TransactionPool;
use crate::transaction::Transaction;

/// Assembles a candidate block on top of the current chain head
///
/// Takes a snapshot of the mempool, capped at the block transaction
/// limit, ordered by transaction hash so the candidate is reproducible
/// for a given pool. The merkle fields are filled with the body digest
/// and the store's state digest; validation carries both opaquely.
pub fn assemble_block(
    chain: &Blockchain,
    mempool: &TransactionPool,
    miner_pub_key: Address,
    miner_proof: Vec<u8>,
) -> Block {
    let mut pending: Vec<(crate::crypto::Hash, Transaction)> =
        mempool.snapshot().into_iter().collect();
    pending.sort_by(|a, b| a.0 .0.cmp(&b.0 .0));
    pending.truncate(chain.params().max_block_transactions);

    let body = BlockBody {
        transactions: pending.into_iter().map(|(_, tx)| tx).collect(),
    };

    Block {
        header: BlockHeader {
            prev_hash: chain.newest_hash(),
            difficulty: chain.current_difficulty(),
            nonce: 0,
            miner_pub_key,
            miner_proof,
            chain_state_merkle_hash: chain.accounts().state_digest(),
            transactions_merkle_hash: crypto::sha256(&body.to_bytes()),
        },
        body,
    }
}

/// Searches the header nonce from zero until the block hash meets its
/// difficulty
///
/// # Returns
///
/// The solved block, or `None` once the cancel flag is observed; the
/// flag is checked on every trial.
pub fn mine(mut block: Block, cancel: &AtomicBool) -> Option<Block> {
    for nonce in 0u64.. {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }

        block.header.nonce = nonce;
        if block.hash().has_leading_zero_bits(block.header.difficulty) {
            debug!(
                "proof of work solved at difficulty {} after {} trials",
                block.header.difficulty,
                nonce + 1
            );
            return Some(block);
        }
    }

    None
}
