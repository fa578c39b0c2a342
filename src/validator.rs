use thiserror::Error;

use crate::account::{AccountError, AccountStore};
use crate::block::{Block, BlockBody};
use crate::crypto::{self, Hash};

/// Errors that can occur during block validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("block hash does not meet difficulty of {0} leading zero bits")]
    InvalidPow(u8),

    #[error("miner proof-of-key signature does not verify")]
    InvalidMinerSig,

    #[error("block carries {got} transactions, limit is {limit}")]
    TooManyTransactions { got: usize, limit: usize },

    #[error("transaction {0} signature does not verify")]
    InvalidSignature(Hash),

    #[error("transaction {hash} rejected: {source}")]
    RejectedTransaction {
        hash: Hash,
        #[source]
        source: AccountError,
    },
}

/// Checks the proof of work: the first `difficulty` bits of the block
/// hash must be zero
pub fn verify_pow(block: &Block) -> Result<(), ValidationError> {
    let difficulty = block.header.difficulty;

    if !block.hash().has_leading_zero_bits(difficulty) {
        return Err(ValidationError::InvalidPow(difficulty));
    }

    Ok(())
}

/// Checks the miner's self-proof
///
/// The header signature must be a valid signature of the miner public
/// key by its own private key, proving the reward recipient is held by
/// whoever mined the block.
pub fn verify_miner_signature(block: &Block) -> Result<(), ValidationError> {
    let miner = &block.header.miner_pub_key;

    if !crypto::verify_signature(miner, miner.as_bytes(), &block.header.miner_proof) {
        return Err(ValidationError::InvalidMinerSig);
    }

    Ok(())
}

/// Checks the transaction body rules against current account state
///
/// Rejects oversized bodies, then verifies each transaction's signature
/// and body in order, stopping at the first failure. Validation is
/// stateful: every transaction is checked against the store as it is at
/// the moment of call.
pub fn verify_body(
    body: &BlockBody,
    accounts: &AccountStore,
    max_transactions: usize,
) -> Result<(), ValidationError> {
    if body.transactions.len() > max_transactions {
        return Err(ValidationError::TooManyTransactions {
            got: body.transactions.len(),
            limit: max_transactions,
        });
    }

    for transaction in &body.transactions {
        if !transaction.verify_signature() {
            return Err(ValidationError::InvalidSignature(transaction.hash()));
        }

        accounts
            .verify_transaction_body(&transaction.body)
            .map_err(|source| ValidationError::RejectedTransaction {
                hash: transaction.hash(),
                source,
            })?;
    }

    Ok(())
}

/// Full block validation: proof of work, miner proof, then body rules;
/// the first failure wins
pub fn verify_block(
    block: &Block,
    accounts: &AccountStore,
    max_transactions: usize,
) -> Result<(), ValidationError> {
    verify_pow(block)?;
    verify_miner_signature(block)?;
    verify_body(&block.body, accounts, max_transactions)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockHeader;
    use crate::crypto::KeyPair;
    use crate::transaction::Transaction;

    fn unchecked_block(difficulty: u8, transactions: Vec<Transaction>) -> (Block, KeyPair) {
        let miner = KeyPair::generate();
        let proof = miner.sign(miner.address().as_bytes());

        let block = Block {
            header: BlockHeader {
                prev_hash: crypto::sha256(b"prev"),
                difficulty,
                nonce: 0,
                miner_pub_key: *miner.address(),
                miner_proof: proof,
                chain_state_merkle_hash: crypto::sha256(b"state"),
                transactions_merkle_hash: crypto::sha256(b"txs"),
            },
            body: BlockBody { transactions },
        };

        (block, miner)
    }

    fn mine(mut block: Block) -> Block {
        while !block.hash().has_leading_zero_bits(block.header.difficulty) {
            block.header.nonce += 1;
        }
        block
    }

    #[test]
    fn test_pow_accepted_at_difficulty() {
        let (block, _) = unchecked_block(8, Vec::new());
        let block = mine(block);

        assert!(verify_pow(&block).is_ok());
    }

    #[test]
    fn test_pow_rejected_when_bits_set() {
        let (block, _) = unchecked_block(8, Vec::new());
        let mut block = mine(block);

        // Raise the difficulty past what the nonce satisfies; a hash
        // meeting 8 bits almost surely misses 32.
        block.header.difficulty = 32;
        assert_eq!(verify_pow(&block), Err(ValidationError::InvalidPow(32)));
    }

    #[test]
    fn test_miner_signature() {
        let (block, _) = unchecked_block(0, Vec::new());
        assert!(verify_miner_signature(&block).is_ok());

        // A proof signed by a different key must be rejected.
        let (mut block, _) = unchecked_block(0, Vec::new());
        let other = KeyPair::generate();
        block.header.miner_proof = other.sign(block.header.miner_pub_key.as_bytes());
        assert_eq!(
            verify_miner_signature(&block),
            Err(ValidationError::InvalidMinerSig)
        );
    }

    #[test]
    fn test_body_transaction_cap() {
        let accounts = AccountStore::new();
        let a = KeyPair::generate();
        let b = KeyPair::generate();

        let transactions: Vec<Transaction> = (0..101)
            .map(|nonce| Transaction::create(&a, *b.address(), 1, 0, nonce))
            .collect();

        let result = verify_body(&BlockBody { transactions }, &accounts, 100);
        assert_eq!(
            result,
            Err(ValidationError::TooManyTransactions {
                got: 101,
                limit: 100
            })
        );
    }

    #[test]
    fn test_body_propagates_underlying_rejection() {
        let accounts = AccountStore::new();
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        accounts.reward_miner(a.address(), 5).unwrap();

        let tx = Transaction::create(&a, *b.address(), 10, 0, 1);
        let hash = tx.hash();

        let result = verify_body(
            &BlockBody {
                transactions: vec![tx],
            },
            &accounts,
            100,
        );
        assert_eq!(
            result,
            Err(ValidationError::RejectedTransaction {
                hash,
                source: AccountError::InsufficientFunds {
                    required: 10,
                    available: 5
                }
            })
        );
    }

    #[test]
    fn test_body_rejects_tampered_signature() {
        let accounts = AccountStore::new();
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        accounts.reward_miner(a.address(), 100).unwrap();

        let mut tx = Transaction::create(&a, *b.address(), 10, 0, 1);
        tx.body.nonce = 2;
        let hash = tx.hash();

        let result = verify_body(
            &BlockBody {
                transactions: vec![tx],
            },
            &accounts,
            100,
        );
        assert_eq!(result, Err(ValidationError::InvalidSignature(hash)));
    }

    #[test]
    fn test_full_verification_order() {
        let accounts = AccountStore::new();
        let a = KeyPair::generate();
        let b = KeyPair::generate();

        // Invalid body and unsolved PoW: the PoW failure must win.
        let tx = Transaction::create(&a, *b.address(), 10, 0, 1);
        let (mut block, _) = unchecked_block(32, vec![tx]);
        block.header.miner_proof = vec![0u8; 70];

        let result = verify_block(&block, &accounts, 100);
        assert_eq!(result, Err(ValidationError::InvalidPow(32)));
    }

    #[test]
    fn test_valid_block_passes() {
        let accounts = AccountStore::new();
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        accounts.reward_miner(a.address(), 100).unwrap();

        let tx = Transaction::create(&a, *b.address(), 10, 1, 1);
        let (block, _) = unchecked_block(8, vec![tx]);
        let block = mine(block);

        assert!(verify_block(&block, &accounts, 100).is_ok());
    }
}
