use dashmap::DashMap;
use log::{debug, info};
use thiserror::Error;

use std::collections::HashMap;

use crate::account::{AccountError, AccountStore};
use crate::crypto::Hash;
use crate::transaction::Transaction;

/// Errors that can occur when registering a transaction
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction signature does not verify")]
    InvalidSignature,

    #[error(transparent)]
    Rejected(#[from] AccountError),
}

/// Pool of verified transactions waiting for inclusion in a block
///
/// Every entry passed signature verification and, at insertion time,
/// body validation against the account store. After each accepted block
/// the pool is re-validated so stale entries drop out.
#[derive(Debug, Default)]
pub struct TransactionPool {
    transactions: DashMap<Hash, Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        TransactionPool {
            transactions: DashMap::new(),
        }
    }

    /// Verifies and inserts a transaction
    ///
    /// A duplicate hash silently overwrites the previous entry.
    ///
    /// # Arguments
    ///
    /// * `accounts` - The account state to validate the body against
    /// * `transaction` - The transaction to register
    ///
    /// # Returns
    ///
    /// The hash the transaction is stored under
    pub fn register(
        &self,
        accounts: &AccountStore,
        transaction: Transaction,
    ) -> Result<Hash, MempoolError> {
        if !transaction.verify_signature() {
            return Err(MempoolError::InvalidSignature);
        }

        accounts.verify_transaction_body(&transaction.body)?;

        let hash = transaction.hash();
        self.transactions.insert(hash, transaction);

        debug!("registered transaction {hash}");
        Ok(hash)
    }

    /// Clones the current pending set, for the miner
    pub fn snapshot(&self) -> HashMap<Hash, Transaction> {
        self.transactions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Drops the given confirmed transactions, then re-validates the rest
    pub fn remove_confirmed(&self, accounts: &AccountStore, confirmed: &[Transaction]) {
        for transaction in confirmed {
            self.transactions.remove(&transaction.hash());
        }

        self.reverify(accounts);
    }

    /// Evicts entries whose bodies no longer validate
    ///
    /// Signatures are not re-checked; they cannot become invalid.
    pub fn reverify(&self, accounts: &AccountStore) {
        // Decide on a snapshot, then mutate, so eviction never runs
        // under an iteration lock.
        let stale: Vec<Hash> = self
            .transactions
            .iter()
            .filter(|entry| {
                accounts
                    .verify_transaction_body(&entry.value().body)
                    .is_err()
            })
            .map(|entry| *entry.key())
            .collect();

        for hash in stale {
            self.transactions.remove(&hash);
            info!("evicted stale transaction {hash} from the pool");
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.transactions.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_register_and_snapshot() {
        let accounts = AccountStore::new();
        let pool = TransactionPool::new();
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        accounts.reward_miner(a.address(), 100).unwrap();

        let tx = Transaction::create(&a, *b.address(), 10, 1, 1);
        let hash = pool.register(&accounts, tx.clone()).unwrap();

        assert_eq!(hash, tx.hash());
        assert!(pool.contains(&hash));

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&hash], tx);
    }

    #[test]
    fn test_register_rejects_bad_signature() {
        let accounts = AccountStore::new();
        let pool = TransactionPool::new();
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        accounts.reward_miner(a.address(), 100).unwrap();

        let mut tx = Transaction::create(&a, *b.address(), 10, 0, 1);
        tx.body.amount = 90;

        let result = pool.register(&accounts, tx);
        assert_eq!(result, Err(MempoolError::InvalidSignature));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_register_rejects_invalid_body() {
        let accounts = AccountStore::new();
        let pool = TransactionPool::new();
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        accounts.reward_miner(a.address(), 5).unwrap();

        let tx = Transaction::create(&a, *b.address(), 10, 0, 1);
        let result = pool.register(&accounts, tx);

        assert!(matches!(
            result,
            Err(MempoolError::Rejected(AccountError::InsufficientFunds { .. }))
        ));
    }

    #[test]
    fn test_duplicate_register_overwrites() {
        let accounts = AccountStore::new();
        let pool = TransactionPool::new();
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        accounts.reward_miner(a.address(), 100).unwrap();

        let tx = Transaction::create(&a, *b.address(), 10, 1, 1);
        pool.register(&accounts, tx.clone()).unwrap();
        pool.register(&accounts, tx).unwrap();

        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_remove_confirmed_evicts_stale_entries() {
        let accounts = AccountStore::new();
        let pool = TransactionPool::new();
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let c = KeyPair::generate();
        let miner = KeyPair::generate();
        accounts.reward_miner(a.address(), 100).unwrap();

        let tx1 = Transaction::create(&a, *b.address(), 50, 0, 1);
        let tx2 = Transaction::create(&a, *c.address(), 60, 0, 2);
        pool.register(&accounts, tx1.clone()).unwrap();
        pool.register(&accounts, tx2.clone()).unwrap();
        assert_eq!(pool.len(), 2);

        // tx1 confirms in a block; afterwards only 50 remain, so tx2 no
        // longer fits and must be evicted.
        accounts
            .apply_transaction_body(&tx1.body, miner.address())
            .unwrap();
        pool.remove_confirmed(&accounts, &[tx1]);

        assert!(pool.is_empty());
        assert_eq!(accounts.balance(a.address()), 50);
    }

    #[test]
    fn test_reverify_keeps_valid_entries() {
        let accounts = AccountStore::new();
        let pool = TransactionPool::new();
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        accounts.reward_miner(a.address(), 100).unwrap();

        let tx = Transaction::create(&a, *b.address(), 10, 0, 1);
        let hash = pool.register(&accounts, tx).unwrap();

        pool.reverify(&accounts);
        assert!(pool.contains(&hash));
    }
}
