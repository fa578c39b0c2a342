use dashmap::DashMap;
use thiserror::Error;

use std::collections::{HashMap, HashSet};

use crate::crypto::{self, Address, Hash};
use crate::transaction::TransactionBody;

/// Errors that can occur while validating or applying transaction bodies
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("invalid amount: transfers must move a positive amount")]
    InvalidAmount,

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u128, available: u64 },

    #[error("nonce {0} already spent by sender")]
    InvalidNonce(u64),

    #[error("balance overflow while crediting account {0}")]
    BalanceOverflow(Address),
}

/// Per-account state: spendable balance and the set of used nonces
///
/// Accounts are created on first credit or debit and never destroyed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: u64,
    pub spent_nonces: HashSet<u64>,
}

/// Holds the balance and nonce state of every account
///
/// The store is the single owner of account state; all mutation goes
/// through [`apply_transaction_body`](AccountStore::apply_transaction_body)
/// and [`reward_miner`](AccountStore::reward_miner).
#[derive(Debug, Default, Clone)]
pub struct AccountStore {
    accounts: DashMap<Address, Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        AccountStore {
            accounts: DashMap::new(),
        }
    }

    /// Returns the balance of an account, zero if unknown
    pub fn balance(&self, address: &Address) -> u64 {
        self.accounts
            .get(address)
            .map(|account| account.balance)
            .unwrap_or(0)
    }

    /// Validates a transaction body against current state
    ///
    /// Checks, in order: positive amount, sender existence, funds
    /// covering amount plus fee (compared in u128 so the sum cannot
    /// wrap), and nonce freshness.
    pub fn verify_transaction_body(&self, body: &TransactionBody) -> Result<(), AccountError> {
        if body.amount == 0 {
            return Err(AccountError::InvalidAmount);
        }

        let required = body.amount as u128 + body.transaction_fee as u128;

        let Some(sender) = self.accounts.get(&body.from) else {
            return Err(AccountError::InsufficientFunds {
                required,
                available: 0,
            });
        };

        if required > sender.balance as u128 {
            return Err(AccountError::InsufficientFunds {
                required,
                available: sender.balance,
            });
        }

        if sender.spent_nonces.contains(&body.nonce) {
            return Err(AccountError::InvalidNonce(body.nonce));
        }

        Ok(())
    }

    /// Applies a verified transaction body
    ///
    /// Precondition: [`verify_transaction_body`](Self::verify_transaction_body)
    /// returned `Ok` and the transaction signature has been checked.
    /// Debits the sender by amount plus fee, records the nonce, credits
    /// the recipient, and credits the fee to the miner. Every new
    /// balance is staged and checked before the store is touched, so a
    /// rejected application leaves no account mutated.
    pub fn apply_transaction_body(
        &self,
        body: &TransactionBody,
        miner: &Address,
    ) -> Result<(), AccountError> {
        let required = body.amount as u128 + body.transaction_fee as u128;
        let mut staged: HashMap<Address, u64> = HashMap::new();

        let available = self.balance(&body.from);
        let total = u64::try_from(required).map_err(|_| AccountError::InsufficientFunds {
            required,
            available,
        })?;
        let debited = available
            .checked_sub(total)
            .ok_or(AccountError::InsufficientFunds {
                required,
                available,
            })?;
        staged.insert(body.from, debited);

        let credited = self
            .staged_balance(&staged, &body.to)
            .checked_add(body.amount)
            .ok_or(AccountError::BalanceOverflow(body.to))?;
        staged.insert(body.to, credited);

        if body.transaction_fee > 0 {
            let credited = self
                .staged_balance(&staged, miner)
                .checked_add(body.transaction_fee)
                .ok_or(AccountError::BalanceOverflow(*miner))?;
            staged.insert(*miner, credited);
        }

        // Every check passed; write the staged balances and the nonce.
        for (address, balance) in staged {
            self.accounts.entry(address).or_default().balance = balance;
        }
        if let Some(mut sender) = self.accounts.get_mut(&body.from) {
            sender.spent_nonces.insert(body.nonce);
        }

        Ok(())
    }

    /// The balance an address would hold with the staged writes applied
    fn staged_balance(&self, staged: &HashMap<Address, u64>, address: &Address) -> u64 {
        staged
            .get(address)
            .copied()
            .unwrap_or_else(|| self.balance(address))
    }

    /// Credits the block reward to the miner
    pub fn reward_miner(&self, miner: &Address, value: u64) -> Result<(), AccountError> {
        self.credit(miner, value)
    }

    fn credit(&self, address: &Address, amount: u64) -> Result<(), AccountError> {
        let mut account = self.accounts.entry(*address).or_default();

        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(AccountError::BalanceOverflow(*address))?;

        Ok(())
    }

    /// Number of known accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> u128 {
        self.accounts
            .iter()
            .map(|entry| entry.value().balance as u128)
            .sum()
    }

    /// Digest of the full account table
    ///
    /// Accounts are visited in address order so the digest is
    /// independent of map iteration. Carried in block headers as the
    /// chain-state field; validation never recomputes it.
    pub fn state_digest(&self) -> Hash {
        let mut entries: Vec<(Address, u64, Vec<u64>)> = self
            .accounts
            .iter()
            .map(|entry| {
                let mut nonces: Vec<u64> = entry.value().spent_nonces.iter().copied().collect();
                nonces.sort_unstable();
                (*entry.key(), entry.value().balance, nonces)
            })
            .collect();
        entries.sort_unstable_by(|a, b| a.0 .0.cmp(&b.0 .0));

        let mut bytes = Vec::new();
        for (address, balance, nonces) in entries {
            bytes.extend_from_slice(&address.0);
            bytes.extend_from_slice(&balance.to_be_bytes());
            bytes.extend_from_slice(&(nonces.len() as u64).to_be_bytes());
            for nonce in nonces {
                bytes.extend_from_slice(&nonce.to_be_bytes());
            }
        }

        crypto::sha256(&bytes)
    }
}
