//! In-memory token vault.
//!
//! [`MemoryVault`] keeps per-account balances and the escrow's custody
//! balance in a `HashMap`. It is the reference [`TokenVault`] for tests and
//! the scenario driver; production integrations implement the trait over a
//! real token ledger.

use std::collections::HashMap;

use crate::error::TransferError;
use crate::traits::TokenVault;
use crate::types::AccountId;

/// Token balances held in memory, plus the escrow's custody.
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    /// Free balance per account.
    balances: HashMap<AccountId, u128>,
    /// Units currently held on behalf of the escrow.
    custody: u128,
}

impl MemoryVault {
    /// Create an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `account` out of thin air (test funding).
    pub fn mint(&mut self, account: &AccountId, amount: u128) -> Result<(), TransferError> {
        let balance = self.balances.entry(*account).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(TransferError::Overflow)?;
        Ok(())
    }

    /// Free balance of `account`.
    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Units held in escrow custody.
    pub fn custody(&self) -> u128 {
        self.custody
    }
}

impl TokenVault for MemoryVault {
    fn pull(&mut self, from: &AccountId, amount: u128) -> Result<(), TransferError> {
        let have = self.balance_of(from);
        if have < amount {
            return Err(TransferError::InsufficientBalance { have, need: amount });
        }
        let custody = self
            .custody
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;
        self.balances.insert(*from, have - amount);
        self.custody = custody;
        Ok(())
    }

    fn push(&mut self, to: &AccountId, amount: u128) -> Result<(), TransferError> {
        if self.custody < amount {
            return Err(TransferError::InsufficientCustody {
                have: self.custody,
                need: amount,
            });
        }
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;
        self.custody -= amount;
        self.balances.insert(*to, balance);
        Ok(())
    }
}
