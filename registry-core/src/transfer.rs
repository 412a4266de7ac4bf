//! Value transfer collaborator used to pay out deposits

use crate::{
    types::{Address, Deposit},
    Error, Result,
};
use std::collections::{HashMap, HashSet};

/// Moves a deposit amount to a target identity
///
/// A target may refuse the transfer; callers must treat an error as an abort
/// of the whole operation that attempted it.
pub trait ValueTransfer {
    /// Pay `amount` to `to`
    fn transfer(&mut self, to: &Address, amount: Deposit) -> Result<()>;
}

impl<T: ValueTransfer + ?Sized> ValueTransfer for Box<T> {
    fn transfer(&mut self, to: &Address, amount: Deposit) -> Result<()> {
        (**self).transfer(to, amount)
    }
}

/// In-memory escrow crediting payouts to account balances
#[derive(Debug, Clone, Default)]
pub struct Vault {
    balances: HashMap<Address, Deposit>,

    /// Targets that refuse incoming value
    rejecting: HashSet<Address>,

    total_paid: Deposit,
}

impl Vault {
    /// Create empty vault
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `target` refuse every transfer
    pub fn reject(&mut self, target: Address) {
        self.rejecting.insert(target);
    }

    /// Let `target` receive transfers again
    pub fn accept(&mut self, target: Address) {
        self.rejecting.remove(&target);
    }

    /// Total paid to `account`
    pub fn balance_of(&self, account: &Address) -> Deposit {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Total paid to everyone
    pub fn total_paid(&self) -> Deposit {
        self.total_paid
    }
}

impl ValueTransfer for Vault {
    fn transfer(&mut self, to: &Address, amount: Deposit) -> Result<()> {
        if self.rejecting.contains(to) {
            return Err(Error::TransferFailed(format!("{} rejected {}", to, amount)));
        }
        *self.balances.entry(*to).or_default() += amount;
        self.total_paid += amount;
        Ok(())
    }
}
