// Custodial asset ledger the pool settles against
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::primitives::{Address, Amount, PoolError, Result};

/// A single payout leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub to: Address,
    pub amount: Amount,
}

/// Token custody capability
pub trait AssetCustodian: Send + Sync {
    fn balance_of(&self, account: &Address) -> Amount;

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()>;

    /// Whether `transfer_all` would succeed right now, without moving anything
    fn can_transfer_all(&self, from: &Address, transfers: &[Transfer]) -> Result<()>;

    /// Execute every transfer from `from` or none of them
    fn transfer_all(&mut self, from: &Address, transfers: &[Transfer]) -> Result<()>;
}

/// In-memory token ledger
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustodian {
    balances: HashMap<Address, Amount>,
    blocked: HashSet<Address>,
}

impl InMemoryCustodian {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `to` with freshly issued funds
    pub fn mint(&mut self, to: &Address, amount: Amount) {
        *self.balances.entry(*to).or_insert(0) += amount;
    }

    /// Make every transfer into `account` fail, as a token with a blocklist would
    pub fn block(&mut self, account: &Address) {
        self.blocked.insert(*account);
    }

    pub fn unblock(&mut self, account: &Address) {
        self.blocked.remove(account);
    }

    pub fn total_supply(&self) -> Amount {
        self.balances.values().sum()
    }

    fn check(&self, from: &Address, to: &Address, amount: Amount, available: Amount) -> Result<()> {
        if self.blocked.contains(to) {
            return Err(PoolError::Custodian(format!("transfers to {} are blocked", to)));
        }
        if available < amount {
            return Err(PoolError::Custodian(format!(
                "{} holds {} but {} was requested",
                from, available, amount
            )));
        }
        Ok(())
    }
}

impl AssetCustodian for InMemoryCustodian {
    fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        self.transfer_all(from, &[Transfer { to: *to, amount }])
    }

    fn can_transfer_all(&self, from: &Address, transfers: &[Transfer]) -> Result<()> {
        let mut available = self.balance_of(from);
        for transfer in transfers {
            self.check(from, &transfer.to, transfer.amount, available)?;
            available -= transfer.amount;
        }
        Ok(())
    }

    fn transfer_all(&mut self, from: &Address, transfers: &[Transfer]) -> Result<()> {
        // Validate the whole batch before moving anything
        self.can_transfer_all(from, transfers)?;

        for transfer in transfers {
            *self.balances.entry(*from).or_insert(0) -= transfer.amount;
            *self.balances.entry(transfer.to).or_insert(0) += transfer.amount;
            debug!("Transferred {} from {} to {}", transfer.amount, from, transfer.to);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_all_is_atomic() {
        let pool = Address::from_label("pool");
        let alice = Address::from_label("alice");
        let relayer = Address::from_label("relayer");

        let mut custodian = InMemoryCustodian::new();
        custodian.mint(&pool, 100);
        custodian.block(&relayer);

        let batch = [
            Transfer { to: alice, amount: 80 },
            Transfer { to: relayer, amount: 5 },
        ];
        assert!(custodian.can_transfer_all(&pool, &batch).is_err());
        assert!(custodian.transfer_all(&pool, &batch).is_err());
        assert_eq!(custodian.balance_of(&pool), 100);
        assert_eq!(custodian.balance_of(&alice), 0);

        custodian.unblock(&relayer);
        custodian.can_transfer_all(&pool, &batch).unwrap();
        assert_eq!(custodian.balance_of(&alice), 0);
        custodian.transfer_all(&pool, &batch).unwrap();
        assert_eq!(custodian.balance_of(&pool), 15);
        assert_eq!(custodian.balance_of(&alice), 80);
        assert_eq!(custodian.total_supply(), 100);
    }

    #[test]
    fn test_overdraft_rejected() {
        let pool = Address::from_label("pool");
        let mut custodian = InMemoryCustodian::new();
        custodian.mint(&pool, 10);
        assert!(matches!(
            custodian.transfer(&pool, &Address::from_label("bob"), 11),
            Err(PoolError::Custodian(_))
        ));
    }
}
