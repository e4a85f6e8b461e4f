// Pool and bridge configuration
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::merkle_tree::DEFAULT_ROOT_HISTORY_SIZE;
use crate::primitives::{parse_units, Address, Amount, PoolError, Result, TOKEN_DECIMALS};

pub const MINIMUM_WITHDRAWAL_ENV: &str = "MINIMUM_WITHDRAWAL_AMOUNT";
pub const MAXIMUM_DEPOSIT_ENV: &str = "MAXIMUM_DEPOSIT_AMOUNT";

const DEFAULT_MINIMUM_WITHDRAWAL: &str = "0.05";
const DEFAULT_MAXIMUM_DEPOSIT: &str = "1";
const MAX_TREE_HEIGHT: usize = 32;

/// Identities the bridge adapter works with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Only caller allowed to deliver bridged deposits
    pub relay: Address,
    /// The custodial asset the pool accepts
    pub asset: Address,
    /// Account holding funds of withdrawals released on the remote domain
    pub escrow: Address,
    /// Remote-domain contract that releases escrowed funds
    pub unwrapper: Address,
    /// Multisig receiving funds of rejected bridged deposits
    pub rescue: Address,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            relay: Address::from_label("bridge-relay"),
            asset: Address::from_label("token"),
            escrow: Address::from_label("bridge-escrow"),
            unwrapper: Address::from_label("l1-unwrapper"),
            rescue: Address::from_label("multisig"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Smallest allowed withdrawal, in base units
    pub min_withdrawal: Amount,
    /// Largest allowed deposit, in base units
    pub max_deposit: Amount,
    pub tree_height: usize,
    pub root_history_size: usize,
    /// Refuse output commitments already present in the tree
    pub reject_duplicate_commitments: bool,
    /// Custodial account holding pooled funds
    pub pool_account: Address,
    pub bridge: BridgeConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            min_withdrawal: default_units(DEFAULT_MINIMUM_WITHDRAWAL),
            max_deposit: default_units(DEFAULT_MAXIMUM_DEPOSIT),
            tree_height: 23,
            root_history_size: DEFAULT_ROOT_HISTORY_SIZE,
            reject_duplicate_commitments: true,
            pool_account: Address::from_label("shielded-pool"),
            bridge: BridgeConfig::default(),
        }
    }
}

fn default_units(value: &str) -> Amount {
    parse_units(value, TOKEN_DECIMALS).unwrap_or_default()
}

impl PoolConfig {
    /// Defaults with the deployment environment applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file; environment bounds override file values
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PoolError::Config(format!("cannot read {:?}: {}", path, e)))?;
        let mut config: PoolConfig = serde_json::from_str(&json)
            .map_err(|e| PoolError::Config(format!("invalid config {:?}: {}", path, e)))?;
        config.apply_env()?;
        config.validate()?;
        info!("Loaded pool config from {:?}", path);
        Ok(config)
    }

    /// `MINIMUM_WITHDRAWAL_AMOUNT` / `MAXIMUM_DEPOSIT_AMOUNT`, as decimal token amounts
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(MINIMUM_WITHDRAWAL_ENV) {
            self.min_withdrawal = parse_units(&value, TOKEN_DECIMALS)?;
        }
        if let Ok(value) = std::env::var(MAXIMUM_DEPOSIT_ENV) {
            self.max_deposit = parse_units(&value, TOKEN_DECIMALS)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tree_height == 0 || self.tree_height > MAX_TREE_HEIGHT {
            return Err(PoolError::Config(format!(
                "tree_height must be in 1..={}, got {}",
                MAX_TREE_HEIGHT, self.tree_height
            )));
        }
        if self.root_history_size == 0 {
            return Err(PoolError::Config("root_history_size must be at least 1".to_string()));
        }
        if self.min_withdrawal > self.max_deposit {
            return Err(PoolError::Config(format!(
                "min_withdrawal {} exceeds max_deposit {}",
                self.min_withdrawal, self.max_deposit
            )));
        }
        if self.pool_account == self.bridge.escrow || self.pool_account == self.bridge.rescue {
            return Err(PoolError::Config(
                "pool account must differ from the escrow and rescue accounts".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let config = PoolConfig::default();
        assert_eq!(config.min_withdrawal, 50_000_000_000_000_000);
        assert_eq!(config.max_deposit, 1_000_000_000_000_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = PoolConfig::default();
        config.tree_height = 0;
        assert!(config.validate().is_err());

        let mut config = PoolConfig::default();
        config.root_history_size = 0;
        assert!(config.validate().is_err());

        let mut config = PoolConfig::default();
        config.min_withdrawal = config.max_deposit + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");
        std::fs::write(&path, r#"{ "tree_height": 5, "root_history_size": 2 }"#).unwrap();

        let config = PoolConfig::load(&path).unwrap();
        assert_eq!(config.tree_height, 5);
        assert_eq!(config.root_history_size, 2);
        assert!(config.reject_duplicate_commitments);
    }
}
