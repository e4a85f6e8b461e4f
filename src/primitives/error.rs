// Error taxonomy for the shielded pool
use thiserror::Error;

use super::primitives::{Address, Amount, Commitment, ExtAmount, MerkleRoot, Nullifier};

pub type Result<T> = std::result::Result<T, PoolError>;

/// Which configured bound an external amount violated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountBoundViolation {
    #[error("deposit exceeds maximum of {maximum}")]
    DepositAboveMaximum { maximum: Amount },

    #[error("withdrawal is below minimum of {minimum}")]
    WithdrawalBelowMinimum { minimum: Amount },
}

/// Every way the pool can refuse a transaction, plus infrastructure failures.
///
/// Rejections are detected before any state is touched, so receiving one of
/// these never implies a partial update.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Merkle root {0} is not in the recent root history")]
    StaleRoot(MerkleRoot),

    #[error("Input nullifier {0} has already been spent")]
    DoubleSpend(Nullifier),

    #[error("Output commitment {0} is already present in the tree")]
    DuplicateCommitment(Commitment),

    #[error("External amount {ext_amount} out of bounds: {violation}")]
    AmountBound {
        ext_amount: ExtAmount,
        violation: AmountBoundViolation,
    },

    #[error("Deposit of {expected} is not backed by a settled transfer (received {received})")]
    UnsettledDeposit { expected: Amount, received: Amount },

    #[error("Pool holds {available} but the transaction pays out {required}")]
    InsufficientPoolBalance { required: Amount, available: Amount },

    #[error("Invalid transaction proof")]
    InvalidProof,

    #[error("Merkle tree is full ({capacity} leaves)")]
    CapacityExceeded { capacity: u64 },

    #[error("Withdrawal requires a non-zero recipient")]
    MissingRecipient,

    #[error("Caller {0} is not the configured bridge relay")]
    UnauthorizedRelay(Address),

    #[error("Asset {0} is not supported by this pool")]
    UnsupportedAsset(Address),

    #[error("Malformed bridge payload: {0}")]
    MalformedPayload(String),

    #[error("Custodian error: {0}")]
    Custodian(String),

    #[error("Proof system error: {0}")]
    ProofSystem(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PoolError {
    /// The pool instance cannot accept any further output
    pub fn is_fatal(&self) -> bool {
        matches!(self, PoolError::CapacityExceeded { .. })
    }

    /// The same notes may succeed with a proof built against a newer root
    pub fn is_retryable_with_fresh_proof(&self) -> bool {
        matches!(self, PoolError::StaleRoot(_))
    }

    /// Short machine-readable reason, used in logs and the CLI
    pub fn reason(&self) -> &'static str {
        match self {
            PoolError::StaleRoot(_) => "stale_root",
            PoolError::DoubleSpend(_) => "double_spend",
            PoolError::DuplicateCommitment(_) => "duplicate_commitment",
            PoolError::AmountBound { .. } => "amount_bound",
            PoolError::UnsettledDeposit { .. } => "unsettled_deposit",
            PoolError::InsufficientPoolBalance { .. } => "insufficient_pool_balance",
            PoolError::InvalidProof => "invalid_proof",
            PoolError::CapacityExceeded { .. } => "capacity_exceeded",
            PoolError::MissingRecipient => "missing_recipient",
            PoolError::UnauthorizedRelay(_) => "unauthorized_relay",
            PoolError::UnsupportedAsset(_) => "unsupported_asset",
            PoolError::MalformedPayload(_) => "malformed_payload",
            PoolError::Custodian(_) => "custodian",
            PoolError::ProofSystem(_) => "proof_system",
            PoolError::Storage(_) => "storage",
            PoolError::Serialization(_) => "serialization",
            PoolError::Config(_) => "config",
        }
    }
}

impl From<std::io::Error> for PoolError {
    fn from(err: std::io::Error) -> Self {
        PoolError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for PoolError {
    fn from(err: bincode::Error) -> Self {
        PoolError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for PoolError {
    fn from(err: serde_json::Error) -> Self {
        PoolError::Serialization(err.to_string())
    }
}

impl From<sled::Error> for PoolError {
    fn from(err: sled::Error) -> Self {
        PoolError::Storage(err.to_string())
    }
}

impl From<crate::zkp::ZKPError> for PoolError {
    fn from(err: crate::zkp::ZKPError) -> Self {
        PoolError::ProofSystem(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    #[test]
    fn test_only_capacity_is_fatal() {
        assert!(PoolError::CapacityExceeded { capacity: 32 }.is_fatal());
        assert!(!PoolError::InvalidProof.is_fatal());
        assert!(!PoolError::StaleRoot(MerkleRoot(Fr::from(1u64))).is_fatal());
    }

    #[test]
    fn test_rejections_are_distinguishable() {
        let stale = PoolError::StaleRoot(MerkleRoot(Fr::from(7u64)));
        let spent = PoolError::DoubleSpend(Nullifier(Fr::from(7u64)));
        assert!(stale.is_retryable_with_fresh_proof());
        assert!(!spent.is_retryable_with_fresh_proof());
        assert_ne!(stale.reason(), spent.reason());
        assert!(format!("{}", spent).contains("already been spent"));
    }
}
