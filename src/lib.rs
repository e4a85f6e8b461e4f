// Shielded transaction pool
// Private notes, a Poseidon Merkle accumulator, Groth16 spend proofs and a
// bridge adapter for deposits and withdrawals across domains

pub mod primitives;
pub mod crypto;
pub mod zkp;
pub mod pool;
pub mod bridge;
pub mod storage;
pub mod client;

// Re-export key types for easy access
pub use primitives::{
    primitives::*,
    error::*,
    note::Note,
};

pub use crypto::{CryptoError, Keypair};

pub use zkp::{
    Arity, Groth16ProofSystem, ProofSystem, PublicInputs, TransactionKeys, TransactionProof,
    TransactionWitness, ZKPError,
};
pub use zkp::trusted_setup::TrustedSetup;

pub use pool::{
    AppliedTransaction, AssetCustodian, BridgeConfig, ExtData, InMemoryCustodian, InputNullifiers,
    LedgerState, MerkleTree, PoolConfig, PoolEvent, PoolHandle, ShieldedPool, Transaction,
};

pub use bridge::{BridgeAdapter, SignedUnwrap, UnwrapInstruction};

pub use storage::{PoolStore, SledPoolStore};

pub use client::{prepare_transaction, ClientError, PreparedTransaction, TransactionRequest};
