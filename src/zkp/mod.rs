// Zero-knowledge proof components for the shielded pool
// Fixed-arity Groth16 transaction circuits over BN254 with Poseidon hashing

pub use proof_system::*;
pub use verifying_key::*;

pub mod poseidon;
pub mod circuits;
pub mod proof_system;
pub mod verifying_key;
pub mod trusted_setup;

/// Error types for ZKP operations
#[derive(Debug, thiserror::Error)]
pub enum ZKPError {
    #[error("Invalid ZKP proof")]
    InvalidProof,
    #[error("Proof verification failed: {0}")]
    VerificationFailed(String),
    #[error("No keys loaded for the {0} circuit")]
    MissingKeys(Arity),
    #[error("Circuit shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(String),
    #[error("Trusted setup failed: {0}")]
    SetupFailed(String),
    #[error("Key serialization error: {0}")]
    Serialization(String),
    #[error("Key storage error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ZKPError>;
