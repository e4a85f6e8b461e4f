// Key material for shielded note ownership
// Spending authority is a private scalar; everything else is derived with Poseidon

pub mod keys;

pub use keys::Keypair;

/// Errors raised by client-side key operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Keypair does not own this note")]
    Ownership,
    #[error("Note position in the tree is unknown")]
    MissingIndex,
    #[error("Invalid private key encoding")]
    InvalidPrivateKey,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
