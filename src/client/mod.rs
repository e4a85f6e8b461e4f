// Client-side transaction preparation
pub mod builder;

pub use builder::*;

use crate::crypto::CryptoError;
use crate::primitives::{Commitment, PoolError};
use crate::zkp::ZKPError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Keypair does not own input note with commitment {0}")]
    Ownership(Commitment),
    #[error("Commitment {0} is not in the tree snapshot")]
    UnknownCommitment(Commitment),
    #[error("{0} inputs requested, at most {max} supported", max = MAX_INPUTS)]
    TooManyInputs(usize),
    #[error("{0} outputs requested, at most {max} supported", max = MAX_OUTPUTS)]
    TooManyOutputs(usize),
    #[error("Amounts do not fit a valid external amount: {0}")]
    UnbalancedAmounts(String),
    #[error("Key error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Proof error: {0}")]
    Proof(#[from] ZKPError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
