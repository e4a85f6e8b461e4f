// Proof-carrying transactions as submitted to the pool
use serde::{Deserialize, Serialize};

use crate::primitives::{hash_data, Address, Amount, Commitment, ExtAmount, Hash256, MerkleRoot, Nullifier};
use crate::zkp::{build_public_inputs, Arity, PublicInputs, TransactionProof};

/// Input nullifiers for one of the two fixed circuit shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputNullifiers {
    Small([Nullifier; 2]),
    Large([Nullifier; 16]),
}

impl InputNullifiers {
    /// Shape a nullifier list; the length must match an arity exactly
    pub fn from_vec(nullifiers: Vec<Nullifier>) -> Option<Self> {
        match nullifiers.len() {
            2 => nullifiers.try_into().ok().map(InputNullifiers::Small),
            16 => nullifiers.try_into().ok().map(InputNullifiers::Large),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> &[Nullifier] {
        match self {
            InputNullifiers::Small(nullifiers) => nullifiers,
            InputNullifiers::Large(nullifiers) => nullifiers,
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            InputNullifiers::Small(_) => Arity::Small,
            InputNullifiers::Large(_) => Arity::Large,
        }
    }
}

/// Public settlement data carried alongside the proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtData {
    pub recipient: Address,
    pub ext_amount: ExtAmount,
    pub relayer: Address,
    pub fee: Amount,
    /// Release the withdrawn funds on the remote domain instead of locally
    pub is_l1_withdrawal: bool,
    /// Fee for the remote unwrapper, passed through in the outbound message
    pub l1_fee: Amount,
}

impl ExtData {
    /// Settlement data for a plain bridged deposit
    pub fn deposit(amount: Amount) -> Self {
        Self {
            recipient: Address::ZERO,
            ext_amount: ExtAmount::try_from(amount).unwrap_or(ExtAmount::MAX),
            relayer: Address::ZERO,
            fee: 0,
            is_l1_withdrawal: false,
            l1_fee: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub proof: TransactionProof,
    pub root: MerkleRoot,
    pub input_nullifiers: InputNullifiers,
    pub output_commitments: [Commitment; 2],
    pub ext_data: ExtData,
}

impl Transaction {
    pub fn arity(&self) -> Arity {
        self.input_nullifiers.arity()
    }

    pub fn public_inputs(&self) -> PublicInputs {
        build_public_inputs(self)
    }

    pub fn is_deposit(&self) -> bool {
        self.ext_data.ext_amount > 0
    }

    pub fn is_withdrawal(&self) -> bool {
        self.ext_data.ext_amount < 0
    }

    /// Amount leaving the pool to the recipient (zero unless withdrawing)
    pub fn withdrawal_amount(&self) -> Amount {
        if self.is_withdrawal() {
            self.ext_data.ext_amount.unsigned_abs()
        } else {
            0
        }
    }

    /// SHA-256 over the input nullifiers. Unique per applied transaction,
    /// since a nullifier can only ever be consumed once.
    pub fn id(&self) -> Hash256 {
        let mut data = Vec::with_capacity(32 * self.input_nullifiers.as_slice().len());
        for nullifier in self.input_nullifiers.as_slice() {
            data.extend_from_slice(&nullifier.to_bytes());
        }
        hash_data(&data)
    }
}
