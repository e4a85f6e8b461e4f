// Cross-domain messages: inbound deposit payloads and outbound unwrap instructions
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::pool::Transaction;
use crate::primitives::{Address, Amount, Hash256, PoolError, Result};

/// Encode a transaction for delivery through the bridge relay
pub fn encode_bridge_payload(tx: &Transaction) -> Result<Vec<u8>> {
    Ok(bincode::serialize(tx)?)
}

pub fn decode_bridge_payload(payload: &[u8]) -> Result<Transaction> {
    bincode::deserialize(payload).map_err(|e| PoolError::MalformedPayload(e.to_string()))
}

/// Instruction for the remote relay to release escrowed funds to `recipient`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnwrapInstruction {
    /// SHA-256 over the spent nullifiers of the originating transaction
    pub id: Hash256,
    pub recipient: Address,
    pub amount: Amount,
    pub l1_fee: Amount,
    pub unwrapper: Address,
}

impl UnwrapInstruction {
    /// Canonical bytes covered by the signature
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn sign(self, signing_key: &SigningKey) -> Result<SignedUnwrap> {
        let signature = signing_key.sign(&self.signing_bytes()?).to_bytes().to_vec();
        Ok(SignedUnwrap {
            instruction: self,
            signature: Some(signature),
        })
    }
}

/// Outbound message as handed to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUnwrap {
    pub instruction: UnwrapInstruction,
    /// ed25519 signature, absent when the adapter runs without a key
    pub signature: Option<Vec<u8>>,
}

impl SignedUnwrap {
    pub fn unsigned(instruction: UnwrapInstruction) -> Self {
        Self {
            instruction,
            signature: None,
        }
    }

    pub fn verify(&self, verifying_key: &VerifyingKey) -> bool {
        let Some(bytes) = &self.signature else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(bytes) else {
            return false;
        };
        match self.instruction.signing_bytes() {
            Ok(message) => verifying_key.verify(&message, &signature).is_ok(),
            Err(_) => false,
        }
    }
}
