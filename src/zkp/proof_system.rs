// ZK proof system for shielded transactions
// Binds a proof to the exact public values the pool will act on

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, Proof};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::circuits::TransactionCircuit;
use super::verifying_key::TransactionKeys;
use super::{Result, ZKPError};
use crate::pool::Transaction;
use crate::primitives::{
    amount_to_field, ext_amount_to_field, hash_to_field, Address, Amount, Commitment, ExtAmount, LeafIndex,
    MerkleRoot, Nullifier,
};

/// Circuit arity: how many input notes a transaction consumes.
/// Both arities produce exactly two outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arity {
    Small,
    Large,
}

impl Arity {
    pub const OUTPUTS: usize = 2;

    pub fn inputs(self) -> usize {
        match self {
            Arity::Small => 2,
            Arity::Large => 16,
        }
    }

    pub fn outputs(self) -> usize {
        Self::OUTPUTS
    }

    /// Smallest arity that fits `count` real inputs
    pub fn for_inputs(count: usize) -> Option<Arity> {
        Self::all().into_iter().find(|arity| count <= arity.inputs())
    }

    /// Arity whose input count is exactly `count`
    pub fn exact(count: usize) -> Option<Arity> {
        Self::all().into_iter().find(|arity| count == arity.inputs())
    }

    pub fn all() -> [Arity; 2] {
        [Arity::Small, Arity::Large]
    }

    pub fn circuit_id(self) -> &'static str {
        match self {
            Arity::Small => "transaction2",
            Arity::Large => "transaction16",
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.circuit_id())
    }
}

/// Private witness for one spent note
#[derive(Debug, Clone)]
pub struct InputWitness {
    pub amount: Amount,
    pub private_key: Fr,
    pub blinding: Fr,
    pub path_index: LeafIndex,
    pub path_elements: Vec<Fr>,
}

/// Private witness for one created note
#[derive(Debug, Clone)]
pub struct OutputWitness {
    pub amount: Amount,
    pub public_key: Fr,
    pub blinding: Fr,
}

#[derive(Debug, Clone)]
pub struct TransactionWitness {
    pub inputs: Vec<InputWitness>,
    pub outputs: Vec<OutputWitness>,
}

/// Public values a transaction proof commits to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicInputs {
    pub root: MerkleRoot,
    pub input_nullifiers: Vec<Nullifier>,
    pub output_commitments: Vec<Commitment>,
    pub ext_amount: ExtAmount,
    pub fee: Amount,
    pub recipient_hash: Fr,
    pub relayer_hash: Fr,
}

impl PublicInputs {
    pub fn arity(&self) -> Option<Arity> {
        Arity::exact(self.input_nullifiers.len())
    }

    /// Field elements in circuit order:
    /// root, nullifiers, commitments, ext amount, fee, recipient hash, relayer hash
    pub fn to_field_elements(&self) -> Vec<Fr> {
        let mut elements = Vec::with_capacity(5 + self.input_nullifiers.len() + self.output_commitments.len());
        elements.push(self.root.0);
        elements.extend(self.input_nullifiers.iter().map(|n| n.0));
        elements.extend(self.output_commitments.iter().map(|c| c.0));
        elements.push(ext_amount_to_field(self.ext_amount));
        elements.push(amount_to_field(self.fee));
        elements.push(self.recipient_hash);
        elements.push(self.relayer_hash);
        elements
    }
}

/// Hash binding where a withdrawal goes: recipient, target domain and L1 fee
pub fn destination_hash(recipient: &Address, is_l1_withdrawal: bool, l1_fee: Amount) -> Fr {
    let mut data = Vec::with_capacity(20 + 1 + 16);
    data.extend_from_slice(recipient.as_bytes());
    data.push(is_l1_withdrawal as u8);
    data.extend_from_slice(&l1_fee.to_be_bytes());
    hash_to_field(&data)
}

pub fn relayer_hash(relayer: &Address) -> Fr {
    hash_to_field(relayer.as_bytes())
}

/// Assemble the ordered public inputs for `tx`
pub fn build_public_inputs(tx: &Transaction) -> PublicInputs {
    PublicInputs {
        root: tx.root,
        input_nullifiers: tx.input_nullifiers.as_slice().to_vec(),
        output_commitments: tx.output_commitments.to_vec(),
        ext_amount: tx.ext_data.ext_amount,
        fee: tx.ext_data.fee,
        recipient_hash: destination_hash(&tx.ext_data.recipient, tx.ext_data.is_l1_withdrawal, tx.ext_data.l1_fee),
        relayer_hash: relayer_hash(&tx.ext_data.relayer),
    }
}

/// Opaque proof bytes (compressed Groth16 proof)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionProof(#[serde(with = "hex::serde")] pub Vec<u8>);

impl TransactionProof {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Proving and verification capability used by the pool and its clients.
///
/// `verify` is a pure predicate: malformed proofs and mismatched public
/// inputs yield `Ok(false)`. Errors are reserved for a broken proof system.
pub trait ProofSystem: Send + Sync {
    /// Tree height the circuits were built for
    fn levels(&self) -> usize;

    fn prove(&self, witness: &TransactionWitness, public: &PublicInputs) -> Result<TransactionProof>;

    fn verify(&self, proof: &TransactionProof, public: &PublicInputs) -> Result<bool>;
}

/// Groth16 over BN254
pub struct Groth16ProofSystem {
    keys: TransactionKeys,
}

impl Groth16ProofSystem {
    pub fn new(keys: TransactionKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &TransactionKeys {
        &self.keys
    }
}

impl ProofSystem for Groth16ProofSystem {
    fn levels(&self) -> usize {
        self.keys.levels()
    }

    fn prove(&self, witness: &TransactionWitness, public: &PublicInputs) -> Result<TransactionProof> {
        let circuit = TransactionCircuit::new(self.keys.levels(), witness.clone(), public.clone())?;
        let proving_key = self.keys.proving_key(circuit.arity())?;

        let proof = Groth16::<Bn254>::prove(proving_key, circuit, &mut rand::rngs::OsRng)
            .map_err(|e| ZKPError::ProofGenerationFailed(e.to_string()))?;

        let mut bytes = Vec::new();
        proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| ZKPError::Serialization(format!("Proof serialization error: {}", e)))?;
        Ok(TransactionProof(bytes))
    }

    fn verify(&self, proof: &TransactionProof, public: &PublicInputs) -> Result<bool> {
        let arity = match public.arity() {
            Some(arity) if public.output_commitments.len() == arity.outputs() => arity,
            _ => return Ok(false),
        };
        let prepared = self.keys.prepared_verifying_key(arity)?;

        let proof = match Proof::<Bn254>::deserialize_compressed(proof.as_bytes()) {
            Ok(proof) => proof,
            Err(e) => {
                debug!("Rejecting undecodable proof: {}", e);
                return Ok(false);
            }
        };

        Groth16::<Bn254>::verify_with_processed_vk(prepared, &public.to_field_elements(), &proof)
            .map_err(|e| ZKPError::VerificationFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_selection() {
        assert_eq!(Arity::for_inputs(0), Some(Arity::Small));
        assert_eq!(Arity::for_inputs(2), Some(Arity::Small));
        assert_eq!(Arity::for_inputs(3), Some(Arity::Large));
        assert_eq!(Arity::for_inputs(16), Some(Arity::Large));
        assert_eq!(Arity::for_inputs(17), None);
        assert_eq!(Arity::exact(3), None);
        assert_eq!(Arity::Large.outputs(), 2);
    }

    #[test]
    fn test_public_input_order() {
        let public = PublicInputs {
            root: MerkleRoot(Fr::from(1u64)),
            input_nullifiers: vec![Nullifier(Fr::from(2u64)), Nullifier(Fr::from(3u64))],
            output_commitments: vec![Commitment(Fr::from(4u64)), Commitment(Fr::from(5u64))],
            ext_amount: -6,
            fee: 7,
            recipient_hash: Fr::from(8u64),
            relayer_hash: Fr::from(9u64),
        };
        let elements = public.to_field_elements();
        assert_eq!(elements.len(), 9);
        assert_eq!(elements[0], Fr::from(1u64));
        assert_eq!(elements[2], Fr::from(3u64));
        assert_eq!(elements[4], Fr::from(5u64));
        assert_eq!(elements[5], -Fr::from(6u64));
        assert_eq!(elements[8], Fr::from(9u64));
        assert_eq!(public.arity(), Some(Arity::Small));
    }

    #[test]
    fn test_destination_hash_binds_every_field() {
        let recipient = Address::from_label("recipient");
        let base = destination_hash(&recipient, false, 0);
        assert_ne!(base, destination_hash(&Address::from_label("other"), false, 0));
        assert_ne!(base, destination_hash(&recipient, true, 0));
        assert_ne!(base, destination_hash(&recipient, false, 1));
    }

    #[test]
    fn test_proof_bytes_serialize_as_hex() {
        let proof = TransactionProof(vec![0xde, 0xad]);
        assert_eq!(serde_json::to_string(&proof).unwrap(), "\"dead\"");
    }
}
