// Groth16 key material for the transaction circuits, one entry per arity

use std::collections::BTreeMap;

use ark_bn254::Bn254;
use ark_groth16::{prepare_verifying_key, PreparedVerifyingKey, ProvingKey, VerifyingKey};
use ark_serialize::CanonicalSerialize;
use serde::{Deserialize, Serialize};

use super::proof_system::Arity;
use super::{Result, ZKPError};
use crate::primitives::Hash256;

/// Keys for a single circuit. Verifier-only deployments carry no proving key.
#[derive(Clone)]
pub struct CircuitKeys {
    pub proving_key: Option<ProvingKey<Bn254>>,
    pub verifying_key: VerifyingKey<Bn254>,
    prepared: PreparedVerifyingKey<Bn254>,
}

impl CircuitKeys {
    pub fn new(proving_key: Option<ProvingKey<Bn254>>, verifying_key: VerifyingKey<Bn254>) -> Self {
        let prepared = prepare_verifying_key(&verifying_key);
        Self {
            proving_key,
            verifying_key,
            prepared,
        }
    }
}

/// Key set for every arity at one tree height
#[derive(Clone)]
pub struct TransactionKeys {
    levels: usize,
    circuits: BTreeMap<Arity, CircuitKeys>,
}

/// Fingerprint of a key set, written next to the keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySetMetadata {
    pub levels: usize,
    /// Circuit id to SHA-256 of its compressed verifying key
    pub verifying_key_hashes: BTreeMap<String, Hash256>,
}

impl TransactionKeys {
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            circuits: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, arity: Arity, keys: CircuitKeys) {
        self.circuits.insert(arity, keys);
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn arities(&self) -> Vec<Arity> {
        self.circuits.keys().copied().collect()
    }

    pub fn circuit(&self, arity: Arity) -> Result<&CircuitKeys> {
        self.circuits.get(&arity).ok_or(ZKPError::MissingKeys(arity))
    }

    pub fn proving_key(&self, arity: Arity) -> Result<&ProvingKey<Bn254>> {
        self.circuit(arity)?
            .proving_key
            .as_ref()
            .ok_or(ZKPError::MissingKeys(arity))
    }

    pub fn prepared_verifying_key(&self, arity: Arity) -> Result<&PreparedVerifyingKey<Bn254>> {
        Ok(&self.circuit(arity)?.prepared)
    }

    /// Same key set without proving keys, for the pool side
    pub fn verifier_only(&self) -> Self {
        let circuits = self
            .circuits
            .iter()
            .map(|(arity, keys)| (*arity, CircuitKeys::new(None, keys.verifying_key.clone())))
            .collect();
        Self {
            levels: self.levels,
            circuits,
        }
    }

    pub fn metadata(&self) -> Result<KeySetMetadata> {
        let mut verifying_key_hashes = BTreeMap::new();
        for (arity, keys) in &self.circuits {
            verifying_key_hashes.insert(arity.circuit_id().to_string(), verifying_key_hash(&keys.verifying_key)?);
        }
        Ok(KeySetMetadata {
            levels: self.levels,
            verifying_key_hashes,
        })
    }
}

/// SHA-256 over the compressed verifying key
pub fn verifying_key_hash(verifying_key: &VerifyingKey<Bn254>) -> Result<Hash256> {
    let mut bytes = Vec::new();
    verifying_key
        .serialize_compressed(&mut bytes)
        .map_err(|e| ZKPError::Serialization(format!("VK serialization error: {}", e)))?;
    Ok(Hash256::from_data(&bytes))
}
