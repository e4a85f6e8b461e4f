// Trusted setup for the transaction circuits
// Generates Groth16 proving/verifying keys for every arity and persists them
use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use super::circuits::TransactionCircuit;
use super::proof_system::Arity;
use super::verifying_key::{verifying_key_hash, CircuitKeys, TransactionKeys};
use super::{Result, ZKPError};
use crate::primitives::Hash256;

const TRANSCRIPT_FILE: &str = "setup_transcript.json";

/// Record of one circuit's key generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitRecord {
    pub circuit_id: String,
    pub arity: Arity,
    pub verifying_key_hash: Hash256,
    pub proving_key_bytes: usize,
    pub verifying_key_bytes: usize,
}

/// Setup transcript for verifiability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupTranscript {
    pub ceremony_id: String,
    pub levels: usize,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub circuits: Vec<CircuitRecord>,
}

/// Trusted setup coordinator for one tree height
pub struct TrustedSetup {
    levels: usize,
    keys_dir: PathBuf,
}

impl TrustedSetup {
    pub fn new(keys_dir: impl Into<PathBuf>, levels: usize) -> Self {
        Self {
            levels,
            keys_dir: keys_dir.into(),
        }
    }

    pub fn keys_dir(&self) -> &Path {
        &self.keys_dir
    }

    /// Generate keys in memory for the given arities
    pub fn generate<R: RngCore + CryptoRng>(
        levels: usize,
        arities: &[Arity],
        rng: &mut R,
    ) -> Result<(TransactionKeys, SetupTranscript)> {
        let mut transcript = SetupTranscript {
            ceremony_id: uuid::Uuid::new_v4().to_string(),
            levels,
            start_time: chrono::Utc::now().timestamp(),
            end_time: None,
            circuits: Vec::new(),
        };
        let mut keys = TransactionKeys::new(levels);

        for &arity in arities {
            info!("⚙️  Setting up circuit: {} (height {})", arity, levels);
            let circuit = TransactionCircuit::empty(arity, levels);
            let (proving_key, verifying_key) = Groth16::<Bn254>::circuit_specific_setup(circuit, rng)
                .map_err(|e| ZKPError::SetupFailed(format!("{}: {}", arity, e)))?;

            let vk_hash = verifying_key_hash(&verifying_key)?;
            transcript.circuits.push(CircuitRecord {
                circuit_id: arity.circuit_id().to_string(),
                arity,
                verifying_key_hash: vk_hash,
                proving_key_bytes: proving_key.compressed_size(),
                verifying_key_bytes: verifying_key.compressed_size(),
            });
            info!("✅ {} setup complete, vk hash {}", arity, vk_hash);

            keys.insert(arity, CircuitKeys::new(Some(proving_key), verifying_key));
        }

        transcript.end_time = Some(chrono::Utc::now().timestamp());
        Ok((keys, transcript))
    }

    /// Generate keys for both arities and write them to the keys directory
    pub async fn run<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<(TransactionKeys, SetupTranscript)> {
        info!("🔐 Starting trusted setup for tree height {}", self.levels);
        let (keys, transcript) = Self::generate(self.levels, &Arity::all(), rng)?;

        fs::create_dir_all(&self.keys_dir).await?;
        for arity in keys.arities() {
            let circuit = keys.circuit(arity)?;
            let proving_key = circuit.proving_key.as_ref().ok_or(ZKPError::MissingKeys(arity))?;
            self.save_circuit_keys(arity, proving_key, &circuit.verifying_key).await?;
        }
        self.save_transcript(&transcript).await?;

        info!("🔑 Keys generated for {} circuits", transcript.circuits.len());
        Ok((keys, transcript))
    }

    fn key_path(&self, arity: Arity, extension: &str) -> PathBuf {
        self.keys_dir
            .join(format!("{}_h{}.{}", arity.circuit_id(), self.levels, extension))
    }

    async fn save_circuit_keys(
        &self,
        arity: Arity,
        proving_key: &ProvingKey<Bn254>,
        verifying_key: &VerifyingKey<Bn254>,
    ) -> Result<()> {
        let mut pk_bytes = Vec::new();
        proving_key
            .serialize_compressed(&mut pk_bytes)
            .map_err(|e| ZKPError::Serialization(format!("PK serialization error: {}", e)))?;
        fs::write(self.key_path(arity, "pk"), &pk_bytes).await?;

        let mut vk_bytes = Vec::new();
        verifying_key
            .serialize_compressed(&mut vk_bytes)
            .map_err(|e| ZKPError::Serialization(format!("VK serialization error: {}", e)))?;
        fs::write(self.key_path(arity, "vk"), &vk_bytes).await?;

        info!("💾 Saved keys for {} to {:?}", arity, self.keys_dir);
        info!("   📁 Proving key: {} bytes", pk_bytes.len());
        info!("   📁 Verifying key: {} bytes", vk_bytes.len());
        Ok(())
    }

    async fn save_transcript(&self, transcript: &SetupTranscript) -> Result<()> {
        let json = serde_json::to_string_pretty(transcript)
            .map_err(|e| ZKPError::Serialization(format!("Transcript serialization error: {}", e)))?;
        fs::write(self.keys_dir.join(TRANSCRIPT_FILE), json).await?;
        Ok(())
    }

    pub async fn load_transcript(&self) -> Result<SetupTranscript> {
        let json = fs::read_to_string(self.keys_dir.join(TRANSCRIPT_FILE)).await?;
        serde_json::from_str(&json)
            .map_err(|e| ZKPError::Serialization(format!("Transcript deserialization error: {}", e)))
    }

    /// Load keys for every arity present on disk. With `with_proving_keys`
    /// false only verifying keys are read.
    pub async fn load_keys(&self, with_proving_keys: bool) -> Result<TransactionKeys> {
        let transcript = self.load_transcript().await?;
        if transcript.levels != self.levels {
            return Err(ZKPError::SetupFailed(format!(
                "keys in {:?} were generated for height {}, not {}",
                self.keys_dir, transcript.levels, self.levels
            )));
        }

        let mut keys = TransactionKeys::new(self.levels);
        for record in &transcript.circuits {
            let vk_bytes = fs::read(self.key_path(record.arity, "vk")).await?;
            let verifying_key = VerifyingKey::<Bn254>::deserialize_compressed(&vk_bytes[..])
                .map_err(|e| ZKPError::Serialization(format!("VK deserialization error: {}", e)))?;

            if verifying_key_hash(&verifying_key)? != record.verifying_key_hash {
                warn!("❌ Verifying key for {} does not match the transcript", record.arity);
                return Err(ZKPError::SetupFailed(format!(
                    "verifying key hash mismatch for {}",
                    record.arity
                )));
            }

            let proving_key = if with_proving_keys {
                let pk_bytes = fs::read(self.key_path(record.arity, "pk")).await?;
                Some(
                    ProvingKey::<Bn254>::deserialize_compressed(&pk_bytes[..])
                        .map_err(|e| ZKPError::Serialization(format!("PK deserialization error: {}", e)))?,
                )
            } else {
                None
            };

            keys.insert(record.arity, CircuitKeys::new(proving_key, verifying_key));
            info!("🔑 Loaded keys for circuit: {}", record.arity);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let setup = TrustedSetup::new(dir.path(), 2);

        let (keys, transcript) = TrustedSetup::generate(2, &[Arity::Small], &mut rand::thread_rng()).unwrap();
        assert_eq!(transcript.circuits.len(), 1);

        fs::create_dir_all(setup.keys_dir()).await.unwrap();
        let circuit = keys.circuit(Arity::Small).unwrap();
        setup
            .save_circuit_keys(Arity::Small, circuit.proving_key.as_ref().unwrap(), &circuit.verifying_key)
            .await
            .unwrap();
        setup.save_transcript(&transcript).await.unwrap();

        let loaded = setup.load_keys(false).await.unwrap();
        assert_eq!(loaded.arities(), vec![Arity::Small]);
        assert!(loaded.proving_key(Arity::Small).is_err());
        assert_eq!(loaded.metadata().unwrap(), keys.metadata().unwrap());

        let wrong_height = TrustedSetup::new(dir.path(), 3);
        assert!(wrong_height.load_keys(false).await.is_err());
    }
}
