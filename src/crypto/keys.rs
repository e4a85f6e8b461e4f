// Shielded keypairs: a private scalar and its Poseidon public key

use ark_bn254::Fr;
use ark_ff::UniformRand;
use rand::{CryptoRng, RngCore};

use super::{CryptoError, Result};
use crate::primitives::{field_from_hex, field_to_hex, Commitment, LeafIndex, Note, Nullifier};
use crate::zkp::poseidon;

/// Owner of shielded notes.
///
/// The public key is derived from the private scalar and cannot be set
/// independently.
#[derive(Clone)]
pub struct Keypair {
    private_key: Fr,
    public_key: Fr,
}

impl Keypair {
    /// Generate a keypair from the operating system RNG
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rngs::OsRng)
    }

    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_private_key(Fr::rand(rng))
    }

    pub fn from_private_key(private_key: Fr) -> Self {
        Self {
            private_key,
            public_key: poseidon::hash1(private_key),
        }
    }

    pub fn from_hex(private_key_hex: &str) -> Result<Self> {
        let private_key = field_from_hex(private_key_hex).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::from_private_key(private_key))
    }

    /// Export the private scalar (use carefully!)
    pub fn private_key_hex(&self) -> String {
        field_to_hex(&self.private_key)
    }

    pub fn private_key(&self) -> Fr {
        self.private_key
    }

    pub fn public_key(&self) -> Fr {
        self.public_key
    }

    /// Per-note signing value, bound to the commitment and its tree position
    pub fn sign(&self, commitment: &Commitment, index: LeafIndex) -> Fr {
        poseidon::hash3(self.private_key, commitment.0, Fr::from(index))
    }

    /// Nullifier of `note` placed at `index`. Only the note's owner can compute it.
    pub fn derive_nullifier(&self, note: &Note, index: LeafIndex) -> Result<Nullifier> {
        if note.public_key != self.public_key {
            return Err(CryptoError::Ownership);
        }
        let commitment = note.commitment();
        let signature = self.sign(&commitment, index);
        Ok(Nullifier(poseidon::hash3(commitment.0, Fr::from(index), signature)))
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &field_to_hex(&self.public_key))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_is_derived() {
        let keypair = Keypair::generate();
        assert_eq!(keypair.public_key(), poseidon::hash1(keypair.private_key()));

        let restored = Keypair::from_hex(&keypair.private_key_hex()).unwrap();
        assert_eq!(restored.public_key(), keypair.public_key());
    }

    #[test]
    fn test_signature_binds_index() {
        let keypair = Keypair::generate();
        let note = Note::new(10, keypair.public_key());
        let commitment = note.commitment();
        assert_ne!(keypair.sign(&commitment, 0), keypair.sign(&commitment, 1));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let keypair = Keypair::generate();
        let rendered = format!("{:?}", keypair);
        assert!(!rendered.contains(&keypair.private_key_hex()));
    }

    #[test]
    fn test_invalid_private_key_hex() {
        assert!(matches!(Keypair::from_hex("0xzz"), Err(CryptoError::InvalidPrivateKey)));
    }
}
