// Shielded notes (UTXOs) and their derived commitment / nullifier
use ark_bn254::Fr;
use ark_ff::UniformRand;
use serde::{Deserialize, Serialize};

use super::primitives::{amount_to_field, field_serde, Amount, Commitment, LeafIndex, Nullifier};
use crate::crypto::{CryptoError, Keypair};
use crate::zkp::poseidon;

/// A private value record. Only its commitment ever reaches the pool.
///
/// Two notes with the same amount, owner and blinding are the same spendable
/// unit, so equality ignores the (optional) known tree position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub amount: Amount,
    #[serde(with = "field_serde")]
    pub public_key: Fr,
    #[serde(with = "field_serde")]
    pub blinding: Fr,
    /// Position in the accumulator, known once the commitment has been inserted
    pub index: Option<LeafIndex>,
}

impl Note {
    /// New note for `owner` with fresh blinding randomness
    pub fn new(amount: Amount, owner: Fr) -> Self {
        Self::with_blinding(amount, owner, Fr::rand(&mut rand::rngs::OsRng))
    }

    pub fn with_blinding(amount: Amount, owner: Fr, blinding: Fr) -> Self {
        Self {
            amount,
            public_key: owner,
            blinding,
            index: None,
        }
    }

    /// Zero-amount note used to pad a transaction to its circuit arity
    pub fn dummy(owner: Fr) -> Self {
        Self::new(0, owner)
    }

    pub fn at_index(mut self, index: LeafIndex) -> Self {
        self.index = Some(index);
        self
    }

    pub fn is_dummy(&self) -> bool {
        self.amount == 0
    }

    pub fn commitment(&self) -> Commitment {
        Commitment(poseidon::hash3(amount_to_field(self.amount), self.public_key, self.blinding))
    }

    /// Nullifier at the note's recorded position. Dummy notes default to index 0.
    pub fn nullifier(&self, keypair: &Keypair) -> Result<Nullifier, CryptoError> {
        let index = match (self.index, self.is_dummy()) {
            (Some(index), _) => index,
            (None, true) => 0,
            (None, false) => return Err(CryptoError::MissingIndex),
        };
        keypair.derive_nullifier(self, index)
    }
}

impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.amount == other.amount && self.public_key == other.public_key && self.blinding == other.blinding
    }
}

impl Eq for Note {}

impl std::hash::Hash for Note {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.amount.hash(state);
        self.public_key.hash(state);
        self.blinding.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_is_deterministic() {
        let owner = Keypair::generate();
        let note = Note::new(100, owner.public_key());
        let copy = Note::with_blinding(100, owner.public_key(), note.blinding);
        assert_eq!(note.commitment(), copy.commitment());
        assert_eq!(note, copy);

        let other = Note::new(100, owner.public_key());
        assert_ne!(note.commitment(), other.commitment());
    }

    #[test]
    fn test_nullifier_depends_on_index() {
        let owner = Keypair::generate();
        let note = Note::new(5, owner.public_key());
        let at_zero = note.clone().at_index(0).nullifier(&owner).unwrap();
        let at_one = note.clone().at_index(1).nullifier(&owner).unwrap();
        assert_ne!(at_zero, at_one);
    }

    #[test]
    fn test_unplaced_note_has_no_nullifier() {
        let owner = Keypair::generate();
        let note = Note::new(5, owner.public_key());
        assert!(matches!(note.nullifier(&owner), Err(CryptoError::MissingIndex)));

        let dummy = Note::dummy(owner.public_key());
        assert!(dummy.nullifier(&owner).is_ok());
    }

    #[test]
    fn test_foreign_key_cannot_nullify() {
        let owner = Keypair::generate();
        let stranger = Keypair::generate();
        let note = Note::new(5, owner.public_key()).at_index(3);
        assert!(matches!(note.nullifier(&stranger), Err(CryptoError::Ownership)));
    }

    #[test]
    fn test_note_serialization() {
        let owner = Keypair::generate();
        let note = Note::new(42, owner.public_key()).at_index(7);
        let json = serde_json::to_string(&note).unwrap();
        let decoded: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, note);
        assert_eq!(decoded.index, Some(7));
    }
}
