// Transaction circuit: proves ownership, membership and value conservation
// for a fixed number of input and output notes
use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::poseidon::PoseidonGadget;
use super::proof_system::{Arity, InputWitness, OutputWitness, PublicInputs, TransactionWitness};
use super::{Result, ZKPError};
use crate::primitives::{amount_to_field, ext_amount_to_field};

/// Every note amount must fit in this many bits, so sums cannot wrap the field
pub const AMOUNT_BITS: usize = 128;

/// Range check: `value < 2^bits`. Returns the low `bits` bits.
fn enforce_bit_length(value: &FpVar<Fr>, bits: usize) -> std::result::Result<Vec<Boolean<Fr>>, SynthesisError> {
    let decomposition = value.to_bits_le()?;
    for bit in &decomposition[bits..] {
        bit.enforce_equal(&Boolean::FALSE)?;
    }
    Ok(decomposition[..bits].to_vec())
}

/// Root of the path from `leaf`; bit i set means the node is the right child at level i
fn merkle_root(
    poseidon: &PoseidonGadget,
    leaf: &FpVar<Fr>,
    path_bits: &[Boolean<Fr>],
    path_elements: &[FpVar<Fr>],
) -> std::result::Result<FpVar<Fr>, SynthesisError> {
    let mut current = leaf.clone();
    for (bit, sibling) in path_bits.iter().zip(path_elements) {
        let left = FpVar::conditionally_select(bit, sibling, &current)?;
        let right = FpVar::conditionally_select(bit, &current, sibling)?;
        current = poseidon.hash2(&left, &right)?;
    }
    Ok(current)
}

/// Transaction circuit for one arity and tree height.
///
/// Public inputs, in allocation order: root, input nullifiers, output
/// commitments, external amount, fee, recipient hash, relayer hash.
#[derive(Clone)]
pub struct TransactionCircuit {
    arity: Arity,
    levels: usize,
    witness: Option<TransactionWitness>,
    public: Option<PublicInputs>,
}

impl TransactionCircuit {
    pub fn new(levels: usize, witness: TransactionWitness, public: PublicInputs) -> Result<Self> {
        let arity = public.arity().ok_or_else(|| {
            ZKPError::ShapeMismatch(format!("{} input nullifiers", public.input_nullifiers.len()))
        })?;
        if witness.inputs.len() != arity.inputs() || witness.outputs.len() != arity.outputs() {
            return Err(ZKPError::ShapeMismatch(format!(
                "witness has {} inputs / {} outputs, {} circuit needs {} / {}",
                witness.inputs.len(),
                witness.outputs.len(),
                arity,
                arity.inputs(),
                arity.outputs()
            )));
        }
        if public.output_commitments.len() != arity.outputs() {
            return Err(ZKPError::ShapeMismatch(format!(
                "{} output commitments",
                public.output_commitments.len()
            )));
        }
        if let Some(bad) = witness.inputs.iter().find(|input| input.path_elements.len() != levels) {
            return Err(ZKPError::ShapeMismatch(format!(
                "Merkle path of length {} for a tree of height {}",
                bad.path_elements.len(),
                levels
            )));
        }

        Ok(Self {
            arity,
            levels,
            witness: Some(witness),
            public: Some(public),
        })
    }

    /// Circuit without assignments, used for key generation
    pub fn empty(arity: Arity, levels: usize) -> Self {
        Self {
            arity,
            levels,
            witness: None,
            public: None,
        }
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }
}

impl ConstraintSynthesizer<Fr> for TransactionCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> std::result::Result<(), SynthesisError> {
        let poseidon = PoseidonGadget::new(cs.clone())?;
        let public = self.public.as_ref();
        let witness = self.witness.as_ref();
        let missing = || SynthesisError::AssignmentMissing;

        // Public inputs
        let root = FpVar::<Fr>::new_input(cs.clone(), || public.map(|p| p.root.0).ok_or_else(missing))?;
        let nullifiers = (0..self.arity.inputs())
            .map(|i| FpVar::<Fr>::new_input(cs.clone(), || public.map(|p| p.input_nullifiers[i].0).ok_or_else(missing)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let commitments = (0..self.arity.outputs())
            .map(|i| FpVar::<Fr>::new_input(cs.clone(), || public.map(|p| p.output_commitments[i].0).ok_or_else(missing)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let ext_amount = FpVar::<Fr>::new_input(cs.clone(), || {
            public.map(|p| ext_amount_to_field(p.ext_amount)).ok_or_else(missing)
        })?;
        let fee = FpVar::<Fr>::new_input(cs.clone(), || public.map(|p| amount_to_field(p.fee)).ok_or_else(missing))?;
        let recipient_hash = FpVar::<Fr>::new_input(cs.clone(), || public.map(|p| p.recipient_hash).ok_or_else(missing))?;
        let relayer_hash = FpVar::<Fr>::new_input(cs.clone(), || public.map(|p| p.relayer_hash).ok_or_else(missing))?;

        // Inputs: ownership, nullifier and membership
        let mut sum_ins = FpVar::<Fr>::zero();
        for (i, expected_nullifier) in nullifiers.iter().enumerate() {
            let input: Option<&InputWitness> = witness.map(|w| &w.inputs[i]);

            let amount = FpVar::<Fr>::new_witness(cs.clone(), || input.map(|x| amount_to_field(x.amount)).ok_or_else(missing))?;
            let private_key = FpVar::<Fr>::new_witness(cs.clone(), || input.map(|x| x.private_key).ok_or_else(missing))?;
            let blinding = FpVar::<Fr>::new_witness(cs.clone(), || input.map(|x| x.blinding).ok_or_else(missing))?;
            let path_index = FpVar::<Fr>::new_witness(cs.clone(), || input.map(|x| Fr::from(x.path_index)).ok_or_else(missing))?;
            let path_elements = (0..self.levels)
                .map(|level| FpVar::<Fr>::new_witness(cs.clone(), || input.map(|x| x.path_elements[level]).ok_or_else(missing)))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            enforce_bit_length(&amount, AMOUNT_BITS)?;
            let path_bits = enforce_bit_length(&path_index, self.levels)?;

            let public_key = poseidon.hash1(&private_key)?;
            let commitment = poseidon.hash3(&amount, &public_key, &blinding)?;
            let signature = poseidon.hash3(&private_key, &commitment, &path_index)?;
            let nullifier = poseidon.hash3(&commitment, &path_index, &signature)?;
            nullifier.enforce_equal(expected_nullifier)?;

            // Membership is only enforced for notes that carry value
            let computed_root = merkle_root(&poseidon, &commitment, &path_bits, &path_elements)?;
            ((&root - &computed_root) * &amount).enforce_equal(&FpVar::zero())?;

            sum_ins += &amount;
        }

        // Outputs: well-formed commitments
        let mut sum_outs = FpVar::<Fr>::zero();
        for (i, expected_commitment) in commitments.iter().enumerate() {
            let output: Option<&OutputWitness> = witness.map(|w| &w.outputs[i]);

            let amount = FpVar::<Fr>::new_witness(cs.clone(), || output.map(|x| amount_to_field(x.amount)).ok_or_else(missing))?;
            let public_key = FpVar::<Fr>::new_witness(cs.clone(), || output.map(|x| x.public_key).ok_or_else(missing))?;
            let blinding = FpVar::<Fr>::new_witness(cs.clone(), || output.map(|x| x.blinding).ok_or_else(missing))?;

            enforce_bit_length(&amount, AMOUNT_BITS)?;
            poseidon.hash3(&amount, &public_key, &blinding)?.enforce_equal(expected_commitment)?;

            sum_outs += &amount;
        }

        // No note may be spent twice within one transaction
        for i in 0..nullifiers.len() {
            for j in (i + 1)..nullifiers.len() {
                nullifiers[i].enforce_not_equal(&nullifiers[j])?;
            }
        }

        // sum(in) + externalAmount - fee == sum(out)
        (sum_ins + &ext_amount - &fee).enforce_equal(&sum_outs)?;

        // Tie the destination hashes into the constraint system
        let _recipient_square = &recipient_hash * &recipient_hash;
        let _relayer_square = &relayer_hash * &relayer_hash;

        Ok(())
    }
}
