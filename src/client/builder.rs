// Build proof-carrying transactions from notes and a tree snapshot
use ark_bn254::Fr;
use ark_ff::Zero;
use tracing::debug;

use super::{ClientError, Result};
use crate::bridge::encode_bridge_payload;
use crate::crypto::Keypair;
use crate::pool::{ExtData, InputNullifiers, MerkleTree, Transaction};
use crate::primitives::{Address, Amount, ExtAmount, LeafIndex, Note};
use crate::zkp::{build_public_inputs, Arity, InputWitness, OutputWitness, ProofSystem, TransactionProof, TransactionWitness};

pub const MAX_INPUTS: usize = 16;
pub const MAX_OUTPUTS: usize = Arity::OUTPUTS;

/// A note to spend together with the key that owns it
#[derive(Debug, Clone)]
pub struct SpendInput {
    pub note: Note,
    pub keypair: Keypair,
}

/// What the user wants to happen. The external amount is derived, never given.
#[derive(Debug, Clone, Default)]
pub struct TransactionRequest {
    pub inputs: Vec<SpendInput>,
    pub outputs: Vec<Note>,
    pub recipient: Address,
    pub relayer: Address,
    pub fee: Amount,
    pub is_l1_withdrawal: bool,
    pub l1_fee: Amount,
}

impl TransactionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spend(mut self, note: Note, keypair: &Keypair) -> Self {
        self.inputs.push(SpendInput {
            note,
            keypair: keypair.clone(),
        });
        self
    }

    pub fn output(mut self, note: Note) -> Self {
        self.outputs.push(note);
        self
    }

    pub fn recipient(mut self, recipient: Address) -> Self {
        self.recipient = recipient;
        self
    }

    pub fn relayer(mut self, relayer: Address, fee: Amount) -> Self {
        self.relayer = relayer;
        self.fee = fee;
        self
    }

    /// Release the withdrawn funds on the remote domain
    pub fn l1_withdrawal(mut self, l1_fee: Amount) -> Self {
        self.is_l1_withdrawal = true;
        self.l1_fee = l1_fee;
        self
    }
}

/// A proven transaction plus the output notes it creates
#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    pub transaction: Transaction,
    /// Output notes in commitment order, including padding
    pub outputs: [Note; 2],
}

impl PreparedTransaction {
    /// Output notes placed at their tree positions, given the first index the pool reported
    pub fn placed_outputs(&self, first_index: LeafIndex) -> [Note; 2] {
        let [first, second] = self.outputs.clone();
        [first.at_index(first_index), second.at_index(first_index + 1)]
    }

    /// Payload for an inbound bridged deposit
    pub fn bridge_payload(&self) -> Result<Vec<u8>> {
        Ok(encode_bridge_payload(&self.transaction)?)
    }
}

/// `fee + sum(outputs) - sum(inputs)`: positive deposits, negative withdraws
pub fn external_amount(inputs: &[SpendInput], outputs: &[Note], fee: Amount) -> Result<ExtAmount> {
    let sum_in = signed_sum(inputs.iter().map(|input| input.note.amount))?;
    let sum_out = signed_sum(outputs.iter().map(|note| note.amount))?;
    let fee = ExtAmount::try_from(fee).map_err(|_| amount_overflow())?;

    fee.checked_add(sum_out)
        .and_then(|total| total.checked_sub(sum_in))
        .ok_or_else(amount_overflow)
}

fn signed_sum(amounts: impl Iterator<Item = Amount>) -> Result<ExtAmount> {
    let mut total: ExtAmount = 0;
    for amount in amounts {
        let amount = ExtAmount::try_from(amount).map_err(|_| amount_overflow())?;
        total = total.checked_add(amount).ok_or_else(amount_overflow)?;
    }
    Ok(total)
}

fn amount_overflow() -> ClientError {
    ClientError::UnbalancedAmounts("amount overflow".to_string())
}

/// Assemble, pad and prove a transaction against `tree`
pub fn prepare_transaction(
    tree: &MerkleTree,
    prover: &dyn ProofSystem,
    request: TransactionRequest,
) -> Result<PreparedTransaction> {
    if request.inputs.len() > MAX_INPUTS {
        return Err(ClientError::TooManyInputs(request.inputs.len()));
    }
    if request.outputs.len() > MAX_OUTPUTS {
        return Err(ClientError::TooManyOutputs(request.outputs.len()));
    }
    let arity = Arity::for_inputs(request.inputs.len()).ok_or(ClientError::TooManyInputs(request.inputs.len()))?;
    let ext_amount = external_amount(&request.inputs, &request.outputs, request.fee)?;

    let mut inputs = request.inputs;
    while inputs.len() < arity.inputs() {
        let keypair = Keypair::generate();
        inputs.push(SpendInput {
            note: Note::dummy(keypair.public_key()),
            keypair,
        });
    }

    let mut outputs = request.outputs;
    while outputs.len() < arity.outputs() {
        outputs.push(Note::dummy(Keypair::generate().public_key()));
    }

    let mut input_witnesses = Vec::with_capacity(inputs.len());
    let mut nullifiers = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let commitment = input.note.commitment();
        if input.note.public_key != input.keypair.public_key() {
            return Err(ClientError::Ownership(commitment));
        }

        // Zero-amount inputs are exempt from membership, so they need no real path
        let (index, path_elements) = if input.note.is_dummy() {
            (input.note.index.unwrap_or(0), vec![Fr::zero(); tree.levels()])
        } else {
            let index = tree
                .index_of(&commitment)
                .ok_or(ClientError::UnknownCommitment(commitment))?;
            let path = tree.path(index).ok_or(ClientError::UnknownCommitment(commitment))?;
            (index, path)
        };

        nullifiers.push(input.keypair.derive_nullifier(&input.note, index)?);
        input_witnesses.push(InputWitness {
            amount: input.note.amount,
            private_key: input.keypair.private_key(),
            blinding: input.note.blinding,
            path_index: index,
            path_elements,
        });
    }

    let witness = TransactionWitness {
        inputs: input_witnesses,
        outputs: outputs
            .iter()
            .map(|note| OutputWitness {
                amount: note.amount,
                public_key: note.public_key,
                blinding: note.blinding,
            })
            .collect(),
    };

    let input_nullifiers = InputNullifiers::from_vec(nullifiers)
        .ok_or_else(|| ClientError::UnbalancedAmounts(format!("no circuit for {} inputs", inputs.len())))?;
    let output_notes: [Note; 2] = outputs
        .try_into()
        .map_err(|_| ClientError::TooManyOutputs(MAX_OUTPUTS + 1))?;

    let mut transaction = Transaction {
        proof: TransactionProof::default(),
        root: tree.root(),
        input_nullifiers,
        output_commitments: [output_notes[0].commitment(), output_notes[1].commitment()],
        ext_data: ExtData {
            recipient: request.recipient,
            ext_amount,
            relayer: request.relayer,
            fee: request.fee,
            is_l1_withdrawal: request.is_l1_withdrawal,
            l1_fee: request.l1_fee,
        },
    };

    let public = build_public_inputs(&transaction);
    transaction.proof = prover.prove(&witness, &public)?;
    debug!(
        "Prepared {} transaction against root {} with external amount {}",
        arity, transaction.root, ext_amount
    );

    Ok(PreparedTransaction {
        transaction,
        outputs: output_notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_amount_sign() {
        let owner = Keypair::generate();
        let spend = |amount| SpendInput {
            note: Note::new(amount, owner.public_key()),
            keypair: owner.clone(),
        };
        let out = |amount| Note::new(amount, owner.public_key());

        // Deposit: nothing in, 100 out
        assert_eq!(external_amount(&[], &[out(100)], 0).unwrap(), 100);
        // Withdrawal of 80 with 20 change
        assert_eq!(external_amount(&[spend(100)], &[out(20)], 0).unwrap(), -80);
        // Internal transfer paying a relayer fee from the pool
        assert_eq!(external_amount(&[spend(70)], &[out(65)], 5).unwrap(), 0);
        assert!(external_amount(&[spend(Amount::MAX)], &[], 0).is_err());
    }

    #[test]
    fn test_external_amount_sums_many_inputs() {
        let owner = Keypair::generate();
        let inputs: Vec<SpendInput> = (1..=16)
            .map(|amount| SpendInput {
                note: Note::new(amount, owner.public_key()),
                keypair: owner.clone(),
            })
            .collect();
        // 1 + 2 + ... + 16 = 136
        let outputs = [Note::new(100, owner.public_key()), Note::new(30, owner.public_key())];
        assert_eq!(external_amount(&inputs, &outputs, 1).unwrap(), -5);

        let huge = ExtAmount::MAX as Amount;
        assert!(external_amount(&[], &[Note::new(huge, owner.public_key()), Note::new(1, owner.public_key())], 0).is_err());
    }

    #[test]
    fn test_builder_collects_fields() {
        let owner = Keypair::generate();
        let request = TransactionRequest::new()
            .spend(Note::new(5, owner.public_key()), &owner)
            .output(Note::new(1, owner.public_key()))
            .recipient(Address::from_label("r"))
            .relayer(Address::from_label("relayer"), 2)
            .l1_withdrawal(1);
        assert_eq!(request.inputs.len(), 1);
        assert_eq!(request.fee, 2);
        assert!(request.is_l1_withdrawal);
        assert_eq!(request.l1_fee, 1);
    }
}
