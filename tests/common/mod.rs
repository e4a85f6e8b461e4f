// Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use ark_bn254::Fr;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use shielded_pool::client::{prepare_transaction, PreparedTransaction, TransactionRequest};
use shielded_pool::zkp::circuits::TransactionCircuit;
use shielded_pool::zkp::{ProofSystem, PublicInputs, TransactionProof, TransactionWitness, ZKPError};
use shielded_pool::*;

pub const TEST_LEVELS: usize = 5;

/// Groth16 keys for both circuits at the test height, generated once per test binary
pub fn groth16() -> Arc<Groth16ProofSystem> {
    static KEYS: OnceLock<Arc<Groth16ProofSystem>> = OnceLock::new();
    KEYS.get_or_init(|| {
        let (keys, _) = TrustedSetup::generate(TEST_LEVELS, &Arity::all(), &mut rand::thread_rng())
            .expect("trusted setup");
        Arc::new(Groth16ProofSystem::new(keys))
    })
    .clone()
}

/// Proof system that checks the witness against the real circuit constraints
/// and "proves" by committing to the public inputs. Sound only for tests.
pub struct ConstraintCheckingProver {
    levels: usize,
}

impl ConstraintCheckingProver {
    pub fn new(levels: usize) -> Self {
        Self { levels }
    }

    fn transcript(public: &PublicInputs) -> Vec<u8> {
        let mut data = Vec::new();
        for element in public.to_field_elements() {
            data.extend_from_slice(&field_to_bytes(&element));
        }
        hash_data(&data).as_bytes().to_vec()
    }
}

impl ProofSystem for ConstraintCheckingProver {
    fn levels(&self) -> usize {
        self.levels
    }

    fn prove(&self, witness: &TransactionWitness, public: &PublicInputs) -> zkp::Result<TransactionProof> {
        let circuit = TransactionCircuit::new(self.levels, witness.clone(), public.clone())?;
        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit
            .generate_constraints(cs.clone())
            .map_err(|e| ZKPError::ProofGenerationFailed(e.to_string()))?;
        if !cs
            .is_satisfied()
            .map_err(|e| ZKPError::ProofGenerationFailed(e.to_string()))?
        {
            return Err(ZKPError::ProofGenerationFailed("unsatisfied constraints".to_string()));
        }
        Ok(TransactionProof(Self::transcript(public)))
    }

    fn verify(&self, proof: &TransactionProof, public: &PublicInputs) -> zkp::Result<bool> {
        Ok(public.arity().is_some() && proof.0 == Self::transcript(public))
    }
}

pub fn test_config(levels: usize, root_history_size: usize) -> PoolConfig {
    PoolConfig {
        min_withdrawal: 1,
        max_deposit: 1_000,
        tree_height: levels,
        root_history_size,
        ..PoolConfig::default()
    }
}

/// In-memory pool with funds for the relay to bridge in
pub struct Fixture {
    pub pool: ShieldedPool,
    pub prover: Arc<dyn ProofSystem>,
}

impl Fixture {
    pub fn new(config: PoolConfig, prover: Arc<dyn ProofSystem>) -> Self {
        let mut custodian = InMemoryCustodian::new();
        custodian.mint(&config.bridge.relay, 1_000_000);
        let pool = ShieldedPool::new(config, prover.clone(), custodian).expect("pool");
        Self { pool, prover }
    }

    /// Fast fixture backed by the constraint-checking prover
    pub fn checked(levels: usize, root_history_size: usize) -> Self {
        Self::new(
            test_config(levels, root_history_size),
            Arc::new(ConstraintCheckingProver::new(levels)),
        )
    }

    pub fn relay(&self) -> Address {
        self.pool.config().bridge.relay
    }

    pub fn asset(&self) -> Address {
        self.pool.config().bridge.asset
    }

    pub fn escrow(&self) -> Address {
        self.pool.config().bridge.escrow
    }

    pub fn balance(&self, account: &Address) -> Amount {
        self.pool.custodian().balance_of(account)
    }

    pub fn prepare(&self, request: TransactionRequest) -> PreparedTransaction {
        prepare_transaction(self.pool.tree(), self.prover.as_ref(), request).expect("prepare transaction")
    }

    /// Relay moves `amount` into the pool account
    pub fn fund_pool(&mut self, amount: Amount) {
        let relay = self.relay();
        let pool_account = *self.pool.pool_account();
        self.pool
            .custodian_mut()
            .transfer(&relay, &pool_account, amount)
            .expect("relay funds");
    }

    /// Inbound bridge call as made by `caller`
    pub fn deliver(&mut self, caller: Address, asset: Address, amount: Amount, payload: &[u8]) -> Result<AppliedTransaction> {
        self.pool.on_external_deposit(&caller, &asset, amount, payload)
    }

    /// Inbound bridge call from the configured relay
    pub fn bridge_in(&mut self, amount: Amount, payload: &[u8]) -> Result<AppliedTransaction> {
        let (relay, asset) = (self.relay(), self.asset());
        self.deliver(relay, asset, amount, payload)
    }

    /// Bridge in a deposit of `note` and return it placed at its leaf
    pub fn deposit(&mut self, note: Note) -> Note {
        let amount = note.amount;
        let prepared = self.prepare(TransactionRequest::new().output(note));
        self.fund_pool(amount);
        let applied = self
            .bridge_in(amount, &prepared.bridge_payload().unwrap())
            .expect("deposit applied");
        prepared.placed_outputs(applied.first_index)[0].clone()
    }
}
