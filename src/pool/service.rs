// Async single-writer handle around the pool
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error};

use super::custodian::{AssetCustodian, InMemoryCustodian};
use super::merkle_tree::MerkleTree;
use super::processor::{AppliedTransaction, Origin, ProofVerdict, ShieldedPool, StagedTransaction};
use super::transaction::Transaction;
use crate::bridge::{decode_bridge_payload, SignedUnwrap};
use crate::primitives::{Address, Amount, MerkleRoot, PoolError, Result};
use crate::storage::PoolStore;
use crate::zkp::ProofSystem;

/// Clonable handle serializing every state transition through one lock.
///
/// Proofs are verified on the blocking pool before the lock is taken; the
/// verdict travels with the transaction into the serial stage-log-commit step.
pub struct PoolHandle<C: AssetCustodian + 'static = InMemoryCustodian> {
    pool: Arc<Mutex<ShieldedPool<C>>>,
    verifier: Arc<dyn ProofSystem>,
    store: Option<Arc<dyn PoolStore>>,
}

impl<C: AssetCustodian + 'static> Clone for PoolHandle<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            verifier: self.verifier.clone(),
            store: self.store.clone(),
        }
    }
}

impl<C: AssetCustodian + 'static> PoolHandle<C> {
    pub fn new(pool: ShieldedPool<C>) -> Self {
        let verifier = pool.verifier();
        Self {
            pool: Arc::new(Mutex::new(pool)),
            verifier,
            store: None,
        }
    }

    /// Append every applied transaction to `store`
    pub fn with_store(mut self, store: Arc<dyn PoolStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn transact(&self, tx: Transaction) -> Result<AppliedTransaction> {
        let verdict = self.pre_verify(&tx).await;
        let mut pool = self.pool.lock().await;
        let staged = pool.stage(tx, Origin::Direct, verdict)?;
        self.settle(&mut pool, staged).await
    }

    pub async fn on_external_deposit(
        &self,
        caller: Address,
        asset: Address,
        amount: Amount,
        payload: Vec<u8>,
    ) -> Result<AppliedTransaction> {
        // Undecodable payloads are rejected under the lock, where funds can be rescued
        let verdict = match decode_bridge_payload(&payload) {
            Ok(tx) => self.pre_verify(&tx).await,
            Err(_) => ProofVerdict::Unchecked,
        };
        let mut pool = self.pool.lock().await;
        let staged = pool.stage_external_deposit(&caller, &asset, amount, &payload, verdict)?;
        self.settle(&mut pool, staged).await
    }

    /// Verify off the serial path. Verifier failures leave the check to the
    /// processor so they surface in validation order.
    async fn pre_verify(&self, tx: &Transaction) -> ProofVerdict {
        let verifier = self.verifier.clone();
        let proof = tx.proof.clone();
        let public = tx.public_inputs();

        match tokio::task::spawn_blocking(move || verifier.verify(&proof, &public)).await {
            Ok(Ok(valid)) => ProofVerdict::Checked(valid),
            Ok(Err(e)) => {
                debug!("Pre-verification failed, deferring to processor: {}", e);
                ProofVerdict::Unchecked
            }
            Err(e) => {
                debug!("Pre-verification task failed: {}", e);
                ProofVerdict::Unchecked
            }
        }
    }

    /// Log the staged record, then commit it. A transaction that cannot be
    /// logged is aborted and leaves no trace in the pool. Bridged funds of an
    /// aborted deposit stay unabsorbed for the relay to retry.
    async fn settle(&self, pool: &mut ShieldedPool<C>, staged: StagedTransaction) -> Result<AppliedTransaction> {
        let Some(store) = &self.store else {
            return pool.commit(staged);
        };

        let (id, sequence) = (staged.record().id, staged.record().sequence);
        if let Err(e) = store.append(staged.record()).await {
            error!("Transaction {} could not be logged, aborting: {}", id, e);
            pool.abort(staged);
            return Err(PoolError::Storage(format!("transaction {} not applied: {}", id, e)));
        }

        match pool.commit(staged) {
            Ok(applied) => Ok(applied),
            Err(e) => {
                if let Err(undo) = store.truncate(sequence).await {
                    error!("Log holds unsettled transaction {} at sequence {}: {}", id, sequence, undo);
                    return Err(PoolError::Storage(format!(
                        "transaction {} failed ({}) but stays logged: {}",
                        id, e, undo
                    )));
                }
                Err(e)
            }
        }
    }

    /// Copy of the accumulator for building proofs
    pub async fn snapshot(&self) -> MerkleTree {
        self.pool.lock().await.tree().clone()
    }

    pub async fn root(&self) -> MerkleRoot {
        self.pool.lock().await.root()
    }

    pub async fn pool_balance(&self) -> Amount {
        self.pool.lock().await.pool_balance()
    }

    pub async fn drain_outbox(&self) -> Vec<SignedUnwrap> {
        self.pool.lock().await.bridge_mut().drain_outbox()
    }

    /// Run `f` with exclusive access to the pool
    pub async fn with_pool<R>(&self, f: impl FnOnce(&mut ShieldedPool<C>) -> R) -> R {
        let mut pool = self.pool.lock().await;
        f(&mut pool)
    }
}
