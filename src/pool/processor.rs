// Transaction processor: the single writer of the accumulator and nullifier set
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::config::PoolConfig;
use super::custodian::{AssetCustodian, InMemoryCustodian, Transfer};
use super::merkle_tree::{MerkleTree, TreeCheckpoint};
use super::nullifier_set::NullifierSet;
use super::transaction::Transaction;
use crate::bridge::{BridgeAdapter, UnwrapInstruction};
use crate::primitives::{
    Address, Amount, AmountBoundViolation, Commitment, Hash256, LeafIndex, MerkleRoot, Nullifier, PoolError, Result,
};
use crate::zkp::ProofSystem;

/// Where a transaction entered the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Submitted directly by a user or relayer
    Direct,
    /// Delivered by the bridge relay together with `received` custodial funds
    Bridge { received: Amount },
}

/// Outcome of a proof check performed before the pool was locked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofVerdict {
    Unchecked,
    Checked(bool),
}

/// Observable effects of an applied transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolEvent {
    NewCommitment { commitment: Commitment, index: LeafIndex },
    NewNullifier { nullifier: Nullifier },
}

/// Log record of one successful application, in global order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTransaction {
    pub sequence: u64,
    pub id: Hash256,
    pub transaction: Transaction,
    /// Accumulator root right after this transaction
    pub root: MerkleRoot,
    pub first_index: LeafIndex,
    pub events: Vec<PoolEvent>,
    pub unwrap: Option<UnwrapInstruction>,
    pub applied_at: i64,
}

/// A validated transaction whose leaves are inserted but not yet settled
pub(crate) struct StagedTransaction {
    checkpoint: TreeCheckpoint,
    payouts: Vec<Transfer>,
    /// Custodial funds delivered with it by the bridge
    received: Amount,
    /// Deposit the pool takes into its shielded balance
    absorbed: Amount,
    record: AppliedTransaction,
}

impl StagedTransaction {
    pub(crate) fn record(&self) -> &AppliedTransaction {
        &self.record
    }
}

/// Accumulator and nullifier set, reconstructible from the applied log
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub tree: MerkleTree,
    pub nullifiers: NullifierSet,
    /// Number of applied transactions
    pub sequence: u64,
}

impl LedgerState {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            tree: MerkleTree::with_history(config.tree_height, config.root_history_size),
            nullifiers: NullifierSet::new(),
            sequence: 0,
        }
    }

    /// Rebuild state from an ordered log of applied transactions
    pub fn replay<'a>(config: &PoolConfig, records: impl IntoIterator<Item = &'a AppliedTransaction>) -> Result<Self> {
        let mut state = Self::new(config);
        for record in records {
            state.apply_record(record)?;
        }
        Ok(state)
    }

    /// Re-apply one log record; the resulting root must match the recorded one
    pub fn apply_record(&mut self, record: &AppliedTransaction) -> Result<()> {
        if record.sequence != self.sequence {
            return Err(PoolError::Storage(format!(
                "log gap: expected sequence {}, found {}",
                self.sequence, record.sequence
            )));
        }

        let first_index = self.tree.insert_batch(&record.transaction.output_commitments)?;
        self.nullifiers.insert_all(record.transaction.input_nullifiers.as_slice());
        self.sequence += 1;

        if first_index != record.first_index || self.tree.root() != record.root {
            return Err(PoolError::Storage(format!(
                "replay diverged at sequence {}: root {} != recorded {}",
                record.sequence,
                self.tree.root(),
                record.root
            )));
        }
        Ok(())
    }
}

/// Shielded pool state machine.
///
/// Every transaction goes through `stage` (validation plus a revertible leaf
/// insertion) and then `commit` or `abort`. Callers needing concurrency wrap the pool in a
/// [`PoolHandle`](super::PoolHandle).
pub struct ShieldedPool<C: AssetCustodian = InMemoryCustodian> {
    config: PoolConfig,
    state: LedgerState,
    custodian: C,
    verifier: Arc<dyn ProofSystem>,
    bridge: BridgeAdapter,
    /// Pool account balance backed by applied transactions; anything above it
    /// is in flight from the bridge
    last_balance: Amount,
}

impl<C: AssetCustodian> ShieldedPool<C> {
    pub fn new(config: PoolConfig, verifier: Arc<dyn ProofSystem>, custodian: C) -> Result<Self> {
        let state = LedgerState::new(&config);
        Self::from_state(config, verifier, custodian, state)
    }

    /// Resume from replayed state
    pub fn from_state(config: PoolConfig, verifier: Arc<dyn ProofSystem>, custodian: C, state: LedgerState) -> Result<Self> {
        config.validate()?;
        if verifier.levels() != config.tree_height {
            return Err(PoolError::Config(format!(
                "proof system built for height {}, pool configured for {}",
                verifier.levels(),
                config.tree_height
            )));
        }

        let last_balance = custodian.balance_of(&config.pool_account);
        let bridge = BridgeAdapter::new(config.bridge.clone());
        info!(
            "🏦 Shielded pool ready: height {}, {} leaves, root {}",
            config.tree_height,
            state.tree.len(),
            state.tree.root()
        );

        Ok(Self {
            config,
            state,
            custodian,
            verifier,
            bridge,
            last_balance,
        })
    }

    /// Entry point for user transactions (withdrawals and shielded transfers)
    pub fn transact(&mut self, tx: Transaction) -> Result<AppliedTransaction> {
        self.process(tx, Origin::Direct, ProofVerdict::Unchecked)
    }

    fn process(&mut self, tx: Transaction, origin: Origin, verdict: ProofVerdict) -> Result<AppliedTransaction> {
        let staged = self.stage(tx, origin, verdict)?;
        self.commit(staged)
    }

    /// Validate `tx`, insert its leaves and build its log record. Nothing
    /// observable changes until the result is committed or aborted.
    pub(crate) fn stage(&mut self, tx: Transaction, origin: Origin, verdict: ProofVerdict) -> Result<StagedTransaction> {
        let id = tx.id();
        debug!("📥 Received transaction {} ({}, ext {})", id, tx.arity(), tx.ext_data.ext_amount);

        if let Err(e) = self.validate(&tx, origin, verdict) {
            warn!("❌ Rejected transaction {}: {} ({})", id, e, e.reason());
            return Err(e);
        }

        let checkpoint = self.state.tree.checkpoint();
        let first_index = self.state.tree.insert_batch(&tx.output_commitments)?;

        let payouts = self.payouts(&tx);
        if let Err(e) = self.custodian.can_transfer_all(&self.config.pool_account, &payouts) {
            self.state.tree.rollback(checkpoint);
            warn!("❌ Settlement of transaction {} would fail, state rolled back: {}", id, e);
            return Err(e);
        }

        let unwrap = if tx.is_withdrawal() && tx.ext_data.is_l1_withdrawal {
            Some(self.bridge.unwrap_instruction(&tx))
        } else {
            None
        };

        let mut events: Vec<PoolEvent> = tx
            .output_commitments
            .iter()
            .enumerate()
            .map(|(offset, commitment)| PoolEvent::NewCommitment {
                commitment: *commitment,
                index: first_index + offset as LeafIndex,
            })
            .collect();
        events.extend(
            tx.input_nullifiers
                .as_slice()
                .iter()
                .map(|nullifier| PoolEvent::NewNullifier { nullifier: *nullifier }),
        );

        let received = match origin {
            Origin::Bridge { received } => received,
            Origin::Direct => 0,
        };
        let absorbed = if tx.is_deposit() {
            tx.ext_data.ext_amount.unsigned_abs()
        } else {
            0
        };

        Ok(StagedTransaction {
            checkpoint,
            payouts,
            received,
            absorbed,
            record: AppliedTransaction {
                sequence: self.state.sequence,
                id,
                root: self.state.tree.root(),
                first_index,
                events,
                unwrap,
                applied_at: chrono::Utc::now().timestamp(),
                transaction: tx,
            },
        })
    }

    /// Settle a staged transaction: pay out, spend its nullifiers, queue its
    /// unwrap and advance the sequence. Funds that came with a bridged
    /// transaction are rescued if settlement fails.
    pub(crate) fn commit(&mut self, staged: StagedTransaction) -> Result<AppliedTransaction> {
        let StagedTransaction {
            checkpoint,
            payouts,
            received,
            absorbed,
            record,
        } = staged;

        if let Err(e) = self.custodian.transfer_all(&self.config.pool_account, &payouts) {
            self.state.tree.rollback(checkpoint);
            warn!("❌ Settlement of transaction {} failed, state rolled back: {}", record.id, e);
            if received > 0 {
                if let Err(rescue_error) = self.rescue(received) {
                    error!("Rescue of {} after failed settlement failed: {}", received, rescue_error);
                }
            }
            return Err(e);
        }

        // Nothing below can fail
        self.state.nullifiers.insert_all(record.transaction.input_nullifiers.as_slice());
        if let Some(instruction) = &record.unwrap {
            self.bridge.queue_unwrap(instruction.clone());
        }
        self.state.sequence += 1;

        let paid: Amount = payouts.iter().map(|transfer| transfer.amount).sum();
        self.last_balance = self.last_balance.saturating_add(absorbed).saturating_sub(paid);

        info!(
            "✅ Applied transaction {} (seq {}): leaves {}..{}, root {}",
            record.id,
            record.sequence,
            record.first_index,
            record.first_index + record.transaction.output_commitments.len() as LeafIndex,
            record.root
        );
        Ok(record)
    }

    /// Drop a staged transaction, leaving state as it was before staging
    pub(crate) fn abort(&mut self, staged: StagedTransaction) {
        warn!("↩️ Transaction {} aborted before settlement", staged.record.id);
        self.state.tree.rollback(staged.checkpoint);
    }

    /// Every check, in order, without touching state
    fn validate(&self, tx: &Transaction, origin: Origin, verdict: ProofVerdict) -> Result<()> {
        if !self.state.tree.is_known_root(&tx.root) {
            return Err(PoolError::StaleRoot(tx.root));
        }

        if let Some(nullifier) = self.state.nullifiers.first_conflict(tx.input_nullifiers.as_slice()) {
            return Err(PoolError::DoubleSpend(*nullifier));
        }

        if self.config.reject_duplicate_commitments {
            let [first, second] = &tx.output_commitments;
            if first == second {
                return Err(PoolError::DuplicateCommitment(*second));
            }
            if let Some(existing) = tx.output_commitments.iter().find(|c| self.state.tree.contains(c)) {
                return Err(PoolError::DuplicateCommitment(*existing));
            }
        }

        let ext_amount = tx.ext_data.ext_amount;
        if ext_amount > 0 && ext_amount.unsigned_abs() > self.config.max_deposit {
            return Err(PoolError::AmountBound {
                ext_amount,
                violation: AmountBoundViolation::DepositAboveMaximum {
                    maximum: self.config.max_deposit,
                },
            });
        }
        if ext_amount < 0 && ext_amount.unsigned_abs() < self.config.min_withdrawal {
            return Err(PoolError::AmountBound {
                ext_amount,
                violation: AmountBoundViolation::WithdrawalBelowMinimum {
                    minimum: self.config.min_withdrawal,
                },
            });
        }

        if tx.is_withdrawal() && tx.ext_data.recipient.is_zero() {
            return Err(PoolError::MissingRecipient);
        }

        if tx.is_deposit() {
            let expected = ext_amount.unsigned_abs();
            let received = match origin {
                Origin::Bridge { received } => received,
                Origin::Direct => 0,
            };
            if origin == Origin::Direct || received != expected {
                return Err(PoolError::UnsettledDeposit { expected, received });
            }
        }

        let required = tx.withdrawal_amount().saturating_add(tx.ext_data.fee);
        let available = self.pool_balance();
        if required > available {
            return Err(PoolError::InsufficientPoolBalance { required, available });
        }

        let valid = match verdict {
            ProofVerdict::Checked(valid) => valid,
            ProofVerdict::Unchecked => self.verifier.verify(&tx.proof, &tx.public_inputs())?,
        };
        if !valid {
            return Err(PoolError::InvalidProof);
        }

        if self.state.tree.remaining() < tx.output_commitments.len() as u64 {
            return Err(PoolError::CapacityExceeded {
                capacity: self.state.tree.capacity(),
            });
        }

        Ok(())
    }

    /// Payout legs for a validated transaction
    fn payouts(&self, tx: &Transaction) -> Vec<Transfer> {
        let mut transfers = Vec::with_capacity(2);
        let withdrawal = tx.withdrawal_amount();
        if withdrawal > 0 {
            let to = if tx.ext_data.is_l1_withdrawal {
                self.config.bridge.escrow
            } else {
                tx.ext_data.recipient
            };
            transfers.push(Transfer { to, amount: withdrawal });
        }
        if tx.ext_data.fee > 0 {
            transfers.push(Transfer {
                to: tx.ext_data.relayer,
                amount: tx.ext_data.fee,
            });
        }
        transfers
    }

    /// Funds in the pool account that no applied transaction accounts for
    pub(crate) fn unabsorbed_balance(&self) -> Amount {
        self.pool_balance().saturating_sub(self.last_balance)
    }

    /// Send funds that arrived with a rejected deposit to the rescue account
    pub(crate) fn rescue(&mut self, amount: Amount) -> Result<()> {
        let rescue = self.config.bridge.rescue;
        self.custodian.transfer(&self.config.pool_account, &rescue, amount)?;
        warn!("🛟 Rescued {} of a rejected bridged deposit to {}", amount, rescue);
        Ok(())
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn tree(&self) -> &MerkleTree {
        &self.state.tree
    }

    pub fn root(&self) -> MerkleRoot {
        self.state.tree.root()
    }

    pub fn is_spent(&self, nullifier: &Nullifier) -> bool {
        self.state.nullifiers.is_spent(nullifier)
    }

    pub fn sequence(&self) -> u64 {
        self.state.sequence
    }

    pub fn pool_account(&self) -> &Address {
        &self.config.pool_account
    }

    pub fn pool_balance(&self) -> Amount {
        self.custodian.balance_of(&self.config.pool_account)
    }

    pub fn custodian(&self) -> &C {
        &self.custodian
    }

    /// Direct ledger access, standing in for transfers made outside the pool
    pub fn custodian_mut(&mut self) -> &mut C {
        &mut self.custodian
    }

    pub fn verifier(&self) -> Arc<dyn ProofSystem> {
        self.verifier.clone()
    }

    pub fn bridge(&self) -> &BridgeAdapter {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut BridgeAdapter {
        &mut self.bridge
    }
}
