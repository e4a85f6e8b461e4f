// Bridge adapter: the only origin of deposit-shaped transactions, and the
// emitter of outbound unwrap instructions for remote-domain withdrawals
use std::collections::VecDeque;

use ed25519_dalek::{SigningKey, VerifyingKey};
use tracing::{error, info, warn};

use super::messages::{decode_bridge_payload, SignedUnwrap, UnwrapInstruction};
use crate::pool::processor::StagedTransaction;
use crate::pool::{AppliedTransaction, AssetCustodian, BridgeConfig, Origin, ProofVerdict, ShieldedPool, Transaction};
use crate::primitives::{Address, Amount, PoolError, Result};

pub struct BridgeAdapter {
    config: BridgeConfig,
    signing_key: Option<SigningKey>,
    outbox: VecDeque<SignedUnwrap>,
}

impl BridgeAdapter {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            signing_key: None,
            outbox: VecDeque::new(),
        }
    }

    /// Sign outbound instructions with `signing_key` from now on
    pub fn set_signing_key(&mut self, signing_key: SigningKey) {
        self.signing_key = Some(signing_key);
    }

    pub fn verifying_key(&self) -> Option<VerifyingKey> {
        self.signing_key.as_ref().map(SigningKey::verifying_key)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Only the configured relay may deliver the configured asset
    pub fn authorize(&self, caller: &Address, asset: &Address) -> Result<()> {
        if *caller != self.config.relay {
            return Err(PoolError::UnauthorizedRelay(*caller));
        }
        if *asset != self.config.asset {
            return Err(PoolError::UnsupportedAsset(*asset));
        }
        Ok(())
    }

    /// Instruction releasing the withdrawal of `tx` on the remote domain
    pub fn unwrap_instruction(&self, tx: &Transaction) -> UnwrapInstruction {
        UnwrapInstruction {
            id: tx.id(),
            recipient: tx.ext_data.recipient,
            amount: tx.withdrawal_amount(),
            l1_fee: tx.ext_data.l1_fee,
            unwrapper: self.config.unwrapper,
        }
    }

    /// Sign and queue the instruction of an applied remote-domain withdrawal.
    /// The pool calls this once per application; the nullifier set keeps a
    /// transaction from applying twice.
    pub fn queue_unwrap(&mut self, instruction: UnwrapInstruction) {
        let (id, amount, recipient) = (instruction.id, instruction.amount, instruction.recipient);
        let message = match &self.signing_key {
            Some(key) => match instruction.clone().sign(key) {
                Ok(signed) => signed,
                Err(e) => {
                    error!("Failed to sign unwrap {}: {}", id, e);
                    SignedUnwrap::unsigned(instruction)
                }
            },
            None => SignedUnwrap::unsigned(instruction),
        };
        self.outbox.push_back(message);
        info!("🌉 Queued unwrap {} of {} to {} on the remote domain", id, amount, recipient);
    }

    /// Hand every queued message to the relay
    pub fn drain_outbox(&mut self) -> Vec<SignedUnwrap> {
        self.outbox.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }
}

impl<C: AssetCustodian> ShieldedPool<C> {
    /// Inbound bridge entry point, called once per custodial transfer that
    /// the relay delivered to the pool account.
    pub fn on_external_deposit(
        &mut self,
        caller: &Address,
        asset: &Address,
        amount: Amount,
        payload: &[u8],
    ) -> Result<AppliedTransaction> {
        let staged = self.stage_external_deposit(caller, asset, amount, payload, ProofVerdict::Unchecked)?;
        self.commit(staged)
    }

    /// Stage a bridged deposit. The relay's transfer is matched against
    /// funds not yet absorbed by any application, so deliveries may arrive
    /// late or out of order. A rejected deposit has its funds rescued.
    pub(crate) fn stage_external_deposit(
        &mut self,
        caller: &Address,
        asset: &Address,
        amount: Amount,
        payload: &[u8],
        verdict: ProofVerdict,
    ) -> Result<StagedTransaction> {
        // Unauthorized calls never absorb or rescue funds
        self.bridge().authorize(caller, asset)?;

        let received = self.unabsorbed_balance().min(amount);
        let staged = self.stage_bridged(amount, received, payload, verdict);

        if let Err(rejection) = &staged {
            if received > 0 {
                if let Err(e) = self.rescue(received) {
                    error!("Rescue of {} after rejected deposit failed: {}", received, e);
                }
            }
            warn!("Bridged deposit of {} rejected: {}", amount, rejection);
        }
        staged
    }

    fn stage_bridged(
        &mut self,
        amount: Amount,
        received: Amount,
        payload: &[u8],
        verdict: ProofVerdict,
    ) -> Result<StagedTransaction> {
        let tx = decode_bridge_payload(payload)?;
        if !tx.is_deposit() {
            return Err(PoolError::MalformedPayload(format!(
                "bridged transaction has external amount {}",
                tx.ext_data.ext_amount
            )));
        }
        if received != amount {
            return Err(PoolError::UnsettledDeposit {
                expected: amount,
                received,
            });
        }
        self.stage(tx, Origin::Bridge { received }, verdict)
    }
}
