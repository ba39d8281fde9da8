//! Simulated transaction executor

use crate::workload::{OVERDRAFT, TRANSFER};
use bach_core::{ExecutionError, TransactionExecutor};
use bach_primitives::{keccak256, H256};
use bach_scheduler::ResourceKey;
use bach_types::{ChainContext, Log, StateChange, Transaction, TransactionResult};
use std::time::Duration;

const TRANSFER_GAS: u64 = 21_000;

/// Executes the synthetic workload without touching real state
#[derive(Debug, Clone)]
pub struct SimulatedVm {
    delay: Duration,
    transfer_topic: H256,
}

impl SimulatedVm {
    /// VM spending `delay` on every transaction
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            transfer_topic: keccak256(b"Transfer(address,address,uint256)"),
        }
    }
}

impl TransactionExecutor for SimulatedVm {
    async fn execute(
        &self,
        tx: &Transaction,
        _ctx: &ChainContext,
    ) -> Result<TransactionResult, ExecutionError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let hash = tx.hash();
        match tx.method() {
            TRANSFER => {
                let recipient = ResourceKey::balance(tx.to());
                let change = StateChange {
                    address: recipient.address,
                    slot: recipient.slot,
                    value: tx.params().clone(),
                };
                let log = Log::new(tx.to(), vec![self.transfer_topic], tx.params().clone());
                Ok(TransactionResult::success(hash)
                    .with_state_changes(vec![change])
                    .with_logs(vec![log])
                    .with_gas_used(TRANSFER_GAS))
            }
            OVERDRAFT => Err(ExecutionError::transaction(hash, "insufficient balance")),
            other => Ok(TransactionResult::exception(
                hash,
                format!("unknown method {other}"),
            )),
        }
    }
}
