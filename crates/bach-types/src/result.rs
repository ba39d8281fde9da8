//! Per-transaction execution outcome

use bach_primitives::{Address, H256};
use bytes::Bytes;
use std::fmt;

/// How a transaction finished
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TxStatus {
    /// Executed and committed its changes
    Success,
    /// Rejected or reverted by the execution layer
    Failed,
    /// The contract raised an exception
    Exception,
    /// The worker running the transaction's group crashed first
    WorkerFault,
    /// The batch deadline passed before the transaction ran
    TimedOut,
    /// The batch was abandoned before it was started
    Aborted,
}

impl TxStatus {
    /// True only for [`TxStatus::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, TxStatus::Success)
    }

    /// True for outcomes the coordinator produced itself rather than a worker
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self,
            TxStatus::WorkerFault | TxStatus::TimedOut | TxStatus::Aborted
        )
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Success => "success",
            TxStatus::Failed => "failed",
            TxStatus::Exception => "exception",
            TxStatus::WorkerFault => "worker-fault",
            TxStatus::TimedOut => "timed-out",
            TxStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Log emitted by a contract
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Log {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics
    pub topics: Vec<H256>,
    /// Unindexed payload
    pub data: Bytes,
}

impl Log {
    /// Create a log entry
    pub fn new(address: Address, topics: Vec<H256>, data: impl Into<Bytes>) -> Self {
        Self {
            address,
            topics,
            data: data.into(),
        }
    }
}

/// A single state write produced by a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateChange {
    /// Account or contract owning the slot
    pub address: Address,
    /// Storage slot
    pub slot: H256,
    /// New value
    pub value: Bytes,
}

/// Outcome of one transaction, recorded exactly once per batch
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactionResult {
    /// Hash of the originating transaction
    pub tx_hash: H256,
    /// Final status
    pub status: TxStatus,
    /// Failure description for non-success statuses
    pub error: Option<String>,
    /// Value returned by the called method
    pub return_value: Bytes,
    /// State writes
    pub state_changes: Vec<StateChange>,
    /// Emitted logs
    pub logs: Vec<Log>,
    /// Gas consumed
    pub gas_used: u64,
}

impl TransactionResult {
    fn with_status(tx_hash: H256, status: TxStatus, error: Option<String>) -> Self {
        Self {
            tx_hash,
            status,
            error,
            return_value: Bytes::new(),
            state_changes: Vec::new(),
            logs: Vec::new(),
            gas_used: 0,
        }
    }

    /// Successful execution with no output yet attached
    pub fn success(tx_hash: H256) -> Self {
        Self::with_status(tx_hash, TxStatus::Success, None)
    }

    /// Execution rejected by the VM
    pub fn failed(tx_hash: H256, reason: impl Into<String>) -> Self {
        Self::with_status(tx_hash, TxStatus::Failed, Some(reason.into()))
    }

    /// Contract raised an exception
    pub fn exception(tx_hash: H256, reason: impl Into<String>) -> Self {
        Self::with_status(tx_hash, TxStatus::Exception, Some(reason.into()))
    }

    /// Synthesized when the owning worker died before reporting
    pub fn worker_fault(tx_hash: H256, reason: impl Into<String>) -> Self {
        Self::with_status(tx_hash, TxStatus::WorkerFault, Some(reason.into()))
    }

    /// Synthesized when the batch deadline expired
    pub fn timed_out(tx_hash: H256) -> Self {
        Self::with_status(
            tx_hash,
            TxStatus::TimedOut,
            Some("batch deadline exceeded".to_string()),
        )
    }

    /// Synthesized when the batch was abandoned before starting
    pub fn aborted(tx_hash: H256, reason: impl Into<String>) -> Self {
        Self::with_status(tx_hash, TxStatus::Aborted, Some(reason.into()))
    }

    /// Attach logs
    pub fn with_logs(mut self, logs: Vec<Log>) -> Self {
        self.logs = logs;
        self
    }

    /// Attach state changes
    pub fn with_state_changes(mut self, changes: Vec<StateChange>) -> Self {
        self.state_changes = changes;
        self
    }

    /// Attach a return value
    pub fn with_return_value(mut self, value: impl Into<Bytes>) -> Self {
        self.return_value = value.into();
        self
    }

    /// Set gas used
    pub fn with_gas_used(mut self, gas_used: u64) -> Self {
        self.gas_used = gas_used;
        self
    }

    /// Check if transaction succeeded
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
