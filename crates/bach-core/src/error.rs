//! Batch execution error types

use crate::driver::BatchReport;
use bach_primitives::H256;
use bach_scheduler::{GroupId, SchedulerError};
use thiserror::Error;

/// Error reported by the execution collaborator for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The transaction could not be executed; recorded as a failed result
    /// and the worker moves on to the next transaction
    #[error("transaction {tx_hash} failed: {reason}")]
    Transaction {
        /// Transaction hash
        tx_hash: H256,
        /// Failure reason
        reason: String,
    },

    /// The execution layer itself is broken; the worker stops
    #[error("executor fault: {0}")]
    Fatal(String),
}

impl ExecutionError {
    /// Per-transaction failure
    pub fn transaction(tx_hash: H256, reason: impl Into<String>) -> Self {
        Self::Transaction {
            tx_hash,
            reason: reason.into(),
        }
    }

    /// True if the worker must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Abnormal worker termination
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// The executor reported a fatal fault
    #[error("worker {group} stopped at {tx_hash}: {reason}")]
    Executor {
        /// Group the worker ran
        group: GroupId,
        /// Transaction being executed
        tx_hash: H256,
        /// Fault description
        reason: String,
    },

    /// The coordinator went away before the worker finished
    #[error("worker {0} cancelled")]
    Cancelled(GroupId),
}

/// Result sink errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The consumer is gone
    #[error("result sink closed")]
    Closed,

    /// The consumer refused the result
    #[error("result {tx_hash} rejected: {reason}")]
    Rejected {
        /// Transaction hash
        tx_hash: H256,
        /// Rejection reason
        reason: String,
    },
}

/// Batch-level errors
#[derive(Debug, Error)]
pub enum BatchError {
    /// Input failed validation; no worker was spawned
    #[error("invalid batch: {0}")]
    Invalid(#[from] SchedulerError),

    /// `start` was called twice
    #[error("batch already started")]
    AlreadyStarted,

    /// The batch completed but some results never reached the sink.
    /// Every result is still present in the report.
    #[error("{} results could not be forwarded to the sink", failed.len())]
    Forwarding {
        /// Hashes that failed and why
        failed: Vec<(H256, SinkError)>,
        /// The completed batch
        report: Box<BatchReport>,
    },

    /// The coordinator task died or stopped without completing
    #[error("batch coordinator lost: {0}")]
    CoordinatorLost(String),
}

/// Result type for batch operations
pub type BatchResult<T> = Result<T, BatchError>;
