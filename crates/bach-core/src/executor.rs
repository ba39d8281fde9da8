//! Execution collaborator interface

use crate::error::ExecutionError;
use bach_types::{ChainContext, Transaction, TransactionResult};
use std::future::Future;
use std::sync::Arc;

/// Executes a single transaction against a chain snapshot.
///
/// Implemented by the host's virtual machine. Called once per transaction by
/// the worker owning its group, and concurrently from different workers, so
/// implementations must be safe to share across tasks. Returning
/// [`ExecutionError::Transaction`] records a failed result and lets the
/// worker continue; [`ExecutionError::Fatal`] terminates the worker.
pub trait TransactionExecutor: Send + Sync + 'static {
    /// Execute `tx`
    fn execute(
        &self,
        tx: &Transaction,
        ctx: &ChainContext,
    ) -> impl Future<Output = Result<TransactionResult, ExecutionError>> + Send;
}

impl<E: TransactionExecutor> TransactionExecutor for Arc<E> {
    fn execute(
        &self,
        tx: &Transaction,
        ctx: &ChainContext,
    ) -> impl Future<Output = Result<TransactionResult, ExecutionError>> + Send {
        (**self).execute(tx, ctx)
    }
}
