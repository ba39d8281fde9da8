//! Per-group worker

use crate::error::{ExecutionError, WorkerError};
use crate::executor::TransactionExecutor;
use bach_scheduler::{GroupId, TransactionGroup};
use bach_types::{ChainContext, TransactionResult};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, warn};

/// Message from a worker (or its supervisor) to the coordinator
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// One transaction finished
    Report {
        /// Reporting group
        group: GroupId,
        /// Its result
        result: TransactionResult,
    },
    /// The worker task ended
    Exited {
        /// Group the worker ran
        group: GroupId,
        /// How it ended
        exit: crate::coordinator::WorkerExit,
    },
}

/// Runs one group's transactions in order.
///
/// Nothing executes until the start gate opens. If a concurrency limit is
/// configured the worker also holds a semaphore permit for its whole run.
/// Returning from [`run`](Self::run) retires the worker.
pub struct JobExecutor<E> {
    group: TransactionGroup,
    context: Arc<ChainContext>,
    executor: Arc<E>,
    start: watch::Receiver<bool>,
    permits: Option<Arc<Semaphore>>,
    events: mpsc::Sender<WorkerEvent>,
}

impl<E: TransactionExecutor> JobExecutor<E> {
    /// Create a worker for `group`
    pub fn new(
        group: TransactionGroup,
        context: Arc<ChainContext>,
        executor: Arc<E>,
        start: watch::Receiver<bool>,
        permits: Option<Arc<Semaphore>>,
        events: mpsc::Sender<WorkerEvent>,
    ) -> Self {
        Self {
            group,
            context,
            executor,
            start,
            permits,
            events,
        }
    }

    /// Wait for the start gate, then execute the group
    pub async fn run(mut self) -> Result<GroupId, WorkerError> {
        let id = self.group.id;

        if self.start.wait_for(|started| *started).await.is_err() {
            debug!(group = %id, "Start gate closed before opening");
            return Err(WorkerError::Cancelled(id));
        }

        let _permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| WorkerError::Cancelled(id))?,
            ),
            None => None,
        };

        debug!(group = %id, transactions = self.group.len(), "Worker started");

        for tx in &self.group.transactions {
            let tx_hash = tx.hash();
            let result = match self.executor.execute(tx, &self.context).await {
                Ok(mut result) => {
                    if result.tx_hash != tx_hash {
                        warn!(
                            group = %id,
                            expected = %tx_hash,
                            got = %result.tx_hash,
                            "Executor returned result for wrong hash, rewriting"
                        );
                        result.tx_hash = tx_hash;
                    }
                    result
                }
                Err(ExecutionError::Fatal(reason)) => {
                    warn!(group = %id, tx = %tx_hash, %reason, "Executor fault, stopping worker");
                    return Err(WorkerError::Executor {
                        group: id,
                        tx_hash,
                        reason,
                    });
                }
                Err(ExecutionError::Transaction { reason, .. }) => {
                    TransactionResult::failed(tx_hash, reason)
                }
            };

            if self
                .events
                .send(WorkerEvent::Report { group: id, result })
                .await
                .is_err()
            {
                debug!(group = %id, "Coordinator gone, stopping worker");
                return Err(WorkerError::Cancelled(id));
            }
        }

        debug!(group = %id, "Worker finished");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bach_primitives::Address;
    use bach_types::{Transaction, TxStatus};

    struct Echo;

    impl TransactionExecutor for Echo {
        async fn execute(
            &self,
            tx: &Transaction,
            _ctx: &ChainContext,
        ) -> Result<TransactionResult, ExecutionError> {
            match tx.method() {
                "revert" => Err(ExecutionError::transaction(tx.hash(), "reverted")),
                "crash" => Err(ExecutionError::Fatal("vm crashed".into())),
                "wrong" => Ok(TransactionResult::success(bach_primitives::H256::ZERO)),
                _ => Ok(TransactionResult::success(tx.hash())),
            }
        }
    }

    fn group(methods: &[&str]) -> TransactionGroup {
        TransactionGroup {
            id: GroupId::new(0),
            transactions: methods
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    Transaction::new(
                        Address::repeat_byte(1),
                        Address::repeat_byte(2),
                        *m,
                        Vec::<u8>::new(),
                        i as u64,
                    )
                })
                .collect(),
        }
    }

    fn worker(
        group: TransactionGroup,
    ) -> (
        JobExecutor<Echo>,
        watch::Sender<bool>,
        mpsc::Receiver<WorkerEvent>,
    ) {
        let (start_tx, start_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::channel(16);
        let job = JobExecutor::new(
            group,
            Arc::new(ChainContext::genesis(1)),
            Arc::new(Echo),
            start_rx,
            None,
            events_tx,
        );
        (job, start_tx, events_rx)
    }

    fn drain(rx: &mut mpsc::Receiver<WorkerEvent>) -> Vec<TransactionResult> {
        let mut out = Vec::new();
        while let Ok(WorkerEvent::Report { result, .. }) = rx.try_recv() {
            out.push(result);
        }
        out
    }

    #[tokio::test]
    async fn test_runs_group_in_order_after_start() {
        let g = group(&["a", "revert", "b"]);
        let hashes = g.hashes();
        let (job, start, mut rx) = worker(g);

        let handle = tokio::spawn(job.run());
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err(), "ran before start");

        start.send_replace(true);
        assert_eq!(handle.await.unwrap(), Ok(GroupId::new(0)));

        let results = drain(&mut rx);
        let got: Vec<_> = results.iter().map(|r| r.tx_hash).collect();
        assert_eq!(got, hashes);
        assert_eq!(results[1].status, TxStatus::Failed);
        assert!(results[0].is_success() && results[2].is_success());
    }

    #[tokio::test]
    async fn test_fatal_error_stops_worker() {
        let g = group(&["a", "crash", "b"]);
        let crash = g.transactions[1].hash();
        let (job, start, mut rx) = worker(g);
        start.send_replace(true);

        let err = job.run().await.unwrap_err();
        assert_eq!(
            err,
            WorkerError::Executor {
                group: GroupId::new(0),
                tx_hash: crash,
                reason: "vm crashed".into(),
            }
        );
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_closed_gate_cancels() {
        let (job, start, _rx) = worker(group(&["a"]));
        drop(start);
        assert_eq!(job.run().await, Err(WorkerError::Cancelled(GroupId::new(0))));
    }

    #[tokio::test]
    async fn test_result_hash_is_rewritten() {
        let g = group(&["wrong"]);
        let expected = g.transactions[0].hash();
        let (job, start, mut rx) = worker(g);
        start.send_replace(true);
        job.run().await.unwrap();
        assert_eq!(drain(&mut rx)[0].tx_hash, expected);
    }
}
