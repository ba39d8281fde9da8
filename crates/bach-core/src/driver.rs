//! Tokio driver for batches
//!
//! One coordinator task per batch owns the [`BatchCoordinator`] and turns
//! its commands into tasks, gate flips and sink calls. Worker output and
//! worker exits arrive on a single channel; each worker has a small
//! supervisor task that reports its exit after the worker's own reports, so
//! the coordinator always sees a worker's results before its exit.

use crate::config::ExecutionConfig;
use crate::coordinator::{BatchCommand, BatchCoordinator, BatchState, WorkerExit};
use crate::error::{BatchError, BatchResult, SinkError};
use crate::executor::TransactionExecutor;
use crate::job::{JobExecutor, WorkerEvent};
use crate::sink::ResultSink;
use bach_primitives::H256;
use bach_scheduler::{CombinedAccess, GroupId, Grouper, GroupingStats, ResourceOracle, TransactionGroup};
use bach_types::{ChainContext, Transaction, TransactionResult, TxStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, Instrument};

/// Outcome of a completed batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Exactly one result per transaction, in input order
    pub results: Vec<TransactionResult>,
    /// Hashes in the order results reached the sink
    pub arrival_order: Vec<H256>,
    /// Partition shape
    pub stats: GroupingStats,
    /// Groups whose worker failed before reporting everything
    pub faulted_groups: Vec<GroupId>,
    /// Whether the batch deadline fired
    pub timed_out: bool,
    /// Wall time from spawn to completion
    pub elapsed: Duration,
}

impl BatchReport {
    /// Number of results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True for an empty batch
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Successful transactions
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Results with the given status
    pub fn count(&self, status: TxStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Look up a result by transaction hash
    pub fn get(&self, tx_hash: &H256) -> Option<&TransactionResult> {
        self.results.iter().find(|r| &r.tx_hash == tx_hash)
    }
}

/// Control handle for a spawned batch.
///
/// Workers stay gated until [`start`](Self::start). Dropping the handle (or
/// calling [`wait`](Self::wait)) without starting abandons the batch: every
/// transaction is reported as aborted and the coordinator retires.
#[derive(Debug)]
pub struct BatchHandle {
    start: Option<oneshot::Sender<()>>,
    state: watch::Receiver<BatchState>,
    task: JoinHandle<BatchResult<BatchReport>>,
    transactions: usize,
}

impl BatchHandle {
    /// Deliver the start signal
    pub fn start(&mut self) -> BatchResult<()> {
        let signal = self.start.take().ok_or(BatchError::AlreadyStarted)?;
        if signal.send(()).is_err() {
            // already completed, e.g. an empty batch
            debug!("Start signal after batch completion");
        }
        Ok(())
    }

    /// Whether `start` was called
    pub fn is_started(&self) -> bool {
        self.start.is_none()
    }

    /// Latest observed state
    pub fn state(&self) -> BatchState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<BatchState> {
        self.state.clone()
    }

    /// Transactions in the batch
    pub fn len(&self) -> usize {
        self.transactions
    }

    /// True for an empty batch
    pub fn is_empty(&self) -> bool {
        self.transactions == 0
    }

    /// Wait for completion
    pub async fn wait(self) -> BatchResult<BatchReport> {
        let Self { start, task, .. } = self;
        drop(start);
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(BatchError::CoordinatorLost(e.to_string())),
        }
    }
}

/// Entry point: executes batches of transactions in conflict-free groups
pub struct ParallelExecutor<E, O = CombinedAccess> {
    executor: Arc<E>,
    grouper: Arc<Grouper<O>>,
    config: ExecutionConfig,
}

impl<E, O> ParallelExecutor<E, O>
where
    E: TransactionExecutor,
    O: ResourceOracle + 'static,
{
    /// Create an executor; the grouper uses `config.conflict_policy`
    pub fn new(executor: E, oracle: O, config: ExecutionConfig) -> Self {
        let grouper = Grouper::new(oracle).with_policy(config.conflict_policy);
        Self {
            executor: Arc::new(executor),
            grouper: Arc::new(grouper),
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Grouper used for every batch
    pub fn grouper(&self) -> &Grouper<O> {
        &self.grouper
    }

    /// Validate `transactions`, group them and spawn gated workers.
    ///
    /// Returns before anything executes; call [`BatchHandle::start`] to run.
    /// Must be called from within a tokio runtime.
    pub fn spawn_batch(
        &self,
        context: ChainContext,
        transactions: Vec<Transaction>,
        sink: Arc<dyn ResultSink>,
    ) -> BatchResult<BatchHandle> {
        let total = transactions.len();
        let coordinator = BatchCoordinator::new(self.grouper.clone(), transactions)?;
        let span = info_span!("batch", height = context.block_height, transactions = total);
        let (events_tx, events_rx) = mpsc::channel(self.config.channel_capacity());
        let (start_tx, start_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(BatchState::PendingGrouping);
        let (start_gate, _) = watch::channel(false);
        let started_at = Instant::now();
        let deadline = self.config.batch_timeout().map(|timeout| started_at + timeout);
        let permits = match self.config.max_parallel_groups {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        let driver = BatchDriver {
            coordinator,
            executor: self.executor.clone(),
            context: Arc::new(context),
            sink,
            permits,
            start_gate,
            events_tx,
            workers: Vec::new(),
            state_tx,
            forward_failures: Vec::new(),
            started_at,
        };
        let task = tokio::spawn(driver.run(start_rx, events_rx, deadline).instrument(span));

        Ok(BatchHandle {
            start: Some(start_tx),
            state: state_rx,
            task,
            transactions: total,
        })
    }

    /// Spawn, start and wait for a batch
    pub async fn execute(
        &self,
        context: ChainContext,
        transactions: Vec<Transaction>,
        sink: Arc<dyn ResultSink>,
    ) -> BatchResult<BatchReport> {
        let mut handle = self.spawn_batch(context, transactions, sink)?;
        handle.start()?;
        handle.wait().await
    }
}

struct BatchDriver<E, O> {
    coordinator: BatchCoordinator<O>,
    executor: Arc<E>,
    context: Arc<ChainContext>,
    sink: Arc<dyn ResultSink>,
    permits: Option<Arc<Semaphore>>,
    start_gate: watch::Sender<bool>,
    /// Held for the whole run, so the event channel never closes under the loop
    events_tx: mpsc::Sender<WorkerEvent>,
    workers: Vec<AbortHandle>,
    state_tx: watch::Sender<BatchState>,
    forward_failures: Vec<(H256, SinkError)>,
    started_at: Instant,
}

impl<E, O> BatchDriver<E, O>
where
    E: TransactionExecutor,
    O: ResourceOracle + 'static,
{
    async fn run(
        mut self,
        mut start: oneshot::Receiver<()>,
        mut events: mpsc::Receiver<WorkerEvent>,
        deadline: Option<Instant>,
    ) -> BatchResult<BatchReport> {
        self.coordinator.begin_grouping();
        self.apply_commands();

        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);
        let mut awaiting_start = true;
        let mut deadline_armed = deadline.is_some();

        while !self.coordinator.is_completed() {
            tokio::select! {
                signal = &mut start, if awaiting_start => {
                    awaiting_start = false;
                    match signal {
                        Ok(()) => self.coordinator.on_start_signal(),
                        Err(_) => self.coordinator.on_start_abandoned(),
                    }
                }
                Some(event) = events.recv() => {
                    match event {
                        WorkerEvent::Report { group, result } => {
                            self.coordinator.on_result(group, result);
                        }
                        WorkerEvent::Exited { group, exit } => {
                            self.coordinator.on_worker_exit(group, exit);
                        }
                    }
                }
                _ = &mut timer, if deadline_armed => {
                    deadline_armed = false;
                    self.coordinator.on_deadline();
                }
            }
            self.apply_commands();
        }

        self.finish()
    }

    fn apply_commands(&mut self) {
        for command in self.coordinator.take_commands() {
            match command {
                BatchCommand::SpawnWorkers(groups) => self.spawn_workers(groups),
                BatchCommand::StartWorkers => {
                    self.start_gate.send_replace(true);
                }
                BatchCommand::Forward(result) => self.forward(result),
                BatchCommand::Retire => self.retire(),
            }
        }
        self.state_tx.send_replace(self.coordinator.state());
    }

    fn spawn_workers(&mut self, groups: Vec<TransactionGroup>) {
        for group in groups {
            let id = group.id;
            let job = JobExecutor::new(
                group,
                self.context.clone(),
                self.executor.clone(),
                self.start_gate.subscribe(),
                self.permits.clone(),
                self.events_tx.clone(),
            );
            let worker = tokio::spawn(job.run().instrument(info_span!("worker", group = %id)));
            self.workers.push(worker.abort_handle());

            let events = self.events_tx.clone();
            tokio::spawn(async move {
                let exit = match worker.await {
                    Ok(Ok(_)) => WorkerExit::Finished,
                    Ok(Err(e)) => WorkerExit::Faulted(e.to_string()),
                    Err(e) => join_error_exit(e),
                };
                // coordinator may already have retired
                let _ = events.send(WorkerEvent::Exited { group: id, exit }).await;
            });
        }
        debug!(workers = self.workers.len(), "Workers spawned");
    }

    fn forward(&mut self, result: TransactionResult) {
        if let Err(e) = self.sink.forward(&result) {
            error!(tx = %result.tx_hash, error = %e, "Failed to forward result");
            self.forward_failures.push((result.tx_hash, e));
        }
    }

    fn retire(&mut self) {
        for worker in self.workers.drain(..) {
            worker.abort();
        }
    }

    fn finish(self) -> BatchResult<BatchReport> {
        let elapsed = self.started_at.elapsed();
        let arrival_order = self.coordinator.arrival_order().to_vec();
        let faulted_groups = self.coordinator.faulted_groups().to_vec();
        let timed_out = self.coordinator.timed_out();
        let stats = self.coordinator.stats();
        let report = BatchReport {
            results: self.coordinator.into_results(),
            arrival_order,
            stats,
            faulted_groups,
            timed_out,
            elapsed,
        };

        info!(
            results = report.len(),
            succeeded = report.success_count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Batch retired"
        );

        if self.forward_failures.is_empty() {
            Ok(report)
        } else {
            Err(BatchError::Forwarding {
                failed: self.forward_failures,
                report: Box::new(report),
            })
        }
    }
}

fn join_error_exit(err: JoinError) -> WorkerExit {
    match err.try_into_panic() {
        Ok(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            WorkerExit::Faulted(format!("worker panicked: {message}"))
        }
        Err(_) => WorkerExit::Cancelled,
    }
}
