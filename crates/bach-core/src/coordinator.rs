//! Batch coordination state machine
//!
//! [`BatchCoordinator`] holds all batch state and makes every decision, but
//! performs no I/O. Inputs arrive through the `on_*` methods; the resulting
//! side effects are queued as [`BatchCommand`]s and drained by the driver
//! with [`take_commands`](BatchCoordinator::take_commands).
//!
//! ```text
//! PendingGrouping ──begin_grouping──► ReadyToRun ──start signal──► Running
//!        │                               │                           │
//!        └────────── empty batch ────────┴──── all results in ───────┴──► Completed
//! ```

use bach_primitives::H256;
use bach_scheduler::{
    GroupId, Grouper, GroupingStats, ResourceOracle, SchedulerResult, TransactionGroup,
};
use bach_types::{Transaction, TransactionResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Batch lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatchState {
    /// Created, groups not yet computed
    PendingGrouping,
    /// Workers exist and are waiting for the start signal
    ReadyToRun,
    /// Workers are executing
    Running,
    /// Every transaction has exactly one result; terminal
    Completed,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PendingGrouping => "pending-grouping",
            Self::ReadyToRun => "ready-to-run",
            Self::Running => "running",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// How a worker task ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// Returned normally
    Finished,
    /// Stopped on an executor fault or panic
    Faulted(String),
    /// Aborted or lost its coordinator
    Cancelled,
}

/// Side effects requested by the coordinator
#[derive(Clone, Debug, PartialEq)]
pub enum BatchCommand {
    /// Create one gated worker per group
    SpawnWorkers(Vec<TransactionGroup>),
    /// Open the start gate for every worker
    StartWorkers,
    /// Hand a result to the sink
    Forward(TransactionResult),
    /// Stop any remaining workers and shut down
    Retire,
}

/// Bookkeeping for one group's worker
#[derive(Debug)]
struct WorkerSlot {
    /// Input positions of the group's members, in execution order
    members: Vec<usize>,
    reported: usize,
    exited: bool,
}

/// Drives one batch from grouping to completion
pub struct BatchCoordinator<O> {
    grouper: Arc<Grouper<O>>,
    state: BatchState,
    transactions: Vec<Transaction>,
    positions: HashMap<H256, usize>,
    /// Group of each input position, filled at grouping
    group_of: Vec<GroupId>,
    results: Vec<Option<TransactionResult>>,
    recorded: usize,
    arrival_order: Vec<H256>,
    workers: Vec<WorkerSlot>,
    stats: GroupingStats,
    start_requested: bool,
    faulted_groups: Vec<GroupId>,
    timed_out: bool,
    pending_commands: Vec<BatchCommand>,
}

impl<O: ResourceOracle> BatchCoordinator<O> {
    /// Create a coordinator, rejecting input that could never complete
    /// (duplicate hashes or an oversized batch)
    pub fn new(grouper: Arc<Grouper<O>>, transactions: Vec<Transaction>) -> SchedulerResult<Self> {
        Grouper::<O>::validate(&transactions)?;

        let positions = transactions
            .iter()
            .enumerate()
            .map(|(idx, tx)| (tx.hash(), idx))
            .collect();
        let total = transactions.len();

        Ok(Self {
            grouper,
            state: BatchState::PendingGrouping,
            transactions,
            positions,
            group_of: Vec::new(),
            results: vec![None; total],
            recorded: 0,
            arrival_order: Vec::with_capacity(total),
            workers: Vec::new(),
            stats: GroupingStats::default(),
            start_requested: false,
            faulted_groups: Vec::new(),
            timed_out: false,
            pending_commands: Vec::new(),
        })
    }

    /// Current state
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// True once every transaction has a result
    pub fn is_completed(&self) -> bool {
        self.state == BatchState::Completed
    }

    /// Results recorded so far
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Transactions in the batch
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Partition shape, zeroed until grouping ran
    pub fn stats(&self) -> GroupingStats {
        self.stats
    }

    /// Groups whose worker ended with transactions unreported
    pub fn faulted_groups(&self) -> &[GroupId] {
        &self.faulted_groups
    }

    /// Whether the deadline fired
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Hashes in the order results were recorded
    pub fn arrival_order(&self) -> &[H256] {
        &self.arrival_order
    }

    /// Drain queued side effects
    pub fn take_commands(&mut self) -> Vec<BatchCommand> {
        std::mem::take(&mut self.pending_commands)
    }

    /// Results in input order; `None` for transactions still outstanding
    pub fn results(&self) -> &[Option<TransactionResult>] {
        &self.results
    }

    /// Consume the coordinator, returning results in input order.
    ///
    /// Outstanding transactions are skipped, so the output is complete only
    /// once the batch is [`Completed`](BatchState::Completed).
    pub fn into_results(self) -> Vec<TransactionResult> {
        self.results.into_iter().flatten().collect()
    }

    /// Partition the batch and request one worker per group
    pub fn begin_grouping(&mut self) {
        if self.state != BatchState::PendingGrouping {
            warn!(state = %self.state, "Grouping requested twice, ignoring");
            return;
        }

        let groups = self.grouper.group(&self.transactions);
        self.stats = GroupingStats::from_groups(&groups);

        self.group_of = vec![GroupId::new(0); self.transactions.len()];
        self.workers = groups
            .iter()
            .map(|group| {
                let members: Vec<usize> = group
                    .transactions
                    .iter()
                    .filter_map(|tx| self.positions.get(&tx.hash()).copied())
                    .collect();
                for &idx in &members {
                    self.group_of[idx] = group.id;
                }
                WorkerSlot {
                    members,
                    reported: 0,
                    exited: false,
                }
            })
            .collect();

        info!(
            transactions = self.stats.transactions,
            groups = self.stats.groups,
            largest_group = self.stats.largest_group,
            parallelism = self.stats.parallelism(),
            "Batch grouped"
        );

        self.state = BatchState::ReadyToRun;
        if !groups.is_empty() {
            self.pending_commands.push(BatchCommand::SpawnWorkers(groups));
        }
        self.maybe_start();
        self.check_completion();
    }

    /// The external start signal; may arrive before or after grouping
    pub fn on_start_signal(&mut self) {
        if self.start_requested {
            debug!("Duplicate start signal ignored");
            return;
        }
        self.start_requested = true;
        self.maybe_start();
    }

    /// Record a result reported by `group`'s worker.
    ///
    /// Returns false if the result was ignored: unknown hash, wrong group,
    /// already recorded, or the batch has completed.
    pub fn on_result(&mut self, group: GroupId, result: TransactionResult) -> bool {
        if self.is_completed() {
            debug!(tx = %result.tx_hash, "Result after completion ignored");
            return false;
        }
        let Some(&idx) = self.positions.get(&result.tx_hash) else {
            warn!(group = %group, tx = %result.tx_hash, "Result for unknown transaction ignored");
            return false;
        };
        if self.group_of.get(idx) != Some(&group) {
            warn!(group = %group, tx = %result.tx_hash, "Result from foreign group ignored");
            return false;
        }
        if self.results[idx].is_some() {
            warn!(group = %group, tx = %result.tx_hash, "Duplicate result ignored");
            return false;
        }

        if let Some(slot) = self.workers.get_mut(group.index()) {
            slot.reported += 1;
            if slot.reported == slot.members.len() {
                debug!(group = %group, "Group fully reported");
            }
        }
        self.record(idx, result);
        self.check_completion();
        true
    }

    /// A worker task ended. Anything it left unreported gets a synthetic
    /// worker-fault result so the batch can still complete.
    pub fn on_worker_exit(&mut self, group: GroupId, exit: WorkerExit) {
        let completed = self.is_completed();
        let Some(slot) = self.workers.get_mut(group.index()) else {
            warn!(group = %group, "Exit from unknown worker ignored");
            return;
        };
        if slot.exited {
            return;
        }
        slot.exited = true;

        if completed {
            return;
        }

        let missing: Vec<usize> = slot
            .members
            .iter()
            .copied()
            .filter(|&idx| self.results[idx].is_none())
            .collect();
        if missing.is_empty() {
            debug!(group = %group, "Worker retired");
            return;
        }

        let reason = match &exit {
            WorkerExit::Finished => format!(
                "worker {group} exited with {} transactions unreported",
                missing.len()
            ),
            WorkerExit::Faulted(reason) => reason.clone(),
            WorkerExit::Cancelled => format!("worker {group} cancelled"),
        };
        warn!(
            group = %group,
            unreported = missing.len(),
            %reason,
            "Worker failed, synthesizing fault results"
        );
        self.faulted_groups.push(group);

        for idx in missing {
            let tx_hash = self.transactions[idx].hash();
            self.record(idx, TransactionResult::worker_fault(tx_hash, reason.clone()));
        }
        self.check_completion();
    }

    /// The batch deadline passed; every outstanding transaction times out
    pub fn on_deadline(&mut self) {
        if self.is_completed() {
            return;
        }
        let outstanding: Vec<usize> = (0..self.results.len())
            .filter(|&idx| self.results[idx].is_none())
            .collect();
        warn!(
            outstanding = outstanding.len(),
            state = %self.state,
            "Batch deadline exceeded"
        );
        self.timed_out = true;
        for idx in outstanding {
            let tx_hash = self.transactions[idx].hash();
            self.record(idx, TransactionResult::timed_out(tx_hash));
        }
        self.check_completion();
    }

    /// The start signal can no longer arrive. Workers never ran, so every
    /// outstanding transaction is aborted.
    pub fn on_start_abandoned(&mut self) {
        if self.is_completed() || self.start_requested {
            return;
        }
        warn!(state = %self.state, "Batch abandoned before start");
        for idx in 0..self.results.len() {
            if self.results[idx].is_none() {
                let tx_hash = self.transactions[idx].hash();
                self.record(idx, TransactionResult::aborted(tx_hash, "batch abandoned before start"));
            }
        }
        self.check_completion();
    }

    fn maybe_start(&mut self) {
        if self.state == BatchState::ReadyToRun && self.start_requested {
            info!(groups = self.workers.len(), "Starting workers");
            self.state = BatchState::Running;
            self.pending_commands.push(BatchCommand::StartWorkers);
        }
    }

    fn record(&mut self, idx: usize, result: TransactionResult) {
        debug!(tx = %result.tx_hash, status = %result.status, "Result recorded");
        self.arrival_order.push(result.tx_hash);
        self.pending_commands.push(BatchCommand::Forward(result.clone()));
        self.results[idx] = Some(result);
        self.recorded += 1;
    }

    fn check_completion(&mut self) {
        if self.state == BatchState::PendingGrouping || self.is_completed() {
            return;
        }
        if self.recorded == self.results.len() {
            info!(
                results = self.recorded,
                faulted_groups = self.faulted_groups.len(),
                timed_out = self.timed_out,
                "Batch completed"
            );
            self.state = BatchState::Completed;
            self.pending_commands.push(BatchCommand::Retire);
        }
    }
}
