//! Conflict partitioning
//!
//! Builds the conflict graph implicitly: every resource key owns the
//! component of the first transaction that touched it, and each later
//! transaction touching the key is merged into that component. Connected
//! components become groups. Runs in near-linear time over the number of
//! (transaction, key) pairs.

use crate::access::{AccessSet, ConflictPolicy};
use crate::error::{SchedulerError, SchedulerResult};
use crate::oracle::{CombinedAccess, ResourceOracle};
use crate::resource::ResourceKey;
use bach_primitives::H256;
use bach_types::Transaction;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Index of a group within its batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

impl GroupId {
    /// Create a group id
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Position in the batch's group list
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Transactions that must run sequentially, in this order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionGroup {
    /// Group id, equal to the group's position in the batch
    pub id: GroupId,
    /// Members in original batch order
    pub transactions: Vec<Transaction>,
}

impl TransactionGroup {
    /// Number of transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// True if the group holds nothing
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Member hashes in execution order
    pub fn hashes(&self) -> Vec<H256> {
        self.transactions.iter().map(Transaction::hash).collect()
    }
}

/// Shape of a partition, for logging
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Transactions grouped
    pub transactions: usize,
    /// Groups produced
    pub groups: usize,
    /// Size of the largest group
    pub largest_group: usize,
    /// Groups holding a single transaction
    pub singleton_groups: usize,
}

impl GroupingStats {
    /// Summarize a partition
    pub fn from_groups(groups: &[TransactionGroup]) -> Self {
        Self {
            transactions: groups.iter().map(TransactionGroup::len).sum(),
            groups: groups.len(),
            largest_group: groups.iter().map(TransactionGroup::len).max().unwrap_or(0),
            singleton_groups: groups.iter().filter(|g| g.len() == 1).count(),
        }
    }

    /// Transactions over the longest sequential group; 1.0 means fully sequential
    pub fn parallelism(&self) -> f64 {
        if self.largest_group == 0 {
            return 0.0;
        }
        self.transactions as f64 / self.largest_group as f64
    }
}

/// Disjoint-set forest over transaction indices
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            // path halving
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}

/// Partitions transactions into conflict-free groups
#[derive(Clone, Debug, Default)]
pub struct Grouper<O = CombinedAccess> {
    oracle: O,
    policy: ConflictPolicy,
}

impl<O: ResourceOracle> Grouper<O> {
    /// Grouper using `oracle` and the default [`ConflictPolicy`]
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            policy: ConflictPolicy::default(),
        }
    }

    /// Override the conflict policy
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active conflict policy
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Resource oracle
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Reject input the grouper cannot partition faithfully.
    ///
    /// Hashes identify results, so a repeated hash would make exactly-once
    /// accounting impossible.
    pub fn validate(transactions: &[Transaction]) -> SchedulerResult<()> {
        if transactions.len() > u32::MAX as usize {
            return Err(SchedulerError::BatchTooLarge(transactions.len()));
        }
        let mut seen = HashSet::with_capacity(transactions.len());
        for tx in transactions {
            if !seen.insert(tx.hash()) {
                return Err(SchedulerError::DuplicateTransaction(tx.hash()));
            }
        }
        Ok(())
    }

    /// Group `transactions`.
    ///
    /// Groups are ordered by their first member's position in the input and
    /// members keep their input order.
    pub fn group(&self, transactions: &[Transaction]) -> Vec<TransactionGroup> {
        let access_sets: Vec<AccessSet> = transactions
            .iter()
            .map(|tx| self.oracle.access_set(tx))
            .collect();

        let groups: Vec<TransactionGroup> = self
            .partition(&access_sets)
            .into_iter()
            .enumerate()
            .map(|(idx, members)| TransactionGroup {
                id: GroupId::new(idx as u32),
                transactions: members.into_iter().map(|i| transactions[i].clone()).collect(),
            })
            .collect();

        debug!(
            transactions = transactions.len(),
            groups = groups.len(),
            "grouped transactions"
        );
        groups
    }

    /// Index-level partition of `access_sets`
    pub fn partition(&self, access_sets: &[AccessSet]) -> Vec<Vec<usize>> {
        let n = access_sets.len();
        let mut forest = DisjointSet::new(n);

        let linking: Option<HashSet<ResourceKey>> = match self.policy {
            ConflictPolicy::AnyAccess => None,
            ConflictPolicy::WritesOnly => Some(
                access_sets
                    .iter()
                    .flat_map(|set| set.writes.iter().copied())
                    .collect(),
            ),
        };

        let mut owner: HashMap<ResourceKey, usize> = HashMap::new();
        for (idx, set) in access_sets.iter().enumerate() {
            for key in set.keys() {
                if let Some(written) = &linking {
                    if !written.contains(key) {
                        continue;
                    }
                }
                match owner.get(key) {
                    Some(&first) => forest.union(first, idx),
                    None => {
                        owner.insert(*key, idx);
                    }
                }
            }
        }

        // roots are visited in order of their earliest member
        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for idx in 0..n {
            let root = forest.find(idx);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(idx);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::DeclaredAccess;
    use bach_primitives::Address;
    use bach_types::AccessItem;

    fn key(id: u8) -> ResourceKey {
        ResourceKey::balance(Address::repeat_byte(id))
    }

    fn tx_touching(nonce: u64, keys: &[u8]) -> Transaction {
        let items = keys
            .iter()
            .map(|id| AccessItem::write(Address::repeat_byte(*id), bach_primitives::H256::ZERO))
            .collect();
        Transaction::new(Address::ZERO, Address::ZERO, "Touch", Vec::<u8>::new(), nonce)
            .with_access_list(items)
    }

    fn declared() -> Grouper<DeclaredAccess> {
        Grouper::new(DeclaredAccess)
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        assert!(declared().group(&[]).is_empty());
        assert!(declared().partition(&[]).is_empty());
    }

    #[test]
    fn test_disjoint_keys_make_singletons() {
        let txs = vec![tx_touching(0, &[1]), tx_touching(1, &[2])];
        let groups = declared().group(&txs);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].hashes(), vec![txs[0].hash()]);
        assert_eq!(groups[1].hashes(), vec![txs[1].hash()]);
        assert_eq!(groups[0].id, GroupId::new(0));
        assert_eq!(groups[1].id, GroupId::new(1));
    }

    #[test]
    fn test_bridging_transaction_merges_components() {
        // {a}, {a,b}, {b}
        let txs = vec![tx_touching(0, &[1]), tx_touching(1, &[1, 2]), tx_touching(2, &[2])];
        let groups = declared().group(&txs);

        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].hashes(),
            txs.iter().map(Transaction::hash).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_late_bridge_merges_earlier_groups_in_input_order() {
        // {a}, {b}, {c}, {a,b}
        let sets = vec![
            AccessSet::new().write(key(1)),
            AccessSet::new().write(key(2)),
            AccessSet::new().write(key(3)),
            AccessSet::new().write(key(1)).write(key(2)),
        ];
        let groups = declared().partition(&sets);
        assert_eq!(groups, vec![vec![0, 1, 3], vec![2]]);
    }

    #[test]
    fn test_hot_key_collapses_to_one_group() {
        let sets: Vec<_> = (0..50)
            .map(|i| AccessSet::new().write(key(0)).write(key((i % 200) as u8 + 1)))
            .collect();
        let groups = declared().partition(&sets);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0], (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_untouched_transactions_are_singletons() {
        let sets = vec![AccessSet::new(), AccessSet::new(), AccessSet::new()];
        let groups = declared().partition(&sets);
        assert_eq!(groups, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_writes_only_policy_lets_readers_share() {
        let sets = vec![
            AccessSet::new().read(key(1)),
            AccessSet::new().read(key(1)),
            AccessSet::new().read(key(2)),
            AccessSet::new().write(key(2)),
        ];
        let any = declared().partition(&sets);
        let writes_only = declared()
            .with_policy(ConflictPolicy::WritesOnly)
            .partition(&sets);

        assert_eq!(any, vec![vec![0, 1], vec![2, 3]]);
        assert_eq!(writes_only, vec![vec![0], vec![1], vec![2, 3]]);
    }

    #[test]
    fn test_partition_is_deterministic() {
        let sets: Vec<_> = (0..40u8)
            .map(|i| AccessSet::new().write(key(i % 7)).read(key(i % 5 + 10)))
            .collect();
        assert_eq!(declared().partition(&sets), declared().partition(&sets));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let tx = tx_touching(0, &[1]);
        let err = Grouper::<DeclaredAccess>::validate(&[tx.clone(), tx.clone()]).unwrap_err();
        assert_eq!(err, SchedulerError::DuplicateTransaction(tx.hash()));
        assert!(Grouper::<DeclaredAccess>::validate(&[tx]).is_ok());
        assert!(Grouper::<DeclaredAccess>::validate(&[]).is_ok());
    }

    #[test]
    fn test_stats() {
        let txs = vec![tx_touching(0, &[1]), tx_touching(1, &[1]), tx_touching(2, &[2])];
        let stats = GroupingStats::from_groups(&declared().group(&txs));
        assert_eq!(
            stats,
            GroupingStats {
                transactions: 3,
                groups: 2,
                largest_group: 2,
                singleton_groups: 1,
            }
        );
        assert_eq!(stats.parallelism(), 1.5);
        assert_eq!(GroupingStats::default().parallelism(), 0.0);
    }

    #[test]
    fn test_group_id_display_and_index() {
        assert_eq!(GroupId::new(3).to_string(), "g3");
        assert_eq!(GroupId::new(3).index(), 3);
    }
}
