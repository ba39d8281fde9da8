//! Resource-key extraction
//!
//! The host's state layer decides which cells a transaction may touch. The
//! grouper treats the answer as an opaque, pure, deterministic oracle: the
//! same transaction must always map to the same [`AccessSet`].

use crate::access::AccessSet;
use crate::resource::ResourceKey;
use bach_types::Transaction;

/// Maps a transaction to the state it may read or write
pub trait ResourceOracle: Send + Sync {
    /// Access set of `tx`
    fn access_set(&self, tx: &Transaction) -> AccessSet;
}

impl<F> ResourceOracle for F
where
    F: Fn(&Transaction) -> AccessSet + Send + Sync,
{
    fn access_set(&self, tx: &Transaction) -> AccessSet {
        self(tx)
    }
}

/// Uses only the access list declared on the transaction
#[derive(Clone, Copy, Debug, Default)]
pub struct DeclaredAccess;

impl ResourceOracle for DeclaredAccess {
    fn access_set(&self, tx: &Transaction) -> AccessSet {
        let mut set = AccessSet::new();
        for item in tx.access_list() {
            let key = ResourceKey::storage(item.address, item.slot);
            if item.write {
                set.record_write(key);
            } else {
                set.record_read(key);
            }
        }
        set
    }
}

/// Sender account plus target contract, treated as written.
///
/// Conservative: any two calls into the same contract serialize.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccountAccess;

impl ResourceOracle for AccountAccess {
    fn access_set(&self, tx: &Transaction) -> AccessSet {
        AccessSet::new()
            .write(ResourceKey::balance(tx.from()))
            .write(ResourceKey::nonce(tx.from()))
            .write(ResourceKey::contract(tx.to()))
    }
}

/// Sender account plus the declared access list; falls back to the whole
/// target contract when nothing is declared
#[derive(Clone, Copy, Debug, Default)]
pub struct CombinedAccess;

impl ResourceOracle for CombinedAccess {
    fn access_set(&self, tx: &Transaction) -> AccessSet {
        let mut set = DeclaredAccess.access_set(tx);
        set.record_write(ResourceKey::balance(tx.from()));
        set.record_write(ResourceKey::nonce(tx.from()));
        if tx.access_list().is_empty() {
            set.record_write(ResourceKey::contract(tx.to()));
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bach_primitives::{Address, H256};
    use bach_types::AccessItem;

    fn call(from: u8, to: u8) -> Transaction {
        Transaction::new(
            Address::repeat_byte(from),
            Address::repeat_byte(to),
            "Call",
            Vec::<u8>::new(),
            0,
        )
    }

    #[test]
    fn test_declared_access_splits_reads_and_writes() {
        let token = Address::repeat_byte(9);
        let tx = call(1, 9).with_access_list(vec![
            AccessItem::read(token, H256::from_low_u64_be(1)),
            AccessItem::write(token, H256::from_low_u64_be(2)),
        ]);
        let set = DeclaredAccess.access_set(&tx);
        assert_eq!(set.reads.len(), 1);
        assert_eq!(set.writes.len(), 1);
        assert!(set.writes_key(&ResourceKey::storage(token, H256::from_low_u64_be(2))));
    }

    #[test]
    fn test_declared_access_empty_list() {
        assert!(DeclaredAccess.access_set(&call(1, 2)).is_empty());
    }

    #[test]
    fn test_account_access_covers_sender_and_contract() {
        let set = AccountAccess.access_set(&call(1, 2));
        assert!(set.writes_key(&ResourceKey::balance(Address::repeat_byte(1))));
        assert!(set.writes_key(&ResourceKey::nonce(Address::repeat_byte(1))));
        assert!(set.writes_key(&ResourceKey::contract(Address::repeat_byte(2))));
        assert!(set.reads.is_empty());
    }

    #[test]
    fn test_combined_access_uses_declared_list_when_present() {
        let token = Address::repeat_byte(9);
        let tx = call(1, 9).with_access_list(vec![AccessItem::write(token, H256::ZERO)]);
        let set = CombinedAccess.access_set(&tx);
        assert!(!set.writes_key(&ResourceKey::contract(token)));
        assert!(set.writes_key(&ResourceKey::storage(token, H256::ZERO)));
        assert!(set.writes_key(&ResourceKey::balance(Address::repeat_byte(1))));
    }

    #[test]
    fn test_combined_access_falls_back_to_contract_key() {
        let set = CombinedAccess.access_set(&call(1, 2));
        assert!(set.writes_key(&ResourceKey::contract(Address::repeat_byte(2))));
    }

    #[test]
    fn test_closure_oracle() {
        let oracle = |tx: &Transaction| AccessSet::new().read(ResourceKey::code(tx.to()));
        let set = oracle.access_set(&call(1, 2));
        assert_eq!(set.reads.len(), 1);
    }
}
