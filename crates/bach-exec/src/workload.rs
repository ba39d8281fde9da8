//! Synthetic transfer workload

use bach_primitives::{Address, H256};
use bach_scheduler::ResourceKey;
use bach_types::{AccessItem, Transaction};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Method executed normally by the simulated VM
pub const TRANSFER: &str = "transfer";
/// Method the simulated VM always rejects
pub const OVERDRAFT: &str = "transfer_overdraft";

/// Contract whose single slot every "hot" transaction writes
pub const HOT_CONTRACT: Address = Address::repeat_byte(0xee);
const HOT_SLOT: H256 = H256::from_bytes([0x01; 32]);

/// Shape of the generated batch
#[derive(Debug, Clone)]
pub struct WorkloadParams {
    pub transactions: usize,
    pub accounts: usize,
    pub hot_ratio: f64,
    pub fail_ratio: f64,
    pub seed: u64,
}

/// Generate a deterministic batch of transfers between `accounts` accounts.
///
/// Each transfer writes the sender (via the oracle) and declares a write of
/// the recipient's balance. A `hot_ratio` share also writes the hot slot,
/// which chains all of them into one group.
pub fn generate(params: &WorkloadParams) -> Vec<Transaction> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let accounts: Vec<Address> = (0..params.accounts.max(1)).map(account).collect();
    let mut nonces = vec![0u64; accounts.len()];
    let hot_ratio = probability(params.hot_ratio);
    let fail_ratio = probability(params.fail_ratio);

    (0..params.transactions)
        .map(|_| {
            let sender = rng.gen_range(0..accounts.len());
            let to = accounts[rng.gen_range(0..accounts.len())];
            let nonce = nonces[sender];
            nonces[sender] += 1;

            let amount: u64 = rng.gen_range(1..1_000);
            let method = if rng.gen_bool(fail_ratio) { OVERDRAFT } else { TRANSFER };

            let recipient = ResourceKey::balance(to);
            let mut access = vec![AccessItem::write(recipient.address, recipient.slot)];
            if rng.gen_bool(hot_ratio) {
                access.push(AccessItem::write(HOT_CONTRACT, HOT_SLOT));
            }

            Transaction::new(
                accounts[sender],
                to,
                method,
                amount.to_be_bytes().to_vec(),
                nonce,
            )
            .with_access_list(access)
        })
        .collect()
}

/// Clamp into `[0, 1]`; NaN counts as never
fn probability(ratio: f64) -> f64 {
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

fn account(index: usize) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&(index as u64 + 1).to_be_bytes());
    Address::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bach_scheduler::{CombinedAccess, Grouper};
    use std::collections::HashSet;

    fn params(transactions: usize, hot_ratio: f64) -> WorkloadParams {
        WorkloadParams {
            transactions,
            accounts: 64,
            hot_ratio,
            fail_ratio: 0.0,
            seed: 1,
        }
    }

    #[test]
    fn test_same_seed_same_batch() {
        let a = generate(&params(100, 0.1));
        let b = generate(&params(100, 0.1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_hashes_are_unique() {
        let txs = generate(&params(500, 0.0));
        let hashes: HashSet<_> = txs.iter().map(Transaction::hash).collect();
        assert_eq!(hashes.len(), 500);
        assert!(Grouper::<CombinedAccess>::validate(&txs).is_ok());
    }

    #[test]
    fn test_fully_hot_batch_is_one_group() {
        let txs = generate(&params(50, 1.0));
        let groups = Grouper::new(CombinedAccess).group(&txs);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_fail_ratio_selects_overdrafts() {
        let all_fail = WorkloadParams {
            fail_ratio: 1.0,
            ..params(20, 0.0)
        };
        assert!(generate(&all_fail).iter().all(|tx| tx.method() == OVERDRAFT));
        assert!(generate(&params(20, 0.0)).iter().all(|tx| tx.method() == TRANSFER));
    }

    #[test]
    fn test_ratios_are_clamped() {
        let wild = WorkloadParams {
            hot_ratio: 7.0,
            fail_ratio: -1.0,
            ..params(10, 0.0)
        };
        assert_eq!(generate(&wild).len(), 10);
    }

    #[test]
    fn test_nan_ratios_mean_never() {
        let nan = WorkloadParams {
            hot_ratio: f64::NAN,
            fail_ratio: f64::NAN,
            ..params(20, 0.0)
        };
        let txs = generate(&nan);
        assert!(txs.iter().all(|tx| tx.method() == TRANSFER));
        assert!(txs.iter().all(|tx| tx.access_list().len() == 1));
    }
}
