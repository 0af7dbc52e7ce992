//! Proof-of-work generation and validation

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use crate::core::crypto::hashing::work_value;
use crate::core::gateway::BackendGateway;
use crate::shared::constants::{FULL_WORK_THRESHOLD, REDUCED_WORK_THRESHOLD};
use crate::shared::types::{BlockHash, DifficultyTier};
use crate::shared::WalletResult;

/// Minimum work values per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkThresholds {
    pub full: u64,
    pub reduced: u64,
}

impl Default for WorkThresholds {
    fn default() -> Self {
        Self {
            full: FULL_WORK_THRESHOLD,
            reduced: REDUCED_WORK_THRESHOLD,
        }
    }
}

impl WorkThresholds {
    pub fn for_tier(&self, tier: DifficultyTier) -> u64 {
        match tier {
            DifficultyTier::Full => self.full,
            DifficultyTier::Reduced => self.reduced,
        }
    }
}

/// Nonces each worker tries between checks of the stop flags
const CANCEL_CHECK_INTERVAL: u64 = 4096;

pub fn is_valid_work(root: &BlockHash, work: u64, threshold: u64) -> bool {
    work_value(work, root) >= threshold
}

/// CPU search for a nonce meeting `threshold`, split across one worker
/// thread per core. Blocking; run it off the async executor. Returns `None`
/// once `cancel` is raised.
pub fn generate_local(root: &BlockHash, threshold: u64, cancel: &AtomicBool) -> Option<u64> {
    let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(4) as u64;
    let start: u64 = rand::thread_rng().gen();
    let found = AtomicBool::new(false);
    let nonce = AtomicU64::new(0);

    thread::scope(|scope| {
        for worker in 0..workers {
            let (found, nonce) = (&found, &nonce);
            scope.spawn(move || {
                let mut work = start.wrapping_add(worker);
                let mut tried: u64 = 0;
                loop {
                    if is_valid_work(root, work, threshold) {
                        if !found.swap(true, Ordering::SeqCst) {
                            nonce.store(work, Ordering::SeqCst);
                        }
                        return;
                    }
                    work = work.wrapping_add(workers);
                    tried += 1;
                    if tried % CANCEL_CHECK_INTERVAL == 0
                        && (found.load(Ordering::Relaxed) || cancel.load(Ordering::Relaxed))
                    {
                        return;
                    }
                }
            });
        }
    });

    found.load(Ordering::SeqCst).then(|| nonce.load(Ordering::SeqCst))
}

/// A remote work generator, usually the node's `work_generate`
#[async_trait]
pub trait RemoteWorkSource: Send + Sync {
    async fn generate(&self, root: &BlockHash, threshold: u64) -> WalletResult<u64>;
}

#[async_trait]
impl RemoteWorkSource for BackendGateway {
    async fn generate(&self, root: &BlockHash, threshold: u64) -> WalletResult<u64> {
        self.work_generate(root, threshold).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "718CC2121C3E641059BC1C2CFC45666C99E8AE922F7A807B7D07B62C995D79E2";

    #[test]
    fn test_known_work_meets_reduced_but_not_full() {
        let root: BlockHash = ROOT.parse().unwrap();
        let thresholds = WorkThresholds::default();
        assert!(is_valid_work(&root, 0x2bf29ef00786a6bc, thresholds.reduced));
        assert!(!is_valid_work(&root, 0x2bf29ef00786a6bc, thresholds.full));
    }

    #[test]
    fn test_generate_local_meets_threshold() {
        let root = BlockHash([3u8; 32]);
        let threshold = 0xff00_0000_0000_0000;
        let work = generate_local(&root, threshold, &AtomicBool::new(false)).unwrap();
        assert!(is_valid_work(&root, work, threshold));
    }

    #[test]
    fn test_generate_local_stops_when_cancelled() {
        let root = BlockHash([4u8; 32]);
        let cancel = AtomicBool::new(false);

        let result = thread::scope(|scope| {
            let search = scope.spawn(|| generate_local(&root, u64::MAX, &cancel));
            thread::sleep(std::time::Duration::from_millis(20));
            cancel.store(true, Ordering::SeqCst);
            search.join().unwrap()
        });
        assert_eq!(result, None);
    }

    #[test]
    fn test_threshold_per_tier() {
        let thresholds = WorkThresholds { full: 10, reduced: 5 };
        assert_eq!(thresholds.for_tier(DifficultyTier::Full), 10);
        assert_eq!(thresholds.for_tier(DifficultyTier::Reduced), 5);
    }
}
