use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::ordering::order;
use crate::domain::entities::ReceivableBlock;
use crate::shared::constants::{MAX_RECEIVE_ATTEMPTS, RECEIVE_BATCH_DELAY_MS};
use crate::shared::error::WalletError;
use crate::shared::types::{BlockHash, ReceivePolicy};
use crate::shared::utils::FlagGuard;
use crate::shared::WalletResult;

/// What the queue needs from its owner to claim a transfer
#[async_trait]
pub trait ReceiveContext: Send + Sync {
    fn policy(&self) -> ReceivePolicy;

    /// Checkpoint before each submission: destination still held, wallet unlocked
    fn can_receive(&self, entry: &ReceivableBlock) -> bool;

    /// Build and submit the receive (or open) block for `entry`
    async fn receive(&self, entry: &ReceivableBlock) -> WalletResult<BlockHash>;
}

/// How a `process` call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueRun {
    /// Another run was already active
    Busy,
    /// Nothing eligible: empty, locked, suspended or manual policy
    Idle,
    Drained { received: Vec<BlockHash> },
    /// A submission failed; processing resumes on the next trigger
    Halted { received: Vec<BlockHash>, error: WalletError },
    /// A hardware signer denied; nothing runs until `resume`
    Suspended { received: Vec<BlockHash> },
    /// The account or wallet changed underneath the run
    Aborted { received: Vec<BlockHash> },
}

impl QueueRun {
    pub fn received(&self) -> &[BlockHash] {
        match self {
            QueueRun::Drained { received }
            | QueueRun::Halted { received, .. }
            | QueueRun::Suspended { received }
            | QueueRun::Aborted { received } => received,
            QueueRun::Busy | QueueRun::Idle => &[],
        }
    }
}

#[derive(Debug, Clone)]
struct QueuedReceivable {
    block: ReceivableBlock,
    failures: u32,
}

impl QueuedReceivable {
    fn parked(&self) -> bool {
        self.failures >= MAX_RECEIVE_ATTEMPTS
    }
}

pub struct ReceivableQueue {
    entries: Mutex<HashMap<BlockHash, QueuedReceivable>>,
    next_sequence: AtomicU64,
    in_progress: AtomicBool,
    suspended: AtomicBool,
    batch_delay: Duration,
}

impl Default for ReceivableQueue {
    fn default() -> Self {
        Self::new(Duration::from_millis(RECEIVE_BATCH_DELAY_MS))
    }
}

impl ReceivableQueue {
    pub fn new(batch_delay: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_sequence: AtomicU64::new(0),
            in_progress: AtomicBool::new(false),
            suspended: AtomicBool::new(false),
            batch_delay,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<BlockHash, QueuedReceivable>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a receivable unless its hash is already queued. Returns whether
    /// it was new.
    pub fn insert(&self, mut block: ReceivableBlock) -> bool {
        let mut entries = self.entries();
        if entries.contains_key(&block.hash) {
            return false;
        }
        block.sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        entries.insert(block.hash, QueuedReceivable { block, failures: 0 });
        true
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.entries().contains_key(hash)
    }

    pub fn get(&self, hash: &BlockHash) -> Option<ReceivableBlock> {
        self.entries().get(hash).map(|entry| entry.block.clone())
    }

    pub fn remove(&self, hash: &BlockHash) -> Option<ReceivableBlock> {
        self.entries().remove(hash).map(|entry| entry.block)
    }

    /// Drop every receivable destined to `address`
    pub fn remove_account(&self, address: &str) -> Vec<ReceivableBlock> {
        let mut entries = self.entries();
        let hashes: Vec<BlockHash> = entries
            .values()
            .filter(|entry| entry.block.destination == address)
            .map(|entry| entry.block.hash)
            .collect();
        hashes
            .iter()
            .filter_map(|hash| entries.remove(hash))
            .map(|entry| entry.block)
            .collect()
    }

    /// Keep only the receivables `keep` accepts; returns the dropped ones
    pub fn retain(&self, mut keep: impl FnMut(&ReceivableBlock) -> bool) -> Vec<ReceivableBlock> {
        let mut dropped = Vec::new();
        self.entries().retain(|_, entry| {
            let kept = keep(&entry.block);
            if !kept {
                dropped.push(entry.block.clone());
            }
            kept
        });
        dropped
    }

    /// All receivables in processing order for `policy`
    pub fn pending(&self, policy: ReceivePolicy) -> Vec<ReceivableBlock> {
        let blocks = self.entries().values().map(|entry| entry.block.clone()).collect();
        order(policy, blocks)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Entries that failed too often and wait for an explicit receive
    pub fn is_parked(&self, hash: &BlockHash) -> bool {
        self.entries().get(hash).is_some_and(QueuedReceivable::parked)
    }

    pub fn record_failure(&self, hash: &BlockHash) {
        if let Some(entry) = self.entries().get_mut(hash) {
            entry.failures += 1;
            if entry.parked() {
                warn!("Receivable {} parked after {} failed attempts", hash, entry.failures);
            }
        }
    }

    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        if self.suspended.swap(false, Ordering::SeqCst) {
            info!("Receivable queue resumed");
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    fn next_candidate(&self, ctx: &dyn ReceiveContext) -> Option<ReceivableBlock> {
        let eligible: Vec<ReceivableBlock> = self
            .entries()
            .values()
            .filter(|entry| !entry.parked())
            .map(|entry| entry.block.clone())
            .collect();
        order(ctx.policy(), eligible)
            .into_iter()
            .find(|block| ctx.can_receive(block))
    }

    /// Claim eligible receivables one at a time until none is left or a
    /// submission fails. At most one run is active; a concurrent call
    /// returns `Busy` immediately.
    pub async fn process(&self, ctx: &dyn ReceiveContext) -> QueueRun {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            return QueueRun::Busy;
        }
        let _guard = FlagGuard(&self.in_progress);

        let mut received = Vec::new();
        loop {
            if ctx.policy() == ReceivePolicy::Manual {
                break;
            }
            if self.is_suspended() {
                return QueueRun::Suspended { received };
            }
            let Some(candidate) = self.next_candidate(ctx) else {
                break;
            };

            debug!("Receiving {} for {}", candidate.hash, candidate.destination);
            match ctx.receive(&candidate).await {
                Ok(hash) => {
                    self.remove(&candidate.hash);
                    received.push(hash);
                    tokio::time::sleep(self.batch_delay).await;
                }
                Err(WalletError::SigningDenied(index)) => {
                    warn!("Receiving suspended: signing denied for index {}", index);
                    self.suspend();
                    return QueueRun::Suspended { received };
                }
                Err(WalletError::StaleContext(reason)) => {
                    debug!("Receive run aborted: {}", reason);
                    return QueueRun::Aborted { received };
                }
                Err(error) => {
                    warn!("Receiving {} failed: {}", candidate.hash, error);
                    self.record_failure(&candidate.hash);
                    return QueueRun::Halted { received, error };
                }
            }
        }

        if received.is_empty() {
            QueueRun::Idle
        } else {
            QueueRun::Drained { received }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::Raw;
    use std::collections::HashSet;

    fn entry(n: u8, destination: &str, amount: Raw) -> ReceivableBlock {
        ReceivableBlock::new(BlockHash([n; 32]), destination.into(), amount, "nano_src".into())
    }

    #[derive(Default)]
    struct FakeContext {
        policy: Mutex<ReceivePolicy>,
        locked: AtomicBool,
        failing: Mutex<HashMap<BlockHash, WalletError>>,
        received: Mutex<Vec<BlockHash>>,
        latency: Duration,
    }

    impl FakeContext {
        fn fail(&self, hash: BlockHash, error: WalletError) {
            self.failing.lock().unwrap().insert(hash, error);
        }

        fn received(&self) -> Vec<BlockHash> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReceiveContext for FakeContext {
        fn policy(&self) -> ReceivePolicy {
            *self.policy.lock().unwrap()
        }

        fn can_receive(&self, _entry: &ReceivableBlock) -> bool {
            !self.locked.load(Ordering::SeqCst)
        }

        async fn receive(&self, entry: &ReceivableBlock) -> WalletResult<BlockHash> {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if let Some(error) = self.failing.lock().unwrap().get(&entry.hash) {
                return Err(error.clone());
            }
            self.received.lock().unwrap().push(entry.hash);
            Ok(entry.hash)
        }
    }

    fn queue_with(entries: &[ReceivableBlock]) -> ReceivableQueue {
        let queue = ReceivableQueue::new(Duration::ZERO);
        for entry in entries {
            queue.insert(entry.clone());
        }
        queue
    }

    #[test]
    fn test_insert_deduplicates_and_assigns_sequence() {
        let queue = queue_with(&[entry(1, "a", 5)]);
        assert!(!queue.insert(entry(1, "a", 5)));
        assert!(queue.insert(entry(2, "a", 5)));
        assert_eq!(queue.get(&BlockHash([2u8; 32])).unwrap().sequence, 1);
    }

    #[test]
    fn test_remove_account_drops_its_entries() {
        let queue = queue_with(&[entry(1, "a", 5), entry(2, "b", 5), entry(3, "a", 1)]);
        let removed: HashSet<BlockHash> = queue.remove_account("a").into_iter().map(|b| b.hash).collect();
        assert_eq!(removed.len(), 2);
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(&BlockHash([2u8; 32])));
    }

    #[tokio::test]
    async fn test_drains_largest_first() {
        let queue = queue_with(&[entry(1, "a", 5), entry(2, "a", 1), entry(3, "a", 3)]);
        let ctx = FakeContext::default();

        let run = queue.process(&ctx).await;

        let expected = vec![BlockHash([1u8; 32]), BlockHash([3u8; 32]), BlockHash([2u8; 32])];
        assert_eq!(run, QueueRun::Drained { received: expected.clone() });
        assert_eq!(ctx.received(), expected);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_manual_policy_and_locked_wallet_are_noops() {
        let queue = queue_with(&[entry(1, "a", 5)]);

        let manual = FakeContext { policy: Mutex::new(ReceivePolicy::Manual), ..FakeContext::default() };
        assert_eq!(queue.process(&manual).await, QueueRun::Idle);

        let locked = FakeContext::default();
        locked.locked.store(true, Ordering::SeqCst);
        assert_eq!(queue.process(&locked).await, QueueRun::Idle);

        assert_eq!(queue.len(), 1);
        assert!(manual.received().is_empty() && locked.received().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_run_is_busy() {
        let queue = queue_with(&[entry(1, "a", 5)]);
        let ctx = FakeContext { latency: Duration::from_millis(50), ..FakeContext::default() };

        let (first, second) = tokio::join!(queue.process(&ctx), queue.process(&ctx));

        assert_eq!(first.received().len(), 1);
        assert_eq!(second, QueueRun::Busy);
        assert!(!queue.is_running());
    }

    #[tokio::test]
    async fn test_denial_suspends_until_resume() {
        let queue = queue_with(&[entry(1, "a", 5), entry(2, "a", 1)]);
        let ctx = FakeContext::default();
        ctx.fail(BlockHash([1u8; 32]), WalletError::SigningDenied(0));

        assert_eq!(queue.process(&ctx).await, QueueRun::Suspended { received: vec![] });
        assert!(queue.is_suspended());
        assert_eq!(queue.process(&ctx).await, QueueRun::Suspended { received: vec![] });
        assert_eq!(queue.len(), 2);

        ctx.failing.lock().unwrap().clear();
        queue.resume();
        assert_eq!(queue.process(&ctx).await.received().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_halts_and_parks_after_max_attempts() {
        let queue = queue_with(&[entry(1, "a", 5), entry(2, "a", 1)]);
        let ctx = FakeContext::default();
        let failing = BlockHash([1u8; 32]);
        ctx.fail(failing, WalletError::network("node down"));

        for _ in 0..MAX_RECEIVE_ATTEMPTS {
            let run = queue.process(&ctx).await;
            assert!(matches!(run, QueueRun::Halted { ref received, .. } if received.is_empty()));
        }
        assert!(queue.is_parked(&failing));

        // The parked entry is skipped; the next one still goes through
        assert_eq!(queue.process(&ctx).await, QueueRun::Drained { received: vec![BlockHash([2u8; 32])] });
        assert!(queue.contains(&failing));
    }

    #[tokio::test]
    async fn test_stale_context_aborts() {
        let queue = queue_with(&[entry(1, "a", 5)]);
        let ctx = FakeContext::default();
        ctx.fail(BlockHash([1u8; 32]), WalletError::stale("account removed"));

        assert_eq!(queue.process(&ctx).await, QueueRun::Aborted { received: vec![] });
        assert!(!queue.is_parked(&BlockHash([1u8; 32])));
    }
}
