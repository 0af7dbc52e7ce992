//! Proof-of-work cache keyed by work root

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::generator::{generate_local, is_valid_work, RemoteWorkSource, WorkThresholds};
use crate::shared::constants::REMOTE_WORK_TIMEOUT_MS;
use crate::shared::error::WalletError;
use crate::shared::types::{BlockHash, DifficultyTier, WorkSource};
use crate::shared::WalletResult;

type PendingWork = Shared<BoxFuture<'static, Result<u64, WalletError>>>;

/// A cached token and the tier it was generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    pub work: u64,
    pub tier: DifficultyTier,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkSettings {
    pub source: WorkSource,
    pub thresholds: WorkThresholds,
    /// Wall-clock bound on remote generation before falling back to local
    pub remote_timeout: Duration,
}

impl Default for WorkSettings {
    fn default() -> Self {
        Self {
            source: WorkSource::Local,
            thresholds: WorkThresholds::default(),
            remote_timeout: Duration::from_millis(REMOTE_WORK_TIMEOUT_MS),
        }
    }
}

struct InFlight {
    id: u64,
    tier: DifficultyTier,
    future: PendingWork,
    cancel: Arc<AtomicBool>,
}

pub struct WorkCache {
    settings: WorkSettings,
    remote: Option<Arc<dyn RemoteWorkSource>>,
    entries: Mutex<HashMap<BlockHash, WorkItem>>,
    in_flight: Mutex<HashMap<BlockHash, InFlight>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WorkCache {
    pub fn new(settings: WorkSettings, remote: Option<Arc<dyn RemoteWorkSource>>) -> Self {
        Self {
            settings,
            remote,
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn thresholds(&self) -> WorkThresholds {
        self.settings.thresholds
    }

    pub fn peek(&self, root: &BlockHash) -> Option<WorkItem> {
        lock(&self.entries).get(root).copied()
    }

    /// Whether a cached token already satisfies `tier`
    pub fn has(&self, root: &BlockHash, tier: DifficultyTier) -> bool {
        self.peek(root).is_some_and(|item| item.tier.satisfies(tier))
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a known token. A lower tier never replaces a higher one.
    pub fn seed(&self, root: BlockHash, work: u64, tier: DifficultyTier) {
        let mut entries = lock(&self.entries);
        match entries.get(&root) {
            Some(existing) if existing.tier > tier => {}
            _ => {
                entries.insert(root, WorkItem { work, tier });
            }
        }
    }

    /// Evict the entry for a superseded root
    pub fn invalidate(&self, root: &BlockHash) {
        if lock(&self.entries).remove(root).is_some() {
            debug!("Evicted work for {}", root);
        }
        if let Some(pending) = lock(&self.in_flight).remove(root) {
            pending.cancel.store(true, Ordering::SeqCst);
        }
    }

    /// A token meeting `tier` for `root`, generating one if needed.
    /// Concurrent requests for the same root share one generation.
    pub async fn get(&self, root: BlockHash, tier: DifficultyTier) -> WalletResult<u64> {
        if let Some(item) = self.peek(&root) {
            if item.tier.satisfies(tier) {
                return Ok(item.work);
            }
            debug!("Upgrading {:?} work for {} to {:?}", item.tier, root, tier);
        }

        let (id, generated_tier, future) = self.join_or_start(root, tier);
        let result = future.await;

        let mut in_flight = lock(&self.in_flight);
        if in_flight.get(&root).map(|pending| pending.id) == Some(id) {
            in_flight.remove(&root);
            drop(in_flight);
            if let Ok(work) = result {
                self.seed(root, work, generated_tier);
            }
        }
        result
    }

    fn join_or_start(&self, root: BlockHash, tier: DifficultyTier) -> (u64, DifficultyTier, PendingWork) {
        let mut in_flight = lock(&self.in_flight);
        if let Some(pending) = in_flight.get(&root) {
            if pending.tier.satisfies(tier) {
                return (pending.id, pending.tier, pending.future.clone());
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let threshold = self.settings.thresholds.for_tier(tier);
        let cancel = Arc::new(AtomicBool::new(false));
        let future = generate_work(
            root,
            threshold,
            self.settings.source,
            self.remote.clone(),
            self.settings.remote_timeout,
            cancel.clone(),
        )
        .boxed()
        .shared();
        in_flight.insert(root, InFlight { id, tier, future: future.clone(), cancel });
        (id, tier, future)
    }

    /// Start generating in the background unless a satisfying token exists
    pub fn precompute(self: &Arc<Self>, root: BlockHash, tier: DifficultyTier) {
        if self.has(&root, tier) {
            return;
        }
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            match cache.get(root, tier).await {
                Ok(_) => {}
                Err(WalletError::StaleContext(_)) => debug!("Work precomputation for {} cancelled", root),
                Err(e) => warn!("Work precomputation for {} failed: {}", root, e),
            }
        });
    }
}

async fn generate_work(
    root: BlockHash,
    threshold: u64,
    source: WorkSource,
    remote: Option<Arc<dyn RemoteWorkSource>>,
    timeout: Duration,
    cancel: Arc<AtomicBool>,
) -> WalletResult<u64> {
    if let (WorkSource::Node, Some(remote)) = (source, remote) {
        match tokio::time::timeout(timeout, remote.generate(&root, threshold)).await {
            Ok(Ok(work)) if is_valid_work(&root, work, threshold) => return Ok(work),
            Ok(Ok(work)) => warn!("Remote work {:016x} for {} is below threshold", work, root),
            Ok(Err(e)) => warn!("Remote work generation for {} failed: {}", root, e),
            Err(_) => warn!("Remote work generation for {} timed out after {:?}", root, timeout),
        }
        info!("Falling back to local work generation for {}", root);
    }

    tokio::task::spawn_blocking(move || generate_local(&root, threshold, &cancel))
        .await?
        .ok_or_else(|| WalletError::stale(format!("Work root {} was superseded", root)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    const TEST_THRESHOLDS: WorkThresholds = WorkThresholds {
        full: 0xf000_0000_0000_0000,
        reduced: 0xc000_0000_0000_0000,
    };

    struct CountingRemote {
        calls: AtomicUsize,
        delay: Duration,
        fixed: Option<u64>,
    }

    impl CountingRemote {
        fn new(delay: Duration, fixed: Option<u64>) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), delay, fixed })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteWorkSource for CountingRemote {
        async fn generate(&self, root: &BlockHash, threshold: u64) -> WalletResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self
                .fixed
                .unwrap_or_else(|| generate_local(root, threshold, &AtomicBool::new(false)).unwrap()))
        }
    }

    fn local_cache() -> WorkCache {
        WorkCache::new(
            WorkSettings { source: WorkSource::Local, thresholds: TEST_THRESHOLDS, ..WorkSettings::default() },
            None,
        )
    }

    fn remote_cache(remote: Arc<CountingRemote>, timeout: Duration) -> WorkCache {
        WorkCache::new(
            WorkSettings { source: WorkSource::Node, thresholds: TEST_THRESHOLDS, remote_timeout: timeout },
            Some(remote),
        )
    }

    #[tokio::test]
    async fn test_full_token_satisfies_reduced_request() {
        let cache = local_cache();
        let root = BlockHash([1u8; 32]);
        cache.seed(root, 77, DifficultyTier::Full);

        assert_eq!(cache.get(root, DifficultyTier::Reduced).await.unwrap(), 77);
        assert_eq!(cache.peek(&root), Some(WorkItem { work: 77, tier: DifficultyTier::Full }));
    }

    #[tokio::test]
    async fn test_reduced_token_is_regenerated_for_full_request() {
        let cache = local_cache();
        let root = BlockHash([2u8; 32]);
        cache.seed(root, 77, DifficultyTier::Reduced);
        assert!(!cache.has(&root, DifficultyTier::Full));

        let work = cache.get(root, DifficultyTier::Full).await.unwrap();
        assert!(is_valid_work(&root, work, TEST_THRESHOLDS.full));
        assert_eq!(cache.peek(&root).unwrap().tier, DifficultyTier::Full);
    }

    #[tokio::test]
    async fn test_seed_never_downgrades() {
        let cache = local_cache();
        let root = BlockHash([3u8; 32]);
        cache.seed(root, 1, DifficultyTier::Full);
        cache.seed(root, 2, DifficultyTier::Reduced);
        assert_eq!(cache.peek(&root).unwrap().work, 1);
    }

    #[tokio::test]
    async fn test_invalidate_evicts() {
        let cache = local_cache();
        let root = BlockHash([4u8; 32]);
        cache.seed(root, 1, DifficultyTier::Full);
        cache.invalidate(&root);
        assert!(cache.peek(&root).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_generation() {
        let remote = CountingRemote::new(Duration::from_millis(100), None);
        let cache = remote_cache(remote.clone(), Duration::from_secs(5));
        let root = BlockHash([5u8; 32]);

        let (a, b) = tokio::join!(
            cache.get(root, DifficultyTier::Full),
            cache.get(root, DifficultyTier::Reduced)
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(remote.calls(), 1);
        assert!(cache.has(&root, DifficultyTier::Full));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_timeout_falls_back_to_local() {
        let remote = CountingRemote::new(Duration::from_secs(60), None);
        let cache = remote_cache(remote.clone(), Duration::from_secs(1));
        let root = BlockHash([6u8; 32]);

        let work = cache.get(root, DifficultyTier::Reduced).await.unwrap();
        assert!(is_valid_work(&root, work, TEST_THRESHOLDS.reduced));
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_remote_work_falls_back_to_local() {
        let root = BlockHash([7u8; 32]);
        let bad = (0u64..)
            .find(|w| !is_valid_work(&root, *w, TEST_THRESHOLDS.full))
            .unwrap();
        let remote = CountingRemote::new(Duration::ZERO, Some(bad));
        let cache = remote_cache(remote, Duration::from_secs(5));

        let work = cache.get(root, DifficultyTier::Full).await.unwrap();
        assert_ne!(work, bad);
        assert!(is_valid_work(&root, work, TEST_THRESHOLDS.full));
    }

    #[tokio::test]
    async fn test_precompute_then_get_reuses_generation() {
        let remote = CountingRemote::new(Duration::from_millis(20), None);
        let cache = Arc::new(remote_cache(remote.clone(), Duration::from_secs(5)));
        let root = BlockHash([8u8; 32]);

        cache.precompute(root, DifficultyTier::Full);
        tokio::task::yield_now().await;
        cache.get(root, DifficultyTier::Full).await.unwrap();
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_cancels_running_generation() {
        let cache = Arc::new(WorkCache::new(
            WorkSettings {
                source: WorkSource::Local,
                thresholds: WorkThresholds { full: u64::MAX, reduced: u64::MAX },
                ..WorkSettings::default()
            },
            None,
        ));
        let root = BlockHash([9u8; 32]);

        let pending = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get(root, DifficultyTier::Full).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.invalidate(&root);

        let result = tokio::time::timeout(Duration::from_secs(5), pending).await.unwrap().unwrap();
        assert!(matches!(result, Err(WalletError::StaleContext(_))));
        assert!(cache.peek(&root).is_none());
    }
}
