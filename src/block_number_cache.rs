use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::chain::ChainReader;
use crate::error::CouncilError;

/// Current block number, refreshed at most once per interval.
///
/// Used to decide whether a proposal's voting window is still open without an
/// `eth_blockNumber` round trip per proposal.
pub struct BlockNumberCache {
    current_block: Arc<AtomicU64>,
    last_update: Arc<Mutex<Option<Instant>>>,
    update_interval: Duration,
    reader: Arc<dyn ChainReader>,
}

impl BlockNumberCache {
    pub fn new(reader: Arc<dyn ChainReader>, update_interval: Duration) -> Self {
        Self {
            current_block: Arc::new(AtomicU64::new(0)),
            last_update: Arc::new(Mutex::new(None)),
            update_interval,
            reader,
        }
    }

    /// Get current block number (cached, updates at most once per interval)
    ///
    /// On a failed refresh the last known block is returned; the call only
    /// fails when no block has ever been read.
    pub async fn get_current_block(&self) -> Result<u64, CouncilError> {
        let now = Instant::now();
        let mut last_update = self.last_update.lock().await;

        if let Some(at) = *last_update {
            if now.duration_since(at) < self.update_interval {
                let cached = self.current_block.load(Ordering::Relaxed);
                debug!("BlockNumberCache: Using cached block {}", cached);
                return Ok(cached);
            }
        }

        debug!("BlockNumberCache: Fetching new block number (cache stale or empty)");
        match self.reader.block_number().await {
            Ok(block) => {
                self.current_block.store(block, Ordering::Relaxed);
                *last_update = Some(now);
                debug!("BlockNumberCache: Updated to block {}", block);
                Ok(block)
            }
            Err(e) => self.fall_back(e, last_update.is_some()),
        }
    }

    /// Refreshes regardless of the interval, e.g. right after a transaction was mined.
    pub async fn force_update(&self) -> Result<u64, CouncilError> {
        debug!("BlockNumberCache: Force updating block number");
        let mut last_update = self.last_update.lock().await;
        match self.reader.block_number().await {
            Ok(block) => {
                self.current_block.store(block, Ordering::Relaxed);
                *last_update = Some(Instant::now());
                debug!("BlockNumberCache: Force updated to block {}", block);
                Ok(block)
            }
            Err(e) => self.fall_back(e, last_update.is_some()),
        }
    }

    /// Get cached block number without triggering update
    /// Returns 0 if cache is empty
    pub fn get_cached(&self) -> u64 {
        self.current_block.load(Ordering::Relaxed)
    }

    /// Records a block number learned elsewhere (e.g. a receipt). Never moves backwards.
    pub fn update_from_external(&self, block_number: u64) {
        let previous = self.current_block.fetch_max(block_number, Ordering::Relaxed);
        if block_number > previous {
            debug!("BlockNumberCache: Updated from external source to block {}", block_number);
        }
    }

    fn fall_back(&self, error: CouncilError, has_value: bool) -> Result<u64, CouncilError> {
        if has_value {
            let cached = self.current_block.load(Ordering::Relaxed);
            warn!("BlockNumberCache: Failed to fetch block number, using cached value {}: {}", cached, error);
            Ok(cached)
        } else {
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ethers::types::{Address, Bytes, Filter, Log};
    use std::sync::atomic::AtomicBool;

    struct Blocks {
        next: AtomicU64,
        calls: AtomicU64,
        failing: AtomicBool,
    }

    #[async_trait]
    impl ChainReader for Blocks {
        async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, CouncilError> {
            unimplemented!()
        }

        async fn get_logs(&self, _filter: &Filter) -> Result<Vec<Log>, CouncilError> {
            unimplemented!()
        }

        async fn block_number(&self) -> Result<u64, CouncilError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(CouncilError::Transport("down".into()));
            }
            Ok(self.next.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn blocks(start: u64) -> Arc<Blocks> {
        Arc::new(Blocks {
            next: AtomicU64::new(start),
            calls: AtomicU64::new(0),
            failing: AtomicBool::new(false),
        })
    }

    #[tokio::test]
    async fn test_cache_freshness() {
        let chain = blocks(100);
        let cache = BlockNumberCache::new(chain.clone(), Duration::from_secs(60));

        assert_eq!(cache.get_current_block().await.unwrap(), 100);
        assert_eq!(cache.get_current_block().await.unwrap(), 100);
        assert_eq!(chain.calls.load(Ordering::SeqCst), 1);

        assert_eq!(cache.force_update().await.unwrap(), 101);
        assert_eq!(cache.get_cached(), 101);
    }

    #[tokio::test]
    async fn stale_cache_refetches() {
        let chain = blocks(7);
        let cache = BlockNumberCache::new(chain.clone(), Duration::ZERO);

        assert_eq!(cache.get_current_block().await.unwrap(), 7);
        assert_eq!(cache.get_current_block().await.unwrap(), 8);
        assert_eq!(chain.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_falls_back_to_last_block() {
        let chain = blocks(42);
        let cache = BlockNumberCache::new(chain.clone(), Duration::ZERO);

        chain.failing.store(true, Ordering::SeqCst);
        assert!(cache.get_current_block().await.is_err());

        chain.failing.store(false, Ordering::SeqCst);
        assert_eq!(cache.get_current_block().await.unwrap(), 42);

        chain.failing.store(true, Ordering::SeqCst);
        assert_eq!(cache.get_current_block().await.unwrap(), 42);
    }

    #[test]
    fn external_updates_never_go_backwards() {
        let cache = BlockNumberCache::new(blocks(0), Duration::from_secs(1));
        cache.update_from_external(10);
        cache.update_from_external(5);
        assert_eq!(cache.get_cached(), 10);
    }
}
