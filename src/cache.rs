use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::provider::PriceProvider;
use crate::series::TimeSeriesTable;
use crate::types::DateRange;

/// Symbol order is part of the key: it fixes the table's column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbols: Vec<String>,
    pub range: DateRange,
}

impl CacheKey {
    pub fn new(symbols: &[String], range: DateRange) -> Self {
        Self {
            symbols: symbols.to_vec(),
            range,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    table: Arc<TimeSeriesTable>,
    fetched_at: Instant,
}

/// Fetched tables keyed by (symbols, date range), expiring after a fixed TTL.
/// Shared across request handlers; each cycle still works on its own immutable snapshot.
pub struct SeriesCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl SeriesCache {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            ttl,
        })
    }

    /// A live entry for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<TimeSeriesTable>> {
        let entry = self.entries.get(key)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(Arc::clone(&entry.table))
        } else {
            None
        }
    }

    pub fn insert(&self, key: CacheKey, table: TimeSeriesTable) -> Arc<TimeSeriesTable> {
        let table = Arc::new(table);
        self.entries.insert(
            key,
            CacheEntry {
                table: Arc::clone(&table),
                fetched_at: Instant::now(),
            },
        );
        table
    }

    /// Cached table for `(symbols, range)`, fetching through `provider` on a miss.
    /// A failed fetch is not cached.
    pub async fn get_or_fetch(
        &self,
        provider: &dyn PriceProvider,
        symbols: &[String],
        range: DateRange,
    ) -> Result<Arc<TimeSeriesTable>> {
        let key = CacheKey::new(symbols, range);
        if let Some(table) = self.get(&key) {
            debug!(symbols = ?symbols, "Series cache hit");
            return Ok(table);
        }

        debug!(symbols = ?symbols, "Series cache miss");
        let table = provider.fetch(symbols, range).await?;
        Ok(self.insert(key, table))
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drops every entry. Returns how many were removed.
    pub fn invalidate_all(&self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Background task that evicts expired cache entries on a fixed interval.
pub struct CacheSweeper {
    cache: Arc<SeriesCache>,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(cache: Arc<SeriesCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub async fn run(self) {
        if self.interval.is_zero() {
            error!("Cache sweeper interval is zero; expired entries will only be skipped, not evicted");
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // consume immediate first tick

        loop {
            ticker.tick().await;
            let evicted = self.cache.evict_expired();
            if evicted > 0 {
                info!("Cache sweeper evicted {evicted} expired tables ({} remain)", self.cache.len());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::series::SymbolSeries;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn new(fail: bool) -> Self {
            Self { calls: AtomicUsize::new(0), fail }
        }
    }

    #[async_trait]
    impl PriceProvider for CountingProvider {
        async fn fetch(&self, symbols: &[String], _range: DateRange) -> Result<TimeSeriesTable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Provider("upstream down".to_string()));
            }
            let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
            let columns = symbols
                .iter()
                .map(|s| SymbolSeries {
                    symbol: s.clone(),
                    adj_close: vec![Some(1.0)],
                    volume: vec![Some(1.0)],
                })
                .collect();
            TimeSeriesTable::new(vec![date], columns)
        }
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap()
    }

    fn syms(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let cache = SeriesCache::new(Duration::from_secs(60));
        let provider = CountingProvider::new(false);

        let a = cache.get_or_fetch(&provider, &syms(&["AAPL"]), range()).await.unwrap();
        let b = cache.get_or_fetch(&provider, &syms(&["AAPL"]), range()).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn symbol_order_is_part_of_the_key() {
        let cache = SeriesCache::new(Duration::from_secs(60));
        let provider = CountingProvider::new(false);

        cache.get_or_fetch(&provider, &syms(&["AAPL", "MSFT"]), range()).await.unwrap();
        let t = cache.get_or_fetch(&provider, &syms(&["MSFT", "AAPL"]), range()).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(t.symbols().collect::<Vec<_>>(), vec!["MSFT", "AAPL"]);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched_and_swept() {
        let cache = SeriesCache::new(Duration::ZERO);
        let provider = CountingProvider::new(false);

        cache.get_or_fetch(&provider, &syms(&["AAPL"]), range()).await.unwrap();
        cache.get_or_fetch(&provider, &syms(&["AAPL"]), range()).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.evict_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = SeriesCache::new(Duration::from_secs(60));
        let provider = CountingProvider::new(true);

        assert!(cache.get_or_fetch(&provider, &syms(&["AAPL"]), range()).await.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalidation_forces_refetch() {
        let cache = SeriesCache::new(Duration::from_secs(60));
        let provider = CountingProvider::new(false);
        let key = CacheKey::new(&syms(&["AAPL"]), range());

        cache.get_or_fetch(&provider, &key.symbols, key.range).await.unwrap();
        assert!(cache.invalidate(&key));
        assert!(!cache.invalidate(&key));
        cache.get_or_fetch(&provider, &key.symbols, key.range).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.invalidate_all(), 1);
    }
}
