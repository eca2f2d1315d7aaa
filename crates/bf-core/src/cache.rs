use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

use crate::domain::Query;

#[derive(Clone, Copy, Debug)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_entries: 100,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub links: Vec<String>,
    pub created_at: Instant,
    // Insertion order, breaks ties between entries written at the same instant.
    seq: u64,
}

/// Time- and size-bounded result store keyed by query pair.
///
/// Only non-empty results are stored: a missing key is the single signal for
/// "must fetch".
#[derive(Debug)]
pub struct ResultCache {
    settings: CacheSettings,
    entries: Mutex<HashMap<Query, CacheEntry>>,
    next_seq: AtomicU64,
}

impl ResultCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            entries: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, query: &Query) -> Option<CacheEntry> {
        self.get_at(query, Instant::now()).await
    }

    pub async fn get_at(&self, query: &Query, now: Instant) -> Option<CacheEntry> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(query)?;
        if self.is_expired(entry, now) {
            entries.remove(query);
            return None;
        }
        Some(entry.clone())
    }

    pub async fn put(&self, query: Query, links: Vec<String>) {
        self.put_at(query, links, Instant::now()).await
    }

    pub async fn put_at(&self, query: Query, links: Vec<String>, now: Instant) {
        let mut entries = self.entries.lock().await;

        entries.retain(|_, e| !self.is_expired(e, now));

        if links.is_empty() {
            entries.remove(&query);
            return;
        }

        entries.insert(
            query,
            CacheEntry {
                links,
                created_at: now,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            },
        );

        let overflow = entries.len().saturating_sub(self.settings.max_entries);
        if overflow > 0 {
            let mut by_age: Vec<(Query, Instant, u64)> = entries
                .iter()
                .map(|(q, e)| (q.clone(), e.created_at, e.seq))
                .collect();
            by_age.sort_by_key(|(_, created_at, seq)| (*created_at, *seq));
            for (q, _, _) in by_age.into_iter().take(overflow) {
                entries.remove(&q);
            }
            tracing::debug!(evicted = overflow, "result cache over capacity");
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) >= self.settings.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(level: &str, cat: &str) -> Query {
        Query::new(level, cat)
    }

    fn links(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("link-{i}")).collect()
    }

    fn cache(ttl_secs: u64, max_entries: usize) -> ResultCache {
        ResultCache::new(CacheSettings {
            ttl: Duration::from_secs(ttl_secs),
            max_entries,
        })
    }

    #[tokio::test]
    async fn hit_within_ttl_and_miss_after() {
        let c = cache(3600, 10);
        let t = Instant::now();
        c.put_at(q("TH16", "War"), links(3), t).await;

        let hit = c.get_at(&q("TH16", "War"), t + Duration::from_secs(3599)).await;
        assert_eq!(hit.unwrap().links, links(3));

        assert!(c.get_at(&q("TH16", "War"), t + Duration::from_secs(3601)).await.is_none());
        // The stale entry is gone, not just hidden.
        assert_eq!(c.len().await, 0);
    }

    #[tokio::test]
    async fn put_replaces_existing_entry() {
        let c = cache(3600, 10);
        let t = Instant::now();
        c.put_at(q("TH16", "War"), links(1), t).await;
        c.put_at(q("TH16", "War"), links(2), t + Duration::from_secs(1)).await;

        let e = c.get_at(&q("TH16", "War"), t + Duration::from_secs(2)).await.unwrap();
        assert_eq!(e.links.len(), 2);
        assert_eq!(e.created_at, t + Duration::from_secs(1));
        assert_eq!(c.len().await, 1);
    }

    #[tokio::test]
    async fn empty_results_are_never_stored() {
        let c = cache(3600, 10);
        let t = Instant::now();
        c.put_at(q("TH15", "CWL"), vec![], t).await;
        assert!(c.get_at(&q("TH15", "CWL"), t).await.is_none());

        c.put_at(q("TH15", "CWL"), links(1), t).await;
        c.put_at(q("TH15", "CWL"), vec![], t).await;
        assert!(c.get_at(&q("TH15", "CWL"), t).await.is_none());
    }

    #[tokio::test]
    async fn capacity_keeps_most_recent_entries() {
        let c = cache(3600, 3);
        let t = Instant::now();
        for i in 0..6u64 {
            c.put_at(q(&format!("TH{i}"), "War"), links(1), t + Duration::from_secs(i))
                .await;
            assert!(c.len().await <= 3);
        }

        let now = t + Duration::from_secs(10);
        for i in 0..3 {
            assert!(c.get_at(&q(&format!("TH{i}"), "War"), now).await.is_none());
        }
        for i in 3..6 {
            assert!(c.get_at(&q(&format!("TH{i}"), "War"), now).await.is_some());
        }
    }

    #[tokio::test]
    async fn same_instant_writes_evict_in_insertion_order() {
        let c = cache(3600, 2);
        let t = Instant::now();
        for i in 0..5 {
            c.put_at(q(&format!("TH{i}"), "CWL"), links(1), t).await;
        }

        assert_eq!(c.len().await, 2);
        for i in 0..3 {
            assert!(c.get_at(&q(&format!("TH{i}"), "CWL"), t).await.is_none());
        }
        assert!(c.get_at(&q("TH3", "CWL"), t).await.is_some());
        assert!(c.get_at(&q("TH4", "CWL"), t).await.is_some());
    }

    #[tokio::test]
    async fn put_purges_expired_entries() {
        let c = cache(10, 100);
        let t = Instant::now();
        c.put_at(q("TH15", "War"), links(1), t).await;
        c.put_at(q("TH16", "War"), links(1), t + Duration::from_secs(11)).await;
        assert_eq!(c.len().await, 1);
    }
}
