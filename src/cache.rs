//! Query cache with a fixed stale-time policy, and the sequencer that keeps
//! out-of-order fetch results from overwriting newer ones.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::errors::AppError;

/// Ticket
///
/// Handed out when a fetch starts; identifies it against later fetches of the
/// same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    key: String,
    seq: u64,
}

/// FetchSequencer
///
/// Latest-wins ordering per key: only the most recently started fetch may
/// apply its result.
#[derive(Debug, Default)]
pub struct FetchSequencer {
    next: AtomicU64,
    latest: Mutex<HashMap<String, u64>>,
}

impl FetchSequencer {
    pub fn begin(&self, key: &str) -> Ticket {
        let seq = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut latest) = self.latest.lock() {
            latest.insert(key.to_string(), seq);
        }
        Ticket {
            key: key.to_string(),
            seq,
        }
    }

    pub fn is_latest(&self, ticket: &Ticket) -> bool {
        match self.latest.lock() {
            Ok(latest) => latest.get(&ticket.key) == Some(&ticket.seq),
            Err(_) => false,
        }
    }
}

struct Entry<T> {
    value: T,
    fetched_at: Instant,
}

/// QueryCache
///
/// Results are served from cache while younger than `stale_time`. Failures
/// are never cached and never retried; a caller that wants fresh data asks
/// for a refetch.
pub struct QueryCache<T> {
    stale_time: Duration,
    entries: RwLock<HashMap<String, Entry<T>>>,
    sequencer: FetchSequencer,
}

impl<T: Clone + Send + Sync> QueryCache<T> {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            stale_time,
            entries: RwLock::new(HashMap::new()),
            sequencer: FetchSequencer::default(),
        }
    }

    async fn fresh(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < self.stale_time)
            .map(|entry| entry.value.clone())
    }

    /// fetch
    ///
    /// Returns the cached value for `key` when fresh (unless `refetch`),
    /// otherwise runs `fetcher`. The result always goes back to this caller,
    /// but it is only stored if no newer fetch of the key started meanwhile.
    pub async fn fetch<F, Fut>(&self, key: &str, refetch: bool, fetcher: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if !refetch {
            if let Some(value) = self.fresh(key).await {
                tracing::trace!(key, "query cache hit");
                return Ok(value);
            }
        }

        let ticket = self.sequencer.begin(key);
        let value = fetcher().await?;

        if self.sequencer.is_latest(&ticket) {
            self.entries.write().await.insert(
                key.to_string(),
                Entry {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                },
            );
        } else {
            tracing::debug!(key, "discarding result of superseded fetch");
        }
        Ok(value)
    }
}
