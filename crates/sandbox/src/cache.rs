//! Bounded, sliding-TTL cache of compiled handlers.
//!
//! Entries are keyed by the (scope, name) cache key. The cache is never
//! authoritative: dropping any entry only costs a recompile.
//!
//! Fills are guarded by an invalidation epoch. A caller that misses takes a
//! [`FillTicket`] before reading the source, and [`HandlerCache::set_if_fresh`]
//! refuses the insert if any invalidation happened in between, so a handler
//! compiled from pre-edit content can never land after the edit's
//! invalidation.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default maximum number of cached handlers.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Default sliding time-to-live.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

struct Entry<H> {
    handler: Arc<H>,
    last_access: Instant,
}

struct Inner<H> {
    entries: LruCache<String, Entry<H>>,
    epoch: u64,
}

/// Proof that a fill started at a given invalidation epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket {
    epoch: u64,
}

pub struct HandlerCache<H> {
    inner: Mutex<Inner<H>>,
    ttl: Duration,
}

impl<H> HandlerCache<H> {
    /// Create a cache holding at most `max_entries` handlers (minimum 1).
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                epoch: 0,
            }),
            ttl,
        }
    }

    /// Look up a handler, refreshing its TTL and recency on a hit.
    ///
    /// Expired entries are removed here rather than by a background sweep.
    pub fn get(&self, key: &str) -> Option<Arc<H>> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get_mut(key) {
            None => return None,
            Some(entry) if now.duration_since(entry.last_access) >= self.ttl => true,
            Some(entry) => {
                entry.last_access = now;
                return Some(Arc::clone(&entry.handler));
            }
        };
        if expired {
            inner.entries.pop(key);
        }
        None
    }

    /// Insert unconditionally, evicting the least recently used entry when full.
    pub fn set(&self, key: impl Into<String>, handler: Arc<H>) {
        let mut inner = self.inner.lock();
        inner.entries.put(
            key.into(),
            Entry {
                handler,
                last_access: Instant::now(),
            },
        );
    }

    /// Start a fill. See [`HandlerCache::set_if_fresh`].
    pub fn begin_fill(&self) -> FillTicket {
        FillTicket {
            epoch: self.inner.lock().epoch,
        }
    }

    /// Insert only if no invalidation happened since `ticket` was taken.
    /// Returns whether the handler was stored.
    pub fn set_if_fresh(&self, key: impl Into<String>, handler: Arc<H>, ticket: FillTicket) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != ticket.epoch {
            return false;
        }
        inner.entries.put(
            key.into(),
            Entry {
                handler,
                last_access: Instant::now(),
            },
        );
        true
    }

    /// Drop a key. Every lookup starting after this returns sees the miss.
    pub fn invalidate(&self, key: &str) {
        let mut inner = self.inner.lock();
        inner.entries.pop(key);
        inner.epoch = inner.epoch.wrapping_add(1);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.epoch = inner.epoch.wrapping_add(1);
    }

    /// Number of entries, including expired ones not yet accessed.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<H> Default for HandlerCache<H> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_TTL)
    }
}
