//! Short-lived cache of resolved sessions.
//!
//! Entries are keyed by a SHA-256 digest of the session token so raw bearer
//! credentials are never held as map keys. An entry is served only while
//! `now < expires_at`; reaching the expiry turns it into a miss.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::types::Identity;

/// Source of the current Unix time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

type TokenKey = [u8; 32];

fn token_key(token: &str) -> TokenKey {
    Sha256::digest(token.as_bytes()).into()
}

/// A cached resolution result.
#[derive(Debug, Clone)]
pub struct SessionCacheEntry {
    pub identity: Identity,
    /// Exclusive upper bound (Unix timestamp)
    pub expires_at: u64,
}

impl SessionCacheEntry {
    pub fn is_fresh(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

/// Concurrent session cache. Cloning shares the underlying map.
#[derive(Clone)]
pub struct SessionCache {
    entries: Arc<DashMap<TokenKey, SessionCacheEntry>>,
    capacity: usize,
}

impl SessionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// Look up a fresh entry. Stale entries are removed and reported as a miss.
    pub fn get(&self, token: &str, now: u64) -> Option<Identity> {
        let key = token_key(token);
        let fresh = {
            let entry = self.entries.get(&key)?;
            entry.is_fresh(now).then(|| entry.identity.clone())
        };

        if fresh.is_none() {
            self.entries.remove_if(&key, |_, e| !e.is_fresh(now));
        }
        fresh
    }

    /// Insert or replace the entry for `token`. Returns false when the entry
    /// was not stored (already expired, or the cache is full).
    pub fn insert(&self, token: &str, entry: SessionCacheEntry, now: u64) -> bool {
        if !entry.is_fresh(now) || self.capacity == 0 {
            return false;
        }

        let key = token_key(token);
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.purge_expired(now);
            if self.entries.len() >= self.capacity {
                tracing::debug!(capacity = self.capacity, "Session cache full, not caching");
                return false;
            }
        }

        self.entries.insert(key, entry);
        true
    }

    /// Drop the entry for `token`, if any.
    pub fn invalidate(&self, token: &str) -> bool {
        self.entries.remove(&token_key(token)).is_some()
    }

    /// Remove every entry.
    pub fn flush(&self) {
        self.entries.clear();
    }

    /// Remove entries that are no longer fresh. Returns the number removed.
    pub fn purge_expired(&self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
