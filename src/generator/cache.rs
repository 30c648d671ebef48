// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Time-boxed statement template cache.
//!
//! Entries expire after a sliding window without access. A miss builds the
//! template under the write lock after re-checking, so concurrent first
//! access constructs each key at most once per window.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering}
    },
    time::{Duration, Instant}
};

use parking_lot::RwLock;
use tracing::debug;

use super::Operation;
use crate::{error::Result, sql::SqlStatement};

type Key = (&'static str, Operation);

#[derive(Debug)]
struct Entry {
    statement:   Arc<SqlStatement>,
    last_access: AtomicU64
}

/// Shared cache of generated statements keyed by entity identity and
/// operation.
#[derive(Debug)]
pub struct TemplateCache {
    entries:    RwLock<HashMap<Key, Entry>>,
    expiration: Duration,
    epoch:      Instant
}

impl TemplateCache {
    /// Create a cache whose entries live `expiration` past their last use.
    pub fn new(expiration: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            expiration,
            epoch: Instant::now()
        }
    }

    /// Cached template for `key`, built with `build` on a miss.
    ///
    /// A failing build leaves the cache unchanged.
    pub fn get_or_try_insert<F>(
        &self,
        entity: &'static str,
        operation: Operation,
        build: F
    ) -> Result<Arc<SqlStatement>>
    where
        F: FnOnce() -> Result<SqlStatement>
    {
        let key = (entity, operation);
        let now = self.now();

        if let Some(entry) = self.entries.read().get(&key)
            && !self.is_expired(entry, now)
        {
            entry.last_access.store(now, Ordering::Relaxed);
            return Ok(Arc::clone(&entry.statement));
        }

        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(&key)
            && !self.is_expired(entry, now)
        {
            entry.last_access.store(now, Ordering::Relaxed);
            return Ok(Arc::clone(&entry.statement));
        }

        entries.retain(|_, entry| !self.is_expired(entry, now));
        debug!(entity, operation = operation.as_str(), "building statement template");
        let statement = Arc::new(build()?);
        entries.insert(
            key,
            Entry {
                statement:   Arc::clone(&statement),
                last_access: AtomicU64::new(now)
            }
        );
        Ok(statement)
    }

    /// Number of live and not yet evicted entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn now(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn is_expired(&self, entry: &Entry, now: u64) -> bool {
        let idle = now.saturating_sub(entry.last_access.load(Ordering::Relaxed));
        u128::from(idle) > self.expiration.as_millis()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::sql::SqlBuffer;

    fn statement(text: &str) -> SqlStatement {
        let mut buf = SqlBuffer::new();
        buf.push(text);
        buf.build()
    }

    #[test]
    fn second_lookup_hits() {
        let cache = TemplateCache::new(Duration::from_secs(60));
        let builds = AtomicUsize::new(0);
        for _ in 0..3 {
            let stmt = cache
                .get_or_try_insert("Article", Operation::Create, || {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(statement("INSERT"))
                })
                .unwrap();
            assert_eq!(stmt.text(), "INSERT");
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn operations_are_separate_keys() {
        let cache = TemplateCache::new(Duration::from_secs(60));
        cache
            .get_or_try_insert("Article", Operation::Create, || Ok(statement("a")))
            .unwrap();
        cache
            .get_or_try_insert("Article", Operation::Delete, || Ok(statement("b")))
            .unwrap();
        cache
            .get_or_try_insert("Tag", Operation::Create, || Ok(statement("c")))
            .unwrap();
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        let cache = TemplateCache::new(Duration::from_secs(60));
        let builds = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    cache
                        .get_or_try_insert("Article", Operation::Update, || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(5));
                            Ok(statement("UPDATE"))
                        })
                        .unwrap();
                });
            }
        });
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn idle_entries_expire() {
        let cache = TemplateCache::new(Duration::from_millis(1));
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(statement("SELECT"))
        };
        cache
            .get_or_try_insert("Article", Operation::Find, build)
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        cache
            .get_or_try_insert("Article", Operation::Find, build)
            .unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_build_is_not_cached() {
        let cache = TemplateCache::new(Duration::from_secs(60));
        let err = cache
            .get_or_try_insert("Article", Operation::Update, || {
                Err(crate::Error::argument("entity", "no key"))
            })
            .unwrap_err();
        assert!(err.is_argument());
        assert!(cache.is_empty());
    }
}
