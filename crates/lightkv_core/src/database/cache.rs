//! Environment-wide database handle cache.

use crate::config::DatabaseConfig;
use crate::error::{CoreResult, StatusExt};
use dashmap::DashMap;
use lightkv_engine::{DbHandle, Engine, EnvHandle, TxnHandle};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    handle: DbHandle,
    config: DatabaseConfig,
}

/// Caches one database handle per name and tracks every handle still open.
///
/// The engine binds at most one handle per name at a time and opening is
/// itself transactional, so handles are reused across transactions.
///
/// ## Locking
///
/// - Lookups that hit a compatible entry only touch the concurrent map
/// - Opens, closes and flag-mismatch replacements are serialized by the
///   reuse-set lock, which also guards the "still open?" check before an
///   engine close
///
/// ## Replacement
///
/// When a name is reopened with a different configuration the entry is
/// swapped under the lock. Lookups after the swap see the new handle; the
/// previous handle stays open for its in-flight users until it is closed
/// explicitly or the environment is torn down.
pub(crate) struct DatabaseCache {
    engine: Arc<dyn Engine>,
    env: EnvHandle,
    entries: DashMap<Option<String>, CacheEntry>,
    reuse: Mutex<HashSet<DbHandle>>,
}

impl DatabaseCache {
    pub(crate) fn new(engine: Arc<dyn Engine>, env: EnvHandle) -> Self {
        Self {
            engine,
            env,
            entries: DashMap::new(),
            reuse: Mutex::new(HashSet::new()),
        }
    }

    fn cached(&self, name: &Option<String>, config: &DatabaseConfig) -> Option<DbHandle> {
        self.entries
            .get(name)
            .filter(|entry| entry.config == *config)
            .map(|entry| entry.handle)
    }

    /// Looks up or opens the handle for `name` using `txn`.
    ///
    /// The flag is true when the handle was freshly opened by this call.
    pub(crate) fn open_database(
        &self,
        name: Option<&str>,
        txn: TxnHandle,
        config: &DatabaseConfig,
    ) -> CoreResult<(DbHandle, bool)> {
        let key = name.map(str::to_string);
        if let Some(handle) = self.cached(&key, config) {
            return Ok((handle, false));
        }

        let mut reuse = self.reuse.lock();
        if let Some(handle) = self.cached(&key, config) {
            return Ok((handle, false));
        }

        let handle = self
            .engine
            .open_db(txn, name, config.flags)
            .during("open_db")?;
        if config.key_comparator.is_some() || config.dup_comparator.is_some() {
            let registered = self.engine.set_compare(
                txn,
                handle,
                config.key_comparator.map(|c| c.as_fn()),
                config.dup_comparator.map(|c| c.as_fn()),
            );
            if let Err(status) = registered {
                self.engine.close_db(self.env, handle);
                return Err(status).during("set_compare");
            }
        }

        let previous = self.entries.insert(
            key,
            CacheEntry {
                handle,
                config: *config,
            },
        );
        reuse.insert(handle);
        match previous {
            Some(old) => debug!(
                database = name.unwrap_or("<default>"),
                old = %old.handle,
                new = %handle,
                "replaced database handle after configuration change"
            ),
            None => debug!(database = name.unwrap_or("<default>"), %handle, "opened database"),
        }
        Ok((handle, true))
    }

    /// Returns true while `handle` is in the reuse set.
    pub(crate) fn is_open(&self, handle: DbHandle) -> bool {
        self.reuse.lock().contains(&handle)
    }

    /// Closes a database. Idempotent.
    ///
    /// The cache entry is dropped whenever it still points at `handle`. The
    /// engine handle itself is only released when `release_handle` is set.
    pub(crate) fn close(&self, name: Option<&str>, handle: DbHandle, release_handle: bool) {
        let mut reuse = self.reuse.lock();
        if !reuse.contains(&handle) {
            return;
        }
        let key = name.map(str::to_string);
        self.entries.remove_if(&key, |_, entry| entry.handle == handle);
        if release_handle {
            self.engine.close_db(self.env, handle);
            reuse.remove(&handle);
            debug!(database = name.unwrap_or("<default>"), %handle, "closed database handle");
        }
    }

    /// Releases a handle first opened by a write transaction that aborted.
    /// Every view of it becomes closed.
    pub(crate) fn discard(&self, name: Option<&str>, handle: DbHandle) {
        let mut reuse = self.reuse.lock();
        if !reuse.remove(&handle) {
            return;
        }
        let key = name.map(str::to_string);
        self.entries.remove_if(&key, |_, entry| entry.handle == handle);
        self.engine.close_db(self.env, handle);
        debug!(
            database = name.unwrap_or("<default>"),
            %handle,
            "discarded handle opened by aborted transaction"
        );
    }

    /// Forgets a handle the engine already released (dropped databases).
    pub(crate) fn forget(&self, name: Option<&str>, handle: DbHandle) {
        let mut reuse = self.reuse.lock();
        let key = name.map(str::to_string);
        self.entries.remove_if(&key, |_, entry| entry.handle == handle);
        reuse.remove(&handle);
    }

    /// Closes every handle still open. Called at environment teardown.
    pub(crate) fn close_all(&self) {
        let mut reuse = self.reuse.lock();
        self.entries.clear();
        let count = reuse.len();
        for handle in reuse.drain() {
            self.engine.close_db(self.env, handle);
        }
        if count > 0 {
            debug!(count, "closed remaining database handles");
        }
    }

    /// Number of handles in the reuse set.
    pub(crate) fn open_count(&self) -> usize {
        self.reuse.lock().len()
    }
}

impl Drop for DatabaseCache {
    fn drop(&mut self) {
        let remaining = self.reuse.get_mut().len();
        if remaining > 0 {
            warn!(remaining, "database cache dropped with open handles");
        }
    }
}

impl std::fmt::Debug for DatabaseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseCache")
            .field("env", &self.env)
            .field("entries", &self.entries.len())
            .field("open", &self.open_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::Comparator;
    use lightkv_engine::{DbFlags, EnvOptions, MemoryEngine, TxnFlags};

    fn setup() -> (Arc<MemoryEngine>, DatabaseCache, TxnHandle) {
        let engine = Arc::new(MemoryEngine::new());
        let options = EnvOptions {
            max_dbs: 4,
            ..EnvOptions::default()
        };
        let env = engine.open_env(&options).unwrap();
        let txn = engine.begin_txn(env, None, TxnFlags::empty()).unwrap();
        let cache = DatabaseCache::new(engine.clone(), env);
        (engine, cache, txn)
    }

    #[test]
    fn same_config_reuses_handle() {
        let (_engine, cache, txn) = setup();
        let config = DatabaseConfig::new().create();
        let (first, fresh) = cache.open_database(Some("a"), txn, &config).unwrap();
        assert!(fresh);
        let (second, fresh) = cache.open_database(Some("a"), txn, &config).unwrap();
        assert!(!fresh);
        assert_eq!(first, second);
        assert_eq!(cache.open_count(), 1);
    }

    #[test]
    fn different_config_replaces_entry_and_keeps_old_handle_open() {
        let (_engine, cache, txn) = setup();
        let (first, _) = cache
            .open_database(Some("a"), txn, &DatabaseConfig::new().create())
            .unwrap();
        let (second, fresh) = cache
            .open_database(Some("a"), txn, &DatabaseConfig::new())
            .unwrap();
        assert!(fresh);
        assert_ne!(first, second);
        assert!(cache.is_open(first));
        assert!(cache.is_open(second));
        assert_eq!(
            cache
                .open_database(Some("a"), txn, &DatabaseConfig::new())
                .unwrap()
                .0,
            second
        );
    }

    #[test]
    fn close_is_idempotent() {
        let (_engine, cache, txn) = setup();
        let (handle, _) = cache.open_database(None, txn, &DatabaseConfig::new()).unwrap();
        cache.close(None, handle, true);
        assert!(!cache.is_open(handle));
        cache.close(None, handle, true);
        assert_eq!(cache.open_count(), 0);
    }

    #[test]
    fn close_without_release_drops_entry_only() {
        let (_engine, cache, txn) = setup();
        let config = DatabaseConfig::new();
        let (handle, _) = cache.open_database(None, txn, &config).unwrap();
        cache.close(None, handle, false);
        assert!(cache.is_open(handle));

        let (reopened, _) = cache.open_database(None, txn, &config).unwrap();
        assert_ne!(reopened, handle);
        assert_eq!(cache.open_count(), 2);
    }

    #[test]
    fn close_of_replaced_handle_keeps_new_entry() {
        let (_engine, cache, txn) = setup();
        let (old, _) = cache
            .open_database(Some("a"), txn, &DatabaseConfig::new().create())
            .unwrap();
        let (new, _) = cache
            .open_database(Some("a"), txn, &DatabaseConfig::new())
            .unwrap();
        cache.close(Some("a"), old, true);
        assert_eq!(
            cache
                .open_database(Some("a"), txn, &DatabaseConfig::new())
                .unwrap()
                .0,
            new
        );
    }

    #[test]
    fn open_failure_leaves_cache_untouched() {
        let (_engine, cache, txn) = setup();
        let err = cache
            .open_database(Some("missing"), txn, &DatabaseConfig::new())
            .unwrap_err();
        assert!(err.status().unwrap().is_not_found());
        assert_eq!(cache.open_count(), 0);
    }

    #[test]
    fn discard_releases_handle_and_entry() {
        let (_engine, cache, txn) = setup();
        let config = DatabaseConfig::new();
        let (handle, fresh) = cache.open_database(None, txn, &config).unwrap();
        assert!(fresh);

        cache.discard(None, handle);
        cache.discard(None, handle);
        assert!(!cache.is_open(handle));
        assert_eq!(cache.open_count(), 0);

        let (again, fresh) = cache.open_database(None, txn, &config).unwrap();
        assert!(fresh);
        assert_ne!(again, handle);
    }

    #[test]
    fn close_all_empties_reuse_set() {
        let (_engine, cache, txn) = setup();
        cache
            .open_database(
                Some("sorted"),
                txn,
                &DatabaseConfig::new()
                    .flags(DbFlags::CREATE)
                    .key_comparator(Comparator::LexicographicDescending),
            )
            .unwrap();
        cache.open_database(None, txn, &DatabaseConfig::new()).unwrap();
        assert_eq!(cache.open_count(), 2);
        cache.close_all();
        assert_eq!(cache.open_count(), 0);
    }
}
