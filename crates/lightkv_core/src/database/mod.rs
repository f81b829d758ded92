//! Database handles and their environment-wide cache.
//!
//! A [`Database`] is a lightweight view over a handle owned by the
//! environment's cache. Views are cheap to clone and may be used by any
//! transaction of the environment that opened them, until the handle is
//! closed.

mod cache;

pub(crate) use cache::DatabaseCache;

use crate::config::DatabaseConfig;
use crate::environment::EnvShared;
use crate::error::{CoreError, CoreResult};
use lightkv_engine::{DbFlags, DbHandle};
use std::fmt;
use std::sync::Arc;

/// A named (or default) database within an environment.
#[derive(Clone)]
pub struct Database {
    name: Option<String>,
    handle: DbHandle,
    config: DatabaseConfig,
    shared: Arc<EnvShared>,
}

impl Database {
    pub(crate) fn new(
        name: Option<&str>,
        handle: DbHandle,
        config: DatabaseConfig,
        shared: Arc<EnvShared>,
    ) -> Self {
        Self {
            name: name.map(str::to_string),
            handle,
            config,
            shared,
        }
    }

    /// Database name; `None` for the default database.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Flags the database was opened with.
    #[must_use]
    pub fn flags(&self) -> DbFlags {
        self.config.flags
    }

    /// Full open configuration.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Returns true until the underlying handle is released.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.databases.is_open(self.handle)
    }

    /// Closes the database.
    ///
    /// The name's cache entry is always dropped so the next open goes to the
    /// engine. With `release_handle` the engine handle is released as well,
    /// which invalidates every other view of it. Closing twice is a no-op.
    pub fn close(&self, release_handle: bool) {
        self.shared
            .databases
            .close(self.name(), self.handle, release_handle);
    }

    /// Returns the engine handle after checking the view can be used with
    /// the given environment.
    pub(crate) fn checked_handle(&self, shared: &Arc<EnvShared>) -> CoreResult<DbHandle> {
        if !Arc::ptr_eq(&self.shared, shared) {
            return Err(CoreError::invalid_argument(
                "database belongs to a different environment",
            ));
        }
        if !self.is_open() {
            return Err(CoreError::invalid_state(format!(
                "database {} is closed",
                self.display_name()
            )));
        }
        Ok(self.handle)
    }

    pub(crate) fn handle(&self) -> DbHandle {
        self.handle
    }

    fn display_name(&self) -> &str {
        self.name().unwrap_or("<default>")
    }
}

/// Views are equal when they share an environment and an engine handle.
impl PartialEq for Database {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.handle == other.handle
    }
}

impl Eq for Database {}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.display_name())
            .field("handle", &self.handle)
            .field("flags", &self.config.flags)
            .finish()
    }
}
