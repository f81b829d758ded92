//! # LightKV Core
//!
//! Resource-lifecycle core of the LightKV embedded key-value client.
//!
//! This crate provides:
//! - [`Environment`] lifecycle over an [`Engine`](lightkv_engine::Engine)
//! - [`Transaction`] state machine with nested transactions
//! - A per-environment database handle cache behind [`Database`]
//! - [`Cursor`]s scoped to their transaction, with lazy iteration
//! - The [`Comparator`] set for per-database key order
//! - Typed key/value overlays in [`typed`]
//!
//! The engine does the storage; this layer owns the bookkeeping: nested
//! transactions die with their parent, database handles are shared and
//! invalidated safely, and cursors never outlive their transaction.
//!
//! ## Example
//!
//! ```rust
//! use lightkv_core::{DatabaseConfig, Environment, EnvironmentConfig, TransactionState};
//!
//! let env = Environment::open_in_memory(EnvironmentConfig::default())?;
//!
//! let parent = env.begin_transaction()?;
//! let db = parent.open_database(None, DatabaseConfig::new())?;
//! let child = parent.begin_child()?;
//! child.put(&db, b"key", b"value")?;
//! child.commit()?;
//! parent.commit()?;
//! assert_eq!(child.state(), TransactionState::Committed);
//!
//! let reader = env.begin_read_transaction()?;
//! let mut cursor = reader.open_cursor(&db)?;
//! assert_eq!(cursor.first()?, Some((b"key".to_vec(), b"value".to_vec())));
//! # Ok::<(), lightkv_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod comparator;
mod config;
mod cursor;
mod database;
pub mod engine;
mod environment;
mod error;
mod transaction;
pub mod typed;
mod types;

pub use comparator::Comparator;
pub use config::{DatabaseConfig, EnvironmentConfig, TransactionConfig};
pub use cursor::{Cursor, CursorIter};
pub use database::Database;
pub use environment::Environment;
pub use error::{CoreError, CoreResult};
pub use transaction::Transaction;
pub use typed::{KeyCodec, TypedExt};
pub use types::{Entry, TransactionId, TransactionState, MAX_KEY_SIZE};

pub use lightkv_engine::{
    CursorOp, DbFlags, EngineVersion, PutFlags, Status, TxnStatus, DATA_FILE, LOCK_FILE,
};
