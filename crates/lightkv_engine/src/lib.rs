//! # LightKV Engine
//!
//! Primitive engine surface and reference engine for LightKV.
//!
//! This crate provides the lowest-level abstraction LightKV builds on.
//! Engines are **opaque handle dispensers**: they open environments,
//! transactions, databases and cursors, and answer with status codes. They
//! know nothing about the bookkeeping `lightkv_core` layers on top.
//!
//! ## Design Principles
//!
//! - Every primitive returns `Result<_, Status>`; [`Status::NOT_FOUND`] is
//!   the sentinel for an absent entry
//! - Handles are plain identifiers; releasing them is idempotent
//! - Engines must be `Send + Sync` for concurrent access
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - In-process engine, optionally persisted to a directory
//!
//! ## Example
//!
//! ```rust
//! use lightkv_engine::{DbFlags, Engine, EnvOptions, MemoryEngine, PutFlags, Status, TxnFlags};
//!
//! let engine = MemoryEngine::new();
//! let env = engine.open_env(&EnvOptions::default()).unwrap();
//! let txn = engine.begin_txn(env, None, TxnFlags::empty()).unwrap();
//! let db = engine.open_db(txn, None, DbFlags::empty()).unwrap();
//! engine.put(txn, db, b"hello", b"world", PutFlags::empty()).unwrap();
//! assert_eq!(engine.get(txn, db, b"missing"), Err(Status::NOT_FOUND));
//! engine.abort_txn(txn);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod memory;
mod persist;
mod status;
mod table;
mod types;

pub use engine::Engine;
pub use memory::MemoryEngine;
pub use persist::{DATA_FILE, LOCK_FILE};
pub use status::{EngineResult, Status};
pub use types::{
    CursorHandle, CursorOp, DbFlags, DbHandle, DbStat, EngineVersion, EnvFlags, EnvHandle,
    EnvOptions, KeyCompare, PutFlags, TxnFlags, TxnHandle, TxnStatus,
};
