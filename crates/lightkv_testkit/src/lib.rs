//! # LightKV Testkit
//!
//! Test utilities for LightKV.
//!
//! This crate provides:
//! - Test fixtures: temporary environments, in memory or on disk
//! - Property-based test generators using proptest
//! - A fault-injecting engine wrapper for failure-path tests
//! - Concurrency stress helpers
//!
//! ## Usage
//!
//! ```rust
//! use lightkv_testkit::prelude::*;
//! use lightkv_core::DatabaseConfig;
//!
//! with_temp_env(|env| {
//!     let txn = env.begin_transaction().unwrap();
//!     let db = txn.open_database(None, DatabaseConfig::new()).unwrap();
//!     txn.put(&db, b"k", b"v").unwrap();
//!     txn.commit().unwrap();
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
