//! Cursors over a database within one transaction.
//!
//! A [`Cursor`] borrows its transaction, so it cannot outlive the
//! transaction object. It is also invalidated the moment the transaction
//! commits, aborts or resets, even while the borrow is still alive; further
//! moves then fail with an invalid-state error.
//!
//! Iteration consumes the cursor: a [`CursorIter`] is lazy, forward-only and
//! single-pass. Dropping it early is always safe. Starting over needs a new
//! cursor.

mod registry;

pub(crate) use registry::CursorRegistry;

use crate::database::Database;
use crate::error::{found, CoreError, CoreResult};
use crate::transaction::{validate_key, Transaction};
use crate::types::Entry;
use lightkv_engine::{CursorHandle, CursorOp};
use std::iter::FusedIterator;

/// A positioned cursor bound to a transaction and a database.
pub struct Cursor<'txn> {
    txn: &'txn Transaction,
    database: Database,
    handle: CursorHandle,
}

impl<'txn> Cursor<'txn> {
    pub(crate) fn new(txn: &'txn Transaction, database: Database, handle: CursorHandle) -> Self {
        Self {
            txn,
            database,
            handle,
        }
    }

    /// The database this cursor walks.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Returns true while the cursor is registered with a live transaction.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.txn.inner().cursors.contains(self.handle)
    }

    /// Moves the cursor and returns the pair at the new position.
    ///
    /// Returns `Ok(None)` when there is no pair there. `key` and `value` are
    /// required by the operations that position on them.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for a missing or malformed
    /// argument, [`CoreError::InvalidState`] if the cursor or transaction is
    /// no longer usable, or an engine error.
    pub fn move_to(
        &mut self,
        op: CursorOp,
        key: Option<&[u8]>,
        value: Option<&[u8]>,
    ) -> CoreResult<Option<Entry>> {
        if op.needs_key() && key.is_none() {
            return Err(CoreError::invalid_argument(format!("{op:?} needs a key")));
        }
        if op.needs_value() && value.is_none() {
            return Err(CoreError::invalid_argument(format!("{op:?} needs a value")));
        }
        if let Some(key) = key {
            validate_key(key)?;
        }

        let inner = self.txn.inner();
        inner.with_active("move cursor", |_| {
            if !inner.cursors.contains(self.handle) {
                return Err(CoreError::invalid_state("cursor is closed"));
            }
            self.database.checked_handle(&inner.shared)?;
            found(
                inner.engine().cursor_move(self.handle, op, key, value),
                "cursor_move",
            )
        })
    }

    /// Moves to the first pair.
    pub fn first(&mut self) -> CoreResult<Option<Entry>> {
        self.move_to(CursorOp::First, None, None)
    }

    /// Moves to the last pair.
    pub fn last(&mut self) -> CoreResult<Option<Entry>> {
        self.move_to(CursorOp::Last, None, None)
    }

    /// Moves to the next pair.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> CoreResult<Option<Entry>> {
        self.move_to(CursorOp::Next, None, None)
    }

    /// Moves to the previous pair.
    pub fn prev(&mut self) -> CoreResult<Option<Entry>> {
        self.move_to(CursorOp::Prev, None, None)
    }

    /// Returns the pair at the current position.
    pub fn current(&mut self) -> CoreResult<Option<Entry>> {
        self.move_to(CursorOp::GetCurrent, None, None)
    }

    /// Moves to `key` exactly.
    pub fn seek(&mut self, key: &[u8]) -> CoreResult<Option<Entry>> {
        self.move_to(CursorOp::Set, Some(key), None)
    }

    /// Moves to the first key at or after `key`.
    pub fn seek_range(&mut self, key: &[u8]) -> CoreResult<Option<Entry>> {
        self.move_to(CursorOp::SetRange, Some(key), None)
    }

    /// Moves to the next value of the current key (dup-sorted databases).
    pub fn next_dup(&mut self) -> CoreResult<Option<Entry>> {
        self.move_to(CursorOp::NextDup, None, None)
    }

    /// Iterates from the first key at or after `key`.
    #[must_use]
    pub fn iter_from(self, key: &[u8]) -> CursorIter<'txn> {
        CursorIter::new(self, CursorOp::SetRange, Some(key.to_vec()), CursorOp::Next)
    }

    /// Iterates over every value stored under `key` in a dup-sorted
    /// database.
    #[must_use]
    pub fn iter_dup_of(self, key: &[u8]) -> CursorIter<'txn> {
        CursorIter::new(self, CursorOp::Set, Some(key.to_vec()), CursorOp::NextDup)
    }

    /// Closes the cursor. Dropping it has the same effect.
    pub fn close(self) {}
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        let inner = self.txn.inner();
        inner.cursors.close(inner.engine(), self.handle);
    }
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("handle", &self.handle)
            .field("txn", &self.txn.id())
            .field("database", &self.database)
            .finish()
    }
}

impl<'txn> IntoIterator for Cursor<'txn> {
    type Item = CoreResult<Entry>;
    type IntoIter = CursorIter<'txn>;

    fn into_iter(self) -> CursorIter<'txn> {
        CursorIter::new(self, CursorOp::First, None, CursorOp::Next)
    }
}

/// Lazy forward iterator over a cursor.
///
/// Yields pairs until the engine reports no further pair. An error is
/// yielded once and ends the iteration.
#[derive(Debug)]
pub struct CursorIter<'txn> {
    cursor: Cursor<'txn>,
    start: Option<(CursorOp, Option<Vec<u8>>)>,
    step: CursorOp,
    done: bool,
}

impl<'txn> CursorIter<'txn> {
    fn new(cursor: Cursor<'txn>, first: CursorOp, key: Option<Vec<u8>>, step: CursorOp) -> Self {
        Self {
            cursor,
            start: Some((first, key)),
            step,
            done: false,
        }
    }
}

impl Iterator for CursorIter<'_> {
    type Item = CoreResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let moved = match self.start.take() {
            Some((op, key)) => self.cursor.move_to(op, key.as_deref(), None),
            None => self.cursor.move_to(self.step, None, None),
        };
        match moved {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for CursorIter<'_> {}
