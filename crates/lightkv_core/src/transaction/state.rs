//! Transaction state machine.
//!
//! ```text
//!   Active ──commit──► Committed
//!    │  ▲
//!  reset renew           (read-only transactions only)
//!    ▼  │
//!   Reset
//!
//!   Active | Reset ──abort──► Aborted
//! ```
//!
//! Every transition happens under the transaction's state lock, which is
//! also held for the duration of each engine call. A commit racing an abort
//! from another thread (typically environment teardown) therefore reaches
//! the engine exactly once. Locks are always taken parent before child.

use crate::config::TransactionConfig;
use crate::cursor::CursorRegistry;
use crate::environment::EnvShared;
use crate::error::{CoreError, CoreResult, StatusExt};
use crate::transaction::hierarchy::TransactionHierarchy;
use crate::types::{TransactionId, TransactionState};
use lightkv_engine::{DbHandle, Engine, TxnHandle, TxnStatus};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Where a transaction is registered while it is live.
pub(crate) enum Owner {
    /// A root transaction, tracked by the environment.
    Environment(Weak<TransactionHierarchy>),
    /// A nested transaction, tracked by its parent.
    Parent {
        id: TransactionId,
        txn: Weak<TxnInner>,
    },
}

pub(crate) struct TxnInner {
    pub(crate) id: TransactionId,
    pub(crate) handle: TxnHandle,
    pub(crate) read_only: bool,
    state: Mutex<TransactionState>,
    owner: Owner,
    pub(crate) shared: Arc<EnvShared>,
    pub(crate) children: TransactionHierarchy,
    pub(crate) cursors: CursorRegistry,
    /// Database handles this transaction opened first. Released if the
    /// transaction aborts, since a database it created may not exist
    /// afterwards.
    opened: Mutex<Vec<(Option<String>, DbHandle)>>,
}

impl TxnInner {
    pub(crate) fn new(
        id: TransactionId,
        handle: TxnHandle,
        read_only: bool,
        owner: Owner,
        shared: Arc<EnvShared>,
    ) -> Self {
        Self {
            id,
            handle,
            read_only,
            state: Mutex::new(TransactionState::Active),
            owner,
            shared,
            children: TransactionHierarchy::new(),
            cursors: CursorRegistry::new(),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub(crate) fn engine(&self) -> &dyn Engine {
        self.shared.engine.as_ref()
    }

    pub(crate) fn parent_id(&self) -> Option<TransactionId> {
        match &self.owner {
            Owner::Environment(_) => None,
            Owner::Parent { id, .. } => Some(*id),
        }
    }

    fn not_active(&self, operation: &str, state: TransactionState) -> CoreError {
        CoreError::invalid_state(format!(
            "cannot {operation}: transaction {} is {state}",
            self.id
        ))
    }

    /// Runs `f` with the engine handle while the transaction is active and
    /// has no live nested transaction. The state lock is held throughout.
    pub(crate) fn with_active<T>(
        &self,
        operation: &str,
        f: impl FnOnce(TxnHandle) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let state = self.state.lock();
        if *state != TransactionState::Active {
            return Err(self.not_active(operation, *state));
        }
        if !self.children.is_empty() {
            return Err(CoreError::invalid_state(format!(
                "cannot {operation}: transaction {} has a live nested transaction",
                self.id
            )));
        }
        f(self.handle)
    }

    /// Like [`TxnInner::with_active`], rejecting read-only transactions.
    pub(crate) fn with_writable<T>(
        &self,
        operation: &str,
        f: impl FnOnce(TxnHandle) -> CoreResult<T>,
    ) -> CoreResult<T> {
        if self.read_only {
            return Err(CoreError::invalid_state(format!(
                "cannot {operation}: transaction {} is read-only",
                self.id
            )));
        }
        self.with_active(operation, f)
    }

    pub(crate) fn remember_opened(&self, name: Option<&str>, handle: DbHandle) {
        if !self.read_only {
            self.opened.lock().push((name.map(str::to_string), handle));
        }
    }

    pub(crate) fn begin_child(self: &Arc<Self>) -> CoreResult<Arc<TxnInner>> {
        if self.read_only {
            return Err(CoreError::invalid_state(format!(
                "cannot begin nested transaction: transaction {} is read-only",
                self.id
            )));
        }
        // The parent's lock is held across creation so a concurrent abort of
        // the parent sees the child in its hierarchy.
        self.with_active("begin nested transaction", |handle| {
            self.children.create(
                &self.shared,
                Owner::Parent {
                    id: self.id,
                    txn: Arc::downgrade(self),
                },
                Some(handle),
                TransactionConfig::read_write(),
            )
        })
    }

    /// Commits the transaction, aborting any live nested transactions first.
    ///
    /// On engine failure the resulting state is read back from the engine:
    /// a released handle leaves the transaction `Aborted`; a handle that is
    /// still live leaves it `Active` and the caller must abort it.
    pub(crate) fn commit(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        if *state != TransactionState::Active {
            return Err(self.not_active("commit", *state));
        }

        let children = self.children.abort_all();
        if children > 0 {
            debug!(txn = %self.id, children, "aborted nested transactions before commit");
        }

        match self.engine().commit_txn(self.handle) {
            Ok(()) => {}
            Err(status) if status.is_not_found() => {}
            Err(status) => {
                let after = self.engine().txn_status(self.handle);
                warn!(txn = %self.id, %status, engine_state = ?after, "commit failed");
                if after == TxnStatus::Released {
                    *state = TransactionState::Aborted;
                    self.finish(TransactionState::Aborted);
                }
                return Err(CoreError::engine("commit_txn", status));
            }
        }

        *state = TransactionState::Committed;
        self.finish(TransactionState::Committed);
        debug!(txn = %self.id, "committed transaction");
        Ok(())
    }

    /// Aborts the transaction and its subtree. No-op once terminal.
    pub(crate) fn abort(&self) {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return;
        }
        let children = self.children.abort_all();
        self.engine().abort_txn(self.handle);
        *state = TransactionState::Aborted;
        self.finish(TransactionState::Aborted);
        debug!(txn = %self.id, children, "aborted transaction");
    }

    pub(crate) fn reset(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        if !self.read_only {
            return Err(CoreError::invalid_state(format!(
                "cannot reset: transaction {} is not read-only",
                self.id
            )));
        }
        if *state != TransactionState::Active {
            return Err(self.not_active("reset", *state));
        }
        self.engine().reset_txn(self.handle).during("reset_txn")?;
        let cursors = self.cursors.close_all();
        *state = TransactionState::Reset;
        debug!(txn = %self.id, cursors, "reset transaction");
        Ok(())
    }

    pub(crate) fn renew(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        if *state != TransactionState::Reset {
            return Err(self.not_active("renew", *state));
        }
        self.engine().renew_txn(self.handle).during("renew_txn")?;
        *state = TransactionState::Active;
        debug!(txn = %self.id, "renewed transaction");
        Ok(())
    }

    /// Wrapper-side cleanup once the engine handle is gone. Called with the
    /// state lock held.
    fn finish(&self, outcome: TransactionState) {
        self.cursors.close_all();
        let opened = std::mem::take(&mut *self.opened.lock());

        match &self.owner {
            Owner::Environment(roots) => {
                if let Some(roots) = roots.upgrade() {
                    roots.was_discarded(self.id);
                }
            }
            Owner::Parent { txn, .. } => {
                if let Some(parent) = txn.upgrade() {
                    parent.children.was_discarded(self.id);
                    if outcome == TransactionState::Committed {
                        // The parent now decides whether these survive.
                        parent.opened.lock().extend(opened.iter().cloned());
                    }
                }
            }
        }

        if outcome == TransactionState::Aborted {
            for (name, handle) in &opened {
                self.shared.databases.discard(name.as_deref(), *handle);
            }
        }
    }
}
