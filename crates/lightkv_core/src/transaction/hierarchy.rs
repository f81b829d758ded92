//! Parent/child ownership of live transactions.

use crate::config::TransactionConfig;
use crate::environment::EnvShared;
use crate::error::{CoreResult, StatusExt};
use crate::transaction::state::{Owner, TxnInner};
use crate::types::TransactionId;
use lightkv_engine::TxnHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Owns the live transactions spawned directly by one parent, or by the
/// environment for root transactions.
///
/// Children never own their parent: they keep a weak back-reference and
/// remove themselves through [`TransactionHierarchy::was_discarded`] once
/// they reach a terminal state.
#[derive(Default)]
pub(crate) struct TransactionHierarchy {
    live: Mutex<HashMap<TransactionId, Arc<TxnInner>>>,
}

impl TransactionHierarchy {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Begins a transaction through the engine and tracks it here.
    ///
    /// `parent` is the engine handle of the enclosing transaction for
    /// nested transactions.
    pub(crate) fn create(
        &self,
        shared: &Arc<EnvShared>,
        owner: Owner,
        parent: Option<TxnHandle>,
        config: TransactionConfig,
    ) -> CoreResult<Arc<TxnInner>> {
        let handle = shared
            .engine
            .begin_txn(shared.handle, parent, config.flags())
            .during("begin_txn")?;
        let inner = Arc::new(TxnInner::new(
            shared.next_txn_id(),
            handle,
            config.read_only,
            owner,
            Arc::clone(shared),
        ));
        self.live.lock().insert(inner.id, Arc::clone(&inner));
        debug!(
            txn = %inner.id,
            %handle,
            read_only = config.read_only,
            nested = parent.is_some(),
            "began transaction"
        );
        Ok(inner)
    }

    /// Stops tracking a transaction that reached a terminal state.
    pub(crate) fn was_discarded(&self, id: TransactionId) {
        self.live.lock().remove(&id);
    }

    /// Aborts every tracked transaction and, through them, their whole
    /// subtrees, children before parents.
    ///
    /// Works on a snapshot: each abort removes itself from the live set.
    pub(crate) fn abort_all(&self) -> usize {
        let snapshot: Vec<Arc<TxnInner>> = self.live.lock().values().cloned().collect();
        let count = snapshot.len();
        for txn in snapshot {
            txn.abort();
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }
}

impl std::fmt::Debug for TransactionHierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let live = self.live.lock();
        let mut ids: Vec<_> = live.keys().copied().collect();
        ids.sort();
        f.debug_struct("TransactionHierarchy").field("live", &ids).finish()
    }
}
