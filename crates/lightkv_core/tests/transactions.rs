//! Transaction state machine and hierarchy tests.

use lightkv_core::{
    CoreError, DatabaseConfig, EnvironmentConfig, TransactionConfig, TransactionState,
};
use lightkv_testkit::{env_with_engine, FaultyEngine, TestEnvironment};
use std::sync::Arc;
use std::thread;

#[test]
fn put_commit_then_read_in_new_transaction() {
    let env = TestEnvironment::memory();

    let txn = env.begin_transaction().unwrap();
    let db = txn.open_database(None, DatabaseConfig::new()).unwrap();
    txn.put(&db, b"key", b"value").unwrap();
    txn.commit().unwrap();
    assert_eq!(txn.state(), TransactionState::Committed);

    let txn = env.begin_transaction().unwrap();
    assert_eq!(txn.get(&db, b"key").unwrap(), Some(b"value".to_vec()));
}

#[test]
fn put_then_get_in_same_transaction_is_byte_exact() {
    let env = TestEnvironment::memory();
    let txn = env.begin_transaction().unwrap();
    let db = txn.open_database(None, DatabaseConfig::new()).unwrap();
    let value = [0u8, 255, 7, 0, 128];
    txn.put(&db, b"bin", &value).unwrap();
    assert_eq!(txn.get(&db, b"bin").unwrap().as_deref(), Some(&value[..]));
}

#[test]
fn deleted_key_reads_as_absent() {
    let env = TestEnvironment::memory();
    let txn = env.begin_transaction().unwrap();
    let db = txn.open_database(None, DatabaseConfig::new()).unwrap();
    txn.put(&db, b"k", b"v").unwrap();
    txn.delete(&db, b"k").unwrap();
    assert_eq!(txn.get(&db, b"k").unwrap(), None);
    assert!(!txn.contains_key(&db, b"k").unwrap());

    // Deleting what is not there is a hard error.
    let err = txn.delete(&db, b"k").unwrap_err();
    assert!(err.status().is_some_and(|s| s.is_not_found()));
}

#[test]
fn committing_parent_aborts_live_child() {
    let env = TestEnvironment::memory();
    let parent = env.begin_transaction().unwrap();
    let child = parent.begin_child().unwrap();
    assert_eq!(child.parent_id(), Some(parent.id()));
    assert_eq!(parent.child_count(), 1);

    parent.commit().unwrap();
    assert_eq!(parent.state(), TransactionState::Committed);
    assert_eq!(child.state(), TransactionState::Aborted);
    assert_eq!(env.open_transaction_count(), 0);
}

#[test]
fn aborting_root_aborts_whole_subtree() {
    let env = TestEnvironment::memory();
    let root = env.begin_transaction().unwrap();
    let child = root.begin_child().unwrap();
    let grandchild = child.begin_child().unwrap();

    root.abort();
    for txn in [&root, &child, &grandchild] {
        assert_eq!(txn.state(), TransactionState::Aborted);
    }
    assert_eq!(env.engine.live_txn_count(), 0);
}

#[test]
fn committed_child_leaves_parent_children() {
    let env = TestEnvironment::memory();
    let parent = env.begin_transaction().unwrap();
    let db = parent.open_database(None, DatabaseConfig::new()).unwrap();

    let child = parent.begin_child().unwrap();
    child.put(&db, b"from-child", b"1").unwrap();
    child.commit().unwrap();

    assert_eq!(child.state(), TransactionState::Committed);
    assert_eq!(parent.child_count(), 0);
    assert_eq!(parent.get(&db, b"from-child").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn aborted_child_changes_are_discarded() {
    let env = TestEnvironment::memory();
    let parent = env.begin_transaction().unwrap();
    let db = parent.open_database(None, DatabaseConfig::new()).unwrap();

    let child = parent.begin_child().unwrap();
    child.put(&db, b"gone", b"1").unwrap();
    child.abort();

    assert_eq!(parent.get(&db, b"gone").unwrap(), None);
    parent.put(&db, b"kept", b"2").unwrap();
    parent.commit().unwrap();
}

#[test]
fn parent_is_unusable_while_child_is_live() {
    let env = TestEnvironment::memory();
    let parent = env.begin_transaction().unwrap();
    let db = parent.open_database(None, DatabaseConfig::new()).unwrap();
    let _child = parent.begin_child().unwrap();

    let err = parent.put(&db, b"k", b"v").unwrap_err();
    assert!(err.is_invalid_state());
    assert!(parent.begin_child().unwrap_err().is_invalid_state());
}

#[test]
fn double_commit_and_commit_after_abort_are_invalid_state() {
    let env = TestEnvironment::memory();
    let txn = env.begin_transaction().unwrap();
    txn.commit().unwrap();
    assert!(txn.commit().unwrap_err().is_invalid_state());

    let txn = env.begin_transaction().unwrap();
    txn.abort();
    assert!(txn.commit().unwrap_err().is_invalid_state());
}

#[test]
fn abort_is_idempotent() {
    let env = TestEnvironment::memory();
    let txn = env.begin_transaction().unwrap();
    txn.commit().unwrap();
    txn.abort();
    assert_eq!(txn.state(), TransactionState::Committed);

    let txn = env.begin_transaction().unwrap();
    txn.abort();
    txn.abort();
    assert_eq!(txn.state(), TransactionState::Aborted);
}

#[test]
fn invalid_state_is_detected_before_engine_calls() {
    let engine = Arc::new(FaultyEngine::new());
    let env = env_with_engine(engine.clone());

    let txn = env.begin_transaction().unwrap();
    let db = txn.open_database(None, DatabaseConfig::new()).unwrap();
    txn.commit().unwrap();

    let commits = engine.calls("commit_txn");
    assert!(txn.put(&db, b"k", b"v").unwrap_err().is_invalid_state());
    assert!(txn.get(&db, b"k").unwrap_err().is_invalid_state());
    assert!(txn.commit().unwrap_err().is_invalid_state());
    assert!(txn.reset().unwrap_err().is_invalid_state());
    assert_eq!(engine.calls("put"), 0);
    assert_eq!(engine.calls("get"), 0);
    assert_eq!(engine.calls("commit_txn"), commits);
    assert_eq!(engine.calls("reset_txn"), 0);

    let reader = env.begin_read_transaction().unwrap();
    assert!(reader.put(&db, b"k", b"v").unwrap_err().is_invalid_state());
    assert!(reader.begin_child().unwrap_err().is_invalid_state());
    assert_eq!(engine.calls("put"), 0);
}

#[test]
fn reset_and_renew_cycle_read_only_transaction() {
    let env = TestEnvironment::memory();
    let db = env
        .transaction(|txn| {
            let db = txn.open_database(None, DatabaseConfig::new())?;
            txn.put(&db, b"k", b"1")?;
            Ok(db)
        })
        .unwrap();

    let reader = env.begin_read_transaction().unwrap();
    assert_eq!(reader.get(&db, b"k").unwrap(), Some(b"1".to_vec()));

    reader.reset().unwrap();
    assert_eq!(reader.state(), TransactionState::Reset);
    assert!(reader.get(&db, b"k").unwrap_err().is_invalid_state());

    env.transaction(|txn| txn.put(&db, b"k", b"2")).unwrap();

    reader.renew().unwrap();
    assert_eq!(reader.state(), TransactionState::Active);
    assert_eq!(reader.get(&db, b"k").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn reset_is_rejected_for_writers_and_renew_needs_reset() {
    let env = TestEnvironment::memory();
    let writer = env.begin_transaction().unwrap();
    assert!(writer.reset().unwrap_err().is_invalid_state());
    writer.abort();

    let reader = env.begin_read_transaction().unwrap();
    assert!(reader.renew().unwrap_err().is_invalid_state());
    reader.reset().unwrap();
    reader.abort();
    assert_eq!(reader.state(), TransactionState::Aborted);
}

#[test]
fn readers_see_their_snapshot() {
    let env = TestEnvironment::memory();
    let db = env
        .transaction(|txn| {
            let db = txn.open_database(None, DatabaseConfig::new())?;
            txn.put(&db, b"k", b"old")?;
            Ok(db)
        })
        .unwrap();

    let reader = env.begin_transaction_with(TransactionConfig::read_only()).unwrap();
    env.transaction(|txn| txn.put(&db, b"k", b"new")).unwrap();
    assert_eq!(reader.get(&db, b"k").unwrap(), Some(b"old".to_vec()));
}

#[test]
fn dropping_transaction_aborts_it() {
    let env = TestEnvironment::memory();
    let db = {
        let txn = env.begin_transaction().unwrap();
        let db = txn.open_database(None, DatabaseConfig::new()).unwrap();
        txn.put(&db, b"k", b"v").unwrap();
        db
    };
    assert_eq!(env.open_transaction_count(), 0);
    assert!(!db.is_open());

    let txn = env.begin_read_transaction().unwrap();
    let db = txn.open_database(None, DatabaseConfig::new()).unwrap();
    assert_eq!(txn.get(&db, b"k").unwrap(), None);
}

#[test]
fn writers_are_serialized() {
    let env = TestEnvironment::memory();
    let first = env.begin_transaction().unwrap();
    let db = first.open_database(None, DatabaseConfig::new()).unwrap();
    first.put(&db, b"order", b"first").unwrap();

    let second = {
        let env = env.env.clone();
        let db = db.clone();
        thread::spawn(move || {
            env.transaction(|txn| {
                let seen = txn.get(&db, b"order")?;
                txn.put(&db, b"order", b"second")?;
                Ok(seen)
            })
        })
    };

    first.commit().unwrap();
    let seen = second.join().unwrap().unwrap();
    assert_eq!(seen, Some(b"first".to_vec()));
}

#[test]
fn closing_environment_aborts_every_transaction() {
    let env = TestEnvironment::memory();
    let writer = env.begin_transaction().unwrap();
    let child = writer.begin_child().unwrap();
    let grandchild = child.begin_child().unwrap();
    let reader = env.begin_read_transaction().unwrap();

    env.close();
    for txn in [&writer, &child, &grandchild, &reader] {
        assert_eq!(txn.state(), TransactionState::Aborted);
    }
    assert_eq!(env.engine.live_txn_count(), 0);
    assert!(matches!(
        env.begin_transaction(),
        Err(CoreError::EnvironmentClosed)
    ));
}

#[test]
fn close_racing_commits_releases_each_handle_once() {
    for _ in 0..20 {
        let env = TestEnvironment::memory_with(EnvironmentConfig::default());
        let txns: Vec<_> = (0..4)
            .map(|_| env.begin_read_transaction().unwrap())
            .collect();
        let txns = Arc::new(txns);

        let committer = {
            let txns = Arc::clone(&txns);
            thread::spawn(move || {
                for txn in txns.iter() {
                    let _ = txn.commit();
                }
            })
        };
        env.close();
        committer.join().unwrap();

        for txn in txns.iter() {
            assert!(txn.state().is_terminal());
        }
        assert_eq!(env.engine.live_txn_count(), 0);
    }
}
