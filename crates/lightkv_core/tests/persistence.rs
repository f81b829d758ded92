//! Persisted environments, copies and the process-wide engine.

use lightkv_core::{
    CoreError, DatabaseConfig, Environment, EnvironmentConfig, Status, TypedExt, DATA_FILE,
};
use tempfile::TempDir;

fn write_sample(env: &Environment) {
    env.transaction(|txn| {
        let db = txn.open_database(Some("users"), DatabaseConfig::new().create())?;
        txn.put_typed(&db, "alice", "admin")?;
        txn.put_typed(&db, "bob", "viewer")?;
        let counters = txn.open_database(Some("counters"), DatabaseConfig::new().create())?;
        txn.put_typed(&counters, &7u64, &42i64)
    })
    .unwrap();
}

fn read_role(env: &Environment, user: &str) -> Option<String> {
    let txn = env.begin_read_transaction().unwrap();
    let db = txn
        .open_database(Some("users"), DatabaseConfig::new())
        .unwrap();
    txn.get_typed::<str, str>(&db, user).unwrap()
}

#[test]
fn committed_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("env");

    let env = Environment::open(&path, EnvironmentConfig::default()).unwrap();
    write_sample(&env);
    env.close();
    assert!(path.join(DATA_FILE).exists());

    let env = Environment::open(&path, EnvironmentConfig::default()).unwrap();
    assert_eq!(read_role(&env, "alice").as_deref(), Some("admin"));

    let txn = env.begin_read_transaction().unwrap();
    let counters = txn
        .open_database(Some("counters"), DatabaseConfig::new())
        .unwrap();
    assert_eq!(txn.get_typed::<u64, i64>(&counters, &7).unwrap(), Some(42));
}

#[test]
fn aborted_writes_are_not_persisted() {
    let dir = TempDir::new().unwrap();
    let env = Environment::open(dir.path(), EnvironmentConfig::default()).unwrap();
    write_sample(&env);

    let txn = env.begin_transaction().unwrap();
    let db = txn
        .open_database(Some("users"), DatabaseConfig::new())
        .unwrap();
    txn.put_typed(&db, "mallory", "root").unwrap();
    txn.abort();
    env.close();

    let env = Environment::open(dir.path(), EnvironmentConfig::default()).unwrap();
    assert_eq!(read_role(&env, "mallory"), None);
    assert_eq!(read_role(&env, "bob").as_deref(), Some("viewer"));
}

#[test]
fn copy_produces_an_openable_environment() {
    let dir = TempDir::new().unwrap();
    let env = Environment::open(dir.path().join("source"), EnvironmentConfig::default()).unwrap();
    write_sample(&env);

    let destination = dir.path().join("copy");
    env.copy_to(&destination).unwrap();
    assert!(destination.join(DATA_FILE).exists());

    // Copying over an existing image is refused.
    assert!(env.copy_to(&destination).is_err());

    let copy = Environment::open(&destination, EnvironmentConfig::default()).unwrap();
    assert_eq!(read_role(&copy, "alice").as_deref(), Some("admin"));
}

#[test]
fn directory_is_locked_while_open() {
    let dir = TempDir::new().unwrap();
    let env = Environment::open(dir.path(), EnvironmentConfig::default()).unwrap();

    let err = Environment::open(dir.path(), EnvironmentConfig::default()).unwrap_err();
    assert_eq!(err.status(), Some(Status::BUSY));

    env.close();
    Environment::open(dir.path(), EnvironmentConfig::default()).unwrap();
}

#[test]
fn missing_directory_without_create_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = EnvironmentConfig::default().create_if_missing(false);
    let err = Environment::open(dir.path().join("nowhere"), config).unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument { .. }));
}

#[test]
fn read_only_environment_serves_readers_only() {
    let dir = TempDir::new().unwrap();
    {
        let env = Environment::open(dir.path(), EnvironmentConfig::default()).unwrap();
        write_sample(&env);
    }

    let env = Environment::open(dir.path(), EnvironmentConfig::default().read_only(true)).unwrap();
    assert!(env.begin_transaction().unwrap_err().is_invalid_state());
    assert_eq!(read_role(&env, "alice").as_deref(), Some("admin"));
}

#[test]
fn default_engine_is_reported() {
    let env = Environment::open_in_memory(EnvironmentConfig::default()).unwrap();
    assert_eq!(env.engine_name(), "memory");
    assert_eq!(env.engine_version().major, 0);
    assert!(env.path().is_none());
}
