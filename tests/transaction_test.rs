//! Integration tests for transaction handling.

use easydb::db::Conn;
use easydb::{Backend, Database, DbError, DbResult, SqlValue};
use futures_util::future::BoxFuture;
use tempfile::NamedTempFile;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn setup_db() -> Database {
    init_tracing();
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file
        .into_temp_path()
        .keep()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let db = Database::connect(Backend::SQLite, &format!("sqlite:{}", db_path))
        .await
        .unwrap();
    let mut conn = db.conn();
    conn.execute(
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY, balance INTEGER)",
        &[],
    )
    .await
    .unwrap();
    conn.execute(
        "INSERT INTO accounts (id, balance) VALUES (?, ?), (?, ?)",
        &[
            SqlValue::Int(1),
            SqlValue::Int(100),
            SqlValue::Int(2),
            SqlValue::Int(0),
        ],
    )
    .await
    .unwrap();
    db
}

fn transfer(conn: &mut Conn) -> BoxFuture<'_, DbResult<()>> {
    Box::pin(async move {
        conn.execute(
            "UPDATE accounts SET balance = balance - ? WHERE id = ?",
            &[SqlValue::Int(40), SqlValue::Int(1)],
        )
        .await?;
        conn.execute(
            "UPDATE accounts SET balance = balance + ? WHERE id = ?",
            &[SqlValue::Int(40), SqlValue::Int(2)],
        )
        .await?;
        Ok(())
    })
}

fn failing_transfer(conn: &mut Conn) -> BoxFuture<'_, DbResult<()>> {
    Box::pin(async move {
        conn.execute(
            "UPDATE accounts SET balance = balance - ? WHERE id = ?",
            &[SqlValue::Int(40), SqlValue::Int(1)],
        )
        .await?;
        Err(DbError::invalid_input("caller aborts"))
    })
}

#[tokio::test]
async fn test_exec_in_tx_commits_on_success() {
    let db = setup_db().await;
    db.exec_in_tx(transfer).await.unwrap();

    let mut conn = db.conn();
    let balance = conn
        .count("SELECT balance FROM accounts WHERE id = ?", &[SqlValue::Int(2)])
        .await
        .unwrap();
    assert_eq!(balance, 40);
}

#[tokio::test]
async fn test_exec_in_tx_rolls_back_on_error() {
    let db = setup_db().await;
    let err = db.exec_in_tx(failing_transfer).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));

    // The partial debit never landed.
    let mut conn = db.conn();
    let balance = conn
        .count("SELECT balance FROM accounts WHERE id = ?", &[SqlValue::Int(1)])
        .await
        .unwrap();
    assert_eq!(balance, 100);
}

#[tokio::test]
async fn test_manual_transaction_commit() {
    let db = setup_db().await;
    let mut conn = db.conn();

    conn.begin().await.unwrap();
    assert!(conn.in_transaction());
    conn.execute(
        "UPDATE accounts SET balance = ? WHERE id = ?",
        &[SqlValue::Int(7), SqlValue::Int(1)],
    )
    .await
    .unwrap();
    conn.commit().await.unwrap();
    assert!(!conn.in_transaction());

    let balance = conn
        .count("SELECT balance FROM accounts WHERE id = ?", &[SqlValue::Int(1)])
        .await
        .unwrap();
    assert_eq!(balance, 7);
}

#[tokio::test]
async fn test_manual_transaction_rollback() {
    let db = setup_db().await;
    let mut conn = db.conn();

    conn.begin().await.unwrap();
    conn.execute(
        "UPDATE accounts SET balance = ? WHERE id = ?",
        &[SqlValue::Int(7), SqlValue::Int(1)],
    )
    .await
    .unwrap();
    conn.rollback().await.unwrap();

    let balance = conn
        .count("SELECT balance FROM accounts WHERE id = ?", &[SqlValue::Int(1)])
        .await
        .unwrap();
    assert_eq!(balance, 100);
}

#[tokio::test]
async fn test_double_begin_is_rejected() {
    let db = setup_db().await;
    let mut conn = db.conn();
    conn.begin().await.unwrap();
    let err = conn.begin().await.unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
    conn.rollback().await.unwrap();
}

#[tokio::test]
async fn test_commit_without_begin_is_rejected() {
    let db = setup_db().await;
    let mut conn = db.conn();
    assert!(conn.commit().await.is_err());
    assert!(conn.rollback().await.is_err());
}

/// Test that requires a running CockroachDB cluster.
/// Set TEST_COCKROACH_URL environment variable to run this test.
/// Example: TEST_COCKROACH_URL="postgres://root@localhost:26257/test?sslmode=disable"
#[tokio::test]
async fn test_exec_in_tx_against_cockroach() {
    let url = match std::env::var("TEST_COCKROACH_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: TEST_COCKROACH_URL not set");
            return;
        }
    };

    let db = Database::connect(Backend::Cockroach, &url).await.unwrap();
    let mut conn = db.conn();
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (id INT PRIMARY KEY, balance INT)",
        &[],
    )
    .await
    .unwrap();
    conn.execute("DELETE FROM accounts", &[]).await.unwrap();
    conn.execute(
        "INSERT INTO accounts (id, balance) VALUES (?, ?), (?, ?)",
        &[
            SqlValue::Int(1),
            SqlValue::Int(100),
            SqlValue::Int(2),
            SqlValue::Int(0),
        ],
    )
    .await
    .unwrap();

    db.exec_in_tx(transfer).await.unwrap();

    let balance = conn
        .count("SELECT balance FROM accounts WHERE id = ?", &[SqlValue::Int(2)])
        .await
        .unwrap();
    assert_eq!(balance, 40);
}
