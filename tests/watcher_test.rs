//! Integration test for the changefeed watcher.
//!
//! Requires a running CockroachDB cluster with rangefeeds available.
//! Set TEST_COCKROACH_URL environment variable to run this test.
//! Example: TEST_COCKROACH_URL="postgres://root@localhost:26257/test?sslmode=disable"

use chrono::Utc;
use easydb::{Backend, Database, Envelope, SqlValue, TableWatcher};
use std::time::Duration;

#[tokio::test]
async fn test_events_arrive_in_order() {
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
        "CREATE TABLE IF NOT EXISTS watch_events (id INT PRIMARY KEY, note STRING)",
        &[],
    )
    .await
    .unwrap();
    conn.execute("DELETE FROM watch_events", &[]).await.unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let watcher = TableWatcher::new(url.clone());
    let resume = Utc::now();
    let handle = tokio::spawn(async move {
        let _ = watcher
            .watch_tables(&["watch_events"], resume, Envelope::Row, |table, key, value| {
                let _ = tx.send((table.to_string(), key.to_string(), value.to_string()));
            })
            .await;
    });

    // Give the changefeed time to attach before writing.
    tokio::time::sleep(Duration::from_secs(2)).await;
    for i in 1..=3i64 {
        conn.execute(
            "INSERT INTO watch_events (id, note) VALUES (?, ?)",
            &[SqlValue::Int(i), SqlValue::from(format!("note{}", i))],
        )
        .await
        .unwrap();
    }

    let mut events = Vec::new();
    while events.len() < 3 {
        match tokio::time::timeout(Duration::from_secs(15), rx.recv()).await {
            Ok(Some(event)) => events.push(event),
            _ => break,
        }
    }
    handle.abort();

    assert_eq!(events.len(), 3);
    for (i, (table, key, value)) in events.iter().enumerate() {
        assert_eq!(table, "watch_events");
        assert!(key.contains(&(i as i64 + 1).to_string()), "key: {}", key);
        assert!(value.contains(&format!("note{}", i + 1)), "value: {}", value);
    }
}
