//! Integration tests for the nullable column wrappers, bound and decoded
//! through SQLite.

use chrono::{NaiveDate, TimeZone, Utc};
use easydb::{SqlBool, SqlDate, SqlDateTime, SqlFloat, SqlInt, SqlJson, SqlStr};
use sqlx::SqlitePool;

async fn setup_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::query(
        "CREATE TABLE items (
            id INTEGER PRIMARY KEY,
            label TEXT,
            qty INTEGER,
            weight REAL,
            active BOOLEAN,
            born DATE,
            seen DATETIME,
            meta TEXT
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool
}

#[derive(Debug, sqlx::FromRow)]
struct Item {
    label: SqlStr,
    qty: SqlInt,
    weight: SqlFloat,
    active: SqlBool,
    born: SqlDate,
    seen: SqlDateTime,
    meta: SqlJson,
}

#[tokio::test]
async fn test_present_values_round_trip() {
    let pool = setup_pool().await;
    let born = SqlDate::new(NaiveDate::from_ymd_opt(1990, 5, 17).unwrap());
    let seen = SqlDateTime::new(Utc.with_ymd_and_hms(2021, 3, 4, 15, 23, 1).unwrap());
    let mut meta = SqlJson::null();
    meta.set_field("tag", serde_json::json!("new"));

    sqlx::query(
        "INSERT INTO items (id, label, qty, weight, active, born, seen, meta)
         VALUES (1, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(SqlStr::from("widget"))
    .bind(SqlInt::new(12))
    .bind(SqlFloat::new(2.5))
    .bind(SqlBool::new(true))
    .bind(born)
    .bind(seen.clone())
    .bind(meta.clone())
    .execute(&pool)
    .await
    .unwrap();

    let item: Item = sqlx::query_as("SELECT * FROM items WHERE id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(item.label.to_string(), "widget");
    assert_eq!(item.qty.value_or_zero(), 12);
    assert_eq!(item.weight.value_or_zero(), 2.5);
    assert_eq!(item.active.value_or_zero(), true);
    assert_eq!(item.born.to_string(), "1990-05-17");
    assert_eq!(item.seen.get(), seen.get());
    assert_eq!(item.meta.field("tag"), Some(&serde_json::json!("new")));
}

#[tokio::test]
async fn test_null_decodes_to_absent_and_json_zero_values() {
    let pool = setup_pool().await;
    sqlx::query("INSERT INTO items (id) VALUES (1)")
        .execute(&pool)
        .await
        .unwrap();

    let item: Item = sqlx::query_as("SELECT * FROM items WHERE id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert!(item.label.is_null());
    assert!(item.qty.is_null());
    assert!(item.weight.is_null());
    assert!(item.active.is_null());
    assert!(item.born.is_null());
    assert!(item.seen.is_null());
    assert!(item.meta.is_null());

    // JSON encoding of the absent state is the zero value, never null.
    assert_eq!(serde_json::to_string(&item.label).unwrap(), "\"\"");
    assert_eq!(serde_json::to_string(&item.qty).unwrap(), "0");
    assert_eq!(serde_json::to_string(&item.active).unwrap(), "false");
    assert_eq!(serde_json::to_string(&item.meta).unwrap(), "{}");
}

#[tokio::test]
async fn test_absent_encodes_back_to_null() {
    let pool = setup_pool().await;
    sqlx::query("INSERT INTO items (id, label, qty) VALUES (1, ?, ?)")
        .bind(SqlStr::null())
        .bind(SqlInt::null())
        .execute(&pool)
        .await
        .unwrap();

    let (label, qty): (Option<String>, Option<i64>) =
        sqlx::query_as("SELECT label, qty FROM items WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(label.is_none());
    assert!(qty.is_none());
}

#[tokio::test]
async fn test_date_decodes_from_timestamp_shaped_text() {
    let pool = setup_pool().await;
    // Stored through another writer without canonical formatting.
    sqlx::query("INSERT INTO items (id, born) VALUES (1, '2021-03-04 15:23:01')")
        .execute(&pool)
        .await
        .unwrap();

    let born: SqlDate = sqlx::query_scalar("SELECT born FROM items WHERE id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(born.to_string(), "2021-03-04");
}

#[tokio::test]
async fn test_undecodable_date_is_a_hard_error() {
    let pool = setup_pool().await;
    sqlx::query("INSERT INTO items (id, born) VALUES (1, 'garbage')")
        .execute(&pool)
        .await
        .unwrap();

    let result: Result<SqlDate, _> = sqlx::query_scalar("SELECT born FROM items WHERE id = 1")
        .fetch_one(&pool)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_datetime_layout_variants_decode_to_same_instant() {
    let pool = setup_pool().await;
    sqlx::query(
        "INSERT INTO items (id, seen) VALUES
            (1, '2021-03-04 15:23:01'),
            (2, '2021-03-04T15:23:01Z'),
            (3, '2021-03-04T23:23:01+08:00')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let seen: Vec<SqlDateTime> =
        sqlx::query_scalar("SELECT seen FROM items ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    let expected = Utc.with_ymd_and_hms(2021, 3, 4, 15, 23, 1).unwrap();
    for s in seen {
        assert_eq!(s.get(), Some(expected));
    }
}
