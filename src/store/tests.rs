#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;
use crate::storage::MemoryStorage;

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

fn expense(amount: Decimal, category: &str, date: DateTime<Utc>) -> NewExpense {
    NewExpense::new(amount, category, "", date)
}

fn memory_store() -> ExpenseStore<MemoryStorage> {
    ExpenseStore::new(MemoryStorage::new())
}

struct BrokenStorage;

impl KeyValueStore for BrokenStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Backend("disk on fire".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Backend("disk on fire".into()))
    }
}

// ── Partitioning ──────────────────────────────────────────────

#[test]
fn test_partition_key() {
    assert_eq!(partition_key("alice"), "expenses_alice");
    assert_eq!(partition_key("Alice Smith"), "expenses_Alice Smith");
}

#[test]
fn test_list_unknown_owner_is_empty() {
    let store = memory_store();
    assert!(store.list("nobody").is_empty());
}

#[tokio::test]
async fn test_owners_do_not_see_each_other() {
    let store = memory_store();
    let added = store
        .add("alice", expense(dec!(10), "Food", at(2024, 1, 10)))
        .await
        .unwrap();
    assert!(store.list("bob").iter().all(|e| e.id != added.id));
    assert!(store.list("bob").is_empty());
    assert_eq!(store.list("alice").len(), 1);
}

#[tokio::test]
async fn test_all_operations_use_the_same_key() {
    let store = memory_store();
    let a = store
        .add("alice", expense(dec!(1), "Food", at(2024, 1, 10)))
        .await
        .unwrap();
    store
        .add("alice", expense(dec!(2), "Food", at(2024, 1, 11)))
        .await
        .unwrap();
    store.delete("alice", &a.id).await.unwrap();

    assert_eq!(store.storage().keys(), vec!["expenses_alice".to_string()]);
    let ids: Vec<String> = store.list("alice").into_iter().map(|e| e.id).collect();
    assert_eq!(ids.len(), 1);
    assert!(!ids.contains(&a.id));
}

// ── add / list ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_is_date_descending() {
    let store = memory_store();
    let e1 = store
        .add("alice", expense(dec!(1), "Food", at(2024, 1, 10)))
        .await
        .unwrap();
    let e2 = store
        .add("alice", expense(dec!(2), "Food", at(2024, 1, 12)))
        .await
        .unwrap();
    let ids: Vec<String> = store.list("alice").into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![e2.id, e1.id]);
}

#[tokio::test]
async fn test_backdated_add_is_sorted_not_just_prepended() {
    let store = memory_store();
    let newer = store
        .add("alice", expense(dec!(1), "Food", at(2024, 3, 1)))
        .await
        .unwrap();
    let older = store
        .add("alice", expense(dec!(2), "Food", at(2024, 1, 1)))
        .await
        .unwrap();
    let listed = store.list("alice");
    assert_eq!(listed[0].id, newer.id);
    assert_eq!(listed[1].id, older.id);
}

#[tokio::test]
async fn test_equal_dates_list_newest_added_first() {
    let store = memory_store();
    let first = store
        .add("alice", expense(dec!(1), "Food", at(2024, 1, 10)))
        .await
        .unwrap();
    let second = store
        .add("alice", expense(dec!(2), "Food", at(2024, 1, 10)))
        .await
        .unwrap();
    let ids: Vec<String> = store.list("alice").into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn test_add_roundtrip_by_id() {
    let store = memory_store();
    let data = NewExpense::new(dec!(12.34), "Groceries", "weekly shop", at(2024, 2, 5));
    let before = Utc::now();
    let added = store.add("alice", data.clone()).await.unwrap();
    let after = Utc::now();

    let found = store
        .list("alice")
        .into_iter()
        .find(|e| e.id == added.id)
        .unwrap();
    assert_eq!(found.amount, data.amount);
    assert_eq!(found.category, data.category);
    assert_eq!(found.description, data.description);
    assert_eq!(found.date, data.date);
    assert_eq!(found.id, added.id);
    assert!(!found.id.is_empty());
    // Stored timestamps keep millisecond precision.
    let created_ms = found.created_at.timestamp_millis();
    assert!(created_ms >= before.timestamp_millis() && created_ms <= after.timestamp_millis());
}

#[tokio::test]
async fn test_high_precision_amount_roundtrips() {
    let store = memory_store();
    let added = store
        .add("alice", expense(dec!(1234567890123456.78), "Rent", at(2024, 1, 10)))
        .await
        .unwrap();
    assert_eq!(added.amount, dec!(1234567890123456.78));

    let listed = store.list("alice");
    assert_eq!(listed[0].amount, added.amount);
    assert_eq!(listed[0].amount.to_string(), "1234567890123456.78");
    let raw = store.storage().get("expenses_alice").unwrap().unwrap();
    assert!(raw.contains("1234567890123456.78"), "{raw}");
}

#[tokio::test]
async fn test_rapid_adds_get_unique_ids() {
    let store = memory_store();
    for i in 0..50 {
        store
            .add("alice", expense(Decimal::from(i), "Food", at(2024, 1, 10)))
            .await
            .unwrap();
    }
    let listed = store.list("alice");
    let ids: HashSet<&str> = listed.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(listed.len(), 50);
    assert_eq!(ids.len(), 50);
}

#[tokio::test]
async fn test_list_is_idempotent() {
    let store = memory_store();
    store
        .add("alice", expense(dec!(1), "Food", at(2024, 1, 10)))
        .await
        .unwrap();
    store
        .add("alice", expense(dec!(2), "Rent", at(2024, 1, 10)))
        .await
        .unwrap();
    let raw_before = store.storage().get("expenses_alice").unwrap();
    assert_eq!(store.list("alice"), store.list("alice"));
    assert_eq!(store.storage().get("expenses_alice").unwrap(), raw_before);
}

#[tokio::test]
async fn test_recent_limits_results() {
    let store = memory_store();
    for day in 1..=12 {
        store
            .add("alice", expense(dec!(1), "Food", at(2024, 1, day)))
            .await
            .unwrap();
    }
    let recent = store.recent("alice", 10);
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0].date, at(2024, 1, 12));
    assert_eq!(recent[9].date, at(2024, 1, 3));
    assert!(store.recent("bob", 10).is_empty());
}

// ── delete ────────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_removes_record() {
    let store = memory_store();
    let a = store
        .add("alice", expense(dec!(1), "Food", at(2024, 1, 10)))
        .await
        .unwrap();
    let b = store
        .add("alice", expense(dec!(2), "Food", at(2024, 1, 11)))
        .await
        .unwrap();
    store.delete("alice", &a.id).await.unwrap();
    let listed = store.list("alice");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, b.id);
}

#[tokio::test]
async fn test_delete_unknown_id_is_noop() {
    let store = memory_store();
    store
        .add("alice", expense(dec!(1), "Food", at(2024, 1, 10)))
        .await
        .unwrap();
    let before = store.list("alice");
    store.delete("alice", "no-such-id").await.unwrap();
    assert_eq!(store.list("alice"), before);
}

#[tokio::test]
async fn test_delete_for_unknown_owner_writes_nothing() {
    let store = memory_store();
    store.delete("ghost", "whatever").await.unwrap();
    assert!(store.storage().keys().is_empty());
}

#[tokio::test]
async fn test_delete_only_touches_its_owner() {
    let store = memory_store();
    let a = store
        .add("alice", expense(dec!(1), "Food", at(2024, 1, 10)))
        .await
        .unwrap();
    // Same id under another owner is a different record.
    store
        .storage()
        .insert_raw("expenses_bob", &serde_json::to_string(&[a.clone()]).unwrap());
    store.delete("bob", &a.id).await.unwrap();
    assert_eq!(store.list("alice").len(), 1);
    assert!(store.list("bob").is_empty());
}

// ── Failures ──────────────────────────────────────────────────

#[tokio::test]
async fn test_add_surfaces_write_failure() {
    let store = ExpenseStore::new(MemoryStorage::with_quota(400));
    store
        .add("alice", expense(dec!(1), "Food", at(2024, 1, 10)))
        .await
        .unwrap();
    let before = store.list("alice");

    let big = NewExpense::new(dec!(2), "Food", "x".repeat(1000), at(2024, 1, 11));
    let err = store.add("alice", big).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Write(StorageError::QuotaExceeded { .. })
    ));
    assert_eq!(store.list("alice"), before);
}

#[tokio::test]
async fn test_delete_surfaces_write_failure() {
    let storage = MemoryStorage::with_quota(0);
    let a = Expense {
        id: "a".into(),
        amount: dec!(1),
        category: "Food".into(),
        description: String::new(),
        date: at(2024, 1, 10),
        created_at: at(2024, 1, 10),
    };
    let b = Expense {
        id: "b".into(),
        ..a.clone()
    };
    storage.insert_raw("expenses_alice", &serde_json::to_string(&[a, b]).unwrap());
    let store = ExpenseStore::new(storage);
    let err = store.delete("alice", "a").await.unwrap_err();
    assert!(matches!(err, StoreError::Write(_)));
    assert_eq!(store.list("alice").len(), 2);
}

#[tokio::test]
async fn test_read_failure_lists_empty_but_blocks_writes() {
    let store = ExpenseStore::new(BrokenStorage);
    assert!(store.list("alice").is_empty());

    let err = store
        .add("alice", expense(dec!(1), "Food", at(2024, 1, 10)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Read(StorageError::Backend(_))));

    let err = store.delete("alice", "x").await.unwrap_err();
    assert!(matches!(err, StoreError::Read(_)));
}

// ── Malformed data ────────────────────────────────────────────

#[test]
fn test_corrupt_json_lists_empty() {
    let store = memory_store();
    store.storage().insert_raw("expenses_alice", "{not json");
    assert!(store.list("alice").is_empty());
}

#[test]
fn test_non_array_json_lists_empty() {
    let store = memory_store();
    store
        .storage()
        .insert_raw("expenses_alice", r#"{"id":"1","amount":3}"#);
    assert!(store.list("alice").is_empty());
    store.storage().insert_raw("expenses_alice", "null");
    assert!(store.list("alice").is_empty());
}

#[test]
fn test_malformed_entries_are_skipped() {
    let store = memory_store();
    let raw = r#"[
        {"id":"good","amount":5,"category":"Food","description":"","date":"2024-01-10T00:00:00.000Z","createdAt":"2024-01-10T00:00:00.000Z"},
        {"id":"bad-amount","amount":"five","category":"Food","description":"","date":"2024-01-10T00:00:00.000Z","createdAt":"2024-01-10T00:00:00.000Z"},
        {"id":"bad-date","amount":5,"category":"Food","description":"","date":"soon","createdAt":"2024-01-10T00:00:00.000Z"},
        42,
        "hello"
    ]"#;
    store.storage().insert_raw("expenses_alice", raw);
    let listed = store.list("alice");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "good");
}

#[test]
fn test_duplicate_ids_keep_first() {
    let store = memory_store();
    let raw = r#"[
        {"id":"1","amount":5,"category":"Food","description":"first","date":"2024-01-10T00:00:00.000Z","createdAt":"2024-01-10T00:00:00.000Z"},
        {"id":"1","amount":9,"category":"Food","description":"second","date":"2024-01-11T00:00:00.000Z","createdAt":"2024-01-11T00:00:00.000Z"}
    ]"#;
    store.storage().insert_raw("expenses_alice", raw);
    let listed = store.list("alice");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description, "first");
}

#[tokio::test]
async fn test_add_after_corruption_starts_fresh() {
    let store = memory_store();
    store.storage().insert_raw("expenses_alice", "garbage");
    let added = store
        .add("alice", expense(dec!(3), "Food", at(2024, 1, 10)))
        .await
        .unwrap();
    let listed = store.list("alice");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, added.id);
}

#[test]
fn test_reads_legacy_browser_data() {
    let store = memory_store();
    let raw = r#"[
        {"id":"1704900000000","amount":12.5,"category":"Food","description":"Pizza","date":"2024-01-09","createdAt":"2024-01-10T15:20:00.000Z"},
        {"id":"1704990000000","amount":3,"category":"Transit","description":"","date":"2024-01-11T08:00:00.000Z","createdAt":"2024-01-11T16:20:00.000Z"}
    ]"#;
    store.storage().insert_raw("expenses_alice", raw);
    let listed = store.list("alice");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, "1704990000000");
    assert_eq!(listed[1].amount, dec!(12.5));
}

#[test]
fn test_stored_amounts_past_the_sum_limit_still_summarize() {
    let store = memory_store();
    let raw = r#"[
        {"id":"a","amount":5e28,"category":"Food","date":"2024-01-09T12:00:00.000Z","createdAt":"2024-01-09T12:00:00.000Z"},
        {"id":"b","amount":5e28,"category":"Food","date":"2024-01-09T12:00:00.000Z","createdAt":"2024-01-09T12:00:00.000Z"}
    ]"#;
    store.storage().insert_raw("expenses_alice", raw);
    let listed = store.list("alice");
    assert_eq!(listed.len(), 2);

    let summary = crate::summarize(&listed, &at(2024, 1, 10));
    assert_eq!(summary.weekly_count, 2);
    assert_eq!(summary.weekly_total, Decimal::MAX);
}

// ── SQLite-backed store ───────────────────────────────────────

#[tokio::test]
async fn test_sqlite_backed_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("expenses.db");
    let id = {
        let store = ExpenseStore::new(crate::storage::SqliteStorage::open(&path).unwrap());
        store
            .add("alice", expense(dec!(0.1), "Food", at(2024, 1, 10)))
            .await
            .unwrap()
            .id
    };
    let store = ExpenseStore::new(crate::storage::SqliteStorage::open(&path).unwrap());
    let listed = store.list("alice");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].amount, dec!(0.1));
    store.delete("alice", &id).await.unwrap();
    assert!(store.list("alice").is_empty());
}
