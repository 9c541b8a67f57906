/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Outbox DAL invariants against the real (SQLite) table.

use crate::fixtures::{self, TEST_MAX_ATTEMPTS};

use tabellaria::{OutboxRecord, UniversalTimestamp};

fn record() -> OutboxRecord {
    OutboxRecord::new("orders.OrderPlaced", b"{}".to_vec())
}

/// Law: `mark_processed(id, t1)` then `mark_processed(id, t2)` leaves `t1`.
#[tokio::test]
async fn mark_processed_is_idempotent() {
    let h = fixtures::harness().await;
    let r = record();
    let id = r.id;
    fixtures::insert_record(&h.database, &r).await;

    let t1 = UniversalTimestamp::now();
    h.dal.outbox().mark_processed(id, t1).await.unwrap();
    let t2 = UniversalTimestamp(t1.0 + chrono::Duration::seconds(30));
    h.dal.outbox().mark_processed(id, t2).await.unwrap();

    let row = h.dal.outbox().get_by_id(id).await.unwrap().unwrap();
    let processed = row.processed_on_utc.unwrap();
    assert_eq!(
        processed.0.timestamp_micros(),
        t1.0.timestamp_micros(),
        "second mark must not overwrite the first"
    );
    // the no-op second mark did not double-count the attempt
    assert_eq!(row.attempts, 1);
    assert!(row.last_error.is_none());
}

/// Law: `attempts` never decreases across observations.
#[tokio::test]
async fn attempts_are_monotonic() {
    let h = fixtures::harness().await;
    let r = record();
    let id = r.id;
    fixtures::insert_record(&h.database, &r).await;

    h.dal.outbox().mark_failed(id, "first failure", 3).await.unwrap();
    h.dal.outbox().mark_failed(id, "stale writer", 1).await.unwrap();

    let row = h.dal.outbox().get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.attempts, 3);
    assert_eq!(row.last_error.as_deref(), Some("first failure"));
}

/// Law: a record at the attempt ceiling is never fetched again.
#[tokio::test]
async fn quarantined_records_are_excluded_from_fetch() {
    let h = fixtures::harness().await;
    let quarantined = record();
    let live = record();
    fixtures::insert_record(&h.database, &quarantined).await;
    fixtures::insert_record(&h.database, &live).await;

    h.dal
        .outbox()
        .mark_failed(quarantined.id, "poison", TEST_MAX_ATTEMPTS)
        .await
        .unwrap();

    let batch = h
        .dal
        .outbox()
        .fetch_unpublished(10, TEST_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, live.id);

    // still inspectable, just not a publication candidate
    let row = h.dal.outbox().get_by_id(quarantined.id).await.unwrap().unwrap();
    assert_eq!(row.attempts, TEST_MAX_ATTEMPTS);
    assert!(row.processed_on_utc.is_none());
}

/// Processed records stop being publication candidates.
#[tokio::test]
async fn processed_records_are_excluded_from_fetch() {
    let h = fixtures::harness().await;
    let r = record();
    let id = r.id;
    fixtures::insert_record(&h.database, &r).await;

    h.dal
        .outbox()
        .mark_processed(id, UniversalTimestamp::now())
        .await
        .unwrap();

    let batch = h
        .dal
        .outbox()
        .fetch_unpublished(10, TEST_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert!(batch.is_empty());

    // failures arriving after processing are ignored
    h.dal.outbox().mark_failed(id, "late failure", 9).await.unwrap();
    let row = h.dal.outbox().get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.attempts, 1);
    assert!(row.last_error.is_none());
}

/// Fetch returns oldest-first with the id as tie-break, capped at the limit.
#[tokio::test]
async fn fetch_is_ordered_and_limited() {
    let h = fixtures::harness().await;

    let base = UniversalTimestamp::now();
    let mut ids = Vec::new();
    for i in 0..5 {
        let mut r = record();
        r.occurred_on_utc = UniversalTimestamp(base.0 + chrono::Duration::milliseconds(i));
        ids.push(r.id);
        fixtures::insert_record(&h.database, &r).await;
    }

    let batch = h
        .dal
        .outbox()
        .fetch_unpublished(3, TEST_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[0].id, ids[0]);
    assert_eq!(batch[1].id, ids[1]);
    assert_eq!(batch[2].id, ids[2]);
}

/// Payload bytes survive the table round trip untouched.
#[tokio::test]
async fn payload_bytes_round_trip() {
    let h = fixtures::harness().await;
    let payload = serde_json::to_vec(&serde_json::json!({
        "order_id": "6a1f0f46-8f0c-4c6f-9d6f-2f6f0e8d9b7a",
        "total_cents": 123456,
        "note": "unicode \u{2713} and emoji \u{1F4E6}"
    }))
    .unwrap();
    let r = OutboxRecord::new("orders.OrderPlaced", payload.clone());
    fixtures::insert_record(&h.database, &r).await;

    let row = h.dal.outbox().get_by_id(r.id).await.unwrap().unwrap();
    assert_eq!(row.payload, payload);
    assert_eq!(row.type_tag, "orders.OrderPlaced");
}
