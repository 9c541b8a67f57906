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

//! End-to-end relay scenarios: enqueue through the coordinator, publish
//! through relay cycles, observe the fake broker and the table.

use crate::fixtures::{self, TEST_MAX_ATTEMPTS};

use tabellaria::broker::CONTENT_TYPE_JSON;
use tabellaria::enqueue::commands::{PlaceOrder, RegisterCustomer};
use tabellaria::{OutboxRecord, PublishError};

/// Happy path: one command, one event, one message, one processed row.
#[tokio::test]
async fn publishes_a_committed_event_end_to_end() {
    let h = fixtures::harness().await;

    h.coordinator
        .execute(RegisterCustomer {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
        })
        .await
        .unwrap();

    let pending = h
        .dal
        .outbox()
        .fetch_unpublished(10, TEST_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    let record = &pending[0];
    assert_eq!(record.attempts, 0);
    assert!(record.processed_on_utc.is_none());

    let stats = h.tick().await;
    assert_eq!(stats.published, 1);

    let delivered = h.broker.delivered();
    assert_eq!(delivered.len(), 1);
    let message = &delivered[0];
    assert_eq!(message.message_id, record.id);
    assert_eq!(message.correlation_id, record.id);
    assert_eq!(message.content_type, CONTENT_TYPE_JSON);
    assert_eq!(message.event_type, "customers.CustomerRegistered");
    assert_eq!(message.subject, "CustomerRegistered");
    assert_eq!(message.destination, fixtures::TEST_DESTINATION);

    let row = h.dal.outbox().get_by_id(record.id).await.unwrap().unwrap();
    assert!(row.processed_on_utc.is_some());
    assert!(row.last_error.is_none());
}

/// Transient broker failure: first tick records the failure, second tick
/// publishes; both attempts carry the same message id.
#[tokio::test]
async fn retries_after_a_transient_broker_failure() {
    let h = fixtures::harness().await;

    let customer_id = h
        .coordinator
        .execute(RegisterCustomer {
            name: "Grace Hopper".into(),
            email: "grace@example.com".into(),
        })
        .await
        .unwrap();
    h.tick().await;

    h.coordinator
        .execute(PlaceOrder {
            customer_id,
            total_cents: 9900,
        })
        .await
        .unwrap();
    let record_id = h
        .dal
        .outbox()
        .fetch_unpublished(10, TEST_MAX_ATTEMPTS)
        .await
        .unwrap()[0]
        .id;

    h.broker.fail_next(PublishError::Busy("server busy".into()));

    h.tick().await;
    let after_first = h.dal.outbox().get_by_id(record_id).await.unwrap().unwrap();
    assert_eq!(after_first.attempts, 1);
    assert!(after_first.last_error.as_deref().unwrap().contains("busy"));
    assert!(after_first.processed_on_utc.is_none());

    h.tick().await;
    let after_second = h.dal.outbox().get_by_id(record_id).await.unwrap().unwrap();
    assert_eq!(after_second.attempts, 2);
    assert!(after_second.processed_on_utc.is_some());
    assert!(after_second.last_error.is_none());

    let attempts: Vec<_> = h
        .broker
        .attempt_log()
        .into_iter()
        .filter(|id| *id == record_id)
        .collect();
    assert_eq!(attempts.len(), 2);
}

/// Unknown event type: quarantined on the first tick, never published.
#[tokio::test]
async fn quarantines_records_with_unknown_type_tags() {
    let h = fixtures::harness().await;

    let record = OutboxRecord::new("does.not.Exist", b"{}".to_vec());
    let id = record.id;
    fixtures::insert_record(&h.database, &record).await;

    let stats = h.tick().await;
    assert_eq!(stats.quarantined, 1);
    assert!(h.broker.delivered().is_empty());
    assert!(h.broker.attempt_log().is_empty());

    let row = h.dal.outbox().get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.attempts, TEST_MAX_ATTEMPTS);
    assert!(row.last_error.as_deref().unwrap().contains("does.not.Exist"));
    assert!(row.processed_on_utc.is_none());

    // excluded from every later fetch
    let stats = h.tick().await;
    assert_eq!(stats.fetched, 0);
}

/// Order preference: events enqueued in separate transactions publish
/// oldest-first within one cycle.
#[tokio::test]
async fn publishes_in_occurrence_order_within_a_cycle() {
    let h = fixtures::harness().await;

    let first = h
        .coordinator
        .execute(RegisterCustomer {
            name: "First".into(),
            email: "first@example.com".into(),
        })
        .await
        .unwrap();
    let second = h
        .coordinator
        .execute(RegisterCustomer {
            name: "Second".into(),
            email: "second@example.com".into(),
        })
        .await
        .unwrap();

    let stats = h.tick().await;
    assert_eq!(stats.published, 2);

    let delivered = h.broker.delivered();
    let first_body: serde_json::Value = serde_json::from_slice(&delivered[0].body).unwrap();
    let second_body: serde_json::Value = serde_json::from_slice(&delivered[1].body).unwrap();
    assert_eq!(first_body["customer_id"], serde_json::json!(first.as_uuid()));
    assert_eq!(second_body["customer_id"], serde_json::json!(second.as_uuid()));
}

/// Crash between commit and publish: a fresh relay over the same database
/// picks the record up, and the message id is the record id from before the
/// "crash".
#[tokio::test]
async fn a_restarted_relay_picks_up_committed_records() {
    let h = fixtures::harness().await;

    h.coordinator
        .execute(RegisterCustomer {
            name: "Margaret".into(),
            email: "margaret@example.com".into(),
        })
        .await
        .unwrap();

    let record_id = h
        .dal
        .outbox()
        .fetch_unpublished(10, TEST_MAX_ATTEMPTS)
        .await
        .unwrap()[0]
        .id;

    // the first relay dies before ever ticking
    drop(h.restarted_relay());

    let relay = h.restarted_relay();
    let stats = relay
        .run_cycle(&tokio_util::sync::CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.published, 1);

    let delivered = h.broker.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].message_id, record_id);
}

/// A cycle never publishes more than `batch_size` records.
#[tokio::test]
async fn bounded_work_per_cycle() {
    let h = fixtures::harness().await;

    for i in 0..25 {
        h.coordinator
            .execute(RegisterCustomer {
                name: format!("Customer {i}"),
                email: format!("c{i}@example.com"),
            })
            .await
            .unwrap();
    }

    // harness batch_size is 20
    let stats = h.tick().await;
    assert_eq!(stats.fetched, 20);
    assert_eq!(stats.published, 20);
    assert_eq!(h.broker.delivered().len(), 20);

    let stats = h.tick().await;
    assert_eq!(stats.published, 5);
}
