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

//! Unit-of-work behavior against the real database.

use tokio_util::sync::CancellationToken;

use crate::fixtures;

use tabellaria::models::Customer;
use tabellaria::{SaveRetryPolicy, UnitOfWork};

fn uow(database: &tabellaria::Database) -> UnitOfWork {
    UnitOfWork::new(
        database.clone(),
        SaveRetryPolicy::default(),
        CancellationToken::new(),
    )
}

/// Saved-but-uncommitted writes are visible to reads on the same handle.
#[tokio::test]
async fn saved_writes_are_visible_within_the_transaction() {
    let h = fixtures::harness().await;
    let mut uow = uow(&h.database);
    uow.begin().await.unwrap();

    let customer = Customer::register("Ada", "ada@example.com");
    uow.customers().insert(&customer);

    // staged but not yet flushed: not visible
    assert!(uow.customers().find(customer.id).await.unwrap().is_none());

    uow.save().await.unwrap();
    let found = uow.customers().find(customer.id).await.unwrap();
    assert_eq!(found.unwrap().email, "ada@example.com");

    uow.rollback().await;
}

/// Rolled-back writes never reach the table.
#[tokio::test]
async fn rollback_discards_saved_writes() {
    let h = fixtures::harness().await;
    let mut uow = uow(&h.database);
    uow.begin().await.unwrap();

    let customer = Customer::register("Gone", "gone@example.com");
    uow.customers().insert(&customer);
    uow.save().await.unwrap();
    uow.rollback().await;

    assert!(h
        .dal
        .customers()
        .get_by_id(customer.id)
        .await
        .unwrap()
        .is_none());
}

/// Committed writes are visible outside the unit of work.
#[tokio::test]
async fn commit_publishes_writes_to_other_handles() {
    let h = fixtures::harness().await;
    let mut uow = uow(&h.database);
    uow.begin().await.unwrap();

    let customer = Customer::register("Kept", "kept@example.com");
    uow.customers().insert(&customer);
    uow.save().await.unwrap();
    uow.commit().await.unwrap();

    let found = h.dal.customers().get_by_id(customer.id).await.unwrap();
    assert_eq!(found.unwrap().name, "Kept");
}

/// Commit flushes writes that were staged after the last explicit save.
#[tokio::test]
async fn commit_flushes_pending_writes() {
    let h = fixtures::harness().await;
    let mut uow = uow(&h.database);
    uow.begin().await.unwrap();

    let customer = Customer::register("Implicit", "implicit@example.com");
    uow.customers().insert(&customer);
    uow.commit().await.unwrap();

    assert!(h
        .dal
        .customers()
        .get_by_id(customer.id)
        .await
        .unwrap()
        .is_some());
}

/// The handle is reusable for a new transaction after commit.
#[tokio::test]
async fn handle_supports_sequential_transactions() {
    let h = fixtures::harness().await;
    let mut uow = uow(&h.database);

    uow.begin().await.unwrap();
    let first = Customer::register("First", "first@example.com");
    uow.customers().insert(&first);
    uow.commit().await.unwrap();

    uow.begin().await.unwrap();
    let second = Customer::register("Second", "second@example.com");
    uow.customers().insert(&second);
    uow.commit().await.unwrap();

    assert!(h.dal.customers().get_by_id(first.id).await.unwrap().is_some());
    assert!(h.dal.customers().get_by_id(second.id).await.unwrap().is_some());
}
