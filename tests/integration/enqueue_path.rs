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

//! Transactional enqueue path: atomicity of domain rows and outbox records.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::fixtures::{self, TEST_MAX_ATTEMPTS};

use tabellaria::enqueue::commands::{CancelOrder, PayOrder, PlaceOrder, RegisterCustomer};
use tabellaria::events::orders::OrderPlaced;
use tabellaria::{
    Command, CommandError, CommandScope, DomainRuleError, Order, OrderStatus, UniversalUuid,
};

/// A command that stages a domain row and an event, then violates a rule.
/// Used to prove the rollback leaves nothing behind.
struct PlaceThenFail {
    customer_id: UniversalUuid,
    staged_order_id: Arc<Mutex<Option<UniversalUuid>>>,
}

#[async_trait]
impl Command for PlaceThenFail {
    type Output = ();

    async fn apply(&self, scope: &mut CommandScope<'_>) -> Result<(), CommandError> {
        let order = Order::place(self.customer_id, 100)?;
        *self.staged_order_id.lock().unwrap() = Some(order.id);
        scope.orders().insert(&order);
        scope.emit(&OrderPlaced {
            order_id: order.id,
            customer_id: order.customer_id,
            total_cents: order.total_cents,
        })?;

        Err(DomainRuleError::NonPositiveTotal(-1).into())
    }
}

/// S2: a domain-rule failure after staging rolls back both the domain row
/// and the outbox record; the broker sees nothing.
#[tokio::test]
async fn domain_rule_failure_rolls_back_domain_and_outbox_rows() {
    let h = fixtures::harness().await;

    let customer_id = h
        .coordinator
        .execute(RegisterCustomer {
            name: "Ada".into(),
            email: "ada@example.com".into(),
        })
        .await
        .unwrap();
    h.tick().await;

    let staged_order_id = Arc::new(Mutex::new(None));
    let result = h
        .coordinator
        .execute(PlaceThenFail {
            customer_id,
            staged_order_id: staged_order_id.clone(),
        })
        .await;
    assert!(matches!(result, Err(CommandError::DomainRule(_))));

    let order_id = staged_order_id.lock().unwrap().expect("command ran");
    assert!(h.dal.orders().get_by_id(order_id).await.unwrap().is_none());
    assert_eq!(
        h.dal
            .outbox()
            .count_unpublished(TEST_MAX_ATTEMPTS)
            .await
            .unwrap(),
        0
    );

    h.tick().await;
    assert_eq!(h.broker.delivered().len(), 1); // only the registration
}

/// Atomicity: a successful command persists its domain row and exactly one
/// outbox record per emitted event.
#[tokio::test]
async fn success_persists_domain_row_and_outbox_record_together() {
    let h = fixtures::harness().await;

    let customer_id = h
        .coordinator
        .execute(RegisterCustomer {
            name: "Grace".into(),
            email: "grace@example.com".into(),
        })
        .await
        .unwrap();

    let customer = h
        .dal
        .customers()
        .get_by_id(customer_id)
        .await
        .unwrap()
        .expect("customer row committed");
    assert_eq!(customer.email, "grace@example.com");

    let pending = h
        .dal
        .outbox()
        .fetch_unpublished(10, TEST_MAX_ATTEMPTS)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].type_tag, "customers.CustomerRegistered");

    let order_id = h
        .coordinator
        .execute(PlaceOrder {
            customer_id,
            total_cents: 2500,
        })
        .await
        .unwrap();

    let order = h
        .dal
        .orders()
        .get_by_id(order_id)
        .await
        .unwrap()
        .expect("order row committed");
    assert_eq!(order.status, OrderStatus::Placed);
    assert_eq!(order.total_cents, 2500);
    assert_eq!(
        h.dal
            .outbox()
            .count_unpublished(TEST_MAX_ATTEMPTS)
            .await
            .unwrap(),
        2
    );
}

/// Commands surface domain rules without touching the outbox.
#[tokio::test]
async fn domain_rules_surface_to_the_caller() {
    let h = fixtures::harness().await;

    let missing = UniversalUuid::new_v4();
    let result = h
        .coordinator
        .execute(PlaceOrder {
            customer_id: missing,
            total_cents: 100,
        })
        .await;
    assert!(matches!(
        result,
        Err(CommandError::DomainRule(DomainRuleError::CustomerNotFound(id))) if id == missing
    ));

    let result = h
        .coordinator
        .execute(PayOrder {
            order_id: missing,
        })
        .await;
    assert!(matches!(
        result,
        Err(CommandError::DomainRule(DomainRuleError::OrderNotFound(_)))
    ));

    assert_eq!(
        h.dal
            .outbox()
            .count_unpublished(TEST_MAX_ATTEMPTS)
            .await
            .unwrap(),
        0
    );
}

/// The full order lifecycle enqueues one event per state change, and a paid
/// order refuses cancellation.
#[tokio::test]
async fn order_lifecycle_emits_an_event_per_transition() {
    let h = fixtures::harness().await;

    let customer_id = h
        .coordinator
        .execute(RegisterCustomer {
            name: "Barbara".into(),
            email: "barbara@example.com".into(),
        })
        .await
        .unwrap();
    let order_id = h
        .coordinator
        .execute(PlaceOrder {
            customer_id,
            total_cents: 1200,
        })
        .await
        .unwrap();
    h.coordinator
        .execute(PayOrder { order_id })
        .await
        .unwrap();

    let result = h
        .coordinator
        .execute(CancelOrder {
            order_id,
            reason: "changed my mind".into(),
        })
        .await;
    assert!(matches!(
        result,
        Err(CommandError::DomainRule(DomainRuleError::CancelAfterPayment(_)))
    ));

    let order = h.dal.orders().get_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    // registered + placed + paid, nothing for the refused cancel
    let stats = h.tick().await;
    assert_eq!(stats.published, 3);
    let types: Vec<String> = h
        .broker
        .delivered()
        .iter()
        .map(|m| m.event_type.clone())
        .collect();
    assert_eq!(
        types,
        vec![
            "customers.CustomerRegistered",
            "orders.OrderPlaced",
            "orders.OrderPaid"
        ]
    );
}

/// Duplicate email registration is refused inside the same transaction
/// boundary that would have written the row.
#[tokio::test]
async fn duplicate_email_is_a_domain_rule_violation() {
    let h = fixtures::harness().await;

    h.coordinator
        .execute(RegisterCustomer {
            name: "One".into(),
            email: "same@example.com".into(),
        })
        .await
        .unwrap();

    let result = h
        .coordinator
        .execute(RegisterCustomer {
            name: "Two".into(),
            email: "same@example.com".into(),
        })
        .await;
    assert!(matches!(
        result,
        Err(CommandError::DomainRule(DomainRuleError::DuplicateEmail(_)))
    ));
    assert_eq!(
        h.dal
            .outbox()
            .count_unpublished(TEST_MAX_ATTEMPTS)
            .await
            .unwrap(),
        1
    );
}
