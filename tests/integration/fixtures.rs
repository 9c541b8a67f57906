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

//! Shared fixtures: a scripted fake broker and a fully wired engine harness
//! over in-memory SQLite.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use tabellaria::dal::DAL;
use tabellaria::enqueue::EnqueueCoordinator;
use tabellaria::events::customers::CustomerRegistered;
use tabellaria::events::orders::{OrderCancelled, OrderPaid, OrderPlaced};
use tabellaria::relay::{CycleStats, DieselOutboxStore, OutboxRelay, OutboxStore, RelayConfig};
use tabellaria::{
    BrokerClient, BrokerMessage, Database, EventPublisher, EventRegistry, MessageSender,
    OutboxRecord, PublishError, SaveRetryPolicy, UnitOfWork, UniversalUuid,
};

static INIT: Once = Once::new();

pub const TEST_MAX_ATTEMPTS: i32 = 5;
pub const TEST_DESTINATION: &str = "domain-events";

/// Broker double: records every send attempt and fails on demand.
#[derive(Default)]
pub struct FakeBroker {
    delivered: Mutex<Vec<BrokerMessage>>,
    attempt_log: Mutex<Vec<UniversalUuid>>,
    failures: Mutex<VecDeque<PublishError>>,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Scripts the next send to fail with `error`.
    pub fn fail_next(&self, error: PublishError) {
        self.failures
            .lock()
            .unwrap()
            .push_back(error);
    }

    /// Messages that were accepted.
    pub fn delivered(&self) -> Vec<BrokerMessage> {
        self.delivered.lock().unwrap().clone()
    }

    /// Every send attempt, successful or not, by message id.
    pub fn attempt_log(&self) -> Vec<UniversalUuid> {
        self.attempt_log.lock().unwrap().clone()
    }
}

pub struct FakeBrokerClient {
    pub broker: Arc<FakeBroker>,
}

struct FakeSender {
    broker: Arc<FakeBroker>,
}

#[async_trait]
impl MessageSender for FakeSender {
    async fn send(&self, message: BrokerMessage) -> Result<(), PublishError> {
        self.broker.attempt_log.lock().unwrap().push(message.message_id);
        if let Some(error) = self.broker.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.broker.delivered.lock().unwrap().push(message);
        Ok(())
    }
}

#[async_trait]
impl BrokerClient for FakeBrokerClient {
    async fn create_sender(
        &self,
        _destination: &str,
    ) -> Result<Arc<dyn MessageSender>, PublishError> {
        Ok(Arc::new(FakeSender {
            broker: self.broker.clone(),
        }))
    }
}

/// Everything a scenario needs: enqueue side, relay side, and the doubles.
pub struct Harness {
    pub database: Database,
    pub dal: DAL,
    pub registry: Arc<EventRegistry>,
    pub coordinator: EnqueueCoordinator,
    pub relay: OutboxRelay,
    pub broker: Arc<FakeBroker>,
}

impl Harness {
    /// Runs one relay cycle.
    pub async fn tick(&self) -> CycleStats {
        self.relay
            .run_cycle(&CancellationToken::new())
            .await
            .expect("relay cycle failed")
    }

    /// Builds a fresh relay over the same database, as a restarted process
    /// would.
    pub fn restarted_relay(&self) -> OutboxRelay {
        build_relay(&self.database, self.registry.clone(), self.broker.clone())
    }
}

/// Inserts an outbox record through its only legitimate write path: a
/// committed unit of work.
pub async fn insert_record(database: &Database, record: &OutboxRecord) {
    let mut uow = UnitOfWork::new(
        database.clone(),
        SaveRetryPolicy::default(),
        CancellationToken::new(),
    );
    uow.begin().await.expect("begin");
    uow.outbox().insert(record);
    uow.save().await.expect("save");
    uow.commit().await.expect("commit");
}

pub fn test_registry() -> EventRegistry {
    let mut registry = EventRegistry::new();
    registry.register::<CustomerRegistered>();
    registry.register::<OrderPlaced>();
    registry.register::<OrderPaid>();
    registry.register::<OrderCancelled>();
    registry
}

fn build_relay(
    database: &Database,
    registry: Arc<EventRegistry>,
    broker: Arc<FakeBroker>,
) -> OutboxRelay {
    let publisher = Arc::new(EventPublisher::new(
        Arc::new(FakeBrokerClient { broker }),
        Some(TEST_DESTINATION.to_string()),
    ));
    let store: Arc<dyn OutboxStore> =
        Arc::new(DieselOutboxStore::new(database.clone(), TEST_MAX_ATTEMPTS));

    OutboxRelay::new(
        store,
        registry,
        publisher,
        RelayConfig {
            poll_interval: std::time::Duration::from_millis(20),
            batch_size: 20,
            max_attempts: TEST_MAX_ATTEMPTS,
        },
    )
}

/// Wires a full harness over a fresh in-memory database.
pub async fn harness() -> Harness {
    INIT.call_once(|| tabellaria::init_logging(Some("tabellaria=debug")));

    // Pool size 1: every handle shares the single in-memory instance.
    let database = Database::new(":memory:", 1).expect("pool");
    database.run_migrations().await.expect("migrations");

    let registry = Arc::new(test_registry());
    let broker = FakeBroker::new();

    let coordinator = EnqueueCoordinator::new(
        database.clone(),
        registry.clone(),
        SaveRetryPolicy::default(),
        CancellationToken::new(),
    );

    let relay = build_relay(&database, registry.clone(), broker.clone());

    Harness {
        dal: DAL::new(database.clone()),
        database,
        registry,
        coordinator,
        relay,
        broker,
    }
}
