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

//! Full engine lifecycle: build, start, enqueue, background publish,
//! health, shutdown.

use std::sync::Arc;
use std::time::Duration;

use crate::fixtures::{FakeBroker, FakeBrokerClient};

use tabellaria::enqueue::commands::RegisterCustomer;
use tabellaria::events::customers::CustomerRegistered;
use tabellaria::events::orders::OrderPlaced;
use tabellaria::{EngineConfig, EngineError, OutboxEngine};

async fn build_engine(broker: Arc<FakeBroker>) -> OutboxEngine {
    let config = EngineConfig::builder()
        .db_connection_string(":memory:")
        .db_pool_size(1)
        .poll_interval(Duration::from_millis(20))
        .broker_destination("domain-events")
        .build()
        .unwrap();

    OutboxEngine::builder(config)
        .register_event::<CustomerRegistered>()
        .register_event::<OrderPlaced>()
        .broker_client(Arc::new(FakeBrokerClient { broker }))
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn engine_publishes_in_the_background_until_shutdown() {
    let broker = FakeBroker::new();
    let mut engine = build_engine(broker.clone()).await;

    engine.start().unwrap();
    assert!(engine.is_running());

    engine
        .coordinator()
        .execute(RegisterCustomer {
            name: "Ada".into(),
            email: "ada@example.com".into(),
        })
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if !broker.delivered().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("event was not published in time");

    assert!(engine.health().healthy);

    engine.shutdown().await.unwrap();
    assert!(!engine.is_running());
    assert_eq!(broker.delivered().len(), 1);
    assert_eq!(broker.delivered()[0].event_type, "customers.CustomerRegistered");
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let mut engine = build_engine(FakeBroker::new()).await;
    engine.start().unwrap();
    assert!(matches!(engine.start(), Err(EngineError::AlreadyRunning)));
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_without_start_is_rejected() {
    let mut engine = build_engine(FakeBroker::new()).await;
    assert!(matches!(
        engine.shutdown().await,
        Err(EngineError::NotRunning)
    ));
}

#[tokio::test]
async fn health_is_unreported_before_the_first_cycle() {
    let broker = FakeBroker::new();
    let engine = build_engine(broker).await;
    let report = engine.health();
    assert!(!report.healthy);
    assert!(report.last_cycle_at.is_none());
}
