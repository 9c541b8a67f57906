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

//! Engine assembly and lifecycle.
//!
//! [`OutboxEngine`] wires the pieces together: database pool, event
//! registry, publisher, enqueue coordinator, and the relay worker. Building
//! the engine runs pending migrations; `start` spawns the relay; `shutdown`
//! cancels cooperatively and waits for the loop to drain. The lifecycle is
//! one-way: a shut-down engine does not restart.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::broker::{BrokerClient, EventPublisher, InProcessBroker};
use crate::config::EngineConfig;
use crate::database::Database;
use crate::enqueue::EnqueueCoordinator;
use crate::error::EngineError;
use crate::events::{DomainEvent, EventRegistry};
use crate::relay::{DieselOutboxStore, HealthReport, OutboxRelay, OutboxStore, RelayConfig, RelayHandle};
use crate::retry::SaveRetryPolicy;

/// Builder for [`OutboxEngine`].
pub struct OutboxEngineBuilder {
    config: EngineConfig,
    registry: EventRegistry,
    broker: Option<Arc<dyn BrokerClient>>,
}

impl OutboxEngineBuilder {
    /// Registers an event schema with the engine's registry.
    pub fn register_event<E: DomainEvent>(mut self) -> Self {
        self.registry.register::<E>();
        self
    }

    /// Supplies the broker transport. Defaults to an in-process broker when
    /// not set.
    pub fn broker_client(mut self, client: Arc<dyn BrokerClient>) -> Self {
        self.broker = Some(client);
        self
    }

    /// Builds the engine: opens the pool and runs pending migrations.
    pub async fn build(self) -> Result<OutboxEngine, EngineError> {
        let config = self.config;
        let database = Database::new(config.db_connection_string(), config.db_pool_size())?;
        database.run_migrations().await?;

        let registry = Arc::new(self.registry);
        let broker = self
            .broker
            .unwrap_or_else(|| Arc::new(InProcessBroker::default()));
        let publisher = Arc::new(EventPublisher::new(
            broker,
            config.broker_destination().map(String::from),
        ));

        let cancel = CancellationToken::new();
        let retry = SaveRetryPolicy::new(config.db_retry_count());
        let coordinator = EnqueueCoordinator::new(
            database.clone(),
            registry.clone(),
            retry,
            cancel.child_token(),
        );

        let store: Arc<dyn OutboxStore> =
            Arc::new(DieselOutboxStore::new(database.clone(), config.max_attempts()));
        let relay = Arc::new(OutboxRelay::new(
            store,
            registry.clone(),
            publisher.clone(),
            RelayConfig {
                poll_interval: config.poll_interval(),
                batch_size: config.batch_size(),
                max_attempts: config.max_attempts(),
            },
        ));

        Ok(OutboxEngine {
            config,
            database,
            coordinator,
            relay,
            cancel,
            handle: None,
        })
    }
}

/// The assembled transactional outbox engine.
pub struct OutboxEngine {
    config: EngineConfig,
    database: Database,
    coordinator: EnqueueCoordinator,
    relay: Arc<OutboxRelay>,
    cancel: CancellationToken,
    handle: Option<RelayHandle>,
}

impl OutboxEngine {
    /// Starts building an engine from a validated configuration.
    pub fn builder(config: EngineConfig) -> OutboxEngineBuilder {
        OutboxEngineBuilder {
            config,
            registry: EventRegistry::new(),
            broker: None,
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared database handle.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// The command-execution entry point of the write path.
    pub fn coordinator(&self) -> &EnqueueCoordinator {
        &self.coordinator
    }

    /// Whether the relay is currently running.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Health probe: `ok` iff the relay's last cycle completed without a
    /// top-level error and the database and broker were reachable.
    pub fn health(&self) -> HealthReport {
        self.relay.health().report()
    }

    /// Spawns the relay worker.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.handle.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        let handle = self.relay.clone().start(self.cancel.child_token());
        self.handle = Some(handle);
        info!("outbox engine started");
        Ok(())
    }

    /// Stops the engine: cancels in-flight work cooperatively and waits for
    /// the relay loop to drain.
    pub async fn shutdown(&mut self) -> Result<(), EngineError> {
        let handle = self.handle.take().ok_or(EngineError::NotRunning)?;

        self.cancel.cancel();
        handle.shutdown();
        handle.join().await;
        info!("outbox engine stopped");
        Ok(())
    }
}

impl Drop for OutboxEngine {
    fn drop(&mut self) {
        // Cooperative stop for anything still running; join happens in
        // shutdown, which callers should prefer.
        self.cancel.cancel();
    }
}
