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

//! Outbox Relay Worker
//!
//! The long-running half of the engine:
//! - polls the store for unpublished records on a fixed interval
//! - decodes and publishes each record in fetched order
//! - records every outcome on the record itself, one write per record
//! - observes cooperative cancellation between records and during publish
//!
//! Ticks never overlap: a cycle that outruns the poll interval delays the
//! next tick. A cycle-level failure (for example, the database being
//! unreachable) is logged and the worker sleeps until the next tick; nothing
//! escapes to a caller.

pub mod health;
pub mod store;

pub use health::{HealthReport, RelayHealth};
pub use store::{DieselOutboxStore, MemoryOutboxStore, OutboxStore};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::EventPublisher;
use crate::database::universal_types::UniversalTimestamp;
use crate::error::{PublishError, StoreError};
use crate::events::EventRegistry;
use crate::models::outbox_record::OutboxRecord;

/// Relay cadence and batching parameters.
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Sleep between processing cycles.
    pub poll_interval: Duration,
    /// Maximum records fetched (and published) per cycle.
    pub batch_size: usize,
    /// Attempt ceiling; records at the ceiling are quarantined.
    pub max_attempts: i32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            batch_size: 20,
            max_attempts: 5,
        }
    }
}

/// Counters for one processing cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStats {
    pub fetched: usize,
    pub published: usize,
    pub failed: usize,
    pub quarantined: usize,
    broker_connection_failures: usize,
}

impl CycleStats {
    /// Whether the broker looked reachable during the cycle.
    pub fn broker_reachable(&self) -> bool {
        self.broker_connection_failures == 0
    }
}

/// Background worker moving records from the outbox to the broker.
pub struct OutboxRelay {
    store: Arc<dyn OutboxStore>,
    registry: Arc<EventRegistry>,
    publisher: Arc<EventPublisher>,
    config: RelayConfig,
    health: Arc<RelayHealth>,
}

impl OutboxRelay {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        registry: Arc<EventRegistry>,
        publisher: Arc<EventPublisher>,
        config: RelayConfig,
    ) -> Self {
        Self {
            store,
            registry,
            publisher,
            config,
            health: Arc::new(RelayHealth::new()),
        }
    }

    /// Shared handle to the relay's health probe.
    pub fn health(&self) -> Arc<RelayHealth> {
        self.health.clone()
    }

    /// Spawns the polling loop. The returned handle stops it.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> RelayHandle {
        let relay = self.clone();
        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            relay.run_loop(loop_cancel).await;
        });

        RelayHandle { cancel, task }
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval = ?self.config.poll_interval,
            batch_size = self.config.batch_size,
            max_attempts = self.config.max_attempts,
            "outbox relay started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.run_cycle(&cancel).await {
                        Ok(stats) => {
                            if stats.fetched > 0 {
                                info!(
                                    fetched = stats.fetched,
                                    published = stats.published,
                                    failed = stats.failed,
                                    quarantined = stats.quarantined,
                                    "relay cycle complete"
                                );
                            }
                            self.health.record_cycle(None, stats.broker_reachable());
                        }
                        Err(e) => {
                            error!(error = %e, "relay cycle failed");
                            self.health.record_cycle(Some(e.to_string()), true);
                        }
                    }
                }
            }
        }

        info!("outbox relay stopped");
    }

    /// Runs one processing cycle: fetch a batch, publish each record, record
    /// each outcome.
    ///
    /// Errors returned here are cycle-level (the fetch failed); per-record
    /// failures are absorbed into the record's own state.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleStats, StoreError> {
        let batch = self
            .store
            .fetch_unpublished(self.config.batch_size as i64)
            .await?;

        let mut stats = CycleStats {
            fetched: batch.len(),
            ..CycleStats::default()
        };

        for record in batch {
            if cancel.is_cancelled() {
                debug!("cancellation requested, leaving remaining records for the next relay");
                break;
            }
            self.process_record(record, cancel, &mut stats).await;
        }

        Ok(stats)
    }

    // One record, one outcome, one state-update write. A failed write is
    // logged and never aborts the rest of the batch.
    async fn process_record(
        &self,
        record: OutboxRecord,
        cancel: &CancellationToken,
        stats: &mut CycleStats,
    ) {
        let event = match self.registry.decode(&record.type_tag, &record.payload) {
            Ok(event) => event,
            Err(e) => {
                // Unknown or malformed payloads never publish; quarantine
                // immediately so the relay stops refetching them.
                warn!(id = %record.id, type_tag = %record.type_tag, error = %e, "undecodable record, quarantining");
                if let Err(mark_err) = self
                    .store
                    .mark_failed(record.id, &e.to_string(), self.config.max_attempts)
                    .await
                {
                    error!(id = %record.id, error = %mark_err, "failed to quarantine record");
                } else {
                    stats.quarantined += 1;
                }
                return;
            }
        };

        let publish_result = tokio::select! {
            _ = cancel.cancelled() => Err(PublishError::Cancelled),
            result = self.publisher.publish(&event, record.id) => result,
        };

        match publish_result {
            Ok(()) => {
                match self
                    .store
                    .mark_processed(record.id, UniversalTimestamp::now())
                    .await
                {
                    Ok(()) => stats.published += 1,
                    Err(e) => {
                        // The message is out; the record will be republished
                        // next cycle and consumers deduplicate on message_id.
                        error!(id = %record.id, error = %e, "published but failed to mark record");
                    }
                }
            }
            Err(e) => {
                if matches!(e, PublishError::Connection(_)) {
                    stats.broker_connection_failures += 1;
                }
                let attempts = record.attempts + 1;
                warn!(id = %record.id, attempts, error = %e, "publish failed");
                if let Err(mark_err) = self
                    .store
                    .mark_failed(record.id, &e.to_string(), attempts)
                    .await
                {
                    error!(id = %record.id, error = %mark_err, "failed to record publish failure");
                } else {
                    stats.failed += 1;
                }
            }
        }
    }
}

/// Handle for stopping and awaiting the relay loop.
pub struct RelayHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RelayHandle {
    /// Signals the loop to stop after the in-flight record.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Waits for the loop to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}
