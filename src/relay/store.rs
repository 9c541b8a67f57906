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

//! Outbox store seam for the relay.
//!
//! The relay works against [`OutboxStore`] so it can run on the
//! diesel-backed store in production and on [`MemoryOutboxStore`] in tests
//! and single-process setups without a database.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::dal::DAL;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::database::Database;
use crate::error::StoreError;
use crate::models::outbox_record::OutboxRecord;

/// Relay-side view of the outbox table.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Up to `limit` unpublished records below the attempt ceiling, oldest
    /// first, ties broken by id.
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxRecord>, StoreError>;

    /// Confirms publication. Idempotent; the timestamp is set at most once,
    /// the successful attempt is counted, and `last_error` is cleared.
    async fn mark_processed(
        &self,
        id: UniversalUuid,
        when_utc: UniversalTimestamp,
    ) -> Result<(), StoreError>;

    /// Records a failed attempt: new attempt count plus the failure reason.
    async fn mark_failed(
        &self,
        id: UniversalUuid,
        error: &str,
        attempts: i32,
    ) -> Result<(), StoreError>;
}

/// Production store over the engine's database.
pub struct DieselOutboxStore {
    dal: DAL,
    max_attempts: i32,
}

impl DieselOutboxStore {
    pub fn new(database: Database, max_attempts: i32) -> Self {
        Self {
            dal: DAL::new(database),
            max_attempts,
        }
    }
}

#[async_trait]
impl OutboxStore for DieselOutboxStore {
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxRecord>, StoreError> {
        self.dal.outbox().fetch_unpublished(limit, self.max_attempts).await
    }

    async fn mark_processed(
        &self,
        id: UniversalUuid,
        when_utc: UniversalTimestamp,
    ) -> Result<(), StoreError> {
        self.dal.outbox().mark_processed(id, when_utc).await
    }

    async fn mark_failed(
        &self,
        id: UniversalUuid,
        error: &str,
        attempts: i32,
    ) -> Result<(), StoreError> {
        self.dal.outbox().mark_failed(id, error, attempts).await
    }
}

/// In-memory store with the same lifecycle semantics as the table.
pub struct MemoryOutboxStore {
    records: Mutex<Vec<OutboxRecord>>,
    max_attempts: i32,
}

impl MemoryOutboxStore {
    pub fn new(max_attempts: i32) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            max_attempts,
        }
    }

    /// Appends a record, bypassing any transactional path.
    pub fn insert(&self, record: OutboxRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }

    /// Snapshot of a record by id.
    pub fn get(&self, id: UniversalUuid) -> Option<OutboxRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Number of stored records (any state).
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OutboxStore for MemoryOutboxStore {
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxRecord>, StoreError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut candidates: Vec<OutboxRecord> = records
            .iter()
            .filter(|r| r.processed_on_utc.is_none() && r.attempts < self.max_attempts)
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            a.occurred_on_utc
                .cmp(&b.occurred_on_utc)
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(limit.max(0) as usize);
        Ok(candidates)
    }

    async fn mark_processed(
        &self,
        id: UniversalUuid,
        when_utc: UniversalTimestamp,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            if record.processed_on_utc.is_none() {
                record.processed_on_utc = Some(when_utc);
                record.attempts += 1;
                record.last_error = None;
            }
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: UniversalUuid,
        error: &str,
        attempts: i32,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            if record.processed_on_utc.is_none() && record.attempts <= attempts {
                record.attempts = attempts;
                record.last_error = Some(error.to_string());
            }
        }
        Ok(())
    }
}
