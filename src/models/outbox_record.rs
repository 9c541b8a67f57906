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

//! Outbox Record Model
//!
//! The central entity of the engine: one row per domain event awaiting
//! publication. Records are created inside the same transaction as the
//! domain mutation they describe, fetched by the relay once that transaction
//! commits, and either marked processed (terminal success) or retried until
//! the attempt ceiling (terminal quarantine).

use serde::{Deserialize, Serialize};

use crate::database::schema::outbox_records;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};

/// A domain event awaiting publication (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Identifier assigned at enqueue; doubles as the broker message id so
    /// consumers can deduplicate.
    pub id: UniversalUuid,
    /// Stable name of the event schema; opaque to the engine.
    pub type_tag: String,
    /// Self-contained payload bytes produced by the event serializer.
    pub payload: Vec<u8>,
    /// When the event was emitted; defines the fetch order.
    pub occurred_on_utc: UniversalTimestamp,
    /// Set exactly once, when publication is confirmed.
    pub processed_on_utc: Option<UniversalTimestamp>,
    /// Publish attempts so far; never decreases.
    pub attempts: i32,
    /// Reason for the most recent failure; cleared on success.
    pub last_error: Option<String>,
}

impl OutboxRecord {
    /// Creates a fresh, unpublished record for an encoded event.
    pub fn new(type_tag: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: UniversalUuid::new_v4(),
            type_tag: type_tag.into(),
            payload,
            occurred_on_utc: UniversalTimestamp::now(),
            processed_on_utc: None,
            attempts: 0,
            last_error: None,
        }
    }

    /// Whether publication has been confirmed.
    pub fn is_processed(&self) -> bool {
        self.processed_on_utc.is_some()
    }

    /// Whether the record has reached the attempt ceiling.
    pub fn is_quarantined(&self, max_attempts: i32) -> bool {
        self.attempts >= max_attempts
    }
}

/// Database row for an outbox record.
#[derive(Debug, Clone, diesel::Queryable, diesel::Insertable)]
#[diesel(table_name = outbox_records)]
pub struct OutboxRecordRow {
    pub id: Vec<u8>,
    pub type_tag: String,
    pub payload: Vec<u8>,
    pub occurred_on_utc: chrono::NaiveDateTime,
    pub processed_on_utc: Option<chrono::NaiveDateTime>,
    pub attempts: i32,
    pub last_error: Option<String>,
}

impl From<&OutboxRecord> for OutboxRecordRow {
    fn from(record: &OutboxRecord) -> Self {
        Self {
            id: record.id.as_bytes().to_vec(),
            type_tag: record.type_tag.clone(),
            payload: record.payload.clone(),
            occurred_on_utc: record.occurred_on_utc.to_naive(),
            processed_on_utc: record.processed_on_utc.map(|t| t.to_naive()),
            attempts: record.attempts,
            last_error: record.last_error.clone(),
        }
    }
}

impl TryFrom<OutboxRecordRow> for OutboxRecord {
    type Error = uuid::Error;

    fn try_from(row: OutboxRecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UniversalUuid::from_bytes(&row.id)?,
            type_tag: row.type_tag,
            payload: row.payload,
            occurred_on_utc: UniversalTimestamp::from_naive(row.occurred_on_utc),
            processed_on_utc: row.processed_on_utc.map(UniversalTimestamp::from_naive),
            attempts: row.attempts,
            last_error: row.last_error,
        })
    }
}
