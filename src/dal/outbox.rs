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

//! Outbox Record Data Access Layer.
//!
//! Relay-side operations on the outbox table. Inserts are not exposed here:
//! records enter the table only through the enqueue coordinator's unit of
//! work, so they become visible to the relay strictly after the enclosing
//! transaction commits.
//!
//! Update semantics enforce the record lifecycle at the statement level:
//! - `mark_processed` only fires while `processed_on_utc` is NULL, so the
//!   publication timestamp is set at most once;
//! - every publish attempt counts: `mark_processed` increments `attempts`
//!   alongside setting the timestamp, `mark_failed` writes the caller's
//!   count;
//! - `mark_failed` never lowers the attempt counter and never touches
//!   processed records.

use diesel::prelude::*;

use super::DAL;
use crate::database::schema::outbox_records;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::database::BackendType;
use crate::error::StoreError;
use crate::models::outbox_record::{OutboxRecord, OutboxRecordRow};

/// Data access layer for outbox record operations.
#[derive(Clone)]
pub struct OutboxDAL<'a> {
    dal: &'a DAL,
}

impl<'a> OutboxDAL<'a> {
    /// Creates a new OutboxDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Fetches up to `limit` unpublished records below the attempt ceiling,
    /// oldest first, ties broken by id.
    pub async fn fetch_unpublished(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        match self.dal.database.backend() {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => self.fetch_unpublished_postgres(limit, max_attempts).await,
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => self.fetch_unpublished_sqlite(limit, max_attempts).await,
        }
    }

    #[cfg(feature = "postgres")]
    async fn fetch_unpublished_postgres(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let rows: Vec<OutboxRecordRow> = conn
            .interact(move |conn| {
                outbox_records::table
                    .filter(outbox_records::processed_on_utc.is_null())
                    .filter(outbox_records::attempts.lt(max_attempts))
                    .order((outbox_records::occurred_on_utc.asc(), outbox_records::id.asc()))
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows_to_records(rows)
    }

    #[cfg(feature = "sqlite")]
    async fn fetch_unpublished_sqlite(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let rows: Vec<OutboxRecordRow> = conn
            .interact(move |conn| {
                outbox_records::table
                    .filter(outbox_records::processed_on_utc.is_null())
                    .filter(outbox_records::attempts.lt(max_attempts))
                    .order((outbox_records::occurred_on_utc.asc(), outbox_records::id.asc()))
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows_to_records(rows)
    }

    /// Marks a record as published. Idempotent: the timestamp is written only
    /// while `processed_on_utc` is still NULL. The successful attempt is
    /// counted and `last_error` is cleared.
    pub async fn mark_processed(
        &self,
        id: UniversalUuid,
        when_utc: UniversalTimestamp,
    ) -> Result<(), StoreError> {
        match self.dal.database.backend() {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => self.mark_processed_postgres(id, when_utc).await,
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => self.mark_processed_sqlite(id, when_utc).await,
        }
    }

    #[cfg(feature = "postgres")]
    async fn mark_processed_postgres(
        &self,
        id: UniversalUuid,
        when_utc: UniversalTimestamp,
    ) -> Result<(), StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let id_bytes = id.as_bytes().to_vec();
        let when = when_utc.to_naive();

        conn.interact(move |conn| {
            diesel::update(
                outbox_records::table
                    .filter(outbox_records::id.eq(id_bytes))
                    .filter(outbox_records::processed_on_utc.is_null()),
            )
            .set((
                outbox_records::processed_on_utc.eq(Some(when)),
                outbox_records::last_error.eq(None::<String>),
                outbox_records::attempts.eq(outbox_records::attempts + 1),
            ))
            .execute(conn)
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn mark_processed_sqlite(
        &self,
        id: UniversalUuid,
        when_utc: UniversalTimestamp,
    ) -> Result<(), StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let id_bytes = id.as_bytes().to_vec();
        let when = when_utc.to_naive();

        conn.interact(move |conn| {
            diesel::update(
                outbox_records::table
                    .filter(outbox_records::id.eq(id_bytes))
                    .filter(outbox_records::processed_on_utc.is_null()),
            )
            .set((
                outbox_records::processed_on_utc.eq(Some(when)),
                outbox_records::last_error.eq(None::<String>),
                outbox_records::attempts.eq(outbox_records::attempts + 1),
            ))
            .execute(conn)
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Records a failed publish attempt: sets `last_error` and the new
    /// attempt count. The counter never decreases and processed records are
    /// left untouched.
    pub async fn mark_failed(
        &self,
        id: UniversalUuid,
        error: &str,
        attempts: i32,
    ) -> Result<(), StoreError> {
        match self.dal.database.backend() {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => self.mark_failed_postgres(id, error, attempts).await,
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => self.mark_failed_sqlite(id, error, attempts).await,
        }
    }

    #[cfg(feature = "postgres")]
    async fn mark_failed_postgres(
        &self,
        id: UniversalUuid,
        error: &str,
        attempts: i32,
    ) -> Result<(), StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let id_bytes = id.as_bytes().to_vec();
        let error = error.to_string();

        conn.interact(move |conn| {
            diesel::update(
                outbox_records::table
                    .filter(outbox_records::id.eq(id_bytes))
                    .filter(outbox_records::processed_on_utc.is_null())
                    .filter(outbox_records::attempts.le(attempts)),
            )
            .set((
                outbox_records::last_error.eq(Some(error)),
                outbox_records::attempts.eq(attempts),
            ))
            .execute(conn)
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn mark_failed_sqlite(
        &self,
        id: UniversalUuid,
        error: &str,
        attempts: i32,
    ) -> Result<(), StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let id_bytes = id.as_bytes().to_vec();
        let error = error.to_string();

        conn.interact(move |conn| {
            diesel::update(
                outbox_records::table
                    .filter(outbox_records::id.eq(id_bytes))
                    .filter(outbox_records::processed_on_utc.is_null())
                    .filter(outbox_records::attempts.le(attempts)),
            )
            .set((
                outbox_records::last_error.eq(Some(error)),
                outbox_records::attempts.eq(attempts),
            ))
            .execute(conn)
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Loads a single record by id.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<Option<OutboxRecord>, StoreError> {
        match self.dal.database.backend() {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => self.get_by_id_postgres(id).await,
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => self.get_by_id_sqlite(id).await,
        }
    }

    #[cfg(feature = "postgres")]
    async fn get_by_id_postgres(
        &self,
        id: UniversalUuid,
    ) -> Result<Option<OutboxRecord>, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let id_bytes = id.as_bytes().to_vec();

        let row: Option<OutboxRecordRow> = conn
            .interact(move |conn| {
                outbox_records::table
                    .filter(outbox_records::id.eq(id_bytes))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        row.map(|r| OutboxRecord::try_from(r).map_err(|e| StoreError::Corrupt(e.to_string())))
            .transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn get_by_id_sqlite(
        &self,
        id: UniversalUuid,
    ) -> Result<Option<OutboxRecord>, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let id_bytes = id.as_bytes().to_vec();

        let row: Option<OutboxRecordRow> = conn
            .interact(move |conn| {
                outbox_records::table
                    .filter(outbox_records::id.eq(id_bytes))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        row.map(|r| OutboxRecord::try_from(r).map_err(|e| StoreError::Corrupt(e.to_string())))
            .transpose()
    }

    /// Counts records still awaiting publication (for monitoring).
    pub async fn count_unpublished(&self, max_attempts: i32) -> Result<i64, StoreError> {
        match self.dal.database.backend() {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => self.count_unpublished_postgres(max_attempts).await,
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => self.count_unpublished_sqlite(max_attempts).await,
        }
    }

    #[cfg(feature = "postgres")]
    async fn count_unpublished_postgres(&self, max_attempts: i32) -> Result<i64, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let count: i64 = conn
            .interact(move |conn| {
                outbox_records::table
                    .filter(outbox_records::processed_on_utc.is_null())
                    .filter(outbox_records::attempts.lt(max_attempts))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    #[cfg(feature = "sqlite")]
    async fn count_unpublished_sqlite(&self, max_attempts: i32) -> Result<i64, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let count: i64 = conn
            .interact(move |conn| {
                outbox_records::table
                    .filter(outbox_records::processed_on_utc.is_null())
                    .filter(outbox_records::attempts.lt(max_attempts))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}

fn rows_to_records(rows: Vec<OutboxRecordRow>) -> Result<Vec<OutboxRecord>, StoreError> {
    rows.into_iter()
        .map(|r| OutboxRecord::try_from(r).map_err(|e| StoreError::Corrupt(e.to_string())))
        .collect()
}
