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

//! Unit of Work
//!
//! Scoped acquisition of a single database transaction plus the repository
//! handles that participate in it:
//! - `begin` opens a transaction on a dedicated pooled connection
//! - repository reads run on that connection, inside the transaction
//! - repository writes are staged and flushed by `save` (no commit)
//! - `commit` / `rollback` end the scope; dropping an active unit of work
//!   rolls back so a pooled connection is never recycled mid-transaction
//!
//! `save` retries transient faults (connection loss, deadlock, busy,
//! timeout) with exponential backoff. A retry opens a fresh transaction and
//! replays every write staged since `begin` — safe because nothing has been
//! committed yet. Staged writes become visible to reads on the same handle
//! once `save` has flushed them.

mod repositories;
mod staged;

pub use repositories::{CustomerRepository, OrderRepository, OutboxRepository};
pub use staged::StagedWrite;

use std::sync::Mutex;

use diesel::connection::{AnsiTransactionManager, TransactionManager};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::database::{BackendType, Database};
use crate::error::UnitOfWorkError;
use crate::retry::{SaveRetryPolicy, TransientErrorKind};

#[cfg(feature = "postgres")]
use crate::database::PgPooledConnection;

#[cfg(feature = "sqlite")]
use crate::database::SqlitePooledConnection;

/// A pooled connection of either backend, held for the lifetime of one
/// transaction.
pub(crate) enum AnyPooledConnection {
    #[cfg(feature = "postgres")]
    Postgres(PgPooledConnection),
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePooledConnection),
}

#[derive(Default)]
struct WriteLog {
    /// Writes already flushed to the open transaction.
    applied: Vec<StagedWrite>,
    /// Writes staged since the last `save`.
    pending: Vec<StagedWrite>,
}

/// Scoped holder of one database transaction.
pub struct UnitOfWork {
    database: Database,
    conn: Option<AnyPooledConnection>,
    active: bool,
    writes: Mutex<WriteLog>,
    retry: SaveRetryPolicy,
    cancel: CancellationToken,
}

impl UnitOfWork {
    /// Creates an idle unit of work. No connection is taken from the pool
    /// until `begin`.
    pub fn new(database: Database, retry: SaveRetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            database,
            conn: None,
            active: false,
            writes: Mutex::new(WriteLog::default()),
            retry,
            cancel,
        }
    }

    /// Whether a transaction is currently open on this handle.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Starts a new transaction.
    ///
    /// Fails with `AlreadyActive` if one is in progress on this handle.
    pub async fn begin(&mut self) -> Result<(), UnitOfWorkError> {
        if self.active {
            return Err(UnitOfWorkError::AlreadyActive);
        }
        self.check_cancelled()?;

        if self.conn.is_none() {
            self.conn = Some(self.acquire_connection().await?);
        }
        self.begin_transaction().await?;
        self.active = true;

        let mut log = self.writes.lock().unwrap_or_else(|e| e.into_inner());
        log.applied.clear();
        log.pending.clear();

        Ok(())
    }

    /// Flushes staged writes to the database without committing.
    ///
    /// Transient faults are retried up to the policy's budget; each retry
    /// opens a fresh transaction and replays the full write log.
    pub async fn save(&mut self) -> Result<(), UnitOfWorkError> {
        if !self.active {
            return Err(UnitOfWorkError::NotActive);
        }

        let pending = {
            let log = self.writes.lock().unwrap_or_else(|e| e.into_inner());
            if log.pending.is_empty() {
                return Ok(());
            }
            log.pending.clone()
        };

        let mut retries_used = 0u32;
        let mut replay = false;

        loop {
            self.check_cancelled()?;

            let batch = if replay {
                let log = self.writes.lock().unwrap_or_else(|e| e.into_inner());
                let mut batch = log.applied.clone();
                batch.extend_from_slice(&pending);
                batch
            } else {
                pending.clone()
            };

            match self.execute_writes(batch).await {
                Ok(()) => {
                    let mut log = self.writes.lock().unwrap_or_else(|e| e.into_inner());
                    let flushed = std::mem::take(&mut log.pending);
                    log.applied.extend(flushed);
                    return Ok(());
                }
                Err(UnitOfWorkError::Database(e)) => {
                    if self.retry.should_retry(&e, retries_used) {
                        retries_used += 1;
                        warn!(
                            error = %e,
                            retry = retries_used,
                            "transient database fault during save, retrying"
                        );
                        tokio::time::sleep(self.retry.backoff_delay(retries_used)).await;
                        self.restart_transaction().await?;
                        replay = true;
                    } else if TransientErrorKind::classify(&e).is_some() {
                        return Err(UnitOfWorkError::RetriesExhausted {
                            attempts: retries_used + 1,
                            source: e,
                        });
                    } else {
                        return Err(UnitOfWorkError::Database(e));
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Commits the active transaction.
    ///
    /// Any still-pending staged writes are flushed first. On commit failure
    /// a rollback is attempted and the original error is surfaced.
    pub async fn commit(&mut self) -> Result<(), UnitOfWorkError> {
        if !self.active {
            return Err(UnitOfWorkError::NotActive);
        }

        let has_pending = {
            let log = self.writes.lock().unwrap_or_else(|e| e.into_inner());
            !log.pending.is_empty()
        };
        if has_pending {
            if let Err(e) = self.save().await {
                self.rollback().await;
                return Err(e);
            }
        }

        let result = self.commit_transaction().await;
        self.active = false;
        {
            let mut log = self.writes.lock().unwrap_or_else(|e| e.into_inner());
            log.applied.clear();
            log.pending.clear();
        }

        match result {
            Ok(()) => {
                debug!("unit of work committed");
                Ok(())
            }
            Err(e) => {
                self.try_rollback_quiet().await;
                Err(e)
            }
        }
    }

    /// Rolls the active transaction back. Best-effort: failures are logged,
    /// never raised, and the handle is left inactive either way.
    pub async fn rollback(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        {
            let mut log = self.writes.lock().unwrap_or_else(|e| e.into_inner());
            log.applied.clear();
            log.pending.clear();
        }
        self.try_rollback_quiet().await;
    }

    /// Customer repository scoped to this transaction.
    pub fn customers(&self) -> CustomerRepository<'_> {
        CustomerRepository::new(self)
    }

    /// Order repository scoped to this transaction.
    pub fn orders(&self) -> OrderRepository<'_> {
        OrderRepository::new(self)
    }

    /// Outbox repository scoped to this transaction.
    pub fn outbox(&self) -> OutboxRepository<'_> {
        OutboxRepository::new(self)
    }

    pub(crate) fn stage(&self, write: StagedWrite) {
        let mut log = self.writes.lock().unwrap_or_else(|e| e.into_inner());
        log.pending.push(write);
    }

    pub(crate) fn connection(&self) -> Result<&AnyPooledConnection, UnitOfWorkError> {
        if !self.active {
            return Err(UnitOfWorkError::NotActive);
        }
        self.conn.as_ref().ok_or(UnitOfWorkError::NotActive)
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), UnitOfWorkError> {
        if self.cancel.is_cancelled() {
            Err(UnitOfWorkError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn acquire_connection(&self) -> Result<AnyPooledConnection, UnitOfWorkError> {
        match self.database.backend() {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => Ok(AnyPooledConnection::Postgres(
                self.database.get_postgres_connection().await?,
            )),
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => Ok(AnyPooledConnection::Sqlite(
                self.database.get_sqlite_connection().await?,
            )),
        }
    }

    async fn begin_transaction(&self) -> Result<(), UnitOfWorkError> {
        match self.conn.as_ref().ok_or(UnitOfWorkError::NotActive)? {
            #[cfg(feature = "postgres")]
            AnyPooledConnection::Postgres(conn) => conn
                .interact(|conn| AnsiTransactionManager::begin_transaction(conn))
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??,
            #[cfg(feature = "sqlite")]
            AnyPooledConnection::Sqlite(conn) => conn
                .interact(|conn| AnsiTransactionManager::begin_transaction(conn))
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??,
        }
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<(), UnitOfWorkError> {
        match self.conn.as_ref().ok_or(UnitOfWorkError::NotActive)? {
            #[cfg(feature = "postgres")]
            AnyPooledConnection::Postgres(conn) => conn
                .interact(|conn| AnsiTransactionManager::commit_transaction(conn))
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??,
            #[cfg(feature = "sqlite")]
            AnyPooledConnection::Sqlite(conn) => conn
                .interact(|conn| AnsiTransactionManager::commit_transaction(conn))
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??,
        }
        Ok(())
    }

    async fn try_rollback_quiet(&self) {
        let Some(conn) = self.conn.as_ref() else {
            return;
        };

        let result = match conn {
            #[cfg(feature = "postgres")]
            AnyPooledConnection::Postgres(conn) => conn
                .interact(|conn| AnsiTransactionManager::rollback_transaction(conn))
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))
                .and_then(|r| r.map_err(UnitOfWorkError::Database)),
            #[cfg(feature = "sqlite")]
            AnyPooledConnection::Sqlite(conn) => conn
                .interact(|conn| AnsiTransactionManager::rollback_transaction(conn))
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))
                .and_then(|r| r.map_err(UnitOfWorkError::Database)),
        };

        if let Err(e) = result {
            warn!(error = %e, "rollback failed");
        }
    }

    // Drops the (possibly broken) connection, takes a fresh one, and opens a
    // new transaction for a save retry.
    async fn restart_transaction(&mut self) -> Result<(), UnitOfWorkError> {
        self.try_rollback_quiet().await;
        self.conn = None;
        self.conn = Some(self.acquire_connection().await?);
        self.begin_transaction().await
    }

    async fn execute_writes(&self, writes: Vec<StagedWrite>) -> Result<(), UnitOfWorkError> {
        if writes.is_empty() {
            return Ok(());
        }

        match self.conn.as_ref().ok_or(UnitOfWorkError::NotActive)? {
            #[cfg(feature = "postgres")]
            AnyPooledConnection::Postgres(conn) => conn
                .interact(move |conn| {
                    for write in &writes {
                        write.apply_postgres(conn)?;
                    }
                    Ok::<_, diesel::result::Error>(())
                })
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??,
            #[cfg(feature = "sqlite")]
            AnyPooledConnection::Sqlite(conn) => conn
                .interact(move |conn| {
                    for write in &writes {
                        write.apply_sqlite(conn)?;
                    }
                    Ok::<_, diesel::result::Error>(())
                })
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??,
        }
        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        warn!("unit of work dropped with an active transaction, rolling back");
        if let Some(conn) = self.conn.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = match conn {
                        #[cfg(feature = "postgres")]
                        AnyPooledConnection::Postgres(conn) => {
                            conn.interact(|conn| {
                                AnsiTransactionManager::rollback_transaction(conn)
                            })
                            .await
                        }
                        #[cfg(feature = "sqlite")]
                        AnyPooledConnection::Sqlite(conn) => {
                            conn.interact(|conn| {
                                AnsiTransactionManager::rollback_transaction(conn)
                            })
                            .await
                        }
                    };
                });
            }
        }
    }
}
