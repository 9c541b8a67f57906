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

//! Database connection management supporting both PostgreSQL and SQLite.
//!
//! This module provides an async connection pool built on `deadpool-diesel`.
//! The backend is detected at runtime from the connection URL, so the same
//! engine binary can run against PostgreSQL in production and SQLite (including
//! `:memory:`) in tests and small deployments.

use diesel_migrations::MigrationHarness;
use tracing::info;

use crate::error::DatabaseError;

#[cfg(feature = "postgres")]
use deadpool_diesel::postgres::{Manager as PgManager, Pool as PgPool, Runtime as PgRuntime};

#[cfg(feature = "sqlite")]
use deadpool_diesel::sqlite::{
    Manager as SqliteManager, Pool as SqlitePool, Runtime as SqliteRuntime,
};

/// Pooled PostgreSQL connection handle.
#[cfg(feature = "postgres")]
pub type PgPooledConnection = deadpool_diesel::postgres::Connection;

/// Pooled SQLite connection handle.
#[cfg(feature = "sqlite")]
pub type SqlitePooledConnection = deadpool_diesel::sqlite::Connection;

/// Represents the database backend type, detected at runtime from the
/// connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// PostgreSQL backend
    #[cfg(feature = "postgres")]
    Postgres,
    /// SQLite backend
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl BackendType {
    /// Detect the backend type from a connection URL.
    ///
    /// # Arguments
    /// * `url` - The database connection URL or file path
    ///
    /// # Returns
    /// The detected `BackendType`, or `DatabaseError::UnrecognizedUrl` if the
    /// URL matches no enabled backend.
    pub fn from_url(url: &str) -> Result<Self, DatabaseError> {
        #[cfg(feature = "postgres")]
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(BackendType::Postgres);
        }

        #[cfg(feature = "sqlite")]
        {
            // SQLite URLs can be:
            // - sqlite:// prefix
            // - file paths (relative or absolute)
            // - :memory: for in-memory databases
            if url.starts_with("sqlite://")
                || url.starts_with('/')
                || url.starts_with("./")
                || url.starts_with("../")
                || url == ":memory:"
                || url.ends_with(".db")
                || url.ends_with(".sqlite")
                || url.ends_with(".sqlite3")
            {
                return Ok(BackendType::Sqlite);
            }
        }

        Err(DatabaseError::UnrecognizedUrl(url.to_string()))
    }
}

/// Pool enum that wraps both PostgreSQL and SQLite connection pools.
#[derive(Clone)]
pub enum AnyPool {
    /// PostgreSQL connection pool
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
    /// SQLite connection pool
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

impl std::fmt::Debug for AnyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(_) => write!(f, "AnyPool::Postgres(...)"),
            #[cfg(feature = "sqlite")]
            AnyPool::Sqlite(_) => write!(f, "AnyPool::Sqlite(...)"),
        }
    }
}

/// A pool of database connections with runtime backend selection.
///
/// `Database` is `Clone`; each clone references the same underlying pool, so
/// it can be shared freely between the enqueue path and the relay worker.
#[derive(Clone, Debug)]
pub struct Database {
    /// The connection pool (PostgreSQL or SQLite)
    pool: AnyPool,
    /// The detected backend type
    backend: BackendType,
}

impl Database {
    /// Creates a new database connection pool with automatic backend
    /// detection.
    ///
    /// The backend is detected from the connection string:
    /// - `postgres://` or `postgresql://` -> PostgreSQL
    /// - `sqlite://`, file paths, or `:memory:` -> SQLite
    ///
    /// # Arguments
    /// * `connection_string` - The database connection URL or path
    /// * `max_size` - Maximum number of connections in the pool
    pub fn new(connection_string: &str, max_size: u32) -> Result<Self, DatabaseError> {
        let backend = BackendType::from_url(connection_string)?;

        match backend {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => {
                let manager = PgManager::new(connection_string, PgRuntime::Tokio1);
                let pool = PgPool::builder(manager)
                    .max_size(max_size as usize)
                    .build()
                    .map_err(|e| DatabaseError::PoolBuild(e.to_string()))?;

                info!("PostgreSQL connection pool initialized (max_size: {})", max_size);

                Ok(Self {
                    pool: AnyPool::Postgres(pool),
                    backend,
                })
            }
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => {
                let connection_url = Self::build_sqlite_url(connection_string);
                let manager = SqliteManager::new(connection_url, SqliteRuntime::Tokio1);
                let pool = SqlitePool::builder(manager)
                    .max_size(max_size as usize)
                    .build()
                    .map_err(|e| DatabaseError::PoolBuild(e.to_string()))?;

                info!("SQLite connection pool initialized (max_size: {})", max_size);

                Ok(Self {
                    pool: AnyPool::Sqlite(pool),
                    backend,
                })
            }
        }
    }

    /// Returns the detected backend type.
    pub fn backend(&self) -> BackendType {
        self.backend
    }

    /// Returns a clone of the connection pool.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    /// Gets a PostgreSQL connection from the pool.
    ///
    /// Returns `DatabaseError::BackendMismatch` when called on a SQLite pool.
    #[cfg(feature = "postgres")]
    pub async fn get_postgres_connection(&self) -> Result<PgPooledConnection, DatabaseError> {
        match &self.pool {
            AnyPool::Postgres(pool) => pool
                .get()
                .await
                .map_err(|e| DatabaseError::ConnectionPool(e.to_string())),
            #[cfg(feature = "sqlite")]
            AnyPool::Sqlite(_) => Err(DatabaseError::BackendMismatch {
                expected: "postgres",
            }),
        }
    }

    /// Gets a SQLite connection from the pool.
    ///
    /// Returns `DatabaseError::BackendMismatch` when called on a PostgreSQL
    /// pool.
    #[cfg(feature = "sqlite")]
    pub async fn get_sqlite_connection(&self) -> Result<SqlitePooledConnection, DatabaseError> {
        match &self.pool {
            AnyPool::Sqlite(pool) => pool
                .get()
                .await
                .map_err(|e| DatabaseError::ConnectionPool(e.to_string())),
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(_) => Err(DatabaseError::BackendMismatch { expected: "sqlite" }),
        }
    }

    /// Runs all pending migrations for the detected backend.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        match self.backend {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => {
                let conn = self.get_postgres_connection().await?;
                conn.interact(|conn| {
                    conn.run_pending_migrations(super::POSTGRES_MIGRATIONS)
                        .map(|_| ())
                        .map_err(|e| DatabaseError::Migration(e.to_string()))
                })
                .await
                .map_err(|e| DatabaseError::ConnectionPool(e.to_string()))??;
            }
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => {
                let conn = self.get_sqlite_connection().await?;
                conn.interact(|conn| {
                    conn.run_pending_migrations(super::SQLITE_MIGRATIONS)
                        .map(|_| ())
                        .map_err(|e| DatabaseError::Migration(e.to_string()))
                })
                .await
                .map_err(|e| DatabaseError::ConnectionPool(e.to_string()))??;
            }
        }

        info!("Database migrations up to date");
        Ok(())
    }

    /// Builds a SQLite connection URL.
    #[cfg(feature = "sqlite")]
    fn build_sqlite_url(connection_string: &str) -> String {
        // Strip sqlite:// prefix if present
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }
}
