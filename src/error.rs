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

//! Error types for the outbox engine.
//!
//! The taxonomy separates the concerns that retry differently:
//! - database faults split into transient (retried by the unit of work) and
//!   fatal (surfaced to the caller);
//! - broker faults split into transient (retried on the next relay cycle)
//!   and permanent (still retried until the attempt ceiling, then
//!   quarantined);
//! - codec faults are always permanent and quarantine the record at once;
//! - domain-rule violations roll the enclosing transaction back and surface
//!   to the command's caller.

use thiserror::Error;

use crate::database::universal_types::UniversalUuid;
use crate::retry::TransientErrorKind;

/// Errors raised by connection-pool and migration infrastructure.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error(
        "unable to detect database backend from '{0}' \
         (expected postgres://, postgresql://, sqlite://, or a file path)"
    )]
    UnrecognizedUrl(String),

    #[error("failed to build connection pool: {0}")]
    PoolBuild(String),

    #[error("connection pool failure: {0}")]
    ConnectionPool(String),

    #[error("operation requires the {expected} backend")]
    BackendMismatch { expected: &'static str },

    #[error("migration failure: {0}")]
    Migration(String),
}

/// Errors raised by outbox-store and repository statements.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection pool failure: {0}")]
    ConnectionPool(String),

    #[error("database failure: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether a retry on a later cycle could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::ConnectionPool(_) => true,
            StoreError::Database(e) => TransientErrorKind::classify(e).is_some(),
            StoreError::Corrupt(_) => false,
        }
    }
}

impl From<DatabaseError> for StoreError {
    fn from(error: DatabaseError) -> Self {
        StoreError::ConnectionPool(error.to_string())
    }
}

/// Errors raised by the unit of work (C1).
#[derive(Error, Debug)]
pub enum UnitOfWorkError {
    #[error("a transaction is already active on this unit of work")]
    AlreadyActive,

    #[error("no transaction is active on this unit of work")]
    NotActive,

    #[error("database failure: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool failure: {0}")]
    ConnectionPool(String),

    #[error("save gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: diesel::result::Error,
    },

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<DatabaseError> for UnitOfWorkError {
    fn from(error: DatabaseError) -> Self {
        UnitOfWorkError::ConnectionPool(error.to_string())
    }
}

/// Errors raised by the domain-event serializer (C3).
///
/// All codec failures are permanent: a payload that does not decode today
/// will not decode tomorrow, so the relay quarantines the record instead of
/// retrying it.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("no event schema registered for type tag '{type_tag}'")]
    UnknownType { type_tag: String },

    #[error("payload for '{type_tag}' failed to decode: {source}")]
    Malformed {
        type_tag: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("event '{type_tag}' failed to encode: {source}")]
    Encode {
        type_tag: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the broker publisher (C6).
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("broker connection failure: {0}")]
    Connection(String),

    #[error("broker throttled the publisher: {0}")]
    Throttled(String),

    #[error("broker busy: {0}")]
    Busy(String),

    #[error("publish cancelled while in flight")]
    Cancelled,

    #[error("publisher is not authorized for destination '{destination}'")]
    Unauthorized { destination: String },

    #[error("no such destination '{destination}'")]
    UnknownDestination { destination: String },
}

impl PublishError {
    /// Whether the failure is worth retrying on a later relay cycle.
    ///
    /// Permanent failures still increment the record's attempt counter; the
    /// distinction only matters for logging and for operators reading
    /// `last_error`.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PublishError::Connection(_)
                | PublishError::Throttled(_)
                | PublishError::Busy(_)
                | PublishError::Cancelled
        )
    }
}

/// Domain-rule violations raised by the sample order/customer model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainRuleError {
    #[error("customer {0} does not exist")]
    CustomerNotFound(UniversalUuid),

    #[error("order {0} does not exist")]
    OrderNotFound(UniversalUuid),

    #[error("a customer is already registered with email '{0}'")]
    DuplicateEmail(String),

    #[error("order total must be positive (got {0})")]
    NonPositiveTotal(i64),

    #[error("order {0} is already paid")]
    AlreadyPaid(UniversalUuid),

    #[error("order {0} is already cancelled")]
    AlreadyCancelled(UniversalUuid),

    #[error("order {0} cannot be cancelled after payment")]
    CancelAfterPayment(UniversalUuid),
}

/// Errors surfaced by the enqueue coordinator (C4).
///
/// Callers see domain-rule violations and fatal database faults; transient
/// database faults are retried inside the unit of work and only surface here
/// once retries are exhausted.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("domain rule violated: {0}")]
    DomainRule(#[from] DomainRuleError),

    #[error("event encoding failed: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    UnitOfWork(#[from] UnitOfWorkError),

    #[error("command cancelled")]
    Cancelled,
}

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid database connection string: {url}")]
    InvalidDatabaseUrl { url: String },

    #[error("invalid pool size: {size} (must be between 1 and 100)")]
    InvalidPoolSize { size: u32 },

    #[error("invalid batch size: {size} (must be between 1 and 1000)")]
    InvalidBatchSize { size: usize },

    #[error("invalid max attempts: {value} (must be positive)")]
    InvalidMaxAttempts { value: i32 },

    #[error("poll interval must be positive")]
    InvalidPollInterval,

    #[error("broker destination must not be empty when set")]
    EmptyBrokerDestination,
}

/// Errors raised by engine lifecycle operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,
}
