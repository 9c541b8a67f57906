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

//! Transient-fault classification and the save retry policy.
//!
//! Only a closed set of database faults is considered transient: connection
//! loss, deadlock/serialization failure, busy/overload, and timeouts.
//! Everything else (constraint violations, schema mismatches, auth failures)
//! propagates immediately.

use std::time::Duration;

use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// The closed enumeration of transient database faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientErrorKind {
    /// The connection to the database was lost.
    ConnectionLost,
    /// The statement lost a deadlock or serialization race.
    Deadlock,
    /// The database is busy or overloaded (SQLite lock contention included).
    Busy,
    /// The statement or connection timed out.
    Timeout,
}

impl TransientErrorKind {
    /// Classifies a diesel error, returning `None` for non-transient faults.
    pub fn classify(error: &DieselError) -> Option<Self> {
        match error {
            DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
                Some(TransientErrorKind::ConnectionLost)
            }
            DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
                Some(TransientErrorKind::Deadlock)
            }
            DieselError::BrokenTransactionManager => Some(TransientErrorKind::ConnectionLost),
            DieselError::DatabaseError(DatabaseErrorKind::Unknown, info) => {
                Self::classify_message(info.message())
            }
            _ => None,
        }
    }

    // Backends report busy/timeout conditions with the Unknown kind; the
    // message text is the only signal left.
    fn classify_message(message: &str) -> Option<Self> {
        let message = message.to_lowercase();
        if message.contains("deadlock") {
            Some(TransientErrorKind::Deadlock)
        } else if message.contains("database is locked") || message.contains("busy") {
            Some(TransientErrorKind::Busy)
        } else if message.contains("timeout") || message.contains("timed out") {
            Some(TransientErrorKind::Timeout)
        } else if message.contains("connection") {
            Some(TransientErrorKind::ConnectionLost)
        } else {
            None
        }
    }
}

/// Bounded retry policy for the unit of work's `save` operation.
///
/// Retrying is safe only because `save` never commits: a replayed batch runs
/// inside a fresh transaction, so a half-applied earlier attempt cannot leak.
#[derive(Debug, Clone, Copy)]
pub struct SaveRetryPolicy {
    max_retries: u32,
}

impl SaveRetryPolicy {
    /// Longest backoff exponent; `2^6 = 64s` caps runaway waits.
    const MAX_BACKOFF_EXPONENT: u32 = 6;

    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Maximum number of retries after the initial attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether `error` warrants another attempt, given how many retries have
    /// already run.
    pub fn should_retry(&self, error: &DieselError, retries_used: u32) -> bool {
        retries_used < self.max_retries && TransientErrorKind::classify(error).is_some()
    }

    /// Exponential backoff before retry number `attempt` (1-based):
    /// `2^attempt` seconds.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs(1u64 << attempt.min(Self::MAX_BACKOFF_EXPONENT))
    }
}

impl Default for SaveRetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}
