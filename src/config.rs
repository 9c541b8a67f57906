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

//! Configuration for the outbox engine.
//!
//! # Construction
//!
//! Use [`EngineConfig::builder()`] to create a configuration:
//!
//! ```rust,ignore
//! let config = EngineConfig::builder()
//!     .db_connection_string(":memory:")
//!     .poll_interval(Duration::from_secs(5))
//!     .batch_size(50)
//!     .build()?;
//! ```

use std::time::Duration;

use crate::database::BackendType;
use crate::error::ConfigError;

/// Configuration for the outbox engine.
///
/// Controls the relay cadence, batch sizing, the publication attempt
/// ceiling, database retry behavior, and the endpoints of the two external
/// systems.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct EngineConfig {
    db_connection_string: String,
    broker_connection_string: Option<String>,
    broker_destination: Option<String>,
    poll_interval: Duration,
    batch_size: usize,
    max_attempts: i32,
    db_retry_count: u32,
    db_pool_size: u32,
}

impl EngineConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Database connection URL or path.
    pub fn db_connection_string(&self) -> &str {
        &self.db_connection_string
    }

    /// Broker endpoint credentials, when the transport needs them.
    pub fn broker_connection_string(&self) -> Option<&str> {
        self.broker_connection_string.as_deref()
    }

    /// Default queue/topic name. When unset, a destination derived from the
    /// event-type short name is used (with a warning).
    pub fn broker_destination(&self) -> Option<&str> {
        self.broker_destination.as_deref()
    }

    /// Sleep between relay cycles.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Maximum records fetched and published per relay cycle.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Publication attempt ceiling before a record is quarantined.
    pub fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    /// Transient-fault retries for a unit-of-work save.
    pub fn db_retry_count(&self) -> u32 {
        self.db_retry_count
    }

    /// Number of database connections in the pool.
    pub fn db_pool_size(&self) -> u32 {
        self.db_pool_size
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    db_connection_string: String,
    broker_connection_string: Option<String>,
    broker_destination: Option<String>,
    poll_interval: Duration,
    batch_size: usize,
    max_attempts: i32,
    db_retry_count: u32,
    db_pool_size: u32,
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self {
            db_connection_string: String::new(),
            broker_connection_string: None,
            broker_destination: None,
            poll_interval: Duration::from_secs(10),
            batch_size: 20,
            max_attempts: 5,
            db_retry_count: 3,
            db_pool_size: 10,
        }
    }
}

impl EngineConfigBuilder {
    pub fn db_connection_string(mut self, url: impl Into<String>) -> Self {
        self.db_connection_string = url.into();
        self
    }

    pub fn broker_connection_string(mut self, url: impl Into<String>) -> Self {
        self.broker_connection_string = Some(url.into());
        self
    }

    pub fn broker_destination(mut self, destination: impl Into<String>) -> Self {
        self.broker_destination = Some(destination.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn max_attempts(mut self, ceiling: i32) -> Self {
        self.max_attempts = ceiling;
        self
    }

    pub fn db_retry_count(mut self, retries: u32) -> Self {
        self.db_retry_count = retries;
        self
    }

    pub fn db_pool_size(mut self, size: u32) -> Self {
        self.db_pool_size = size;
        self
    }

    /// Validates the configuration and builds an [`EngineConfig`].
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        if BackendType::from_url(&self.db_connection_string).is_err() {
            return Err(ConfigError::InvalidDatabaseUrl {
                url: self.db_connection_string,
            });
        }

        #[cfg(feature = "postgres")]
        if self.db_connection_string.starts_with("postgres")
            && url::Url::parse(&self.db_connection_string).is_err()
        {
            return Err(ConfigError::InvalidDatabaseUrl {
                url: self.db_connection_string,
            });
        }

        if self.db_pool_size == 0 || self.db_pool_size > 100 {
            return Err(ConfigError::InvalidPoolSize {
                size: self.db_pool_size,
            });
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize {
                size: self.batch_size,
            });
        }

        if self.max_attempts <= 0 {
            return Err(ConfigError::InvalidMaxAttempts {
                value: self.max_attempts,
            });
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }

        if let Some(destination) = &self.broker_destination {
            if destination.trim().is_empty() {
                return Err(ConfigError::EmptyBrokerDestination);
            }
        }

        Ok(EngineConfig {
            db_connection_string: self.db_connection_string,
            broker_connection_string: self.broker_connection_string,
            broker_destination: self.broker_destination,
            poll_interval: self.poll_interval,
            batch_size: self.batch_size,
            max_attempts: self.max_attempts,
            db_retry_count: self.db_retry_count,
            db_pool_size: self.db_pool_size,
        })
    }
}
