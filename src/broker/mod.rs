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

//! Broker adapter layer.
//!
//! [`EventPublisher`] is the single publisher implementation; the transport
//! behind it is abstracted by [`BrokerClient`] / [`MessageSender`] so the
//! engine can run against any broker SDK. The crate ships an in-process
//! channel transport for single-process deployments and tests.

pub mod in_process;
pub mod publisher;

pub use in_process::InProcessBroker;
pub use publisher::EventPublisher;

use std::sync::Arc;

use async_trait::async_trait;

use crate::database::universal_types::UniversalUuid;
use crate::error::PublishError;

/// Content type of every published message body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Name of the header carrying the full event type tag.
pub const EVENT_TYPE_HEADER: &str = "event_type_full_name";

/// A single message on its way to the broker.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    /// Broker-level message id; equals the outbox record id so consumers can
    /// deduplicate redeliveries.
    pub message_id: UniversalUuid,
    /// Correlation id; also the outbox record id.
    pub correlation_id: UniversalUuid,
    /// Always [`CONTENT_TYPE_JSON`].
    pub content_type: &'static str,
    /// Short event name (last dotted segment of the type tag).
    pub subject: String,
    /// Value of the [`EVENT_TYPE_HEADER`] header: the full type tag.
    pub event_type: String,
    /// Queue/topic the message is addressed to.
    pub destination: String,
    /// Payload bytes.
    pub body: Vec<u8>,
}

/// A sender bound to one destination.
///
/// Senders are cached by the publisher and shared across tasks, so
/// implementations must be safe for concurrent use.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: BrokerMessage) -> Result<(), PublishError>;
}

/// Factory for per-destination senders; the seam a broker SDK plugs into.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn create_sender(&self, destination: &str)
        -> Result<Arc<dyn MessageSender>, PublishError>;
}
