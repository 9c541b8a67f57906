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

//! Event Publisher
//!
//! Stateless send of a typed, identified message: builds the wire envelope,
//! resolves the destination, and pushes through a per-destination sender.
//! Senders are created lazily and cached in a concurrent map, so the
//! publisher is safe to share across tasks.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::{BrokerClient, BrokerMessage, MessageSender, CONTENT_TYPE_JSON};
use crate::database::universal_types::UniversalUuid;
use crate::error::PublishError;
use crate::events::DecodedEvent;

/// The engine's single concrete publisher (C6).
pub struct EventPublisher {
    client: Arc<dyn BrokerClient>,
    default_destination: Option<String>,
    senders: DashMap<String, Arc<dyn MessageSender>>,
}

impl EventPublisher {
    /// Creates a publisher over a broker client.
    ///
    /// # Arguments
    /// * `client` - Transport factory for per-destination senders
    /// * `default_destination` - Queue/topic for all messages; when `None`,
    ///   each message goes to a destination named after its event short name
    pub fn new(client: Arc<dyn BrokerClient>, default_destination: Option<String>) -> Self {
        Self {
            client,
            default_destination,
            senders: DashMap::new(),
        }
    }

    /// Publishes one decoded event under the given outbox record id.
    ///
    /// The message carries `message_id = correlation_id = id`, the short
    /// event name as subject, the full type tag in the
    /// `event_type_full_name` header, and the JSON body.
    pub async fn publish(
        &self,
        event: &DecodedEvent,
        id: UniversalUuid,
    ) -> Result<(), PublishError> {
        let destination = self.resolve_destination(event.short_name());
        let sender = self.sender_for(&destination).await?;

        let message = BrokerMessage {
            message_id: id,
            correlation_id: id,
            content_type: CONTENT_TYPE_JSON,
            subject: event.short_name().to_string(),
            event_type: event.type_tag.clone(),
            destination: destination.clone(),
            body: event.body.to_string().into_bytes(),
        };

        sender.send(message).await?;
        debug!(%id, type_tag = %event.type_tag, %destination, "event published");
        Ok(())
    }

    fn resolve_destination(&self, short_name: &str) -> String {
        match &self.default_destination {
            Some(destination) => destination.clone(),
            None => {
                warn!(
                    destination = short_name,
                    "no broker destination configured, deriving one from the event type"
                );
                short_name.to_string()
            }
        }
    }

    async fn sender_for(&self, destination: &str) -> Result<Arc<dyn MessageSender>, PublishError> {
        if let Some(sender) = self.senders.get(destination) {
            return Ok(sender.clone());
        }

        let sender = self.client.create_sender(destination).await?;
        self.senders.insert(destination.to_string(), sender.clone());
        Ok(sender)
    }
}
