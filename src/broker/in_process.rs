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

//! In-process broker transport.
//!
//! A channel-backed [`BrokerClient`] for single-process deployments, demos,
//! and tests. Each destination is a broadcast channel; subscribers attach
//! with [`InProcessBroker::subscribe`]. Delivery is fan-out with no
//! persistence: a message published with no live subscribers is dropped.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use super::{BrokerClient, BrokerMessage, MessageSender};
use crate::error::PublishError;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Channel-backed broker living inside the process.
pub struct InProcessBroker {
    channels: DashMap<String, broadcast::Sender<BrokerMessage>>,
    capacity: usize,
}

impl InProcessBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Subscribes to a destination's message stream.
    pub fn subscribe(&self, destination: &str) -> broadcast::Receiver<BrokerMessage> {
        self.channel(destination).subscribe()
    }

    fn channel(&self, destination: &str) -> broadcast::Sender<BrokerMessage> {
        self.channels
            .entry(destination.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for InProcessBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

struct InProcessSender {
    tx: broadcast::Sender<BrokerMessage>,
}

#[async_trait]
impl MessageSender for InProcessSender {
    async fn send(&self, message: BrokerMessage) -> Result<(), PublishError> {
        // A send with no live receivers returns the message back; for an
        // in-process fan-out bus that is not a failure.
        let _ = self.tx.send(message);
        Ok(())
    }
}

#[async_trait]
impl BrokerClient for InProcessBroker {
    async fn create_sender(
        &self,
        destination: &str,
    ) -> Result<Arc<dyn MessageSender>, PublishError> {
        Ok(Arc::new(InProcessSender {
            tx: self.channel(destination),
        }))
    }
}
