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

//! Domain events and their wire representation.
//!
//! Every event schema carries a stable type tag and is registered with the
//! [`EventRegistry`] at startup; the registry is the only component that
//! interprets tags. Payloads are self-contained JSON.

pub mod customers;
pub mod orders;
pub mod registry;

pub use registry::EventRegistry;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A value emitted by a command's mutation of an aggregate, describing what
/// changed.
///
/// The type tag must be unique per schema and stable across releases: it is
/// persisted with every outbox record and carried to the broker as the
/// `event_type_full_name` header.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable, fully-qualified name of the event schema.
    const TYPE_TAG: &'static str;
}

/// An event encoded for storage: type tag plus self-contained payload bytes.
#[derive(Debug, Clone)]
pub struct EncodedEvent {
    pub type_tag: String,
    pub payload: Vec<u8>,
}

/// An event decoded from a stored payload into canonical JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub type_tag: String,
    pub body: serde_json::Value,
}

impl DecodedEvent {
    /// The short event name: the last dotted segment of the type tag.
    pub fn short_name(&self) -> &str {
        short_name_of(&self.type_tag)
    }
}

/// Returns the last dotted segment of a type tag.
pub fn short_name_of(type_tag: &str) -> &str {
    type_tag.rsplit('.').next().unwrap_or(type_tag)
}
