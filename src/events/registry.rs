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

//! Event Type Registry
//!
//! Maps type tags to decoder functions. Each event schema is registered
//! explicitly at startup; there is no runtime scanning of loaded modules,
//! and an unknown tag is a first-class (permanent) error.

use std::collections::HashMap;

use super::{DecodedEvent, DomainEvent, EncodedEvent};
use crate::error::CodecError;

type DecoderFn = fn(&[u8]) -> Result<serde_json::Value, serde_json::Error>;

/// Registry of event schemas, keyed by type tag.
#[derive(Default)]
pub struct EventRegistry {
    decoders: HashMap<&'static str, DecoderFn>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an event schema under its type tag. Re-registering the same
    /// type is harmless; registering two types under one tag is a
    /// programming error and replaces the earlier decoder.
    pub fn register<E: DomainEvent>(&mut self) -> &mut Self {
        self.decoders.insert(E::TYPE_TAG, decode_erased::<E>);
        self
    }

    /// Whether a schema is registered for `type_tag`.
    pub fn is_registered(&self, type_tag: &str) -> bool {
        self.decoders.contains_key(type_tag)
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Encodes an event into its `(type_tag, payload)` pair.
    ///
    /// Refuses unregistered types: a record enqueued for a type the relay
    /// cannot decode would be quarantined on its first fetch, so the mistake
    /// is surfaced at enqueue time instead.
    pub fn encode<E: DomainEvent>(&self, event: &E) -> Result<EncodedEvent, CodecError> {
        if !self.is_registered(E::TYPE_TAG) {
            return Err(CodecError::UnknownType {
                type_tag: E::TYPE_TAG.to_string(),
            });
        }

        let payload = serde_json::to_vec(event).map_err(|e| CodecError::Encode {
            type_tag: E::TYPE_TAG.to_string(),
            source: e,
        })?;

        Ok(EncodedEvent {
            type_tag: E::TYPE_TAG.to_string(),
            payload,
        })
    }

    /// Decodes a stored payload back into a canonical event value.
    ///
    /// Fails with `UnknownType` if the tag has no registered schema and
    /// `Malformed` if the payload does not parse as that schema.
    pub fn decode(&self, type_tag: &str, payload: &[u8]) -> Result<DecodedEvent, CodecError> {
        let decoder = self
            .decoders
            .get(type_tag)
            .ok_or_else(|| CodecError::UnknownType {
                type_tag: type_tag.to_string(),
            })?;

        let body = decoder(payload).map_err(|e| CodecError::Malformed {
            type_tag: type_tag.to_string(),
            source: e,
        })?;

        Ok(DecodedEvent {
            type_tag: type_tag.to_string(),
            body,
        })
    }
}

// Parses the payload as the concrete schema, then re-serializes it to a
// canonical JSON value. Parsing through the concrete type is what rejects
// structurally wrong payloads.
fn decode_erased<E: DomainEvent>(payload: &[u8]) -> Result<serde_json::Value, serde_json::Error> {
    let event: E = serde_json::from_slice(payload)?;
    serde_json::to_value(&event)
}
