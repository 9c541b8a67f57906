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

//! Diesel schema definitions.
//!
//! Column types are chosen so the same schema serves both backends: `Binary`
//! (BYTEA/BLOB) for 16-byte identifiers and payloads, `Timestamp` for UTC
//! naive timestamps.

diesel::table! {
    customers (id) {
        id -> Binary,
        name -> Text,
        email -> Text,
        registered_on_utc -> Timestamp,
    }
}

diesel::table! {
    orders (id) {
        id -> Binary,
        customer_id -> Binary,
        status -> Text,
        total_cents -> BigInt,
        placed_on_utc -> Timestamp,
        updated_on_utc -> Timestamp,
    }
}

diesel::table! {
    outbox_records (id) {
        id -> Binary,
        type_tag -> Text,
        payload -> Binary,
        occurred_on_utc -> Timestamp,
        processed_on_utc -> Nullable<Timestamp>,
        attempts -> Integer,
        last_error -> Nullable<Text>,
    }
}

diesel::joinable!(orders -> customers (customer_id));

diesel::allow_tables_to_appear_in_same_query!(customers, orders, outbox_records);
