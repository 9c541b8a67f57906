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

//! Domain structures and their database row mappings.

pub mod customer;
pub mod order;
pub mod outbox_record;

pub use customer::{Customer, CustomerRow};
pub use order::{Order, OrderRow, OrderStatus};
pub use outbox_record::{OutboxRecord, OutboxRecordRow};
