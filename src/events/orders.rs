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

//! Order domain events.

use serde::{Deserialize, Serialize};

use super::DomainEvent;
use crate::database::universal_types::UniversalUuid;

/// A customer placed a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: UniversalUuid,
    pub customer_id: UniversalUuid,
    pub total_cents: i64,
}

impl DomainEvent for OrderPlaced {
    const TYPE_TAG: &'static str = "orders.OrderPlaced";
}

/// Payment was recorded for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaid {
    pub order_id: UniversalUuid,
    pub amount_cents: i64,
}

impl DomainEvent for OrderPaid {
    const TYPE_TAG: &'static str = "orders.OrderPaid";
}

/// An order was cancelled before payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: UniversalUuid,
    pub reason: String,
}

impl DomainEvent for OrderCancelled {
    const TYPE_TAG: &'static str = "orders.OrderCancelled";
}
