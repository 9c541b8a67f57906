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

//! Order aggregate of the sample domain.
//!
//! The business rules here are deliberately thin; the aggregate exists to
//! exercise the transactional enqueue path.

use crate::database::schema::orders;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::DomainRuleError;

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Placed,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "Placed",
            OrderStatus::Paid => "Paid",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Placed" => Some(OrderStatus::Placed),
            "Paid" => Some(OrderStatus::Paid),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// An order (domain type).
#[derive(Debug, Clone)]
pub struct Order {
    pub id: UniversalUuid,
    pub customer_id: UniversalUuid,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub placed_on_utc: UniversalTimestamp,
    pub updated_on_utc: UniversalTimestamp,
}

impl Order {
    /// Places a new order for a customer.
    pub fn place(customer_id: UniversalUuid, total_cents: i64) -> Result<Self, DomainRuleError> {
        if total_cents <= 0 {
            return Err(DomainRuleError::NonPositiveTotal(total_cents));
        }

        let now = UniversalTimestamp::now();
        Ok(Self {
            id: UniversalUuid::new_v4(),
            customer_id,
            status: OrderStatus::Placed,
            total_cents,
            placed_on_utc: now,
            updated_on_utc: now,
        })
    }

    /// Records payment for the order.
    pub fn pay(&mut self) -> Result<(), DomainRuleError> {
        match self.status {
            OrderStatus::Paid => Err(DomainRuleError::AlreadyPaid(self.id)),
            OrderStatus::Cancelled => Err(DomainRuleError::AlreadyCancelled(self.id)),
            OrderStatus::Placed => {
                self.status = OrderStatus::Paid;
                self.updated_on_utc = UniversalTimestamp::now();
                Ok(())
            }
        }
    }

    /// Cancels the order. Paid orders cannot be cancelled.
    pub fn cancel(&mut self) -> Result<(), DomainRuleError> {
        match self.status {
            OrderStatus::Cancelled => Err(DomainRuleError::AlreadyCancelled(self.id)),
            OrderStatus::Paid => Err(DomainRuleError::CancelAfterPayment(self.id)),
            OrderStatus::Placed => {
                self.status = OrderStatus::Cancelled;
                self.updated_on_utc = UniversalTimestamp::now();
                Ok(())
            }
        }
    }
}

/// Database row for an order.
#[derive(Debug, Clone, diesel::Queryable, diesel::Insertable, diesel::AsChangeset)]
#[diesel(table_name = orders)]
pub struct OrderRow {
    pub id: Vec<u8>,
    pub customer_id: Vec<u8>,
    pub status: String,
    pub total_cents: i64,
    pub placed_on_utc: chrono::NaiveDateTime,
    pub updated_on_utc: chrono::NaiveDateTime,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.as_bytes().to_vec(),
            customer_id: order.customer_id.as_bytes().to_vec(),
            status: order.status.as_str().to_string(),
            total_cents: order.total_cents,
            placed_on_utc: order.placed_on_utc.to_naive(),
            updated_on_utc: order.updated_on_utc.to_naive(),
        }
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = String;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| format!("unknown order status '{}'", row.status))?;

        Ok(Self {
            id: UniversalUuid::from_bytes(&row.id).map_err(|e| e.to_string())?,
            customer_id: UniversalUuid::from_bytes(&row.customer_id).map_err(|e| e.to_string())?,
            status,
            total_cents: row.total_cents,
            placed_on_utc: UniversalTimestamp::from_naive(row.placed_on_utc),
            updated_on_utc: UniversalTimestamp::from_naive(row.updated_on_utc),
        })
    }
}
