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

//! Commands of the sample order/customer domain.

use async_trait::async_trait;

use super::{Command, CommandScope};
use crate::database::universal_types::UniversalUuid;
use crate::error::{CommandError, DomainRuleError};
use crate::events::customers::CustomerRegistered;
use crate::events::orders::{OrderCancelled, OrderPaid, OrderPlaced};
use crate::models::customer::Customer;
use crate::models::order::Order;

/// Registers a new customer.
#[derive(Debug, Clone)]
pub struct RegisterCustomer {
    pub name: String,
    pub email: String,
}

#[async_trait]
impl Command for RegisterCustomer {
    type Output = UniversalUuid;

    async fn apply(&self, scope: &mut CommandScope<'_>) -> Result<Self::Output, CommandError> {
        if scope.customers().find_by_email(&self.email).await?.is_some() {
            return Err(DomainRuleError::DuplicateEmail(self.email.clone()).into());
        }

        let customer = Customer::register(self.name.clone(), self.email.clone());
        scope.customers().insert(&customer);
        scope.emit(&CustomerRegistered {
            customer_id: customer.id,
            name: customer.name.clone(),
            email: customer.email.clone(),
        })?;

        Ok(customer.id)
    }
}

/// Places an order for an existing customer.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub customer_id: UniversalUuid,
    pub total_cents: i64,
}

#[async_trait]
impl Command for PlaceOrder {
    type Output = UniversalUuid;

    async fn apply(&self, scope: &mut CommandScope<'_>) -> Result<Self::Output, CommandError> {
        let customer = scope
            .customers()
            .find(self.customer_id)
            .await?
            .ok_or(DomainRuleError::CustomerNotFound(self.customer_id))?;

        let order = Order::place(customer.id, self.total_cents)?;
        scope.orders().insert(&order);
        scope.emit(&OrderPlaced {
            order_id: order.id,
            customer_id: order.customer_id,
            total_cents: order.total_cents,
        })?;

        Ok(order.id)
    }
}

/// Records payment for an order.
#[derive(Debug, Clone)]
pub struct PayOrder {
    pub order_id: UniversalUuid,
}

#[async_trait]
impl Command for PayOrder {
    type Output = ();

    async fn apply(&self, scope: &mut CommandScope<'_>) -> Result<Self::Output, CommandError> {
        let mut order = scope
            .orders()
            .find(self.order_id)
            .await?
            .ok_or(DomainRuleError::OrderNotFound(self.order_id))?;

        order.pay()?;
        scope.orders().update(&order);
        scope.emit(&OrderPaid {
            order_id: order.id,
            amount_cents: order.total_cents,
        })?;

        Ok(())
    }
}

/// Cancels an unpaid order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: UniversalUuid,
    pub reason: String,
}

#[async_trait]
impl Command for CancelOrder {
    type Output = ();

    async fn apply(&self, scope: &mut CommandScope<'_>) -> Result<Self::Output, CommandError> {
        let mut order = scope
            .orders()
            .find(self.order_id)
            .await?
            .ok_or(DomainRuleError::OrderNotFound(self.order_id))?;

        order.cancel()?;
        scope.orders().update(&order);
        scope.emit(&OrderCancelled {
            order_id: order.id,
            reason: self.reason.clone(),
        })?;

        Ok(())
    }
}
