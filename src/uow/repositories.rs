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

//! In-transaction repository views exposed by the unit of work.
//!
//! Reads run on the unit of work's connection, inside its open transaction,
//! so they observe writes flushed by `save` but nothing from other
//! uncommitted transactions. Writes are staged on the unit of work and hit
//! the database on the next `save`.

use diesel::prelude::*;

use super::staged::StagedWrite;
use super::{AnyPooledConnection, UnitOfWork};
use crate::database::schema::{customers, orders};
use crate::database::universal_types::UniversalUuid;
use crate::error::UnitOfWorkError;
use crate::models::customer::{Customer, CustomerRow};
use crate::models::order::{Order, OrderRow};
use crate::models::outbox_record::{OutboxRecord, OutboxRecordRow};

/// Customer repository scoped to one unit of work.
pub struct CustomerRepository<'a> {
    uow: &'a UnitOfWork,
}

impl<'a> CustomerRepository<'a> {
    pub(crate) fn new(uow: &'a UnitOfWork) -> Self {
        Self { uow }
    }

    /// Loads a customer by id from within the transaction.
    pub async fn find(&self, id: UniversalUuid) -> Result<Option<Customer>, UnitOfWorkError> {
        let row: Option<CustomerRow> = match self.uow.connection()? {
            #[cfg(feature = "postgres")]
            AnyPooledConnection::Postgres(conn) => {
                let id_bytes = id.as_bytes().to_vec();
                conn.interact(move |conn| {
                    customers::table
                        .filter(customers::id.eq(id_bytes))
                        .first(conn)
                        .optional()
                })
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??
            }
            #[cfg(feature = "sqlite")]
            AnyPooledConnection::Sqlite(conn) => {
                let id_bytes = id.as_bytes().to_vec();
                conn.interact(move |conn| {
                    customers::table
                        .filter(customers::id.eq(id_bytes))
                        .first(conn)
                        .optional()
                })
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??
            }
        };

        row.map(|r| Customer::try_from(r).map_err(|e| UnitOfWorkError::Corrupt(e.to_string())))
            .transpose()
    }

    /// Loads a customer by email from within the transaction.
    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Customer>, UnitOfWorkError> {
        let row: Option<CustomerRow> = match self.uow.connection()? {
            #[cfg(feature = "postgres")]
            AnyPooledConnection::Postgres(conn) => {
                let email = email.to_string();
                conn.interact(move |conn| {
                    customers::table
                        .filter(customers::email.eq(email))
                        .first(conn)
                        .optional()
                })
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??
            }
            #[cfg(feature = "sqlite")]
            AnyPooledConnection::Sqlite(conn) => {
                let email = email.to_string();
                conn.interact(move |conn| {
                    customers::table
                        .filter(customers::email.eq(email))
                        .first(conn)
                        .optional()
                })
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??
            }
        };

        row.map(|r| Customer::try_from(r).map_err(|e| UnitOfWorkError::Corrupt(e.to_string())))
            .transpose()
    }

    /// Stages a customer insert.
    pub fn insert(&self, customer: &Customer) {
        self.uow
            .stage(StagedWrite::InsertCustomer(CustomerRow::from(customer)));
    }
}

/// Order repository scoped to one unit of work.
pub struct OrderRepository<'a> {
    uow: &'a UnitOfWork,
}

impl<'a> OrderRepository<'a> {
    pub(crate) fn new(uow: &'a UnitOfWork) -> Self {
        Self { uow }
    }

    /// Loads an order by id from within the transaction.
    pub async fn find(&self, id: UniversalUuid) -> Result<Option<Order>, UnitOfWorkError> {
        let row: Option<OrderRow> = match self.uow.connection()? {
            #[cfg(feature = "postgres")]
            AnyPooledConnection::Postgres(conn) => {
                let id_bytes = id.as_bytes().to_vec();
                conn.interact(move |conn| {
                    orders::table
                        .filter(orders::id.eq(id_bytes))
                        .first(conn)
                        .optional()
                })
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??
            }
            #[cfg(feature = "sqlite")]
            AnyPooledConnection::Sqlite(conn) => {
                let id_bytes = id.as_bytes().to_vec();
                conn.interact(move |conn| {
                    orders::table
                        .filter(orders::id.eq(id_bytes))
                        .first(conn)
                        .optional()
                })
                .await
                .map_err(|e| UnitOfWorkError::ConnectionPool(e.to_string()))??
            }
        };

        row.map(|r| Order::try_from(r).map_err(UnitOfWorkError::Corrupt)).transpose()
    }

    /// Stages an order insert.
    pub fn insert(&self, order: &Order) {
        self.uow.stage(StagedWrite::InsertOrder(OrderRow::from(order)));
    }

    /// Stages an order update.
    pub fn update(&self, order: &Order) {
        self.uow.stage(StagedWrite::UpdateOrder(OrderRow::from(order)));
    }
}

/// Outbox repository scoped to one unit of work.
///
/// Insert-only: the relay side reads and updates records through the DAL,
/// never through a unit of work.
pub struct OutboxRepository<'a> {
    uow: &'a UnitOfWork,
}

impl<'a> OutboxRepository<'a> {
    pub(crate) fn new(uow: &'a UnitOfWork) -> Self {
        Self { uow }
    }

    /// Stages an outbox record insert. The record becomes visible to the
    /// relay only once the enclosing transaction commits.
    pub fn insert(&self, record: &OutboxRecord) {
        self.uow
            .stage(StagedWrite::InsertOutboxRecord(OutboxRecordRow::from(record)));
    }
}
