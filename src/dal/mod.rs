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

//! Data Access Layer with runtime backend selection.
//!
//! Each table gets a small DAL handle borrowed from the shared [`DAL`]
//! value. Operations here are short, single-statement units scoped to a
//! pooled connection; multi-statement transactional work goes through the
//! unit of work instead.

pub mod customers;
pub mod orders;
pub mod outbox;

pub use customers::CustomersDAL;
pub use orders::OrdersDAL;
pub use outbox::OutboxDAL;

use crate::database::Database;

/// Data access layer for the engine's tables.
#[derive(Clone)]
pub struct DAL {
    pub(crate) database: Database,
}

impl DAL {
    /// Creates a new DAL over the given database pool.
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Returns the underlying database handle.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Outbox record operations.
    pub fn outbox(&self) -> OutboxDAL<'_> {
        OutboxDAL::new(self)
    }

    /// Order read operations.
    pub fn orders(&self) -> OrdersDAL<'_> {
        OrdersDAL::new(self)
    }

    /// Customer read operations.
    pub fn customers(&self) -> CustomersDAL<'_> {
        CustomersDAL::new(self)
    }
}
