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

//! Customer read operations (pool-scoped, outside any unit of work).

use diesel::prelude::*;

use super::DAL;
use crate::database::schema::customers;
use crate::database::universal_types::UniversalUuid;
use crate::database::BackendType;
use crate::error::StoreError;
use crate::models::customer::{Customer, CustomerRow};

/// Data access layer for customer lookups.
#[derive(Clone)]
pub struct CustomersDAL<'a> {
    dal: &'a DAL,
}

impl<'a> CustomersDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Loads a customer by id.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<Option<Customer>, StoreError> {
        match self.dal.database.backend() {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => self.get_by_id_postgres(id).await,
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => self.get_by_id_sqlite(id).await,
        }
    }

    #[cfg(feature = "postgres")]
    async fn get_by_id_postgres(&self, id: UniversalUuid) -> Result<Option<Customer>, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let id_bytes = id.as_bytes().to_vec();

        let row: Option<CustomerRow> = conn
            .interact(move |conn| {
                customers::table
                    .filter(customers::id.eq(id_bytes))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        row.map(|r| Customer::try_from(r).map_err(|e| StoreError::Corrupt(e.to_string())))
            .transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn get_by_id_sqlite(&self, id: UniversalUuid) -> Result<Option<Customer>, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let id_bytes = id.as_bytes().to_vec();

        let row: Option<CustomerRow> = conn
            .interact(move |conn| {
                customers::table
                    .filter(customers::id.eq(id_bytes))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        row.map(|r| Customer::try_from(r).map_err(|e| StoreError::Corrupt(e.to_string())))
            .transpose()
    }
}
