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

//! Customer aggregate of the sample domain.

use crate::database::schema::customers;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};

/// A registered customer (domain type).
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: UniversalUuid,
    pub name: String,
    pub email: String,
    pub registered_on_utc: UniversalTimestamp,
}

impl Customer {
    pub fn register(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: UniversalUuid::new_v4(),
            name: name.into(),
            email: email.into(),
            registered_on_utc: UniversalTimestamp::now(),
        }
    }
}

/// Database row for a customer.
#[derive(Debug, Clone, diesel::Queryable, diesel::Insertable)]
#[diesel(table_name = customers)]
pub struct CustomerRow {
    pub id: Vec<u8>,
    pub name: String,
    pub email: String,
    pub registered_on_utc: chrono::NaiveDateTime,
}

impl From<&Customer> for CustomerRow {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id.as_bytes().to_vec(),
            name: customer.name.clone(),
            email: customer.email.clone(),
            registered_on_utc: customer.registered_on_utc.to_naive(),
        }
    }
}

impl TryFrom<CustomerRow> for Customer {
    type Error = uuid::Error;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UniversalUuid::from_bytes(&row.id)?,
            name: row.name,
            email: row.email,
            registered_on_utc: UniversalTimestamp::from_naive(row.registered_on_utc),
        })
    }
}
