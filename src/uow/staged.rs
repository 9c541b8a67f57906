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

//! Staged writes: the unit of work's replayable write log.
//!
//! Each variant captures the full row to write, so a batch can be re-applied
//! verbatim inside a fresh transaction after a transient fault.

use diesel::prelude::*;

use crate::database::schema::{customers, orders, outbox_records};
use crate::models::customer::CustomerRow;
use crate::models::order::OrderRow;
use crate::models::outbox_record::OutboxRecordRow;

/// A write staged on a unit of work, applied by `save`.
#[derive(Debug, Clone)]
pub enum StagedWrite {
    InsertCustomer(CustomerRow),
    InsertOrder(OrderRow),
    UpdateOrder(OrderRow),
    InsertOutboxRecord(OutboxRecordRow),
}

impl StagedWrite {
    #[cfg(feature = "postgres")]
    pub(crate) fn apply_postgres(
        &self,
        conn: &mut diesel::pg::PgConnection,
    ) -> diesel::QueryResult<usize> {
        match self {
            StagedWrite::InsertCustomer(row) => diesel::insert_into(customers::table)
                .values(row)
                .execute(conn),
            StagedWrite::InsertOrder(row) => {
                diesel::insert_into(orders::table).values(row).execute(conn)
            }
            StagedWrite::UpdateOrder(row) => {
                diesel::update(orders::table.filter(orders::id.eq(&row.id)))
                    .set(row)
                    .execute(conn)
            }
            StagedWrite::InsertOutboxRecord(row) => diesel::insert_into(outbox_records::table)
                .values(row)
                .execute(conn),
        }
    }

    #[cfg(feature = "sqlite")]
    pub(crate) fn apply_sqlite(
        &self,
        conn: &mut diesel::sqlite::SqliteConnection,
    ) -> diesel::QueryResult<usize> {
        match self {
            StagedWrite::InsertCustomer(row) => diesel::insert_into(customers::table)
                .values(row)
                .execute(conn),
            StagedWrite::InsertOrder(row) => {
                diesel::insert_into(orders::table).values(row).execute(conn)
            }
            StagedWrite::UpdateOrder(row) => {
                diesel::update(orders::table.filter(orders::id.eq(&row.id)))
                    .set(row)
                    .execute(conn)
            }
            StagedWrite::InsertOutboxRecord(row) => diesel::insert_into(outbox_records::table)
                .values(row)
                .execute(conn),
        }
    }
}
