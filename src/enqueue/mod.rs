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

//! Enqueue Coordinator
//!
//! The command-processing boundary of the write path. Each `execute` call is
//! exactly one transactional attempt:
//! 1. begin a unit of work
//! 2. apply the command's domain mutations (which may emit events)
//! 3. stage one outbox record per emitted event
//! 4. save, then commit
//!
//! Domain writes and outbox inserts share the same transaction, so a domain
//! row can never be persisted without its event, or vice versa. The
//! coordinator never talks to the broker and never waits for publication.

pub mod commands;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::database::Database;
use crate::error::{CommandError, UnitOfWorkError};
use crate::events::{DomainEvent, EncodedEvent, EventRegistry};
use crate::models::outbox_record::OutboxRecord;
use crate::retry::SaveRetryPolicy;
use crate::uow::{CustomerRepository, OrderRepository, UnitOfWork};

/// A state-changing request against the domain.
///
/// Commands apply their mutations through the scope's repositories and emit
/// the events describing what changed. They run inside one transaction; a
/// returned error rolls everything back.
#[async_trait]
pub trait Command: Send + Sync {
    type Output: Send;

    async fn apply(&self, scope: &mut CommandScope<'_>) -> Result<Self::Output, CommandError>;
}

/// The command's window onto the open transaction: repository handles plus
/// the event sink.
pub struct CommandScope<'a> {
    uow: &'a UnitOfWork,
    registry: &'a EventRegistry,
    events: Vec<EncodedEvent>,
}

impl<'a> CommandScope<'a> {
    fn new(uow: &'a UnitOfWork, registry: &'a EventRegistry) -> Self {
        Self {
            uow,
            registry,
            events: Vec::new(),
        }
    }

    /// Customer repository, scoped to the command's transaction.
    pub fn customers(&self) -> CustomerRepository<'_> {
        self.uow.customers()
    }

    /// Order repository, scoped to the command's transaction.
    pub fn orders(&self) -> OrderRepository<'_> {
        self.uow.orders()
    }

    /// Emits a domain event. The event is encoded immediately; the outbox
    /// record is created by the coordinator once the command completes.
    pub fn emit<E: DomainEvent>(&mut self, event: &E) -> Result<(), CommandError> {
        let encoded = self.registry.encode(event)?;
        self.events.push(encoded);
        Ok(())
    }

    fn take_events(&mut self) -> Vec<EncodedEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Executes commands against the domain, persisting domain rows and outbox
/// records atomically.
#[derive(Clone)]
pub struct EnqueueCoordinator {
    database: Database,
    registry: Arc<EventRegistry>,
    retry: SaveRetryPolicy,
    cancel: CancellationToken,
}

impl EnqueueCoordinator {
    pub fn new(
        database: Database,
        registry: Arc<EventRegistry>,
        retry: SaveRetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            database,
            registry,
            retry,
            cancel,
        }
    }

    /// Runs one command in exactly one transactional attempt.
    ///
    /// On success the domain mutations and one outbox record per emitted
    /// event are committed together. On any failure the transaction is
    /// rolled back and nothing is visible.
    pub async fn execute<C: Command>(&self, command: C) -> Result<C::Output, CommandError> {
        let mut uow = UnitOfWork::new(self.database.clone(), self.retry, self.cancel.clone());
        uow.begin().await.map_err(Self::map_uow_error)?;

        let outcome = {
            let mut scope = CommandScope::new(&uow, &self.registry);
            match command.apply(&mut scope).await {
                Ok(output) => {
                    let events = scope.take_events();
                    let emitted = events.len();
                    for encoded in events {
                        let record = OutboxRecord::new(encoded.type_tag, encoded.payload);
                        uow.outbox().insert(&record);
                    }
                    debug!(events = emitted, "command applied");
                    Ok(output)
                }
                Err(e) => Err(e),
            }
        };

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                uow.rollback().await;
                return Err(e);
            }
        };

        if self.cancel.is_cancelled() {
            uow.rollback().await;
            return Err(CommandError::Cancelled);
        }

        if let Err(e) = uow.save().await {
            uow.rollback().await;
            return Err(Self::map_uow_error(e));
        }

        if let Err(e) = uow.commit().await {
            // commit already attempted its own rollback
            return Err(Self::map_uow_error(e));
        }

        Ok(output)
    }

    fn map_uow_error(error: UnitOfWorkError) -> CommandError {
        match error {
            UnitOfWorkError::Cancelled => CommandError::Cancelled,
            other => CommandError::UnitOfWork(other),
        }
    }
}
