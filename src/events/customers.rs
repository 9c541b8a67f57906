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

//! Customer domain events.

use serde::{Deserialize, Serialize};

use super::DomainEvent;
use crate::database::universal_types::UniversalUuid;

/// A new customer registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRegistered {
    pub customer_id: UniversalUuid,
    pub name: String,
    pub email: String,
}

impl DomainEvent for CustomerRegistered {
    const TYPE_TAG: &'static str = "customers.CustomerRegistered";
}
