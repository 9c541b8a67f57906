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

//! Relay health probe.
//!
//! The probe is `ok` iff the most recent cycle completed without a top-level
//! error and the broker was reachable during it. Until a first cycle has
//! completed the probe reports unhealthy.

use std::sync::Mutex;

use crate::database::universal_types::UniversalTimestamp;

/// Snapshot returned to health-check callers.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub healthy: bool,
    pub last_cycle_at: Option<UniversalTimestamp>,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct HealthState {
    last_cycle_ok: bool,
    broker_reachable: bool,
    last_cycle_at: Option<UniversalTimestamp>,
    last_error: Option<String>,
}

/// Shared health state updated by the relay after every cycle.
#[derive(Default)]
pub struct RelayHealth {
    state: Mutex<HealthState>,
}

impl RelayHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one cycle.
    pub fn record_cycle(&self, error: Option<String>, broker_reachable: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.last_cycle_ok = error.is_none();
        state.broker_reachable = broker_reachable;
        state.last_cycle_at = Some(UniversalTimestamp::now());
        state.last_error = error;
    }

    /// Whether the probe currently reports healthy.
    pub fn is_healthy(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.last_cycle_at.is_some() && state.last_cycle_ok && state.broker_reachable
    }

    /// Full health snapshot.
    pub fn report(&self) -> HealthReport {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        HealthReport {
            healthy: state.last_cycle_at.is_some()
                && state.last_cycle_ok
                && state.broker_reachable,
            last_cycle_at: state.last_cycle_at,
            last_error: state.last_error.clone(),
        }
    }
}
