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

//! Logging initialization helper.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// # Arguments
/// * `filter` - Optional filter directive (e.g. `"tabellaria=debug"`). When
///   `None`, the `RUST_LOG` environment variable is honored, defaulting to
///   `info`.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(filter: Option<&str>) {
    let env_filter = match filter {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
