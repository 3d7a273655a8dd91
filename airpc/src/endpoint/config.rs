//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Configuration types for endpoints.

use crate::invocation::DEFAULT_LEAK_WARNING_THRESHOLD;
use std::time::Duration;

/// Default advisory timeout carried by client invocations.
pub const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a client or server endpoint.
///
/// # Examples
///
/// ```rust
/// use airpc::endpoint::EndpointConfig;
/// use std::time::Duration;
///
/// let config = EndpointConfig {
///     leak_warning_threshold: 1000,
///     ..Default::default()
/// };
/// assert_eq!(config.default_timeout, Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Server table size at which registration logs a leak warning.
    ///
    /// The warning is advisory: nothing is evicted or rejected.
    ///
    /// Default: 500
    pub leak_warning_threshold: usize,

    /// Advisory timeout carried by client invocations that set none.
    ///
    /// Carried and reported, never enforced by the correlation layer. Use
    /// `call_timeout` for an enforced wait.
    ///
    /// Default: 30 seconds
    pub default_timeout: Option<Duration>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            leak_warning_threshold: DEFAULT_LEAK_WARNING_THRESHOLD,
            default_timeout: Some(DEFAULT_INVOCATION_TIMEOUT),
        }
    }
}

impl EndpointConfig {
    /// Creates a new configuration with default values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use airpc::endpoint::EndpointConfig;
    ///
    /// let config = EndpointConfig::new();
    /// assert_eq!(config.leak_warning_threshold, 500);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the leak warning threshold.
    pub fn with_leak_warning_threshold(mut self, threshold: usize) -> Self {
        self.leak_warning_threshold = threshold;
        self
    }

    /// Sets the advisory timeout.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use airpc::endpoint::EndpointConfig;
    ///
    /// let config = EndpointConfig::new().with_default_timeout(None);
    /// assert_eq!(config.default_timeout, None);
    /// ```
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }
}
