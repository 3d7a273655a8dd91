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

//! Broker configuration.

use crate::transport::TransportError;
use std::time::Duration;
use url::Url;

/// Pause after a failed POST before the next message is taken.
pub const DEFAULT_DELIVERY_FAILURE_BACKOFF: Duration = Duration::from_secs(10);

/// Pause after an unexpected sender failure, such as an encode error.
pub const DEFAULT_UNEXPECTED_FAILURE_BACKOFF: Duration = Duration::from_millis(10);

/// Pause after a failed poll before polling again.
pub const DEFAULT_RECEIVE_FAILURE_BACKOFF: Duration = Duration::from_secs(10);

/// Pause after a poll that returned no messages.
pub const DEFAULT_IDLE_POLL_DELAY: Duration = Duration::from_millis(100);

/// Timeout applied by the HTTP client to every exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a mailbox holds a poll open waiting for the first message.
pub const DEFAULT_LONG_POLL: Duration = Duration::from_secs(25);

/// Maximum number of messages returned by one poll.
pub const DEFAULT_MAX_BATCH: usize = 256;

/// Default number of dispatch lanes: twice the available parallelism.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(8)
}

/// Configuration shared by both ends of a broker pair.
///
/// The polling end (`HttpBroker`) uses every field except `max_batch`. The
/// mailbox end (`HttpMailbox::from_config`) takes the broker id,
/// `worker_count`, `long_poll`, and `max_batch`. Validation checks that a
/// held poll fits inside the client's `request_timeout`.
///
/// # Examples
///
/// ```rust
/// use airpc::transport::BrokerConfig;
/// use std::time::Duration;
///
/// let config = BrokerConfig::new("orders", "http://localhost:8080")
///     .with_worker_count(4)
///     .with_delivery_failure_backoff(Duration::from_secs(1));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.mailbox_url(), "http://localhost:8080/brokers/orders");
/// ```
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Name of the broker, shared by both ends.
    pub broker_id: String,
    /// Base URL of the server hosting the mailbox.
    pub peer_url: String,
    /// Pause after a failed POST.
    pub delivery_failure_backoff: Duration,
    /// Pause after an unexpected sender failure.
    pub unexpected_failure_backoff: Duration,
    /// Pause after a failed poll.
    pub receive_failure_backoff: Duration,
    /// Pause after an empty poll.
    pub idle_poll_delay: Duration,
    /// Number of dispatch lanes.
    pub worker_count: usize,
    /// Timeout applied to every HTTP exchange.
    pub request_timeout: Duration,
    /// How long a poll is held open waiting for the first message.
    pub long_poll: Duration,
    /// Maximum number of messages per poll response.
    pub max_batch: usize,
}

impl BrokerConfig {
    /// Creates a configuration with default timings.
    pub fn new(broker_id: impl Into<String>, peer_url: impl Into<String>) -> Self {
        Self {
            broker_id: broker_id.into(),
            peer_url: peer_url.into(),
            delivery_failure_backoff: DEFAULT_DELIVERY_FAILURE_BACKOFF,
            unexpected_failure_backoff: DEFAULT_UNEXPECTED_FAILURE_BACKOFF,
            receive_failure_backoff: DEFAULT_RECEIVE_FAILURE_BACKOFF,
            idle_poll_delay: DEFAULT_IDLE_POLL_DELAY,
            worker_count: default_worker_count(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            long_poll: DEFAULT_LONG_POLL,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    /// Sets the pause after a failed POST.
    #[must_use]
    pub fn with_delivery_failure_backoff(mut self, backoff: Duration) -> Self {
        self.delivery_failure_backoff = backoff;
        self
    }

    /// Sets the pause after an unexpected sender failure.
    #[must_use]
    pub fn with_unexpected_failure_backoff(mut self, backoff: Duration) -> Self {
        self.unexpected_failure_backoff = backoff;
        self
    }

    /// Sets the pause after a failed poll.
    #[must_use]
    pub fn with_receive_failure_backoff(mut self, backoff: Duration) -> Self {
        self.receive_failure_backoff = backoff;
        self
    }

    /// Sets the pause after an empty poll.
    #[must_use]
    pub fn with_idle_poll_delay(mut self, delay: Duration) -> Self {
        self.idle_poll_delay = delay;
        self
    }

    /// Sets the number of dispatch lanes.
    #[must_use]
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    /// Sets the timeout applied to every HTTP exchange.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets how long a poll is held open.
    #[must_use]
    pub fn with_long_poll(mut self, long_poll: Duration) -> Self {
        self.long_poll = long_poll;
        self
    }

    /// Sets the maximum number of messages per poll response.
    #[must_use]
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    /// Returns the URL of this broker's mailbox on the peer.
    #[must_use]
    pub fn mailbox_url(&self) -> String {
        format!(
            "{}/brokers/{}",
            self.peer_url.trim_end_matches('/'),
            self.broker_id
        )
    }

    /// Checks the configuration for values no broker can run with.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] for an empty or
    /// non-path-safe broker id, a peer URL that is not `http` or `https`,
    /// zero workers, a zero batch size, or a long poll that does not fit
    /// inside the request timeout.
    pub fn validate(&self) -> Result<(), TransportError> {
        let invalid = |reason: String| Err(TransportError::InvalidConfiguration { reason });

        if self.broker_id.is_empty() {
            return invalid("broker id must not be empty".to_string());
        }
        if self.broker_id.contains(['/', '?', '#']) {
            return invalid(format!(
                "broker id '{}' must not contain '/', '?' or '#'",
                self.broker_id
            ));
        }
        match Url::parse(&self.peer_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return invalid(format!(
                    "peer url '{}' has unsupported scheme '{}'",
                    self.peer_url,
                    url.scheme()
                ));
            }
            Err(e) => return invalid(format!("peer url '{}' is invalid: {}", self.peer_url, e)),
        }
        if self.worker_count == 0 {
            return invalid("worker count must be at least 1".to_string());
        }
        if self.max_batch == 0 {
            return invalid("max batch must be at least 1".to_string());
        }
        if self.long_poll >= self.request_timeout {
            return invalid(format!(
                "long poll {:?} must be shorter than request timeout {:?}",
                self.long_poll, self.request_timeout
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::new("b1", "http://localhost:1");
        assert_eq!(config.delivery_failure_backoff, Duration::from_secs(10));
        assert_eq!(config.unexpected_failure_backoff, Duration::from_millis(10));
        assert_eq!(config.receive_failure_backoff, Duration::from_secs(10));
        assert_eq!(config.idle_poll_delay, Duration::from_millis(100));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.long_poll, Duration::from_secs(25));
        assert_eq!(config.max_batch, 256);
        assert!(config.worker_count >= 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mailbox_url_trims_slash() {
        let config = BrokerConfig::new("b1", "https://example.com/api/");
        assert_eq!(config.mailbox_url(), "https://example.com/api/brokers/b1");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = BrokerConfig::new("b1", "http://localhost:1");

        let cases = [
            BrokerConfig::new("", "http://localhost:1"),
            BrokerConfig::new("a/b", "http://localhost:1"),
            BrokerConfig::new("b1", "not a url"),
            BrokerConfig::new("b1", "ftp://localhost:1"),
            base.clone().with_worker_count(0),
            base.clone().with_max_batch(0),
            base.clone().with_long_poll(Duration::from_secs(120)),
        ];

        for config in cases {
            let error = config.validate().unwrap_err();
            assert!(
                matches!(error, TransportError::InvalidConfiguration { .. }),
                "unexpected error for {:?}: {}",
                config,
                error
            );
        }
    }
}
