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

//! Broker traffic counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for one broker.
///
/// Every broker owns a `BrokerMetrics` and updates it from its loops and
/// HTTP handlers. Counters are relaxed atomics; read them for dashboards and
/// tests, not for synchronization.
///
/// # Examples
///
/// ```rust
/// use airpc::observability::BrokerMetrics;
///
/// let metrics = BrokerMetrics::new();
/// metrics.record_sent(128);
/// metrics.record_delivery_failure();
///
/// assert_eq!(metrics.messages_sent(), 1);
/// assert_eq!(metrics.bytes_sent(), 128);
/// assert_eq!(metrics.delivery_failures(), 1);
/// ```
#[derive(Debug, Default)]
pub struct BrokerMetrics {
    /// Messages handed to the peer
    messages_sent: AtomicU64,
    /// Serialized bytes handed to the peer
    bytes_sent: AtomicU64,
    /// Messages that could not be delivered
    delivery_failures: AtomicU64,
    /// Messages decoded and dispatched
    messages_received: AtomicU64,
    /// Serialized bytes received
    bytes_received: AtomicU64,
    /// Frames or bodies that could not be decoded
    decode_failures: AtomicU64,
    /// Polls issued or answered
    polls: AtomicU64,
    /// Polls that failed
    poll_failures: AtomicU64,
}

impl BrokerMetrics {
    /// Creates a new set of zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message handed to the peer.
    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Records a message that could not be delivered.
    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a message decoded and dispatched.
    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Records a frame or body that could not be decoded.
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a poll.
    pub fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed poll.
    pub fn record_poll_failure(&self) {
        self.poll_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of messages handed to the peer.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Returns the number of serialized bytes handed to the peer.
    #[must_use]
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Returns the number of messages that could not be delivered.
    #[must_use]
    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of messages decoded and dispatched.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Returns the number of serialized bytes received.
    #[must_use]
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Returns the number of frames or bodies that could not be decoded.
    #[must_use]
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of polls.
    #[must_use]
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Returns the number of failed polls.
    #[must_use]
    pub fn poll_failures(&self) -> u64 {
        self.poll_failures.load(Ordering::Relaxed)
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.messages_sent,
            &self.bytes_sent,
            &self.delivery_failures,
            &self.messages_received,
            &self.bytes_received,
            &self.decode_failures,
            &self.polls,
            &self.poll_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_counters() {
        let metrics = BrokerMetrics::new();
        metrics.record_poll();
        metrics.record_received(10);
        metrics.record_received(20);
        metrics.record_decode_failure();
        metrics.record_poll_failure();

        assert_eq!(metrics.polls(), 1);
        assert_eq!(metrics.messages_received(), 2);
        assert_eq!(metrics.bytes_received(), 30);
        assert_eq!(metrics.decode_failures(), 1);
        assert_eq!(metrics.poll_failures(), 1);
    }

    #[test]
    fn test_reset() {
        let metrics = BrokerMetrics::new();
        metrics.record_sent(5);
        metrics.record_poll();
        metrics.reset();
        assert_eq!(metrics.messages_sent(), 0);
        assert_eq!(metrics.bytes_sent(), 0);
        assert_eq!(metrics.polls(), 0);
    }
}
