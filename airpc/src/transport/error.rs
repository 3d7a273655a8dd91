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

//! Transport layer error types.
//!
//! Transport errors are the lowest layer of the error hierarchy. They describe
//! a message that could not be moved between the two ends of a broker pair.
//!
//! # Error Categories
//!
//! - **Delivery failures**: an HTTP exchange returned a non-2xx status or
//!   never completed. The sender loop backs off after these.
//! - **Codec failures**: a message could not be encoded or decoded.
//! - **Configuration errors**: the broker was configured with invalid values.
//! - **Lifecycle errors**: the broker was used after shutdown or before start.

use crate::serialization::{DeserializationError, SerializationError};
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in the transport layer.
///
/// # Examples
///
/// ```rust
/// use airpc::transport::TransportError;
///
/// let error = TransportError::HttpStatus {
///     method: "POST",
///     url: "http://localhost:8080/brokers/b1".to_string(),
///     status: 503,
/// };
/// assert!(error.is_delivery_failure());
/// assert!(error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer answered with a non-2xx status.
    #[error("{method} {url} returned HTTP {status}")]
    HttpStatus {
        /// The HTTP method of the failed exchange
        method: &'static str,
        /// The URL that was requested
        url: String,
        /// The status code returned by the peer
        status: u16,
    },

    /// The exchange failed before a status was received.
    ///
    /// Covers connection failures, resets, and client-side timeouts.
    #[error("{method} {url} failed: {reason}")]
    RequestFailed {
        /// The HTTP method of the failed exchange
        method: &'static str,
        /// The URL that was requested
        url: String,
        /// Description of the failure
        reason: String,
        /// The underlying client error, if available
        #[source]
        source: Option<BoxedSource>,
    },

    /// An outbound message could not be encoded.
    #[error(transparent)]
    Encode(#[from] SerializationError),

    /// An inbound message or batch could not be decoded.
    #[error(transparent)]
    Decode(#[from] DeserializationError),

    /// Invalid broker configuration.
    ///
    /// This is not recoverable and indicates a programming error.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
    },

    /// The broker has not been started with a message handler yet.
    #[error("broker {broker_id} has not been started")]
    NotStarted {
        /// The broker that was used too early
        broker_id: String,
    },

    /// The broker was already started.
    #[error("broker {broker_id} is already started")]
    AlreadyStarted {
        /// The broker that was started twice
        broker_id: String,
    },

    /// The broker has shut down and no longer moves messages.
    #[error("broker {broker_id} is closed")]
    Closed {
        /// The broker that was closed
        broker_id: String,
    },
}

impl TransportError {
    /// Creates a [`TransportError::RequestFailed`] wrapping a client error.
    pub fn request_failed(
        method: &'static str,
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::RequestFailed {
            method,
            url: url.into(),
            reason: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns `true` if an HTTP exchange did not succeed.
    ///
    /// These are the failures that pace the sender loop with the delivery
    /// backoff and are routed to a message's own failure callback.
    #[must_use]
    pub const fn is_delivery_failure(&self) -> bool {
        matches!(self, Self::HttpStatus { .. } | Self::RequestFailed { .. })
    }

    /// Returns `true` if a later exchange may succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::HttpStatus { .. } | Self::RequestFailed { .. } | Self::NotStarted { .. }
        )
    }

    /// Returns `true` if the broker is unusable after this error.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}
