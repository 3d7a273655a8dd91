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

//! Top-level error types for airpc.
//!
//! Errors are layered:
//!
//! 1. **Transport Layer**: a message could not be moved ([`TransportError`])
//! 2. **Invocation Layer**: a message could not be placed, or the endpoints
//!    are misconfigured ([`InvocationError`])
//! 3. **Application Layer**: a method handler failed (boxed trait objects)
//!
//! The [`AirpcError`] enum composes these layers. It is what the global
//! error sink ([`ErrorObserver`](crate::observability::ErrorObserver))
//! receives.
//!
//! # Error Handling Strategy
//!
//! - **Transport errors** are paced by the broker loops and never retried for
//!   the same message.
//! - **Invocation errors** either fail loudly at the call site
//!   (configuration) or are reported and the message discarded (protocol).
//! - **Application errors** are reported and, when they interrupt a method,
//!   turned into an `Exception` for the caller.
//!
//! # Examples
//!
//! ```rust
//! use airpc::AirpcError;
//! use airpc::invocation::InvocationError;
//! use airpc::transport::TransportError;
//!
//! let error: AirpcError = TransportError::Closed {
//!     broker_id: "b1".to_string(),
//! }
//! .into();
//! assert!(error.is_transport_error());
//!
//! let error: AirpcError = InvocationError::MethodNotFound {
//!     method: "echo".to_string(),
//! }
//! .into();
//! assert!(error.is_configuration_error());
//! ```

use crate::invocation::InvocationError;
use crate::transport::TransportError;
use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for airpc operations.
#[derive(Debug)]
pub enum AirpcError {
    /// A transport-layer error occurred.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use airpc::AirpcError;
    /// use airpc::transport::TransportError;
    ///
    /// let error = AirpcError::Transport(TransportError::Closed {
    ///     broker_id: "b1".to_string(),
    /// });
    /// assert!(error.is_transport_error());
    /// assert!(!error.is_recoverable());
    /// ```
    Transport(TransportError),

    /// An invocation-layer error occurred.
    Invocation(InvocationError),

    /// A method handler failed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use airpc::AirpcError;
    /// use std::io;
    ///
    /// let app_error = io::Error::new(io::ErrorKind::Other, "test");
    /// let error = AirpcError::Application(Box::new(app_error));
    /// assert!(error.is_application_error());
    /// ```
    Application(Box<dyn StdError + Send + Sync>),
}

impl AirpcError {
    /// Returns `true` if this is a transport error.
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if this is an invocation error.
    #[must_use]
    pub const fn is_invocation_error(&self) -> bool {
        matches!(self, Self::Invocation(_))
    }

    /// Returns `true` if this is an application error.
    #[must_use]
    pub const fn is_application_error(&self) -> bool {
        matches!(self, Self::Application(_))
    }

    /// Returns `true` if the endpoints are wired incorrectly.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        match self {
            Self::Invocation(e) => e.is_configuration_error(),
            Self::Transport(TransportError::InvalidConfiguration { .. }) => true,
            _ => false,
        }
    }

    /// Returns `true` if a message could not be placed by its receiver.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        match self {
            Self::Invocation(e) => e.is_protocol_error(),
            _ => false,
        }
    }

    /// Returns `true` if a later attempt may succeed.
    ///
    /// Application errors are considered non-recoverable at the framework
    /// level.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_recoverable(),
            Self::Invocation(_) | Self::Application(_) => false,
        }
    }
}

impl fmt::Display for AirpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Invocation(e) => write!(f, "invocation error: {}", e),
            Self::Application(e) => write!(f, "application error: {}", e),
        }
    }
}

impl StdError for AirpcError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Invocation(e) => Some(e),
            Self::Application(e) => Some(e.as_ref()),
        }
    }
}

impl From<TransportError> for AirpcError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl From<InvocationError> for AirpcError {
    fn from(error: InvocationError) -> Self {
        Self::Invocation(error)
    }
}
