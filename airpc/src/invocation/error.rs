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

//! Error types for the invocation layer.

use super::{InvocationId, MessageKind, RequestId};
use std::fmt;

/// Errors raised by the correlation layer.
///
/// Two groups matter to callers:
///
/// - **Configuration errors** (`MethodNotFound`, `DuplicateMethod`) mean the
///   endpoints were wired incorrectly. They fail loudly and are never
///   retried.
/// - **Protocol errors** (`UnknownInvocation`, `UnexpectedMessage`) mean a
///   message arrived that the receiving table cannot place. They are
///   reported to the global error sink and the message is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// No handler or route is registered for the method.
    MethodNotFound {
        /// The method that was requested.
        method: String,
    },

    /// A handler is already registered under this name.
    DuplicateMethod {
        /// The method that was registered twice.
        method: String,
    },

    /// A message referenced an invocation the table does not know.
    UnknownInvocation {
        /// The id carried by the message.
        invocation_id: InvocationId,
        /// The kind of message that could not be placed.
        kind: MessageKind,
    },

    /// A message kind arrived at an endpoint that never handles it.
    UnexpectedMessage {
        /// The kind of message received.
        kind: MessageKind,
        /// The endpoint role that received it, `"client"` or `"server"`.
        endpoint: &'static str,
    },

    /// An interim request was abandoned before it was answered.
    AnswerAbandoned {
        /// The request that will never be answered.
        request_id: RequestId,
    },

    /// The endpoint has no response handler to receive answers.
    NoResponseHandler,

    /// A payload could not be encoded.
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// A payload could not be decoded into the requested type.
    Deserialization {
        /// Description of the failure.
        message: String,
    },
}

impl InvocationError {
    /// Returns `true` if the endpoints are wired incorrectly.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MethodNotFound { .. } | Self::DuplicateMethod { .. }
        )
    }

    /// Returns `true` if a message could not be placed by its receiver.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownInvocation { .. } | Self::UnexpectedMessage { .. }
        )
    }

    /// Returns the invocation this error refers to, if any.
    #[must_use]
    pub const fn invocation_id(&self) -> Option<InvocationId> {
        match self {
            Self::UnknownInvocation { invocation_id, .. } => Some(*invocation_id),
            _ => None,
        }
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MethodNotFound { method } => {
                write!(f, "no handler registered for method '{}'", method)
            }
            Self::DuplicateMethod { method } => {
                write!(f, "method '{}' is already registered", method)
            }
            Self::UnknownInvocation {
                invocation_id,
                kind,
            } => write!(f, "{} for unknown invocation {}", kind, invocation_id),
            Self::UnexpectedMessage { kind, endpoint } => {
                write!(f, "{} is not accepted by a {} endpoint", kind, endpoint)
            }
            Self::AnswerAbandoned { request_id } => {
                write!(f, "interim request {} was abandoned", request_id)
            }
            Self::NoResponseHandler => write!(f, "no response handler is installed"),
            Self::Serialization { message } => {
                write!(f, "payload serialization failed: {}", message)
            }
            Self::Deserialization { message } => {
                write!(f, "payload deserialization failed: {}", message)
            }
        }
    }
}

impl std::error::Error for InvocationError {}
