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

//! The wire envelope exchanged between client and server endpoints.
//!
//! Every message belonging to an invocation carries its [`InvocationId`],
//! except [`Envelope::Response`], which is correlated by [`RequestId`]
//! instead. The message flow for one invocation is:
//!
//! ```text
//! client                                   server
//!   | ---- MethodInvocation(id, m, p) ----> |
//!   | <--- InterimResponse(id, progress) -- |  zero or more
//!   | <--- InterimRequest(id, rq, q) ------ |  zero or more
//!   | ---- Response(rq, answer) ----------> |
//!   | ---- Cancel(id) --------------------> |  optional
//!   | <--- Finished(id, r) | Exception ---- |  exactly one
//! ```

use super::{InvocationId, Payload, RequestId};
use crate::transport::Message;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One message of the invocation protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Envelope {
    /// Client asks the server to run a method.
    MethodInvocation {
        /// Correlation key for the call.
        invocation_id: InvocationId,
        /// Name of the server-side method.
        method: String,
        /// The method's argument.
        parameter: Payload,
    },
    /// Client asks the server to stop a running invocation.
    Cancel {
        /// The invocation to cancel.
        invocation_id: InvocationId,
    },
    /// Server reports progress.
    InterimResponse {
        /// The invocation making progress.
        invocation_id: InvocationId,
        /// Application-defined progress value.
        progress: Payload,
    },
    /// Server asks the client a question mid-execution.
    InterimRequest {
        /// The invocation asking.
        invocation_id: InvocationId,
        /// Correlates the answer.
        request_id: RequestId,
        /// Application-defined question.
        question: Payload,
    },
    /// Client answers an interim request.
    Response {
        /// The request being answered.
        request_id: RequestId,
        /// Application-defined answer.
        answer: Payload,
    },
    /// Server reports success. Terminal.
    Finished {
        /// The invocation that finished.
        invocation_id: InvocationId,
        /// The method's result.
        result: Payload,
    },
    /// Server reports failure. Terminal.
    Exception {
        /// The invocation that failed.
        invocation_id: InvocationId,
        /// What went wrong.
        error: RemoteError,
    },
}

impl Envelope {
    /// Returns the kind of this envelope.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::MethodInvocation { .. } => MessageKind::MethodInvocation,
            Self::Cancel { .. } => MessageKind::Cancel,
            Self::InterimResponse { .. } => MessageKind::InterimResponse,
            Self::InterimRequest { .. } => MessageKind::InterimRequest,
            Self::Response { .. } => MessageKind::Response,
            Self::Finished { .. } => MessageKind::Finished,
            Self::Exception { .. } => MessageKind::Exception,
        }
    }

    /// Returns the invocation id, or `None` for [`Envelope::Response`].
    #[must_use]
    pub const fn invocation_id(&self) -> Option<InvocationId> {
        match self {
            Self::MethodInvocation { invocation_id, .. }
            | Self::Cancel { invocation_id }
            | Self::InterimResponse { invocation_id, .. }
            | Self::InterimRequest { invocation_id, .. }
            | Self::Finished { invocation_id, .. }
            | Self::Exception { invocation_id, .. } => Some(*invocation_id),
            Self::Response { .. } => None,
        }
    }

    /// Returns `true` for `Finished` and `Exception`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }
}

impl Message for Envelope {
    fn affinity_key(&self) -> Option<u64> {
        match self {
            Self::Response { request_id, .. } => Some(request_id.affinity_key()),
            other => other.invocation_id().map(|id| id.affinity_key()),
        }
    }

    fn kind_name(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// The kind of an [`Envelope`], without its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// [`Envelope::MethodInvocation`]
    MethodInvocation,
    /// [`Envelope::Cancel`]
    Cancel,
    /// [`Envelope::InterimResponse`]
    InterimResponse,
    /// [`Envelope::InterimRequest`]
    InterimRequest,
    /// [`Envelope::Response`]
    Response,
    /// [`Envelope::Finished`]
    Finished,
    /// [`Envelope::Exception`]
    Exception,
}

impl MessageKind {
    /// Returns `true` for the kinds that end an invocation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Exception)
    }

    /// Returns the snake case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MethodInvocation => "method_invocation",
            Self::Cancel => "cancel",
            Self::InterimResponse => "interim_response",
            Self::InterimRequest => "interim_request",
            Self::Response => "response",
            Self::Finished => "finished",
            Self::Exception => "exception",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who raised a [`RemoteError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteErrorKind {
    /// The method itself failed.
    Application,
    /// The server has no handler for the requested method.
    MethodNotFound,
    /// The handler returned an error before it could respond.
    HandlerFailed,
    /// The client could not deliver the invocation to the server.
    DeliveryFailed,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Application => "application",
            Self::MethodNotFound => "method_not_found",
            Self::HandlerFailed => "handler_failed",
            Self::DeliveryFailed => "delivery_failed",
        })
    }
}

/// The failure carried by an [`Envelope::Exception`].
///
/// # Examples
///
/// ```rust
/// use airpc::invocation::{RemoteError, RemoteErrorKind};
///
/// let error = RemoteError::application("disk full");
/// assert_eq!(error.kind(), RemoteErrorKind::Application);
/// assert_eq!(error.to_string(), "application: disk full");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    kind: RemoteErrorKind,
    message: String,
}

impl RemoteError {
    /// Creates a remote error of the given kind.
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates an application failure raised by a method.
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Application, message)
    }

    /// Returns who raised the error.
    #[must_use]
    pub const fn kind(&self) -> RemoteErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RemoteError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{PostcardSerializer, Serializer};

    fn all_kinds(id: InvocationId) -> Vec<Envelope> {
        vec![
            Envelope::MethodInvocation {
                invocation_id: id,
                method: "echo".to_string(),
                parameter: Payload::encode(&42).unwrap(),
            },
            Envelope::Cancel { invocation_id: id },
            Envelope::InterimResponse {
                invocation_id: id,
                progress: Payload::encode("25%").unwrap(),
            },
            Envelope::InterimRequest {
                invocation_id: id,
                request_id: RequestId::from("Q1"),
                question: Payload::encode("proceed?").unwrap(),
            },
            Envelope::Finished {
                invocation_id: id,
                result: Payload::encode("done").unwrap(),
            },
            Envelope::Exception {
                invocation_id: id,
                error: RemoteError::application("boom"),
            },
        ]
    }

    #[test]
    fn test_same_invocation_shares_affinity() {
        let id = InvocationId::new();
        let keys: Vec<_> = all_kinds(id).iter().map(|e| e.affinity_key()).collect();
        assert!(keys.iter().all(|k| *k == Some(id.affinity_key())));
    }

    #[test]
    fn test_terminal_kinds() {
        let id = InvocationId::new();
        let terminal: Vec<_> = all_kinds(id)
            .into_iter()
            .filter(Envelope::is_terminal)
            .map(|e| e.kind())
            .collect();
        assert_eq!(terminal, vec![MessageKind::Finished, MessageKind::Exception]);
    }

    #[test]
    fn test_response_has_no_invocation_id() {
        let response = Envelope::Response {
            request_id: RequestId::from("Q1"),
            answer: Payload::encode("yes").unwrap(),
        };
        assert_eq!(response.invocation_id(), None);
        assert_eq!(response.kind_name(), "response");
        assert_eq!(
            response.affinity_key(),
            Some(RequestId::from("Q1").affinity_key())
        );
    }

    #[test]
    fn test_envelopes_survive_postcard() {
        let serializer = PostcardSerializer::default();
        for envelope in all_kinds(InvocationId::new()) {
            let bytes = serializer.serialize(&envelope).unwrap();
            let back: Envelope = serializer.deserialize(&bytes).unwrap();
            assert_eq!(back, envelope);
        }
    }
}
