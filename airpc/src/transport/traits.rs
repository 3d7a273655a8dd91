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

//! Core transport trait definitions.

use crate::AirpcError;
use crate::observability::ErrorObserver;
use crate::transport::TransportError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// A value a broker can move.
///
/// Messages are opaque to the transport apart from their affinity key.
/// Messages that return the same key are dispatched to the receive
/// callback in arrival order; messages without a key may be dispatched
/// concurrently with anything else.
pub trait Message: Serialize + DeserializeOwned + fmt::Debug + Send + 'static {
    /// Returns the dispatch ordering key, if this message has one.
    fn affinity_key(&self) -> Option<u64> {
        None
    }

    /// Returns a short name for this message, used in logs.
    fn kind_name(&self) -> &'static str {
        "message"
    }
}

/// Called at most once with the reason a message could not be delivered.
pub type FailureCallback = Box<dyn FnOnce(TransportError) + Send + 'static>;

/// One end of a full-duplex message channel between two named endpoints.
///
/// Sending never blocks and never fails synchronously: messages are queued
/// and delivered in FIFO order by the broker. A message that cannot be
/// delivered is reported to its own failure callback if it has one, and to
/// the broker's error observer otherwise. Failed messages are not re-sent.
///
/// The trait is object safe; the invocation layer stores
/// `Arc<dyn Broker<Envelope>>` as the route replies travel back on.
pub trait Broker<M>: Send + Sync
where
    M: Message,
{
    /// Returns the broker's name.
    fn id(&self) -> &str;

    /// Queues a message, routing a delivery failure to `on_failure` when set.
    fn send_with_failure(&self, message: M, on_failure: Option<FailureCallback>);

    /// Queues a message.
    fn send(&self, message: M) {
        self.send_with_failure(message, None);
    }
}

/// The receive callback of a broker.
///
/// Handlers run on broker worker tasks. They must not block indefinitely;
/// long-running work belongs on its own task. An error is reported to the
/// broker's error observer and does not stop delivery.
pub trait MessageHandler<M>: Send + Sync {
    /// Handles one inbound message.
    fn on_message(&self, message: M) -> Result<(), AirpcError>;
}

impl<M, F> MessageHandler<M> for F
where
    F: Fn(M) -> Result<(), AirpcError> + Send + Sync,
{
    fn on_message(&self, message: M) -> Result<(), AirpcError> {
        self(message)
    }
}

/// A message waiting in an outbound queue, with its failure callback.
pub(crate) struct Outbound<M> {
    pub(crate) message: M,
    on_failure: Option<FailureCallback>,
}

impl<M: Message> Outbound<M> {
    pub(crate) fn new(message: M, on_failure: Option<FailureCallback>) -> Self {
        Self {
            message,
            on_failure,
        }
    }

    /// Routes a failure to the message's own callback, or to the observer.
    pub(crate) fn fail(self, error: TransportError, observer: &ErrorObserver) {
        match self.on_failure {
            Some(callback) => {
                tracing::debug!(
                    error = %error,
                    kind = self.message.kind_name(),
                    "Routing delivery failure to message callback"
                );
                callback(error);
            }
            None => observer.report(&AirpcError::Transport(error)),
        }
    }
}

impl<M: fmt::Debug> fmt::Debug for Outbound<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbound")
            .field("message", &self.message)
            .field("has_failure_callback", &self.on_failure.is_some())
            .finish()
    }
}

/// A shared receive callback.
pub type SharedHandler<M> = Arc<dyn MessageHandler<M>>;
