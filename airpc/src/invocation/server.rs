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


//! Server-side invocation correlation.

use super::{
    CancellationRegistry, Envelope, InvocationError, InvocationId, MessageKind, Payload,
    PendingAnswers, RemoteError, ReplyRoute, RequestId,
};
use crate::AirpcError;
use crate::observability::ErrorObserver;
use crate::transport::Broker;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Table size at which registration starts logging a leak warning.
pub const DEFAULT_LEAK_WARNING_THRESHOLD: usize = 500;

struct ServerInvocationEntry {
    route: ReplyRoute,
}

/// The server correlation table and the sink handlers report through.
///
/// Each accepted invocation is stored with the route it arrived on. Interim
/// events resolve that route and leave the entry in place; `finished` and
/// `exception` remove it atomically before sending, so at most one terminal
/// message leaves the server per invocation.
///
/// The table is bounded only by a diagnostic: once it holds
/// `leak_warning_threshold` entries, every registration logs a warning.
/// Nothing is evicted.
pub struct ServerFacade {
    table: DashMap<InvocationId, ServerInvocationEntry>,
    leak_warning_threshold: usize,
    observer: ErrorObserver,
    pending: Option<Arc<PendingAnswers>>,
    cancellations: Option<Arc<CancellationRegistry>>,
}

impl ServerFacade {
    /// Creates an empty table reporting protocol errors to `observer`.
    #[must_use]
    pub fn new(observer: ErrorObserver) -> Self {
        Self {
            table: DashMap::new(),
            leak_warning_threshold: DEFAULT_LEAK_WARNING_THRESHOLD,
            observer,
            pending: None,
            cancellations: None,
        }
    }

    /// Sets the size at which registration logs a leak warning.
    #[must_use]
    pub fn with_leak_warning_threshold(mut self, threshold: usize) -> Self {
        self.leak_warning_threshold = threshold;
        self
    }

    /// Installs the table [`Responder::ask_and_wait`] registers requests in.
    ///
    /// Waiters of an invocation are dropped when it completes.
    #[must_use]
    pub fn with_pending_answers(mut self, pending: Arc<PendingAnswers>) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Installs the registry that tracks a cancellation token per invocation.
    #[must_use]
    pub fn with_cancellations(mut self, cancellations: Arc<CancellationRegistry>) -> Self {
        self.cancellations = Some(cancellations);
        self
    }

    /// Returns the leak warning threshold.
    #[must_use]
    pub fn leak_warning_threshold(&self) -> usize {
        self.leak_warning_threshold
    }

    /// Stores the reply route of a new invocation.
    ///
    /// Must return before the invocation's handler runs. Re-registering an
    /// id replaces its route.
    pub fn register_invocation(&self, invocation_id: InvocationId, route: ReplyRoute) {
        if let Some(cancellations) = &self.cancellations {
            cancellations.track(invocation_id);
        }
        self.table
            .insert(invocation_id, ServerInvocationEntry { route });

        let size = self.table.len();
        trace!(invocation_id = %invocation_id, size, "Invocation registered");
        if size >= self.leak_warning_threshold {
            warn!(
                size,
                threshold = self.leak_warning_threshold,
                "Server invocation table is large, invocations may be leaking"
            );
        }
    }

    /// Removes an invocation without sending anything.
    ///
    /// Returns `false` if it was not registered.
    pub fn unregister_invocation(&self, invocation_id: InvocationId) -> bool {
        let removed = self.table.remove(&invocation_id).is_some();
        self.release(invocation_id);
        removed
    }

    /// Sends a progress report for an invocation.
    pub fn interim_response(&self, invocation_id: InvocationId, progress: Payload) {
        if let Some(route) = self.route(invocation_id, MessageKind::InterimResponse) {
            route.send(Envelope::InterimResponse {
                invocation_id,
                progress,
            });
        }
    }

    /// Sends a question to the caller of an invocation.
    ///
    /// The answer arrives as a `Response` with the same `request_id`, at the
    /// registry's response handler.
    pub fn interim_request(
        &self,
        invocation_id: InvocationId,
        request_id: RequestId,
        question: Payload,
    ) {
        if let Some(route) = self.route(invocation_id, MessageKind::InterimRequest) {
            route.send(Envelope::InterimRequest {
                invocation_id,
                request_id,
                question,
            });
        }
    }

    /// Completes an invocation with a result and removes it.
    pub fn finished(&self, invocation_id: InvocationId, result: Payload) {
        self.complete(
            invocation_id,
            Envelope::Finished {
                invocation_id,
                result,
            },
        );
    }

    /// Completes an invocation with an error and removes it.
    pub fn exception(&self, invocation_id: InvocationId, error: RemoteError) {
        self.complete(
            invocation_id,
            Envelope::Exception {
                invocation_id,
                error,
            },
        );
    }

    /// Returns the number of registered invocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if no invocation is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns `true` if the invocation is registered.
    #[must_use]
    pub fn contains(&self, invocation_id: InvocationId) -> bool {
        self.table.contains_key(&invocation_id)
    }

    /// Returns the handle a handler reports through for one invocation.
    #[must_use]
    pub fn responder(self: &Arc<Self>, invocation_id: InvocationId) -> Responder {
        Responder {
            invocation_id,
            facade: Arc::clone(self),
        }
    }

    fn route(&self, invocation_id: InvocationId, kind: MessageKind) -> Option<ReplyRoute> {
        // Clone out so the shard lock is not held while sending.
        let route = self
            .table
            .get(&invocation_id)
            .map(|entry| Arc::clone(&entry.route));
        if route.is_none() {
            warn!(
                invocation_id = %invocation_id,
                kind = %kind,
                "No route for interim message"
            );
            self.observer
                .report(&AirpcError::Invocation(InvocationError::UnknownInvocation {
                    invocation_id,
                    kind,
                }));
        }
        route
    }

    fn complete(&self, invocation_id: InvocationId, envelope: Envelope) {
        match self.table.remove(&invocation_id) {
            Some((_, entry)) => {
                debug!(
                    invocation_id = %invocation_id,
                    kind = %envelope.kind(),
                    broker_id = entry.route.id(),
                    "Completing invocation"
                );
                entry.route.send(envelope);
                self.release(invocation_id);
            }
            None => {
                debug!(
                    invocation_id = %invocation_id,
                    kind = %envelope.kind(),
                    "Dropping terminal message for unknown invocation"
                );
            }
        }
    }

    fn release(&self, invocation_id: InvocationId) {
        if let Some(cancellations) = &self.cancellations {
            cancellations.release(invocation_id);
        }
        if let Some(pending) = &self.pending {
            pending.abandon_invocation(invocation_id);
        }
    }
}

impl fmt::Debug for ServerFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerFacade")
            .field("invocations", &self.table.len())
            .field("leak_warning_threshold", &self.leak_warning_threshold)
            .field("has_pending_answers", &self.pending.is_some())
            .field("has_cancellations", &self.cancellations.is_some())
            .finish()
    }
}

/// The handle a method handler reports through.
///
/// One responder exists per invocation. [`finish`](Self::finish) and
/// [`fail`](Self::fail) consume it, so a handler cannot complete the same
/// invocation twice. Dropping a responder without completing leaves the
/// invocation registered; the caller then never receives a terminal event.
pub struct Responder {
    invocation_id: InvocationId,
    facade: Arc<ServerFacade>,
}

impl Responder {
    /// Returns the invocation this responder reports for.
    #[must_use]
    pub fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    /// Sends a progress report.
    pub fn progress(&self, progress: Payload) {
        self.facade.interim_response(self.invocation_id, progress);
    }

    /// Sends a question; the answer goes to the registry's response handler.
    pub fn ask(&self, request_id: RequestId, question: Payload) {
        self.facade
            .interim_request(self.invocation_id, request_id, question);
    }

    /// Sends a question and waits for its answer.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::NoResponseHandler`] if the facade has no
    /// [`PendingAnswers`] installed, or [`InvocationError::AnswerAbandoned`]
    /// if the invocation completes or the wait is cancelled first.
    pub async fn ask_and_wait(&self, question: Payload) -> Result<Payload, InvocationError> {
        let pending = self
            .facade
            .pending
            .as_ref()
            .ok_or(InvocationError::NoResponseHandler)?;
        let request_id = RequestId::generate();
        let answer = pending.register(self.invocation_id, request_id.clone());
        self.ask(request_id.clone(), question);
        answer
            .await
            .map_err(|_| InvocationError::AnswerAbandoned { request_id })
    }

    /// Returns the token tripped when the caller cancels.
    ///
    /// Without a cancellation registry, or once the invocation has
    /// completed, the token is never tripped.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.facade
            .cancellations
            .as_ref()
            .and_then(|registry| registry.token(self.invocation_id))
            .unwrap_or_default()
    }

    /// Completes the invocation with a result.
    pub fn finish(self, result: Payload) {
        self.facade.finished(self.invocation_id, result);
    }

    /// Completes the invocation with an error.
    pub fn fail(self, error: RemoteError) {
        self.facade.exception(self.invocation_id, error);
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("invocation_id", &self.invocation_id)
            .finish()
    }
}
