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


//! Correlation of interim requests with their answers.

use super::{HandlerError, InvocationId, Payload, RequestId, ResponseHandler};
use dashmap::DashMap;
use tokio::sync::oneshot;

/// A [`ResponseHandler`] that hands answers to waiting handlers.
///
/// A handler registers a request before asking its question and awaits the
/// returned receiver. The receiver resolves with the answer, or errors if
/// the request is cancelled or its invocation completes first.
///
/// [`Responder::ask_and_wait`](super::Responder::ask_and_wait) uses this
/// when the server facade has one installed.
#[derive(Debug, Default)]
pub struct PendingAnswers {
    waiting: DashMap<RequestId, (InvocationId, oneshot::Sender<Payload>)>,
}

impl PendingAnswers {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request and returns the receiver for its answer.
    ///
    /// Registering the same request id twice abandons the first waiter.
    pub fn register(
        &self,
        invocation_id: InvocationId,
        request_id: RequestId,
    ) -> oneshot::Receiver<Payload> {
        let (tx, rx) = oneshot::channel();
        if self.waiting.insert(request_id.clone(), (invocation_id, tx)).is_some() {
            tracing::warn!(
                request_id = %request_id,
                invocation_id = %invocation_id,
                "Interim request id reused, abandoning earlier waiter"
            );
        }
        rx
    }

    /// Delivers an answer. Returns `false` if nobody is waiting for it.
    pub fn complete(&self, request_id: &RequestId, answer: Payload) -> bool {
        match self.waiting.remove(request_id) {
            Some((_, (_, tx))) => tx.send(answer).is_ok(),
            None => false,
        }
    }

    /// Drops the waiter for one request.
    pub fn cancel(&self, request_id: &RequestId) -> bool {
        self.waiting.remove(request_id).is_some()
    }

    /// Drops every waiter belonging to an invocation and returns how many.
    pub fn abandon_invocation(&self, invocation_id: InvocationId) -> usize {
        let before = self.waiting.len();
        self.waiting.retain(|_, (owner, _)| *owner != invocation_id);
        before.saturating_sub(self.waiting.len())
    }

    /// Returns the number of unanswered requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    /// Returns `true` if no request is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

impl ResponseHandler for PendingAnswers {
    fn respond(&self, request_id: RequestId, answer: Payload) -> Result<(), HandlerError> {
        if !self.complete(&request_id, answer) {
            tracing::debug!(request_id = %request_id, "Dropping answer nobody is waiting for");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_answer_reaches_waiter() {
        let pending = PendingAnswers::new();
        let rx = pending.register(InvocationId::new(), RequestId::from("Q1"));

        pending
            .respond(RequestId::from("Q1"), Payload::encode("yes").unwrap())
            .unwrap();

        assert_eq!(rx.await.unwrap(), Payload::encode("yes").unwrap());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_unknown_answer_is_dropped() {
        let pending = PendingAnswers::new();
        assert!(!pending.complete(&RequestId::from("nope"), Payload::null()));
        assert!(
            pending
                .respond(RequestId::from("nope"), Payload::null())
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_abandon_invocation() {
        let pending = PendingAnswers::new();
        let first = InvocationId::new();
        let second = InvocationId::new();
        let a = pending.register(first, RequestId::from("a"));
        let b = pending.register(first, RequestId::from("b"));
        let _c = pending.register(second, RequestId::from("c"));

        assert_eq!(pending.abandon_invocation(first), 2);
        assert_eq!(pending.len(), 1);
        assert!(a.await.is_err());
        assert!(b.await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_request() {
        let pending = PendingAnswers::new();
        let rx = pending.register(InvocationId::new(), RequestId::from("Q1"));
        assert!(pending.cancel(&RequestId::from("Q1")));
        assert!(!pending.cancel(&RequestId::from("Q1")));
        assert!(rx.await.is_err());
    }
}
