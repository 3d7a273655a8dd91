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


//! Client-side callbacks for one invocation.

use super::{Envelope, InvocationId, Payload, RemoteError, ReplyRoute, RequestId};
use crate::transport::Broker;
use std::fmt;
use std::time::Duration;

/// Receives the terminal event of an invocation.
///
/// Exactly one of [`finished`](Self::finished) or
/// [`exception`](Self::exception) is called, at most once, after every
/// interim callback for the same invocation has returned.
pub trait ResultCallback: Send + 'static {
    /// The method completed with `result`.
    fn finished(&mut self, result: Payload);

    /// The method failed, or the framework could not complete the call.
    fn exception(&mut self, error: RemoteError);

    /// Offers the hook that cancels this invocation.
    ///
    /// Called once, before the request is sent. The default ignores it.
    fn bind_cancel(&mut self, hook: CancelHook) {
        let _ = hook;
    }
}

/// Called for every `InterimResponse` of an invocation.
pub type ProgressCallback = Box<dyn FnMut(Payload) + Send + 'static>;

/// Called for every `InterimRequest` of an invocation.
///
/// The [`AnswerSink`] sends the answer back to the server. It may be moved
/// elsewhere and answered later.
pub type QuestionCallback = Box<dyn FnMut(RequestId, Payload, AnswerSink) + Send + 'static>;

struct ResultFn<F>(Option<F>);

impl<F> ResultCallback for ResultFn<F>
where
    F: FnOnce(Result<Payload, RemoteError>) + Send + 'static,
{
    fn finished(&mut self, result: Payload) {
        if let Some(f) = self.0.take() {
            f(Ok(result));
        }
    }

    fn exception(&mut self, error: RemoteError) {
        if let Some(f) = self.0.take() {
            f(Err(error));
        }
    }
}

/// Adapts a closure taking the outcome into a [`ResultCallback`].
///
/// # Examples
///
/// ```rust
/// use airpc::invocation::{InvocationCallbacks, result_fn};
///
/// let callbacks = InvocationCallbacks::new(result_fn(|outcome| match outcome {
///     Ok(result) => println!("finished: {}", result),
///     Err(error) => println!("failed: {}", error),
/// }));
/// # drop(callbacks);
/// ```
pub fn result_fn<F>(f: F) -> impl ResultCallback
where
    F: FnOnce(Result<Payload, RemoteError>) + Send + 'static,
{
    ResultFn(Some(f))
}

/// The callbacks of one invocation.
///
/// Only the result callback is required. Interim messages for which no
/// callback is set are ignored.
///
/// `timeout` is advisory: it is carried with the invocation and returned in
/// its [`InvocationHandle`](super::InvocationHandle), but the facade never
/// acts on it.
pub struct InvocationCallbacks {
    pub(crate) result: Box<dyn ResultCallback>,
    pub(crate) progress: Option<ProgressCallback>,
    pub(crate) question: Option<QuestionCallback>,
    pub(crate) timeout: Option<Duration>,
}

impl InvocationCallbacks {
    /// Creates callbacks with only a result callback.
    pub fn new(result: impl ResultCallback) -> Self {
        Self {
            result: Box::new(result),
            progress: None,
            question: None,
            timeout: None,
        }
    }

    /// Sets the callback for `InterimResponse` messages.
    #[must_use]
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(Payload) + Send + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    /// Sets the callback for `InterimRequest` messages.
    #[must_use]
    pub fn on_question<F>(mut self, f: F) -> Self
    where
        F: FnMut(RequestId, Payload, AnswerSink) + Send + 'static,
    {
        self.question = Some(Box::new(f));
        self
    }

    /// Sets the advisory timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the advisory timeout, if set.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Debug for InvocationCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationCallbacks")
            .field("has_progress", &self.progress.is_some())
            .field("has_question", &self.question.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sends `Cancel` for one invocation.
///
/// Cancellation is fire-and-forget and advisory. The server handler decides
/// whether and how to stop; a terminal event may still arrive afterward.
#[derive(Clone)]
pub struct CancelHook {
    invocation_id: InvocationId,
    route: ReplyRoute,
}

impl CancelHook {
    pub(crate) fn new(invocation_id: InvocationId, route: ReplyRoute) -> Self {
        Self {
            invocation_id,
            route,
        }
    }

    /// Returns the invocation this hook cancels.
    #[must_use]
    pub fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    /// Asks the server to cancel the invocation.
    pub fn cancel(&self) {
        tracing::debug!(
            invocation_id = %self.invocation_id,
            broker_id = self.route.id(),
            "Sending cancel"
        );
        self.route.send(Envelope::Cancel {
            invocation_id: self.invocation_id,
        });
    }
}

impl fmt::Debug for CancelHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHook")
            .field("invocation_id", &self.invocation_id)
            .field("route", &self.route.id())
            .finish()
    }
}

/// Answers one `InterimRequest`.
pub struct AnswerSink {
    request_id: RequestId,
    route: ReplyRoute,
}

impl AnswerSink {
    pub(crate) fn new(request_id: RequestId, route: ReplyRoute) -> Self {
        Self { request_id, route }
    }

    /// Returns the request being answered.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Sends the answer to the server.
    pub fn answer(self, answer: Payload) {
        tracing::debug!(request_id = %self.request_id, "Sending answer");
        self.route.send(Envelope::Response {
            request_id: self.request_id,
            answer,
        });
    }
}

impl fmt::Debug for AnswerSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerSink")
            .field("request_id", &self.request_id)
            .field("route", &self.route.id())
            .finish()
    }
}
