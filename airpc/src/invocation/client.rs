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


//! Client-side invocation correlation.
//!
//! Each invocation gets a mailbox: an unbounded channel drained by one task
//! that runs the user's callbacks in arrival order. The table holds the
//! sending half. A terminal event is the last message a mailbox receives,
//! because the context is removed from the table in the same step that
//! queues it; once the task has delivered it, the channel is gone.

use super::{
    AnswerSink, CancelHook, Envelope, InvocationCallbacks, InvocationError, InvocationId,
    MessageKind, MethodDirectory, Payload, RemoteError, RemoteErrorKind, ReplyRoute, RequestId,
    result_fn,
};
use crate::transport::{Broker, FailureCallback, TransportError};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

enum InvocationEvent {
    Progress(Payload),
    Question {
        request_id: RequestId,
        question: Payload,
    },
    Finished(Payload),
    Exception(RemoteError),
}

struct ClientInvocationContext {
    method: String,
    events: mpsc::UnboundedSender<InvocationEvent>,
}

type ContextTable = DashMap<InvocationId, ClientInvocationContext>;

/// Errors returned by [`ClientFacade::call`] and
/// [`ClientFacade::call_timeout`].
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The server completed the invocation with an error.
    #[error("remote invocation failed: {0}")]
    Remote(RemoteError),

    /// The invocation could not be started.
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// No terminal event arrived in time. A cancel was sent.
    #[error("invocation {invocation_id} timed out after {timeout:?}")]
    TimedOut {
        /// The invocation that timed out.
        invocation_id: InvocationId,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The invocation was abandoned before a terminal event arrived.
    #[error("invocation {invocation_id} was abandoned")]
    Abandoned {
        /// The abandoned invocation.
        invocation_id: InvocationId,
    },
}

impl CallError {
    /// Returns the remote error, if the server reported one.
    #[must_use]
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(error) => Some(error),
            _ => None,
        }
    }
}

/// A started invocation.
#[derive(Debug, Clone)]
pub struct InvocationHandle {
    invocation_id: InvocationId,
    method: String,
    cancel: CancelHook,
    timeout: Option<Duration>,
}

impl InvocationHandle {
    /// Returns the invocation id.
    #[must_use]
    pub fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    /// Returns the invoked method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the advisory timeout carried with the invocation.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the hook that cancels the invocation.
    #[must_use]
    pub fn cancel_hook(&self) -> &CancelHook {
        &self.cancel
    }

    /// Asks the server to cancel the invocation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// The client correlation table.
///
/// [`invoke`](Self::invoke) starts an invocation and
/// [`dispatch`](Self::dispatch) routes the server's messages back to its
/// callbacks. The facade enforces no timeout; a peer that never answers
/// leaves the invocation registered until it is
/// [`abandon`](Self::abandon)ed.
///
/// # Examples
///
/// ```rust,no_run
/// use airpc::invocation::{ClientFacade, InvocationCallbacks, MethodDirectory, Payload, result_fn};
/// use airpc::observability::ErrorObserver;
/// use std::sync::Arc;
///
/// # fn example(route: airpc::invocation::ReplyRoute) -> Result<(), Box<dyn std::error::Error>> {
/// let directory = Arc::new(MethodDirectory::new());
/// directory.register("echo", route);
///
/// let facade = ClientFacade::new(directory);
/// let callbacks = InvocationCallbacks::new(result_fn(|outcome| println!("{:?}", outcome)))
///     .on_progress(|progress| println!("progress: {}", progress));
/// let handle = facade.invoke("echo", callbacks, Payload::encode(&42)?)?;
/// println!("started {}", handle.invocation_id());
/// # Ok(())
/// # }
/// ```
pub struct ClientFacade {
    directory: Arc<MethodDirectory>,
    table: Arc<ContextTable>,
    default_timeout: Option<Duration>,
}

impl ClientFacade {
    /// Creates an empty table resolving methods through `directory`.
    #[must_use]
    pub fn new(directory: Arc<MethodDirectory>) -> Self {
        Self {
            directory,
            table: Arc::new(DashMap::new()),
            default_timeout: None,
        }
    }

    /// Sets the advisory timeout used when callbacks carry none.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Returns the directory methods are resolved through.
    #[must_use]
    pub fn directory(&self) -> &Arc<MethodDirectory> {
        &self.directory
    }

    /// Starts an invocation.
    ///
    /// The context is stored before the request is sent, so a reply can
    /// never arrive ahead of it. The result callback is offered the
    /// invocation's [`CancelHook`] first. If the request cannot be
    /// delivered, the result callback receives an exception of kind
    /// [`RemoteErrorKind::DeliveryFailed`].
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::MethodNotFound`] if the directory has no
    /// route for `method`.
    pub fn invoke(
        &self,
        method: &str,
        mut callbacks: InvocationCallbacks,
        parameter: Payload,
    ) -> Result<InvocationHandle, InvocationError> {
        let route = self.directory.resolve(method)?;
        let invocation_id = InvocationId::new();
        let cancel = CancelHook::new(invocation_id, Arc::clone(&route));
        callbacks.result.bind_cancel(cancel.clone());
        let timeout = callbacks.timeout.or(self.default_timeout);

        let (events, mailbox) = mpsc::unbounded_channel();
        tokio::spawn(run_mailbox(
            invocation_id,
            callbacks,
            mailbox,
            Arc::clone(&route),
        ));
        self.table.insert(
            invocation_id,
            ClientInvocationContext {
                method: method.to_string(),
                events,
            },
        );

        debug!(
            invocation_id = %invocation_id,
            method,
            broker_id = route.id(),
            "Invoking method"
        );
        route.send_with_failure(
            Envelope::MethodInvocation {
                invocation_id,
                method: method.to_string(),
                parameter,
            },
            Some(delivery_failure(Arc::clone(&self.table), invocation_id)),
        );

        Ok(InvocationHandle {
            invocation_id,
            method: method.to_string(),
            cancel,
            timeout,
        })
    }

    /// Routes one inbound message to its invocation.
    ///
    /// Terminal messages for an unknown invocation are dropped.
    ///
    /// # Errors
    ///
    /// - [`InvocationError::UnknownInvocation`] for an interim message whose
    ///   invocation is not registered.
    /// - [`InvocationError::UnexpectedMessage`] for kinds a client never
    ///   receives.
    pub fn dispatch(&self, envelope: Envelope) -> Result<(), InvocationError> {
        let kind = envelope.kind();
        match envelope {
            Envelope::InterimResponse {
                invocation_id,
                progress,
            } => self.deliver(invocation_id, kind, InvocationEvent::Progress(progress)),
            Envelope::InterimRequest {
                invocation_id,
                request_id,
                question,
            } => self.deliver(
                invocation_id,
                kind,
                InvocationEvent::Question {
                    request_id,
                    question,
                },
            ),
            Envelope::Finished {
                invocation_id,
                result,
            } => {
                self.terminate(invocation_id, InvocationEvent::Finished(result));
                Ok(())
            }
            Envelope::Exception {
                invocation_id,
                error,
            } => {
                self.terminate(invocation_id, InvocationEvent::Exception(error));
                Ok(())
            }
            Envelope::MethodInvocation { .. }
            | Envelope::Cancel { .. }
            | Envelope::Response { .. } => Err(InvocationError::UnexpectedMessage {
                kind,
                endpoint: "client",
            }),
        }
    }

    /// Forgets an invocation without delivering a terminal event.
    ///
    /// Later messages for it are treated as addressed to an unknown id.
    /// Returns `false` if it was not registered.
    pub fn abandon(&self, invocation_id: InvocationId) -> bool {
        match self.table.remove(&invocation_id) {
            Some((_, context)) => {
                debug!(
                    invocation_id = %invocation_id,
                    method = %context.method,
                    "Invocation abandoned"
                );
                true
            }
            None => false,
        }
    }

    /// Returns the number of invocations awaiting a terminal event.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if no invocation is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns `true` if the invocation is in flight.
    #[must_use]
    pub fn contains(&self, invocation_id: InvocationId) -> bool {
        self.table.contains_key(&invocation_id)
    }

    /// Invokes a method and waits for its terminal event.
    ///
    /// Interim messages are ignored. There is no timeout; see
    /// [`call_timeout`](Self::call_timeout).
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Remote`] if the server reports an error, or
    /// [`CallError::Invocation`] if the method cannot be resolved.
    pub async fn call(&self, method: &str, parameter: Payload) -> Result<Payload, CallError> {
        let (handle, outcome) = self.start_call(method, parameter)?;
        Self::await_outcome(handle.invocation_id(), outcome).await
    }

    /// Invokes a method and waits at most `timeout` for its terminal event.
    ///
    /// When the timeout elapses a cancel is sent and the invocation is
    /// abandoned.
    ///
    /// # Errors
    ///
    /// As [`call`](Self::call), plus [`CallError::TimedOut`].
    pub async fn call_timeout(
        &self,
        method: &str,
        parameter: Payload,
        timeout: Duration,
    ) -> Result<Payload, CallError> {
        let (handle, outcome) = self.start_call(method, parameter)?;
        let invocation_id = handle.invocation_id();
        match tokio::time::timeout(timeout, Self::await_outcome(invocation_id, outcome)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(invocation_id = %invocation_id, ?timeout, "Invocation timed out");
                handle.cancel();
                self.abandon(invocation_id);
                Err(CallError::TimedOut {
                    invocation_id,
                    timeout,
                })
            }
        }
    }

    fn start_call(
        &self,
        method: &str,
        parameter: Payload,
    ) -> Result<
        (
            InvocationHandle,
            oneshot::Receiver<Result<Payload, RemoteError>>,
        ),
        InvocationError,
    > {
        let (tx, rx) = oneshot::channel();
        let callbacks = InvocationCallbacks::new(result_fn(move |outcome| {
            let _ = tx.send(outcome);
        }));
        let handle = self.invoke(method, callbacks, parameter)?;
        Ok((handle, rx))
    }

    async fn await_outcome(
        invocation_id: InvocationId,
        outcome: oneshot::Receiver<Result<Payload, RemoteError>>,
    ) -> Result<Payload, CallError> {
        match outcome.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(CallError::Remote(error)),
            Err(_) => Err(CallError::Abandoned { invocation_id }),
        }
    }

    fn deliver(
        &self,
        invocation_id: InvocationId,
        kind: MessageKind,
        event: InvocationEvent,
    ) -> Result<(), InvocationError> {
        match self.table.get(&invocation_id) {
            Some(context) => {
                trace!(invocation_id = %invocation_id, kind = %kind, "Routing interim message");
                // A closed mailbox means the task is gone; the terminal
                // event will clean up the entry.
                let _ = context.events.send(event);
                Ok(())
            }
            None => Err(InvocationError::UnknownInvocation {
                invocation_id,
                kind,
            }),
        }
    }

    fn terminate(&self, invocation_id: InvocationId, event: InvocationEvent) {
        match self.table.remove(&invocation_id) {
            Some((_, context)) => {
                debug!(
                    invocation_id = %invocation_id,
                    method = %context.method,
                    "Invocation completed"
                );
                let _ = context.events.send(event);
            }
            None => {
                debug!(
                    invocation_id = %invocation_id,
                    "Dropping terminal message for unknown invocation"
                );
            }
        }
    }
}

impl fmt::Debug for ClientFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFacade")
            .field("in_flight", &self.table.len())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

/// Completes an invocation whose request never reached the server.
fn delivery_failure(table: Arc<ContextTable>, invocation_id: InvocationId) -> FailureCallback {
    Box::new(move |error: TransportError| {
        if let Some((_, context)) = table.remove(&invocation_id) {
            warn!(
                invocation_id = %invocation_id,
                method = %context.method,
                error = %error,
                "Invocation request could not be delivered"
            );
            let _ = context.events.send(InvocationEvent::Exception(RemoteError::new(
                RemoteErrorKind::DeliveryFailed,
                error.to_string(),
            )));
        }
    })
}

async fn run_mailbox(
    invocation_id: InvocationId,
    mut callbacks: InvocationCallbacks,
    mut events: mpsc::UnboundedReceiver<InvocationEvent>,
    route: ReplyRoute,
) {
    while let Some(event) = events.recv().await {
        match event {
            InvocationEvent::Progress(progress) => match callbacks.progress.as_mut() {
                Some(on_progress) => on_progress(progress),
                None => trace!(invocation_id = %invocation_id, "Progress ignored"),
            },
            InvocationEvent::Question {
                request_id,
                question,
            } => match callbacks.question.as_mut() {
                Some(on_question) => {
                    let sink = AnswerSink::new(request_id.clone(), Arc::clone(&route));
                    on_question(request_id, question, sink);
                }
                None => trace!(invocation_id = %invocation_id, "Question ignored"),
            },
            InvocationEvent::Finished(result) => {
                callbacks.result.finished(result);
                return;
            }
            InvocationEvent::Exception(error) => {
                callbacks.result.exception(error);
                return;
            }
        }
    }
    trace!(invocation_id = %invocation_id, "Mailbox closed without terminal event");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::ResultCallback;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Envelope>>,
        fail: bool,
    }

    impl Broker<Envelope> for Recorder {
        fn id(&self) -> &str {
            "recorder"
        }

        fn send_with_failure(&self, message: Envelope, on_failure: Option<FailureCallback>) {
            if self.fail {
                if let Some(on_failure) = on_failure {
                    on_failure(TransportError::Closed {
                        broker_id: "recorder".to_string(),
                    });
                }
                return;
            }
            self.sent.lock().push(message);
        }
    }

    fn facade(recorder: Arc<Recorder>) -> ClientFacade {
        let directory = Arc::new(MethodDirectory::new());
        directory.register("echo", recorder);
        ClientFacade::new(directory)
    }

    fn sent_id(recorder: &Recorder) -> InvocationId {
        recorder.sent.lock()[0]
            .invocation_id()
            .expect("method invocation carries an id")
    }

    #[tokio::test]
    async fn test_context_stored_before_send() {
        let recorder = Arc::new(Recorder::default());
        let facade = facade(recorder.clone());

        let handle = facade
            .invoke("echo", InvocationCallbacks::new(result_fn(|_| {})), Payload::null())
            .unwrap();

        assert!(facade.contains(handle.invocation_id()));
        assert_eq!(sent_id(&recorder), handle.invocation_id());
        assert_eq!(recorder.sent.lock()[0].kind(), MessageKind::MethodInvocation);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let facade = facade(Arc::new(Recorder::default()));
        let error = facade
            .invoke("missing", InvocationCallbacks::new(result_fn(|_| {})), Payload::null())
            .unwrap_err();
        assert_eq!(
            error,
            InvocationError::MethodNotFound {
                method: "missing".to_string()
            }
        );
        assert!(facade.is_empty());
    }

    #[tokio::test]
    async fn test_events_in_order_then_single_terminal() {
        let recorder = Arc::new(Recorder::default());
        let facade = facade(recorder.clone());
        let log = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = oneshot::channel();

        let progress_log = log.clone();
        let result_log = log.clone();
        let callbacks = InvocationCallbacks::new(result_fn(move |outcome| {
            result_log.lock().push(format!("{:?}", outcome.map(|p| p.to_string())));
            let _ = done_tx.send(());
        }))
        .on_progress(move |p| progress_log.lock().push(p.to_string()));

        let id = facade
            .invoke("echo", callbacks, Payload::null())
            .unwrap()
            .invocation_id();
        for step in ["\"25%\"", "\"75%\""] {
            facade
                .dispatch(Envelope::InterimResponse {
                    invocation_id: id,
                    progress: Payload::from_json_bytes(step.as_bytes().to_vec()),
                })
                .unwrap();
        }
        facade
            .dispatch(Envelope::Finished {
                invocation_id: id,
                result: Payload::encode("done").unwrap(),
            })
            .unwrap();
        facade
            .dispatch(Envelope::Exception {
                invocation_id: id,
                error: RemoteError::application("duplicate"),
            })
            .unwrap();

        done_rx.await.unwrap();
        assert_eq!(
            log.lock().as_slice(),
            &["\"25%\"", "\"75%\"", "Ok(\"\\\"done\\\"\")"]
        );
        assert!(facade.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_interim_is_protocol_error() {
        let facade = facade(Arc::new(Recorder::default()));
        let id = InvocationId::new();

        let error = facade
            .dispatch(Envelope::InterimResponse {
                invocation_id: id,
                progress: Payload::null(),
            })
            .unwrap_err();
        assert!(error.is_protocol_error());
        assert!(
            facade
                .dispatch(Envelope::Finished {
                    invocation_id: id,
                    result: Payload::null(),
                })
                .is_ok()
        );
        assert!(facade.is_empty());
    }

    #[tokio::test]
    async fn test_server_kinds_are_unexpected() {
        let facade = facade(Arc::new(Recorder::default()));
        let error = facade
            .dispatch(Envelope::Cancel {
                invocation_id: InvocationId::new(),
            })
            .unwrap_err();
        assert_eq!(
            error,
            InvocationError::UnexpectedMessage {
                kind: MessageKind::Cancel,
                endpoint: "client",
            }
        );
    }

    #[tokio::test]
    async fn test_question_is_answered_through_route() {
        let recorder = Arc::new(Recorder::default());
        let facade = facade(recorder.clone());
        let (answered_tx, answered_rx) = oneshot::channel();
        let mut answered_tx = Some(answered_tx);

        let callbacks = InvocationCallbacks::new(result_fn(|_| {})).on_question(
            move |request_id, _question, sink: AnswerSink| {
                assert_eq!(request_id.as_str(), "Q1");
                sink.answer(Payload::encode("yes").unwrap());
                if let Some(tx) = answered_tx.take() {
                    let _ = tx.send(());
                }
            },
        );
        let id = facade
            .invoke("echo", callbacks, Payload::null())
            .unwrap()
            .invocation_id();
        facade
            .dispatch(Envelope::InterimRequest {
                invocation_id: id,
                request_id: RequestId::from("Q1"),
                question: Payload::encode("proceed?").unwrap(),
            })
            .unwrap();

        answered_rx.await.unwrap();
        assert_eq!(
            recorder.sent.lock().last(),
            Some(&Envelope::Response {
                request_id: RequestId::from("Q1"),
                answer: Payload::encode("yes").unwrap(),
            })
        );
    }

    #[tokio::test]
    async fn test_delivery_failure_completes_with_exception() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let facade = facade(recorder);

        let error = facade.call("echo", Payload::null()).await.unwrap_err();
        assert_eq!(
            error.remote().map(RemoteError::kind),
            Some(RemoteErrorKind::DeliveryFailed)
        );
        assert!(facade.is_empty());
    }

    #[tokio::test]
    async fn test_call_timeout_cancels_and_abandons() {
        let recorder = Arc::new(Recorder::default());
        let facade = facade(recorder.clone());

        let error = facade
            .call_timeout("echo", Payload::null(), Duration::from_millis(10))
            .await
            .unwrap_err();

        assert!(matches!(error, CallError::TimedOut { .. }));
        assert!(facade.is_empty());
        let sent = recorder.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].kind(), MessageKind::Cancel);
    }

    struct Binding(Arc<Mutex<Option<CancelHook>>>);

    impl ResultCallback for Binding {
        fn finished(&mut self, _result: Payload) {}

        fn exception(&mut self, _error: RemoteError) {}

        fn bind_cancel(&mut self, hook: CancelHook) {
            *self.0.lock() = Some(hook);
        }
    }

    #[tokio::test]
    async fn test_result_callback_receives_cancel_hook() {
        let recorder = Arc::new(Recorder::default());
        let facade = facade(recorder.clone());
        let slot = Arc::new(Mutex::new(None));

        let handle = facade
            .invoke(
                "echo",
                InvocationCallbacks::new(Binding(slot.clone())),
                Payload::null(),
            )
            .unwrap();
        let hook = slot.lock().take().unwrap();
        assert_eq!(hook.invocation_id(), handle.invocation_id());

        hook.cancel();
        assert_eq!(
            recorder.sent.lock().last(),
            Some(&Envelope::Cancel {
                invocation_id: handle.invocation_id()
            })
        );
    }
}
