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


//! Server endpoint wiring.

use crate::AirpcError;
use crate::endpoint::EndpointConfig;
use crate::invocation::{
    CancellationRegistry, Envelope, InvocationError, MethodHandler, MethodRegistry,
    PendingAnswers, RemoteError, RemoteErrorKind, ReplyRoute, ServerFacade,
};
use crate::observability::ErrorObserver;
use crate::transport::{Broker, SharedHandler};
use std::sync::Arc;

/// The server side of the invocation layer.
///
/// Owns the [`MethodRegistry`] and the [`ServerFacade`] it registers
/// invocations with. A [`PendingAnswers`] table and a
/// [`CancellationRegistry`] are installed as the response and cancel
/// handlers, so method handlers can await answers and observe cancellation
/// through their [`Responder`](crate::invocation::Responder).
///
/// # Examples
///
/// ```rust
/// use airpc::AirpcError;
/// use airpc::endpoint::{EndpointConfig, ServerEndpoint};
/// use airpc::invocation::{Envelope, HandlerError, InvocationId, Payload, Responder};
/// use airpc::observability::ErrorObserver;
/// use airpc::transport::MemoryBroker;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let observer = ErrorObserver::new();
/// let (_client, server) = MemoryBroker::<Envelope>::pair("client", "server", observer.clone());
/// let server = Arc::new(server);
///
/// let endpoint = ServerEndpoint::new(EndpointConfig::default(), observer);
/// endpoint.register(
///     "echo",
///     |_id: InvocationId, parameter: Payload, responder: Responder| -> Result<(), HandlerError> {
///         responder.finish(parameter);
///         Ok(())
///     },
/// )?;
/// server.start(endpoint.attach(server.clone()))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ServerEndpoint {
    registry: Arc<MethodRegistry>,
    facade: Arc<ServerFacade>,
    pending: Arc<PendingAnswers>,
    cancellations: Arc<CancellationRegistry>,
    observer: ErrorObserver,
}

impl ServerEndpoint {
    /// Creates a server endpoint reporting failures to `observer`.
    pub fn new(config: EndpointConfig, observer: ErrorObserver) -> Self {
        let pending = Arc::new(PendingAnswers::new());
        let cancellations = Arc::new(CancellationRegistry::new());
        let facade = Arc::new(
            ServerFacade::new(observer.clone())
                .with_leak_warning_threshold(config.leak_warning_threshold)
                .with_pending_answers(Arc::clone(&pending))
                .with_cancellations(Arc::clone(&cancellations)),
        );
        let registry = Arc::new(MethodRegistry::new(Arc::clone(&facade)));
        registry.register_cancel_handler(cancellations.clone());
        registry.register_response_handler(pending.clone());

        Self {
            registry,
            facade,
            pending,
            cancellations,
            observer,
        }
    }

    /// Registers a method handler.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::DuplicateMethod`] if the name is taken.
    pub fn register(
        &self,
        method: impl Into<String>,
        handler: impl MethodHandler + 'static,
    ) -> Result<(), InvocationError> {
        self.registry.register(method, handler)
    }

    /// Returns the method registry.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Returns the server correlation table.
    pub fn facade(&self) -> &Arc<ServerFacade> {
        &self.facade
    }

    /// Returns the table of unanswered interim requests.
    pub fn pending_answers(&self) -> &Arc<PendingAnswers> {
        &self.pending
    }

    /// Returns the per-invocation cancellation tokens.
    pub fn cancellations(&self) -> &Arc<CancellationRegistry> {
        &self.cancellations
    }

    /// Returns the receive callback for a broker, using it as reply route.
    ///
    /// A `MethodInvocation` that cannot be dispatched still gets a terminal
    /// event: an unknown method is answered with an exception of kind
    /// [`RemoteErrorKind::MethodNotFound`], and a failing handler completes
    /// its invocation with [`RemoteErrorKind::HandlerFailed`]. The error is
    /// also returned, so the broker reports it to the observer.
    ///
    /// The callback holds `route`; a broker started with it keeps itself
    /// alive until it is shut down.
    pub fn attach(&self, route: ReplyRoute) -> SharedHandler<Envelope> {
        let registry = Arc::clone(&self.registry);
        let facade = Arc::clone(&self.facade);
        tracing::info!(broker_id = route.id(), "Server endpoint attached");

        Arc::new(move |envelope: Envelope| -> Result<(), AirpcError> {
            let invocation_id = match &envelope {
                Envelope::MethodInvocation { invocation_id, .. } => Some(*invocation_id),
                _ => None,
            };
            let result = registry.dispatch(envelope, &route);
            if let (Err(error), Some(invocation_id)) = (&result, invocation_id) {
                match error {
                    AirpcError::Invocation(InvocationError::MethodNotFound { .. }) => {
                        route.send(Envelope::Exception {
                            invocation_id,
                            error: RemoteError::new(
                                RemoteErrorKind::MethodNotFound,
                                error.to_string(),
                            ),
                        });
                    }
                    _ => facade.exception(
                        invocation_id,
                        RemoteError::new(RemoteErrorKind::HandlerFailed, error.to_string()),
                    ),
                }
            }
            result
        })
    }

    /// Returns the observer failures are reported to.
    pub fn observer(&self) -> &ErrorObserver {
        &self.observer
    }
}
