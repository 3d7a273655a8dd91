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


//! Server-side method registry and dispatcher.

use super::{
    Envelope, InvocationError, InvocationId, Payload, ReplyRoute, RequestId, Responder,
    ServerFacade,
};
use crate::AirpcError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Error type returned by handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A server-side method.
///
/// `invoke` is called on a broker worker and must not block. It reports
/// back only through `responder`; long-running work should move the
/// responder into a spawned task and return. An `Err` means the handler
/// could not start, and is surfaced by the dispatcher.
pub trait MethodHandler: Send + Sync {
    /// Starts executing one invocation.
    fn invoke(
        &self,
        invocation_id: InvocationId,
        parameter: Payload,
        responder: Responder,
    ) -> Result<(), HandlerError>;
}

impl<F> MethodHandler for F
where
    F: Fn(InvocationId, Payload, Responder) -> Result<(), HandlerError> + Send + Sync,
{
    fn invoke(
        &self,
        invocation_id: InvocationId,
        parameter: Payload,
        responder: Responder,
    ) -> Result<(), HandlerError> {
        self(invocation_id, parameter, responder)
    }
}

/// Receives client cancellations.
pub trait CancelHandler: Send + Sync {
    /// The caller asked to cancel `invocation_id`.
    fn cancel(&self, invocation_id: InvocationId) -> Result<(), HandlerError>;
}

impl<F> CancelHandler for F
where
    F: Fn(InvocationId) -> Result<(), HandlerError> + Send + Sync,
{
    fn cancel(&self, invocation_id: InvocationId) -> Result<(), HandlerError> {
        self(invocation_id)
    }
}

/// Receives answers to interim requests.
pub trait ResponseHandler: Send + Sync {
    /// The caller answered `request_id`.
    fn respond(&self, request_id: RequestId, answer: Payload) -> Result<(), HandlerError>;
}

impl<F> ResponseHandler for F
where
    F: Fn(RequestId, Payload) -> Result<(), HandlerError> + Send + Sync,
{
    fn respond(&self, request_id: RequestId, answer: Payload) -> Result<(), HandlerError> {
        self(request_id, answer)
    }
}

struct AsyncMethod<F>(F);

impl<F, Fut> MethodHandler for AsyncMethod<F>
where
    F: Fn(Payload, Responder) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn invoke(
        &self,
        _invocation_id: InvocationId,
        parameter: Payload,
        responder: Responder,
    ) -> Result<(), HandlerError> {
        tokio::spawn((self.0)(parameter, responder));
        Ok(())
    }
}

/// Wraps an async function as a [`MethodHandler`] that runs on its own task.
///
/// # Examples
///
/// ```rust
/// use airpc::invocation::{MethodRegistry, Payload, Responder, ServerFacade, async_method};
/// use airpc::observability::ErrorObserver;
/// use std::sync::Arc;
///
/// let registry = MethodRegistry::new(Arc::new(ServerFacade::new(ErrorObserver::new())));
/// registry
///     .register(
///         "echo",
///         async_method(|parameter: Payload, responder: Responder| async move {
///             responder.progress(Payload::encode("working").unwrap_or_default());
///             responder.finish(parameter);
///         }),
///     )
///     .unwrap();
/// ```
pub fn async_method<F, Fut>(f: F) -> impl MethodHandler
where
    F: Fn(Payload, Responder) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    AsyncMethod(f)
}

/// Method name to handler, plus the cancel and response handler slots.
///
/// Registration and dispatch may run concurrently from any thread. Method
/// names are unique; the cancel and response slots hold one handler each
/// and a later registration replaces the earlier one.
pub struct MethodRegistry {
    methods: DashMap<String, Arc<dyn MethodHandler>>,
    cancel_handler: RwLock<Option<Arc<dyn CancelHandler>>>,
    response_handler: RwLock<Option<Arc<dyn ResponseHandler>>>,
    facade: Arc<ServerFacade>,
}

impl MethodRegistry {
    /// Creates an empty registry that registers invocations with `facade`.
    #[must_use]
    pub fn new(facade: Arc<ServerFacade>) -> Self {
        Self {
            methods: DashMap::new(),
            cancel_handler: RwLock::new(None),
            response_handler: RwLock::new(None),
            facade,
        }
    }

    /// Registers a handler for a method.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::DuplicateMethod`] if the name is taken.
    pub fn register(
        &self,
        method: impl Into<String>,
        handler: impl MethodHandler + 'static,
    ) -> Result<(), InvocationError> {
        match self.methods.entry(method.into()) {
            Entry::Occupied(entry) => Err(InvocationError::DuplicateMethod {
                method: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                tracing::debug!(method = %entry.key(), "Method registered");
                entry.insert(Arc::new(handler));
                Ok(())
            }
        }
    }

    /// Removes a method. Returns `false` if it was not registered.
    pub fn unregister(&self, method: &str) -> bool {
        self.methods.remove(method).is_some()
    }

    /// Installs the cancel handler, replacing any earlier one.
    pub fn register_cancel_handler(&self, handler: Arc<dyn CancelHandler>) {
        *self.cancel_handler.write() = Some(handler);
    }

    /// Installs the response handler, replacing any earlier one.
    pub fn register_response_handler(&self, handler: Arc<dyn ResponseHandler>) {
        *self.response_handler.write() = Some(handler);
    }

    /// Returns `true` if a handler is registered for the method.
    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Returns the registered method names, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<_> = self.methods.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Returns the facade invocations are registered with.
    #[must_use]
    pub fn facade(&self) -> &Arc<ServerFacade> {
        &self.facade
    }

    /// Routes one inbound message.
    ///
    /// - `MethodInvocation`: registers the invocation with `route` as its
    ///   reply route, then invokes the handler.
    /// - `Cancel` and `Response`: forwarded to their handler if one is
    ///   installed, dropped otherwise.
    ///
    /// # Errors
    ///
    /// - [`InvocationError::MethodNotFound`] if no handler is registered for
    ///   the method. Nothing is registered in that case.
    /// - [`InvocationError::UnexpectedMessage`] for kinds a server never
    ///   receives.
    /// - [`AirpcError::Application`] if a handler returns an error. The
    ///   invocation stays registered; the caller decides how to complete it.
    pub fn dispatch(&self, envelope: Envelope, route: &ReplyRoute) -> Result<(), AirpcError> {
        match envelope {
            Envelope::MethodInvocation {
                invocation_id,
                method,
                parameter,
            } => {
                let handler = self
                    .methods
                    .get(&method)
                    .map(|entry| Arc::clone(entry.value()))
                    .ok_or_else(|| InvocationError::MethodNotFound {
                        method: method.clone(),
                    })?;

                tracing::debug!(
                    invocation_id = %invocation_id,
                    method = %method,
                    "Dispatching invocation"
                );
                self.facade.register_invocation(invocation_id, Arc::clone(route));
                let responder = self.facade.responder(invocation_id);
                handler
                    .invoke(invocation_id, parameter, responder)
                    .map_err(AirpcError::Application)
            }
            Envelope::Cancel { invocation_id } => {
                let handler = self.cancel_handler.read().clone();
                match handler {
                    Some(handler) => handler.cancel(invocation_id).map_err(AirpcError::Application),
                    None => {
                        tracing::trace!(invocation_id = %invocation_id, "No cancel handler");
                        Ok(())
                    }
                }
            }
            Envelope::Response { request_id, answer } => {
                let handler = self.response_handler.read().clone();
                match handler {
                    Some(handler) => handler
                        .respond(request_id, answer)
                        .map_err(AirpcError::Application),
                    None => {
                        tracing::trace!(request_id = %request_id, "No response handler");
                        Ok(())
                    }
                }
            }
            other => Err(InvocationError::UnexpectedMessage {
                kind: other.kind(),
                endpoint: "server",
            }
            .into()),
        }
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.methods())
            .field("has_cancel_handler", &self.cancel_handler.read().is_some())
            .field("has_response_handler", &self.response_handler.read().is_some())
            .finish()
    }
}
