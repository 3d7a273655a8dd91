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


//! Client endpoint wiring.

use crate::AirpcError;
use crate::endpoint::EndpointConfig;
use crate::invocation::{
    CallError, ClientFacade, Envelope, InvocationCallbacks, InvocationError, InvocationHandle,
    MethodDirectory, Payload, ReplyRoute,
};
use crate::transport::SharedHandler;
use std::sync::Arc;
use std::time::Duration;

/// The client side of the invocation layer.
///
/// Owns the [`MethodDirectory`] and the [`ClientFacade`] that resolves
/// through it. Start the client broker with [`handler`](Self::handler);
/// protocol errors it returns are reported by the broker's observer.
///
/// # Examples
///
/// ```rust
/// use airpc::endpoint::{ClientEndpoint, EndpointConfig};
/// use airpc::invocation::Envelope;
/// use airpc::observability::ErrorObserver;
/// use airpc::transport::MemoryBroker;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (client, _server) = MemoryBroker::<Envelope>::pair("client", "server", ErrorObserver::new());
/// let client = Arc::new(client);
///
/// let endpoint = ClientEndpoint::new(EndpointConfig::default());
/// endpoint.route(["echo", "sum"], client.clone());
/// client.start(endpoint.handler())?;
/// assert_eq!(endpoint.directory().methods(), vec!["echo", "sum"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ClientEndpoint {
    directory: Arc<MethodDirectory>,
    facade: Arc<ClientFacade>,
}

impl ClientEndpoint {
    /// Creates a client endpoint with an empty directory.
    pub fn new(config: EndpointConfig) -> Self {
        let directory = Arc::new(MethodDirectory::new());
        let facade = Arc::new(
            ClientFacade::new(Arc::clone(&directory)).with_default_timeout(config.default_timeout),
        );
        Self { directory, facade }
    }

    /// Routes methods to the server reachable through `route`.
    pub fn route<I, S>(&self, methods: I, route: ReplyRoute)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directory.register_all(methods, route);
    }

    /// Returns the method directory.
    pub fn directory(&self) -> &Arc<MethodDirectory> {
        &self.directory
    }

    /// Returns the client correlation table.
    pub fn facade(&self) -> &Arc<ClientFacade> {
        &self.facade
    }

    /// Returns the receive callback for the client broker.
    pub fn handler(&self) -> SharedHandler<Envelope> {
        let facade = Arc::clone(&self.facade);
        Arc::new(move |envelope: Envelope| -> Result<(), AirpcError> {
            facade.dispatch(envelope).map_err(AirpcError::from)
        })
    }

    /// Starts an invocation. See [`ClientFacade::invoke`].
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::MethodNotFound`] if the method is not
    /// routed.
    pub fn invoke(
        &self,
        method: &str,
        callbacks: InvocationCallbacks,
        parameter: Payload,
    ) -> Result<InvocationHandle, InvocationError> {
        self.facade.invoke(method, callbacks, parameter)
    }

    /// Invokes a method and waits for its result. See [`ClientFacade::call`].
    ///
    /// # Errors
    ///
    /// See [`ClientFacade::call`].
    pub async fn call(&self, method: &str, parameter: Payload) -> Result<Payload, CallError> {
        self.facade.call(method, parameter).await
    }

    /// Invokes a method and waits at most `timeout`. See
    /// [`ClientFacade::call_timeout`].
    ///
    /// # Errors
    ///
    /// See [`ClientFacade::call_timeout`].
    pub async fn call_timeout(
        &self,
        method: &str,
        parameter: Payload,
        timeout: Duration,
    ) -> Result<Payload, CallError> {
        self.facade.call_timeout(method, parameter, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::{InvocationId, result_fn};
    use crate::transport::{Broker, FailureCallback, MessageHandler};

    struct Sink;

    impl Broker<Envelope> for Sink {
        fn id(&self) -> &str {
            "sink"
        }

        fn send_with_failure(&self, _message: Envelope, _on_failure: Option<FailureCallback>) {}
    }

    #[tokio::test]
    async fn test_invoke_carries_default_timeout() {
        let endpoint = ClientEndpoint::new(EndpointConfig::default());
        endpoint.route(["echo"], Arc::new(Sink));

        let handle = endpoint
            .invoke("echo", InvocationCallbacks::new(result_fn(|_| {})), Payload::null())
            .unwrap();
        assert_eq!(handle.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(handle.method(), "echo");

        let handle = endpoint
            .invoke(
                "echo",
                InvocationCallbacks::new(result_fn(|_| {})).with_timeout(Duration::from_secs(2)),
                Payload::null(),
            )
            .unwrap();
        assert_eq!(handle.timeout(), Some(Duration::from_secs(2)));
        assert_eq!(endpoint.facade().len(), 2);
    }

    #[test]
    fn test_handler_returns_protocol_errors() {
        let endpoint = ClientEndpoint::new(EndpointConfig::default());
        let handler = endpoint.handler();

        let error = handler
            .on_message(Envelope::InterimResponse {
                invocation_id: InvocationId::new(),
                progress: Payload::null(),
            })
            .unwrap_err();
        assert!(error.is_protocol_error());

        assert!(
            handler
                .on_message(Envelope::Finished {
                    invocation_id: InvocationId::new(),
                    result: Payload::null(),
                })
                .is_ok()
        );
    }
}
