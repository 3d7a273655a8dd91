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

//! Client end of an HTTP broker pair.
//!
//! # Architecture
//!
//! The broker maintains two independent tasks:
//! - **Sender loop**: pops the outbound queue and POSTs one message per
//!   request to the peer's mailbox
//! - **Receiver loop**: GETs batches from the peer's mailbox and hands each
//!   decoded message to the worker pool
//!
//! ```text
//!            send() ──► outbound FIFO ──► sender loop ──POST──► mailbox
//!                                                              │
//! handler ◄── worker pool ◄── receiver loop ◄──GET (batch)─────┘
//! ```
//!
//! # Failure handling
//!
//! A failed POST is never retried. The failure goes to the message's own
//! failure callback, or to the error observer if it has none, and the sender
//! loop then waits `delivery_failure_backoff` before taking the next message.
//! A message that cannot be encoded is failed the same way but paces only
//! `unexpected_failure_backoff`.
//! A failed GET is reported and retried after `receive_failure_backoff`.

use crate::observability::{BrokerMetrics, ErrorObserver};
use crate::serialization::framing::decode_batch;
use crate::serialization::{PostcardSerializer, Serializer};
use crate::transport::pool::WorkerPool;
use crate::transport::traits::Outbound;
use crate::transport::{
    Broker, BrokerConfig, FailureCallback, HttpExchange, Message, ReqwestExchange, SharedHandler,
    TransportError,
};
use crate::AirpcError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The client end of a broker pair, talking to an
/// [`HttpMailbox`](super::HttpMailbox) over plain HTTP.
///
/// Sending is non-blocking and queues in FIFO order. Nothing moves until
/// [`start`](Self::start) is called with the receive callback, which lets the
/// callback hold an `Arc` of the broker itself as its reply route.
///
/// The loops keep running for as long as the broker lives. A receive
/// callback that holds the broker keeps it alive, so call
/// [`shutdown`](Self::shutdown) to stop it.
///
/// # Examples
///
/// ```rust,no_run
/// use airpc::endpoint::ClientEndpoint;
/// use airpc::invocation::Envelope;
/// use airpc::observability::ErrorObserver;
/// use airpc::transport::{BrokerConfig, HttpBroker};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let observer = ErrorObserver::new();
/// let config = BrokerConfig::new("orders", "http://localhost:8080");
/// let broker: Arc<HttpBroker<Envelope>> = Arc::new(HttpBroker::new(config, observer.clone())?);
///
/// let client = ClientEndpoint::new(Default::default());
/// client.route(["echo"], broker.clone());
/// broker.start(client.handler())?;
/// # Ok(())
/// # }
/// ```
pub struct HttpBroker<M, S = PostcardSerializer> {
    context: Arc<LoopContext<S>>,
    outgoing_tx: mpsc::UnboundedSender<Outbound<M>>,
    outgoing_rx: Mutex<Option<mpsc::UnboundedReceiver<Outbound<M>>>>,
    send_task: Mutex<Option<JoinHandle<()>>>,
    recv_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

/// State shared by the sender and receiver loops.
struct LoopContext<S> {
    id: Arc<str>,
    url: String,
    config: BrokerConfig,
    serializer: Arc<S>,
    exchange: Arc<dyn HttpExchange>,
    observer: ErrorObserver,
    metrics: Arc<BrokerMetrics>,
}

impl<S> LoopContext<S> {
    fn report(&self, error: TransportError) {
        self.observer.report(&AirpcError::Transport(error));
    }
}

impl<M: Message> HttpBroker<M, PostcardSerializer> {
    /// Creates a broker using Postcard and a `reqwest` client whose
    /// requests time out after `config.request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] if the configuration
    /// does not validate or the HTTP client cannot be built.
    pub fn new(config: BrokerConfig, observer: ErrorObserver) -> Result<Self, TransportError> {
        let exchange = ReqwestExchange::new(config.request_timeout)?;
        Self::with_exchange(config, PostcardSerializer::default(), Arc::new(exchange), observer)
    }
}

impl<M: Message, S: Serializer> HttpBroker<M, S> {
    /// Creates a broker with an explicit serializer and exchange.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] if the configuration
    /// does not validate.
    pub fn with_exchange(
        config: BrokerConfig,
        serializer: S,
        exchange: Arc<dyn HttpExchange>,
        observer: ErrorObserver,
    ) -> Result<Self, TransportError> {
        config.validate()?;
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let context = LoopContext {
            id: Arc::from(config.broker_id.as_str()),
            url: config.mailbox_url(),
            config,
            serializer: Arc::new(serializer),
            exchange,
            observer,
            metrics: Arc::new(BrokerMetrics::new()),
        };

        Ok(Self {
            context: Arc::new(context),
            outgoing_tx,
            outgoing_rx: Mutex::new(Some(outgoing_rx)),
            send_task: Mutex::new(None),
            recv_task: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Spawns the sender and receiver loops, dispatching inbound messages to
    /// `handler`.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyStarted`] on a second call, or
    /// [`TransportError::Closed`] after shutdown.
    pub fn start(&self, handler: SharedHandler<M>) -> Result<(), TransportError> {
        let context = &self.context;
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed {
                broker_id: context.id.to_string(),
            });
        }
        let outgoing_rx =
            self.outgoing_rx
                .lock()
                .take()
                .ok_or_else(|| TransportError::AlreadyStarted {
                    broker_id: context.id.to_string(),
                })?;

        let pool = WorkerPool::spawn(
            context.id.clone(),
            context.config.worker_count,
            handler,
            context.observer.clone(),
        );

        *self.send_task.lock() = Some(tokio::spawn(send_loop(context.clone(), outgoing_rx)));
        *self.recv_task.lock() = Some(tokio::spawn(receive_loop(context.clone(), pool)));

        info!(
            broker_id = %context.id,
            url = %context.url,
            serializer = context.serializer.name(),
            workers = context.config.worker_count,
            "HTTP broker started"
        );
        Ok(())
    }

    /// Returns the broker's configuration.
    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.context.config
    }

    /// Returns the broker's traffic counters.
    #[must_use]
    pub fn metrics(&self) -> &BrokerMetrics {
        &self.context.metrics
    }

    /// Stops both loops and the worker pool.
    ///
    /// Queued messages are discarded; later sends fail with
    /// [`TransportError::Closed`].
    pub fn shutdown(&self) {
        info!(broker_id = %self.context.id, "Shutting down HTTP broker");
        self.closed.store(true, Ordering::Release);
        self.abort_tasks();
        self.outgoing_rx.lock().take();
    }
}

impl<M, S> HttpBroker<M, S> {
    fn abort_tasks(&self) {
        if let Some(task) = self.send_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.recv_task.lock().take() {
            task.abort();
        }
    }
}

impl<M: Message, S: Serializer> Broker<M> for HttpBroker<M, S> {
    fn id(&self) -> &str {
        &self.context.id
    }

    fn send_with_failure(&self, message: M, on_failure: Option<FailureCallback>) {
        let outbound = Outbound::new(message, on_failure);
        let closed = TransportError::Closed {
            broker_id: self.context.id.to_string(),
        };
        if self.closed.load(Ordering::Acquire) {
            outbound.fail(closed, &self.context.observer);
            return;
        }
        if let Err(mpsc::error::SendError(outbound)) = self.outgoing_tx.send(outbound) {
            outbound.fail(closed, &self.context.observer);
        }
    }
}

impl<M, S> Drop for HttpBroker<M, S> {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl<M, S> std::fmt::Debug for HttpBroker<M, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBroker")
            .field("id", &self.context.id)
            .field("url", &self.context.url)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Pops the outbound queue and POSTs each message once.
async fn send_loop<M, S>(
    context: Arc<LoopContext<S>>,
    mut outgoing_rx: mpsc::UnboundedReceiver<Outbound<M>>,
) where
    M: Message,
    S: Serializer,
{
    info!(broker_id = %context.id, "Sender loop started");

    while let Some(outbound) = outgoing_rx.recv().await {
        let kind = outbound.message.kind_name();
        let body = match context.serializer.serialize(&outbound.message) {
            Ok(body) => body,
            Err(error) => {
                warn!(broker_id = %context.id, kind, error = %error, "Message could not be encoded");
                outbound.fail(TransportError::Encode(error), &context.observer);
                tokio::time::sleep(context.config.unexpected_failure_backoff).await;
                continue;
            }
        };

        let bytes = body.len();
        match context
            .exchange
            .post(&context.url, context.serializer.content_type(), body)
            .await
        {
            Ok(()) => {
                debug!(broker_id = %context.id, kind, bytes, "Message delivered");
                context.metrics.record_sent(bytes);
            }
            Err(error) if error.is_delivery_failure() => {
                context.metrics.record_delivery_failure();
                warn!(
                    broker_id = %context.id,
                    kind,
                    error = %error,
                    backoff = ?context.config.delivery_failure_backoff,
                    "Message not delivered, dropping it"
                );
                outbound.fail(error, &context.observer);
                tokio::time::sleep(context.config.delivery_failure_backoff).await;
            }
            Err(error) => {
                outbound.fail(error, &context.observer);
                tokio::time::sleep(context.config.unexpected_failure_backoff).await;
            }
        }
    }

    info!(broker_id = %context.id, "Sender loop stopped");
}

/// Polls the mailbox forever, dispatching each decoded message.
async fn receive_loop<M, S>(context: Arc<LoopContext<S>>, pool: WorkerPool<M>)
where
    M: Message,
    S: Serializer,
{
    info!(broker_id = %context.id, "Receiver loop started");

    loop {
        context.metrics.record_poll();
        let body = match context.exchange.get(&context.url).await {
            Ok(body) => body,
            Err(error) => {
                context.metrics.record_poll_failure();
                context.report(error);
                tokio::time::sleep(context.config.receive_failure_backoff).await;
                continue;
            }
        };

        let frames = match decode_batch(&body) {
            Ok(frames) => frames,
            Err(error) => {
                context.metrics.record_decode_failure();
                context.report(TransportError::Decode(error));
                tokio::time::sleep(context.config.unexpected_failure_backoff).await;
                continue;
            }
        };

        if frames.is_empty() {
            tokio::time::sleep(context.config.idle_poll_delay).await;
            continue;
        }

        debug!(broker_id = %context.id, count = frames.len(), "Batch received");
        for frame in frames {
            match context.serializer.deserialize::<M>(frame) {
                Ok(message) => {
                    context.metrics.record_received(frame.len());
                    if let Err(error) = pool.submit(message) {
                        context.report(error);
                        info!(broker_id = %context.id, "Receiver loop stopped");
                        return;
                    }
                }
                Err(error) => {
                    // One bad frame costs only itself.
                    context.metrics.record_decode_failure();
                    context.report(TransportError::Decode(error));
                }
            }
        }
    }
}
