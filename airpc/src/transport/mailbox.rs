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

//! Server end of an HTTP broker pair.
//!
//! An [`HttpMailbox`] is the peer an [`HttpBroker`](super::HttpBroker)
//! polls. It never opens a connection of its own: outbound messages wait in
//! its queue until the next GET collects them, and inbound messages arrive
//! one per POST.
//!
//! [`MailboxRouter`] mounts any number of mailboxes on an `axum` router:
//!
//! | Request                     | Response                                  |
//! |-----------------------------|-------------------------------------------|
//! | `GET /brokers/{broker_id}`  | `200` with a batch, possibly empty        |
//! | `POST /brokers/{broker_id}` | `202` once queued for dispatch            |
//! | undecodable POST body       | `400`                                     |
//! | unknown `broker_id`         | `404`                                     |
//! | mailbox closed or not started | `503`                                   |

use crate::AirpcError;
use crate::observability::{BrokerMetrics, ErrorObserver};
use crate::serialization::framing::{MAX_FRAME_SIZE, encode_batch};
use crate::serialization::{PostcardSerializer, SerializationError, Serializer};
use crate::transport::config::{DEFAULT_LONG_POLL, DEFAULT_MAX_BATCH};
use crate::transport::pool::WorkerPool;
use crate::transport::traits::Outbound;
use crate::transport::{
    Broker, BrokerConfig, FailureCallback, Message, SharedHandler, TransportError,
    default_worker_count,
};
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

/// The server end of a broker pair.
///
/// Implements [`Broker`], so the server side of the invocation layer sends
/// through it exactly as the client sends through an `HttpBroker`. Delivery
/// of an outbound message cannot be observed from this end; a message taken
/// by a poll whose response is lost is gone.
///
/// # Examples
///
/// ```rust
/// use airpc::endpoint::ServerEndpoint;
/// use airpc::invocation::Envelope;
/// use airpc::observability::ErrorObserver;
/// use airpc::transport::{HttpMailbox, MailboxRouter};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let observer = ErrorObserver::new();
/// let server = ServerEndpoint::new(Default::default(), observer.clone());
///
/// let mailbox: Arc<HttpMailbox<Envelope>> = Arc::new(HttpMailbox::new("orders", observer));
/// mailbox.start(server.attach(mailbox.clone()))?;
///
/// let app: axum::Router = MailboxRouter::new().mailbox(mailbox).build();
/// # let _ = app;
/// # Ok(())
/// # }
/// ```
pub struct HttpMailbox<M, S = PostcardSerializer> {
    id: Arc<str>,
    serializer: S,
    long_poll: Duration,
    max_batch: usize,
    worker_count: usize,
    observer: ErrorObserver,
    metrics: BrokerMetrics,
    outgoing_tx: mpsc::UnboundedSender<Outbound<M>>,
    outgoing_rx: Mutex<mpsc::UnboundedReceiver<Outbound<M>>>,
    pool: OnceLock<WorkerPool<M>>,
    closed: AtomicBool,
}

impl<M: Message> HttpMailbox<M, PostcardSerializer> {
    /// Creates a Postcard mailbox with default timings.
    pub fn new(broker_id: impl Into<String>, observer: ErrorObserver) -> Self {
        Self::with_serializer(broker_id, PostcardSerializer::default(), observer)
    }
}

impl<M: Message, S: Serializer> HttpMailbox<M, S> {
    /// Creates a mailbox with an explicit serializer.
    pub fn with_serializer(
        broker_id: impl Into<String>,
        serializer: S,
        observer: ErrorObserver,
    ) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        Self {
            id: Arc::from(broker_id.into()),
            serializer,
            long_poll: DEFAULT_LONG_POLL,
            max_batch: DEFAULT_MAX_BATCH,
            worker_count: default_worker_count(),
            observer,
            metrics: BrokerMetrics::new(),
            outgoing_tx,
            outgoing_rx: Mutex::new(outgoing_rx),
            pool: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a mailbox from the same configuration the polling end uses.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] if the configuration
    /// does not validate.
    pub fn from_config(
        config: &BrokerConfig,
        serializer: S,
        observer: ErrorObserver,
    ) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self::with_serializer(config.broker_id.clone(), serializer, observer)
            .with_long_poll(config.long_poll)
            .with_max_batch(config.max_batch)
            .with_worker_count(config.worker_count))
    }

    /// Sets how long a poll is held open waiting for the first message.
    #[must_use]
    pub fn with_long_poll(mut self, long_poll: Duration) -> Self {
        self.long_poll = long_poll;
        self
    }

    /// Sets the maximum number of messages per poll response (at least 1).
    #[must_use]
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// Sets the number of dispatch lanes used once started.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Starts dispatching POSTed messages to `handler`.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyStarted`] on a second call, or
    /// [`TransportError::Closed`] after shutdown.
    pub fn start(&self, handler: SharedHandler<M>) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }
        if self.pool.get().is_some() {
            return Err(TransportError::AlreadyStarted {
                broker_id: self.id.to_string(),
            });
        }
        let pool = WorkerPool::spawn(
            self.id.clone(),
            self.worker_count,
            handler,
            self.observer.clone(),
        );
        self.pool
            .set(pool)
            .map_err(|_| TransportError::AlreadyStarted {
                broker_id: self.id.to_string(),
            })?;
        info!(
            broker_id = %self.id,
            serializer = self.serializer.name(),
            "HTTP mailbox started"
        );
        Ok(())
    }

    /// Answers one poll.
    ///
    /// Waits up to the long-poll duration for the first queued message, then
    /// takes up to the batch limit without waiting. Messages that cannot be
    /// encoded are failed through their own callback and left out of the batch.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] after shutdown.
    pub async fn poll(&self) -> Result<Vec<u8>, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }
        self.metrics.record_poll();

        let mut batch = Vec::new();
        {
            let mut outgoing_rx = self.outgoing_rx.lock().await;
            if let Ok(Some(first)) = tokio::time::timeout(self.long_poll, outgoing_rx.recv()).await
            {
                batch.push(first);
                while batch.len() < self.max_batch {
                    match outgoing_rx.try_recv() {
                        Ok(next) => batch.push(next),
                        Err(_) => break,
                    }
                }
            }
        }

        let mut frames = Vec::with_capacity(batch.len());
        for outbound in batch {
            match self.serializer.serialize(&outbound.message) {
                Ok(bytes) if bytes.len() <= MAX_FRAME_SIZE as usize => {
                    self.metrics.record_sent(bytes.len());
                    frames.push(bytes);
                }
                Ok(bytes) => {
                    let error = SerializationError::new(format!(
                        "{} message of {} bytes exceeds the frame limit",
                        outbound.message.kind_name(),
                        bytes.len()
                    ));
                    outbound.fail(TransportError::Encode(error), &self.observer);
                }
                Err(error) => outbound.fail(TransportError::Encode(error), &self.observer),
            }
        }

        debug!(broker_id = %self.id, count = frames.len(), "Answering poll");
        encode_batch(&frames).map_err(TransportError::Encode)
    }

    /// Accepts one POSTed message and queues it for dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] for an undecodable body,
    /// [`TransportError::NotStarted`] before [`start`](Self::start), or
    /// [`TransportError::Closed`] after shutdown.
    pub fn deliver(&self, body: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }
        let pool = self.pool.get().ok_or_else(|| TransportError::NotStarted {
            broker_id: self.id.to_string(),
        })?;

        let message: M = match self.serializer.deserialize(body) {
            Ok(message) => message,
            Err(error) => {
                self.metrics.record_decode_failure();
                return Err(TransportError::Decode(error));
            }
        };
        self.metrics.record_received(body.len());
        debug!(broker_id = %self.id, kind = message.kind_name(), "Message accepted");
        pool.submit(message)
    }

    /// Returns the mailbox's traffic counters.
    #[must_use]
    pub fn metrics(&self) -> &BrokerMetrics {
        &self.metrics
    }

    /// Stops dispatch. Later polls, POSTs, and sends fail with
    /// [`TransportError::Closed`].
    pub fn shutdown(&self) {
        info!(broker_id = %self.id, "Shutting down HTTP mailbox");
        self.closed.store(true, Ordering::Release);
        if let Some(pool) = self.pool.get() {
            pool.shutdown();
        }
    }

    fn closed_error(&self) -> TransportError {
        TransportError::Closed {
            broker_id: self.id.to_string(),
        }
    }

    fn report(&self, error: TransportError) {
        self.observer.report(&AirpcError::Transport(error));
    }
}

impl<M: Message, S: Serializer> Broker<M> for HttpMailbox<M, S> {
    fn id(&self) -> &str {
        &self.id
    }

    fn send_with_failure(&self, message: M, on_failure: Option<FailureCallback>) {
        let outbound = Outbound::new(message, on_failure);
        if self.closed.load(Ordering::Acquire) {
            outbound.fail(self.closed_error(), &self.observer);
            return;
        }
        if let Err(mpsc::error::SendError(outbound)) = self.outgoing_tx.send(outbound) {
            outbound.fail(self.closed_error(), &self.observer);
        }
    }
}

impl<M, S> std::fmt::Debug for HttpMailbox<M, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMailbox")
            .field("id", &self.id)
            .field("long_poll", &self.long_poll)
            .field("max_batch", &self.max_batch)
            .finish()
    }
}

/// Builder for an `axum` router serving mailboxes at `/brokers/{broker_id}`.
///
/// The router can be nested at any base URL.
pub struct MailboxRouter<M, S = PostcardSerializer> {
    mailboxes: HashMap<String, Arc<HttpMailbox<M, S>>>,
}

impl<M: Message, S: Serializer> MailboxRouter<M, S> {
    /// Creates an empty router builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mailboxes: HashMap::new(),
        }
    }

    /// Registers a mailbox under its broker id, replacing any previous one.
    #[must_use]
    pub fn mailbox(mut self, mailbox: Arc<HttpMailbox<M, S>>) -> Self {
        self.mailboxes.insert(mailbox.id.to_string(), mailbox);
        self
    }

    /// Builds the `axum` router.
    pub fn build(self) -> Router {
        let state = Arc::new(RouterState {
            mailboxes: self.mailboxes,
        });

        Router::new()
            .route(
                "/brokers/{broker_id}",
                get(poll_mailbox::<M, S>).post(deliver_to_mailbox::<M, S>),
            )
            .with_state(state)
    }
}

impl<M: Message, S: Serializer> Default for MailboxRouter<M, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state for the mailbox router.
struct RouterState<M, S> {
    mailboxes: HashMap<String, Arc<HttpMailbox<M, S>>>,
}

async fn poll_mailbox<M: Message, S: Serializer>(
    State(state): State<Arc<RouterState<M, S>>>,
    Path(broker_id): Path<String>,
) -> Response {
    let Some(mailbox) = state.mailboxes.get(&broker_id).cloned() else {
        return unknown_broker(&broker_id);
    };
    match mailbox.poll().await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, mailbox.serializer.content_type())],
            body,
        )
            .into_response(),
        Err(error) => error_response(&error),
    }
}

async fn deliver_to_mailbox<M: Message, S: Serializer>(
    State(state): State<Arc<RouterState<M, S>>>,
    Path(broker_id): Path<String>,
    body: Bytes,
) -> Response {
    let Some(mailbox) = state.mailboxes.get(&broker_id) else {
        return unknown_broker(&broker_id);
    };
    match mailbox.deliver(&body) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(error) => {
            let response = error_response(&error);
            mailbox.report(error);
            response
        }
    }
}

fn unknown_broker(broker_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        format!("unknown broker '{}'", broker_id),
    )
        .into_response()
}

fn error_response(error: &TransportError) -> Response {
    let status = match error {
        TransportError::Decode(_) => StatusCode::BAD_REQUEST,
        TransportError::NotStarted { .. } | TransportError::Closed { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::framing::decode_batch;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note(u32);

    impl Message for Note {}

    fn decode(body: &[u8]) -> Vec<Note> {
        let serializer = PostcardSerializer::default();
        decode_batch(body)
            .unwrap()
            .into_iter()
            .map(|frame| serializer.deserialize(frame).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_poll_respects_max_batch() {
        let mailbox = HttpMailbox::<Note>::new("notes", ErrorObserver::new()).with_max_batch(2);
        for n in 1..=3 {
            mailbox.send(Note(n));
        }

        assert_eq!(decode(&mailbox.poll().await.unwrap()), vec![Note(1), Note(2)]);
        assert_eq!(decode(&mailbox.poll().await.unwrap()), vec![Note(3)]);
        assert_eq!(mailbox.metrics().messages_sent(), 3);
        assert_eq!(mailbox.metrics().polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_poll_answers_empty_after_long_poll() {
        let mailbox = HttpMailbox::<Note>::new("notes", ErrorObserver::new())
            .with_long_poll(Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        let body = mailbox.poll().await.unwrap();

        assert!(decode(&body).is_empty());
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_deliver_dispatches_and_rejects_garbage() {
        let mailbox = HttpMailbox::<Note>::new("notes", ErrorObserver::new()).with_worker_count(1);
        let body = PostcardSerializer::default().serialize(&Note(7)).unwrap();
        assert!(matches!(
            mailbox.deliver(&body),
            Err(TransportError::NotStarted { .. })
        ));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler: SharedHandler<Note> = Arc::new(move |note: Note| -> Result<(), AirpcError> {
            let _ = tx.send(note);
            Ok(())
        });
        mailbox.start(handler).unwrap();

        mailbox.deliver(&body).unwrap();
        assert_eq!(rx.recv().await.unwrap(), Note(7));

        assert!(matches!(
            mailbox.deliver(&[0xFF, 0xFF, 0xFF]),
            Err(TransportError::Decode(_))
        ));
        assert_eq!(mailbox.metrics().messages_received(), 1);
        assert_eq!(mailbox.metrics().decode_failures(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_both_directions() {
        let mailbox = HttpMailbox::<Note>::new("notes", ErrorObserver::new());
        mailbox.shutdown();

        assert!(matches!(mailbox.poll().await, Err(TransportError::Closed { .. })));

        let (tx, rx) = std::sync::mpsc::channel();
        mailbox.send_with_failure(
            Note(1),
            Some(Box::new(move |error: TransportError| {
                let _ = tx.send(error);
            })),
        );
        assert!(matches!(rx.try_recv(), Ok(TransportError::Closed { .. })));
    }

    #[test]
    fn test_from_config_takes_mailbox_settings() {
        let config = BrokerConfig::new("orders", "http://localhost:1")
            .with_long_poll(Duration::from_secs(3))
            .with_max_batch(8)
            .with_worker_count(2);
        let mailbox: HttpMailbox<Note> =
            HttpMailbox::from_config(&config, PostcardSerializer::default(), ErrorObserver::new())
                .unwrap();

        assert_eq!(mailbox.id(), "orders");
        assert_eq!(mailbox.long_poll, Duration::from_secs(3));
        assert_eq!(mailbox.max_batch, 8);
        assert_eq!(mailbox.worker_count, 2);

        let invalid = config.with_max_batch(0);
        assert!(
            HttpMailbox::<Note>::from_config(&invalid, PostcardSerializer::default(), ErrorObserver::new())
                .is_err()
        );
    }
}
