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

//! In-memory broker implementation.
//!
//! This module provides a broker pair connected by Tokio channels. It is
//! useful for tests and for wiring a client and a server that live in the
//! same process, without the overhead of HTTP.

use crate::observability::{BrokerMetrics, ErrorObserver};
use crate::transport::pool::WorkerPool;
use crate::transport::traits::Outbound;
use crate::transport::{
    Broker, FailureCallback, Message, SharedHandler, TransportError, default_worker_count,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One end of an in-process broker pair.
///
/// Messages move by value; nothing is serialized. Inbound messages go
/// through the same [`WorkerPool`] dispatch as the HTTP broker, so ordering
/// guarantees are identical.
///
/// Messages sent before the peer is started are queued until it starts.
///
/// # Examples
///
/// ```rust
/// use airpc::AirpcError;
/// use airpc::invocation::{Envelope, InvocationId};
/// use airpc::observability::ErrorObserver;
/// use airpc::transport::{Broker, MemoryBroker, SharedHandler};
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (client, server) = MemoryBroker::<Envelope>::pair("client", "server", ErrorObserver::new());
///
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// let handler: SharedHandler<Envelope> = Arc::new(move |message: Envelope| -> Result<(), AirpcError> {
///     let _ = tx.send(message);
///     Ok(())
/// });
/// server.start(handler)?;
///
/// let id = InvocationId::new();
/// client.send(Envelope::Cancel { invocation_id: id });
/// assert_eq!(rx.recv().await, Some(Envelope::Cancel { invocation_id: id }));
/// # Ok(())
/// # }
/// ```
pub struct MemoryBroker<M> {
    id: Arc<str>,
    peer_id: Arc<str>,
    peer: mpsc::UnboundedSender<M>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<M>>>,
    worker_count: usize,
    observer: ErrorObserver,
    metrics: Arc<BrokerMetrics>,
    pump: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<M: Message> MemoryBroker<M> {
    /// Creates two brokers connected to each other.
    ///
    /// Both ends report failures to `observer`.
    pub fn pair(
        left_id: impl Into<String>,
        right_id: impl Into<String>,
        observer: ErrorObserver,
    ) -> (Self, Self) {
        let left_id: Arc<str> = Arc::from(left_id.into());
        let right_id: Arc<str> = Arc::from(right_id.into());
        let (to_right, right_inbound) = mpsc::unbounded_channel();
        let (to_left, left_inbound) = mpsc::unbounded_channel();

        let left = Self::new(
            left_id.clone(),
            right_id.clone(),
            to_right,
            left_inbound,
            observer.clone(),
        );
        let right = Self::new(right_id, left_id, to_left, right_inbound, observer);
        (left, right)
    }

    fn new(
        id: Arc<str>,
        peer_id: Arc<str>,
        peer: mpsc::UnboundedSender<M>,
        inbound: mpsc::UnboundedReceiver<M>,
        observer: ErrorObserver,
    ) -> Self {
        Self {
            id,
            peer_id,
            peer,
            inbound: Mutex::new(Some(inbound)),
            worker_count: default_worker_count(),
            observer,
            metrics: Arc::new(BrokerMetrics::new()),
            pump: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Sets the number of dispatch lanes used once started.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Starts delivering inbound messages to `handler`.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyStarted`] on a second call, or
    /// [`TransportError::Closed`] after shutdown.
    pub fn start(&self, handler: SharedHandler<M>) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed {
                broker_id: self.id.to_string(),
            });
        }
        let mut inbound = self
            .inbound
            .lock()
            .take()
            .ok_or_else(|| TransportError::AlreadyStarted {
                broker_id: self.id.to_string(),
            })?;

        let pool = WorkerPool::spawn(
            self.id.clone(),
            self.worker_count,
            handler,
            self.observer.clone(),
        );
        let id = self.id.clone();
        let metrics = self.metrics.clone();
        let observer = self.observer.clone();

        let task = tokio::spawn(async move {
            tracing::info!(broker_id = %id, "Memory broker started");
            while let Some(message) = inbound.recv().await {
                metrics.record_received(0);
                if let Err(error) = pool.submit(message) {
                    observer.report(&error.into());
                    break;
                }
            }
            tracing::info!(broker_id = %id, "Memory broker stopped");
        });
        *self.pump.lock() = Some(task);
        Ok(())
    }

    /// Returns this broker's traffic counters.
    #[must_use]
    pub fn metrics(&self) -> &BrokerMetrics {
        &self.metrics
    }

    /// Stops delivery in both directions.
    ///
    /// Later sends fail with [`TransportError::Closed`]. Inbound messages not
    /// yet dispatched are discarded.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(task) = self.pump.lock().take() {
            task.abort();
        }
        self.inbound.lock().take();
    }
}

impl<M: Message> Broker<M> for MemoryBroker<M> {
    fn id(&self) -> &str {
        &self.id
    }

    fn send_with_failure(&self, message: M, on_failure: Option<FailureCallback>) {
        if self.closed.load(Ordering::Acquire) {
            let error = TransportError::Closed {
                broker_id: self.id.to_string(),
            };
            Outbound::new(message, on_failure).fail(error, &self.observer);
            return;
        }
        tracing::debug!(
            broker_id = %self.id,
            kind = message.kind_name(),
            "Sending message"
        );
        match self.peer.send(message) {
            Ok(()) => self.metrics.record_sent(0),
            Err(mpsc::error::SendError(message)) => {
                self.metrics.record_delivery_failure();
                let error = TransportError::Closed {
                    broker_id: self.peer_id.to_string(),
                };
                Outbound::new(message, on_failure).fail(error, &self.observer);
            }
        }
    }
}

impl<M> Drop for MemoryBroker<M> {
    fn drop(&mut self) {
        if let Some(task) = self.pump.lock().take() {
            task.abort();
        }
    }
}

impl<M> std::fmt::Debug for MemoryBroker<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("id", &self.id)
            .field("peer_id", &self.peer_id)
            .field("worker_count", &self.worker_count)
            .finish()
    }
}
