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

//! Inbound dispatch to the receive callback.
//!
//! A broker's receiver loop must never wait on a slow handler, so decoded
//! messages are handed to a [`WorkerPool`]. The pool runs a fixed number of
//! lanes; each lane is an unbounded FIFO drained by one task.
//!
//! ```text
//! receiver loop ──► submit(msg) ──► lane[key % n] ──► handler.on_message
//!                                   lane[...]     ──► handler.on_message
//! ```
//!
//! A message with an affinity key always lands on the same lane, so messages
//! sharing a key reach the handler in the order they were submitted.
//! Messages without a key are spread round-robin.
//!
//! A panicking callback is caught and reported as an application error; the
//! lane keeps draining.

use crate::AirpcError;
use crate::observability::ErrorObserver;
use crate::transport::{Message, SharedHandler, TransportError};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A fixed set of dispatch lanes feeding one receive callback.
///
/// Must be created inside a Tokio runtime. Dropping the pool aborts its
/// lanes; messages still queued are discarded.
pub struct WorkerPool<M> {
    broker_id: Arc<str>,
    lanes: Vec<mpsc::UnboundedSender<M>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    next_lane: AtomicUsize,
}

impl<M: Message> WorkerPool<M> {
    /// Spawns `worker_count` lanes (at least one) that call `handler`.
    ///
    /// Handler errors are reported to `observer`.
    pub fn spawn(
        broker_id: impl Into<Arc<str>>,
        worker_count: usize,
        handler: SharedHandler<M>,
        observer: ErrorObserver,
    ) -> Self {
        let broker_id = broker_id.into();
        let worker_count = worker_count.max(1);
        let mut lanes = Vec::with_capacity(worker_count);
        let mut tasks = Vec::with_capacity(worker_count);

        for lane in 0..worker_count {
            let (tx, mut rx) = mpsc::unbounded_channel::<M>();
            let handler = handler.clone();
            let observer = observer.clone();
            let id = broker_id.clone();

            tasks.push(tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    let kind = message.kind_name();
                    let outcome = catch_unwind(AssertUnwindSafe(|| handler.on_message(message)))
                        .unwrap_or_else(|payload| {
                            tracing::warn!(broker_id = %id, lane, kind, "Receive callback panicked");
                            Err(AirpcError::Application(Box::new(CallbackPanic::from_payload(
                                kind, payload,
                            ))))
                        });
                    if let Err(error) = outcome {
                        tracing::debug!(broker_id = %id, lane, kind, "Receive callback failed");
                        observer.report(&error);
                    }
                }
                tracing::debug!(broker_id = %id, lane, "Worker lane stopped");
            }));
            lanes.push(tx);
        }

        tracing::debug!(broker_id = %broker_id, worker_count, "Worker pool started");

        Self {
            broker_id,
            lanes,
            tasks: Mutex::new(tasks),
            next_lane: AtomicUsize::new(0),
        }
    }

    /// Queues a message on its lane.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the pool was shut down.
    pub fn submit(&self, message: M) -> Result<(), TransportError> {
        let lanes = self.lanes.len();
        let lane = match message.affinity_key() {
            Some(key) => (key % lanes as u64) as usize,
            None => self.next_lane.fetch_add(1, Ordering::Relaxed) % lanes,
        };
        self.lanes[lane]
            .send(message)
            .map_err(|_| TransportError::Closed {
                broker_id: self.broker_id.to_string(),
            })
    }

    /// Returns the number of lanes.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.lanes.len()
    }

    /// Aborts every lane.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

/// A receive callback panicked while handling a message.
#[derive(Debug, thiserror::Error)]
#[error("receive callback panicked on {kind} message: {message}")]
pub struct CallbackPanic {
    kind: &'static str,
    message: String,
}

impl CallbackPanic {
    fn from_payload(kind: &'static str, payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self { kind, message }
    }
}

impl<M> Drop for WorkerPool<M> {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl<M> std::fmt::Debug for WorkerPool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("broker_id", &self.broker_id)
            .field("worker_count", &self.lanes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AirpcError;
    use crate::invocation::InvocationError;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize)]
    struct Keyed {
        key: Option<u64>,
        seq: u32,
    }

    impl Message for Keyed {
        fn affinity_key(&self) -> Option<u64> {
            self.key
        }
    }

    #[tokio::test]
    async fn test_same_key_preserves_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler: SharedHandler<Keyed> = Arc::new(move |m: Keyed| -> Result<(), AirpcError> {
            // Uneven work per message to tempt reordering across lanes.
            if m.seq % 3 == 0 {
                std::thread::sleep(Duration::from_micros(200));
            }
            let _ = tx.send((m.key, m.seq));
            Ok(())
        });
        let pool = WorkerPool::spawn("test", 4, handler, ErrorObserver::new());

        for seq in 0..200 {
            for key in [1u64, 2, 3] {
                pool.submit(Keyed {
                    key: Some(key),
                    seq,
                })
                .unwrap();
            }
        }

        let mut last = [None::<u32>; 4];
        for _ in 0..600 {
            let (key, seq) = rx.recv().await.unwrap();
            let slot = &mut last[key.unwrap() as usize];
            if let Some(previous) = *slot {
                assert!(seq > previous, "key {:?} went {} -> {}", key, previous, seq);
            }
            *slot = Some(seq);
        }
    }

    #[tokio::test]
    async fn test_unkeyed_messages_are_all_delivered() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler: SharedHandler<Keyed> = Arc::new(move |m: Keyed| -> Result<(), AirpcError> {
            let _ = tx.send(m.seq);
            Ok(())
        });
        let pool = WorkerPool::spawn("test", 3, handler, ErrorObserver::new());
        assert_eq!(pool.worker_count(), 3);

        for seq in 0..30 {
            pool.submit(Keyed { key: None, seq }).unwrap();
        }
        let mut seen = Vec::new();
        for _ in 0..30 {
            seen.push(rx.recv().await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..30).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_handler_errors_reach_observer() {
        let observer = ErrorObserver::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        observer.on_error(move |e| {
            let _ = tx.send(e.to_string());
        });

        let handler: SharedHandler<Keyed> = Arc::new(|_m: Keyed| -> Result<(), AirpcError> {
            Err(AirpcError::Invocation(InvocationError::NoResponseHandler))
        });
        let pool = WorkerPool::spawn("test", 1, handler, observer);
        pool.submit(Keyed { key: None, seq: 0 }).unwrap();

        let reported = rx.recv().await.unwrap();
        assert!(reported.contains("no response handler"));
    }

    #[tokio::test]
    async fn test_panicking_callback_keeps_lane_alive() {
        let observer = ErrorObserver::new();
        let (error_tx, mut error_rx) = mpsc::unbounded_channel();
        observer.on_error(move |e| {
            let _ = error_tx.send((e.is_application_error(), e.to_string()));
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler: SharedHandler<Keyed> = Arc::new(move |m: Keyed| -> Result<(), AirpcError> {
            if m.seq == 1 {
                panic!("handler bug on {}", m.seq);
            }
            let _ = tx.send(m.seq);
            Ok(())
        });
        let pool = WorkerPool::spawn("test", 1, handler, observer);

        for seq in 1..=3 {
            pool.submit(Keyed { key: Some(7), seq }).unwrap();
        }

        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
        let (is_application, text) = error_rx.recv().await.unwrap();
        assert!(is_application);
        assert!(text.contains("handler bug on 1"), "{}", text);

        pool.submit(Keyed { key: Some(7), seq: 4 }).unwrap();
        assert_eq!(rx.recv().await, Some(4));
    }

    #[tokio::test]
    async fn test_zero_workers_means_one_lane() {
        let handler: SharedHandler<Keyed> = Arc::new(|_m: Keyed| -> Result<(), AirpcError> { Ok(()) });
        let pool = WorkerPool::spawn("test", 0, handler, ErrorObserver::new());
        assert_eq!(pool.worker_count(), 1);
    }
}
