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


//! Integration tests for HTTP broker delivery semantics.
//!
//! The HTTP exchange is scripted and Tokio time is paused, so backoff
//! pacing can be asserted exactly. These tests verify that:
//! - A failed POST is never re-sent
//! - The next message waits out the delivery backoff
//! - Failures reach the message's own callback, or the global sink
//! - Poll failures back off and bad frames are skipped
//! - A panicking receive callback does not stop polling
//! - A message that cannot be encoded fails through its own callback

#![cfg(feature = "http")]

use airpc::AirpcError;
use airpc::endpoint::{ClientEndpoint, EndpointConfig};
use airpc::invocation::{Envelope, Payload, RemoteErrorKind};
use airpc::observability::{ErrorMetrics, ErrorObserver};
use airpc::serialization::framing::encode_batch;
use airpc::serialization::{PostcardSerializer, Serializer};
use airpc::transport::{
    Broker, BrokerConfig, HttpBroker, HttpExchange, Message, SharedHandler, TransportError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order(u32);

impl Message for Order {
    fn affinity_key(&self) -> Option<u64> {
        Some(0)
    }
}

/// An exchange that answers from a script and records every request.
///
/// POSTs succeed unless a failure status is queued. GETs return queued
/// bodies, then park forever.
#[derive(Default)]
struct ScriptedExchange {
    post_failures: Mutex<VecDeque<Option<u16>>>,
    polls: Mutex<VecDeque<Result<Vec<u8>, u16>>>,
    posted: Mutex<Vec<(Instant, Vec<u8>)>>,
    polled: Mutex<Vec<Instant>>,
}

impl ScriptedExchange {
    fn posted_orders(&self) -> Vec<(Instant, Order)> {
        let serializer = PostcardSerializer::default();
        self.posted
            .lock()
            .iter()
            .map(|(at, body)| (*at, serializer.deserialize(body).unwrap()))
            .collect()
    }
}

#[async_trait]
impl HttpExchange for ScriptedExchange {
    async fn post(
        &self,
        url: &str,
        _content_type: &'static str,
        body: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.posted.lock().push((Instant::now(), body));
        let failure = self.post_failures.lock().pop_front().flatten();
        match failure {
            Some(status) => Err(TransportError::HttpStatus {
                method: "POST",
                url: url.to_string(),
                status,
            }),
            None => Ok(()),
        }
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.polled.lock().push(Instant::now());
        let next = self.polls.lock().pop_front();
        match next {
            Some(Ok(body)) => Ok(body),
            Some(Err(status)) => Err(TransportError::HttpStatus {
                method: "GET",
                url: url.to_string(),
                status,
            }),
            None => std::future::pending().await,
        }
    }
}

fn observer() -> (ErrorObserver, Arc<ErrorMetrics>) {
    let observer = ErrorObserver::new();
    let metrics = Arc::new(ErrorMetrics::new());
    let sink = metrics.clone();
    observer.on_error(move |error| sink.record_error(error));
    (observer, metrics)
}

fn broker(
    exchange: Arc<ScriptedExchange>,
    observer: ErrorObserver,
) -> HttpBroker<Order, PostcardSerializer> {
    let config = BrokerConfig::new("orders", "http://peer.test").with_worker_count(1);
    HttpBroker::with_exchange(config, PostcardSerializer::default(), exchange, observer).unwrap()
}

fn collector() -> (SharedHandler<Order>, mpsc::UnboundedReceiver<Order>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: SharedHandler<Order> = Arc::new(move |order: Order| -> Result<(), AirpcError> {
        let _ = tx.send(order);
        Ok(())
    });
    (handler, rx)
}

#[tokio::test(start_paused = true)]
async fn test_failed_message_is_not_resent_and_paces_next() {
    let exchange = Arc::new(ScriptedExchange::default());
    exchange.post_failures.lock().push_back(Some(503));
    let (observer, errors) = observer();
    let broker = broker(exchange.clone(), observer);

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = failures.clone();
    broker.send_with_failure(
        Order(1),
        Some(Box::new(move |error: TransportError| {
            sink.lock().push(error.to_string())
        })),
    );
    broker.send(Order(2));
    broker.send(Order(3));

    let (handler, _rx) = collector();
    broker.start(handler).unwrap();
    sleep(Duration::from_secs(30)).await;

    let posted = exchange.posted_orders();
    let orders: Vec<_> = posted.iter().map(|(_, order)| order.clone()).collect();
    assert_eq!(orders, vec![Order(1), Order(2), Order(3)]);
    assert!(posted[1].0 - posted[0].0 >= Duration::from_secs(10));
    assert!(posted[2].0 - posted[1].0 < Duration::from_secs(1));

    assert_eq!(failures.lock().len(), 1);
    assert!(failures.lock()[0].contains("503"));
    assert_eq!(errors.transport_errors(), 0);
    assert_eq!(broker.metrics().delivery_failures(), 1);
    assert_eq!(broker.metrics().messages_sent(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failure_without_callback_reaches_global_sink() {
    let exchange = Arc::new(ScriptedExchange::default());
    exchange.post_failures.lock().push_back(Some(500));
    let (observer, errors) = observer();
    let broker = broker(exchange.clone(), observer);

    broker.send(Order(7));
    let (handler, _rx) = collector();
    broker.start(handler).unwrap();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(exchange.posted.lock().len(), 1);
    assert_eq!(errors.transport_errors(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_after_backoff_uses_configured_pause() {
    let exchange = Arc::new(ScriptedExchange::default());
    exchange.post_failures.lock().push_back(Some(502));
    let (observer, _errors) = observer();
    let config = BrokerConfig::new("orders", "http://peer.test")
        .with_worker_count(1)
        .with_delivery_failure_backoff(Duration::from_secs(3));
    let broker: HttpBroker<Order> = HttpBroker::with_exchange(
        config,
        PostcardSerializer::default(),
        exchange.clone(),
        observer,
    )
    .unwrap();

    let (handler, _rx) = collector();
    broker.start(handler).unwrap();
    broker.send(Order(1));
    sleep(Duration::from_secs(1)).await;
    broker.send(Order(2));
    sleep(Duration::from_secs(1)).await;
    assert_eq!(exchange.posted.lock().len(), 1);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(exchange.posted.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_receiver_backs_off_and_skips_bad_frames() {
    let serializer = PostcardSerializer::default();
    let batch = encode_batch(&[
        serializer.serialize(&Order(1)).unwrap(),
        vec![0xff, 0xff, 0xff, 0xff, 0xff],
        serializer.serialize(&Order(2)).unwrap(),
    ])
    .unwrap();

    let exchange = Arc::new(ScriptedExchange::default());
    exchange.polls.lock().push_back(Err(500));
    exchange.polls.lock().push_back(Ok(batch));
    let (observer, errors) = observer();
    let broker = broker(exchange.clone(), observer);

    let (handler, mut rx) = collector();
    broker.start(handler).unwrap();
    sleep(Duration::from_secs(15)).await;

    assert_eq!(rx.recv().await, Some(Order(1)));
    assert_eq!(rx.recv().await, Some(Order(2)));

    let polled = exchange.polled.lock().clone();
    assert_eq!(polled.len(), 3);
    assert!(polled[1] - polled[0] >= Duration::from_secs(10));
    assert_eq!(errors.transport_errors(), 2);
    assert_eq!(broker.metrics().poll_failures(), 1);
    assert_eq!(broker.metrics().decode_failures(), 1);
    assert_eq!(broker.metrics().messages_received(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch_waits_idle_delay() {
    let exchange = Arc::new(ScriptedExchange::default());
    let empty: [Vec<u8>; 0] = [];
    exchange
        .polls
        .lock()
        .push_back(Ok(encode_batch(&empty).unwrap()));
    let (observer, errors) = observer();
    let broker = broker(exchange.clone(), observer);

    let (handler, _rx) = collector();
    broker.start(handler).unwrap();
    sleep(Duration::from_secs(1)).await;

    let polled = exchange.polled.lock().clone();
    assert_eq!(polled.len(), 2);
    assert!(polled[1] - polled[0] >= Duration::from_millis(100));
    assert_eq!(errors.total_errors(), 0);
}

#[tokio::test]
async fn test_shutdown_rejects_sends() {
    let exchange = Arc::new(ScriptedExchange::default());
    let (observer, _errors) = observer();
    let broker = broker(exchange, observer);
    let (handler, _rx) = collector();
    broker.start(handler).unwrap();
    broker.shutdown();

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = failures.clone();
    broker.send_with_failure(
        Order(1),
        Some(Box::new(move |error: TransportError| sink.lock().push(error.is_closed()))),
    );
    assert_eq!(failures.lock().as_slice(), &[true]);

    let (handler, _rx) = collector();
    assert!(matches!(
        broker.start(handler),
        Err(TransportError::Closed { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_panicking_handler_does_not_stop_receiving() {
    let serializer = PostcardSerializer::default();
    let exchange = Arc::new(ScriptedExchange::default());
    for order in [Order(1), Order(2)] {
        let batch = encode_batch(&[serializer.serialize(&order).unwrap()]).unwrap();
        exchange.polls.lock().push_back(Ok(batch));
    }
    let (observer, errors) = observer();
    let broker = broker(exchange.clone(), observer);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handler: SharedHandler<Order> = Arc::new(move |order: Order| -> Result<(), AirpcError> {
        if order == Order(1) {
            panic!("cannot handle order 1");
        }
        let _ = tx.send(order);
        Ok(())
    });
    broker.start(handler).unwrap();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(rx.recv().await, Some(Order(2)));
    assert_eq!(exchange.polled.lock().len(), 3);
    assert_eq!(errors.application_errors(), 1);
    assert_eq!(errors.transport_errors(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unencodable_message_fails_through_its_callback() {
    let exchange = Arc::new(ScriptedExchange::default());
    let (observer, errors) = observer();
    let config = BrokerConfig::new("orders", "http://peer.test").with_worker_count(1);
    let broker: HttpBroker<Order> = HttpBroker::with_exchange(
        config,
        PostcardSerializer::new().with_max_size(2),
        exchange.clone(),
        observer,
    )
    .unwrap();

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = failures.clone();
    broker.send_with_failure(
        Order(1_000_000),
        Some(Box::new(move |error: TransportError| {
            sink.lock().push(matches!(error, TransportError::Encode(_)))
        })),
    );
    broker.send(Order(1));

    let started = Instant::now();
    let (handler, _rx) = collector();
    broker.start(handler).unwrap();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(failures.lock().as_slice(), &[true]);
    let posted = exchange.posted_orders();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1, Order(1));
    assert!(posted[0].0 - started < Duration::from_millis(100));
    assert_eq!(errors.transport_errors(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_call_completes_with_delivery_failure() {
    let exchange = Arc::new(ScriptedExchange::default());
    let (observer, _errors) = observer();
    let config = BrokerConfig::new("orders", "http://peer.test").with_worker_count(1);
    let broker: Arc<HttpBroker<Envelope>> = Arc::new(
        HttpBroker::with_exchange(
            config,
            PostcardSerializer::new().with_max_size(64),
            exchange.clone(),
            observer,
        )
        .unwrap(),
    );

    let client = ClientEndpoint::new(EndpointConfig::default());
    client.route(["echo"], broker.clone());
    broker.start(client.handler()).unwrap();

    let parameter = Payload::encode(&"x".repeat(1000)).unwrap();
    let error = client
        .call_timeout("echo", parameter, Duration::from_secs(2))
        .await
        .unwrap_err();

    let remote = error.remote().expect("remote error");
    assert_eq!(remote.kind(), RemoteErrorKind::DeliveryFailed);
    assert!(client.facade().is_empty());
    assert!(exchange.posted.lock().is_empty());
    broker.shutdown();
}
