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


//! End-to-end tests over real HTTP.
//!
//! A server endpoint sits behind an `axum` mailbox on localhost; the client
//! reaches it through an `HttpBroker` using `reqwest`.

#![cfg(feature = "http")]

use airpc::endpoint::{ClientEndpoint, EndpointConfig, ServerEndpoint};
use airpc::invocation::{
    Envelope, HandlerError, InvocationCallbacks, InvocationId, Payload, Responder, result_fn,
};
use airpc::observability::{ErrorMetrics, ErrorObserver};
use airpc::serialization::PostcardSerializer;
use airpc::transport::{BrokerConfig, HttpBroker, HttpMailbox, MailboxRouter};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;

struct Deployment {
    addr: SocketAddr,
    client: ClientEndpoint,
    broker: Arc<HttpBroker<Envelope>>,
    mailbox: Arc<HttpMailbox<Envelope>>,
    errors: Arc<ErrorMetrics>,
    _server: ServerEndpoint,
}

impl Drop for Deployment {
    fn drop(&mut self) {
        self.broker.shutdown();
        self.mailbox.shutdown();
    }
}

async fn deploy(register: impl FnOnce(&ServerEndpoint)) -> Deployment {
    let observer = ErrorObserver::new();
    let errors = Arc::new(ErrorMetrics::new());
    let sink = errors.clone();
    observer.on_error(move |error| sink.record_error(error));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = BrokerConfig::new("orders", format!("http://{}", addr))
        .with_long_poll(Duration::from_millis(200))
        .with_request_timeout(Duration::from_secs(5))
        .with_worker_count(2);

    let server = ServerEndpoint::new(EndpointConfig::default(), observer.clone());
    register(&server);
    let mailbox = Arc::new(
        HttpMailbox::from_config(&config, PostcardSerializer::default(), observer.clone()).unwrap(),
    );
    mailbox.start(server.attach(mailbox.clone())).unwrap();

    let app = MailboxRouter::new().mailbox(mailbox.clone()).build();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let broker = Arc::new(HttpBroker::new(config, observer).unwrap());
    let client = ClientEndpoint::new(EndpointConfig::default());
    client.route(["echo", "steps"], broker.clone());
    broker.start(client.handler()).unwrap();

    Deployment {
        addr,
        client,
        broker,
        mailbox,
        errors,
        _server: server,
    }
}

fn echo(server: &ServerEndpoint) {
    server
        .register(
            "echo",
            |_id: InvocationId, parameter: Payload, responder: Responder| -> Result<(), HandlerError> {
                responder.finish(parameter);
                Ok(())
            },
        )
        .unwrap();
}

#[tokio::test]
async fn test_call_over_http() {
    let deployment = deploy(echo).await;

    let result = deployment
        .client
        .call_timeout("echo", Payload::encode(&42).unwrap(), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(result.decode::<i32>().unwrap(), 42);
    assert!(deployment.client.facade().is_empty());
    assert!(deployment.broker.metrics().messages_sent() >= 1);
    assert!(deployment.mailbox.metrics().messages_received() >= 1);
    assert_eq!(deployment.errors.total_errors(), 0);
}

#[tokio::test]
async fn test_progress_over_http() {
    let deployment = deploy(|server| {
        server
            .register(
                "steps",
                |_id: InvocationId, _p: Payload, responder: Responder| -> Result<(), HandlerError> {
                    for step in 1..=3 {
                        responder.progress(Payload::encode(&step)?);
                    }
                    responder.finish(Payload::encode("done")?);
                    Ok(())
                },
            )
            .unwrap();
    })
    .await;

    let steps = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = oneshot::channel();
    let seen = steps.clone();
    let callbacks = InvocationCallbacks::new(result_fn(move |outcome| {
        let _ = done_tx.send(outcome);
    }))
    .on_progress(move |step| seen.lock().push(step.decode::<u32>().unwrap()));

    deployment
        .client
        .invoke("steps", callbacks, Payload::null())
        .unwrap();
    let outcome = timeout(Duration::from_secs(10), done_rx)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.unwrap().decode::<String>().unwrap(), "done");
    assert_eq!(steps.lock().as_slice(), &[1, 2, 3]);
}

#[tokio::test]
async fn test_mailbox_status_codes() {
    let deployment = deploy(echo).await;
    let http = reqwest::Client::new();
    let base = format!("http://{}", deployment.addr);

    let unknown = http
        .get(format!("{}/brokers/nobody", base))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 404);

    let garbage = http
        .post(format!("{}/brokers/orders", base))
        .body(vec![0xff, 0xff, 0xff])
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status().as_u16(), 400);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(deployment.errors.transport_errors(), 1);
    assert_eq!(deployment.mailbox.metrics().decode_failures(), 1);
}
