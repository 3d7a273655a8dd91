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

//! Message transport for airpc.
//!
//! A broker moves opaque messages between exactly two named endpoints and
//! presents a full-duplex "send anytime, receive anytime" interface to the
//! layers above, whatever the underlying exchange looks like.
//!
//! - [`Broker`]: the sending half, object safe so it can be stored as a
//!   reply route
//! - [`MessageHandler`]: the receive callback a broker is started with
//! - [`Message`]: what a broker can carry, with an ordering key
//!
//! Implementations:
//!
//! - [`HttpBroker`]: polls and POSTs to a peer over plain HTTP (requires
//!   `http` feature)
//! - [`HttpMailbox`] and [`MailboxRouter`]: the peer an `HttpBroker` talks
//!   to, served by `axum` (requires `http` feature)
//! - [`MemoryBroker`]: an in-process pair for tests and local wiring
//!
//! # Delivery Guarantees
//!
//! Sends are FIFO per broker and at most once: a message whose delivery
//! fails is reported and dropped, never re-sent. Inbound messages sharing an
//! affinity key reach the receive callback in arrival order; messages with
//! different keys may be handled concurrently.
//!
//! # Examples
//!
//! ```rust
//! use airpc::AirpcError;
//! use airpc::observability::ErrorObserver;
//! use airpc::transport::{Broker, MemoryBroker, Message, SharedHandler};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Tick(u64);
//!
//! impl Message for Tick {
//!     fn affinity_key(&self) -> Option<u64> {
//!         Some(0)
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (left, right) = MemoryBroker::<Tick>::pair("left", "right", ErrorObserver::new());
//! let handler: SharedHandler<Tick> = Arc::new(|tick: Tick| -> Result<(), AirpcError> {
//!     println!("tick {}", tick.0);
//!     Ok(())
//! });
//! right.start(handler)?;
//! left.send(Tick(1));
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
#[cfg(feature = "http")]
mod exchange;
#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
mod mailbox;
mod memory;
mod pool;
mod traits;

pub use self::config::{
    BrokerConfig, DEFAULT_DELIVERY_FAILURE_BACKOFF, DEFAULT_IDLE_POLL_DELAY, DEFAULT_LONG_POLL,
    DEFAULT_MAX_BATCH, DEFAULT_RECEIVE_FAILURE_BACKOFF, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_UNEXPECTED_FAILURE_BACKOFF, default_worker_count,
};
pub use self::error::TransportError;
#[cfg(feature = "http")]
pub use self::exchange::{HttpExchange, ReqwestExchange};
#[cfg(feature = "http")]
pub use self::http::HttpBroker;
#[cfg(feature = "http")]
pub use self::mailbox::{HttpMailbox, MailboxRouter};
pub use self::memory::MemoryBroker;
pub use self::pool::{CallbackPanic, WorkerPool};
pub use self::traits::{Broker, FailureCallback, Message, MessageHandler, SharedHandler};
