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


//! Endpoint layer for airpc.
//!
//! An endpoint connects the invocation layer to a broker:
//!
//! - **[`ServerEndpoint`]**: a [`MethodRegistry`](crate::invocation::MethodRegistry)
//!   and [`ServerFacade`](crate::invocation::ServerFacade); its
//!   [`attach`](ServerEndpoint::attach) callback dispatches inbound calls
//!   and uses the broker as reply route
//! - **[`ClientEndpoint`]**: a [`MethodDirectory`](crate::invocation::MethodDirectory)
//!   and [`ClientFacade`](crate::invocation::ClientFacade); its
//!   [`handler`](ClientEndpoint::handler) routes replies to callbacks
//! - **[`EndpointConfig`]**: leak warning threshold and advisory timeout
//!
//! Everything is passed in explicitly; there is no process-wide state, so
//! any number of endpoints and brokers can live in one process.
//!
//! # Wiring
//!
//! ```text
//! ClientEndpoint ── handler ── client broker ═══ server broker ── attach ── ServerEndpoint
//!       │                          ▲                   ▲                          │
//!       └── directory routes ──────┘                   └──────── reply route ─────┘
//! ```

mod client;
mod config;
mod server;

pub use client::ClientEndpoint;
pub use config::{DEFAULT_INVOCATION_TIMEOUT, EndpointConfig};
pub use server::ServerEndpoint;
