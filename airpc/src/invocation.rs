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


//! Invocation correlation for airpc.
//!
//! This layer matches asynchronous messages to the call that caused them.
//! Every message of one call carries the same [`InvocationId`], generated
//! by the client when the call starts.
//!
//! # Server side
//!
//! - [`MethodRegistry`]: method name to [`MethodHandler`], plus the
//!   singleton [`CancelHandler`] and [`ResponseHandler`] slots
//! - [`ServerFacade`]: the server correlation table, and the sink handlers
//!   write interim and terminal events into through a [`Responder`]
//! - [`PendingAnswers`] and [`CancellationRegistry`]: ready-made response
//!   and cancel handlers
//!
//! # Client side
//!
//! - [`MethodDirectory`]: method name to the route of the server hosting it
//! - [`ClientFacade`]: the client correlation table; starts invocations and
//!   routes inbound events to per-invocation callbacks
//! - [`InvocationCallbacks`]: the result, progress, and question callbacks
//!   of one call
//!
//! # Lifecycle
//!
//! ```text
//! client                                   server
//!   invoke ── MethodInvocation ──────────▶ register_invocation, handler.invoke
//!   progress ◀─────────── InterimResponse ─ responder.progress
//!   question ◀──────────── InterimRequest ─ responder.ask
//!   answer ── Response ──────────────────▶ response handler
//!   result ◀──────── Finished / Exception ─ responder.finish / fail
//! ```
//!
//! A terminal message removes the invocation from both tables. Nothing
//! after it reaches a user callback.

mod callback;
mod cancellation;
mod client;
mod directory;
mod envelope;
mod error;
mod id;
mod payload;
mod pending;
mod registry;
mod server;

use crate::transport::Broker;
use std::sync::Arc;

pub use callback::{
    AnswerSink, CancelHook, InvocationCallbacks, ProgressCallback, QuestionCallback,
    ResultCallback, result_fn,
};
pub use cancellation::CancellationRegistry;
pub use client::{CallError, ClientFacade, InvocationHandle};
pub use directory::MethodDirectory;
pub use envelope::{Envelope, MessageKind, RemoteError, RemoteErrorKind};
pub use error::InvocationError;
pub use id::{InvocationId, RequestId};
pub use payload::Payload;
pub use pending::PendingAnswers;
pub use registry::{
    CancelHandler, HandlerError, MethodHandler, MethodRegistry, ResponseHandler, async_method,
};
pub use server::{DEFAULT_LEAK_WARNING_THRESHOLD, Responder, ServerFacade};

/// The place messages for one invocation are sent back to.
///
/// On the server this is the broker a `MethodInvocation` arrived on; on the
/// client it is the broker that reaches the server hosting a method.
pub type ReplyRoute = Arc<dyn Broker<Envelope>>;
