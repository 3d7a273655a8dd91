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


#![doc = include_str!("../../README.md")]
#![allow(clippy::module_inception)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! ## Architecture
//!
//! - **[`transport`]**: brokers moving opaque messages between two named
//!   endpoints
//! - **[`serialization`]**: message encoding and batch framing
//! - **[`invocation`]**: client and server correlation of asynchronous
//!   calls
//! - **[`endpoint`]**: wiring the invocation layer to brokers
//! - **[`observability`]**: the global error sink and traffic counters
//!
//! ## Error Handling
//!
//! Errors form a layered hierarchy under [`AirpcError`]:
//!
//! - [`TransportError`](transport::TransportError): HTTP status, I/O, and
//!   broker lifecycle failures. Brokers report these and keep running.
//! - [`InvocationError`](invocation::InvocationError): configuration errors
//!   (unknown or duplicate methods) and protocol errors (messages that no
//!   table can place).
//! - Application errors: raised by method handlers. They reach the caller
//!   as a [`RemoteError`](invocation::RemoteError) in its terminal event.

pub mod endpoint;
pub mod error;
pub mod invocation;
pub mod observability;
pub mod serialization;
pub mod transport;

pub use error::AirpcError;
pub use observability::{ErrorObserver, log_error};
