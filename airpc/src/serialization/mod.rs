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

//! Serialization layer for AIRPC.
//!
//! Brokers never look inside the messages they carry: they hand each message
//! to a [`Serializer`] on the way out and get bytes back on the way in. This
//! module provides the pluggable serializer abstraction and the batch framing
//! used by HTTP poll responses.
//!
//! # Serialization Backends
//!
//! - [`PostcardSerializer`] (default): compact binary format, used on the wire
//!   unless configured otherwise.
//! - [`JsonSerializer`] (requires the `json` feature): human readable, useful
//!   when inspecting traffic with an HTTP proxy.
//!
//! # Batch Framing
//!
//! A POST body carries exactly one serialized message and needs no framing.
//! A poll (GET) response carries any number of messages:
//!
//! ```text
//! +---------------+------------------+-------------+------------------+-----
//! | Count (u32 BE)| Length 1 (u32 BE)| Payload 1   | Length 2 (u32 BE)| ...
//! +---------------+------------------+-------------+------------------+-----
//! ```
//!
//! See [`framing`] for the encoder and decoder.
//!
//! # Examples
//!
//! ```rust
//! use airpc::serialization::{PostcardSerializer, Serializer};
//! use airpc::serialization::framing::{decode_batch, encode_batch};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let serializer = PostcardSerializer::default();
//! let frames = vec![serializer.serialize(&1u32)?, serializer.serialize(&2u32)?];
//!
//! let body = encode_batch(&frames)?;
//! let decoded = decode_batch(&body)?;
//! assert_eq!(decoded.len(), 2);
//! let second: u32 = serializer.deserialize(decoded[1])?;
//! assert_eq!(second, 2);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod framing;
#[cfg(feature = "json")]
mod json;
mod postcard;
mod traits;

pub use self::error::{DeserializationError, SerializationError};
#[cfg(feature = "json")]
pub use self::json::JsonSerializer;
pub use self::postcard::PostcardSerializer;
pub use self::traits::Serializer;
