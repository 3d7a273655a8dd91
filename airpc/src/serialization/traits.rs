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

//! Serialization trait definitions.

use crate::serialization::{DeserializationError, SerializationError};

/// Converts broker messages to and from bytes.
///
/// A broker owns one serializer and uses it for every message in both
/// directions, so both peers of a broker pair must be configured with the
/// same format.
///
/// # Thread Safety
///
/// Serializers are shared by the sender loop, the receiver loop, and HTTP
/// request handlers, so they must be `Send + Sync + 'static`.
///
/// # Examples
///
/// ```rust
/// use airpc::serialization::{PostcardSerializer, Serializer};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Debug, PartialEq)]
/// struct Ping {
///     seq: u32,
/// }
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let serializer = PostcardSerializer::default();
/// let bytes = serializer.serialize(&Ping { seq: 7 })?;
/// let decoded: Ping = serializer.deserialize(&bytes)?;
/// assert_eq!(decoded, Ping { seq: 7 });
/// assert_eq!(serializer.content_type(), "application/x-postcard");
/// # Ok(())
/// # }
/// ```
pub trait Serializer: Send + Sync + 'static {
    /// Serializes a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`SerializationError`] if the value cannot be represented in
    /// this format.
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
    where
        T: serde::Serialize + ?Sized;

    /// Deserializes bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns a [`DeserializationError`] if the bytes are corrupt, truncated,
    /// or were produced by a different format.
    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DeserializationError>
    where
        T: serde::de::DeserializeOwned;

    /// Returns a stable name for this format, used in logs.
    fn name(&self) -> &'static str;

    /// Returns the HTTP `Content-Type` sent with serialized bodies.
    fn content_type(&self) -> &'static str {
        "application/octet-stream"
    }
}
