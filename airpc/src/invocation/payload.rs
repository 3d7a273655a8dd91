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

//! Opaque application values carried by envelopes.

use super::InvocationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque application value.
///
/// The correlation layer never looks inside a payload. Internally it holds
/// the bytes of a JSON document, so it can be carried by any broker
/// serializer while staying self-describing for the application.
///
/// # Examples
///
/// ```rust
/// use airpc::invocation::Payload;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let payload = Payload::encode(&42)?;
/// assert_eq!(payload.as_bytes(), b"42");
/// assert_eq!(payload.decode::<i32>()?, 42);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Encodes a value as a payload.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::Serialization`] if the value cannot be
    /// represented as JSON.
    pub fn encode<T>(value: &T) -> Result<Self, InvocationError>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value)
            .map(Self)
            .map_err(|e| InvocationError::Serialization {
                message: e.to_string(),
            })
    }

    /// Decodes the payload into a value.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::Deserialization`] if the payload does not
    /// hold a `T`.
    pub fn decode<T>(&self) -> Result<T, InvocationError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(&self.0).map_err(|e| InvocationError::Deserialization {
            message: e.to_string(),
        })
    }

    /// Returns the JSON `null` payload.
    #[must_use]
    pub fn null() -> Self {
        Self(b"null".to_vec())
    }

    /// Wraps raw JSON bytes without validating them.
    #[must_use]
    pub fn from_json_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the raw JSON bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the payload and returns its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::null()
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        // Serializing a Value cannot fail.
        Self(serde_json::to_vec(&value).unwrap_or_else(|_| b"null".to_vec()))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}
