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


//! Postcard wire format.

use crate::serialization::{DeserializationError, SerializationError, Serializer};

/// Compact binary serializer backed by `postcard`.
///
/// The default wire format for brokers. A size limit, when set, applies in
/// both directions: oversized messages are refused before they are queued
/// and before they are decoded.
///
/// # Examples
///
/// ```rust
/// use airpc::serialization::{PostcardSerializer, Serializer};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let serializer = PostcardSerializer::new().with_max_size(1024);
/// let bytes = serializer.serialize("hello")?;
/// let text: String = serializer.deserialize(&bytes)?;
/// assert_eq!(text, "hello");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct PostcardSerializer {
    max_size: Option<usize>,
}

impl PostcardSerializer {
    /// Creates a serializer with no size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits encoded messages to `max_size` bytes.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Returns the configured size limit.
    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    fn oversized(&self, len: usize) -> Option<String> {
        self.max_size
            .filter(|&limit| len > limit)
            .map(|limit| format!("{} bytes is over the {} byte limit", len, limit))
    }
}

impl Serializer for PostcardSerializer {
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
    where
        T: serde::Serialize + ?Sized,
    {
        let bytes = postcard::to_allocvec(value)
            .map_err(|e| SerializationError::with_source("postcard could not encode value", e))?;
        match self.oversized(bytes.len()) {
            Some(reason) => Err(SerializationError::new(reason)),
            None => Ok(bytes),
        }
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DeserializationError>
    where
        T: serde::de::DeserializeOwned,
    {
        if let Some(reason) = self.oversized(bytes.len()) {
            return Err(DeserializationError::new(reason));
        }
        postcard::from_bytes(bytes)
            .map_err(|e| DeserializationError::with_source("postcard could not decode value", e))
    }

    fn name(&self) -> &'static str {
        "postcard"
    }

    fn content_type(&self) -> &'static str {
        "application/x-postcard"
    }
}
