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


//! Encode and decode failures.
//!
//! Both types carry a short description and, when a codec produced one, the
//! codec's own error as the source.

use thiserror::Error;

type Cause = Box<dyn std::error::Error + Send + Sync>;

/// A value could not be encoded, or a frame could not be built.
#[derive(Debug, Error)]
#[error("encode failed: {message}")]
pub struct SerializationError {
    message: String,
    #[source]
    cause: Option<Cause>,
}

/// Bytes could not be decoded, or a batch was malformed.
#[derive(Debug, Error)]
#[error("decode failed: {message}")]
pub struct DeserializationError {
    message: String,
    #[source]
    cause: Option<Cause>,
}

macro_rules! codec_error_constructors {
    ($ty:ident) => {
        impl $ty {
            /// Creates an error with no underlying cause.
            pub fn new(message: impl Into<String>) -> Self {
                Self {
                    message: message.into(),
                    cause: None,
                }
            }

            /// Creates an error caused by a codec failure.
            pub fn with_source(
                message: impl Into<String>,
                cause: impl std::error::Error + Send + Sync + 'static,
            ) -> Self {
                Self {
                    message: message.into(),
                    cause: Some(Box::new(cause)),
                }
            }

            /// Returns the description without the cause.
            pub fn message(&self) -> &str {
                &self.message
            }
        }
    };
}

codec_error_constructors!(SerializationError);
codec_error_constructors!(DeserializationError);

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source("invalid JSON value", err)
    }
}

impl From<serde_json::Error> for DeserializationError {
    fn from(err: serde_json::Error) -> Self {
        let message = format!("invalid JSON at line {} column {}", err.line(), err.column());
        Self::with_source(message, err)
    }
}
