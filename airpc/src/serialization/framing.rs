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

//! Batch framing for poll responses.
//!
//! A poll response body carries a message count followed by that many
//! length-prefixed frames. Each frame holds one serialized message.
//!
//! # Protocol
//!
//! ```text
//! +-----------------+-------------------+-------------------+-----
//! | Count (4 bytes) | Length (4 bytes)  | Payload (N bytes) | ...
//! +-----------------+-------------------+-------------------+-----
//! ```
//!
//! - **Count**: u32 in big-endian format, number of frames that follow
//! - **Length**: u32 in big-endian format, payload size of one frame
//! - **Payload**: one serialized message
//!
//! Decoding borrows the frames from the body so that each message can be
//! deserialized on its own. A single undecodable message therefore does not
//! cost the rest of the batch; a malformed frame structure does.
//!
//! # Examples
//!
//! ```rust
//! use airpc::serialization::framing::{decode_batch, encode_batch};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let body = encode_batch(&[b"alpha".to_vec(), b"beta".to_vec()])?;
//! assert_eq!(&body[0..4], &2u32.to_be_bytes());
//!
//! let frames = decode_batch(&body)?;
//! assert_eq!(frames, vec![&b"alpha"[..], &b"beta"[..]]);
//! # Ok(())
//! # }
//! ```

use crate::serialization::{DeserializationError, SerializationError};

/// Maximum size of a single frame payload (16 MB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Size of the length prefix in front of every frame.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Size of the frame count at the start of a batch.
pub const BATCH_HEADER_SIZE: usize = 4;

/// Appends one length-prefixed frame to `buffer`.
///
/// # Errors
///
/// Returns a [`SerializationError`] if the payload exceeds [`MAX_FRAME_SIZE`].
pub fn write_frame(buffer: &mut Vec<u8>, payload: &[u8]) -> Result<(), SerializationError> {
    let len = payload.len();
    if len > MAX_FRAME_SIZE as usize {
        return Err(SerializationError::new(format!(
            "Frame size {} exceeds maximum allowed size {}",
            len, MAX_FRAME_SIZE
        )));
    }

    buffer.extend_from_slice(&(len as u32).to_be_bytes());
    buffer.extend_from_slice(payload);
    Ok(())
}

/// Encodes a batch of serialized messages into one response body.
///
/// An empty slice encodes to the four byte count `0`, which is how an idle
/// poll is answered.
///
/// # Errors
///
/// Returns a [`SerializationError`] if any frame exceeds [`MAX_FRAME_SIZE`]
/// or the batch holds more than `u32::MAX` frames.
pub fn encode_batch<F>(frames: &[F]) -> Result<Vec<u8>, SerializationError>
where
    F: AsRef<[u8]>,
{
    let count = u32::try_from(frames.len()).map_err(|_| {
        SerializationError::new(format!("Batch of {} frames is too large", frames.len()))
    })?;

    let payload_size: usize = frames.iter().map(|f| f.as_ref().len()).sum();
    let mut buffer =
        Vec::with_capacity(BATCH_HEADER_SIZE + frames.len() * FRAME_HEADER_SIZE + payload_size);
    buffer.extend_from_slice(&count.to_be_bytes());

    for frame in frames {
        write_frame(&mut buffer, frame.as_ref())?;
    }

    Ok(buffer)
}

/// Splits a response body into its frames, in wire order.
///
/// # Errors
///
/// Returns a [`DeserializationError`] if the body is truncated, declares a
/// frame larger than [`MAX_FRAME_SIZE`], or has bytes left over after the
/// declared number of frames.
pub fn decode_batch(body: &[u8]) -> Result<Vec<&[u8]>, DeserializationError> {
    let (count, mut rest) = read_u32(body, "batch count")?;

    // Every frame needs at least its header, which bounds the allocation.
    let capacity = (count as usize).min(rest.len() / FRAME_HEADER_SIZE);
    let mut frames = Vec::with_capacity(capacity);

    for index in 0..count {
        let (len, after_len) = read_u32(rest, "frame length")?;
        if len > MAX_FRAME_SIZE {
            return Err(DeserializationError::new(format!(
                "Frame {} size {} exceeds maximum allowed size {}",
                index, len, MAX_FRAME_SIZE
            )));
        }
        let len = len as usize;
        if after_len.len() < len {
            return Err(DeserializationError::new(format!(
                "Frame {} truncated: expected {} bytes, found {}",
                index,
                len,
                after_len.len()
            )));
        }
        let (payload, remaining) = after_len.split_at(len);
        frames.push(payload);
        rest = remaining;
    }

    if !rest.is_empty() {
        return Err(DeserializationError::new(format!(
            "{} trailing bytes after {} frames",
            rest.len(),
            count
        )));
    }

    Ok(frames)
}

fn read_u32<'a>(bytes: &'a [u8], what: &str) -> Result<(u32, &'a [u8]), DeserializationError> {
    if bytes.len() < 4 {
        return Err(DeserializationError::new(format!(
            "Truncated {}: expected 4 bytes, found {}",
            what,
            bytes.len()
        )));
    }
    let (head, rest) = bytes.split_at(4);
    let value = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
    Ok((value, rest))
}
