// Copyright 2024 Touch Proxy Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Splitting long messages into `Large` fragments and joining them back
//!
//! A wrapped message is the plain encoding of the inner message, cut into
//! chunks of at most [`MAX_FRAGMENT_PAYLOAD`] bytes. The last chunk carries the
//! end flag. The receiver appends payloads until it sees that flag and then
//! decodes the buffer as a single message.

use crate::codec::{decode, encode};
use crate::messages::{Fragment, Message};
use crate::{ProtocolError, ProtocolResult, DEFAULT_MAX_REASSEMBLY, MAX_FRAGMENT_PAYLOAD};
use tracing::{debug, warn};

/// Cut an encoded message into fragments
pub fn fragment_bytes(encoded: &[u8]) -> Vec<Fragment> {
    fragment_bytes_within(encoded, MAX_FRAGMENT_PAYLOAD)
}

/// Cut an encoded message into fragments whose payload is at most
/// `chunk_size` bytes, itself capped at [`MAX_FRAGMENT_PAYLOAD`]
pub fn fragment_bytes_within(encoded: &[u8], chunk_size: usize) -> Vec<Fragment> {
    let chunk_size = chunk_size.clamp(1, MAX_FRAGMENT_PAYLOAD);
    if encoded.is_empty() {
        return vec![Fragment::from_chunk(&[], true)];
    }
    let count = encoded.len().div_ceil(chunk_size);
    encoded
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, chunk)| Fragment::from_chunk(chunk, index + 1 == count))
        .collect()
}

/// Wrap a message into a sequence of `Large` messages
pub fn fragment(message: &Message) -> Vec<Message> {
    fragment_bytes(&encode(message))
        .into_iter()
        .map(Message::Large)
        .collect()
}

/// Collects inbound fragments until a whole message is available
#[derive(Debug)]
pub struct Reassembler {
    buffer: Vec<u8>,
    max_size: usize,
}

impl Reassembler {
    pub fn new(max_size: usize) -> Self {
        Reassembler {
            buffer: Vec::new(),
            max_size,
        }
    }

    /// Feed one fragment.
    ///
    /// Returns the inner message once the end fragment arrives. The partial
    /// buffer is dropped on any error so the next fragment starts fresh.
    pub fn push(&mut self, fragment: &Fragment) -> ProtocolResult<Option<Message>> {
        let length = self.buffer.len() + fragment.payload().len();
        if length > self.max_size {
            warn!("Dropping {} bytes of partial large message", self.buffer.len());
            self.buffer.clear();
            return Err(ProtocolError::ReassemblyOverflow {
                length,
                limit: self.max_size,
            });
        }

        self.buffer.extend_from_slice(fragment.payload());
        if !fragment.is_end() {
            return Ok(None);
        }

        let buffer = std::mem::take(&mut self.buffer);
        debug!("Reassembled large message of {} bytes", buffer.len());
        decode(&buffer).map(Some)
    }

    /// Bytes waiting for the end fragment
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REASSEMBLY)
    }
}
