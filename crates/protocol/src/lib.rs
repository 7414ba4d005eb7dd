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

//! # Touch Proxy Protocol
//!
//! Binary wire protocol shared with the host application, plus the event
//! channel that queues outbound messages until the host collects them.
//!
//! Every message starts with a big-endian `u32` type tag followed by the
//! payload of that type. See [`messages::MessageType`] for the tag values.

pub mod channel;
pub mod codec;
pub mod fragment;
pub mod messages;

pub use channel::EventChannel;
pub use codec::{decode, encode, encoded_len};
pub use fragment::Reassembler;
pub use messages::*;

/// Protocol result type
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Truncated message: {field} needs {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("Unknown message type: {0}")]
    UnknownType(u32),

    #[error("Invalid UTF-8 in {field}")]
    InvalidText { field: &'static str },

    #[error("{field} is {length} bytes, limit is {limit}")]
    PayloadTooLarge {
        field: &'static str,
        length: usize,
        limit: usize,
    },

    #[error("Buffer overflow: message needs {needed} bytes, buffer holds {capacity}")]
    BufferOverflow { needed: usize, capacity: usize },

    #[error("Reassembly overflow: {length} bytes exceeds limit of {limit}")]
    ReassemblyOverflow { length: usize, limit: usize },
}

/// Largest payload carried by a single `Large` fragment
pub const MAX_FRAGMENT_PAYLOAD: usize = 240;

/// Bytes a `Large` frame adds around its payload: tag, length and end flag
pub const LARGE_FRAME_OVERHEAD: usize = 6;

/// Smallest fragment threshold that still leaves room for one payload byte
pub const MIN_FRAGMENT_THRESHOLD: usize = LARGE_FRAME_OVERHEAD + 1;

/// Largest capability name, bounded by its one-byte length prefix
pub const MAX_CAPABILITY_NAME: usize = u8::MAX as usize;

/// Default cap on a reassembled `Large` message
pub const DEFAULT_MAX_REASSEMBLY: usize = 64 * 1024;
