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

//! Outbound event channel
//!
//! Producers on any thread push messages; a single consumer, normally the
//! host once per frame, polls them back out as encoded bytes. The queue is
//! unbounded. A stalled consumer makes it grow, which callers can watch via
//! [`EventChannel::len`] and [`EventChannel::high_water_mark`].

use crate::codec::encode;
use crate::fragment::fragment_bytes_within;
use crate::messages::Message;
use crate::{ProtocolError, ProtocolResult, LARGE_FRAME_OVERHEAD, MIN_FRAGMENT_THRESHOLD};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use touch_proxy_core::hex_string;
use tracing::trace;

#[derive(Debug, Default)]
struct ChannelState {
    messages: VecDeque<Message>,
    // Encoded frames that must go out before the next message.
    frames: VecDeque<Vec<u8>>,
    high_water_mark: usize,
    pushed: u64,
}

/// Shared FIFO of outbound messages
#[derive(Debug, Clone, Default)]
pub struct EventChannel {
    state: Arc<Mutex<ChannelState>>,
    fragment_threshold: Option<usize>,
}

impl EventChannel {
    pub fn new() -> Self {
        EventChannel::default()
    }

    /// Messages whose encoding exceeds `threshold` bytes are handed out as
    /// `Large` fragments over consecutive polls. Every polled frame then fits
    /// in `threshold` bytes; values below [`MIN_FRAGMENT_THRESHOLD`] are raised
    /// to it.
    pub fn with_fragment_threshold(mut self, threshold: usize) -> Self {
        self.fragment_threshold = Some(threshold.max(MIN_FRAGMENT_THRESHOLD));
        self
    }

    pub fn fragment_threshold(&self) -> Option<usize> {
        self.fragment_threshold
    }

    /// Append a message to the tail
    pub fn push(&self, message: Message) {
        let mut state = self.state.lock();
        trace!("Queueing {:?} message", message.message_type());
        state.messages.push_back(message);
        state.pushed += 1;
        let depth = state.messages.len() + state.frames.len();
        if depth > state.high_water_mark {
            state.high_water_mark = depth;
        }
    }

    /// Remove the head and return its encoding
    pub fn poll(&self) -> Option<Vec<u8>> {
        let frame = self.next_frame()?;
        trace!("Polled frame {}", hex_string(&frame));
        Some(frame)
    }

    /// Copy the head into `buffer`, returning the number of bytes written.
    ///
    /// An empty channel writes nothing and returns `Ok(0)`. If the head does
    /// not fit, it stays queued and `BufferOverflow` is returned.
    pub fn poll_into(&self, buffer: &mut [u8]) -> ProtocolResult<usize> {
        let Some(frame) = self.next_frame() else {
            return Ok(0);
        };
        if frame.len() > buffer.len() {
            let needed = frame.len();
            self.state.lock().frames.push_front(frame);
            return Err(ProtocolError::BufferOverflow {
                needed,
                capacity: buffer.len(),
            });
        }
        buffer[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }

    fn next_frame(&self) -> Option<Vec<u8>> {
        let message = {
            let mut state = self.state.lock();
            if let Some(frame) = state.frames.pop_front() {
                return Some(frame);
            }
            state.messages.pop_front()?
        };

        let encoded = encode(&message);
        match self.fragment_threshold {
            Some(threshold) if encoded.len() > threshold => {
                let mut frames = fragment_bytes_within(&encoded, threshold - LARGE_FRAME_OVERHEAD)
                    .into_iter()
                    .map(|fragment| encode(&Message::Large(fragment)));
                let first = frames.next();
                let mut state = self.state.lock();
                // Only the consumer touches `frames`, so nothing slipped in
                // between the two lock scopes.
                for (offset, frame) in frames.enumerate() {
                    state.frames.insert(offset, frame);
                }
                first
            }
            _ => Some(encoded),
        }
    }

    /// Number of queued messages and pending fragments
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.messages.len() + state.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deepest the queue has been since creation
    pub fn high_water_mark(&self) -> usize {
        self.state.lock().high_water_mark
    }

    /// Total messages pushed since creation
    pub fn total_pushed(&self) -> u64 {
        self.state.lock().pushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::fragment::Reassembler;
    use touch_proxy_core::*;

    #[test]
    fn test_fifo_order() {
        let channel = EventChannel::new();
        channel.push(Message::Remove { id: 1 });
        channel.push(Message::Remove { id: 2 });
        channel.push(Message::Remove { id: 3 });

        for id in 1..=3 {
            let bytes = channel.poll().unwrap();
            assert_eq!(decode(&bytes).unwrap(), Message::Remove { id });
        }
        assert!(channel.poll().is_none());
    }

    #[test]
    fn test_empty_poll_consumes_nothing() {
        let channel = EventChannel::new();
        for _ in 0..3 {
            assert!(channel.poll().is_none());
        }
        assert!(channel.is_empty());

        let mut buffer = [0u8; 16];
        assert_eq!(channel.poll_into(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_sequential_producers_on_different_threads() {
        let channel = EventChannel::new();
        for id in [10, 20, 30] {
            let producer = channel.clone();
            std::thread::spawn(move || producer.push(Message::Remove { id }))
                .join()
                .unwrap();
        }

        let ids: Vec<Message> = std::iter::from_fn(|| channel.poll())
            .map(|bytes| decode(&bytes).unwrap())
            .collect();
        assert_eq!(
            ids,
            vec![
                Message::Remove { id: 10 },
                Message::Remove { id: 20 },
                Message::Remove { id: 30 },
            ]
        );
    }

    #[test]
    fn test_concurrent_producers_keep_per_producer_order() {
        let channel = EventChannel::new();
        std::thread::scope(|scope| {
            for producer in 0..4u32 {
                let channel = &channel;
                scope.spawn(move || {
                    for seq in 0..100u32 {
                        channel.push(Message::Remove {
                            id: producer * 1000 + seq,
                        });
                    }
                });
            }
        });

        assert_eq!(channel.len(), 400);
        assert_eq!(channel.total_pushed(), 400);

        let mut last_seen = [None::<u32>; 4];
        while let Some(bytes) = channel.poll() {
            let Message::Remove { id } = decode(&bytes).unwrap() else {
                panic!("unexpected message");
            };
            let producer = (id / 1000) as usize;
            let seq = id % 1000;
            if let Some(previous) = last_seen[producer] {
                assert!(seq > previous);
            }
            last_seen[producer] = Some(seq);
        }
        assert!(last_seen.iter().all(|seen| *seen == Some(99)));
    }

    #[test]
    fn test_high_water_mark_tracks_backlog() {
        let channel = EventChannel::new();
        for id in 0..5 {
            channel.push(Message::Remove { id });
        }
        while channel.poll().is_some() {}
        channel.push(Message::Clear);

        assert_eq!(channel.len(), 1);
        assert_eq!(channel.high_water_mark(), 5);
    }

    #[test]
    fn test_poll_into_overflow_keeps_message() {
        let channel = EventChannel::new();
        channel.push(Message::Add { id: 1, x: 0.5, y: 0.5 });
        channel.push(Message::Clear);

        let mut small = [0u8; 8];
        assert_eq!(
            channel.poll_into(&mut small),
            Err(ProtocolError::BufferOverflow {
                needed: 16,
                capacity: 8
            })
        );
        assert_eq!(channel.len(), 2);

        let mut buffer = [0u8; 64];
        let written = channel.poll_into(&mut buffer).unwrap();
        assert_eq!(
            decode(&buffer[..written]).unwrap(),
            Message::Add { id: 1, x: 0.5, y: 0.5 }
        );
        let written = channel.poll_into(&mut buffer).unwrap();
        assert_eq!(decode(&buffer[..written]).unwrap(), Message::Clear);
    }

    #[test]
    fn test_fragment_threshold_splits_long_messages() {
        let channel = EventChannel::new().with_fragment_threshold(256);
        let status = Message::InputStatus(Some(TextStatus::with_caret_at_end("y".repeat(500))));
        channel.push(status.clone());
        channel.push(Message::Clear);

        let mut reassembler = Reassembler::default();
        let mut polls = 0;
        let whole = loop {
            let bytes = channel.poll().unwrap();
            assert!(bytes.len() <= 256);
            polls += 1;
            let Message::Large(fragment) = decode(&bytes).unwrap() else {
                panic!("expected fragment");
            };
            if let Some(message) = reassembler.push(&fragment).unwrap() {
                break message;
            }
        };

        assert_eq!(whole, status);
        assert_eq!(polls, 3);
        assert_eq!(decode(&channel.poll().unwrap()).unwrap(), Message::Clear);
    }

    #[test]
    fn test_small_threshold_frames_fit_poll_buffer() {
        let channel = EventChannel::new().with_fragment_threshold(64);
        let status = Message::InputStatus(Some(TextStatus::with_caret_at_end("y".repeat(80))));
        channel.push(status.clone());

        let mut buffer = [0u8; 64];
        let mut reassembler = Reassembler::default();
        let whole = loop {
            let written = channel.poll_into(&mut buffer).unwrap();
            assert!(written > 0 && written <= 64);
            let Message::Large(fragment) = decode(&buffer[..written]).unwrap() else {
                panic!("expected fragment");
            };
            if let Some(message) = reassembler.push(&fragment).unwrap() {
                break message;
            }
        };

        assert_eq!(whole, status);
        assert!(channel.is_empty());
    }

    #[test]
    fn test_threshold_is_raised_to_minimum() {
        let channel = EventChannel::new().with_fragment_threshold(1);
        assert_eq!(channel.fragment_threshold(), Some(MIN_FRAGMENT_THRESHOLD));

        channel.push(Message::Remove { id: 9 });
        let frames: Vec<Vec<u8>> = std::iter::from_fn(|| channel.poll()).collect();
        assert_eq!(frames.len(), 8);
        assert!(frames.iter().all(|frame| frame.len() <= MIN_FRAGMENT_THRESHOLD));
    }

    #[test]
    fn test_short_messages_skip_fragmentation() {
        let channel = EventChannel::new().with_fragment_threshold(256);
        channel.push(Message::KeyboardShow { show: true });
        assert_eq!(
            decode(&channel.poll().unwrap()).unwrap(),
            Message::KeyboardShow { show: true }
        );
    }
}
