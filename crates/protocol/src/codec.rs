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

//! Binary encoding and decoding of protocol messages
//!
//! Integers are big-endian. Floats travel as their IEEE-754 bit pattern in
//! big-endian order, so decoding reinterprets the bits instead of converting
//! the value.

use crate::messages::{CapabilityFlag, Fragment, Message, MessageType};
use crate::{ProtocolError, ProtocolResult};
use touch_proxy_core::*;

/// Bounds-checked cursor over an encoded message
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        WireReader { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Take exactly `count` bytes or fail without advancing
    pub fn read_bytes(&mut self, count: usize, field: &'static str) -> ProtocolResult<&'a [u8]> {
        if self.remaining() < count {
            return Err(ProtocolError::Truncated {
                field,
                needed: count,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    pub fn read_u8(&mut self, field: &'static str) -> ProtocolResult<u8> {
        Ok(self.read_bytes(1, field)?[0])
    }

    pub fn read_bool(&mut self, field: &'static str) -> ProtocolResult<bool> {
        Ok(self.read_u8(field)? != 0)
    }

    pub fn read_u32(&mut self, field: &'static str) -> ProtocolResult<u32> {
        let bytes = self.read_bytes(4, field)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f32(&mut self, field: &'static str) -> ProtocolResult<f32> {
        Ok(f32::from_bits(self.read_u32(field)?))
    }

    pub fn read_string(&mut self, length: usize, field: &'static str) -> ProtocolResult<String> {
        let bytes = self.read_bytes(length, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidText { field })
    }

    fn read_rect(&mut self) -> ProtocolResult<FloatRect> {
        let left = self.read_f32("rect left")?;
        let top = self.read_f32("rect top")?;
        let width = self.read_f32("rect width")?;
        let height = self.read_f32("rect height")?;
        Ok(FloatRect::new(left, top, width, height))
    }
}

/// Append-only encoder
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        WireWriter::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        WireWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_f32(&mut self, value: f32) {
        self.put_u32(value.to_bits());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn put_offset(&mut self, value: usize) {
        self.put_u32(u32::try_from(value).unwrap_or(u32::MAX));
    }

    fn put_rect(&mut self, rect: &Option<FloatRect>) {
        match rect {
            Some(rect) => {
                self.put_bool(true);
                self.put_f32(rect.left);
                self.put_f32(rect.top);
                self.put_f32(rect.width);
                self.put_f32(rect.height);
            }
            None => self.put_bool(false),
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Exact size of the encoded form of `message`
pub fn encoded_len(message: &Message) -> usize {
    let payload = match message {
        Message::Add { .. } => 12,
        Message::Remove { .. } | Message::Vibrate { .. } => 4,
        Message::Clear | Message::Initialize => 0,
        Message::Capability(flag) => 2 + flag.name().len(),
        Message::Large(fragment) => 2 + fragment.payload().len(),
        Message::InputStatus(None) => 1,
        Message::InputStatus(Some(status)) => 1 + 4 + status.text.len() + 16 + 1,
        Message::KeyboardShow { .. } => 1,
        Message::InputCursor(rect) | Message::InputArea(rect) => {
            if rect.is_some() {
                17
            } else {
                1
            }
        }
    };
    4 + payload
}

/// Encode a message into a freshly sized buffer
pub fn encode(message: &Message) -> Vec<u8> {
    let mut writer = WireWriter::with_capacity(encoded_len(message));
    write_message(&mut writer, message);
    writer.into_inner()
}

fn write_message(writer: &mut WireWriter, message: &Message) {
    writer.put_u32(message.message_type().tag());

    match message {
        Message::Add { id, x, y } => {
            writer.put_u32(*id);
            writer.put_f32(*x);
            writer.put_f32(*y);
        }
        Message::Remove { id } => writer.put_u32(*id),
        Message::Clear | Message::Initialize => {}
        Message::Vibrate { kind } => writer.put_u32(kind.to_raw() as u32),
        Message::Capability(flag) => {
            // Name length is bounded by CapabilityFlag construction.
            writer.put_u8(flag.name().len() as u8);
            writer.put_bytes(flag.name().as_bytes());
            writer.put_bool(flag.enabled());
        }
        Message::Large(fragment) => {
            writer.put_u8(fragment.payload().len() as u8);
            writer.put_bytes(fragment.payload());
            writer.put_bool(fragment.is_end());
        }
        Message::InputStatus(None) => writer.put_bool(false),
        Message::InputStatus(Some(status)) => {
            writer.put_bool(true);
            writer.put_offset(status.text.len());
            writer.put_bytes(status.text.as_bytes());
            writer.put_offset(status.composition.start);
            writer.put_offset(status.composition.length);
            writer.put_offset(status.selection.start);
            writer.put_offset(status.selection.length);
            writer.put_bool(status.selection_left);
        }
        Message::KeyboardShow { show } => writer.put_bool(*show),
        Message::InputCursor(rect) | Message::InputArea(rect) => writer.put_rect(rect),
    }
}

/// Decode one message from the start of `bytes`.
///
/// Trailing bytes after a complete message are ignored.
pub fn decode(bytes: &[u8]) -> ProtocolResult<Message> {
    let mut reader = WireReader::new(bytes);
    let message_type = MessageType::try_from(reader.read_u32("message type")?)?;

    let message = match message_type {
        MessageType::Add => {
            let id = reader.read_u32("pointer id")?;
            let x = reader.read_f32("pointer x")?;
            let y = reader.read_f32("pointer y")?;
            Message::Add { id, x, y }
        }
        MessageType::Remove => Message::Remove {
            id: reader.read_u32("pointer id")?,
        },
        MessageType::Clear => Message::Clear,
        MessageType::Initialize => Message::Initialize,
        MessageType::Vibrate => Message::Vibrate {
            kind: VibrateKind::from_raw(reader.read_u32("vibrate kind")? as i32),
        },
        MessageType::Capability => {
            let length = reader.read_u8("capability name length")? as usize;
            let name = reader.read_string(length, "capability name")?;
            let enabled = reader.read_bool("capability enabled")?;
            Message::Capability(CapabilityFlag::new(name, enabled)?)
        }
        MessageType::Large => {
            let length = reader.read_u8("fragment length")? as usize;
            let payload = reader.read_bytes(length, "fragment payload")?.to_vec();
            let end = reader.read_bool("fragment end")?;
            Message::Large(Fragment::new(payload, end)?)
        }
        MessageType::InputStatus => {
            if reader.read_bool("has status")? {
                Message::InputStatus(Some(read_status(&mut reader)?))
            } else {
                Message::InputStatus(None)
            }
        }
        MessageType::KeyboardShow => Message::KeyboardShow {
            show: reader.read_bool("keyboard show")?,
        },
        MessageType::InputCursor => Message::InputCursor(read_optional_rect(&mut reader, "has cursor rect")?),
        MessageType::InputArea => Message::InputArea(read_optional_rect(&mut reader, "has area rect")?),
    };

    Ok(message)
}

fn read_status(reader: &mut WireReader<'_>) -> ProtocolResult<TextStatus> {
    let text_length = reader.read_u32("text length")? as usize;
    let text = reader.read_string(text_length, "text")?;
    let composition_start = reader.read_u32("composition start")? as usize;
    let composition_length = reader.read_u32("composition length")? as usize;
    let selection_start = reader.read_u32("selection start")? as usize;
    let selection_length = reader.read_u32("selection length")? as usize;
    let selection_left = reader.read_bool("selection left")?;

    Ok(TextStatus {
        text,
        composition: TextRange::new(composition_start, composition_length),
        selection: TextRange::new(selection_start, selection_length),
        selection_left,
    })
}

fn read_optional_rect(reader: &mut WireReader<'_>, flag: &'static str) -> ProtocolResult<Option<FloatRect>> {
    if reader.read_bool(flag)? {
        Ok(Some(reader.read_rect()?))
    } else {
        Ok(None)
    }
}
