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

//! Protocol message definitions

use crate::{ProtocolError, ProtocolResult, MAX_CAPABILITY_NAME, MAX_FRAGMENT_PAYLOAD};
use touch_proxy_core::*;

/// Message type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
    Add = 1,
    Remove = 2,
    Clear = 3,
    Vibrate = 4,
    Capability = 5,
    Large = 6,
    InputStatus = 7,
    KeyboardShow = 8,
    InputCursor = 9,
    Initialize = 10,
    InputArea = 11,
}

impl MessageType {
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Whether the host is expected to send this type to us
    pub fn is_inbound(self) -> bool {
        matches!(
            self,
            MessageType::Vibrate
                | MessageType::Large
                | MessageType::InputStatus
                | MessageType::KeyboardShow
                | MessageType::InputCursor
                | MessageType::InputArea
                | MessageType::Initialize
        )
    }
}

impl TryFrom<u32> for MessageType {
    type Error = ProtocolError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        let message_type = match tag {
            1 => MessageType::Add,
            2 => MessageType::Remove,
            3 => MessageType::Clear,
            4 => MessageType::Vibrate,
            5 => MessageType::Capability,
            6 => MessageType::Large,
            7 => MessageType::InputStatus,
            8 => MessageType::KeyboardShow,
            9 => MessageType::InputCursor,
            10 => MessageType::Initialize,
            11 => MessageType::InputArea,
            other => return Err(ProtocolError::UnknownType(other)),
        };
        Ok(message_type)
    }
}

/// One piece of a message too long for a single host buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    payload: Vec<u8>,
    end: bool,
}

impl Fragment {
    pub fn new(payload: Vec<u8>, end: bool) -> ProtocolResult<Self> {
        if payload.len() > MAX_FRAGMENT_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                field: "fragment payload",
                length: payload.len(),
                limit: MAX_FRAGMENT_PAYLOAD,
            });
        }
        Ok(Fragment { payload, end })
    }

    // Callers guarantee the chunk fits.
    pub(crate) fn from_chunk(chunk: &[u8], end: bool) -> Self {
        debug_assert!(chunk.len() <= MAX_FRAGMENT_PAYLOAD);
        Fragment {
            payload: chunk.to_vec(),
            end,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Last fragment of the wrapped message
    pub fn is_end(&self) -> bool {
        self.end
    }
}

/// Capability announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityFlag {
    name: String,
    enabled: bool,
}

impl CapabilityFlag {
    pub fn new(name: impl Into<String>, enabled: bool) -> ProtocolResult<Self> {
        let name = name.into();
        if name.len() > MAX_CAPABILITY_NAME {
            return Err(ProtocolError::PayloadTooLarge {
                field: "capability name",
                length: name.len(),
                limit: MAX_CAPABILITY_NAME,
            });
        }
        Ok(CapabilityFlag { name, enabled })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Resolve the name to a known capability
    pub fn capability(&self) -> Option<PlatformCapability> {
        self.name.parse().ok()
    }
}

impl From<(PlatformCapability, bool)> for CapabilityFlag {
    fn from((capability, enabled): (PlatformCapability, bool)) -> Self {
        CapabilityFlag {
            name: capability.id().to_string(),
            enabled,
        }
    }
}

/// Protocol message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Add or move a pointer; coordinates are normalized to `[0, 1]`
    Add { id: u32, x: f32, y: f32 },
    Remove { id: u32 },
    Clear,
    Vibrate { kind: VibrateKind },
    Capability(CapabilityFlag),
    Large(Fragment),
    /// `None` means there is no text status at all
    InputStatus(Option<TextStatus>),
    KeyboardShow { show: bool },
    InputCursor(Option<FloatRect>),
    Initialize,
    InputArea(Option<FloatRect>),
}

impl Message {
    pub fn add(id: u32, position: NormalizedPosition) -> Self {
        Message::Add {
            id,
            x: position.x,
            y: position.y,
        }
    }

    pub fn capability(capability: PlatformCapability, enabled: bool) -> Self {
        Message::Capability(CapabilityFlag::from((capability, enabled)))
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Add { .. } => MessageType::Add,
            Message::Remove { .. } => MessageType::Remove,
            Message::Clear => MessageType::Clear,
            Message::Vibrate { .. } => MessageType::Vibrate,
            Message::Capability(_) => MessageType::Capability,
            Message::Large(_) => MessageType::Large,
            Message::InputStatus(_) => MessageType::InputStatus,
            Message::KeyboardShow { .. } => MessageType::KeyboardShow,
            Message::InputCursor(_) => MessageType::InputCursor,
            Message::Initialize => MessageType::Initialize,
            Message::InputArea(_) => MessageType::InputArea,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_tags() {
        for tag in 1..=11 {
            let message_type = MessageType::try_from(tag).unwrap();
            assert_eq!(message_type.tag(), tag);
        }
        assert_eq!(MessageType::try_from(0), Err(ProtocolError::UnknownType(0)));
        assert_eq!(MessageType::try_from(12), Err(ProtocolError::UnknownType(12)));
    }

    #[test]
    fn test_fragment_limit() {
        assert!(Fragment::new(vec![0; MAX_FRAGMENT_PAYLOAD], true).is_ok());
        let err = Fragment::new(vec![0; MAX_FRAGMENT_PAYLOAD + 1], true).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLarge { limit: 240, .. }));
    }

    #[test]
    fn test_capability_flag() {
        let flag = CapabilityFlag::from((PlatformCapability::KeyboardShow, true));
        assert_eq!(flag.name(), "keyboard_show");
        assert_eq!(flag.capability(), Some(PlatformCapability::KeyboardShow));

        assert!(CapabilityFlag::new("x".repeat(256), true).is_err());
        let custom = CapabilityFlag::new("vendor_feature", false).unwrap();
        assert_eq!(custom.capability(), None);
    }

    #[test]
    fn test_message_type_of_variants() {
        assert_eq!(
            Message::add(3, NormalizedPosition::new(0.5, 0.5)).message_type(),
            MessageType::Add
        );
        assert_eq!(Message::InputStatus(None).message_type(), MessageType::InputStatus);
        assert!(MessageType::KeyboardShow.is_inbound());
        assert!(!MessageType::Add.is_inbound());
    }
}
