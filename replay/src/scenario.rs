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

//! Replay scenario format

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use touch_proxy_core::*;
use touch_proxy_platform::{TextInputEvent, TouchEvent};
use touch_proxy_protocol::Message;

/// Recorded session: a surface size and the steps to replay, one per tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub surface: Surface,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
}

impl Default for Surface {
    fn default() -> Self {
        Surface {
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Batch delivered by the touch source
    Touch { events: Vec<TouchEvent> },
    /// Batch delivered by the input method
    TextInput { events: Vec<TextInputEvent> },
    /// Message sent by the host
    Host { message: HostMessage },
    Resize { width: u32, height: u32 },
    Capabilities { capabilities: Vec<PlatformCapability> },
}

/// Host-to-proxy messages in a readable form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Initialize,
    KeyboardShow { show: bool },
    Vibrate { kind: i32 },
    InputStatus { status: Option<TextStatus> },
    InputCursor { rect: Option<FloatRect> },
    InputArea { rect: Option<FloatRect> },
}

impl From<HostMessage> for Message {
    fn from(message: HostMessage) -> Self {
        match message {
            HostMessage::Initialize => Message::Initialize,
            HostMessage::KeyboardShow { show } => Message::KeyboardShow { show },
            HostMessage::Vibrate { kind } => Message::Vibrate {
                kind: VibrateKind::from_raw(kind),
            },
            HostMessage::InputStatus { status } => Message::InputStatus(status),
            HostMessage::InputCursor { rect } => Message::InputCursor(rect),
            HostMessage::InputArea { rect } => Message::InputArea(rect),
        }
    }
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let scenario = serde_json::from_str(&content)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "steps": [
                    {"step": "host", "message": {"type": "initialize"}},
                    {"step": "touch", "events": [{"type": "down", "id": 3, "x": 10.0, "y": 20.0}]},
                    {"step": "text_input", "events": [{"type": "enter"}, {"type": "preedit", "text": "ni"}]},
                    {"step": "resize", "width": 800, "height": 600}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(scenario.surface.width, 1920);
        assert_eq!(scenario.steps.len(), 4);
        match &scenario.steps[2] {
            Step::TextInput { events } => assert_eq!(
                events[1],
                TextInputEvent::Preedit {
                    text: "ni".to_string(),
                    cursor_begin: -1,
                    cursor_end: -1,
                }
            ),
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_host_message_conversion() {
        let message: Message = HostMessage::Vibrate { kind: 0 }.into();
        assert_eq!(message, Message::Vibrate { kind: VibrateKind::BlockBroken });

        let status = TextStatus::with_caret_at_end("hi");
        let message: Message = HostMessage::InputStatus { status: Some(status.clone()) }.into();
        assert_eq!(message, Message::InputStatus(Some(status)));
    }
}
