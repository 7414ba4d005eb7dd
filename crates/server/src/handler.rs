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

//! Inbound message dispatch

use crate::ServerResult;
use parking_lot::Mutex;
use std::sync::Arc;
use touch_proxy_core::*;
use touch_proxy_platform::*;
use touch_proxy_protocol::*;
use tracing::{debug, info, warn};

/// Routes messages from the host to the collaborators and the engine
pub struct InboundHandler {
    channel: EventChannel,
    keyboard: Arc<dyn KeyboardVisibility>,
    haptics: Arc<dyn Haptics>,
    engine: Arc<Mutex<CompositionEngine>>,
    reassembler: Reassembler,
    capabilities: Vec<PlatformCapability>,
}

impl InboundHandler {
    pub fn new(
        channel: EventChannel,
        keyboard: Arc<dyn KeyboardVisibility>,
        haptics: Arc<dyn Haptics>,
        engine: Arc<Mutex<CompositionEngine>>,
        reassembler: Reassembler,
        capabilities: Vec<PlatformCapability>,
    ) -> Self {
        InboundHandler {
            channel,
            keyboard,
            haptics,
            engine,
            reassembler,
            capabilities: dedup(&capabilities),
        }
    }

    pub fn handle_bytes(&mut self, bytes: &[u8]) -> ServerResult<()> {
        let message = decode(bytes)?;
        self.handle_message(message)
    }

    /// Handle one decoded inbound message
    pub fn handle_message(&mut self, message: Message) -> ServerResult<()> {
        debug!("Handling inbound message: {:?}", message.message_type());

        match message {
            Message::Vibrate { kind } => {
                self.haptics.vibrate(kind);
                Ok(())
            }
            Message::KeyboardShow { show } => {
                self.handle_keyboard_show(show);
                Ok(())
            }
            Message::InputStatus(status) => {
                self.engine.lock().set_status(status);
                Ok(())
            }
            Message::InputCursor(rect) => {
                self.engine.lock().set_cursor_rect(rect);
                Ok(())
            }
            Message::InputArea(rect) => {
                self.engine.lock().set_input_area(rect);
                Ok(())
            }
            Message::Initialize => {
                self.announce_capabilities();
                Ok(())
            }
            Message::Large(fragment) => self.handle_fragment(&fragment),
            other => {
                warn!("Unhandled message type: {:?}", other.message_type());
                Ok(())
            }
        }
    }

    fn handle_keyboard_show(&self, show: bool) {
        let result = if show {
            self.keyboard.show()
        } else {
            self.keyboard.hide()
        };
        if let Err(e) = result {
            warn!("Failed to {} keyboard: {}", if show { "show" } else { "hide" }, e);
        }
    }

    fn handle_fragment(&mut self, fragment: &Fragment) -> ServerResult<()> {
        match self.reassembler.push(fragment)? {
            Some(Message::Large(_)) => {
                warn!("Ignoring nested large message");
                Ok(())
            }
            Some(inner) => self.handle_message(inner),
            None => Ok(()),
        }
    }

    fn announce_capabilities(&self) {
        info!("Host initialized, announcing {} capabilities", self.capabilities.len());
        for capability in &self.capabilities {
            self.channel.push(Message::capability(*capability, true));
        }
    }

    pub fn capabilities(&self) -> &[PlatformCapability] {
        &self.capabilities
    }

    /// Replace the capability set, announcing removals then additions
    pub fn set_capabilities(&mut self, capabilities: &[PlatformCapability]) {
        let updated = dedup(capabilities);

        for removed in self.capabilities.iter().filter(|c| !updated.contains(c)) {
            debug!("Capability {} disabled", removed);
            self.channel.push(Message::capability(*removed, false));
        }
        for added in updated.iter().filter(|c| !self.capabilities.contains(c)) {
            debug!("Capability {} enabled", added);
            self.channel.push(Message::capability(*added, true));
        }

        self.capabilities = updated;
    }

    /// Bytes of a large message still waiting for its end fragment
    pub fn pending_fragment_bytes(&self) -> usize {
        self.reassembler.pending_len()
    }
}

fn dedup(capabilities: &[PlatformCapability]) -> Vec<PlatformCapability> {
    let mut unique = Vec::with_capacity(capabilities.len());
    for capability in capabilities {
        if !unique.contains(capability) {
            unique.push(*capability);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerError;
    use touch_proxy_protocol::fragment::fragment;

    #[derive(Default)]
    struct Recorder {
        keyboard: Mutex<Vec<bool>>,
        vibrations: Mutex<Vec<VibrateKind>>,
        fail_keyboard: bool,
    }

    impl KeyboardVisibility for Recorder {
        fn show(&self) -> PlatformResult<()> {
            self.keyboard.lock().push(true);
            if self.fail_keyboard {
                return Err(PlatformError::Keyboard("no keyboard".to_string()));
            }
            Ok(())
        }

        fn hide(&self) -> PlatformResult<()> {
            self.keyboard.lock().push(false);
            Ok(())
        }
    }

    impl Haptics for Recorder {
        fn vibrate(&self, kind: VibrateKind) {
            self.vibrations.lock().push(kind);
        }
    }

    fn handler_with(recorder: Arc<Recorder>) -> (InboundHandler, EventChannel, Arc<Mutex<CompositionEngine>>) {
        let channel = EventChannel::new();
        let engine = Arc::new(Mutex::new(CompositionEngine::new(
            channel.clone(),
            Arc::new(LoggingCollaborator),
        )));
        let handler = InboundHandler::new(
            channel.clone(),
            recorder.clone(),
            recorder,
            engine.clone(),
            Reassembler::default(),
            PlatformCapability::ALL.to_vec(),
        );
        (handler, channel, engine)
    }

    fn drain(channel: &EventChannel) -> Vec<Message> {
        std::iter::from_fn(|| channel.poll())
            .map(|bytes| decode(&bytes).unwrap())
            .collect()
    }

    #[test]
    fn test_initialize_announces_capabilities() {
        let (mut handler, channel, _) = handler_with(Arc::new(Recorder::default()));
        handler.handle_bytes(&encode(&Message::Initialize)).unwrap();
        assert_eq!(
            drain(&channel),
            vec![
                Message::capability(PlatformCapability::KeyboardShow, true),
                Message::capability(PlatformCapability::TextStatus, true),
            ]
        );
    }

    #[test]
    fn test_keyboard_and_vibrate_reach_collaborators() {
        let recorder = Arc::new(Recorder::default());
        let (mut handler, channel, _) = handler_with(recorder.clone());
        handler.handle_message(Message::KeyboardShow { show: true }).unwrap();
        handler.handle_message(Message::KeyboardShow { show: false }).unwrap();
        handler
            .handle_message(Message::Vibrate { kind: VibrateKind::BlockBroken })
            .unwrap();

        assert_eq!(*recorder.keyboard.lock(), vec![true, false]);
        assert_eq!(*recorder.vibrations.lock(), vec![VibrateKind::BlockBroken]);
        assert!(channel.is_empty());
    }

    #[test]
    fn test_keyboard_failure_is_not_fatal() {
        let recorder = Arc::new(Recorder {
            fail_keyboard: true,
            ..Default::default()
        });
        let (mut handler, _, _) = handler_with(recorder);
        assert!(handler.handle_message(Message::KeyboardShow { show: true }).is_ok());
    }

    #[test]
    fn test_input_status_updates_engine() {
        let (mut handler, _, engine) = handler_with(Arc::new(Recorder::default()));
        let status = TextStatus::with_caret_at_end("hello");
        handler
            .handle_message(Message::InputStatus(Some(status.clone())))
            .unwrap();
        assert_eq!(engine.lock().status(), Some(&status));

        handler.handle_message(Message::InputStatus(None)).unwrap();
        assert_eq!(engine.lock().status(), None);
    }

    #[test]
    fn test_cursor_and_area_update_engine() {
        let (mut handler, _, engine) = handler_with(Arc::new(Recorder::default()));
        let rect = FloatRect::new(10.0, 20.0, 2.0, 16.0);
        handler.handle_message(Message::InputCursor(Some(rect))).unwrap();
        handler.handle_message(Message::InputArea(Some(rect))).unwrap();
        assert_eq!(engine.lock().cursor_rect(), Some(rect));
        assert_eq!(engine.lock().input_area(), Some(rect));
    }

    #[test]
    fn test_outbound_types_are_ignored() {
        let (mut handler, channel, _) = handler_with(Arc::new(Recorder::default()));
        handler.handle_message(Message::Remove { id: 3 }).unwrap();
        handler.handle_message(Message::Clear).unwrap();
        assert!(channel.is_empty());
    }

    #[test]
    fn test_large_status_is_reassembled() {
        let (mut handler, _, engine) = handler_with(Arc::new(Recorder::default()));
        let status = TextStatus::with_caret_at_end("y".repeat(700));
        let fragments = fragment(&Message::InputStatus(Some(status.clone())));
        assert!(fragments.len() > 1);

        let (last, rest) = fragments.split_last().unwrap();
        for message in rest {
            handler.handle_bytes(&encode(message)).unwrap();
        }
        assert!(handler.pending_fragment_bytes() > 0);
        assert_eq!(engine.lock().status(), None);

        handler.handle_bytes(&encode(last)).unwrap();
        assert_eq!(handler.pending_fragment_bytes(), 0);
        assert_eq!(engine.lock().status(), Some(&status));
    }

    #[test]
    fn test_decode_errors_are_reported() {
        let (mut handler, _, _) = handler_with(Arc::new(Recorder::default()));
        let error = handler.handle_bytes(&[0, 0, 0, 99]).unwrap_err();
        assert!(matches!(
            error,
            ServerError::Protocol(ProtocolError::UnknownType(99))
        ));
        assert!(handler.handle_bytes(&[0, 0]).is_err());
    }

    #[test]
    fn test_capability_updates_announce_differences() {
        let (mut handler, channel, _) = handler_with(Arc::new(Recorder::default()));
        handler.set_capabilities(&[PlatformCapability::TextStatus]);
        assert_eq!(
            drain(&channel),
            vec![Message::capability(PlatformCapability::KeyboardShow, false)]
        );

        handler.set_capabilities(&[PlatformCapability::TextStatus, PlatformCapability::KeyboardShow]);
        assert_eq!(
            drain(&channel),
            vec![Message::capability(PlatformCapability::KeyboardShow, true)]
        );

        handler.set_capabilities(&[PlatformCapability::KeyboardShow, PlatformCapability::TextStatus]);
        assert!(channel.is_empty());
        assert_eq!(
            handler.capabilities(),
            &[PlatformCapability::KeyboardShow, PlatformCapability::TextStatus]
        );
    }
}
