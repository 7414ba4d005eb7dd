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

//! Collaborator interfaces and platform event types
//!
//! Platform adapters (Wayland seats, Win32 touch hooks, on-screen keyboard
//! toggles) live outside this workspace. They plug in by implementing the
//! traits below and are injected as `Arc<dyn Trait>`.

use crate::{PlatformError, PlatformResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use touch_proxy_core::*;
use tracing::debug;

/// Maps native contact coordinates into the `[0, 1]` range
pub trait PositionNormalizer: Send + Sync {
    fn normalize(&self, x: f64, y: f64) -> NormalizedPosition;
}

/// Shows and hides the on-screen keyboard
pub trait KeyboardVisibility: Send + Sync {
    fn show(&self) -> PlatformResult<()>;

    fn hide(&self) -> PlatformResult<()>;
}

/// Keeps the input method informed about the text around the caret
pub trait SurroundingTextSync: Send + Sync {
    /// `cursor` and `anchor` are byte offsets into `text`
    fn sync_surrounding(&self, text: &str, cursor: usize, anchor: usize);

    /// Caret rectangle reported by the host
    fn sync_cursor_rect(&self, _rect: Option<FloatRect>) {}

    /// Area the host reserves for text input
    fn sync_input_area(&self, _rect: Option<FloatRect>) {}
}

/// Haptic feedback
pub trait Haptics: Send + Sync {
    fn vibrate(&self, kind: VibrateKind);
}

/// Divides surface-local coordinates by the current surface size
#[derive(Debug, Default)]
pub struct SurfaceNormalizer {
    size: RwLock<(u32, u32)>,
}

impl SurfaceNormalizer {
    pub fn new(width: u32, height: u32) -> Self {
        SurfaceNormalizer {
            size: RwLock::new((width, height)),
        }
    }

    /// Called whenever the host surface is resized
    pub fn resize(&self, width: u32, height: u32) {
        *self.size.write() = (width, height);
    }

    pub fn size(&self) -> (u32, u32) {
        *self.size.read()
    }
}

impl PositionNormalizer for SurfaceNormalizer {
    fn normalize(&self, x: f64, y: f64) -> NormalizedPosition {
        let (width, height) = self.size();
        let scale = |value: f64, extent: u32| {
            if extent == 0 {
                0.0
            } else {
                (value / f64::from(extent)) as f32
            }
        };
        NormalizedPosition::new(scale(x, width), scale(y, height))
    }
}

/// For sources that already report normalized coordinates
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityNormalizer;

impl PositionNormalizer for IdentityNormalizer {
    fn normalize(&self, x: f64, y: f64) -> NormalizedPosition {
        NormalizedPosition::new(x as f32, y as f32)
    }
}

/// Collaborator that accepts every request and only logs it
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCollaborator;

impl KeyboardVisibility for LoggingCollaborator {
    fn show(&self) -> PlatformResult<()> {
        debug!("Keyboard show requested");
        Ok(())
    }

    fn hide(&self) -> PlatformResult<()> {
        debug!("Keyboard hide requested");
        Ok(())
    }
}

impl SurroundingTextSync for LoggingCollaborator {
    fn sync_surrounding(&self, text: &str, cursor: usize, anchor: usize) {
        debug!("Surrounding text: {} bytes, cursor {}, anchor {}", text.len(), cursor, anchor);
    }
}

impl Haptics for LoggingCollaborator {
    fn vibrate(&self, kind: VibrateKind) {
        debug!("Vibrate: {:?}", kind);
    }
}

/// Keyboard collaborator for platforms without an on-screen keyboard
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedKeyboard;

impl KeyboardVisibility for UnsupportedKeyboard {
    fn show(&self) -> PlatformResult<()> {
        Err(PlatformError::UnsupportedPlatform(std::env::consts::OS.to_string()))
    }

    fn hide(&self) -> PlatformResult<()> {
        Err(PlatformError::UnsupportedPlatform(std::env::consts::OS.to_string()))
    }
}

/// Touch events as delivered by a platform adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TouchEvent {
    Down { id: i64, x: f64, y: f64 },
    Motion { id: i64, x: f64, y: f64 },
    Up { id: i64 },
    /// End of one batch of contact reports
    Frame,
    Cancel,
}

/// Input method events as delivered by a platform adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextInputEvent {
    Enter,
    Leave,
    Preedit {
        text: String,
        #[serde(default = "no_cursor")]
        cursor_begin: i32,
        #[serde(default = "no_cursor")]
        cursor_end: i32,
    },
    Commit { text: String },
    DeleteSurrounding { before: u32, after: u32 },
    /// Apply everything received since the previous `Done`
    Done,
}

fn no_cursor() -> i32 {
    -1
}

/// Source of touch events
pub trait TouchSource {
    /// Hand over every event received since the last call
    fn drain_touch_events(&mut self) -> Vec<TouchEvent>;
}

/// Source of input method events
pub trait TextInputSource {
    /// Hand over every event received since the last call
    fn drain_text_input_events(&mut self) -> Vec<TextInputEvent>;
}

/// In-memory source fed by tests and the replay tool
#[derive(Debug, Default)]
pub struct ScriptedSource {
    touch: VecDeque<TouchEvent>,
    text_input: VecDeque<TextInputEvent>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        ScriptedSource::default()
    }

    pub fn push_touch(&mut self, event: TouchEvent) {
        self.touch.push_back(event);
    }

    pub fn push_text_input(&mut self, event: TextInputEvent) {
        self.text_input.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.touch.is_empty() && self.text_input.is_empty()
    }
}

impl TouchSource for ScriptedSource {
    fn drain_touch_events(&mut self) -> Vec<TouchEvent> {
        self.touch.drain(..).collect()
    }
}

impl TextInputSource for ScriptedSource {
    fn drain_text_input_events(&mut self) -> Vec<TextInputEvent> {
        self.text_input.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_keyboard_reports_platform() {
        let keyboard = UnsupportedKeyboard;
        assert!(matches!(
            keyboard.show(),
            Err(PlatformError::UnsupportedPlatform(os)) if os == std::env::consts::OS
        ));
        assert!(keyboard.hide().is_err());
    }

    #[test]
    fn test_surface_normalizer() {
        let normalizer = SurfaceNormalizer::new(200, 100);
        assert_eq!(normalizer.normalize(50.0, 50.0), NormalizedPosition::new(0.25, 0.5));

        normalizer.resize(400, 400);
        assert_eq!(normalizer.normalize(400.0, 0.0), NormalizedPosition::new(1.0, 0.0));
    }

    #[test]
    fn test_zero_sized_surface_maps_to_origin() {
        let normalizer = SurfaceNormalizer::default();
        assert_eq!(normalizer.normalize(10.0, 10.0), NormalizedPosition::new(0.0, 0.0));
    }

    #[test]
    fn test_text_input_event_json() {
        let event: TextInputEvent =
            serde_json::from_str(r#"{"type":"preedit","text":"ni"}"#).unwrap();
        assert_eq!(
            event,
            TextInputEvent::Preedit {
                text: "ni".to_string(),
                cursor_begin: -1,
                cursor_end: -1,
            }
        );

        let event: TouchEvent =
            serde_json::from_str(r#"{"type":"down","id":3,"x":1.5,"y":2.0}"#).unwrap();
        assert_eq!(event, TouchEvent::Down { id: 3, x: 1.5, y: 2.0 });
    }

    #[test]
    fn test_scripted_source_drains_in_order() {
        let mut source = ScriptedSource::new();
        source.push_touch(TouchEvent::Up { id: 1 });
        source.push_touch(TouchEvent::Frame);
        source.push_text_input(TextInputEvent::Done);

        assert_eq!(
            source.drain_touch_events(),
            vec![TouchEvent::Up { id: 1 }, TouchEvent::Frame]
        );
        assert!(source.drain_touch_events().is_empty());
        assert_eq!(source.drain_text_input_events(), vec![TextInputEvent::Done]);
        assert!(source.is_empty());
    }
}
