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

//! Core types for Touch Proxy

use crate::{ProxyError, ProxyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Half-open byte range inside a text buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub length: usize,
}

impl TextRange {
    pub const EMPTY: TextRange = TextRange { start: 0, length: 0 };

    pub fn new(start: usize, length: usize) -> Self {
        TextRange { start, length }
    }

    /// Zero-length range at `position`
    pub fn caret(position: usize) -> Self {
        TextRange {
            start: position,
            length: 0,
        }
    }

    pub fn end(&self) -> usize {
        self.start.saturating_add(self.length)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.length)
    }
}

/// Text editing state shared between the input method and the host.
///
/// All offsets are UTF-8 byte offsets into `text`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStatus {
    pub text: String,
    #[serde(default)]
    pub composition: TextRange,
    #[serde(default)]
    pub selection: TextRange,
    /// The caret sits at the start of the selection instead of its end
    #[serde(default)]
    pub selection_left: bool,
}

impl TextStatus {
    /// Create a validated text status
    pub fn new(
        text: impl Into<String>,
        composition: TextRange,
        selection: TextRange,
        selection_left: bool,
    ) -> ProxyResult<Self> {
        let status = TextStatus {
            text: text.into(),
            composition,
            selection,
            selection_left,
        };
        status.validate()?;
        Ok(status)
    }

    /// Plain text with the caret at its end
    pub fn with_caret_at_end(text: impl Into<String>) -> Self {
        let text = text.into();
        let end = text.len();
        TextStatus {
            text,
            composition: TextRange::EMPTY,
            selection: TextRange::caret(end),
            selection_left: false,
        }
    }

    /// Check that both ranges fit inside the text
    pub fn validate(&self) -> ProxyResult<()> {
        if self.composition.end() > self.text.len() {
            return Err(ProxyError::InvalidRange(format!(
                "composition {} exceeds text length {}",
                self.composition,
                self.text.len()
            )));
        }
        if self.selection.end() > self.text.len() {
            return Err(ProxyError::InvalidRange(format!(
                "selection {} exceeds text length {}",
                self.selection,
                self.text.len()
            )));
        }
        Ok(())
    }

    pub fn has_composition(&self) -> bool {
        !self.composition.is_empty()
    }

    /// Caret position as seen by the input method
    pub fn cursor(&self) -> usize {
        if self.selection_left {
            self.selection.start
        } else {
            self.selection.end()
        }
    }

    /// Fixed end of the selection, opposite the caret
    pub fn anchor(&self) -> usize {
        if self.selection_left {
            self.selection.end()
        } else {
            self.selection.start
        }
    }

    pub fn composition_text(&self) -> Option<&str> {
        self.text.get(self.composition.start..self.composition.end())
    }

    pub fn selection_text(&self) -> Option<&str> {
        self.text.get(self.selection.start..self.selection.end())
    }
}

/// Rectangle in host window coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl FloatRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        FloatRect {
            left,
            top,
            width,
            height,
        }
    }
}

/// Haptic feedback kinds requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VibrateKind {
    BlockBroken,
    /// Any kind this side does not know about; `-1` is the canonical value
    Unknown(i32),
}

impl VibrateKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => VibrateKind::BlockBroken,
            other => VibrateKind::Unknown(other),
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            VibrateKind::BlockBroken => 0,
            VibrateKind::Unknown(raw) => raw,
        }
    }
}

impl Default for VibrateKind {
    fn default() -> Self {
        VibrateKind::Unknown(-1)
    }
}

/// Optional features this side can announce to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformCapability {
    KeyboardShow,
    TextStatus,
}

impl PlatformCapability {
    pub const ALL: [PlatformCapability; 2] =
        [PlatformCapability::KeyboardShow, PlatformCapability::TextStatus];

    /// Name used on the wire
    pub fn id(self) -> &'static str {
        match self {
            PlatformCapability::KeyboardShow => "keyboard_show",
            PlatformCapability::TextStatus => "text_status",
        }
    }
}

impl fmt::Display for PlatformCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for PlatformCapability {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlatformCapability::ALL
            .into_iter()
            .find(|capability| capability.id() == s)
            .ok_or_else(|| ProxyError::UnknownCapability(s.to_string()))
    }
}

/// Contact position normalized to the host surface, each axis in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPosition {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPosition {
    pub fn new(x: f32, y: f32) -> Self {
        NormalizedPosition { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_status_validation() {
        assert!(TextStatus::new("abc", TextRange::new(1, 2), TextRange::caret(3), false).is_ok());
        assert!(TextStatus::new("abc", TextRange::new(2, 2), TextRange::caret(3), false).is_err());
        assert!(TextStatus::new("abc", TextRange::EMPTY, TextRange::new(1, 3), false).is_err());
    }

    #[test]
    fn test_cursor_and_anchor_follow_selection_side() {
        let mut status =
            TextStatus::new("hello", TextRange::EMPTY, TextRange::new(1, 3), false).unwrap();
        assert_eq!(status.cursor(), 4);
        assert_eq!(status.anchor(), 1);

        status.selection_left = true;
        assert_eq!(status.cursor(), 1);
        assert_eq!(status.anchor(), 4);
        assert_eq!(status.selection_text(), Some("ell"));
    }

    #[test]
    fn test_vibrate_kind_raw_values() {
        assert_eq!(VibrateKind::from_raw(0), VibrateKind::BlockBroken);
        assert_eq!(VibrateKind::from_raw(-1), VibrateKind::Unknown(-1));
        assert_eq!(VibrateKind::Unknown(7).to_raw(), 7);
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(PlatformCapability::KeyboardShow.id(), "keyboard_show");
        assert_eq!(
            "text_status".parse::<PlatformCapability>().unwrap(),
            PlatformCapability::TextStatus
        );
        assert!("mouse".parse::<PlatformCapability>().is_err());

        let json = serde_json::to_string(&PlatformCapability::KeyboardShow).unwrap();
        assert_eq!(json, "\"keyboard_show\"");
    }
}
