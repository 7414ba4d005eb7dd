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

//! Byte-offset text helpers
//!
//! Input methods report positions as byte offsets. These helpers clamp such
//! offsets into the text and snap them onto UTF-8 character boundaries so that
//! splicing never panics on multi-byte text.

/// Largest char boundary not greater than `index`, clamped to the text length
pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut boundary = index;
    while !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

/// Offset moved by a signed delta, saturating at zero and clamped to the text
pub fn offset_by(text: &str, base: usize, delta: i64) -> usize {
    let moved = if delta < 0 {
        base.saturating_sub(delta.unsigned_abs() as usize)
    } else {
        base.saturating_add(delta as usize)
    };
    floor_char_boundary(text, moved)
}

/// Remove `start..end` from `text`, returning the range actually removed
pub fn remove_range(text: &mut String, start: usize, end: usize) -> (usize, usize) {
    let start = floor_char_boundary(text, start);
    let end = floor_char_boundary(text, end.max(start));
    if start < end {
        text.replace_range(start..end, "");
    }
    (start, end)
}

/// Insert `insertion` at `offset`, returning the offset actually used
pub fn insert_at(text: &mut String, offset: usize, insertion: &str) -> usize {
    let offset = floor_char_boundary(text, offset);
    text.insert_str(offset, insertion);
    offset
}

/// Hex dump used in log lines for raw protocol buffers
pub fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}
