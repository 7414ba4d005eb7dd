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

//! Input method composition handling
//!
//! The input method reports edits as a batch of preedit, commit and
//! delete-surrounding operations terminated by a `done` event. The host owns
//! the authoritative [`TextStatus`]; the engine applies each batch to a copy
//! of the last known status and pushes the result back as `InputStatus`.

use crate::input::{SurroundingTextSync, TextInputEvent};
use std::sync::Arc;
use touch_proxy_core::utils::{floor_char_boundary, insert_at, offset_by, remove_range};
use touch_proxy_core::{FloatRect, TextRange, TextStatus};
use touch_proxy_protocol::{EventChannel, Message};
use tracing::{debug, trace};

/// Cursor value meaning "no visible cursor inside the preedit"
pub const NO_CURSOR: i32 = -1;

/// Pending preedit string with its cursor relative to the preedit start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreeditUpdate {
    pub text: String,
    pub cursor_begin: i32,
    pub cursor_end: i32,
}

impl PreeditUpdate {
    pub fn new(text: impl Into<String>, cursor_begin: i32, cursor_end: i32) -> Self {
        PreeditUpdate {
            text: text.into(),
            cursor_begin,
            cursor_end,
        }
    }

    fn hides_cursor(&self) -> bool {
        self.cursor_begin == NO_CURSOR && self.cursor_end == NO_CURSOR
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteSurrounding {
    pub before: u32,
    pub after: u32,
}

/// Operations received since the last `done`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingEditBatch {
    pub preedit: Option<PreeditUpdate>,
    pub commits: Vec<String>,
    pub deletes: Vec<DeleteSurrounding>,
}

impl PendingEditBatch {
    pub fn is_empty(&self) -> bool {
        self.preedit.is_none() && self.commits.is_empty() && self.deletes.is_empty()
    }

    fn preedit_text(&self) -> Option<&PreeditUpdate> {
        self.preedit.as_ref().filter(|preedit| !preedit.text.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    /// Not focused and no status known
    Idle,
    UnfocusedWithStatus,
    Focused,
}

/// Clamp a range into `text` with both ends on char boundaries
fn clamp_range(text: &str, range: TextRange) -> TextRange {
    let start = floor_char_boundary(text, range.start);
    let end = floor_char_boundary(text, range.end().max(start));
    TextRange::new(start, end - start)
}

/// Bring a status received from outside into a state the engine can splice
fn sanitize(mut status: TextStatus) -> TextStatus {
    status.composition = clamp_range(&status.text, status.composition);
    status.selection = clamp_range(&status.text, status.selection);
    status
}

/// Apply a pending batch to `status`, producing the new status.
///
/// Order: a visible preedit replaces the selection, the old composition is
/// dropped, deletes run around the cursor, commits are inserted, and finally
/// the new preedit becomes the composition.
pub fn reconcile(status: &TextStatus, batch: &PendingEditBatch) -> TextStatus {
    let TextStatus {
        mut text,
        composition,
        selection,
        selection_left,
    } = sanitize(status.clone());
    let mut composition = composition;
    let mut selection = selection;
    let preedit = batch.preedit_text();

    if preedit.is_some() && !selection.is_empty() {
        let (start, end) = remove_range(&mut text, selection.start, selection.end());
        let removed = end - start;
        if composition.start >= end {
            composition.start -= removed;
        } else if composition.start > start {
            composition.start = start;
        }
        composition = clamp_range(&text, composition);
        selection = TextRange::caret(start);
    }

    if !composition.is_empty() {
        let (start, _) = remove_range(&mut text, composition.start, composition.end());
        selection.start = start;
        composition = TextRange::EMPTY;
    }

    let mut cursor = floor_char_boundary(&text, selection.start);

    for delete in &batch.deletes {
        let start = cursor.saturating_sub(delete.before as usize);
        let end = cursor.saturating_add(delete.after as usize).min(text.len());
        if start >= end {
            continue;
        }
        let (removed_start, _) = remove_range(&mut text, start, end);
        cursor = removed_start;
    }

    for commit in &batch.commits {
        cursor = insert_at(&mut text, cursor, commit) + commit.len();
    }

    match preedit {
        Some(preedit) => {
            let start = insert_at(&mut text, cursor, &preedit.text);
            composition = TextRange::new(start, preedit.text.len());
            if preedit.hides_cursor() {
                TextStatus {
                    selection: TextRange::caret(composition.end()),
                    text,
                    composition,
                    selection_left: false,
                }
            } else {
                let begin = offset_by(&text, start, preedit.cursor_begin as i64);
                let end = offset_by(&text, start, preedit.cursor_end as i64);
                let (selection, selection_left) = if begin < end {
                    (TextRange::new(begin, end - begin), false)
                } else {
                    (TextRange::new(end, begin - end), true)
                };
                TextStatus {
                    text,
                    composition,
                    selection,
                    selection_left,
                }
            }
        }
        None => {
            let end = floor_char_boundary(&text, cursor.saturating_add(selection.length));
            TextStatus {
                selection: TextRange::new(cursor, end - cursor),
                text,
                composition,
                selection_left,
            }
        }
    }
}

/// Drop the composition from `status`, moving the selection with the text
fn strip_composition(status: &TextStatus) -> TextStatus {
    let mut text = status.text.clone();
    let (start, end) = remove_range(&mut text, status.composition.start, status.composition.end());
    let removed = end - start;
    let shift = |offset: usize| {
        if offset >= end {
            offset - removed
        } else if offset > start {
            start
        } else {
            offset
        }
    };
    let selection_start = shift(status.selection.start);
    let selection_end = shift(status.selection.end()).max(selection_start);

    TextStatus {
        text,
        composition: TextRange::EMPTY,
        selection: TextRange::new(selection_start, selection_end - selection_start),
        selection_left: status.selection_left,
    }
}

/// Composition state of one input context
pub struct CompositionEngine {
    channel: EventChannel,
    sync: Arc<dyn SurroundingTextSync>,
    focused: bool,
    status: Option<TextStatus>,
    batch: PendingEditBatch,
    cursor_rect: Option<FloatRect>,
    input_area: Option<FloatRect>,
}

impl CompositionEngine {
    pub fn new(channel: EventChannel, sync: Arc<dyn SurroundingTextSync>) -> Self {
        CompositionEngine {
            channel,
            sync,
            focused: false,
            status: None,
            batch: PendingEditBatch::default(),
            cursor_rect: None,
            input_area: None,
        }
    }

    pub fn state(&self) -> FocusState {
        match (self.focused, &self.status) {
            (true, _) => FocusState::Focused,
            (false, Some(_)) => FocusState::UnfocusedWithStatus,
            (false, None) => FocusState::Idle,
        }
    }

    pub fn status(&self) -> Option<&TextStatus> {
        self.status.as_ref()
    }

    pub fn pending(&self) -> &PendingEditBatch {
        &self.batch
    }

    pub fn cursor_rect(&self) -> Option<FloatRect> {
        self.cursor_rect
    }

    pub fn input_area(&self) -> Option<FloatRect> {
        self.input_area
    }

    pub fn enter_focus(&mut self) {
        debug!("Text input focused");
        self.focused = true;
        self.batch = PendingEditBatch::default();
        self.sync_status();
    }

    pub fn leave_focus(&mut self) {
        debug!("Text input lost focus");
        self.focused = false;
        self.batch = PendingEditBatch::default();

        let Some(status) = self.status.as_ref().filter(|status| status.has_composition()) else {
            return;
        };
        let trimmed = strip_composition(status);
        trace!("Dropping composition {} on focus loss", status.composition);
        self.status = Some(trimmed.clone());
        self.channel.push(Message::InputStatus(Some(trimmed)));
    }

    pub fn preedit(&mut self, text: impl Into<String>, cursor_begin: i32, cursor_end: i32) {
        if !self.focused {
            return;
        }
        self.batch.preedit = Some(PreeditUpdate::new(text, cursor_begin, cursor_end));
    }

    pub fn commit(&mut self, text: impl Into<String>) {
        if !self.focused {
            return;
        }
        self.batch.commits.push(text.into());
    }

    pub fn delete_surrounding(&mut self, before: u32, after: u32) {
        if !self.focused {
            return;
        }
        self.batch.deletes.push(DeleteSurrounding { before, after });
    }

    /// Apply the pending batch. Returns the status pushed to the host, if any.
    pub fn flush(&mut self) -> Option<&TextStatus> {
        let batch = std::mem::take(&mut self.batch);
        if !self.focused {
            return None;
        }
        let Some(status) = self.status.as_ref() else {
            trace!("Dropping edit batch, host has not reported a status");
            return None;
        };

        let updated = reconcile(status, &batch);
        trace!(
            "Reconciled status: composition {} selection {}",
            updated.composition,
            updated.selection
        );
        self.channel.push(Message::InputStatus(Some(updated.clone())));
        self.status = Some(updated);
        self.status.as_ref()
    }

    /// Host reported its text status; `None` clears it
    pub fn set_status(&mut self, status: Option<TextStatus>) {
        self.status = status.map(sanitize);
        if self.focused {
            self.sync_status();
        }
    }

    pub fn set_cursor_rect(&mut self, rect: Option<FloatRect>) {
        self.cursor_rect = rect;
        self.sync.sync_cursor_rect(rect);
    }

    pub fn set_input_area(&mut self, rect: Option<FloatRect>) {
        self.input_area = rect;
        self.sync.sync_input_area(rect);
    }

    pub fn handle(&mut self, event: TextInputEvent) {
        match event {
            TextInputEvent::Enter => self.enter_focus(),
            TextInputEvent::Leave => self.leave_focus(),
            TextInputEvent::Preedit {
                text,
                cursor_begin,
                cursor_end,
            } => self.preedit(text, cursor_begin, cursor_end),
            TextInputEvent::Commit { text } => self.commit(text),
            TextInputEvent::DeleteSurrounding { before, after } => {
                self.delete_surrounding(before, after)
            }
            TextInputEvent::Done => {
                self.flush();
            }
        }
    }

    fn sync_status(&self) {
        if let Some(status) = &self.status {
            self.sync
                .sync_surrounding(&status.text, status.cursor(), status.anchor());
        }
    }
}
