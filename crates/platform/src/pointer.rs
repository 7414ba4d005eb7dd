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

//! Pointer identity mapping
//!
//! Platforms reuse contact ids freely, so every contact gets a fresh outward
//! id when it goes down. Ids come from a shared allocator and are never
//! reused while the process runs (modulo `u32` wrap-around, which skips 0).

use crate::input::{PositionNormalizer, TouchEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use touch_proxy_protocol::{EventChannel, Message};
use tracing::{debug, trace};

/// Hands out outward pointer ids starting at 1
#[derive(Debug, Clone)]
pub struct PointerIdAllocator {
    next: Arc<Mutex<u32>>,
}

impl PointerIdAllocator {
    pub fn new() -> Self {
        PointerIdAllocator {
            next: Arc::new(Mutex::new(1)),
        }
    }

    pub fn allocate(&self) -> u32 {
        let mut next = self.next.lock();
        let id = *next;
        *next = next.wrapping_add(1).max(1);
        id
    }
}

impl Default for PointerIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// One live contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerRecord {
    pub outward_id: u32,
    /// Tick of the frame in which the contact was last reported
    pub last_seen: u64,
}

#[derive(Debug, Default)]
struct PointerTable {
    tick: u64,
    records: HashMap<i64, PointerRecord>,
}

/// Translates native contact ids into outward ids and emits Add/Remove
pub struct PointerMapper {
    channel: EventChannel,
    ids: PointerIdAllocator,
    normalizer: Arc<dyn PositionNormalizer>,
    table: Mutex<PointerTable>,
}

impl PointerMapper {
    pub fn new(
        channel: EventChannel,
        ids: PointerIdAllocator,
        normalizer: Arc<dyn PositionNormalizer>,
    ) -> Self {
        PointerMapper {
            channel,
            ids,
            normalizer,
            table: Mutex::new(PointerTable::default()),
        }
    }

    /// Contact went down
    pub fn on_down(&self, native_id: i64, x: f64, y: f64) {
        let position = self.normalizer.normalize(x, y);
        let mut table = self.table.lock();
        let tick = table.tick;

        if let Some(stale) = table.records.remove(&native_id) {
            debug!(
                "Contact {} went down again without going up, dropping pointer {}",
                native_id, stale.outward_id
            );
            self.channel.push(Message::Remove {
                id: stale.outward_id,
            });
        }

        let outward_id = self.ids.allocate();
        table.records.insert(
            native_id,
            PointerRecord {
                outward_id,
                last_seen: tick,
            },
        );
        trace!("Contact {} mapped to pointer {}", native_id, outward_id);
        self.channel.push(Message::add(outward_id, position));
    }

    /// Contact moved
    pub fn on_move(&self, native_id: i64, x: f64, y: f64) {
        let mut table = self.table.lock();
        let tick = table.tick;
        let Some(record) = table.records.get_mut(&native_id) else {
            trace!("Ignoring motion of unknown contact {}", native_id);
            return;
        };
        record.last_seen = tick;
        let outward_id = record.outward_id;
        self.channel
            .push(Message::add(outward_id, self.normalizer.normalize(x, y)));
    }

    /// Contact lifted
    pub fn on_up(&self, native_id: i64) {
        let mut table = self.table.lock();
        let Some(record) = table.records.remove(&native_id) else {
            trace!("Ignoring release of unknown contact {}", native_id);
            return;
        };
        self.channel.push(Message::Remove {
            id: record.outward_id,
        });
    }

    /// Close the current frame.
    ///
    /// Contacts not reported during the frame are treated as lost and
    /// removed. Only drive this from sources that report every active contact
    /// in each batch; sources that stay silent for stationary contacts would
    /// see them swept.
    pub fn on_frame_boundary(&self) {
        let mut table = self.table.lock();
        table.tick += 1;
        let closed = table.tick - 1;

        let mut stale: Vec<(i64, u32)> = table
            .records
            .iter()
            .filter(|(_, record)| record.last_seen < closed)
            .map(|(native_id, record)| (*native_id, record.outward_id))
            .collect();
        stale.sort_by_key(|(_, outward_id)| *outward_id);

        for (native_id, outward_id) in stale {
            debug!("Contact {} vanished, removing pointer {}", native_id, outward_id);
            table.records.remove(&native_id);
            self.channel.push(Message::Remove { id: outward_id });
        }
    }

    /// Platform cancelled every contact
    pub fn on_cancel_all(&self) {
        let mut table = self.table.lock();
        let mut outward_ids: Vec<u32> = table
            .records
            .drain()
            .map(|(_, record)| record.outward_id)
            .collect();
        outward_ids.sort_unstable();

        if !outward_ids.is_empty() {
            debug!("Cancelling {} contacts", outward_ids.len());
        }
        for id in outward_ids {
            self.channel.push(Message::Remove { id });
        }
    }

    pub fn handle(&self, event: &TouchEvent) {
        match *event {
            TouchEvent::Down { id, x, y } => self.on_down(id, x, y),
            TouchEvent::Motion { id, x, y } => self.on_move(id, x, y),
            TouchEvent::Up { id } => self.on_up(id),
            TouchEvent::Frame => self.on_frame_boundary(),
            TouchEvent::Cancel => self.on_cancel_all(),
        }
    }

    pub fn active_contacts(&self) -> usize {
        self.table.lock().records.len()
    }

    /// Current record of a native contact
    pub fn record(&self, native_id: i64) -> Option<PointerRecord> {
        self.table.lock().records.get(&native_id).copied()
    }
}
