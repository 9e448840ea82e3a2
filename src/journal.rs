// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Lock-free movement journal.
//!
//! Every quantity change the ledger applies is appended here in the order
//! it was applied, which gives an audit trail (kardex) per variant and lets
//! conservation be checked against the counters.

use crate::base::{ProductId, VariantId};
use crossbeam::queue::SegQueue;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Units received into on-hand stock (including opening stock).
    Entry,
    /// Units removed as waste or loss.
    Exit,
    /// Units handed to a person.
    Assignment,
    /// Units moved from on-hand to in-transit.
    TransitOut,
    /// Units moved from in-transit back to on-hand.
    TransitReturn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Movement {
    /// Position in the journal, starting at 1.
    pub sequence: u64,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub kind: MovementKind,
    pub quantity: u32,
}

/// Net flows of one variant, summed from the journal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantFlow {
    pub entered: u64,
    pub exited: u64,
    pub assigned: u64,
    pub sent: u64,
    pub returned: u64,
}

impl VariantFlow {
    /// Units the ledger should hold (on-hand plus in-transit).
    pub fn expected_total(&self) -> i128 {
        i128::from(self.entered) - i128::from(self.exited) - i128::from(self.assigned)
    }

    /// Units the ledger should hold in transit.
    pub fn expected_in_transit(&self) -> i128 {
        i128::from(self.sent) - i128::from(self.returned)
    }
}

/// Append-only journal of applied movements.
///
/// Appends are lock-free. Reading drains the queue, so a journal has a
/// single consumer. Movements stay queued until drained: an unbounded
/// journal grows with every movement, so a long-running owner must drain it
/// periodically or build it with [`Journal::bounded`].
#[derive(Debug)]
pub struct Journal {
    movements: SegQueue<Movement>,
    sequence: AtomicU64,
    capacity: Option<usize>,
    discarded: AtomicU64,
}

impl Journal {
    pub fn new() -> Self {
        Self {
            movements: SegQueue::new(),
            sequence: AtomicU64::new(1),
            capacity: None,
            discarded: AtomicU64::new(0),
        }
    }

    /// Journal keeping at most `capacity` pending movements.
    ///
    /// Once full, each append discards the oldest pending movement.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::new()
        }
    }

    /// Journal sized by the configured capacity, unbounded when unset.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        capacity.map_or_else(Self::new, Self::bounded)
    }

    /// Movements dropped by a bounded journal before being drained.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub(crate) fn record(
        &self,
        product_id: ProductId,
        variant_id: VariantId,
        kind: MovementKind,
        quantity: u32,
    ) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.movements.push(Movement {
            sequence,
            product_id,
            variant_id,
            kind,
            quantity,
        });
        if let Some(capacity) = self.capacity {
            while self.movements.len() > capacity {
                if self.movements.pop().is_none() {
                    break;
                }
                self.discarded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of movements not yet drained.
    pub fn len(&self) -> usize {
        self.movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }

    /// Removes and returns every pending movement, oldest first.
    pub fn drain(&self) -> Vec<Movement> {
        let mut out = Vec::with_capacity(self.movements.len());
        while let Some(movement) = self.movements.pop() {
            out.push(movement);
        }
        out.sort_by_key(|m| m.sequence);
        out
    }

    /// Sums movements per variant.
    pub fn flows(movements: &[Movement]) -> HashMap<VariantId, VariantFlow> {
        let mut flows: HashMap<VariantId, VariantFlow> = HashMap::new();
        for movement in movements {
            let flow = flows.entry(movement.variant_id).or_default();
            let quantity = u64::from(movement.quantity);
            match movement.kind {
                MovementKind::Entry => flow.entered += quantity,
                MovementKind::Exit => flow.exited += quantity,
                MovementKind::Assignment => flow.assigned += quantity,
                MovementKind::TransitOut => flow.sent += quantity,
                MovementKind::TransitReturn => flow.returned += quantity,
            }
        }
        flows
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}
