// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Reusable-safe id allocation for the resource tables.

use std::collections::HashMap;

/// Forward-scanning cursor over the nonzero id space.
///
/// Ids come out in generally increasing order; freed ids are not reclaimed until the
/// cursor wraps. Zero is never handed out - it is the "no resource" sentinel everywhere
/// in this crate.
#[derive(Debug)]
pub(crate) struct HandleCursor {
    next: u32,
}

impl HandleCursor {
    pub(crate) fn new() -> Self {
        HandleCursor { next: 1 }
    }

    /// First free id at or after the cursor, skipping zero and every key already live in
    /// `table`. Leaves the cursor on the returned id.
    ///
    /// Returns `None` once a full scan of the id space finds nothing free.
    pub(crate) fn next_free<V>(&mut self, table: &HashMap<u32, V>) -> Option<u32> {
        let start = self.next;
        loop {
            if self.next != 0 && !table.contains_key(&self.next) {
                return Some(self.next);
            }
            self.next = self.next.wrapping_add(1);
            if self.next == start {
                return None;
            }
        }
    }
}
