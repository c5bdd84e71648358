// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
The per-kernel buffer binding table.

Eight slots, each pairing a binding point with a buffer handle. Occupied slots are
packed at the front; removal moves the last slot of the contiguous run into the hole,
so scans can stop at the first empty slot.
*/

use crate::bindings::MAX_BUFFER_POINTS;

/// One occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufferBinding {
    pub point: u32,
    pub buffer: u32,
}

/// All eight binding points are occupied and none matches the requested point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotsFull;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct BufferSlots {
    slots: [Option<BufferBinding>; MAX_BUFFER_POINTS],
}

impl BufferSlots {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bind `buffer` at `point`: overwrite the slot already holding `point`, else
    /// take the first free slot.
    pub(crate) fn bind(&mut self, point: u32, buffer: u32) -> Result<(), SlotsFull> {
        for slot in &mut self.slots {
            match slot {
                Some(binding) if binding.point == point => {
                    binding.buffer = buffer;
                    return Ok(());
                }
                // front-packing means the first empty slot ends the occupied run
                None => {
                    *slot = Some(BufferBinding { point, buffer });
                    return Ok(());
                }
                Some(_) => {}
            }
        }
        Err(SlotsFull)
    }

    /// Unbind `point`, restoring front-packing by moving the last occupied slot of
    /// the run into the hole. `false` if nothing was bound there.
    pub(crate) fn remove(&mut self, point: u32) -> bool {
        for i in 0..self.slots.len() {
            let Some(binding) = self.slots[i] else {
                return false;
            };
            if binding.point != point {
                continue;
            }
            let mut last = i;
            while last + 1 < self.slots.len() && self.slots[last + 1].is_some() {
                last += 1;
            }
            if last > i {
                self.slots[i] = self.slots[last].take();
            } else {
                self.slots[i] = None;
            }
            return true;
        }
        false
    }

    /// The occupied run, in slot order.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = BufferBinding> + '_ {
        self.slots.iter().map_while(|slot| *slot)
    }

    #[cfg(test)]
    fn is_front_packed(&self) -> bool {
        let mut seen_empty = false;
        for slot in &self.slots {
            match slot {
                None => seen_empty = true,
                Some(_) if seen_empty => return false,
                Some(_) => {}
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(slots: &BufferSlots) -> Vec<(u32, u32)> {
        slots.occupied().map(|b| (b.point, b.buffer)).collect()
    }

    #[test]
    fn bind_fills_front_slots_and_overwrites_matching_points() {
        let mut slots = BufferSlots::new();
        slots.bind(3, 10).unwrap();
        slots.bind(5, 11).unwrap();
        assert_eq!(bindings(&slots), vec![(3, 10), (5, 11)]);

        slots.bind(3, 12).unwrap();
        assert_eq!(bindings(&slots), vec![(3, 12), (5, 11)]);
    }

    #[test]
    fn ninth_distinct_point_is_refused_without_mutation() {
        let mut slots = BufferSlots::new();
        for point in 0..8 {
            slots.bind(point, 100 + point).unwrap();
        }
        let before = slots.clone();
        assert_eq!(slots.bind(8, 200), Err(SlotsFull));
        assert_eq!(slots, before);

        // an occupied point can still be rebound when full
        slots.bind(4, 300).unwrap();
        assert_eq!(slots.occupied().nth(4), Some(BufferBinding {
            point: 4,
            buffer: 300
        }));
    }

    #[test]
    fn remove_moves_the_last_of_the_run_into_the_hole() {
        let mut slots = BufferSlots::new();
        for point in [2, 4, 6, 8] {
            slots.bind(point, point * 10).unwrap();
        }
        assert!(slots.remove(4));
        assert_eq!(bindings(&slots), vec![(2, 20), (8, 80), (6, 60)]);
        assert!(slots.is_front_packed());
    }

    #[test]
    fn remove_of_the_last_slot_just_clears_it() {
        let mut slots = BufferSlots::new();
        slots.bind(1, 10).unwrap();
        slots.bind(2, 20).unwrap();
        assert!(slots.remove(2));
        assert_eq!(bindings(&slots), vec![(1, 10)]);
        assert!(slots.is_front_packed());
    }

    #[test]
    fn remove_of_an_unbound_point_is_a_quiet_no_op() {
        let mut slots = BufferSlots::new();
        slots.bind(1, 10).unwrap();
        assert!(!slots.remove(7));
        assert_eq!(bindings(&slots), vec![(1, 10)]);
        assert!(!BufferSlots::new().remove(0));
    }

    #[test]
    fn packing_survives_a_churn_of_binds_and_removes() {
        let mut slots = BufferSlots::new();
        for point in 0..8 {
            slots.bind(point, point + 1).unwrap();
        }
        for point in [0, 3, 7, 5] {
            assert!(slots.remove(point));
            assert!(slots.is_front_packed());
        }
        slots.bind(9, 90).unwrap();
        assert!(slots.is_front_packed());
        assert_eq!(slots.occupied().count(), 5);
    }
}
