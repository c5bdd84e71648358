// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
The per-kernel image unit table.

Unlike buffer points these are flat: eight units addressed directly by index, holding
the host's image id or 0 for empty. Validation (unit range, image existence) happens
in the engine before anything lands here.
*/

use crate::bindings::MAX_IMAGE_UNITS;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ImageSlots {
    units: [u32; MAX_IMAGE_UNITS],
}

impl ImageSlots {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Callers have already range-checked `unit`.
    pub(crate) fn set(&mut self, unit: usize, image: u32) {
        self.units[unit] = image;
    }

    /// `(unit, image)` for every non-empty unit, in unit order.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, image)| **image != 0)
            .map(|(unit, image)| (unit as u32, *image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupied_skips_empty_units() {
        let mut slots = ImageSlots::new();
        slots.set(1, 40);
        slots.set(6, 41);
        assert_eq!(slots.occupied().collect::<Vec<_>>(), vec![(1, 40), (6, 41)]);
    }

    #[test]
    fn zero_empties_a_unit() {
        let mut slots = ImageSlots::new();
        slots.set(3, 40);
        slots.set(3, 0);
        assert_eq!(slots.occupied().count(), 0);
    }
}
