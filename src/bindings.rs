// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*! Per-kernel binding state: uniforms, image units, buffer binding points. */

pub mod uniforms;

pub(crate) mod buffer_slots;
pub(crate) mod image_slots;

/// Image units available to one kernel.
pub const MAX_IMAGE_UNITS: usize = 8;
/// Storage-buffer binding points available to one kernel.
pub const MAX_BUFFER_POINTS: usize = 8;
