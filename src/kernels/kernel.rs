// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! One loaded kernel and the binding state that travels with it.

use crate::bindings::buffer_slots::BufferSlots;
use crate::bindings::image_slots::ImageSlots;
use crate::bindings::uniforms::UniformTable;
use crate::driver::ProgramName;

/// A compiled compute program plus everything the next dispatch of it needs: the
/// uniform shadow table and both binding tables. Buffer handles in `buffers` are
/// borrowed references into the engine's buffer table, never owned.
#[derive(Debug)]
pub(crate) struct Kernel {
    pub(crate) program: ProgramName,
    pub(crate) uniforms: UniformTable,
    pub(crate) images: ImageSlots,
    pub(crate) buffers: BufferSlots,
}

impl Kernel {
    pub(crate) fn new(program: ProgramName, uniforms: UniformTable) -> Self {
        Kernel {
            program,
            uniforms,
            images: ImageSlots::new(),
            buffers: BufferSlots::new(),
        }
    }
}
