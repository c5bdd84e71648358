// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

use crate::driver::BufferName;

/// One storage buffer: the native object and the byte size of its current storage.
/// Size changes when the host re-uploads; transfers read it back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StorageBuffer {
    pub(crate) name: BufferName,
    pub(crate) size: usize,
}
