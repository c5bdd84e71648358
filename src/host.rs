// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
Host-side collaborators.

The engine is embedded in a larger application that owns two resource systems of its
own: an image table (textures created elsewhere, referenced here by the host's integer
ids) and a memblock allocator (plain byte blobs the scripting layer passes around).
These traits are the engine's view of them.
*/

use crate::driver::TextureName;

/// The host's image table.
///
/// Image ids are the host's, not ours; images may be deleted out from under us between
/// a bind request and the dispatch that consumes it, which is why [ImageRegistry::resolve]
/// can fail after [ImageRegistry::exists] succeeded earlier.
pub trait ImageRegistry {
    /// Does the host currently have an image under this id?
    fn exists(&self, image: u32) -> bool;

    /// The native texture behind the id, if it still exists.
    fn resolve(&self, image: u32) -> Option<TextureName>;
}

/// The host's memblock allocator. Memblocks are plain byte blobs addressed by id.
pub trait Memblocks {
    /// Allocate a fresh block of `size` bytes, or `None` if the host refuses.
    fn allocate(&mut self, size: usize) -> Option<u32>;

    fn bytes(&self, memblock: u32) -> Option<&[u8]>;

    fn bytes_mut(&mut self, memblock: u32) -> Option<&mut [u8]>;

    fn free(&mut self, memblock: u32);
}
