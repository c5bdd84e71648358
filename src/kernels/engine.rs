// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
The engine: owns the kernel and buffer tables and sequences every driver call.

Operations here never return errors. Each one validates, attempts, and on failure
routes a rendered message through the reporter policy and hands back a neutral value
(0, false, or nothing). The scripting layers this serves cannot catch; they can only
read a diagnostic channel.
*/

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use crate::bindings::MAX_IMAGE_UNITS;
use crate::bindings::uniforms::{SetError, Uniform, UniformIdent, UniformTable};
use crate::driver::{Axis, BufferName, Driver, Limit, TextureName};
use crate::error::Error;
use crate::handles::HandleCursor;
use crate::host::{ImageRegistry, Memblocks};
use crate::kernels::buffer::StorageBuffer;
use crate::kernels::kernel::Kernel;
use crate::kernels::source;
use crate::kernels::support::{Support, SupportGate};
use crate::report::{DiagnosticSink, ErrorMode, Reporter};

/**
Compute kernel and storage buffer management over a [Driver].

Owns two handle tables (kernels, buffers), the capability gate, and the error
reporter. One engine per graphics context; drop order follows the context, but call
[ComputeEngine::teardown] first so native objects are released while the context is
still current.

```
use kernels_and_buffers::ComputeEngine;
use kernels_and_buffers::testing::{MockDriver, MockImages};

let mut engine = ComputeEngine::new(MockDriver::new(), |problem: &str| eprintln!("{problem}"));
let kernel = engine.load_kernel("layout(local_size_x = 64) in; void main() {}");
assert_ne!(kernel, 0);

let images = MockImages::new();
assert!(engine.dispatch(&images, kernel, 16, 1, 1));
engine.teardown();
```
*/
pub struct ComputeEngine<D> {
    driver: D,
    reporter: Reporter,
    gate: SupportGate,
    kernels: HashMap<u32, Kernel>,
    buffers: HashMap<u32, StorageBuffer>,
    kernel_ids: HandleCursor,
    buffer_ids: HandleCursor,
}

impl<D> Debug for ComputeEngine<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeEngine")
            .field("kernels", &self.kernels.len())
            .field("buffers", &self.buffers.len())
            .finish_non_exhaustive()
    }
}

impl<D: Driver> ComputeEngine<D> {
    /// `sink` receives every diagnostic the reporter lets through, already rendered.
    pub fn new(driver: D, sink: impl DiagnosticSink + 'static) -> Self {
        ComputeEngine {
            driver,
            reporter: Reporter::new(sink),
            gate: SupportGate::new(),
            kernels: HashMap::new(),
            buffers: HashMap::new(),
            kernel_ids: HandleCursor::new(),
            buffer_ids: HandleCursor::new(),
        }
    }

    /// Probe (once) whether compute is usable here. Quiet: a `false` answer to a
    /// direct question is not an error.
    pub fn is_supported(&mut self) -> bool {
        match self.gate.check(&mut self.driver) {
            Support::FreshlyReady => {
                self.reporter.reset();
                true
            }
            Support::Ready => true,
            Support::Unsupported => false,
        }
    }

    /// Accepts the wire encoding 0..=3 (ignore, report first, report all, stop).
    /// Works even when compute is unsupported, so a host can quiet the reporter
    /// before probing.
    pub fn set_error_mode(&mut self, mode: i32) {
        match ErrorMode::from_raw(mode) {
            Some(mode) => self.reporter.set_mode(mode),
            None => self.absorb(Error::InvalidErrorMode { mode }),
        }
    }

    /// Compile `source` and register it. Returns the new kernel handle, or 0 on any
    /// failure. A version directive is prepended unless the source has its own.
    pub fn load_kernel(&mut self, source: &str) -> u32 {
        if !self.ready() {
            return 0;
        }
        match self.try_load_kernel(source) {
            Ok(kernel) => kernel,
            Err(error) => {
                self.absorb(error);
                0
            }
        }
    }

    /// Release the kernel's native program and free its handle for reuse.
    pub fn delete_kernel(&mut self, kernel: u32) -> bool {
        if !self.ready() {
            return false;
        }
        match self.kernels.remove(&kernel) {
            Some(entry) => {
                self.driver.delete_program(entry.program);
                true
            }
            None => {
                self.absorb(Error::UnknownKernel {
                    kernel,
                    action: "delete kernel",
                });
                false
            }
        }
    }

    /// Attach the host's image `image` to `unit` on `kernel`, or detach with
    /// `image == 0`. Attaches take effect at the next dispatch; a detach unbinds the
    /// hardware unit immediately.
    pub fn bind_image(
        &mut self,
        images: &impl ImageRegistry,
        kernel: u32,
        unit: i32,
        image: u32,
    ) -> bool {
        if !self.ready() {
            return false;
        }
        match self.try_bind_image(images, kernel, unit, image) {
            Ok(()) => true,
            Err(error) => {
                self.absorb(error);
                false
            }
        }
    }

    /// Set element 0. Vector kinds take their arity from the front of `values`.
    pub fn set_uniform_floats(
        &mut self,
        kernel: u32,
        ident: UniformIdent<'_>,
        values: [f32; 4],
    ) -> bool {
        self.set_uniform_floats_element(kernel, ident, 0, values)
    }

    /// Set one element of an array uniform. The value lands in shadow storage and is
    /// uploaded by the next dispatch of this kernel.
    pub fn set_uniform_floats_element(
        &mut self,
        kernel: u32,
        ident: UniformIdent<'_>,
        index: i32,
        values: [f32; 4],
    ) -> bool {
        if !self.ready() {
            return false;
        }
        match self.try_set_uniform(kernel, ident, |record| record.set_floats(index, values)) {
            Ok(()) => true,
            Err(error) => {
                self.absorb(error);
                false
            }
        }
    }

    pub fn set_uniform_ints(
        &mut self,
        kernel: u32,
        ident: UniformIdent<'_>,
        values: [i32; 4],
    ) -> bool {
        self.set_uniform_ints_element(kernel, ident, 0, values)
    }

    pub fn set_uniform_ints_element(
        &mut self,
        kernel: u32,
        ident: UniformIdent<'_>,
        index: i32,
        values: [i32; 4],
    ) -> bool {
        if !self.ready() {
            return false;
        }
        match self.try_set_uniform(kernel, ident, |record| record.set_ints(index, values)) {
            Ok(()) => true,
            Err(error) => {
                self.absorb(error);
                false
            }
        }
    }

    /// Bind `buffer` to `point` on `kernel`, or unbind the point with `buffer == 0`.
    /// Binds take effect at the next dispatch; an unbind releases the hardware point
    /// immediately.
    pub fn bind_buffer(&mut self, kernel: u32, point: u32, buffer: u32) -> bool {
        if !self.ready() {
            return false;
        }
        match self.try_bind_buffer(kernel, point, buffer) {
            Ok(()) => true,
            Err(error) => {
                self.absorb(error);
                false
            }
        }
    }

    /// Run `kernel` over the given work-group grid: bind its program, images and
    /// buffers, flush dirty uniforms, dispatch. The program bound beforehand is
    /// rebound before returning, on success and on every failure path.
    pub fn dispatch(
        &mut self,
        images: &impl ImageRegistry,
        kernel: u32,
        groups_x: i32,
        groups_y: i32,
        groups_z: i32,
    ) -> bool {
        if !self.ready() {
            return false;
        }
        match self.try_dispatch(images, kernel, groups_x, groups_y, groups_z) {
            Ok(()) => true,
            Err(error) => {
                self.absorb(error);
                false
            }
        }
    }

    /// Allocate a zero-filled storage buffer of `size` bytes. Returns the buffer
    /// handle, or 0 on failure.
    pub fn create_buffer(&mut self, size: i32) -> u32 {
        if !self.ready() {
            return 0;
        }
        if size <= 0 {
            self.absorb(Error::InvalidBufferSize { size });
            return 0;
        }
        match self.create_native_buffer(size as usize, None, "create a buffer") {
            Ok(buffer) => buffer,
            Err(error) => {
                self.absorb(error);
                0
            }
        }
    }

    /// Allocate a storage buffer holding a copy of the memblock's bytes.
    pub fn create_buffer_from_memblock(
        &mut self,
        memblocks: &impl Memblocks,
        memblock: u32,
    ) -> u32 {
        if !self.ready() {
            return 0;
        }
        let result = match memblocks.bytes(memblock) {
            None => Err(Error::UnknownMemblock {
                memblock,
                action: "create a buffer",
            }),
            Some([]) => Err(Error::EmptyMemblock {
                memblock,
                action: "create a buffer",
            }),
            Some(bytes) => self.create_native_buffer(bytes.len(), Some(bytes), "create a buffer"),
        };
        match result {
            Ok(buffer) => buffer,
            Err(error) => {
                self.absorb(error);
                0
            }
        }
    }

    /// Release the native buffer and free its handle for reuse. Kernels still
    /// referencing the handle will fail their next dispatch.
    pub fn delete_buffer(&mut self, buffer: u32) -> bool {
        if !self.ready() {
            return false;
        }
        match self.buffers.remove(&buffer) {
            Some(entry) => {
                self.driver.delete_buffer(entry.name);
                true
            }
            None => {
                self.absorb(Error::UnknownBuffer {
                    buffer,
                    action: "delete buffer",
                });
                false
            }
        }
    }

    /// Current storage size in bytes, saturated to `i32::MAX`. 0 for unknown handles.
    pub fn buffer_size(&mut self, buffer: u32) -> i32 {
        if !self.ready() {
            return 0;
        }
        match self.buffers.get(&buffer) {
            Some(entry) => i32::try_from(entry.size).unwrap_or(i32::MAX),
            None => {
                self.absorb(Error::UnknownBuffer {
                    buffer,
                    action: "query buffer size",
                });
                0
            }
        }
    }

    /// Replace the buffer's entire contents (and size) with the memblock's bytes.
    pub fn update_buffer_from_memblock(
        &mut self,
        memblocks: &impl Memblocks,
        buffer: u32,
        memblock: u32,
    ) -> bool {
        if !self.ready() {
            return false;
        }
        match self.try_update_buffer(memblocks, buffer, memblock) {
            Ok(()) => true,
            Err(error) => {
                self.absorb(error);
                false
            }
        }
    }

    /// Read the buffer back into an existing memblock, which must be at least as
    /// large as the buffer.
    pub fn copy_buffer_to_memblock(
        &mut self,
        memblocks: &mut impl Memblocks,
        buffer: u32,
        memblock: u32,
    ) -> bool {
        if !self.ready() {
            return false;
        }
        match self.try_copy_buffer_to_memblock(memblocks, buffer, memblock) {
            Ok(()) => true,
            Err(error) => {
                self.absorb(error);
                false
            }
        }
    }

    /// Snapshot the buffer into a freshly allocated memblock. Returns the memblock
    /// id, or 0 on failure; nothing is left allocated on failure.
    pub fn memblock_from_buffer(&mut self, memblocks: &mut impl Memblocks, buffer: u32) -> u32 {
        if !self.ready() {
            return 0;
        }
        match self.try_memblock_from_buffer(memblocks, buffer) {
            Ok(memblock) => memblock,
            Err(error) => {
                self.absorb(error);
                0
            }
        }
    }

    pub fn max_group_count(&mut self, axis: Axis) -> i32 {
        self.query_limit(Limit::GroupCount(axis))
    }

    pub fn max_group_size(&mut self, axis: Axis) -> i32 {
        self.query_limit(Limit::GroupSize(axis))
    }

    pub fn max_invocations(&mut self) -> i32 {
        self.query_limit(Limit::Invocations)
    }

    /// Shared-memory bytes available to one work group.
    pub fn max_shared_memory(&mut self) -> i32 {
        self.query_limit(Limit::SharedMemory)
    }

    pub fn max_buffer_size(&mut self) -> i32 {
        self.query_limit(Limit::StorageBlockSize)
    }

    /// Release every native program and buffer. Call while the underlying context is
    /// still current; the engine is empty but usable afterwards.
    pub fn teardown(&mut self) {
        let kernels = self.kernels.len();
        let buffers = self.buffers.len();
        for (_, entry) in self.kernels.drain() {
            self.driver.delete_program(entry.program);
        }
        for (_, entry) in self.buffers.drain() {
            self.driver.delete_buffer(entry.name);
        }
        logwise::info_sync!(
            "Released {kernels} kernels and {buffers} buffers",
            kernels = kernels,
            buffers = buffers
        );
    }

    /// Gate every operation. A fresh Ready re-arms the report-first policy;
    /// Unsupported reports (subject to that policy) and fails.
    fn ready(&mut self) -> bool {
        match self.gate.check(&mut self.driver) {
            Support::FreshlyReady => {
                self.reporter.reset();
                true
            }
            Support::Ready => true,
            Support::Unsupported => {
                self.reporter.report(Error::Unsupported);
                false
            }
        }
    }

    fn absorb(&mut self, error: Error) {
        self.reporter.report(error);
    }

    /// Collect the fault the driver latched during the call just made, if any.
    /// `action` is only rendered when there is one.
    fn check_driver(driver: &mut D, action: impl FnOnce() -> String) -> Result<(), Error> {
        match driver.take_error() {
            None => Ok(()),
            Some(fault) => Err(Error::Driver {
                action: action(),
                fault,
            }),
        }
    }

    fn try_load_kernel(&mut self, source: &str) -> Result<u32, Error> {
        let source = source::with_version_directive(source);
        let program = self.driver.compile_compute_program(&source)?;
        let uniforms = UniformTable::introspect(&mut self.driver, program);
        let Some(kernel) = self.kernel_ids.next_free(&self.kernels) else {
            self.driver.delete_program(program);
            return Err(Error::HandlesExhausted {
                action: "load kernel",
            });
        };
        self.kernels.insert(kernel, Kernel::new(program, uniforms));
        logwise::info_sync!("Loaded kernel {kernel}", kernel = kernel);
        Ok(kernel)
    }

    fn try_bind_image(
        &mut self,
        images: &impl ImageRegistry,
        kernel: u32,
        unit: i32,
        image: u32,
    ) -> Result<(), Error> {
        let Some(entry) = self.kernels.get_mut(&kernel) else {
            return Err(Error::UnknownKernel {
                kernel,
                action: "bind an image",
            });
        };
        if unit < 0 || unit as usize >= MAX_IMAGE_UNITS {
            return Err(Error::ImageUnitOutOfRange { unit });
        }
        if image != 0 && !images.exists(image) {
            return Err(Error::UnknownImage { image });
        }
        entry.images.set(unit as usize, image);
        if image == 0 {
            self.driver.bind_image_unit(unit as u32, TextureName(0));
            Self::check_driver(&mut self.driver, || format!("unbind image unit {unit}"))?;
        }
        Ok(())
    }

    fn try_set_uniform(
        &mut self,
        kernel: u32,
        ident: UniformIdent<'_>,
        set: impl FnOnce(&mut Uniform) -> Result<(), SetError>,
    ) -> Result<(), Error> {
        let Some(entry) = self.kernels.get_mut(&kernel) else {
            return Err(Error::UnknownKernel {
                kernel,
                action: "set a uniform",
            });
        };
        let Some(record) = entry.uniforms.find_mut(ident) else {
            return Err(Error::UniformNotFound {
                kernel,
                ident: ident.to_string(),
            });
        };
        set(&mut *record).map_err(|source| Error::SetUniform {
            kernel,
            name: record.name().to_string(),
            source,
        })
    }

    fn try_bind_buffer(&mut self, kernel: u32, point: u32, buffer: u32) -> Result<(), Error> {
        let Some(entry) = self.kernels.get_mut(&kernel) else {
            return Err(Error::UnknownKernel {
                kernel,
                action: "bind a buffer",
            });
        };
        if buffer == 0 {
            // unbinding a point nothing is bound to is not worth a diagnostic
            if entry.buffers.remove(point) {
                self.driver.bind_buffer_point(point, BufferName(0));
                Self::check_driver(&mut self.driver, || format!("unbind buffer point {point}"))?;
            }
            return Ok(());
        }
        if !self.buffers.contains_key(&buffer) {
            return Err(Error::UnknownBuffer {
                buffer,
                action: "bind a buffer",
            });
        }
        entry
            .buffers
            .bind(point, buffer)
            .map_err(|_| Error::NoBindingPointFree {
                kernel,
                buffer,
                point,
            })
    }

    fn try_dispatch(
        &mut self,
        images: &impl ImageRegistry,
        kernel: u32,
        groups_x: i32,
        groups_y: i32,
        groups_z: i32,
    ) -> Result<(), Error> {
        if !self.kernels.contains_key(&kernel) {
            return Err(Error::UnknownKernel {
                kernel,
                action: "dispatch",
            });
        }
        if groups_x <= 0 || groups_y <= 0 || groups_z <= 0 {
            return Err(Error::InvalidGroupCounts {
                kernel,
                x: groups_x,
                y: groups_y,
                z: groups_z,
            });
        }
        // whatever was bound going in must be bound going out, error paths included
        let previous = self.driver.current_program();
        let steps = self.dispatch_steps(
            images,
            kernel,
            groups_x as u32,
            groups_y as u32,
            groups_z as u32,
        );
        self.driver.use_program(previous);
        steps
    }

    fn dispatch_steps(
        &mut self,
        images: &impl ImageRegistry,
        kernel: u32,
        groups_x: u32,
        groups_y: u32,
        groups_z: u32,
    ) -> Result<(), Error> {
        let Some(entry) = self.kernels.get_mut(&kernel) else {
            return Err(Error::UnknownKernel {
                kernel,
                action: "dispatch",
            });
        };
        self.driver.use_program(entry.program);
        Self::check_driver(&mut self.driver, || format!("use kernel {kernel}"))?;

        for (unit, image) in entry.images.occupied() {
            let Some(texture) = images.resolve(image) else {
                return Err(Error::ImageVanished { image });
            };
            self.driver.bind_image_unit(unit, texture);
            Self::check_driver(&mut self.driver, || {
                format!("bind image {image} to unit {unit}")
            })?;
        }

        for binding in entry.buffers.occupied() {
            let Some(buffer) = self.buffers.get(&binding.buffer) else {
                return Err(Error::BufferVanished {
                    buffer: binding.buffer,
                });
            };
            self.driver.bind_buffer_point(binding.point, buffer.name);
            Self::check_driver(&mut self.driver, || {
                format!("bind buffer {} to point {}", binding.buffer, binding.point)
            })?;
        }

        entry.uniforms.flush(&mut self.driver);

        self.driver.dispatch(groups_x, groups_y, groups_z);
        Self::check_driver(&mut self.driver, || format!("dispatch kernel {kernel}"))
    }

    /// Shared tail of both create paths. The native buffer never outlives a failure.
    fn create_native_buffer(
        &mut self,
        size: usize,
        initial: Option<&[u8]>,
        action: &'static str,
    ) -> Result<u32, Error> {
        let name = self.driver.gen_buffer();
        Self::check_driver(&mut self.driver, || action.to_string())?;
        self.driver.buffer_data(name, size, initial);
        if let Err(error) = Self::check_driver(&mut self.driver, || {
            format!("allocate {size} bytes of buffer storage")
        }) {
            self.driver.delete_buffer(name);
            return Err(error);
        }
        let Some(buffer) = self.buffer_ids.next_free(&self.buffers) else {
            self.driver.delete_buffer(name);
            return Err(Error::HandlesExhausted { action });
        };
        self.buffers.insert(buffer, StorageBuffer { name, size });
        Ok(buffer)
    }

    fn try_update_buffer(
        &mut self,
        memblocks: &impl Memblocks,
        buffer: u32,
        memblock: u32,
    ) -> Result<(), Error> {
        let Some(entry) = self.buffers.get_mut(&buffer) else {
            return Err(Error::UnknownBuffer {
                buffer,
                action: "update buffer",
            });
        };
        let Some(bytes) = memblocks.bytes(memblock) else {
            return Err(Error::UnknownMemblock {
                memblock,
                action: "update buffer",
            });
        };
        if bytes.is_empty() {
            return Err(Error::EmptyMemblock {
                memblock,
                action: "update buffer",
            });
        }
        self.driver.buffer_data(entry.name, bytes.len(), Some(bytes));
        Self::check_driver(&mut self.driver, || {
            format!("upload {} bytes to buffer {buffer}", bytes.len())
        })?;
        entry.size = bytes.len();
        Ok(())
    }

    fn try_copy_buffer_to_memblock(
        &mut self,
        memblocks: &mut impl Memblocks,
        buffer: u32,
        memblock: u32,
    ) -> Result<(), Error> {
        let Some(entry) = self.buffers.get(&buffer) else {
            return Err(Error::UnknownBuffer {
                buffer,
                action: "copy buffer contents out",
            });
        };
        let (name, size) = (entry.name, entry.size);
        let Some(dest) = memblocks.bytes_mut(memblock) else {
            return Err(Error::UnknownMemblock {
                memblock,
                action: "copy buffer contents out",
            });
        };
        if dest.len() < size {
            return Err(Error::MemblockTooSmall {
                buffer,
                memblock,
                buffer_len: size,
                memblock_len: dest.len(),
            });
        }
        self.driver.read_buffer(name, &mut dest[..size]);
        Self::check_driver(&mut self.driver, || {
            format!("copy buffer {buffer} into memblock {memblock}")
        })
    }

    fn try_memblock_from_buffer(
        &mut self,
        memblocks: &mut impl Memblocks,
        buffer: u32,
    ) -> Result<u32, Error> {
        let Some(entry) = self.buffers.get(&buffer) else {
            return Err(Error::UnknownBuffer {
                buffer,
                action: "copy buffer contents out",
            });
        };
        let (name, size) = (entry.name, entry.size);
        let Some(memblock) = memblocks.allocate(size) else {
            return Err(Error::MemblockRefused { buffer, size });
        };
        let Some(dest) = memblocks.bytes_mut(memblock) else {
            // allocated but unresolvable reads as a refusal too
            return Err(Error::MemblockRefused { buffer, size });
        };
        self.driver.read_buffer(name, dest);
        if let Err(error) = Self::check_driver(&mut self.driver, || {
            format!("copy buffer {buffer} into a new memblock")
        }) {
            memblocks.free(memblock);
            return Err(error);
        }
        Ok(memblock)
    }

    fn query_limit(&mut self, limit: Limit) -> i32 {
        if !self.ready() {
            return 0;
        }
        let value = self.driver.limit(limit);
        value.clamp(0, i32::MAX as i64) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDriver;

    #[test]
    fn limits_clamp_to_the_queryable_ceiling() {
        let driver = MockDriver::new();
        driver.set_limit(Limit::StorageBlockSize, i64::from(i32::MAX) * 4);
        driver.set_limit(Limit::Invocations, -3);
        let mut engine = ComputeEngine::new(driver, |_: &str| {});
        assert_eq!(engine.max_buffer_size(), i32::MAX);
        assert_eq!(engine.max_invocations(), 0);
        assert_eq!(engine.max_group_count(Axis::X), 65535);
    }

    #[test]
    fn buffer_size_saturates_past_the_int_ceiling() {
        let mut engine = ComputeEngine::new(MockDriver::new(), |_: &str| {});
        assert!(engine.is_supported());
        engine.buffers.insert(
            7,
            StorageBuffer {
                name: BufferName(500),
                size: usize::MAX,
            },
        );
        assert_eq!(engine.buffer_size(7), i32::MAX);
    }

    #[test]
    fn debug_reports_table_sizes_without_spilling_contents() {
        let mut engine = ComputeEngine::new(MockDriver::new(), |_: &str| {});
        engine.create_buffer(16);
        assert_eq!(format!("{engine:?}"), "ComputeEngine { kernels: 0, buffers: 1, .. }");
    }
}
