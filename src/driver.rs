// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
The graphics driver as a collaborator.

The engine never touches the native API directly; it drives an implementation of
[Driver]. The real one lives behind the `backend_gl` feature ([crate::GlDriver]); tests
and headless hosts use [crate::testing::MockDriver]. The trait is deliberately
primitive - one method per native operation the engine sequences - so the engine owns
every policy decision and the backend stays a mechanical wrapper.

Failures surface two ways, matching how the native API behaves: compilation returns a
[CompileFailure] carrying the driver's diagnostic log, while everything else latches an
error code the engine collects through [Driver::take_error] after each state-changing
call.
*/

use std::fmt::{Display, Formatter};

/// Native program object name. Zero is the null name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramName(pub u32);

/// Native buffer object name. Zero is the null name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferName(pub u32);

/// Native texture object name. Zero is the null name, which unbinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureName(pub u32);

/// Raw uniform type codes as the native API reports them.
///
/// Only these eight are settable; everything else a program declares (samplers,
/// matrices, unsigned forms...) is carried as unsupported.
pub mod uniform_type {
    pub const FLOAT: u32 = 0x1406;
    pub const FLOAT_VEC2: u32 = 0x8B50;
    pub const FLOAT_VEC3: u32 = 0x8B51;
    pub const FLOAT_VEC4: u32 = 0x8B52;
    pub const INT: u32 = 0x1404;
    pub const INT_VEC2: u32 = 0x8B53;
    pub const INT_VEC3: u32 = 0x8B54;
    pub const INT_VEC4: u32 = 0x8B55;
}

/// One active uniform, as program introspection reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveUniform {
    /// As reported: array uniforms may carry a trailing `[0]`.
    pub name: String,
    /// Declared element count, 1 for non-arrays.
    pub len: u32,
    /// Raw type code, see [uniform_type].
    pub type_code: u32,
}

/// Which step of building a program went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStage {
    /// Could not even create the native shader or program object.
    Create,
    Compile,
    Link,
}

/// A program that did not build. `log` is the driver's diagnostic text, verbatim, and
/// is the entire Display output - hosts want the compiler's own words.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{log}")]
pub struct CompileFailure {
    pub stage: CompileStage,
    pub log: String,
}

/// Work-group axis selector for the per-axis capability queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Index the native API uses for this axis in indexed queries.
    pub fn index(self) -> u32 {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Capability queries the engine can ask of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Limit {
    /// Largest work-group count along one axis.
    GroupCount(Axis),
    /// Largest work-group size along one axis.
    GroupSize(Axis),
    /// Largest total invocations per work group.
    Invocations,
    /// Shared-memory bytes available to a work group.
    SharedMemory,
    /// Largest storage-buffer binding, in bytes.
    StorageBlockSize,
}

/// An error code the driver latched after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverFault {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    OutOfMemory,
    Other(u32),
}

impl Display for DriverFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverFault::InvalidEnum => f.write_str("Invalid enum."),
            DriverFault::InvalidValue => f.write_str("Invalid value."),
            DriverFault::InvalidOperation => f.write_str("Invalid operation."),
            DriverFault::OutOfMemory => f.write_str("Out of memory."),
            DriverFault::Other(code) => write!(f, "Unknown error code {code:#06x}."),
        }
    }
}

/// Everything the engine needs from the native API.
///
/// Methods take `&mut self` because the underlying context is one big mutable state
/// machine, even for reads like [Driver::current_program].
pub trait Driver {
    /// Resolve every entry point the engine needs. `false` if any are missing.
    fn load_entry_points(&mut self) -> bool;

    /// `(major, minor)` API version of the live context.
    fn version(&mut self) -> (i32, i32);

    /// Build a compute program from `source`: compile, link, and release intermediate
    /// objects on every path.
    fn compile_compute_program(&mut self, source: &str) -> Result<ProgramName, CompileFailure>;

    fn delete_program(&mut self, program: ProgramName);

    /// Program currently bound to the context.
    fn current_program(&mut self) -> ProgramName;

    fn use_program(&mut self, program: ProgramName);

    fn active_uniform_count(&mut self, program: ProgramName) -> u32;

    /// Introspect one active uniform. `index` must be below
    /// [Driver::active_uniform_count] for the same program.
    fn active_uniform(&mut self, program: ProgramName, index: u32) -> ActiveUniform;

    /// Storage location of the named uniform, or -1 if the program has none.
    fn uniform_location(&mut self, program: ProgramName, name: &str) -> i32;

    /// Upload `count` elements of `arity` float components each.
    /// `values.len() == count * arity`.
    fn upload_floats(&mut self, location: i32, arity: usize, count: usize, values: &[f32]);

    /// Upload `count` elements of `arity` int components each.
    fn upload_ints(&mut self, location: i32, arity: usize, count: usize, values: &[i32]);

    /// Bind `texture` to image unit `unit`. The null name unbinds the unit.
    fn bind_image_unit(&mut self, unit: u32, texture: TextureName);

    /// Bind `buffer` to storage binding point `point`. The null name unbinds the point.
    fn bind_buffer_point(&mut self, point: u32, buffer: BufferName);

    /// Issue a dispatch of `x` by `y` by `z` work groups against the bound program.
    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32);

    fn gen_buffer(&mut self) -> BufferName;

    fn delete_buffer(&mut self, buffer: BufferName);

    /// (Re)allocate the buffer's storage to `size` bytes, uploading `data` when given
    /// (`data` must then be exactly `size` bytes).
    fn buffer_data(&mut self, buffer: BufferName, size: usize, data: Option<&[u8]>);

    /// Copy the buffer's leading `dest.len()` bytes into `dest`.
    fn read_buffer(&mut self, buffer: BufferName, dest: &mut [u8]);

    fn limit(&mut self, limit: Limit) -> i64;

    /// The error latched since the last call, consuming it. The engine checks this
    /// after every state-changing call above.
    fn take_error(&mut self) -> Option<DriverFault>;
}
