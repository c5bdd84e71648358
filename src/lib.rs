/*! kernels_and_buffers is GPU compute middleware: kernel, uniform and storage-buffer
state management for host applications that issue compute dispatches from a
scripting layer.

Here is a quick chart comparing KB against the other ways a host grows a compute story:

| Strategy            | Examples                  | Caller surface                 | Binding state                     | Error style                            | Runtime size |
|---------------------|---------------------------|--------------------------------|-----------------------------------|----------------------------------------|--------------|
| Raw API calls       | GL/Vulkan in the host     | Whatever you write             | Yours to track, easy to leak      | Check codes yourself, everywhere       | None         |
| Game engine compute | Unity/Godot compute       | Scene-adjacent asset types     | Engine-owned, opaque              | Engine console                         | Massive      |
| GPU frameworks      | CUDA, OpenCL hosts        | Kernel launch APIs             | Framework-owned                   | Return codes or callbacks              | Large        |
| Compute middleware  | kernels_and_buffers       | Handles + set/bind/dispatch    | Shadowed, dirty-tracked, compacted | One policy-gated diagnostic channel    | Tiny         |

# What it manages

The driver calls themselves are thin. What a host actually gets wrong is the state
around them, and that is the part this crate owns:

- **Handles.** Kernels and buffers are opaque positive integers handed across the
  scripting boundary; 0 always means "no resource". Allocation scans forward and never
  hands out an id that is still live.
- **The uniform table.** Each compiled kernel is introspected once into a typed shadow
  table. Sets are validated against the declared type and array size, land in shadow
  storage, and are flushed in batches right before a dispatch actually needs them.
- **Binding slots.** Eight image units and eight buffer binding points per kernel,
  with the buffer table kept front-packed across removals so dispatch walks a
  contiguous run.
- **Error policy.** Scripting hosts cannot catch. Every failure is rendered to text
  and routed through one reporter with four policies (ignore, report first, report
  all, stop), and every operation returns a neutral value instead of unwinding.

# Dispatch discipline

[ComputeEngine::dispatch] binds the kernel's program, its images and buffers, flushes
dirty uniforms, and issues the dispatch. The program that was bound beforehand is
rebound before returning on every path, success or failure, so the host's rendering
state survives whatever the compute layer does in between.

# Backends

The engine is generic over a small [driver::Driver] trait. The `backend_gl` feature
(on by default) provides [GlDriver] over an OpenGL 4.4 context, which is where this
design grew up. The [testing] module ships mock collaborators so the whole engine can
run headless; they are the same doubles this crate's own tests drive.
*/

pub mod bindings;
pub mod driver;
pub mod host;
pub mod kernels;
pub mod testing;

mod error;
mod handles;
mod imp;
mod report;

pub use bindings::uniforms::UniformIdent;
pub use driver::Axis;
pub use kernels::engine::ComputeEngine;
pub use report::{DiagnosticSink, ErrorMode};

#[cfg(feature = "backend_gl")]
pub use imp::GlDriver;
