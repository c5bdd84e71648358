// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
Everything that can go wrong, in the words the host sees.

Operations on [crate::ComputeEngine] do not return these; they absorb them, render
them through the reporter policy, and hand back a neutral value. The enum exists so
every failure is built in one place and the message text stays uniform: `Failed to
<action>. <reason>.`
*/

use crate::bindings::MAX_IMAGE_UNITS;
use crate::bindings::uniforms::SetError;
use crate::driver::{CompileFailure, DriverFault};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("Compute shaders are not supported by this driver.")]
    Unsupported,

    #[error("Invalid error mode {mode}.")]
    InvalidErrorMode { mode: i32 },

    /// The driver's diagnostic log, verbatim.
    #[error("{0}")]
    Compile(#[from] CompileFailure),

    #[error("Failed to {action}. Unknown kernel {kernel}.")]
    UnknownKernel { kernel: u32, action: &'static str },

    #[error("Failed to {action}. Unknown buffer {buffer}.")]
    UnknownBuffer { buffer: u32, action: &'static str },

    #[error("Failed to {action}. Unknown memblock {memblock}.")]
    UnknownMemblock { memblock: u32, action: &'static str },

    #[error("Failed to bind image {image}. No such image exists.")]
    UnknownImage { image: u32 },

    #[error(
        "Failed to bind image unit {unit}. Units 0 through {} are available.",
        MAX_IMAGE_UNITS - 1
    )]
    ImageUnitOutOfRange { unit: i32 },

    /// `ident` is the rendered form of a [crate::UniformIdent].
    #[error("Failed to find uniform {ident} in kernel {kernel}.")]
    UniformNotFound { kernel: u32, ident: String },

    #[error("Failed to set uniform '{name}' on kernel {kernel}. {source}")]
    SetUniform {
        kernel: u32,
        name: String,
        source: SetError,
    },

    #[error(
        "Failed to bind buffer {buffer} to point {point} on kernel {kernel}. No binding points are available."
    )]
    NoBindingPointFree { kernel: u32, buffer: u32, point: u32 },

    #[error("Failed to dispatch kernel {kernel}. Group counts {x}x{y}x{z} must all be positive.")]
    InvalidGroupCounts { kernel: u32, x: i32, y: i32, z: i32 },

    #[error("Failed to create buffer. Size {size} must be positive.")]
    InvalidBufferSize { size: i32 },

    #[error("Failed to {action}. Memblock {memblock} is empty.")]
    EmptyMemblock { memblock: u32, action: &'static str },

    #[error(
        "Failed to copy buffer {buffer} into memblock {memblock}. The buffer holds {buffer_len} bytes but the memblock only holds {memblock_len}."
    )]
    MemblockTooSmall {
        buffer: u32,
        memblock: u32,
        buffer_len: usize,
        memblock_len: usize,
    },

    #[error("Failed to copy buffer {buffer} out. The host refused a {size} byte memblock.")]
    MemblockRefused { buffer: u32, size: usize },

    #[error("Failed to {action}. All handles are in use.")]
    HandlesExhausted { action: &'static str },

    #[error("Failed to bind image {image}. Has the image been deleted?")]
    ImageVanished { image: u32 },

    #[error("Failed to bind buffer {buffer}. Has the buffer been deleted?")]
    BufferVanished { buffer: u32 },

    #[error("Failed to {action}. {fault}")]
    Driver { action: String, fault: DriverFault },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::CompileStage;

    #[test]
    fn messages_read_as_full_sentences() {
        let e = Error::UnknownKernel {
            kernel: 7,
            action: "dispatch",
        };
        assert_eq!(e.to_string(), "Failed to dispatch. Unknown kernel 7.");

        let e = Error::ImageUnitOutOfRange { unit: 9 };
        assert_eq!(
            e.to_string(),
            "Failed to bind image unit 9. Units 0 through 7 are available."
        );

        let e = Error::InvalidGroupCounts {
            kernel: 2,
            x: 0,
            y: 1,
            z: 1,
        };
        assert_eq!(
            e.to_string(),
            "Failed to dispatch kernel 2. Group counts 0x1x1 must all be positive."
        );
    }

    #[test]
    fn compile_failures_pass_the_log_through_verbatim() {
        let e = Error::Compile(CompileFailure {
            stage: CompileStage::Compile,
            log: "0:3(1): error: syntax error, unexpected NEW_IDENTIFIER".to_string(),
        });
        assert_eq!(
            e.to_string(),
            "0:3(1): error: syntax error, unexpected NEW_IDENTIFIER"
        );
    }
}
