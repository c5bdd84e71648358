// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//at the moment the only real backend is GL; headless hosts use crate::testing

#[cfg(feature = "backend_gl")]
mod gl;

#[cfg(feature = "backend_gl")]
pub use gl::GlDriver;
