// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*! Kernel lifecycle: compilation, registration, dispatch, teardown. */

pub mod engine;

pub(crate) mod buffer;
pub(crate) mod kernel;
pub(crate) mod source;
pub(crate) mod support;
