// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Storage buffer creation, memblock transfers in both directions, and native
//! cleanup on the failure paths.

use std::sync::{Arc, Mutex};

use kernels_and_buffers::ComputeEngine;
use kernels_and_buffers::driver::{BufferName, DriverFault};
use kernels_and_buffers::host::Memblocks;
use kernels_and_buffers::testing::{Call, MockDriver, MockMemblocks, recording_sink};

fn fresh_engine() -> (ComputeEngine<MockDriver>, MockDriver, Arc<Mutex<Vec<String>>>) {
    let driver = MockDriver::new();
    let probe = driver.clone();
    let (sink, delivered) = recording_sink();
    (ComputeEngine::new(driver, sink), probe, delivered)
}

fn messages(delivered: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    delivered.lock().unwrap().clone()
}

#[test]
fn create_buffer_rejects_nonpositive_sizes() {
    let (mut engine, probe, delivered) = fresh_engine();
    engine.set_error_mode(2);

    assert_eq!(engine.create_buffer(0), 0);
    assert_eq!(engine.create_buffer(-5), 0);
    assert!(probe.calls().is_empty());
    assert_eq!(
        messages(&delivered),
        [
            "Failed to create buffer. Size 0 must be positive.",
            "Failed to create buffer. Size -5 must be positive.",
        ]
    );

    let buffer = engine.create_buffer(16);
    assert_eq!(buffer, 1);
    assert_eq!(engine.buffer_size(buffer), 16);
    assert_eq!(probe.buffer_contents(BufferName(500)), Some(vec![0; 16]));
}

#[test]
fn create_from_memblock_copies_the_bytes() {
    let (mut engine, probe, _delivered) = fresh_engine();
    let mut memblocks = MockMemblocks::new();
    let source = memblocks.insert(&[1, 2, 3, 4]);

    let buffer = engine.create_buffer_from_memblock(&memblocks, source);
    assert_ne!(buffer, 0);
    assert_eq!(engine.buffer_size(buffer), 4);
    assert_eq!(probe.buffer_contents(BufferName(500)), Some(vec![1, 2, 3, 4]));
}

#[test]
fn create_from_memblock_rejects_missing_and_empty_sources() {
    let (mut engine, _probe, delivered) = fresh_engine();
    engine.set_error_mode(2);
    let mut memblocks = MockMemblocks::new();
    let empty = memblocks.insert(&[]);

    assert_eq!(engine.create_buffer_from_memblock(&memblocks, 9), 0);
    assert_eq!(engine.create_buffer_from_memblock(&memblocks, empty), 0);
    assert_eq!(
        messages(&delivered),
        [
            "Failed to create a buffer. Unknown memblock 9.",
            "Failed to create a buffer. Memblock 1 is empty.",
        ]
    );
}

#[test]
fn update_replaces_contents_and_size() {
    let (mut engine, probe, _delivered) = fresh_engine();
    let mut memblocks = MockMemblocks::new();
    let buffer = engine.create_buffer(2);
    let block = memblocks.insert(&[7, 8, 9]);

    assert!(engine.update_buffer_from_memblock(&memblocks, buffer, block));
    assert_eq!(engine.buffer_size(buffer), 3);
    assert_eq!(probe.buffer_contents(BufferName(500)), Some(vec![7, 8, 9]));
}

#[test]
fn update_validates_both_handles() {
    let (mut engine, _probe, delivered) = fresh_engine();
    engine.set_error_mode(2);
    let mut memblocks = MockMemblocks::new();
    let buffer = engine.create_buffer(2);
    let block = memblocks.insert(&[7]);
    let empty = memblocks.insert(&[]);

    assert!(!engine.update_buffer_from_memblock(&memblocks, 42, block));
    assert!(!engine.update_buffer_from_memblock(&memblocks, buffer, 42));
    assert!(!engine.update_buffer_from_memblock(&memblocks, buffer, empty));
    assert_eq!(
        messages(&delivered),
        [
            "Failed to update buffer. Unknown buffer 42.",
            "Failed to update buffer. Unknown memblock 42.",
            "Failed to update buffer. Memblock 2 is empty.",
        ]
    );
}

/// A faulted upload leaves the recorded size alone.
#[test]
fn update_keeps_the_old_size_when_the_driver_faults() {
    let (mut engine, probe, delivered) = fresh_engine();
    let mut memblocks = MockMemblocks::new();
    let buffer = engine.create_buffer(16);
    let block = memblocks.insert(&[1, 2, 3, 4, 5]);

    probe.fail_next("buffer_data", DriverFault::InvalidOperation);
    assert!(!engine.update_buffer_from_memblock(&memblocks, buffer, block));
    assert_eq!(engine.buffer_size(buffer), 16);
    assert_eq!(
        messages(&delivered),
        ["Failed to upload 5 bytes to buffer 1. Invalid operation."]
    );
}

#[test]
fn copy_out_requires_a_large_enough_memblock() {
    let (mut engine, _probe, delivered) = fresh_engine();
    let mut memblocks = MockMemblocks::new();
    let source = memblocks.insert(&[1, 2, 3, 4]);
    let buffer = engine.create_buffer_from_memblock(&memblocks, source);

    let small = memblocks.insert(&[0; 2]);
    assert!(!engine.copy_buffer_to_memblock(&mut memblocks, buffer, small));
    assert_eq!(
        messages(&delivered),
        ["Failed to copy buffer 1 into memblock 2. The buffer holds 4 bytes but the memblock only holds 2."]
    );

    let big = memblocks.insert(&[0; 8]);
    assert!(engine.copy_buffer_to_memblock(&mut memblocks, buffer, big));
    // only the buffer's length is written; the tail stays as it was
    assert_eq!(memblocks.bytes(big), Some(&[1, 2, 3, 4, 0, 0, 0, 0][..]));
}

#[test]
fn memblock_from_buffer_snapshots_the_contents() {
    let (mut engine, _probe, _delivered) = fresh_engine();
    let mut memblocks = MockMemblocks::new();
    let source = memblocks.insert(&[5, 6, 7]);
    let buffer = engine.create_buffer_from_memblock(&memblocks, source);

    let snapshot = engine.memblock_from_buffer(&mut memblocks, buffer);
    assert_ne!(snapshot, 0);
    assert_ne!(snapshot, source);
    assert_eq!(memblocks.bytes(snapshot), Some(&[5, 6, 7][..]));
}

/// A readback fault must not leak the memblock the engine just allocated.
#[test]
fn memblock_from_buffer_frees_the_block_when_the_read_faults() {
    let (mut engine, probe, delivered) = fresh_engine();
    let mut memblocks = MockMemblocks::new();
    let buffer = engine.create_buffer(4);

    probe.fail_next("read_buffer", DriverFault::InvalidOperation);
    assert_eq!(engine.memblock_from_buffer(&mut memblocks, buffer), 0);
    assert!(memblocks.is_empty());
    assert_eq!(
        messages(&delivered),
        ["Failed to copy buffer 1 into a new memblock. Invalid operation."]
    );
}

#[test]
fn memblock_from_buffer_reports_a_refused_allocation() {
    let (mut engine, _probe, delivered) = fresh_engine();
    let mut memblocks = MockMemblocks::new();
    memblocks.refuse_allocations();
    let buffer = engine.create_buffer(4);

    assert_eq!(engine.memblock_from_buffer(&mut memblocks, buffer), 0);
    assert_eq!(
        messages(&delivered),
        ["Failed to copy buffer 1 out. The host refused a 4 byte memblock."]
    );
}

/// When the driver cannot even produce a name there is nothing to release.
#[test]
fn a_failed_gen_releases_nothing() {
    let (mut engine, probe, delivered) = fresh_engine();
    probe.fail_next("gen_buffer", DriverFault::OutOfMemory);

    assert_eq!(engine.create_buffer(16), 0);
    assert_eq!(
        messages(&delivered),
        ["Failed to create a buffer. Out of memory."]
    );
    assert!(
        !probe
            .calls()
            .iter()
            .any(|call| matches!(call, Call::DeleteBuffer(_)))
    );
}

/// When allocation fails after the name exists, the name is given back.
#[test]
fn a_failed_allocation_releases_the_native_buffer() {
    let (mut engine, probe, delivered) = fresh_engine();
    probe.fail_next("buffer_data", DriverFault::OutOfMemory);

    assert_eq!(engine.create_buffer(1 << 20), 0);
    assert_eq!(
        messages(&delivered),
        ["Failed to allocate 1048576 bytes of buffer storage. Out of memory."]
    );
    assert!(
        probe
            .calls()
            .iter()
            .any(|call| matches!(call, Call::DeleteBuffer(BufferName(500))))
    );
    assert!(probe.live_buffers().is_empty());
}

#[test]
fn delete_and_size_report_unknown_handles() {
    let (mut engine, _probe, delivered) = fresh_engine();
    engine.set_error_mode(2);

    assert!(!engine.delete_buffer(3));
    assert_eq!(engine.buffer_size(3), 0);
    assert_eq!(
        messages(&delivered),
        [
            "Failed to delete buffer. Unknown buffer 3.",
            "Failed to query buffer size. Unknown buffer 3.",
        ]
    );
}

#[test]
fn deleting_a_buffer_releases_the_native_object() {
    let (mut engine, probe, _delivered) = fresh_engine();
    let first = engine.create_buffer(4);
    let second = engine.create_buffer(4);
    assert_eq!(probe.live_buffers(), vec![500, 501]);

    assert!(engine.delete_buffer(first));
    assert_eq!(probe.live_buffers(), vec![501]);

    // the freed handle is not handed out while the cursor is beyond it
    let third = engine.create_buffer(4);
    assert_eq!((first, second, third), (1, 2, 3));
}
