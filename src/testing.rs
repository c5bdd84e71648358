// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
Test doubles for every collaborator the engine has.

[MockDriver] records the call stream it sees and plays back whatever failures a test
stages; [MockImages] and [MockMemblocks] stand in for the host registries. The module
ships in the crate proper (not behind `cfg(test)`) so integration tests and headless
hosts can drive an engine with no GPU anywhere.

[MockDriver] clones share state, so a test can keep one handle for staging and
inspection after moving the other into the engine.
*/

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::driver::{
    ActiveUniform, BufferName, CompileFailure, CompileStage, Driver, DriverFault, Limit,
    ProgramName, TextureName,
};
use crate::host::{ImageRegistry, Memblocks};

/// One recorded driver call. Reads (version probes, introspection, limit queries) are
/// not recorded; state changes and transfers are.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    UseProgram(ProgramName),
    DeleteProgram(ProgramName),
    BindImageUnit { unit: u32, texture: TextureName },
    BindBufferPoint { point: u32, buffer: BufferName },
    UploadFloats {
        location: i32,
        arity: usize,
        count: usize,
        values: Vec<f32>,
    },
    UploadInts {
        location: i32,
        arity: usize,
        count: usize,
        values: Vec<i32>,
    },
    Dispatch { x: u32, y: u32, z: u32 },
    GenBuffer(BufferName),
    DeleteBuffer(BufferName),
    BufferData { buffer: BufferName, size: usize },
    ReadBuffer { buffer: BufferName, len: usize },
}

#[derive(Debug)]
struct MockState {
    calls: Vec<Call>,
    entry_points: bool,
    probe_count: usize,
    version: (i32, i32),
    bound_program: ProgramName,
    next_program: u32,
    next_buffer: u32,
    programs: HashMap<u32, Vec<ActiveUniform>>,
    locations: HashMap<(u32, String), i32>,
    staged_uniforms: VecDeque<Vec<ActiveUniform>>,
    compiled_sources: Vec<String>,
    fail_compile: Option<(CompileStage, String)>,
    fault_plan: HashMap<&'static str, DriverFault>,
    pending_fault: Option<DriverFault>,
    limits: HashMap<Limit, i64>,
    buffers: HashMap<u32, Vec<u8>>,
}

impl Default for MockState {
    fn default() -> Self {
        MockState {
            calls: Vec::new(),
            entry_points: true,
            probe_count: 0,
            version: (4, 6),
            bound_program: ProgramName(0),
            next_program: 1000,
            next_buffer: 500,
            programs: HashMap::new(),
            locations: HashMap::new(),
            staged_uniforms: VecDeque::new(),
            compiled_sources: Vec::new(),
            fail_compile: None,
            fault_plan: HashMap::new(),
            pending_fault: None,
            limits: HashMap::new(),
            buffers: HashMap::new(),
        }
    }
}

/// A [Driver] that exists to be interrogated.
///
/// Defaults to a healthy API 4.6 driver where every compile succeeds against an
/// empty uniform table. Tests bend it with the staging methods before handing it to
/// an engine.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Queue the uniform table the next compiled program will report. Storage
    /// locations are assigned in declaration order against the subscript-stripped
    /// names. Stage once per expected compile.
    pub fn stage_uniforms(&self, uniforms: Vec<ActiveUniform>) {
        self.state().staged_uniforms.push_back(uniforms);
    }

    /// The next compile fails at `stage` with `log` as its diagnostic text.
    pub fn fail_next_compile(&self, stage: CompileStage, log: &str) {
        self.state().fail_compile = Some((stage, log.to_string()));
    }

    /// The next run of the named operation latches `fault` for [Driver::take_error]
    /// and skips its effect. Operation names: `use_program`, `bind_image_unit`,
    /// `bind_buffer_point`, `dispatch`, `gen_buffer`, `buffer_data`, `read_buffer`.
    pub fn fail_next(&self, operation: &'static str, fault: DriverFault) {
        self.state().fault_plan.insert(operation, fault);
    }

    pub fn set_version(&self, version: (i32, i32)) {
        self.state().version = version;
    }

    pub fn deny_entry_points(&self) {
        self.state().entry_points = false;
    }

    pub fn set_limit(&self, limit: Limit, value: i64) {
        self.state().limits.insert(limit, value);
    }

    /// Pretend the host bound this program before the engine got involved.
    pub fn set_bound_program(&self, program: ProgramName) {
        self.state().bound_program = program;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn bound_program(&self) -> ProgramName {
        self.state().bound_program
    }

    /// How many times the engine resolved entry points.
    pub fn probe_count(&self) -> usize {
        self.state().probe_count
    }

    /// Names of program objects compiled and not yet deleted, ascending.
    pub fn live_programs(&self) -> Vec<u32> {
        let mut names: Vec<u32> = self.state().programs.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Names of buffer objects generated and not yet deleted, ascending.
    pub fn live_buffers(&self) -> Vec<u32> {
        let mut names: Vec<u32> = self.state().buffers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Current storage of a live buffer object.
    pub fn buffer_contents(&self, buffer: BufferName) -> Option<Vec<u8>> {
        self.state().buffers.get(&buffer.0).cloned()
    }

    /// Every source text handed to the compiler, in order, fixups included.
    pub fn compiled_sources(&self) -> Vec<String> {
        self.state().compiled_sources.clone()
    }
}

/// Arm the pending fault if the test staged one for `operation`. `true` means the
/// operation should skip its effect.
fn arm(state: &mut MockState, operation: &'static str) -> bool {
    if let Some(fault) = state.fault_plan.remove(operation) {
        state.pending_fault = Some(fault);
        true
    } else {
        false
    }
}

impl Driver for MockDriver {
    fn load_entry_points(&mut self) -> bool {
        let mut state = self.state();
        state.probe_count += 1;
        state.entry_points
    }

    fn version(&mut self) -> (i32, i32) {
        self.state().version
    }

    fn compile_compute_program(&mut self, source: &str) -> Result<ProgramName, CompileFailure> {
        let mut state = self.state();
        state.compiled_sources.push(source.to_string());
        if let Some((stage, log)) = state.fail_compile.take() {
            return Err(CompileFailure { stage, log });
        }
        let name = state.next_program;
        state.next_program += 1;
        let uniforms = state.staged_uniforms.pop_front().unwrap_or_default();
        for (index, uniform) in uniforms.iter().enumerate() {
            let base = match uniform.name.find('[') {
                Some(subscript) => &uniform.name[..subscript],
                None => &uniform.name,
            };
            state
                .locations
                .insert((name, base.to_string()), index as i32);
        }
        state.programs.insert(name, uniforms);
        Ok(ProgramName(name))
    }

    fn delete_program(&mut self, program: ProgramName) {
        let mut state = self.state();
        state.calls.push(Call::DeleteProgram(program));
        state.programs.remove(&program.0);
    }

    fn current_program(&mut self) -> ProgramName {
        self.state().bound_program
    }

    fn use_program(&mut self, program: ProgramName) {
        let mut state = self.state();
        state.calls.push(Call::UseProgram(program));
        if !arm(&mut state, "use_program") {
            state.bound_program = program;
        }
    }

    fn active_uniform_count(&mut self, program: ProgramName) -> u32 {
        self.state()
            .programs
            .get(&program.0)
            .map_or(0, |uniforms| uniforms.len() as u32)
    }

    fn active_uniform(&mut self, program: ProgramName, index: u32) -> ActiveUniform {
        let state = self.state();
        let Some(uniforms) = state.programs.get(&program.0) else {
            panic!("introspecting unknown program {}", program.0);
        };
        uniforms[index as usize].clone()
    }

    fn uniform_location(&mut self, program: ProgramName, name: &str) -> i32 {
        self.state()
            .locations
            .get(&(program.0, name.to_string()))
            .copied()
            .unwrap_or(-1)
    }

    fn upload_floats(&mut self, location: i32, arity: usize, count: usize, values: &[f32]) {
        self.state().calls.push(Call::UploadFloats {
            location,
            arity,
            count,
            values: values.to_vec(),
        });
    }

    fn upload_ints(&mut self, location: i32, arity: usize, count: usize, values: &[i32]) {
        self.state().calls.push(Call::UploadInts {
            location,
            arity,
            count,
            values: values.to_vec(),
        });
    }

    fn bind_image_unit(&mut self, unit: u32, texture: TextureName) {
        let mut state = self.state();
        state.calls.push(Call::BindImageUnit { unit, texture });
        arm(&mut state, "bind_image_unit");
    }

    fn bind_buffer_point(&mut self, point: u32, buffer: BufferName) {
        let mut state = self.state();
        state.calls.push(Call::BindBufferPoint { point, buffer });
        arm(&mut state, "bind_buffer_point");
    }

    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) {
        let mut state = self.state();
        state.calls.push(Call::Dispatch {
            x: groups_x,
            y: groups_y,
            z: groups_z,
        });
        arm(&mut state, "dispatch");
    }

    fn gen_buffer(&mut self) -> BufferName {
        let mut state = self.state();
        if arm(&mut state, "gen_buffer") {
            state.calls.push(Call::GenBuffer(BufferName(0)));
            return BufferName(0);
        }
        let name = state.next_buffer;
        state.next_buffer += 1;
        state.calls.push(Call::GenBuffer(BufferName(name)));
        state.buffers.insert(name, Vec::new());
        BufferName(name)
    }

    fn delete_buffer(&mut self, buffer: BufferName) {
        let mut state = self.state();
        state.calls.push(Call::DeleteBuffer(buffer));
        state.buffers.remove(&buffer.0);
    }

    fn buffer_data(&mut self, buffer: BufferName, size: usize, data: Option<&[u8]>) {
        let mut state = self.state();
        state.calls.push(Call::BufferData { buffer, size });
        if arm(&mut state, "buffer_data") {
            return;
        }
        let contents = match data {
            Some(bytes) => bytes.to_vec(),
            None => vec![0; size],
        };
        state.buffers.insert(buffer.0, contents);
    }

    fn read_buffer(&mut self, buffer: BufferName, dest: &mut [u8]) {
        let mut state = self.state();
        state.calls.push(Call::ReadBuffer {
            buffer,
            len: dest.len(),
        });
        if arm(&mut state, "read_buffer") {
            return;
        }
        let Some(contents) = state.buffers.get(&buffer.0) else {
            panic!("reading unknown buffer {}", buffer.0);
        };
        dest.copy_from_slice(&contents[..dest.len()]);
    }

    fn limit(&mut self, limit: Limit) -> i64 {
        if let Some(&value) = self.state().limits.get(&limit) {
            return value;
        }
        match limit {
            Limit::GroupCount(_) => 65535,
            Limit::GroupSize(_) => 1024,
            Limit::Invocations => 1024,
            Limit::SharedMemory => 49152,
            Limit::StorageBlockSize => 134217728,
        }
    }

    fn take_error(&mut self) -> Option<DriverFault> {
        self.state().pending_fault.take()
    }
}

/// Shorthand for staging introspection data.
pub fn active_uniform(name: &str, len: u32, type_code: u32) -> ActiveUniform {
    ActiveUniform {
        name: name.to_string(),
        len,
        type_code,
    }
}

/// A diagnostic sink that appends to a shared list the test keeps.
pub fn recording_sink() -> (impl FnMut(&str) + 'static, Arc<Mutex<Vec<String>>>) {
    let delivered: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let writer = Arc::clone(&delivered);
    (
        move |message: &str| writer.lock().unwrap().push(message.to_string()),
        delivered,
    )
}

/// Host image registry double. Images inserted here resolve to stable fake texture
/// names; removing one models the host deleting it mid-frame.
#[derive(Debug, Clone, Default)]
pub struct MockImages {
    images: HashMap<u32, TextureName>,
}

impl MockImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: u32) {
        self.images.insert(image, TextureName(9000 + image));
    }

    pub fn remove(&mut self, image: u32) {
        self.images.remove(&image);
    }
}

impl ImageRegistry for MockImages {
    fn exists(&self, image: u32) -> bool {
        self.images.contains_key(&image)
    }

    fn resolve(&self, image: u32) -> Option<TextureName> {
        self.images.get(&image).copied()
    }
}

/// Host memblock allocator double.
#[derive(Debug, Clone)]
pub struct MockMemblocks {
    blocks: HashMap<u32, Vec<u8>>,
    next: u32,
    refuse: bool,
}

impl Default for MockMemblocks {
    fn default() -> Self {
        MockMemblocks {
            blocks: HashMap::new(),
            next: 1,
            refuse: false,
        }
    }
}

impl MockMemblocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block with known contents, returning its id.
    pub fn insert(&mut self, bytes: &[u8]) -> u32 {
        let id = self.next;
        self.next += 1;
        self.blocks.insert(id, bytes.to_vec());
        id
    }

    /// Every [Memblocks::allocate] from now on returns `None`.
    pub fn refuse_allocations(&mut self) {
        self.refuse = true;
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Memblocks for MockMemblocks {
    fn allocate(&mut self, size: usize) -> Option<u32> {
        if self.refuse {
            return None;
        }
        let id = self.next;
        self.next += 1;
        self.blocks.insert(id, vec![0; size]);
        Some(id)
    }

    fn bytes(&self, memblock: u32) -> Option<&[u8]> {
        self.blocks.get(&memblock).map(Vec::as_slice)
    }

    fn bytes_mut(&mut self, memblock: u32) -> Option<&mut [u8]> {
        self.blocks.get_mut(&memblock).map(Vec::as_mut_slice)
    }

    fn free(&mut self, memblock: u32) {
        self.blocks.remove(&memblock);
    }
}
