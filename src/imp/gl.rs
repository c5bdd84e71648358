// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
The GL backend.

A mechanical [Driver] over the global GL context. No policy lives here: the engine
decides what to call and when; this module only translates each call into the
corresponding entry points and keeps the unsafe confined.
*/

use std::ffi::{CString, c_void};
use std::marker::PhantomData;

use gl::types::{GLchar, GLenum, GLint, GLint64, GLsizei, GLsizeiptr, GLuint};

use crate::driver::{
    ActiveUniform, BufferName, CompileFailure, CompileStage, Driver, DriverFault, Limit,
    ProgramName, TextureName,
};

/// [Driver] over the GL context current on this thread.
#[derive(Debug)]
pub struct GlDriver {
    // GL state is confined to the thread its context is current on
    _not_send: PhantomData<*const ()>,
}

impl GlDriver {
    /// `loader` resolves GL entry points by name, typically the windowing library's
    /// `get_proc_address`. The context must already be current on this thread.
    pub fn new<F: FnMut(&'static str) -> *const c_void>(loader: F) -> Self {
        gl::load_with(loader);
        logwise::info_sync!("GL entry points loaded");
        GlDriver {
            _not_send: PhantomData,
        }
    }
}

impl Driver for GlDriver {
    fn load_entry_points(&mut self) -> bool {
        gl::CreateShader::is_loaded()
            && gl::ShaderSource::is_loaded()
            && gl::CompileShader::is_loaded()
            && gl::GetShaderiv::is_loaded()
            && gl::GetShaderInfoLog::is_loaded()
            && gl::DeleteShader::is_loaded()
            && gl::CreateProgram::is_loaded()
            && gl::AttachShader::is_loaded()
            && gl::LinkProgram::is_loaded()
            && gl::GetProgramiv::is_loaded()
            && gl::GetProgramInfoLog::is_loaded()
            && gl::DeleteProgram::is_loaded()
            && gl::UseProgram::is_loaded()
            && gl::GetActiveUniform::is_loaded()
            && gl::GetUniformLocation::is_loaded()
            && gl::Uniform1fv::is_loaded()
            && gl::Uniform2fv::is_loaded()
            && gl::Uniform3fv::is_loaded()
            && gl::Uniform4fv::is_loaded()
            && gl::Uniform1iv::is_loaded()
            && gl::Uniform2iv::is_loaded()
            && gl::Uniform3iv::is_loaded()
            && gl::Uniform4iv::is_loaded()
            && gl::BindImageTexture::is_loaded()
            && gl::BindBufferBase::is_loaded()
            && gl::DispatchCompute::is_loaded()
            && gl::GenBuffers::is_loaded()
            && gl::DeleteBuffers::is_loaded()
            && gl::BindBuffer::is_loaded()
            && gl::BufferData::is_loaded()
            && gl::MapBuffer::is_loaded()
            && gl::UnmapBuffer::is_loaded()
            && gl::GetIntegerv::is_loaded()
            && gl::GetIntegeri_v::is_loaded()
            && gl::GetInteger64v::is_loaded()
            && gl::GetError::is_loaded()
    }

    fn version(&mut self) -> (i32, i32) {
        let mut major: GLint = 0;
        let mut minor: GLint = 0;
        unsafe {
            gl::GetIntegerv(gl::MAJOR_VERSION, &mut major);
            gl::GetIntegerv(gl::MINOR_VERSION, &mut minor);
            // ancient contexts reject these queries and leave the zeros, which fail
            // the version floor on their own; don't let the error code linger
            gl::GetError();
        }
        (major, minor)
    }

    fn compile_compute_program(&mut self, source: &str) -> Result<ProgramName, CompileFailure> {
        let shader = unsafe { gl::CreateShader(gl::COMPUTE_SHADER) };
        if shader == 0 {
            return Err(CompileFailure {
                stage: CompileStage::Create,
                log: "Could not create a shader object.".to_string(),
            });
        }
        let text = source.as_ptr() as *const GLchar;
        let text_len = source.len() as GLint;
        unsafe {
            gl::ShaderSource(shader, 1, &text, &text_len);
            gl::CompileShader(shader);
        }
        if shader_flag(shader, gl::COMPILE_STATUS) != gl::TRUE as GLint {
            let log = shader_info_log(shader);
            unsafe { gl::DeleteShader(shader) };
            logwise::error_sync!(
                "Kernel failed to compile: {log}",
                log = logwise::privacy::LogIt(&log)
            );
            return Err(CompileFailure {
                stage: CompileStage::Compile,
                log,
            });
        }
        let program = unsafe { gl::CreateProgram() };
        if program == 0 {
            unsafe { gl::DeleteShader(shader) };
            return Err(CompileFailure {
                stage: CompileStage::Create,
                log: "Could not create a program object.".to_string(),
            });
        }
        unsafe {
            gl::AttachShader(program, shader);
            gl::LinkProgram(program);
            // linked or not, the program holds everything it needs now
            gl::DeleteShader(shader);
        }
        if program_flag(program, gl::LINK_STATUS) != gl::TRUE as GLint {
            let log = program_info_log(program);
            unsafe { gl::DeleteProgram(program) };
            logwise::error_sync!(
                "Kernel failed to link: {log}",
                log = logwise::privacy::LogIt(&log)
            );
            return Err(CompileFailure {
                stage: CompileStage::Link,
                log,
            });
        }
        Ok(ProgramName(program))
    }

    fn delete_program(&mut self, program: ProgramName) {
        unsafe { gl::DeleteProgram(program.0) };
    }

    fn current_program(&mut self) -> ProgramName {
        let mut program: GLint = 0;
        unsafe { gl::GetIntegerv(gl::CURRENT_PROGRAM, &mut program) };
        ProgramName(program.max(0) as u32)
    }

    fn use_program(&mut self, program: ProgramName) {
        unsafe { gl::UseProgram(program.0) };
    }

    fn active_uniform_count(&mut self, program: ProgramName) -> u32 {
        program_flag(program.0, gl::ACTIVE_UNIFORMS).max(0) as u32
    }

    fn active_uniform(&mut self, program: ProgramName, index: u32) -> ActiveUniform {
        let capacity = program_flag(program.0, gl::ACTIVE_UNIFORM_MAX_LENGTH).max(1);
        let mut name = vec![0u8; capacity as usize];
        let mut written: GLsizei = 0;
        let mut len: GLint = 0;
        let mut type_code: GLenum = 0;
        unsafe {
            gl::GetActiveUniform(
                program.0,
                index,
                capacity,
                &mut written,
                &mut len,
                &mut type_code,
                name.as_mut_ptr() as *mut GLchar,
            );
        }
        name.truncate(written.max(0) as usize);
        ActiveUniform {
            name: String::from_utf8_lossy(&name).into_owned(),
            len: len.max(0) as u32,
            type_code,
        }
    }

    fn uniform_location(&mut self, program: ProgramName, name: &str) -> i32 {
        // interior NULs can't name a uniform; answer like the lookup missed
        let Ok(name) = CString::new(name) else {
            return -1;
        };
        unsafe { gl::GetUniformLocation(program.0, name.as_ptr()) }
    }

    fn upload_floats(&mut self, location: i32, arity: usize, count: usize, values: &[f32]) {
        let count = count as GLsizei;
        let data = values.as_ptr();
        unsafe {
            match arity {
                1 => gl::Uniform1fv(location, count, data),
                2 => gl::Uniform2fv(location, count, data),
                3 => gl::Uniform3fv(location, count, data),
                4 => gl::Uniform4fv(location, count, data),
                _ => {}
            }
        }
    }

    fn upload_ints(&mut self, location: i32, arity: usize, count: usize, values: &[i32]) {
        let count = count as GLsizei;
        let data = values.as_ptr();
        unsafe {
            match arity {
                1 => gl::Uniform1iv(location, count, data),
                2 => gl::Uniform2iv(location, count, data),
                3 => gl::Uniform3iv(location, count, data),
                4 => gl::Uniform4iv(location, count, data),
                _ => {}
            }
        }
    }

    fn bind_image_unit(&mut self, unit: u32, texture: TextureName) {
        // level 0, non-layered, read/write rgba8: the one shape host images take
        unsafe { gl::BindImageTexture(unit, texture.0, 0, gl::FALSE, 0, gl::READ_WRITE, gl::RGBA8) };
    }

    fn bind_buffer_point(&mut self, point: u32, buffer: BufferName) {
        unsafe { gl::BindBufferBase(gl::SHADER_STORAGE_BUFFER, point, buffer.0) };
    }

    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) {
        unsafe { gl::DispatchCompute(groups_x, groups_y, groups_z) };
    }

    fn gen_buffer(&mut self) -> BufferName {
        let mut name: GLuint = 0;
        unsafe { gl::GenBuffers(1, &mut name) };
        BufferName(name)
    }

    fn delete_buffer(&mut self, buffer: BufferName) {
        unsafe { gl::DeleteBuffers(1, &buffer.0) };
    }

    fn buffer_data(&mut self, buffer: BufferName, size: usize, data: Option<&[u8]>) {
        let pointer = match data {
            Some(bytes) => bytes.as_ptr() as *const c_void,
            None => std::ptr::null(),
        };
        unsafe {
            gl::BindBuffer(gl::SHADER_STORAGE_BUFFER, buffer.0);
            gl::BufferData(
                gl::SHADER_STORAGE_BUFFER,
                size as GLsizeiptr,
                pointer,
                gl::STATIC_COPY,
            );
            gl::BindBuffer(gl::SHADER_STORAGE_BUFFER, 0);
        }
    }

    fn read_buffer(&mut self, buffer: BufferName, dest: &mut [u8]) {
        unsafe {
            gl::BindBuffer(gl::SHADER_STORAGE_BUFFER, buffer.0);
            let mapped = gl::MapBuffer(gl::SHADER_STORAGE_BUFFER, gl::READ_ONLY);
            // a null map latches an error code for the caller to collect
            if !mapped.is_null() {
                std::ptr::copy_nonoverlapping(mapped as *const u8, dest.as_mut_ptr(), dest.len());
                gl::UnmapBuffer(gl::SHADER_STORAGE_BUFFER);
            }
            gl::BindBuffer(gl::SHADER_STORAGE_BUFFER, 0);
        }
    }

    fn limit(&mut self, limit: Limit) -> i64 {
        match limit {
            Limit::GroupCount(axis) => {
                indexed_i32(gl::MAX_COMPUTE_WORK_GROUP_COUNT, axis.index()) as i64
            }
            Limit::GroupSize(axis) => {
                indexed_i32(gl::MAX_COMPUTE_WORK_GROUP_SIZE, axis.index()) as i64
            }
            Limit::Invocations => plain_i32(gl::MAX_COMPUTE_WORK_GROUP_INVOCATIONS) as i64,
            Limit::SharedMemory => plain_i32(gl::MAX_COMPUTE_SHARED_MEMORY_SIZE) as i64,
            Limit::StorageBlockSize => plain_i64(gl::MAX_SHADER_STORAGE_BLOCK_SIZE),
        }
    }

    fn take_error(&mut self) -> Option<DriverFault> {
        match unsafe { gl::GetError() } {
            gl::NO_ERROR => None,
            gl::INVALID_ENUM => Some(DriverFault::InvalidEnum),
            gl::INVALID_VALUE => Some(DriverFault::InvalidValue),
            gl::INVALID_OPERATION => Some(DriverFault::InvalidOperation),
            gl::OUT_OF_MEMORY => Some(DriverFault::OutOfMemory),
            other => Some(DriverFault::Other(other)),
        }
    }
}

fn shader_flag(shader: GLuint, flag: GLenum) -> GLint {
    let mut value: GLint = 0;
    unsafe { gl::GetShaderiv(shader, flag, &mut value) };
    value
}

fn program_flag(program: GLuint, flag: GLenum) -> GLint {
    let mut value: GLint = 0;
    unsafe { gl::GetProgramiv(program, flag, &mut value) };
    value
}

fn shader_info_log(shader: GLuint) -> String {
    // the reported length includes the terminating NUL
    let capacity = shader_flag(shader, gl::INFO_LOG_LENGTH);
    if capacity <= 0 {
        return String::new();
    }
    let mut log = vec![0u8; capacity as usize];
    let mut written: GLsizei = 0;
    unsafe { gl::GetShaderInfoLog(shader, capacity, &mut written, log.as_mut_ptr() as *mut GLchar) };
    log.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&log).into_owned()
}

fn program_info_log(program: GLuint) -> String {
    let capacity = program_flag(program, gl::INFO_LOG_LENGTH);
    if capacity <= 0 {
        return String::new();
    }
    let mut log = vec![0u8; capacity as usize];
    let mut written: GLsizei = 0;
    unsafe {
        gl::GetProgramInfoLog(program, capacity, &mut written, log.as_mut_ptr() as *mut GLchar)
    };
    log.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&log).into_owned()
}

fn plain_i32(flag: GLenum) -> GLint {
    let mut value: GLint = 0;
    unsafe { gl::GetIntegerv(flag, &mut value) };
    value
}

fn indexed_i32(flag: GLenum, index: u32) -> GLint {
    let mut value: GLint = 0;
    unsafe { gl::GetIntegeri_v(flag, index, &mut value) };
    value
}

fn plain_i64(flag: GLenum) -> GLint64 {
    let mut value: GLint64 = 0;
    unsafe { gl::GetInteger64v(flag, &mut value) };
    value
}
