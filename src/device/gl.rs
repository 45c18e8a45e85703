use std::ffi::{c_void, CString};
use std::marker::PhantomData;
use std::ptr;

use glam::Mat4;

use crate::device::{
    AttributeKind, BufferHandle, CompileStage, Device, DeviceError, DrawCommand, ProgramHandle,
    ShaderError, TextureDescriptor, TextureHandle, Uniform, UniformLocation, VertexArrayHandle,
    VertexArrayLayout,
};
use crate::scene::{BufferTarget, ComponentType, MagFilter, MinFilter, PrimitiveMode, WrapMode};

#[allow(
    clippy::all,
    dead_code,
    non_camel_case_types,
    non_snake_case,
    non_upper_case_globals,
    unused_imports
)]
mod gl {
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}

macro_rules! gl_call {
    ($expr:expr) => {{
        let result = unsafe { $expr };
        if cfg!(debug_assertions) {
            let error = unsafe { gl::GetError() };
            if error != gl::NO_ERROR {
                panic!(
                    "OpenGL error {} at {}:{}:{}",
                    error_name(error),
                    file!(),
                    line!(),
                    column!(),
                );
            }
        }
        result
    }};
}

fn error_name(error: gl::types::GLenum) -> String {
    match error {
        gl::INVALID_ENUM => "INVALID_ENUM".to_string(),
        gl::INVALID_VALUE => "INVALID_VALUE".to_string(),
        gl::INVALID_OPERATION => "INVALID_OPERATION".to_string(),
        gl::OUT_OF_MEMORY => "OUT_OF_MEMORY".to_string(),
        gl::INVALID_FRAMEBUFFER_OPERATION => "INVALID_FRAMEBUFFER_OPERATION".to_string(),
        _ => format!("{error}"),
    }
}

/// Drains the GL error queue, reporting the first error as a [`DeviceError`].
fn check(operation: &'static str) -> Result<(), DeviceError> {
    let mut first = None;
    loop {
        let error = unsafe { gl::GetError() };
        if error == gl::NO_ERROR {
            break;
        }
        first.get_or_insert(error);
    }
    match first {
        None => Ok(()),
        Some(error) => Err(DeviceError {
            operation,
            message: error_name(error),
        }),
    }
}

/// An OpenGL ES 3.0 context made current on this thread.
///
/// The bindings are global, so this is a marker that the function pointers
/// have been loaded. It is neither `Send` nor `Sync`.
pub struct GlDevice {
    _context: PhantomData<*const ()>,
}

impl GlDevice {
    /// Loads the GL function pointers through `loader` (e.g. SDL's
    /// `gl_get_proc_address`). The context must be current.
    pub fn load_with(loader: impl FnMut(&'static str) -> *const c_void) -> GlDevice {
        gl::load_with(loader);
        log::info!("loaded OpenGL ES 3.0 bindings");
        GlDevice {
            _context: PhantomData,
        }
    }

    pub fn resize(&self, width: i32, height: i32) {
        gl_call!(gl::Viewport(0, 0, width, height));
    }

    /// Clears color and depth and sets the fixed render state the built-in
    /// shaders expect.
    pub fn begin_frame(&self, clear_color: [f32; 4]) {
        let [r, g, b, a] = clear_color;
        gl_call!(gl::Enable(gl::DEPTH_TEST));
        gl_call!(gl::DepthFunc(gl::LESS));
        gl_call!(gl::Enable(gl::CULL_FACE));
        gl_call!(gl::ClearColor(r, g, b, a));
        gl_call!(gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT));
    }
}

fn buffer_target(target: BufferTarget) -> gl::types::GLenum {
    match target {
        BufferTarget::ArrayBuffer => gl::ARRAY_BUFFER,
        BufferTarget::ElementArrayBuffer => gl::ELEMENT_ARRAY_BUFFER,
    }
}

fn component_type(component_type: ComponentType) -> gl::types::GLenum {
    match component_type {
        ComponentType::I8 => gl::BYTE,
        ComponentType::U8 => gl::UNSIGNED_BYTE,
        ComponentType::I16 => gl::SHORT,
        ComponentType::U16 => gl::UNSIGNED_SHORT,
        ComponentType::U32 => gl::UNSIGNED_INT,
        ComponentType::F32 => gl::FLOAT,
    }
}

fn primitive_mode(mode: PrimitiveMode) -> gl::types::GLenum {
    match mode {
        PrimitiveMode::Points => gl::POINTS,
        PrimitiveMode::Lines => gl::LINES,
        PrimitiveMode::LineLoop => gl::LINE_LOOP,
        PrimitiveMode::LineStrip => gl::LINE_STRIP,
        PrimitiveMode::Triangles => gl::TRIANGLES,
        PrimitiveMode::TriangleStrip => gl::TRIANGLE_STRIP,
        PrimitiveMode::TriangleFan => gl::TRIANGLE_FAN,
    }
}

fn min_filter(filter: MinFilter) -> gl::types::GLint {
    (match filter {
        MinFilter::Nearest => gl::NEAREST,
        MinFilter::Linear => gl::LINEAR,
        MinFilter::NearestMipmapNearest => gl::NEAREST_MIPMAP_NEAREST,
        MinFilter::LinearMipmapNearest => gl::LINEAR_MIPMAP_NEAREST,
        MinFilter::NearestMipmapLinear => gl::NEAREST_MIPMAP_LINEAR,
        MinFilter::LinearMipmapLinear => gl::LINEAR_MIPMAP_LINEAR,
    }) as gl::types::GLint
}

fn mag_filter(filter: MagFilter) -> gl::types::GLint {
    (match filter {
        MagFilter::Nearest => gl::NEAREST,
        MagFilter::Linear => gl::LINEAR,
    }) as gl::types::GLint
}

fn wrap_mode(mode: WrapMode) -> gl::types::GLint {
    (match mode {
        WrapMode::ClampToEdge => gl::CLAMP_TO_EDGE,
        WrapMode::MirroredRepeat => gl::MIRRORED_REPEAT,
        WrapMode::Repeat => gl::REPEAT,
    }) as gl::types::GLint
}

fn compile_shader(kind: gl::types::GLenum, source: &str) -> Result<gl::types::GLuint, String> {
    let shader = gl_call!(gl::CreateShader(kind));
    let sources = [source.as_bytes().as_ptr() as *const gl::types::GLchar];
    let source_lens = [source.len() as gl::types::GLint];
    gl_call!(gl::ShaderSource(
        shader,
        1,
        sources.as_ptr(),
        source_lens.as_ptr(),
    ));
    gl_call!(gl::CompileShader(shader));
    let mut compile_status = 0;
    gl_call!(gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut compile_status));
    if compile_status == gl::FALSE as i32 {
        let mut length = 0;
        gl_call!(gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut length));
        let mut info_log = vec![0u8; length.max(1) as usize];
        gl_call!(gl::GetShaderInfoLog(
            shader,
            info_log.len() as i32,
            &mut length,
            info_log.as_mut_ptr() as *mut gl::types::GLchar,
        ));
        info_log.truncate(length.max(0) as usize);
        gl_call!(gl::DeleteShader(shader));
        return Err(String::from_utf8_lossy(&info_log).into_owned());
    }
    Ok(shader)
}

impl Device for GlDevice {
    fn create_buffer(&self, target: BufferTarget, data: &[u8]) -> Result<BufferHandle, DeviceError> {
        let mut buffer = 0;
        gl_call!(gl::GenBuffers(1, &mut buffer));
        // Element array bindings are vertex array state.
        gl_call!(gl::BindVertexArray(0));
        let target = buffer_target(target);
        unsafe {
            gl::BindBuffer(target, buffer);
            gl::BufferData(
                target,
                data.len() as gl::types::GLsizeiptr,
                data.as_ptr() as *const c_void,
                gl::STATIC_DRAW,
            );
            gl::BindBuffer(target, 0);
        }
        if let Err(err) = check("buffer upload") {
            gl_call!(gl::DeleteBuffers(1, &buffer));
            return Err(err);
        }
        Ok(BufferHandle(buffer))
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        gl_call!(gl::DeleteBuffers(1, &buffer.0));
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        rgba: &[u8],
    ) -> Result<TextureHandle, DeviceError> {
        let expected = descriptor.width as usize * descriptor.height as usize * 4;
        if rgba.len() != expected {
            return Err(DeviceError {
                operation: "texture upload",
                message: format!("expected {expected} bytes of RGBA8, got {}", rgba.len()),
            });
        }
        let mut texture = 0;
        gl_call!(gl::GenTextures(1, &mut texture));
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0);
            gl::BindTexture(gl::TEXTURE_2D, texture);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, mag_filter(descriptor.mag_filter));
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, min_filter(descriptor.min_filter));
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, wrap_mode(descriptor.wrap_s));
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, wrap_mode(descriptor.wrap_t));
            gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                gl::RGBA8 as gl::types::GLint,
                descriptor.width as gl::types::GLsizei,
                descriptor.height as gl::types::GLsizei,
                0,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                rgba.as_ptr() as *const c_void,
            );
            if descriptor.generate_mipmaps {
                gl::GenerateMipmap(gl::TEXTURE_2D);
            }
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
        if let Err(err) = check("texture upload") {
            gl_call!(gl::DeleteTextures(1, &texture));
            return Err(err);
        }
        Ok(TextureHandle(texture))
    }

    fn delete_texture(&self, texture: TextureHandle) {
        gl_call!(gl::DeleteTextures(1, &texture.0));
    }

    fn create_program(&self, vertex: &str, fragment: &str) -> Result<ProgramHandle, ShaderError> {
        let vertex_shader = compile_shader(gl::VERTEX_SHADER, vertex).map_err(|log| ShaderError {
            stage: CompileStage::Vertex,
            log,
        })?;
        let fragment_shader = match compile_shader(gl::FRAGMENT_SHADER, fragment) {
            Ok(shader) => shader,
            Err(log) => {
                gl_call!(gl::DeleteShader(vertex_shader));
                return Err(ShaderError {
                    stage: CompileStage::Fragment,
                    log,
                });
            }
        };

        let program = gl_call!(gl::CreateProgram());
        gl_call!(gl::AttachShader(program, vertex_shader));
        gl_call!(gl::AttachShader(program, fragment_shader));
        gl_call!(gl::LinkProgram(program));
        gl_call!(gl::DeleteShader(vertex_shader));
        gl_call!(gl::DeleteShader(fragment_shader));
        let mut link_status = 0;
        gl_call!(gl::GetProgramiv(program, gl::LINK_STATUS, &mut link_status));
        if link_status == gl::FALSE as i32 {
            let mut length = 0;
            gl_call!(gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut length));
            let mut info_log = vec![0u8; length.max(1) as usize];
            gl_call!(gl::GetProgramInfoLog(
                program,
                info_log.len() as i32,
                &mut length,
                info_log.as_mut_ptr() as *mut gl::types::GLchar,
            ));
            info_log.truncate(length.max(0) as usize);
            gl_call!(gl::DeleteProgram(program));
            return Err(ShaderError {
                stage: CompileStage::Link,
                log: String::from_utf8_lossy(&info_log).into_owned(),
            });
        }
        Ok(ProgramHandle(program))
    }

    fn delete_program(&self, program: ProgramHandle) {
        gl_call!(gl::DeleteProgram(program.0));
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let name = CString::new(name).ok()?;
        let location = gl_call!(gl::GetUniformLocation(program.0, name.as_ptr()));
        (location != -1).then_some(UniformLocation(location))
    }

    fn create_vertex_array(
        &self,
        layout: &VertexArrayLayout,
    ) -> Result<VertexArrayHandle, DeviceError> {
        let mut vao = 0;
        gl_call!(gl::GenVertexArrays(1, &mut vao));
        gl_call!(gl::BindVertexArray(vao));
        for attribute in &layout.attributes {
            let offset = ptr::null::<c_void>().wrapping_add(attribute.offset as usize);
            unsafe {
                gl::BindBuffer(gl::ARRAY_BUFFER, attribute.buffer.0);
                gl::EnableVertexAttribArray(attribute.slot);
                match attribute.kind {
                    AttributeKind::Float { normalized } => gl::VertexAttribPointer(
                        attribute.slot,
                        attribute.components as gl::types::GLint,
                        component_type(attribute.component_type),
                        if normalized { gl::TRUE } else { gl::FALSE },
                        attribute.stride as gl::types::GLsizei,
                        offset,
                    ),
                    AttributeKind::Integer => gl::VertexAttribIPointer(
                        attribute.slot,
                        attribute.components as gl::types::GLint,
                        component_type(attribute.component_type),
                        attribute.stride as gl::types::GLsizei,
                        offset,
                    ),
                }
            }
        }
        if let Some(index_buffer) = layout.index_buffer {
            unsafe { gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, index_buffer.0) };
        }
        unsafe {
            gl::BindVertexArray(0);
            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
        }
        if let Err(err) = check("vertex array setup") {
            gl_call!(gl::DeleteVertexArrays(1, &vao));
            return Err(err);
        }
        Ok(VertexArrayHandle(vao))
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayHandle) {
        gl_call!(gl::DeleteVertexArrays(1, &vertex_array.0));
    }

    fn use_program(&self, program: ProgramHandle) {
        gl_call!(gl::UseProgram(program.0));
    }

    fn set_uniform(&self, location: UniformLocation, value: Uniform<'_>) {
        let location = location.0;
        match value {
            Uniform::Int(v) => gl_call!(gl::Uniform1i(location, v)),
            Uniform::Float(v) => gl_call!(gl::Uniform1f(location, v)),
            Uniform::Vec2([x, y]) => gl_call!(gl::Uniform2f(location, x, y)),
            Uniform::Vec3(v) => gl_call!(gl::Uniform3f(location, v.x, v.y, v.z)),
            Uniform::Vec4(v) => gl_call!(gl::Uniform4f(location, v.x, v.y, v.z, v.w)),
            Uniform::Mat3(m) => gl_call!(gl::UniformMatrix3fv(
                location,
                1,
                gl::FALSE,
                m.to_cols_array().as_ptr(),
            )),
            Uniform::Mat4(m) => gl_call!(gl::UniformMatrix4fv(
                location,
                1,
                gl::FALSE,
                m.to_cols_array().as_ptr(),
            )),
            Uniform::FloatArray(values) => gl_call!(gl::Uniform1fv(
                location,
                values.len() as gl::types::GLsizei,
                values.as_ptr(),
            )),
            Uniform::Mat4Array(matrices) => {
                let floats: &[f32] = bytemuck::cast_slice::<Mat4, f32>(matrices);
                gl_call!(gl::UniformMatrix4fv(
                    location,
                    matrices.len() as gl::types::GLsizei,
                    gl::FALSE,
                    floats.as_ptr(),
                ))
            }
        }
    }

    fn bind_texture(&self, unit: u32, texture: TextureHandle) {
        gl_call!(gl::ActiveTexture(gl::TEXTURE0 + unit));
        gl_call!(gl::BindTexture(gl::TEXTURE_2D, texture.0));
    }

    fn draw(&self, vertex_array: VertexArrayHandle, command: &DrawCommand) {
        gl_call!(gl::BindVertexArray(vertex_array.0));
        match *command {
            DrawCommand::Indexed {
                mode,
                count,
                index_type,
            } => gl_call!(gl::DrawElements(
                primitive_mode(mode),
                count as gl::types::GLsizei,
                component_type(index_type),
                ptr::null(),
            )),
            DrawCommand::Arrays { mode, count } => gl_call!(gl::DrawArrays(
                primitive_mode(mode),
                0,
                count as gl::types::GLsizei,
            )),
        }
        gl_call!(gl::BindVertexArray(0));
    }
}
