//! The graphics device boundary.
//!
//! Everything the renderer needs from the GPU goes through [`Device`]. Handles
//! are opaque integers owned by whoever created them; nothing in this crate
//! deletes a handle it did not create.

use std::fmt::{self, Display};

use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::scene::{BufferTarget, ComponentType, MagFilter, MinFilter, PrimitiveMode, WrapMode};

mod gl;
mod headless;

pub use gl::GlDevice;
pub use headless::{DrawRecord, HeadlessDevice, TextureRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

/// Where a program failed to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileStage {
    Vertex,
    Fragment,
    Link,
}

impl Display for CompileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompileStage::Vertex => "vertex shader",
            CompileStage::Fragment => "fragment shader",
            CompileStage::Link => "program link",
        })
    }
}

/// A failed shader compilation or program link, with the driver's info log.
#[derive(Clone, Debug)]
pub struct ShaderError {
    pub stage: CompileStage,
    pub log: String,
}

/// A failed allocation or upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceError {
    pub operation: &'static str,
    pub message: String,
}

impl Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.message)
    }
}

impl std::error::Error for DeviceError {}

/// RGBA8 texture parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub min_filter: MinFilter,
    pub mag_filter: MagFilter,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub generate_mipmaps: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    /// Read as floats, optionally normalizing integer components.
    Float { normalized: bool },
    /// Read as integers (`ivec`/`uvec` inputs).
    Integer,
}

/// One enabled attribute slot of a vertex array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub slot: u32,
    pub buffer: BufferHandle,
    pub components: u32,
    pub component_type: ComponentType,
    pub kind: AttributeKind,
    pub stride: u32,
    pub offset: u32,
}

/// The full binding state of a vertex array.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VertexArrayLayout {
    pub attributes: Vec<VertexAttribute>,
    pub index_buffer: Option<BufferHandle>,
}

impl VertexArrayLayout {
    pub fn attribute(&self, slot: u32) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|attribute| attribute.slot == slot)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawCommand {
    Indexed {
        mode: PrimitiveMode,
        count: u32,
        index_type: ComponentType,
    },
    Arrays {
        mode: PrimitiveMode,
        count: u32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Uniform<'a> {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    FloatArray(&'a [f32]),
    Mat4Array(&'a [Mat4]),
}

/// A graphics device: buffer, texture, program and vertex array objects plus
/// draw submission.
///
/// Methods take `&self`; the device is shared through `Rc<dyn Device>` by the
/// application, its models and programs, all on one thread.
pub trait Device {
    fn create_buffer(&self, target: BufferTarget, data: &[u8]) -> Result<BufferHandle, DeviceError>;
    fn delete_buffer(&self, buffer: BufferHandle);

    /// Uploads `rgba` (8 bits per channel, `width * height * 4` bytes) as mip
    /// level 0, generating the rest of the chain if the descriptor asks for it.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        rgba: &[u8],
    ) -> Result<TextureHandle, DeviceError>;
    fn delete_texture(&self, texture: TextureHandle);

    fn create_program(&self, vertex: &str, fragment: &str) -> Result<ProgramHandle, ShaderError>;
    fn delete_program(&self, program: ProgramHandle);
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    fn create_vertex_array(
        &self,
        layout: &VertexArrayLayout,
    ) -> Result<VertexArrayHandle, DeviceError>;
    fn delete_vertex_array(&self, vertex_array: VertexArrayHandle);

    fn use_program(&self, program: ProgramHandle);
    /// Sets a uniform of the program most recently passed to `use_program`.
    fn set_uniform(&self, location: UniformLocation, value: Uniform<'_>);
    fn bind_texture(&self, unit: u32, texture: TextureHandle);
    fn draw(&self, vertex_array: VertexArrayHandle, command: &DrawCommand);
}
