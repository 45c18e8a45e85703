use std::cell::RefCell;
use std::collections::HashMap;

use crate::device::{
    BufferHandle, CompileStage, Device, DeviceError, DrawCommand, ProgramHandle, ShaderError,
    TextureDescriptor, TextureHandle, Uniform, UniformLocation, VertexArrayHandle,
    VertexArrayLayout,
};
use crate::scene::BufferTarget;

/// A texture as the headless device stores it.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureRecord {
    pub descriptor: TextureDescriptor,
    pub mip_levels: u32,
}

/// One submitted draw and the program state it ran with.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramHandle,
    pub vertex_array: VertexArrayHandle,
    pub command: DrawCommand,
    pub textures: Vec<(u32, TextureHandle)>,
    /// Uniform name to its last written value, flattened to floats.
    pub uniforms: HashMap<String, Vec<f32>>,
}

#[derive(Default)]
struct State {
    next_handle: u32,
    buffers: HashMap<BufferHandle, (BufferTarget, usize)>,
    textures: HashMap<TextureHandle, TextureRecord>,
    programs: HashMap<ProgramHandle, (String, String)>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArrayLayout>,
    uniform_names: HashMap<(ProgramHandle, String), UniformLocation>,
    location_names: HashMap<(ProgramHandle, i32), String>,
    bound_program: Option<ProgramHandle>,
    bound_textures: HashMap<u32, TextureHandle>,
    uniform_values: HashMap<ProgramHandle, HashMap<String, Vec<f32>>>,
    draws: Vec<DrawRecord>,
    buffer_uploads: usize,
    texture_uploads: usize,
    program_links: usize,
    buffer_budget: Option<usize>,
    failing_stage: Option<CompileStage>,
}

impl State {
    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// A device with no GPU behind it.
///
/// It keeps every live object in memory, which makes leaks and double uploads
/// observable, and it can be told to run out of buffer memory or to reject a
/// shader stage.
#[derive(Default)]
pub struct HeadlessDevice {
    state: RefCell<State>,
}

impl HeadlessDevice {
    pub fn new() -> HeadlessDevice {
        HeadlessDevice::default()
    }

    /// Allows only `count` more successful buffer uploads.
    pub fn set_buffer_budget(&self, count: Option<usize>) {
        self.state.borrow_mut().buffer_budget = count;
    }

    /// Makes every program build fail at `stage`.
    pub fn fail_compilation(&self, stage: Option<CompileStage>) {
        self.state.borrow_mut().failing_stage = stage;
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.state.borrow().vertex_arrays.len()
    }

    /// Total successful buffer uploads since creation.
    pub fn buffer_uploads(&self) -> usize {
        self.state.borrow().buffer_uploads
    }

    pub fn texture_uploads(&self) -> usize {
        self.state.borrow().texture_uploads
    }

    pub fn program_links(&self) -> usize {
        self.state.borrow().program_links
    }

    pub fn buffer(&self, buffer: BufferHandle) -> Option<(BufferTarget, usize)> {
        self.state.borrow().buffers.get(&buffer).copied()
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<TextureRecord> {
        self.state.borrow().textures.get(&texture).cloned()
    }

    pub fn textures(&self) -> Vec<TextureRecord> {
        let state = self.state.borrow();
        let mut handles = state.textures.keys().copied().collect::<Vec<_>>();
        handles.sort();
        handles.iter().map(|handle| state.textures[handle].clone()).collect()
    }

    /// The sources a live program was linked from.
    pub fn program_sources(&self, program: ProgramHandle) -> Option<(String, String)> {
        self.state.borrow().programs.get(&program).cloned()
    }

    pub fn vertex_array(&self, vertex_array: VertexArrayHandle) -> Option<VertexArrayLayout> {
        self.state.borrow().vertex_arrays.get(&vertex_array).cloned()
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state.borrow().draws.clone()
    }

    pub fn clear_draws(&self) {
        self.state.borrow_mut().draws.clear();
    }
}

fn mip_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn flatten(value: Uniform<'_>) -> Vec<f32> {
    match value {
        Uniform::Int(v) => vec![v as f32],
        Uniform::Float(v) => vec![v],
        Uniform::Vec2(v) => v.to_vec(),
        Uniform::Vec3(v) => v.to_array().to_vec(),
        Uniform::Vec4(v) => v.to_array().to_vec(),
        Uniform::Mat3(m) => m.to_cols_array().to_vec(),
        Uniform::Mat4(m) => m.to_cols_array().to_vec(),
        Uniform::FloatArray(values) => values.to_vec(),
        Uniform::Mat4Array(matrices) => matrices
            .iter()
            .flat_map(|m| m.to_cols_array())
            .collect(),
    }
}

impl Device for HeadlessDevice {
    fn create_buffer(&self, target: BufferTarget, data: &[u8]) -> Result<BufferHandle, DeviceError> {
        let mut state = self.state.borrow_mut();
        if let Some(budget) = state.buffer_budget.as_mut() {
            if *budget == 0 {
                return Err(DeviceError {
                    operation: "buffer upload",
                    message: "OUT_OF_MEMORY".to_string(),
                });
            }
            *budget -= 1;
        }
        let handle = BufferHandle(state.next());
        state.buffers.insert(handle, (target, data.len()));
        state.buffer_uploads += 1;
        Ok(handle)
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        self.state.borrow_mut().buffers.remove(&buffer);
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
        let mut state = self.state.borrow_mut();
        let handle = TextureHandle(state.next());
        let mip_levels = if descriptor.generate_mipmaps {
            mip_levels(descriptor.width, descriptor.height)
        } else {
            1
        };
        state.textures.insert(
            handle,
            TextureRecord {
                descriptor: descriptor.clone(),
                mip_levels,
            },
        );
        state.texture_uploads += 1;
        Ok(handle)
    }

    fn delete_texture(&self, texture: TextureHandle) {
        self.state.borrow_mut().textures.remove(&texture);
    }

    fn create_program(&self, vertex: &str, fragment: &str) -> Result<ProgramHandle, ShaderError> {
        let mut state = self.state.borrow_mut();
        if let Some(stage) = state.failing_stage {
            return Err(ShaderError {
                stage,
                log: format!("0:1: {stage} rejected by headless device"),
            });
        }
        let handle = ProgramHandle(state.next());
        state
            .programs
            .insert(handle, (vertex.to_string(), fragment.to_string()));
        state.program_links += 1;
        Ok(handle)
    }

    fn delete_program(&self, program: ProgramHandle) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        state.uniform_values.remove(&program);
        if state.bound_program == Some(program) {
            state.bound_program = None;
        }
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let mut state = self.state.borrow_mut();
        if !state.programs.contains_key(&program) {
            return None;
        }
        if let Some(location) = state.uniform_names.get(&(program, name.to_string())) {
            return Some(*location);
        }
        let location = UniformLocation(state.uniform_names.len() as i32);
        state
            .uniform_names
            .insert((program, name.to_string()), location);
        state
            .location_names
            .insert((program, location.0), name.to_string());
        Some(location)
    }

    fn create_vertex_array(
        &self,
        layout: &VertexArrayLayout,
    ) -> Result<VertexArrayHandle, DeviceError> {
        let mut state = self.state.borrow_mut();
        let referenced = layout
            .attributes
            .iter()
            .map(|attribute| attribute.buffer)
            .chain(layout.index_buffer);
        for buffer in referenced {
            if !state.buffers.contains_key(&buffer) {
                return Err(DeviceError {
                    operation: "vertex array setup",
                    message: format!("buffer {} does not exist", buffer.0),
                });
            }
        }
        let handle = VertexArrayHandle(state.next());
        state.vertex_arrays.insert(handle, layout.clone());
        Ok(handle)
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayHandle) {
        self.state.borrow_mut().vertex_arrays.remove(&vertex_array);
    }

    fn use_program(&self, program: ProgramHandle) {
        self.state.borrow_mut().bound_program = Some(program);
    }

    fn set_uniform(&self, location: UniformLocation, value: Uniform<'_>) {
        let mut state = self.state.borrow_mut();
        let Some(program) = state.bound_program else {
            return;
        };
        let Some(name) = state.location_names.get(&(program, location.0)).cloned() else {
            return;
        };
        state
            .uniform_values
            .entry(program)
            .or_default()
            .insert(name, flatten(value));
    }

    fn bind_texture(&self, unit: u32, texture: TextureHandle) {
        self.state.borrow_mut().bound_textures.insert(unit, texture);
    }

    fn draw(&self, vertex_array: VertexArrayHandle, command: &DrawCommand) {
        let mut state = self.state.borrow_mut();
        let Some(program) = state.bound_program else {
            log::warn!("draw without a bound program ignored");
            return;
        };
        let mut textures = state
            .bound_textures
            .iter()
            .map(|(unit, texture)| (*unit, *texture))
            .collect::<Vec<_>>();
        textures.sort();
        let uniforms = state
            .uniform_values
            .get(&program)
            .cloned()
            .unwrap_or_default();
        state.draws.push(DrawRecord {
            program,
            vertex_array,
            command: *command,
            textures,
            uniforms,
        });
    }
}
