//! The in-memory scene graph a model is built from.
//!
//! A `Scene` is plain data: an asset loader fills it in (see [`import`] for the
//! `gltf` crate adapter), the model build reads it, and nothing in it refers to
//! device objects. Cross references are indices into the `Scene`'s vectors.

use std::borrow::Cow;
use std::collections::BTreeMap;

use glam::{Mat4, Quat, Vec3};

use crate::error::ConfigurationError;

pub mod import;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub fn size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }

    pub fn is_float(self) -> bool {
        self == ComponentType::F32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    pub fn component_count(self) -> usize {
        match self {
            AccessorType::Scalar => 1,
            AccessorType::Vec2 => 2,
            AccessorType::Vec3 => 3,
            AccessorType::Vec4 | AccessorType::Mat2 => 4,
            AccessorType::Mat3 => 9,
            AccessorType::Mat4 => 16,
        }
    }
}

/// The role a buffer view declares for its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    ArrayBuffer,
    ElementArrayBuffer,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub target: Option<BufferTarget>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accessor {
    /// `None` for accessors without backing data (e.g. all-sparse ones).
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub count: usize,
    pub component_type: ComponentType,
    pub accessor_type: AccessorType,
    pub normalized: bool,
}

impl Accessor {
    /// Size of one tightly packed element.
    pub fn element_size(&self) -> usize {
        self.accessor_type.component_count() * self.component_type.size()
    }

    /// `count * components * component size`, the exact upload size.
    pub fn byte_size(&self) -> usize {
        self.count * self.element_size()
    }
}

/// Vertex attribute semantics the renderer binds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Semantic {
    Position,
    Normal,
    Tangent,
    TexCoord0,
    TexCoord1,
    Joints0,
    Weights0,
}

/// Attribute overrides of one morph target, as accessor indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MorphTarget {
    pub position: Option<usize>,
    pub normal: Option<usize>,
    pub tangent: Option<usize>,
}

impl MorphTarget {
    pub fn get(&self, semantic: Semantic) -> Option<usize> {
        match semantic {
            Semantic::Position => self.position,
            Semantic::Normal => self.normal,
            Semantic::Tangent => self.tangent,
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Primitive {
    pub attributes: BTreeMap<Semantic, usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    pub targets: Vec<MorphTarget>,
    pub mode: PrimitiveMode,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
    /// Default morph target weights.
    pub weights: Vec<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureRef {
    pub texture: usize,
    pub tex_coord: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureRef>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureRef>,
    pub normal_texture: Option<TextureRef>,
    pub normal_scale: f32,
    pub occlusion_texture: Option<TextureRef>,
    pub occlusion_strength: f32,
    pub emissive_texture: Option<TextureRef>,
    pub emissive_factor: [f32; 3],
}

impl Default for Material {
    fn default() -> Material {
        Material {
            name: None,
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            emissive_texture: None,
            emissive_factor: [0.0; 3],
        }
    }
}

impl Material {
    pub fn textures(&self) -> impl Iterator<Item = TextureRef> {
        [
            self.base_color_texture,
            self.metallic_roughness_texture,
            self.normal_texture,
            self.occlusion_texture,
            self.emissive_texture,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MagFilter {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, MinFilter::Nearest | MinFilter::Linear)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    MirroredRepeat,
    #[default]
    Repeat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sampler {
    pub mag_filter: Option<MagFilter>,
    pub min_filter: Option<MinFilter>,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

impl Sampler {
    /// Unspecified filters resolve to trilinear filtering.
    pub fn resolved_min_filter(&self) -> MinFilter {
        self.min_filter.unwrap_or(MinFilter::LinearMipmapLinear)
    }

    pub fn resolved_mag_filter(&self) -> MagFilter {
        self.mag_filter.unwrap_or(MagFilter::Linear)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Texture {
    pub source: usize,
    pub sampler: Option<usize>,
}

/// Layouts of already-decoded pixel data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    R8,
    R8G8,
    R8G8B8,
    R8G8B8A8,
    R16,
    R16G16,
    R16G16B16,
    R16G16B16A16,
    R32G32B32Float,
    R32G32B32A32Float,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Image {
    /// A PNG/JPEG file's bytes.
    Encoded {
        bytes: Vec<u8>,
        mime_type: Option<String>,
    },
    /// Decoded pixels in native byte order.
    Pixels {
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    },
    /// Unresolved, or released after upload.
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_matrix(matrix: Mat4) -> Transform {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Transform {
            translation,
            rotation,
            scale,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Transform {
        Transform::IDENTITY
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub name: Option<String>,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
    pub transform: Transform,
    /// Overrides the mesh's default morph weights when non-empty.
    pub weights: Vec<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Skin {
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    CubicSpline,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimationChannel {
    pub node: usize,
    pub path: AnimationPath,
    /// Keyframe times (scalar float accessor).
    pub input: usize,
    /// Keyframe values.
    pub output: usize,
    pub interpolation: Interpolation,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Animation {
    pub name: Option<String>,
    pub channels: Vec<AnimationChannel>,
}

/// A set of root nodes; what glTF calls a scene.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneRoot {
    pub name: Option<String>,
    pub nodes: Vec<usize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub buffers: Vec<Vec<u8>>,
    pub buffer_views: Vec<BufferView>,
    pub accessors: Vec<Accessor>,
    pub images: Vec<Image>,
    pub samplers: Vec<Sampler>,
    pub textures: Vec<Texture>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub nodes: Vec<Node>,
    pub skins: Vec<Skin>,
    pub animations: Vec<Animation>,
    pub roots: Vec<SceneRoot>,
    pub default_root: Option<usize>,
}

impl Scene {
    /// The tightly packed bytes of an accessor, or `None` when it has no
    /// backing data. Interleaved views are de-interleaved into a copy.
    pub fn accessor_bytes(&self, index: usize) -> Result<Option<Cow<'_, [u8]>>, ConfigurationError> {
        let accessor = self
            .accessors
            .get(index)
            .ok_or(ConfigurationError::DanglingIndex {
                kind: "accessor",
                index,
            })?;
        let Some(view_index) = accessor.buffer_view else {
            return Ok(None);
        };
        if accessor.count == 0 {
            return Ok(None);
        }
        let view = self
            .buffer_views
            .get(view_index)
            .ok_or(ConfigurationError::DanglingIndex {
                kind: "buffer view",
                index: view_index,
            })?;
        let buffer = self
            .buffers
            .get(view.buffer)
            .ok_or(ConfigurationError::DanglingIndex {
                kind: "buffer",
                index: view.buffer,
            })?;
        if buffer.is_empty() {
            return Ok(None);
        }

        let element_size = accessor.element_size();
        let stride = view.byte_stride.filter(|&s| s > 0).unwrap_or(element_size);
        let out_of_bounds = ConfigurationError::AccessorOutOfBounds { accessor: index };
        let span = stride
            .checked_mul(accessor.count - 1)
            .and_then(|s| s.checked_add(element_size))
            .ok_or(out_of_bounds.clone())?;
        let end_in_view = accessor
            .byte_offset
            .checked_add(span)
            .ok_or(out_of_bounds.clone())?;
        if stride < element_size || end_in_view > view.byte_length {
            return Err(out_of_bounds);
        }
        let start = view
            .byte_offset
            .checked_add(accessor.byte_offset)
            .ok_or(out_of_bounds.clone())?;
        let end = start.checked_add(span).ok_or(out_of_bounds.clone())?;
        let bytes = buffer.get(start..end).ok_or(out_of_bounds)?;

        if stride == element_size {
            return Ok(Some(Cow::Borrowed(bytes)));
        }
        let mut packed = Vec::with_capacity(accessor.byte_size());
        for element in bytes.chunks(stride) {
            packed.extend_from_slice(&element[..element_size]);
        }
        Ok(Some(Cow::Owned(packed)))
    }

    /// Reads an accessor as floats, applying normalization to integer
    /// components the way glTF defines it.
    pub fn read_f32(&self, index: usize) -> Result<Vec<f32>, ConfigurationError> {
        let Some(bytes) = self.accessor_bytes(index)? else {
            return Err(ConfigurationError::MissingAccessorData { accessor: index });
        };
        let accessor = &self.accessors[index];
        let normalized = accessor.normalized;
        let component_size = accessor.component_type.size();
        let values = bytes
            .chunks_exact(component_size)
            .map(|c| match accessor.component_type {
                ComponentType::F32 => f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                ComponentType::U32 => u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32,
                ComponentType::I8 => {
                    let v = c[0] as i8 as f32;
                    if normalized { (v / 127.0).max(-1.0) } else { v }
                }
                ComponentType::U8 => {
                    let v = c[0] as f32;
                    if normalized { v / 255.0 } else { v }
                }
                ComponentType::I16 => {
                    let v = i16::from_le_bytes([c[0], c[1]]) as f32;
                    if normalized { (v / 32767.0).max(-1.0) } else { v }
                }
                ComponentType::U16 => {
                    let v = u16::from_le_bytes([c[0], c[1]]) as f32;
                    if normalized { v / 65535.0 } else { v }
                }
            })
            .collect();
        Ok(values)
    }

    /// Reads a MAT4 accessor.
    pub fn read_mat4(&self, index: usize) -> Result<Vec<Mat4>, ConfigurationError> {
        let values = self.read_f32(index)?;
        if self.accessors[index].accessor_type != AccessorType::Mat4 {
            return Err(ConfigurationError::UnexpectedAccessorType { accessor: index });
        }
        Ok(values.chunks_exact(16).map(Mat4::from_cols_slice).collect())
    }

    /// Drops buffer bytes and image data. Structure, materials and transforms
    /// stay.
    pub fn release_data(&mut self) {
        for buffer in &mut self.buffers {
            *buffer = Vec::new();
        }
        for image in &mut self.images {
            *image = Image::Empty;
        }
    }

    /// Root nodes of a scene root set: the given one, else the default, else
    /// the first, else every node without a parent.
    pub fn root_nodes(&self, root: Option<usize>) -> Result<Vec<usize>, ConfigurationError> {
        if let Some(root) = root {
            return self
                .roots
                .get(root)
                .map(|root| root.nodes.clone())
                .ok_or(ConfigurationError::UnknownScene(root));
        }
        if let Some(root) = self.default_root.or((!self.roots.is_empty()).then_some(0)) {
            return self.root_nodes(Some(root));
        }
        let mut is_child = vec![false; self.nodes.len()];
        for node in &self.nodes {
            for &child in &node.children {
                if let Some(flag) = is_child.get_mut(child) {
                    *flag = true;
                }
            }
        }
        Ok((0..self.nodes.len()).filter(|&i| !is_child[i]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with(buffer: Vec<u8>, view: BufferView, accessor: Accessor) -> Scene {
        Scene {
            buffers: vec![buffer],
            buffer_views: vec![view],
            accessors: vec![accessor],
            ..Default::default()
        }
    }

    #[test]
    fn packed_accessor_is_borrowed_exactly() {
        let floats: [f32; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut bytes = vec![0u8; 4];
        bytes.extend(floats.iter().flat_map(|f| f.to_le_bytes()));
        let scene = scene_with(
            bytes,
            BufferView {
                buffer: 0,
                byte_offset: 4,
                byte_length: 24,
                byte_stride: None,
                target: Some(BufferTarget::ArrayBuffer),
            },
            Accessor {
                buffer_view: Some(0),
                byte_offset: 0,
                count: 2,
                component_type: ComponentType::F32,
                accessor_type: AccessorType::Vec3,
                normalized: false,
            },
        );
        let data = scene.accessor_bytes(0).unwrap().unwrap();
        assert!(matches!(data, Cow::Borrowed(_)));
        assert_eq!(data.len(), 24);
        assert_eq!(scene.read_f32(0).unwrap(), floats.to_vec());
    }

    #[test]
    fn interleaved_accessor_is_packed() {
        // Two vertices of [u16 value, u16 padding].
        let bytes = vec![1, 0, 0xff, 0xff, 2, 0, 0xff, 0xff];
        let scene = scene_with(
            bytes,
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: 8,
                byte_stride: Some(4),
                target: None,
            },
            Accessor {
                buffer_view: Some(0),
                byte_offset: 0,
                count: 2,
                component_type: ComponentType::U16,
                accessor_type: AccessorType::Scalar,
                normalized: false,
            },
        );
        assert_eq!(&*scene.accessor_bytes(0).unwrap().unwrap(), &[1, 0, 2, 0]);
        assert_eq!(scene.read_f32(0).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn normalized_components() {
        let scene = scene_with(
            vec![255, 0, 128, 0],
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: 4,
                byte_stride: None,
                target: None,
            },
            Accessor {
                buffer_view: Some(0),
                byte_offset: 0,
                count: 1,
                component_type: ComponentType::U8,
                accessor_type: AccessorType::Vec4,
                normalized: true,
            },
        );
        let values = scene.read_f32(0).unwrap();
        assert_eq!(values[0], 1.0);
        assert_eq!(values[1], 0.0);
        assert!((values[2] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn out_of_bounds_accessor_is_rejected() {
        let scene = scene_with(
            vec![0; 8],
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: 8,
                byte_stride: None,
                target: None,
            },
            Accessor {
                buffer_view: Some(0),
                byte_offset: 0,
                count: 3,
                component_type: ComponentType::F32,
                accessor_type: AccessorType::Scalar,
                normalized: false,
            },
        );
        assert_eq!(
            scene.accessor_bytes(0),
            Err(ConfigurationError::AccessorOutOfBounds { accessor: 0 })
        );
    }

    #[test]
    fn huge_count_is_out_of_bounds() {
        let scene = scene_with(
            vec![0; 16],
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: 16,
                byte_stride: Some(16),
                target: None,
            },
            Accessor {
                buffer_view: Some(0),
                byte_offset: 0,
                count: usize::MAX,
                component_type: ComponentType::F32,
                accessor_type: AccessorType::Vec4,
                normalized: false,
            },
        );
        assert_eq!(
            scene.accessor_bytes(0),
            Err(ConfigurationError::AccessorOutOfBounds { accessor: 0 })
        );

        let mut scene = scene;
        scene.accessors[0].count = 1;
        scene.accessors[0].byte_offset = usize::MAX - 4;
        assert_eq!(
            scene.accessor_bytes(0),
            Err(ConfigurationError::AccessorOutOfBounds { accessor: 0 })
        );
    }

    #[test]
    fn accessor_without_view_has_no_data() {
        let scene = Scene {
            accessors: vec![Accessor {
                buffer_view: None,
                byte_offset: 0,
                count: 4,
                component_type: ComponentType::F32,
                accessor_type: AccessorType::Vec3,
                normalized: false,
            }],
            ..Default::default()
        };
        assert_eq!(scene.accessor_bytes(0), Ok(None));
    }

    #[test]
    fn parentless_nodes_are_roots_without_scenes() {
        let scene = Scene {
            nodes: vec![
                Node {
                    children: vec![2],
                    ..Default::default()
                },
                Node::default(),
                Node::default(),
            ],
            ..Default::default()
        };
        assert_eq!(scene.root_nodes(None).unwrap(), vec![0, 1]);
        assert_eq!(
            scene.root_nodes(Some(3)),
            Err(ConfigurationError::UnknownScene(3))
        );
    }
}
