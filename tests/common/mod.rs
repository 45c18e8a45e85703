#![allow(dead_code)]

use std::rc::Rc;

use gltf_stage::device::HeadlessDevice;
use gltf_stage::scene::{
    Accessor, AccessorType, Animation, AnimationChannel, AnimationPath, BufferTarget, BufferView,
    ComponentType, Image, Interpolation, Material, Mesh, MorphTarget, Node, PixelFormat, Primitive,
    Sampler, Scene, Semantic, Texture, TextureRef,
};
use gltf_stage::Application;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A headless device and an application drawing through it.
pub fn headless_app() -> (Rc<HeadlessDevice>, Application) {
    init_logging();
    let device = Rc::new(HeadlessDevice::new());
    let app = Application::with_builtin_shaders(device.clone());
    (device, app)
}

/// Builds scenes whose accessors each get their own view into one buffer.
#[derive(Default)]
pub struct SceneBuilder {
    pub scene: Scene,
}

impl SceneBuilder {
    pub fn new() -> SceneBuilder {
        let mut builder = SceneBuilder::default();
        builder.scene.buffers.push(Vec::new());
        builder
    }

    pub fn accessor(
        &mut self,
        bytes: &[u8],
        count: usize,
        component_type: ComponentType,
        accessor_type: AccessorType,
        target: Option<BufferTarget>,
    ) -> usize {
        let buffer = &mut self.scene.buffers[0];
        while buffer.len() % 4 != 0 {
            buffer.push(0);
        }
        let byte_offset = buffer.len();
        buffer.extend_from_slice(bytes);
        self.scene.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset,
            byte_length: bytes.len(),
            byte_stride: None,
            target,
        });
        self.scene.accessors.push(Accessor {
            buffer_view: Some(self.scene.buffer_views.len() - 1),
            byte_offset: 0,
            count,
            component_type,
            accessor_type,
            normalized: false,
        });
        self.scene.accessors.len() - 1
    }

    pub fn floats(&mut self, values: &[f32], accessor_type: AccessorType) -> usize {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>();
        let count = values.len() / accessor_type.component_count();
        self.accessor(
            &bytes,
            count,
            ComponentType::F32,
            accessor_type,
            Some(BufferTarget::ArrayBuffer),
        )
    }

    /// Scalar floats for animation data, with no declared target.
    pub fn keyframes(&mut self, values: &[f32], accessor_type: AccessorType) -> usize {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>();
        let count = values.len() / accessor_type.component_count();
        self.accessor(&bytes, count, ComponentType::F32, accessor_type, None)
    }

    pub fn indices(&mut self, indices: &[u16], target: Option<BufferTarget>) -> usize {
        let bytes = indices.iter().flat_map(|i| i.to_le_bytes()).collect::<Vec<_>>();
        self.accessor(
            &bytes,
            indices.len(),
            ComponentType::U16,
            AccessorType::Scalar,
            target,
        )
    }

    /// An accessor that names no buffer view.
    pub fn empty_accessor(&mut self, accessor_type: AccessorType) -> usize {
        self.scene.accessors.push(Accessor {
            buffer_view: None,
            byte_offset: 0,
            count: 3,
            component_type: ComponentType::F32,
            accessor_type,
            normalized: false,
        });
        self.scene.accessors.len() - 1
    }

    pub fn positions(&mut self) -> usize {
        self.floats(
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            AccessorType::Vec3,
        )
    }

    pub fn normals(&mut self) -> usize {
        self.floats(&[0.0, 0.0, 1.0].repeat(3), AccessorType::Vec3)
    }

    pub fn tex_coords(&mut self) -> usize {
        self.floats(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0], AccessorType::Vec2)
    }

    /// A triangle primitive with fresh accessors for each of `semantics`.
    pub fn triangle(&mut self, semantics: &[Semantic]) -> Primitive {
        let mut primitive = Primitive::default();
        for &semantic in semantics {
            let accessor = match semantic {
                Semantic::Position => self.positions(),
                Semantic::Normal => self.normals(),
                Semantic::TexCoord0 | Semantic::TexCoord1 => self.tex_coords(),
                Semantic::Tangent => self.floats(&[1.0, 0.0, 0.0, 1.0].repeat(3), AccessorType::Vec4),
                Semantic::Joints0 => self.accessor(
                    &[0, 1, 0, 0].repeat(3),
                    3,
                    ComponentType::U8,
                    AccessorType::Vec4,
                    Some(BufferTarget::ArrayBuffer),
                ),
                Semantic::Weights0 => {
                    self.floats(&[0.5, 0.5, 0.0, 0.0].repeat(3), AccessorType::Vec4)
                }
            };
            primitive.attributes.insert(semantic, accessor);
        }
        primitive
    }

    /// Adds a mesh and a root node showing it. Returns the node index.
    pub fn mesh_node(&mut self, primitives: Vec<Primitive>) -> usize {
        self.scene.meshes.push(Mesh {
            name: None,
            primitives,
            weights: Vec::new(),
        });
        self.scene.nodes.push(Node {
            mesh: Some(self.scene.meshes.len() - 1),
            ..Default::default()
        });
        self.scene.nodes.len() - 1
    }

    pub fn texture(&mut self, image: Image, sampler: Option<Sampler>) -> usize {
        self.scene.images.push(image);
        let sampler = sampler.map(|sampler| {
            self.scene.samplers.push(sampler);
            self.scene.samplers.len() - 1
        });
        self.scene.textures.push(Texture {
            source: self.scene.images.len() - 1,
            sampler,
        });
        self.scene.textures.len() - 1
    }

    /// A material sampling `texture` as its base color.
    pub fn textured_material(&mut self, texture: usize) -> usize {
        self.scene.materials.push(Material {
            base_color_texture: Some(TextureRef {
                texture,
                tex_coord: 0,
            }),
            ..Default::default()
        });
        self.scene.materials.len() - 1
    }

    /// A single-channel animation of `node`. `values` holds the keyframe
    /// outputs as `accessor_type` elements.
    pub fn animation(
        &mut self,
        node: usize,
        path: AnimationPath,
        interpolation: Interpolation,
        times: &[f32],
        values: &[f32],
        accessor_type: AccessorType,
    ) -> usize {
        let input = self.keyframes(times, AccessorType::Scalar);
        let output = self.keyframes(values, accessor_type);
        self.scene.animations.push(Animation {
            name: Some(format!("{path:?}").to_lowercase()),
            channels: vec![AnimationChannel {
                node,
                path,
                input,
                output,
                interpolation,
            }],
        });
        self.scene.animations.len() - 1
    }

    /// A linear translation animation of `node` over `times`.
    pub fn translation_animation(&mut self, node: usize, times: &[f32], values: &[f32]) -> usize {
        self.animation(
            node,
            AnimationPath::Translation,
            Interpolation::Linear,
            times,
            values,
            AccessorType::Vec3,
        )
    }

    /// A mesh node whose triangle carries `count` position morph targets.
    pub fn morphing_node(&mut self, count: usize) -> usize {
        let mut primitive = self.triangle(&[Semantic::Position]);
        primitive.targets = (0..count)
            .map(|_| MorphTarget {
                position: Some(self.positions()),
                normal: None,
                tangent: None,
            })
            .collect();
        self.mesh_node(vec![primitive])
    }

    pub fn build(self) -> Scene {
        self.scene
    }
}

pub fn rgba_pixels(width: u32, height: u32) -> Image {
    Image::Pixels {
        width,
        height,
        format: PixelFormat::R8G8B8A8,
        data: vec![0x80; (width * height * 4) as usize],
    }
}

pub fn png_image(width: u32, height: u32) -> Image {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]))
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encoding test png");
    Image::Encoded {
        bytes: bytes.into_inner(),
        mime_type: Some("image/png".to_string()),
    }
}

pub fn broken_image() -> Image {
    Image::Encoded {
        bytes: b"definitely not a png".to_vec(),
        mime_type: Some("image/png".to_string()),
    }
}

/// One textured triangle on one root node, with a texture per image. The
/// triangle's material samples the first.
pub fn textured_scene(images: Vec<Image>) -> Scene {
    let mut builder = SceneBuilder::new();
    let mut primitive = builder.triangle(&[Semantic::Position, Semantic::TexCoord0]);
    let textures = images
        .into_iter()
        .map(|image| builder.texture(image, None))
        .collect::<Vec<_>>();
    if let Some(&first) = textures.first() {
        primitive.material = Some(builder.textured_material(first));
    }
    builder.mesh_node(vec![primitive]);
    builder.build()
}
