//! Conversion from a document parsed by the `gltf` crate.

use glam::{Quat, Vec3};
use gltf::image::Source;

use crate::scene::{
    Accessor, AccessorType, Animation, AnimationChannel, AnimationPath, BufferTarget, BufferView,
    ComponentType, Image, Interpolation, MagFilter, Material, Mesh, MinFilter, MorphTarget, Node,
    PixelFormat, Primitive, PrimitiveMode, Sampler, Scene, SceneRoot, Semantic, Skin, Texture,
    TextureRef, Transform, WrapMode,
};

/// Builds a [`Scene`] from a parsed document and its resolved resources.
///
/// `buffers` are indexed like the document's buffers. When `decoded_images` has one
/// entry per document image (as `gltf::import` returns them) the decoded
/// pixels are used, otherwise images embedded in buffer views are kept
/// encoded and decoded at upload time.
pub fn from_gltf(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    decoded_images: &[gltf::image::Data],
) -> Scene {
    let buffers = document
        .buffers()
        .map(|buffer| {
            buffers
                .get(buffer.index())
                .map(|data| data.0.clone())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();

    let buffer_views = document
        .views()
        .map(|view| BufferView {
            buffer: view.buffer().index(),
            byte_offset: view.offset(),
            byte_length: view.length(),
            byte_stride: view.stride(),
            target: view.target().map(|target| match target {
                gltf::buffer::Target::ArrayBuffer => BufferTarget::ArrayBuffer,
                gltf::buffer::Target::ElementArrayBuffer => BufferTarget::ElementArrayBuffer,
            }),
        })
        .collect();

    let accessors = document
        .accessors()
        .map(|accessor| {
            if accessor.sparse().is_some() {
                log::warn!(
                    "sparse storage of accessor {} is not applied",
                    accessor.index()
                );
            }
            Accessor {
                buffer_view: accessor.view().map(|view| view.index()),
                byte_offset: accessor.offset(),
                count: accessor.count(),
                component_type: component_type(accessor.data_type()),
                accessor_type: accessor_type(accessor.dimensions()),
                normalized: accessor.normalized(),
            }
        })
        .collect();

    let images = document
        .images()
        .map(|image| convert_image(&image, &buffers, decoded_images, document.images().len()))
        .collect();

    let samplers = document
        .samplers()
        .map(|sampler| Sampler {
            mag_filter: sampler.mag_filter().map(|filter| match filter {
                gltf::texture::MagFilter::Nearest => MagFilter::Nearest,
                gltf::texture::MagFilter::Linear => MagFilter::Linear,
            }),
            min_filter: sampler.min_filter().map(|filter| match filter {
                gltf::texture::MinFilter::Nearest => MinFilter::Nearest,
                gltf::texture::MinFilter::Linear => MinFilter::Linear,
                gltf::texture::MinFilter::NearestMipmapNearest => MinFilter::NearestMipmapNearest,
                gltf::texture::MinFilter::LinearMipmapNearest => MinFilter::LinearMipmapNearest,
                gltf::texture::MinFilter::NearestMipmapLinear => MinFilter::NearestMipmapLinear,
                gltf::texture::MinFilter::LinearMipmapLinear => MinFilter::LinearMipmapLinear,
            }),
            wrap_s: wrap_mode(sampler.wrap_s()),
            wrap_t: wrap_mode(sampler.wrap_t()),
        })
        .collect();

    let textures = document
        .textures()
        .map(|texture| Texture {
            source: texture.source().index(),
            sampler: texture.sampler().index(),
        })
        .collect();

    let materials = document.materials().map(|m| convert_material(&m)).collect();
    let meshes = document.meshes().map(|m| convert_mesh(&m)).collect();

    let nodes = document
        .nodes()
        .map(|node| {
            let (translation, rotation, scale) = node.transform().decomposed();
            Node {
                name: node.name().map(str::to_string),
                children: node.children().map(|child| child.index()).collect(),
                mesh: node.mesh().map(|mesh| mesh.index()),
                skin: node.skin().map(|skin| skin.index()),
                transform: Transform {
                    translation: Vec3::from(translation),
                    rotation: Quat::from_array(rotation),
                    scale: Vec3::from(scale),
                },
                weights: node.weights().map(<[f32]>::to_vec).unwrap_or_default(),
            }
        })
        .collect();

    let skins = document
        .skins()
        .map(|skin| Skin {
            joints: skin.joints().map(|joint| joint.index()).collect(),
            inverse_bind_matrices: skin.inverse_bind_matrices().map(|a| a.index()),
        })
        .collect();

    let animations = document
        .animations()
        .map(|animation| Animation {
            name: animation.name().map(str::to_string),
            channels: animation
                .channels()
                .map(|channel| {
                    let sampler = channel.sampler();
                    AnimationChannel {
                        node: channel.target().node().index(),
                        path: match channel.target().property() {
                            gltf::animation::Property::Translation => AnimationPath::Translation,
                            gltf::animation::Property::Rotation => AnimationPath::Rotation,
                            gltf::animation::Property::Scale => AnimationPath::Scale,
                            gltf::animation::Property::MorphTargetWeights => {
                                AnimationPath::Weights
                            }
                        },
                        input: sampler.input().index(),
                        output: sampler.output().index(),
                        interpolation: match sampler.interpolation() {
                            gltf::animation::Interpolation::Linear => Interpolation::Linear,
                            gltf::animation::Interpolation::Step => Interpolation::Step,
                            gltf::animation::Interpolation::CubicSpline => {
                                Interpolation::CubicSpline
                            }
                        },
                    }
                })
                .collect(),
        })
        .collect();

    let roots = document
        .scenes()
        .map(|scene| SceneRoot {
            name: scene.name().map(str::to_string),
            nodes: scene.nodes().map(|node| node.index()).collect(),
        })
        .collect();

    Scene {
        buffers,
        buffer_views,
        accessors,
        images,
        samplers,
        textures,
        materials,
        meshes,
        nodes,
        skins,
        animations,
        roots,
        default_root: document.default_scene().map(|scene| scene.index()),
    }
}

fn component_type(data_type: gltf::accessor::DataType) -> ComponentType {
    use gltf::accessor::DataType;
    match data_type {
        DataType::I8 => ComponentType::I8,
        DataType::U8 => ComponentType::U8,
        DataType::I16 => ComponentType::I16,
        DataType::U16 => ComponentType::U16,
        DataType::U32 => ComponentType::U32,
        DataType::F32 => ComponentType::F32,
    }
}

fn accessor_type(dimensions: gltf::accessor::Dimensions) -> AccessorType {
    use gltf::accessor::Dimensions;
    match dimensions {
        Dimensions::Scalar => AccessorType::Scalar,
        Dimensions::Vec2 => AccessorType::Vec2,
        Dimensions::Vec3 => AccessorType::Vec3,
        Dimensions::Vec4 => AccessorType::Vec4,
        Dimensions::Mat2 => AccessorType::Mat2,
        Dimensions::Mat3 => AccessorType::Mat3,
        Dimensions::Mat4 => AccessorType::Mat4,
    }
}

fn wrap_mode(mode: gltf::texture::WrappingMode) -> WrapMode {
    match mode {
        gltf::texture::WrappingMode::ClampToEdge => WrapMode::ClampToEdge,
        gltf::texture::WrappingMode::MirroredRepeat => WrapMode::MirroredRepeat,
        gltf::texture::WrappingMode::Repeat => WrapMode::Repeat,
    }
}

fn convert_image(
    image: &gltf::Image,
    buffers: &[Vec<u8>],
    decoded: &[gltf::image::Data],
    image_count: usize,
) -> Image {
    if decoded.len() == image_count {
        if let Some(data) = decoded.get(image.index()) {
            use gltf::image::Format;
            let format = match data.format {
                Format::R8 => PixelFormat::R8,
                Format::R8G8 => PixelFormat::R8G8,
                Format::R8G8B8 => PixelFormat::R8G8B8,
                Format::R8G8B8A8 => PixelFormat::R8G8B8A8,
                Format::R16 => PixelFormat::R16,
                Format::R16G16 => PixelFormat::R16G16,
                Format::R16G16B16 => PixelFormat::R16G16B16,
                Format::R16G16B16A16 => PixelFormat::R16G16B16A16,
                Format::R32G32B32FLOAT => PixelFormat::R32G32B32Float,
                Format::R32G32B32A32FLOAT => PixelFormat::R32G32B32A32Float,
            };
            return Image::Pixels {
                width: data.width,
                height: data.height,
                format,
                data: data.pixels.clone(),
            };
        }
    }

    match image.source() {
        Source::View { view, mime_type } => {
            let start = view.offset();
            let bytes = buffers
                .get(view.buffer().index())
                .and_then(|buffer| buffer.get(start..start + view.length()));
            match bytes {
                Some(bytes) => Image::Encoded {
                    bytes: bytes.to_vec(),
                    mime_type: Some(mime_type.to_string()),
                },
                None => Image::Empty,
            }
        }
        Source::Uri { uri, .. } => {
            log::warn!("image {} at {uri:?} was not resolved by the loader", image.index());
            Image::Empty
        }
    }
}

fn texture_ref(texture: gltf::Texture, tex_coord: u32) -> TextureRef {
    TextureRef {
        texture: texture.index(),
        tex_coord,
    }
}

fn convert_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    Material {
        name: material.name().map(str::to_string),
        base_color_factor: pbr.base_color_factor(),
        base_color_texture: pbr
            .base_color_texture()
            .map(|info| texture_ref(info.texture(), info.tex_coord())),
        metallic_factor: pbr.metallic_factor(),
        roughness_factor: pbr.roughness_factor(),
        metallic_roughness_texture: pbr
            .metallic_roughness_texture()
            .map(|info| texture_ref(info.texture(), info.tex_coord())),
        normal_texture: material
            .normal_texture()
            .map(|info| texture_ref(info.texture(), info.tex_coord())),
        normal_scale: material.normal_texture().map_or(1.0, |info| info.scale()),
        occlusion_texture: material
            .occlusion_texture()
            .map(|info| texture_ref(info.texture(), info.tex_coord())),
        occlusion_strength: material
            .occlusion_texture()
            .map_or(1.0, |info| info.strength()),
        emissive_texture: material
            .emissive_texture()
            .map(|info| texture_ref(info.texture(), info.tex_coord())),
        emissive_factor: material.emissive_factor(),
    }
}

fn convert_mesh(mesh: &gltf::Mesh) -> Mesh {
    let primitives = mesh
        .primitives()
        .map(|primitive| {
            let mut attributes = std::collections::BTreeMap::new();
            for (semantic, accessor) in primitive.attributes() {
                let semantic = match semantic {
                    gltf::Semantic::Positions => Semantic::Position,
                    gltf::Semantic::Normals => Semantic::Normal,
                    gltf::Semantic::Tangents => Semantic::Tangent,
                    gltf::Semantic::TexCoords(0) => Semantic::TexCoord0,
                    gltf::Semantic::TexCoords(1) => Semantic::TexCoord1,
                    gltf::Semantic::Joints(0) => Semantic::Joints0,
                    gltf::Semantic::Weights(0) => Semantic::Weights0,
                    other => {
                        log::debug!("ignoring unsupported attribute {other:?}");
                        continue;
                    }
                };
                attributes.insert(semantic, accessor.index());
            }
            Primitive {
                attributes,
                indices: primitive.indices().map(|accessor| accessor.index()),
                material: primitive.material().index(),
                targets: primitive
                    .morph_targets()
                    .map(|target| MorphTarget {
                        position: target.positions().map(|a| a.index()),
                        normal: target.normals().map(|a| a.index()),
                        tangent: target.tangents().map(|a| a.index()),
                    })
                    .collect(),
                mode: match primitive.mode() {
                    gltf::mesh::Mode::Points => PrimitiveMode::Points,
                    gltf::mesh::Mode::Lines => PrimitiveMode::Lines,
                    gltf::mesh::Mode::LineLoop => PrimitiveMode::LineLoop,
                    gltf::mesh::Mode::LineStrip => PrimitiveMode::LineStrip,
                    gltf::mesh::Mode::Triangles => PrimitiveMode::Triangles,
                    gltf::mesh::Mode::TriangleStrip => PrimitiveMode::TriangleStrip,
                    gltf::mesh::Mode::TriangleFan => PrimitiveMode::TriangleFan,
                },
            }
        })
        .collect();
    Mesh {
        name: mesh.name().map(str::to_string),
        primitives,
        weights: mesh.weights().map(<[f32]>::to_vec).unwrap_or_default(),
    }
}
