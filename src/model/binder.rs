//! Primitive binding: shader variant selection and vertex array layout.
//!
//! Both come from the same attribute table, so a flag in a program variant
//! always has a matching attribute slot and vice versa.

use std::rc::Rc;

use crate::device::{
    AttributeKind, BufferHandle, Device, DrawCommand, VertexArrayHandle, VertexArrayLayout,
    VertexAttribute,
};
use crate::error::{ConfigurationError, Error, ResourceError, ResourceKind};
use crate::model::DeviceResources;
use crate::scene::{Material, Mesh, Primitive, Scene, Semantic};
use crate::shader::{
    Define, DefineSet, Program, ProgramCache, ShaderPair, ATTR_LOC_JOINTS_0,
    ATTR_LOC_MORPH_NORMAL, ATTR_LOC_MORPH_POSITION, ATTR_LOC_MORPH_TANGENT, ATTR_LOC_NORMAL,
    ATTR_LOC_POSITION, ATTR_LOC_TANGENT, ATTR_LOC_TEXCOORD_0, ATTR_LOC_TEXCOORD_1,
    ATTR_LOC_WEIGHTS_0, MAX_JOINTS,
};

struct AttributeSlot {
    semantic: Semantic,
    define: Option<Define>,
    slot: u32,
    integer: bool,
}

const ATTRIBUTES: [AttributeSlot; 7] = [
    AttributeSlot {
        semantic: Semantic::Position,
        define: None,
        slot: ATTR_LOC_POSITION,
        integer: false,
    },
    AttributeSlot {
        semantic: Semantic::Normal,
        define: Some(Define::HasNormal),
        slot: ATTR_LOC_NORMAL,
        integer: false,
    },
    AttributeSlot {
        semantic: Semantic::Tangent,
        define: Some(Define::HasTangent),
        slot: ATTR_LOC_TANGENT,
        integer: false,
    },
    AttributeSlot {
        semantic: Semantic::TexCoord0,
        define: Some(Define::HasTexCoord0),
        slot: ATTR_LOC_TEXCOORD_0,
        integer: false,
    },
    AttributeSlot {
        semantic: Semantic::TexCoord1,
        define: Some(Define::HasTexCoord1),
        slot: ATTR_LOC_TEXCOORD_1,
        integer: false,
    },
    AttributeSlot {
        semantic: Semantic::Joints0,
        define: Some(Define::HasJoints0),
        slot: ATTR_LOC_JOINTS_0,
        integer: true,
    },
    AttributeSlot {
        semantic: Semantic::Weights0,
        define: Some(Define::HasWeights0),
        slot: ATTR_LOC_WEIGHTS_0,
        integer: false,
    },
];

/// Morph target `i` binds to `base + i`.
const MORPH_ATTRIBUTES: [(Semantic, Define, u32); 3] = [
    (Semantic::Position, Define::HasMorphPosition, ATTR_LOC_MORPH_POSITION),
    (Semantic::Normal, Define::HasMorphNormal, ATTR_LOC_MORPH_NORMAL),
    (Semantic::Tangent, Define::HasMorphTangent, ATTR_LOC_MORPH_TANGENT),
];

/// The device side of one primitive: its program variant, vertex array and
/// draw call. Created with the model and never changed afterwards.
#[derive(Debug)]
pub struct PrimitiveBinding {
    pub(crate) program: Rc<Program>,
    pub(crate) vertex_array: VertexArrayHandle,
    pub(crate) draw: DrawCommand,
    pub(crate) material: Option<usize>,
}

impl PrimitiveBinding {
    pub fn program(&self) -> &Rc<Program> {
        &self.program
    }

    pub fn vertex_array(&self) -> VertexArrayHandle {
        self.vertex_array
    }

    pub fn draw_command(&self) -> &DrawCommand {
        &self.draw
    }

    pub fn material(&self) -> Option<usize> {
        self.material
    }
}

/// Morph targets the mesh's shader variant has room for: the longer of the
/// mesh's default weights and its primitives' target lists.
pub fn morph_target_count(mesh: &Mesh) -> usize {
    mesh.primitives
        .iter()
        .map(|primitive| primitive.targets.len())
        .chain([mesh.weights.len()])
        .max()
        .unwrap_or(0)
}

/// The program variant flags of a primitive, given the flags every primitive
/// of the model starts from.
pub fn derive_defines(
    base: &DefineSet,
    mesh: &Mesh,
    primitive: &Primitive,
    material: Option<&Material>,
) -> DefineSet {
    let mut defines = base.clone();
    let morph_targets = morph_target_count(mesh);
    if morph_targets > 0 {
        defines.insert(Define::MorphTargetCount(morph_targets));
    }

    for attribute in &ATTRIBUTES {
        if let Some(define) = &attribute.define {
            if primitive.attributes.contains_key(&attribute.semantic) {
                defines.insert(define.clone());
            }
        }
    }
    if defines.contains(&[Define::HasJoints0, Define::HasWeights0]) {
        defines.insert(Define::MaxJoints(MAX_JOINTS));
    }

    for (semantic, define, _) in &MORPH_ATTRIBUTES {
        if primitive.targets.iter().any(|target| target.get(*semantic).is_some()) {
            defines.insert(define.clone());
        }
    }

    if let Some(material) = material {
        let textures = [
            (material.base_color_texture, Define::HasBaseColorTexture),
            (
                material.metallic_roughness_texture,
                Define::HasMetallicRoughnessTexture,
            ),
            (material.normal_texture, Define::HasNormalTexture),
            (material.occlusion_texture, Define::HasOcclusionTexture),
            (material.emissive_texture, Define::HasEmissiveTexture),
        ];
        for (texture, define) in textures {
            if texture.is_some() {
                defines.insert(define);
            }
        }
    }
    defines
}

/// Where each of the primitive's attributes lives. `buffers` is indexed by
/// accessor. Accessor data is uploaded tightly packed, so every attribute
/// starts at offset 0 with its element size as stride.
pub fn vertex_layout(
    scene: &Scene,
    primitive: &Primitive,
    buffers: &[Option<BufferHandle>],
) -> Result<VertexArrayLayout, ConfigurationError> {
    let attribute = |accessor_index: usize,
                     slot: u32,
                     integer: bool|
     -> Result<VertexAttribute, ConfigurationError> {
        let accessor = scene
            .accessors
            .get(accessor_index)
            .ok_or(ConfigurationError::DanglingIndex {
                kind: "accessor",
                index: accessor_index,
            })?;
        let buffer = buffers
            .get(accessor_index)
            .copied()
            .flatten()
            .ok_or(ConfigurationError::MissingAccessorData {
                accessor: accessor_index,
            })?;
        let kind = if integer {
            AttributeKind::Integer
        } else {
            AttributeKind::Float {
                normalized: accessor.normalized,
            }
        };
        log::trace!("slot {slot}: accessor {accessor_index} ({kind:?})");
        Ok(VertexAttribute {
            slot,
            buffer,
            components: accessor.accessor_type.component_count() as u32,
            component_type: accessor.component_type,
            kind,
            stride: accessor.element_size() as u32,
            offset: 0,
        })
    };

    let mut layout = VertexArrayLayout::default();
    for slot in &ATTRIBUTES {
        if let Some(&accessor) = primitive.attributes.get(&slot.semantic) {
            layout
                .attributes
                .push(attribute(accessor, slot.slot, slot.integer)?);
        }
    }
    for (i, target) in primitive.targets.iter().enumerate() {
        for (semantic, _, base) in &MORPH_ATTRIBUTES {
            if let Some(accessor) = target.get(*semantic) {
                layout
                    .attributes
                    .push(attribute(accessor, base + i as u32, false)?);
            }
        }
    }
    if let Some(indices) = primitive.indices {
        let buffer = buffers
            .get(indices)
            .copied()
            .flatten()
            .ok_or(ConfigurationError::MissingAccessorData { accessor: indices })?;
        layout.index_buffer = Some(buffer);
    }
    Ok(layout)
}

/// Indexed when the primitive has indices, otherwise one vertex per POSITION
/// element.
pub fn draw_command(scene: &Scene, primitive: &Primitive) -> DrawCommand {
    let index_accessor = primitive
        .indices
        .and_then(|indices| scene.accessors.get(indices));
    match index_accessor {
        Some(indices) => DrawCommand::Indexed {
            mode: primitive.mode,
            count: indices.count as u32,
            index_type: indices.component_type,
        },
        None => DrawCommand::Arrays {
            mode: primitive.mode,
            count: primitive
                .attributes
                .get(&Semantic::Position)
                .and_then(|&position| scene.accessors.get(position))
                .map_or(0, |position| position.count as u32),
        },
    }
}

/// Binds every primitive of every mesh, indexed `[mesh][primitive]`. Vertex
/// arrays are recorded in `resources` as soon as they exist.
pub(crate) fn bind_meshes(
    device: &Rc<dyn Device>,
    programs: &mut ProgramCache,
    shaders: &ShaderPair,
    base: &DefineSet,
    scene: &Scene,
    resources: &mut DeviceResources,
) -> Result<Vec<Vec<PrimitiveBinding>>, Error> {
    let mut meshes = Vec::with_capacity(scene.meshes.len());
    for (mesh_index, mesh) in scene.meshes.iter().enumerate() {
        let mut bindings = Vec::with_capacity(mesh.primitives.len());
        for primitive in &mesh.primitives {
            let material = primitive
                .material
                .and_then(|material| scene.materials.get(material));
            let defines = derive_defines(base, mesh, primitive, material);
            let program = programs.build(device, shaders.vertex(), shaders.fragment(), &defines)?;

            let layout = vertex_layout(scene, primitive, &resources.buffers)?;
            let vertex_array =
                device
                    .create_vertex_array(&layout)
                    .map_err(|source| ResourceError {
                        kind: ResourceKind::VertexArray,
                        index: mesh_index,
                        source,
                    })?;
            resources.vertex_arrays.push(vertex_array);

            bindings.push(PrimitiveBinding {
                program,
                vertex_array,
                draw: draw_command(scene, primitive),
                material: primitive.material,
            });
        }
        meshes.push(bindings);
    }
    Ok(meshes)
}
