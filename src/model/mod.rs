//! Model builds: validation, uploads and primitive binding.
//!
//! A build runs in phases. Everything that can be checked on the CPU is
//! checked before the first device call, so a scene that fails validation
//! never allocates anything. Upload passes roll themselves back, and the
//! resources of completed passes are owned by [`DeviceResources`] whose
//! `Drop` releases them if a later phase fails.

use std::fmt::{self, Display};
use std::rc::Rc;

use glam::Mat4;

use crate::animation::Clip;
use crate::device::{BufferHandle, Device, TextureHandle, VertexArrayHandle};
use crate::error::{ConfigurationError, Error};
use crate::scene::{AccessorType, BufferTarget, ComponentType, Scene, Semantic};
use crate::shader::{DefineSet, ProgramCache, Shader, ShaderPair, MAX_JOINTS, MAX_MORPH_TARGETS};

mod binder;
mod upload;

pub use binder::{derive_defines, draw_command, morph_target_count, vertex_layout, PrimitiveBinding};

/// Per-build configuration.
#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    /// Drop buffer bytes and image data from the model's scene once
    /// everything is on the device.
    pub clear_cache: bool,
    /// Per-stage replacements for the application's default shaders. The
    /// last shader given for a stage wins.
    pub shaders: Vec<Shader>,
    /// Flags every primitive's program variant starts from.
    pub defines: DefineSet,
}

/// Something questionable in the scene that the build worked around.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    UndeclaredBufferTarget {
        accessor: usize,
        assumed: BufferTarget,
    },
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UndeclaredBufferTarget { accessor, assumed } => {
                let role = match assumed {
                    BufferTarget::ArrayBuffer => "vertex",
                    BufferTarget::ElementArrayBuffer => "index",
                };
                write!(
                    f,
                    "buffer view of accessor {accessor} declares no target, uploading it as {role} data"
                )
            }
        }
    }
}

/// Device objects owned by one model. Released on drop.
pub(crate) struct DeviceResources {
    device: Rc<dyn Device>,
    /// Indexed by accessor.
    pub buffers: Vec<Option<BufferHandle>>,
    /// Indexed by texture.
    pub textures: Vec<TextureHandle>,
    pub vertex_arrays: Vec<VertexArrayHandle>,
}

impl DeviceResources {
    fn new(device: Rc<dyn Device>) -> DeviceResources {
        DeviceResources {
            device,
            buffers: Vec::new(),
            textures: Vec::new(),
            vertex_arrays: Vec::new(),
        }
    }
}

impl Drop for DeviceResources {
    fn drop(&mut self) {
        for &vertex_array in &self.vertex_arrays {
            self.device.delete_vertex_array(vertex_array);
        }
        for &texture in &self.textures {
            self.device.delete_texture(texture);
        }
        for &buffer in self.buffers.iter().flatten() {
            self.device.delete_buffer(buffer);
        }
    }
}

/// Joints of a skin and their inverse bind matrices.
#[derive(Clone, Debug, PartialEq)]
pub struct SkinData {
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// A scene with all of its device resources. Instances share models through
/// `Rc`; the resources go away with the last reference.
pub struct Model {
    scene: Scene,
    meshes: Vec<Vec<PrimitiveBinding>>,
    clips: Vec<Clip>,
    skins: Vec<SkinData>,
    parents: Vec<Option<usize>>,
    diagnostics: Vec<Diagnostic>,
    resources: DeviceResources,
}

impl Model {
    pub(crate) fn build(
        device: &Rc<dyn Device>,
        programs: &mut ProgramCache,
        shaders: &ShaderPair,
        mut scene: Scene,
        options: &BuildOptions,
    ) -> Result<Model, Error> {
        validate(&scene)?;
        let parents = node_parents(&scene)?;
        let skins = read_skins(&scene)?;
        let clips = (0..scene.animations.len())
            .map(|index| Clip::from_scene(&scene, index))
            .collect::<Result<Vec<_>, _>>()?;

        let (roles, diagnostics) = upload::buffer_roles(&scene);
        let mut resources = DeviceResources::new(device.clone());
        resources.buffers = upload::upload_accessors(device.as_ref(), &scene, &roles)?;
        resources.textures = upload::upload_textures(device.as_ref(), &scene)?;
        let meshes = binder::bind_meshes(
            device,
            programs,
            shaders,
            &options.defines,
            &scene,
            &mut resources,
        )?;

        log::info!(
            "built model: {} buffers, {} textures, {} primitives, {} animations, {} programs cached",
            resources.buffers.iter().flatten().count(),
            resources.textures.len(),
            resources.vertex_arrays.len(),
            clips.len(),
            programs.len(),
        );
        if options.clear_cache {
            scene.release_data();
        }

        Ok(Model {
            scene,
            meshes,
            clips,
            skins,
            parents,
            diagnostics,
            resources,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The bindings of a mesh's primitives, in primitive order.
    pub fn primitives(&self, mesh: usize) -> &[PrimitiveBinding] {
        self.meshes.get(mesh).map_or(&[], Vec::as_slice)
    }

    pub fn primitive_count(&self) -> usize {
        self.meshes.iter().map(Vec::len).sum()
    }

    pub fn animations(&self) -> &[Clip] {
        &self.clips
    }

    pub fn animation(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    pub fn skins(&self) -> &[SkinData] {
        &self.skins
    }

    pub fn parent(&self, node: usize) -> Option<usize> {
        self.parents.get(node).copied().flatten()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The device buffer holding accessor `accessor`'s data.
    pub fn buffer(&self, accessor: usize) -> Option<BufferHandle> {
        self.resources.buffers.get(accessor).copied().flatten()
    }

    pub fn texture(&self, texture: usize) -> Option<TextureHandle> {
        self.resources.textures.get(texture).copied()
    }

    pub(crate) fn device(&self) -> &Rc<dyn Device> {
        &self.resources.device
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("meshes", &self.meshes.len())
            .field("primitives", &self.primitive_count())
            .field("animations", &self.clips.len())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

fn dangling(kind: &'static str, index: usize) -> ConfigurationError {
    ConfigurationError::DanglingIndex { kind, index }
}

/// Geometry accessors must exist, be in bounds and have data.
fn check_geometry(scene: &Scene, accessor: usize) -> Result<(), ConfigurationError> {
    match scene.accessor_bytes(accessor)? {
        Some(_) => Ok(()),
        None => Err(ConfigurationError::MissingAccessorData { accessor }),
    }
}

fn validate(scene: &Scene) -> Result<(), ConfigurationError> {
    for (mesh_index, mesh) in scene.meshes.iter().enumerate() {
        let morph_targets = morph_target_count(mesh);
        if morph_targets > MAX_MORPH_TARGETS {
            return Err(ConfigurationError::TooManyMorphTargets {
                mesh: mesh_index,
                count: morph_targets,
                max: MAX_MORPH_TARGETS,
            });
        }
        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            if !primitive.attributes.contains_key(&Semantic::Position) {
                return Err(ConfigurationError::MissingPosition {
                    mesh: mesh_index,
                    primitive: primitive_index,
                });
            }
            for (&semantic, &accessor) in &primitive.attributes {
                check_geometry(scene, accessor)?;
                let component_type = scene.accessors[accessor].component_type;
                if semantic == Semantic::Joints0
                    && !matches!(component_type, ComponentType::U8 | ComponentType::U16)
                {
                    return Err(ConfigurationError::UnexpectedAccessorType { accessor });
                }
            }
            for target in &primitive.targets {
                for accessor in [target.position, target.normal, target.tangent]
                    .into_iter()
                    .flatten()
                {
                    check_geometry(scene, accessor)?;
                }
            }
            if let Some(indices) = primitive.indices {
                check_geometry(scene, indices)?;
                let accessor = &scene.accessors[indices];
                let unsigned = matches!(
                    accessor.component_type,
                    ComponentType::U8 | ComponentType::U16 | ComponentType::U32
                );
                if !unsigned || accessor.accessor_type != AccessorType::Scalar {
                    return Err(ConfigurationError::UnexpectedAccessorType { accessor: indices });
                }
            }
            if let Some(material) = primitive.material {
                if material >= scene.materials.len() {
                    return Err(dangling("material", material));
                }
            }
        }
    }

    for material in &scene.materials {
        for texture in material.textures() {
            if texture.texture >= scene.textures.len() {
                return Err(dangling("texture", texture.texture));
            }
        }
    }
    for texture in &scene.textures {
        if texture.source >= scene.images.len() {
            return Err(dangling("image", texture.source));
        }
        if let Some(sampler) = texture.sampler.filter(|&s| s >= scene.samplers.len()) {
            return Err(dangling("sampler", sampler));
        }
    }
    for node in &scene.nodes {
        if let Some(mesh) = node.mesh.filter(|&m| m >= scene.meshes.len()) {
            return Err(dangling("mesh", mesh));
        }
        if let Some(skin) = node.skin.filter(|&s| s >= scene.skins.len()) {
            return Err(dangling("skin", skin));
        }
    }
    for root in &scene.roots {
        if let Some(&node) = root.nodes.iter().find(|&&n| n >= scene.nodes.len()) {
            return Err(dangling("node", node));
        }
    }
    if let Some(root) = scene.default_root.filter(|&r| r >= scene.roots.len()) {
        return Err(ConfigurationError::UnknownScene(root));
    }
    Ok(())
}

/// Each node's parent. Fails unless the hierarchy is a forest.
fn node_parents(scene: &Scene) -> Result<Vec<Option<usize>>, ConfigurationError> {
    let count = scene.nodes.len();
    let mut parents = vec![None; count];
    for (parent, node) in scene.nodes.iter().enumerate() {
        for &child in &node.children {
            if child >= count {
                return Err(dangling("node", child));
            }
            if child == parent || parents[child].is_some() {
                return Err(ConfigurationError::InvalidNodeHierarchy { node: child });
            }
            parents[child] = Some(parent);
        }
    }
    // With single parents, a cycle is a chain that never reaches a root.
    for start in 0..count {
        let mut node = start;
        let mut depth = 0;
        while let Some(parent) = parents[node] {
            node = parent;
            depth += 1;
            if depth > count {
                return Err(ConfigurationError::InvalidNodeHierarchy { node: start });
            }
        }
    }
    // Scene roots must be parentless and listed once.
    for root in &scene.roots {
        let mut listed = vec![false; count];
        for &node in &root.nodes {
            if parents[node].is_some() || listed[node] {
                return Err(ConfigurationError::InvalidNodeHierarchy { node });
            }
            listed[node] = true;
        }
    }
    Ok(parents)
}

fn read_skins(scene: &Scene) -> Result<Vec<SkinData>, ConfigurationError> {
    scene
        .skins
        .iter()
        .enumerate()
        .map(|(index, skin)| {
            if skin.joints.len() > MAX_JOINTS {
                return Err(ConfigurationError::TooManyJoints {
                    skin: index,
                    count: skin.joints.len(),
                    max: MAX_JOINTS,
                });
            }
            if let Some(&joint) = skin.joints.iter().find(|&&j| j >= scene.nodes.len()) {
                return Err(dangling("node", joint));
            }
            let inverse_bind_matrices = match skin.inverse_bind_matrices {
                Some(accessor) => {
                    let matrices = scene.read_mat4(accessor)?;
                    if matrices.len() < skin.joints.len() {
                        return Err(ConfigurationError::UnexpectedAccessorType { accessor });
                    }
                    matrices
                }
                None => vec![Mat4::IDENTITY; skin.joints.len()],
            };
            Ok(SkinData {
                joints: skin.joints.clone(),
                inverse_bind_matrices,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Node, SceneRoot};

    fn nodes(children: &[&[usize]]) -> Scene {
        Scene {
            nodes: children
                .iter()
                .map(|children| Node {
                    children: children.to_vec(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn forest_parents() {
        let scene = nodes(&[&[1, 2], &[], &[3], &[]]);
        assert_eq!(
            node_parents(&scene).unwrap(),
            vec![None, Some(0), Some(0), Some(2)]
        );
    }

    #[test]
    fn shared_child_is_rejected() {
        let scene = nodes(&[&[2], &[2], &[]]);
        assert_eq!(
            node_parents(&scene),
            Err(ConfigurationError::InvalidNodeHierarchy { node: 2 })
        );
    }

    #[test]
    fn scene_roots_must_be_distinct_top_level_nodes() {
        let mut scene = nodes(&[&[1], &[], &[]]);
        scene.roots.push(SceneRoot {
            name: None,
            nodes: vec![0, 1],
        });
        assert_eq!(
            node_parents(&scene),
            Err(ConfigurationError::InvalidNodeHierarchy { node: 1 })
        );

        scene.roots[0].nodes = vec![0, 2, 0];
        assert_eq!(
            node_parents(&scene),
            Err(ConfigurationError::InvalidNodeHierarchy { node: 0 })
        );

        scene.roots[0].nodes = vec![2, 0];
        assert!(node_parents(&scene).is_ok());
    }

    #[test]
    fn cycle_is_rejected() {
        let scene = nodes(&[&[1], &[2], &[0]]);
        assert!(matches!(
            node_parents(&scene),
            Err(ConfigurationError::InvalidNodeHierarchy { .. })
        ));
    }

    #[test]
    fn skins_without_matrices_use_identity() {
        let mut scene = nodes(&[&[], &[]]);
        scene.skins.push(crate::scene::Skin {
            joints: vec![0, 1],
            inverse_bind_matrices: None,
        });
        let skins = read_skins(&scene).unwrap();
        assert_eq!(skins[0].inverse_bind_matrices, vec![Mat4::IDENTITY; 2]);
    }

    #[test]
    fn oversized_skin_is_rejected() {
        let mut scene = nodes(&[&[]]);
        scene.skins.push(crate::scene::Skin {
            joints: vec![0; MAX_JOINTS + 1],
            inverse_bind_matrices: None,
        });
        assert_eq!(
            read_skins(&scene),
            Err(ConfigurationError::TooManyJoints {
                skin: 0,
                count: MAX_JOINTS + 1,
                max: MAX_JOINTS,
            })
        );
    }
}
