//! Renderable instances of a model and their playback state.

use std::rc::Rc;

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::animation::{Player, Pose};
use crate::device::Uniform;
use crate::error::ConfigurationError;
use crate::model::{morph_target_count, Model};
use crate::scene::Material;
use crate::shader::MATERIAL_SAMPLERS;
use crate::view::FrameUniforms;

/// A placement of a [`Model`] in the world, static or playing one animation.
///
/// Models are shared; everything that changes per frame (the transform, the
/// player and the resulting pose) lives here.
pub struct Instance {
    model: Rc<Model>,
    roots: Vec<usize>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    player: Option<Player>,
    pose: Pose,
}

impl Instance {
    /// An instance showing scene root set `root`, see
    /// [`Scene::root_nodes`](crate::scene::Scene::root_nodes).
    pub fn new(model: Rc<Model>, root: Option<usize>) -> Result<Instance, ConfigurationError> {
        let roots = model.scene().root_nodes(root)?;
        let pose = Pose::rest(model.scene());
        Ok(Instance {
            model,
            roots,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            player: None,
            pose,
        })
    }

    pub fn model(&self) -> &Rc<Model> {
        &self.model
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_some()
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    pub fn player_mut(&mut self) -> Option<&mut Player> {
        self.player.as_mut()
    }

    /// Starts animation `animation` from its beginning, replacing the current
    /// player. `configure` can set looping and speed before the first frame is
    /// posed.
    pub fn new_player(
        &mut self,
        animation: usize,
        configure: impl FnOnce(&mut Player),
    ) -> Result<&mut Player, ConfigurationError> {
        let clip = self
            .model
            .animation(animation)
            .ok_or(ConfigurationError::UnknownAnimation(animation))?;
        let mut player = Player::new(animation, clip.duration());
        configure(&mut player);
        self.pose = Pose::rest(self.model.scene());
        clip.apply(player.time(), &mut self.pose);
        Ok(self.player.insert(player))
    }

    /// Stops playback and returns to the rest pose.
    pub fn stop(&mut self) -> Option<Player> {
        self.pose = Pose::rest(self.model.scene());
        self.player.take()
    }

    /// Advances the player by `elapsed` seconds and poses the model.
    pub fn update(&mut self, elapsed: f32) {
        let Some(player) = self.player.as_mut() else {
            return;
        };
        player.advance(elapsed);
        if let Some(clip) = self.model.animation(player.animation()) {
            clip.apply(player.time(), &mut self.pose);
        }
    }

    /// World matrices of every node in the current pose, with the instance
    /// transform above the scene's roots.
    pub fn world_matrices(&self) -> Vec<Mat4> {
        let count = self.pose.transforms.len();
        let mut world: Vec<Option<Mat4>> = vec![None; count];
        for node in 0..count {
            self.resolve_world(node, &mut world);
        }
        world.into_iter().map(|m| m.unwrap_or(Mat4::IDENTITY)).collect()
    }

    fn resolve_world(&self, node: usize, world: &mut [Option<Mat4>]) -> Mat4 {
        if let Some(matrix) = world[node] {
            return matrix;
        }
        let parent = match self.model.parent(node) {
            Some(parent) => self.resolve_world(parent, world),
            None => self.transform(),
        };
        let matrix = parent * self.pose.transforms[node].to_matrix();
        world[node] = Some(matrix);
        matrix
    }

    /// Joint matrices of `skin` for a mesh drawn at `mesh_world`.
    pub fn joint_matrices(&self, skin: usize, mesh_world: Mat4, world: &[Mat4]) -> Vec<Mat4> {
        let Some(skin) = self.model.skins().get(skin) else {
            return Vec::new();
        };
        let to_mesh = mesh_world.inverse();
        skin.joints
            .iter()
            .zip(&skin.inverse_bind_matrices)
            .map(|(&joint, inverse_bind)| to_mesh * world[joint] * *inverse_bind)
            .collect()
    }

    /// Morph weights of a mesh node: animated, else the node's, else the
    /// mesh's, padded to the mesh's target count.
    pub fn morph_weights(&self, node: usize) -> Vec<f32> {
        let scene = self.model.scene();
        let Some(node_data) = scene.nodes.get(node) else {
            return Vec::new();
        };
        let Some(mesh) = node_data.mesh.and_then(|m| scene.meshes.get(m)) else {
            return Vec::new();
        };
        let mut weights = match &self.pose.weights[node] {
            Some(animated) => animated.clone(),
            None if !node_data.weights.is_empty() => node_data.weights.clone(),
            None => mesh.weights.clone(),
        };
        weights.resize(morph_target_count(mesh), 0.0);
        weights
    }

    /// Draws every primitive of every mesh under the instance's roots.
    pub fn render(&self, frame: &FrameUniforms) {
        let model = &self.model;
        let scene = model.scene();
        let device = model.device();
        let world = self.world_matrices();
        let default_material = Material::default();

        let mut pending = self.roots.iter().rev().copied().collect::<Vec<_>>();
        while let Some(node_index) = pending.pop() {
            let node = &scene.nodes[node_index];
            pending.extend(node.children.iter().rev());
            let Some(mesh) = node.mesh else {
                continue;
            };

            let model_matrix = world[node_index];
            let normal_matrix = Mat3::from_mat4(model_matrix).inverse().transpose();
            let joints = node
                .skin
                .map(|skin| self.joint_matrices(skin, model_matrix, &world))
                .unwrap_or_default();
            let weights = self.morph_weights(node_index);

            for binding in model.primitives(mesh) {
                let program = &binding.program;
                let uniforms = &program.uniforms;
                device.use_program(program.handle());
                program.set(uniforms.proj_view_matrix, Uniform::Mat4(frame.proj_view));
                program.set(uniforms.model_matrix, Uniform::Mat4(model_matrix));
                program.set(uniforms.normal_matrix, Uniform::Mat3(normal_matrix));
                program.set(uniforms.camera_position, Uniform::Vec3(frame.camera_position));
                program.set(uniforms.light_direction, Uniform::Vec3(frame.light_direction));
                program.set(uniforms.light_color, Uniform::Vec3(frame.light_color));
                program.set(uniforms.joint_count, Uniform::Int(joints.len() as i32));
                if !joints.is_empty() {
                    program.set(uniforms.joint_matrices, Uniform::Mat4Array(&joints));
                }
                if !weights.is_empty() {
                    program.set(uniforms.morph_weights, Uniform::FloatArray(&weights));
                }

                let material = binding
                    .material
                    .and_then(|material| scene.materials.get(material))
                    .unwrap_or(&default_material);
                program.set(
                    uniforms.base_color_factor,
                    Uniform::Vec4(material.base_color_factor.into()),
                );
                program.set(
                    uniforms.metallic_roughness_values,
                    Uniform::Vec2([material.metallic_factor, material.roughness_factor]),
                );
                program.set(
                    uniforms.emissive_factor,
                    Uniform::Vec3(material.emissive_factor.into()),
                );
                program.set(uniforms.normal_scale, Uniform::Float(material.normal_scale));
                program.set(
                    uniforms.occlusion_strength,
                    Uniform::Float(material.occlusion_strength),
                );
                let textures = [
                    material.base_color_texture,
                    material.metallic_roughness_texture,
                    material.normal_texture,
                    material.occlusion_texture,
                    material.emissive_texture,
                ];
                for (i, texture) in textures.into_iter().enumerate() {
                    let Some(texture) = texture else {
                        continue;
                    };
                    if let Some(handle) = model.texture(texture.texture) {
                        device.bind_texture(MATERIAL_SAMPLERS[i].2, handle);
                        program.set(uniforms.uv_sets[i], Uniform::Int(texture.tex_coord as i32));
                    }
                }

                device.draw(binding.vertex_array, &binding.draw);
            }
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("roots", &self.roots)
            .field("translation", &self.translation)
            .field("rotation", &self.rotation)
            .field("scale", &self.scale)
            .field("player", &self.player)
            .finish()
    }
}
