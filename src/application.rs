use std::rc::Rc;

use crate::device::Device;
use crate::error::{ConfigurationError, Error};
use crate::instance::Instance;
use crate::model::{BuildOptions, Model};
use crate::scene::Scene;
use crate::shader::{ProgramCache, Shader, ShaderPair};
use crate::view::{Camera, FrameUniforms, Lighting};

/// Handle of an instance spawned by an [`Application`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId(usize);

/// Owns the device connection, the program cache shared by every model it
/// builds, the default shaders and the live instances.
pub struct Application {
    device: Rc<dyn Device>,
    programs: ProgramCache,
    shaders: ShaderPair,
    pub camera: Camera,
    pub lighting: Lighting,
    instances: Vec<Option<Instance>>,
}

impl Application {
    pub fn new(
        device: Rc<dyn Device>,
        vertex: Shader,
        fragment: Shader,
    ) -> Result<Application, ConfigurationError> {
        Ok(Application::with_shaders(
            device,
            ShaderPair::new(vertex, fragment)?,
        ))
    }

    /// An application drawing with the built-in shaders.
    pub fn with_builtin_shaders(device: Rc<dyn Device>) -> Application {
        Application::with_shaders(device, ShaderPair::builtin())
    }

    fn with_shaders(device: Rc<dyn Device>, shaders: ShaderPair) -> Application {
        Application {
            device,
            programs: ProgramCache::new(),
            shaders,
            camera: Camera::default(),
            lighting: Lighting::default(),
            instances: Vec::new(),
        }
    }

    pub fn device(&self) -> &Rc<dyn Device> {
        &self.device
    }

    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    pub fn shaders(&self) -> &ShaderPair {
        &self.shaders
    }

    /// Uploads `scene` and binds all of its primitives. Nothing the build
    /// allocated survives a failure, except programs, which belong to the
    /// application's cache.
    pub fn build_model(&mut self, scene: Scene, options: &BuildOptions) -> Result<Rc<Model>, Error> {
        let shaders = self.shaders.with_overrides(&options.shaders);
        let model = Model::build(&self.device, &mut self.programs, &shaders, scene, options)?;
        for diagnostic in model.diagnostics() {
            log::debug!("{diagnostic}");
        }
        Ok(Rc::new(model))
    }

    /// Adds an instance of `model` showing scene root set `root`.
    pub fn spawn(
        &mut self,
        model: &Rc<Model>,
        root: Option<usize>,
    ) -> Result<InstanceId, ConfigurationError> {
        let instance = Instance::new(model.clone(), root)?;
        let slot = match self.instances.iter().position(Option::is_none) {
            Some(slot) => {
                self.instances[slot] = Some(instance);
                slot
            }
            None => {
                self.instances.push(Some(instance));
                self.instances.len() - 1
            }
        };
        Ok(InstanceId(slot))
    }

    pub fn despawn(&mut self, id: InstanceId) -> Option<Instance> {
        self.instances.get_mut(id.0).and_then(Option::take)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(id.0).and_then(Option::as_ref)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.instances
            .iter()
            .enumerate()
            .filter_map(|(i, instance)| Some((InstanceId(i), instance.as_ref()?)))
    }

    /// Advances every playing instance by `elapsed` seconds.
    pub fn update(&mut self, elapsed: f32) {
        for instance in self.instances.iter_mut().flatten() {
            instance.update(elapsed);
        }
    }

    /// Issues the draws of every live instance.
    pub fn render(&self) {
        let frame = FrameUniforms::new(&self.camera, &self.lighting);
        for instance in self.instances.iter().flatten() {
            instance.render(&frame);
        }
    }
}
