use std::collections::HashMap;
use std::rc::Rc;

use crate::device::{Device, ProgramHandle, Uniform, UniformLocation};
use crate::error::CompileError;
use crate::shader::{
    DefineSet, Shader, TEXTURE_UNIT_BASE_COLOR, TEXTURE_UNIT_EMISSIVE,
    TEXTURE_UNIT_METALLIC_ROUGHNESS, TEXTURE_UNIT_NORMAL, TEXTURE_UNIT_OCCLUSION,
};

/// Sampler uniform and texture unit of each material texture, in the order of
/// [`crate::scene::Material`]'s texture fields.
pub(crate) const MATERIAL_SAMPLERS: [(&str, &str, u32); 5] = [
    ("baseColorSampler", "baseColorUvSet", TEXTURE_UNIT_BASE_COLOR),
    (
        "metallicRoughnessSampler",
        "metallicRoughnessUvSet",
        TEXTURE_UNIT_METALLIC_ROUGHNESS,
    ),
    ("normalSampler", "normalUvSet", TEXTURE_UNIT_NORMAL),
    ("occlusionSampler", "occlusionUvSet", TEXTURE_UNIT_OCCLUSION),
    ("emissiveSampler", "emissiveUvSet", TEXTURE_UNIT_EMISSIVE),
];

/// Locations of the uniforms the renderer writes. Uniforms a variant does not
/// declare (or the driver optimized out) are `None` and skipped.
#[derive(Clone, Debug, Default)]
pub(crate) struct UniformLocations {
    pub proj_view_matrix: Option<UniformLocation>,
    pub model_matrix: Option<UniformLocation>,
    pub normal_matrix: Option<UniformLocation>,
    pub joint_matrices: Option<UniformLocation>,
    pub joint_count: Option<UniformLocation>,
    pub morph_weights: Option<UniformLocation>,
    pub base_color_factor: Option<UniformLocation>,
    pub metallic_roughness_values: Option<UniformLocation>,
    pub emissive_factor: Option<UniformLocation>,
    pub normal_scale: Option<UniformLocation>,
    pub occlusion_strength: Option<UniformLocation>,
    pub light_direction: Option<UniformLocation>,
    pub light_color: Option<UniformLocation>,
    pub camera_position: Option<UniformLocation>,
    pub uv_sets: [Option<UniformLocation>; 5],
}

impl UniformLocations {
    fn query(device: &dyn Device, program: ProgramHandle) -> UniformLocations {
        let get = |name: &str| device.uniform_location(program, name);
        UniformLocations {
            proj_view_matrix: get("projViewMatrix"),
            model_matrix: get("modelMatrix"),
            normal_matrix: get("normalMatrix"),
            joint_matrices: get("jointMatrices"),
            joint_count: get("jointCount"),
            morph_weights: get("morphWeights"),
            base_color_factor: get("baseColorFactor"),
            metallic_roughness_values: get("metallicRoughnessValues"),
            emissive_factor: get("emissiveFactor"),
            normal_scale: get("normalScale"),
            occlusion_strength: get("occlusionStrength"),
            light_direction: get("lightDirection"),
            light_color: get("lightColor"),
            camera_position: get("cameraPosition"),
            uv_sets: MATERIAL_SAMPLERS.map(|(_, uv_set, _)| get(uv_set)),
        }
    }
}

/// A linked program variant. Deleted from the device when the last reference
/// (the cache's or a primitive's) goes away.
pub struct Program {
    device: Rc<dyn Device>,
    handle: ProgramHandle,
    defines: DefineSet,
    pub(crate) uniforms: UniformLocations,
}

impl Program {
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn defines(&self) -> &DefineSet {
        &self.defines
    }

    /// Writes `value` if the variant has `location`. The program must be bound.
    pub(crate) fn set(&self, location: Option<UniformLocation>, value: Uniform<'_>) {
        if let Some(location) = location {
            self.device.set_uniform(location, value);
        }
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.device.delete_program(self.handle);
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("handle", &self.handle)
            .field("defines", &self.defines)
            .finish()
    }
}

/// Inserts `defines` right after the `#version` directive (which must stay
/// the first line), or at the very top when there is none.
pub fn inject_defines(source: &str, defines: &DefineSet) -> String {
    let block = defines.to_source();
    let body = source.trim_start();
    if !body.starts_with("#version") {
        return format!("{block}{source}");
    }
    let version_end = source.len() - body.len() + body.find('\n').map_or(body.len(), |i| i + 1);
    let mut injected = String::with_capacity(source.len() + block.len() + 1);
    injected.push_str(&source[..version_end]);
    if !injected.ends_with('\n') {
        injected.push('\n');
    }
    injected.push_str(&block);
    injected.push_str(&source[version_end..]);
    injected
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct ProgramKey {
    vertex: Rc<str>,
    fragment: Rc<str>,
    defines: DefineSet,
}

/// Compiled programs keyed by (vertex source, fragment source, define set).
///
/// Entries live as long as the cache. Building takes `&mut self`, so lookups
/// and insertions can never interleave; a cache shared between threads would
/// need a lock around `build` to keep that property.
#[derive(Default)]
pub struct ProgramCache {
    programs: HashMap<ProgramKey, Rc<Program>>,
}

impl ProgramCache {
    pub fn new() -> ProgramCache {
        ProgramCache::default()
    }

    /// Returns the cached program for this combination, compiling and linking
    /// it first if needed.
    pub fn build(
        &mut self,
        device: &Rc<dyn Device>,
        vertex: &Shader,
        fragment: &Shader,
        defines: &DefineSet,
    ) -> Result<Rc<Program>, CompileError> {
        let key = ProgramKey {
            vertex: vertex.shared_source(),
            fragment: fragment.shared_source(),
            defines: defines.clone(),
        };
        if let Some(program) = self.programs.get(&key) {
            return Ok(program.clone());
        }

        log::debug!("compiling program variant {defines}");
        let vertex_source = inject_defines(vertex.source(), defines);
        let fragment_source = inject_defines(fragment.source(), defines);
        let handle = device
            .create_program(&vertex_source, &fragment_source)
            .map_err(|err| CompileError {
                stage: err.stage,
                defines: defines.clone(),
                log: err.log,
            })?;

        let uniforms = UniformLocations::query(device.as_ref(), handle);
        device.use_program(handle);
        for (sampler, _, unit) in MATERIAL_SAMPLERS {
            if let Some(location) = device.uniform_location(handle, sampler) {
                device.set_uniform(location, Uniform::Int(unit as i32));
            }
        }

        let program = Rc::new(Program {
            device: device.clone(),
            handle,
            defines: defines.clone(),
            uniforms,
        });
        self.programs.insert(key, program.clone());
        Ok(program)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CompileStage, HeadlessDevice};
    use crate::shader::Define;

    fn device() -> (Rc<HeadlessDevice>, Rc<dyn Device>) {
        let headless = Rc::new(HeadlessDevice::new());
        let device: Rc<dyn Device> = headless.clone();
        (headless, device)
    }

    #[test]
    fn defines_follow_the_version_line() {
        let defines = DefineSet::from_iter([Define::HasNormal]);
        assert_eq!(
            inject_defines("#version 300 es\nvoid main() {}\n", &defines),
            "#version 300 es\n#define HAS_NORMAL\nvoid main() {}\n"
        );
        assert_eq!(
            inject_defines("\n#version 300 es", &defines),
            "\n#version 300 es\n#define HAS_NORMAL\n"
        );
        assert_eq!(
            inject_defines("void main() {}", &defines),
            "#define HAS_NORMAL\nvoid main() {}"
        );
    }

    #[test]
    fn same_key_compiles_once() {
        let (headless, device) = device();
        let mut cache = ProgramCache::new();
        let vs = Shader::vertex("#version 300 es\n");
        let fs = Shader::fragment("#version 300 es\n");
        let a = DefineSet::from_iter([Define::HasNormal, Define::HasTangent]);
        let b = DefineSet::from_iter([Define::HasTangent, Define::HasNormal]);

        let first = cache.build(&device, &vs, &fs, &a).unwrap();
        let second = cache.build(&device, &vs, &fs, &b).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(headless.program_links(), 1);

        let other = cache.build(&device, &vs, &fs, &DefineSet::new()).unwrap();
        assert!(!Rc::ptr_eq(&first, &other));
        assert_eq!(cache.len(), 2);

        let (vertex_source, _) = headless.program_sources(first.handle()).unwrap();
        assert!(vertex_source.contains("#define HAS_NORMAL\n"));
    }

    #[test]
    fn equal_sources_share_programs() {
        let (headless, device) = device();
        let mut cache = ProgramCache::new();
        let defines = DefineSet::new();
        let a = cache
            .build(&device, &Shader::vertex("vs"), &Shader::fragment("fs"), &defines)
            .unwrap();
        let b = cache
            .build(
                &device,
                &Shader::vertex(String::from("vs")),
                &Shader::fragment(String::from("fs")),
                &defines,
            )
            .unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(headless.program_links(), 1);
    }

    #[test]
    fn failure_reports_stage_and_defines() {
        let (headless, device) = device();
        headless.fail_compilation(Some(CompileStage::Fragment));
        let mut cache = ProgramCache::new();
        let defines = DefineSet::from_iter([Define::HasOcclusionTexture]);
        let err = cache
            .build(&device, &Shader::vertex("vs"), &Shader::fragment("fs"), &defines)
            .unwrap_err();
        assert_eq!(err.stage, CompileStage::Fragment);
        assert_eq!(err.defines, defines);
        assert!(err.to_string().contains("HAS_OCCLUSION_TEXTURE"));
        assert!(cache.is_empty());
    }

    #[test]
    fn programs_are_deleted_with_the_last_reference() {
        let (headless, device) = device();
        let mut cache = ProgramCache::new();
        let program = cache
            .build(&device, &Shader::vertex("vs"), &Shader::fragment("fs"), &DefineSet::new())
            .unwrap();
        drop(cache);
        assert_eq!(headless.live_programs(), 1);
        drop(program);
        assert_eq!(headless.live_programs(), 0);
    }
}
