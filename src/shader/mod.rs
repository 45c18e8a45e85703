//! Shader sources, variant flags and the compiled program cache.

use std::fmt::{self, Display};
use std::rc::Rc;

use crate::error::ConfigurationError;

mod builtin;
mod defines;
mod program;

pub use builtin::{STANDARD_FRAGMENT_SHADER, STANDARD_VERTEX_SHADER};
pub use defines::{Define, DefineSet};
pub use program::{inject_defines, Program, ProgramCache};
pub(crate) use program::MATERIAL_SAMPLERS;

/// The vertex attribute location of the POSITION attribute.
pub const ATTR_LOC_POSITION: u32 = 0;
/// The vertex attribute location of the NORMAL attribute.
pub const ATTR_LOC_NORMAL: u32 = 1;
/// The vertex attribute location of the TANGENT attribute.
pub const ATTR_LOC_TANGENT: u32 = 2;
/// The vertex attribute location of the TEXCOORD_0 attribute.
pub const ATTR_LOC_TEXCOORD_0: u32 = 3;
/// The vertex attribute location of the TEXCOORD_1 attribute.
pub const ATTR_LOC_TEXCOORD_1: u32 = 4;
/// The vertex attribute location of the JOINTS_0 attribute.
pub const ATTR_LOC_JOINTS_0: u32 = 5;
/// The vertex attribute location of the WEIGHTS_0 attribute.
pub const ATTR_LOC_WEIGHTS_0: u32 = 6;
/// Morph target `i`'s POSITION goes to `ATTR_LOC_MORPH_POSITION + i`.
pub const ATTR_LOC_MORPH_POSITION: u32 = 7;
/// Morph target `i`'s NORMAL goes to `ATTR_LOC_MORPH_NORMAL + i`.
pub const ATTR_LOC_MORPH_NORMAL: u32 = ATTR_LOC_MORPH_POSITION + MAX_MORPH_TARGETS as u32;
/// Morph target `i`'s TANGENT goes to `ATTR_LOC_MORPH_TANGENT + i`.
pub const ATTR_LOC_MORPH_TANGENT: u32 = ATTR_LOC_MORPH_NORMAL + MAX_MORPH_TARGETS as u32;

/// Morph targets per primitive. Three of each kind fill the 16 attribute
/// locations GLES 3.0 guarantees.
pub const MAX_MORPH_TARGETS: usize = 3;
/// Length of the `jointMatrices` uniform array.
pub const MAX_JOINTS: usize = 64;

pub const TEXTURE_UNIT_BASE_COLOR: u32 = 0;
pub const TEXTURE_UNIT_METALLIC_ROUGHNESS: u32 = 1;
pub const TEXTURE_UNIT_NORMAL: u32 = 2;
pub const TEXTURE_UNIT_OCCLUSION: u32 = 3;
pub const TEXTURE_UNIT_EMISSIVE: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Shader source text for one stage. Two shaders are the same shader when
/// their stage and text match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shader {
    stage: ShaderStage,
    source: Rc<str>,
}

impl Shader {
    pub fn vertex(source: impl Into<Rc<str>>) -> Shader {
        Shader {
            stage: ShaderStage::Vertex,
            source: source.into(),
        }
    }

    pub fn fragment(source: impl Into<Rc<str>>) -> Shader {
        Shader {
            stage: ShaderStage::Fragment,
            source: source.into(),
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn shared_source(&self) -> Rc<str> {
        self.source.clone()
    }
}

/// The vertex and fragment shader a model build compiles its variants from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderPair {
    vertex: Shader,
    fragment: Shader,
}

impl ShaderPair {
    pub fn new(vertex: Shader, fragment: Shader) -> Result<ShaderPair, ConfigurationError> {
        for (shader, expected) in [
            (&vertex, ShaderStage::Vertex),
            (&fragment, ShaderStage::Fragment),
        ] {
            if shader.stage != expected {
                return Err(ConfigurationError::WrongShaderStage {
                    expected,
                    found: shader.stage,
                });
            }
        }
        Ok(ShaderPair { vertex, fragment })
    }

    /// The built-in skinning/morphing vertex shader and metallic-roughness
    /// fragment shader.
    pub fn builtin() -> ShaderPair {
        ShaderPair {
            vertex: Shader::vertex(STANDARD_VERTEX_SHADER),
            fragment: Shader::fragment(STANDARD_FRAGMENT_SHADER),
        }
    }

    /// Replaces each stage that has an override; the last override of a
    /// stage wins, stages without one keep this pair's shader.
    pub fn with_overrides(&self, overrides: &[Shader]) -> ShaderPair {
        let mut resolved = self.clone();
        for shader in overrides {
            match shader.stage {
                ShaderStage::Vertex => resolved.vertex = shader.clone(),
                ShaderStage::Fragment => resolved.fragment = shader.clone(),
            }
        }
        resolved
    }

    pub fn vertex(&self) -> &Shader {
        &self.vertex
    }

    pub fn fragment(&self) -> &Shader {
        &self.fragment
    }
}
