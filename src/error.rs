use std::error::Error as StdError;
use std::fmt::{self, Display};

use crate::device::{CompileStage, DeviceError};
use crate::shader::{DefineSet, ShaderStage};

/// Everything that can abort a model build.
#[derive(Debug)]
pub enum Error {
    Configuration(ConfigurationError),
    Compile(CompileError),
    Resource(ResourceError),
    Decode(DecodeError),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(err) => write!(f, "invalid scene configuration: {err}"),
            Error::Compile(err) => err.fmt(f),
            Error::Resource(err) => err.fmt(f),
            Error::Decode(err) => err.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Configuration(err) => Some(err),
            Error::Compile(err) => Some(err),
            Error::Resource(err) => Some(err),
            Error::Decode(err) => Some(err),
        }
    }
}

impl From<ConfigurationError> for Error {
    fn from(err: ConfigurationError) -> Error {
        Error::Configuration(err)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Error {
        Error::Compile(err)
    }
}

impl From<ResourceError> for Error {
    fn from(err: ResourceError) -> Error {
        Error::Resource(err)
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Error {
        Error::Decode(err)
    }
}

/// The scene (or a request against it) cannot be rendered as described.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    MissingPosition { mesh: usize, primitive: usize },
    MissingAccessorData { accessor: usize },
    AccessorOutOfBounds { accessor: usize },
    UnexpectedAccessorType { accessor: usize },
    DanglingIndex { kind: &'static str, index: usize },
    TooManyMorphTargets { mesh: usize, count: usize, max: usize },
    TooManyJoints { skin: usize, count: usize, max: usize },
    InvalidNodeHierarchy { node: usize },
    WrongShaderStage { expected: ShaderStage, found: ShaderStage },
    MalformedAnimation { animation: usize, channel: usize },
    UnknownAnimation(usize),
    UnknownScene(usize),
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MissingPosition { mesh, primitive } => write!(
                f,
                "primitive {primitive} of mesh {mesh} has no POSITION attribute"
            ),
            ConfigurationError::MissingAccessorData { accessor } => {
                write!(f, "accessor {accessor} has no data")
            }
            ConfigurationError::AccessorOutOfBounds { accessor } => {
                write!(f, "accessor {accessor} reaches outside its buffer view")
            }
            ConfigurationError::UnexpectedAccessorType { accessor } => {
                write!(f, "accessor {accessor} has the wrong type for its use")
            }
            ConfigurationError::DanglingIndex { kind, index } => {
                write!(f, "{kind} {index} does not exist")
            }
            ConfigurationError::TooManyMorphTargets { mesh, count, max } => write!(
                f,
                "mesh {mesh} has {count} morph targets, at most {max} are supported"
            ),
            ConfigurationError::TooManyJoints { skin, count, max } => write!(
                f,
                "skin {skin} has {count} joints, at most {max} are supported"
            ),
            ConfigurationError::InvalidNodeHierarchy { node } => {
                write!(f, "node {node} has several parents, is part of a cycle or is a misplaced scene root")
            }
            ConfigurationError::WrongShaderStage { expected, found } => {
                write!(f, "expected a {expected} shader, got a {found} shader")
            }
            ConfigurationError::MalformedAnimation { animation, channel } => write!(
                f,
                "channel {channel} of animation {animation} has mismatched keyframes"
            ),
            ConfigurationError::UnknownAnimation(index) => {
                write!(f, "animation {index} does not exist")
            }
            ConfigurationError::UnknownScene(index) => write!(f, "scene {index} does not exist"),
        }
    }
}

impl StdError for ConfigurationError {}

/// A program variant failed to compile or link.
#[derive(Clone, Debug)]
pub struct CompileError {
    pub stage: CompileStage,
    pub defines: DefineSet,
    pub log: String,
}

impl Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed with defines {}: {}",
            self.stage,
            self.defines,
            self.log.trim_end()
        )
    }
}

impl StdError for CompileError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Buffer,
    Texture,
    VertexArray,
}

/// The device refused an allocation or upload.
#[derive(Clone, Debug)]
pub struct ResourceError {
    pub kind: ResourceKind,
    /// Scene index of the accessor, texture or mesh being uploaded.
    pub index: usize,
    pub source: DeviceError,
}

impl Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ResourceKind::Buffer => "accessor",
            ResourceKind::Texture => "texture",
            ResourceKind::VertexArray => "mesh",
        };
        write!(f, "uploading {kind} {}: {}", self.index, self.source)
    }
}

impl StdError for ResourceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

/// A texture's image could not be turned into RGBA8 pixels.
#[derive(Debug)]
pub struct DecodeError {
    pub texture: usize,
    pub image: usize,
    pub reason: String,
    pub source: Option<image::ImageError>,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "decoding image {} of texture {}: {}",
            self.image, self.texture, self.reason
        )
    }
}

impl StdError for DecodeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}
