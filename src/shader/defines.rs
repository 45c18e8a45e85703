use std::borrow::Cow;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

/// A preprocessor flag injected into shader sources to select a program
/// variant.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Define {
    HasNormal,
    HasTangent,
    HasTexCoord0,
    HasTexCoord1,
    HasJoints0,
    HasWeights0,
    HasMorphPosition,
    HasMorphNormal,
    HasMorphTangent,
    HasBaseColorTexture,
    HasMetallicRoughnessTexture,
    HasNormalTexture,
    HasOcclusionTexture,
    HasEmissiveTexture,
    MorphTargetCount(usize),
    MaxJoints(usize),
    /// Anything else, written verbatim after `#define `, e.g. `"USE_IBL"` or
    /// `"LIGHT_COUNT 4"`.
    Custom(Cow<'static, str>),
}

impl Define {
    pub fn custom(text: impl Into<Cow<'static, str>>) -> Define {
        Define::Custom(text.into())
    }

    /// The macro name as seen by the shader preprocessor.
    pub fn name(&self) -> &str {
        match self {
            Define::HasNormal => "HAS_NORMAL",
            Define::HasTangent => "HAS_TANGENT",
            Define::HasTexCoord0 => "HAS_TEXCOORD_0",
            Define::HasTexCoord1 => "HAS_TEXCOORD_1",
            Define::HasJoints0 => "HAS_JOINTS_0",
            Define::HasWeights0 => "HAS_WEIGHTS_0",
            Define::HasMorphPosition => "HAS_MORPH_POSITION",
            Define::HasMorphNormal => "HAS_MORPH_NORMAL",
            Define::HasMorphTangent => "HAS_MORPH_TANGENT",
            Define::HasBaseColorTexture => "HAS_BASE_COLOR_TEXTURE",
            Define::HasMetallicRoughnessTexture => "HAS_METALLIC_ROUGHNESS_TEXTURE",
            Define::HasNormalTexture => "HAS_NORMAL_TEXTURE",
            Define::HasOcclusionTexture => "HAS_OCCLUSION_TEXTURE",
            Define::HasEmissiveTexture => "HAS_EMISSIVE_TEXTURE",
            Define::MorphTargetCount(_) => "MORPH_TARGET_COUNT",
            Define::MaxJoints(_) => "MAX_JOINTS",
            Define::Custom(text) => text.split_whitespace().next().unwrap_or(""),
        }
    }
}

impl Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Define::MorphTargetCount(n) | Define::MaxJoints(n) => {
                write!(f, "#define {} {n}", self.name())
            }
            Define::Custom(text) => write!(f, "#define {text}"),
            _ => write!(f, "#define {}", self.name()),
        }
    }
}

/// An insertion-ordered, deduplicated set of [`Define`]s.
///
/// Equality and hashing ignore insertion order, so two sets built from the same
/// flags in different orders select the same cached program.
#[derive(Clone, Debug, Default)]
pub struct DefineSet {
    defines: Vec<Define>,
}

impl DefineSet {
    pub fn new() -> DefineSet {
        DefineSet::default()
    }

    /// Adds every define not already present. Adding twice is a no-op.
    pub fn add(&mut self, defines: impl IntoIterator<Item = Define>) {
        for define in defines {
            if !self.defines.contains(&define) {
                self.defines.push(define);
            }
        }
    }

    pub fn insert(&mut self, define: Define) {
        self.add([define]);
    }

    /// True iff every given define is present.
    pub fn contains<'a>(&self, defines: impl IntoIterator<Item = &'a Define>) -> bool {
        defines
            .into_iter()
            .all(|define| self.defines.contains(define))
    }

    /// True iff `available` provides every define this set requires, i.e.
    /// `available` is a superset of `self`.
    pub fn is_satisfied_by(&self, available: &DefineSet) -> bool {
        available.contains(&self.defines)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Define> {
        self.defines.iter()
    }

    pub fn len(&self) -> usize {
        self.defines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    /// The defines in insertion order, one `#define` per line.
    pub fn to_source(&self) -> String {
        let mut source = String::new();
        for define in &self.defines {
            source.push_str(&define.to_string());
            source.push('\n');
        }
        source
    }

    fn sorted(&self) -> Vec<&Define> {
        let mut sorted = self.defines.iter().collect::<Vec<_>>();
        sorted.sort();
        sorted
    }
}

impl PartialEq for DefineSet {
    fn eq(&self, other: &DefineSet) -> bool {
        self.len() == other.len() && self.contains(&other.defines)
    }
}

impl Eq for DefineSet {}

impl Hash for DefineSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sorted().hash(state);
    }
}

impl FromIterator<Define> for DefineSet {
    fn from_iter<I: IntoIterator<Item = Define>>(iter: I) -> DefineSet {
        let mut set = DefineSet::new();
        set.add(iter);
        set
    }
}

impl Display for DefineSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, define) in self.defines.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match define {
                Define::MorphTargetCount(n) | Define::MaxJoints(n) => {
                    write!(f, "{}={n}", define.name())?
                }
                Define::Custom(text) => write!(f, "{text}")?,
                _ => write!(f, "{}", define.name())?,
            }
        }
        write!(f, "]")
    }
}
