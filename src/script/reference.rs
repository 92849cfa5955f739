/// Script references and their canonical string encoding
///
/// A script is identified by the package directory it lives in plus its bare
/// name. Everywhere scripts are indexed (graph lookups, cache key dependency
/// maps, external stores) the pair is encoded into a single
/// `ScriptReferenceString`. The encoding is a JSON array `[packageDir, name]`,
/// which escapes both components so distinct pairs never collide.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error returned when decoding a string that `encode` did not produce
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid script reference string: {input:?}")]
pub struct DecodingError {
    pub input: String,
}

/// Error returned when building a reference from invalid parts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("package directory must be absolute: {}", .0.display())]
    RelativePackageDir(PathBuf),

    #[error("package directory is not valid UTF-8: {}", .0.display())]
    NonUtf8PackageDir(PathBuf),

    #[error("script name must not be empty")]
    EmptyName,

    #[error("script name must be a bare name without path or variable syntax: {0:?}")]
    InvalidName(String),
}

/// Characters that would make a name read as a path or a variable
const RESERVED_NAME_CHARS: [char; 3] = ['/', '\\', '$'];

/// Identifies a package root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageReference {
    package_dir: String,
}

impl PackageReference {
    pub fn new(package_dir: impl Into<PathBuf>) -> Result<Self, ReferenceError> {
        let package_dir = package_dir.into();
        if !package_dir.is_absolute() {
            return Err(ReferenceError::RelativePackageDir(package_dir));
        }
        let package_dir = package_dir
            .into_os_string()
            .into_string()
            .map_err(|raw| ReferenceError::NonUtf8PackageDir(PathBuf::from(raw)))?;
        Ok(Self { package_dir })
    }

    pub fn package_dir(&self) -> &Path {
        Path::new(&self.package_dir)
    }
}

/// Uniquely identifies one script
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptReference {
    package: PackageReference,
    name: String,
}

impl ScriptReference {
    pub fn new(package: PackageReference, name: impl Into<String>) -> Result<Self, ReferenceError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ReferenceError::EmptyName);
        }
        if name.contains(&RESERVED_NAME_CHARS[..]) {
            return Err(ReferenceError::InvalidName(name));
        }
        Ok(Self { package, name })
    }

    /// Shorthand for `ScriptReference::new(PackageReference::new(dir)?, name)`
    pub fn from_parts(
        package_dir: impl Into<PathBuf>,
        name: impl Into<String>,
    ) -> Result<Self, ReferenceError> {
        Self::new(PackageReference::new(package_dir)?, name)
    }

    pub fn package(&self) -> &PackageReference {
        &self.package
    }

    pub fn package_dir(&self) -> &Path {
        self.package.package_dir()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encode(&self) -> ScriptReferenceString {
        encode(self)
    }
}

impl fmt::Display for ScriptReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package.package_dir, self.name)
    }
}

/// Canonical, injective encoding of a `ScriptReference`
///
/// Only constructed by [`encode`] or by successfully decoding a string that
/// `encode` produced, so every value is well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScriptReferenceString(String);

impl ScriptReferenceString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<ScriptReference, DecodingError> {
        decode(&self.0)
    }
}

impl fmt::Display for ScriptReferenceString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ScriptReferenceString {
    type Error = DecodingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode(&value)?;
        Ok(Self(value))
    }
}

impl From<ScriptReferenceString> for String {
    fn from(value: ScriptReferenceString) -> Self {
        value.0
    }
}

/// Encode a reference into its canonical string form
pub fn encode(reference: &ScriptReference) -> ScriptReferenceString {
    let pair = serde_json::json!([reference.package.package_dir, reference.name]);
    ScriptReferenceString(pair.to_string())
}

/// Decode a string produced by [`encode`]
///
/// Anything that is not byte-for-byte the canonical encoding of a valid
/// reference is rejected, including equivalent JSON with different spacing
/// or escaping.
pub fn decode(input: &str) -> Result<ScriptReference, DecodingError> {
    let err = || DecodingError {
        input: input.to_string(),
    };

    let (package_dir, name): (String, String) = serde_json::from_str(input).map_err(|_| err())?;
    let reference = ScriptReference::from_parts(package_dir, name).map_err(|_| err())?;

    if encode(&reference).0 != input {
        return Err(err());
    }

    Ok(reference)
}
