/// Script configuration as produced by the manifest analyzer
///
/// A `ScriptConfig` is an immutable node of the script graph. Dependencies
/// are held as shared subgraphs, so a script depended on by several parents
/// appears once in memory.
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::reference::{ScriptReference, ScriptReferenceString};

/// When declared outputs are deleted before a script runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CleanMode {
    /// Delete outputs before every run
    #[default]
    Always,
    /// Never delete outputs
    Never,
    /// Delete outputs only when an input file was removed since the last run
    IfFileDeleted,
}

const IF_FILE_DELETED: &str = "if-file-deleted";

impl Serialize for CleanMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CleanMode::Always => serializer.serialize_bool(true),
            CleanMode::Never => serializer.serialize_bool(false),
            CleanMode::IfFileDeleted => serializer.serialize_str(IF_FILE_DELETED),
        }
    }
}

impl<'de> Deserialize<'de> for CleanMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CleanModeVisitor;

        impl Visitor<'_> for CleanModeVisitor {
            type Value = CleanMode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "true, false or \"{IF_FILE_DELETED}\"")
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> Result<CleanMode, E> {
                Ok(if value {
                    CleanMode::Always
                } else {
                    CleanMode::Never
                })
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<CleanMode, E> {
                if value == IF_FILE_DELETED {
                    Ok(CleanMode::IfFileDeleted)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(value), &self))
                }
            }
        }

        deserializer.deserialize_any(CleanModeVisitor)
    }
}

/// One script in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptConfig {
    pub reference: ScriptReference,
    /// `None` for pure grouping scripts that only order their dependencies
    pub command: Option<String>,
    /// Extra arguments appended to the command
    pub extra_args: Vec<String>,
    /// Environment variables set for the command
    pub env: BTreeMap<String, String>,
    pub dependencies: Vec<Arc<ScriptConfig>>,
    /// Input globs. `None` means the inputs are unknown and the script can
    /// never be cached; `Some(vec![])` means it provably has no inputs.
    pub files: Option<Vec<String>>,
    /// Output globs, in declaration order
    pub output: Option<Vec<String>>,
    pub clean: CleanMode,
}

impl ScriptConfig {
    pub fn new(reference: ScriptReference) -> Self {
        Self {
            reference,
            command: None,
            extra_args: Vec::new(),
            env: BTreeMap::new(),
            dependencies: Vec::new(),
            files: None,
            output: None,
            clean: CleanMode::default(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = Some(files.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_output<I, S>(mut self, output: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output = Some(output.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_clean(mut self, clean: CleanMode) -> Self {
        self.clean = clean;
        self
    }

    pub fn with_dependency(mut self, dependency: Arc<ScriptConfig>) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn encoded_reference(&self) -> ScriptReferenceString {
        self.reference.encode()
    }

    /// Whether this script's own inputs are known
    ///
    /// A script without a command does no work of its own, so undeclared
    /// files do not make it uncacheable.
    pub fn has_known_inputs(&self) -> bool {
        self.files.is_some() || self.command.is_none()
    }
}
