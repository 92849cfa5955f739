/// Cache key generation for script caching
///
/// A cache key captures everything that can affect a script's output:
/// - Command, extra arguments and environment
/// - Clean mode
/// - Input files (package-relative path -> content digest)
/// - Declared output globs, in order
/// - The full cache key of every dependency, recursively
///
/// Two scripts have the same effective inputs iff their serialized
/// `CacheKeyString`s are byte-identical. Maps are `BTreeMap`s so serialization
/// order never depends on construction order.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

use super::config::{CleanMode, ScriptConfig};
use super::digest::{InvalidDigest, Sha256HexDigest};
use super::graph::ScriptGraph;
use super::reference::ScriptReferenceString;

#[derive(Error, Debug)]
pub enum CacheKeyError {
    #[error("script {0} does not declare its input files and cannot be cached")]
    UnknownInputs(ScriptReferenceString),

    #[error("two different configurations registered for script {0}")]
    ConflictingScript(ScriptReferenceString),

    #[error("no input file digests available for script {0}")]
    MissingDigests(ScriptReferenceString),

    #[error("failed to collect input digests for script {reference}: {message}")]
    DigestSource {
        reference: ScriptReferenceString,
        message: String,
    },

    #[error(transparent)]
    InvalidDigest(#[from] InvalidDigest),

    #[error("cache key is not canonical")]
    NonCanonical,

    #[error("failed to (de)serialize cache key: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Input file digests for a script, keyed by package-relative path
pub type FileDigests = BTreeMap<String, Sha256HexDigest>;

/// Supplies the input file digests of a script
///
/// Only called for scripts that declare at least one input glob.
pub trait FileDigestSource {
    fn digests_for(&self, script: &ScriptConfig) -> Result<FileDigests, CacheKeyError>;
}

impl<F> FileDigestSource for F
where
    F: Fn(&ScriptConfig) -> Result<FileDigests, CacheKeyError>,
{
    fn digests_for(&self, script: &ScriptConfig) -> Result<FileDigests, CacheKeyError> {
        self(script)
    }
}

/// Precomputed digests for a set of scripts
#[derive(Debug, Clone, Default)]
pub struct DigestTable {
    digests: HashMap<ScriptReferenceString, FileDigests>,
}

impl DigestTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: ScriptReferenceString, digests: FileDigests) {
        self.digests.insert(reference, digests);
    }

    pub fn insert_file(
        &mut self,
        reference: ScriptReferenceString,
        path: impl Into<String>,
        digest: Sha256HexDigest,
    ) {
        self.digests
            .entry(reference)
            .or_default()
            .insert(path.into(), digest);
    }
}

impl FileDigestSource for DigestTable {
    fn digests_for(&self, script: &ScriptConfig) -> Result<FileDigests, CacheKeyError> {
        let reference = script.encoded_reference();
        self.digests
            .get(&reference)
            .cloned()
            .ok_or(CacheKeyError::MissingDigests(reference))
    }
}

/// Fingerprint of a script and its transitive dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheKey {
    pub command: Option<String>,
    pub extra_args: Vec<String>,
    pub clean: CleanMode,
    pub env: BTreeMap<String, String>,
    pub files: FileDigests,
    pub output: Vec<String>,
    pub dependencies: BTreeMap<ScriptReferenceString, CacheKey>,
}

impl CacheKey {
    /// Canonical serialization, shared by equality checks and persistence
    pub fn to_key_string(&self) -> Result<CacheKeyString, CacheKeyError> {
        Ok(CacheKeyString(serde_json::to_string(self)?))
    }
}

/// Canonical serialization of a `CacheKey`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKeyString(String);

impl CacheKeyString {
    /// Accept a string read back from a store, if it is a canonical key
    pub fn from_stored(value: impl Into<String>) -> Result<Self, CacheKeyError> {
        let value = value.into();
        let key: CacheKey = serde_json::from_str(&value)?;
        if key.to_key_string()?.0 != value {
            return Err(CacheKeyError::NonCanonical);
        }
        Ok(Self(value))
    }

    pub fn parse(&self) -> Result<CacheKey, CacheKeyError> {
        Ok(serde_json::from_str(&self.0)?)
    }

    /// SHA256 hex of the serialized key, a compact handle for stores and logs
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKeyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CacheKeyString {
    type Error = CacheKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_stored(value)
    }
}

impl From<CacheKeyString> for String {
    fn from(value: CacheKeyString) -> Self {
        value.0
    }
}

/// Compute the cache key for a script, recursing into dependencies first
///
/// Every script in the closure must have known inputs (see
/// [`ScriptConfig::has_known_inputs`]); otherwise the script is not cacheable
/// and `CacheKeyError::UnknownInputs` names the offending script. Two
/// different configurations under one reference anywhere in the closure fail
/// with `CacheKeyError::ConflictingScript`.
pub fn compute_cache_key<S>(script: &ScriptConfig, source: &S) -> Result<CacheKey, CacheKeyError>
where
    S: FileDigestSource + ?Sized,
{
    let mut memo = Memo::new();
    compute_memoized(script, source, &mut memo)
}

/// Compute cache keys for every cacheable script in a graph
///
/// Scripts whose closure contains unknown inputs are left out of the result.
pub fn compute_graph_cache_keys<S>(
    graph: &ScriptGraph,
    source: &S,
) -> Result<HashMap<ScriptReferenceString, CacheKey>, CacheKeyError>
where
    S: FileDigestSource + ?Sized,
{
    let mut memo = Memo::new();

    for script in graph.post_order() {
        if !graph.is_cacheable(&script.encoded_reference()) {
            tracing::debug!(
                operation = "cache_key.compute",
                status = "uncacheable",
                reference = %script.reference,
                "skipping script with unknown inputs"
            );
            continue;
        }
        compute_memoized(script, source, &mut memo)?;
    }

    Ok(memo
        .into_iter()
        .map(|(reference, (_, key))| (reference, key))
        .collect())
}

/// Keys computed so far, next to the configuration each was computed from
type Memo<'a> = HashMap<ScriptReferenceString, (&'a ScriptConfig, CacheKey)>;

fn compute_memoized<'a, S>(
    script: &'a ScriptConfig,
    source: &S,
    memo: &mut Memo<'a>,
) -> Result<CacheKey, CacheKeyError>
where
    S: FileDigestSource + ?Sized,
{
    let reference = script.encoded_reference();
    if let Some((seen, key)) = memo.get(&reference) {
        if !std::ptr::eq(*seen, script) && **seen != *script {
            return Err(CacheKeyError::ConflictingScript(reference));
        }
        return Ok(key.clone());
    }

    if !script.has_known_inputs() {
        return Err(CacheKeyError::UnknownInputs(reference));
    }

    let mut dependencies = BTreeMap::new();
    for dependency in &script.dependencies {
        let key = compute_memoized(dependency, source, memo)?;
        dependencies.insert(dependency.encoded_reference(), key);
    }

    let declares_files = script.files.as_ref().is_some_and(|globs| !globs.is_empty());
    let files = if declares_files {
        source.digests_for(script)?
    } else {
        FileDigests::new()
    };

    let key = CacheKey {
        command: script.command.clone(),
        extra_args: script.extra_args.clone(),
        clean: script.clean,
        env: script.env.clone(),
        files,
        output: script.output.clone().unwrap_or_default(),
        dependencies,
    };

    tracing::trace!(
        operation = "cache_key.compute",
        reference = %script.reference,
        file_count = key.files.len(),
        dependency_count = key.dependencies.len(),
        "computed cache key"
    );

    memo.insert(reference, (script, key.clone()));
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::reference::ScriptReference;
    use std::sync::Arc;

    fn digest(seed: &str) -> Sha256HexDigest {
        Sha256HexDigest::from_bytes(&Sha256::digest(seed.as_bytes())).unwrap()
    }

    fn script(name: &str) -> ScriptConfig {
        let reference = ScriptReference::from_parts(std::env::temp_dir().join("pkg"), name).unwrap();
        ScriptConfig::new(reference)
            .with_command(format!("build {name}"))
            .with_files(["src/**/*.ts"])
            .with_output(["lib/**"])
    }

    fn table_for(scripts: &[&ScriptConfig]) -> DigestTable {
        let mut table = DigestTable::new();
        for s in scripts {
            table.insert_file(s.encoded_reference(), "src/index.ts", digest(s.reference.name()));
        }
        table
    }

    #[test]
    fn test_key_is_deterministic_across_insertion_order() {
        let mut forward = FileDigests::new();
        let mut backward = FileDigests::new();
        let entries: Vec<_> = (0..20).map(|i| (format!("src/f{i}.ts"), digest(&i.to_string()))).collect();
        for (path, d) in &entries {
            forward.insert(path.clone(), d.clone());
        }
        for (path, d) in entries.iter().rev() {
            backward.insert(path.clone(), d.clone());
        }

        let base = CacheKey {
            command: Some("tsc".into()),
            extra_args: vec![],
            clean: CleanMode::Always,
            env: BTreeMap::new(),
            files: forward,
            output: vec!["lib/**".into()],
            dependencies: BTreeMap::new(),
        };
        let other = CacheKey {
            files: backward,
            ..base.clone()
        };

        assert_eq!(base.to_key_string().unwrap(), other.to_key_string().unwrap());
    }

    #[test]
    fn test_key_changes_with_command_clean_and_output_order() {
        let s = script("a");
        let table = table_for(&[&s]);
        let base = compute_cache_key(&s, &table).unwrap().to_key_string().unwrap();

        let changed_command = s.clone().with_command("build other");
        let changed_clean = s.clone().with_clean(CleanMode::Never);
        let two_outputs = s.clone().with_output(["lib/**", "dist/**"]);
        let swapped_outputs = s.clone().with_output(["dist/**", "lib/**"]);
        let with_args = s.clone().with_extra_args(["--watch"]);
        let with_env = s.clone().with_env("NODE_ENV", "production");

        let mut seen = vec![base];
        for variant in [
            changed_command,
            changed_clean,
            two_outputs,
            swapped_outputs,
            with_args,
            with_env,
        ] {
            let key = compute_cache_key(&variant, &table).unwrap().to_key_string().unwrap();
            assert!(!seen.contains(&key), "variant collided: {key}");
            seen.push(key);
        }
    }

    #[test]
    fn test_deep_digest_change_invalidates_every_ancestor() {
        let leaf = script("leaf");
        let mid = script("mid").with_dependency(Arc::new(leaf.clone()));
        let root = script("root").with_dependency(Arc::new(mid.clone()));

        let before = table_for(&[&leaf, &mid, &root]);
        let mut after = before.clone();
        after.insert_file(leaf.encoded_reference(), "src/index.ts", digest("changed"));

        for s in [&leaf, &mid, &root] {
            let a = compute_cache_key(s, &before).unwrap().to_key_string().unwrap();
            let b = compute_cache_key(s, &after).unwrap().to_key_string().unwrap();
            assert_ne!(a, b, "{} did not change", s.reference.name());
        }
    }

    #[test]
    fn test_dependency_order_does_not_matter() {
        let a = Arc::new(script("a"));
        let b = Arc::new(script("b"));
        let ab = script("root")
            .with_dependency(Arc::clone(&a))
            .with_dependency(Arc::clone(&b));
        let ba = script("root").with_dependency(b.clone()).with_dependency(a.clone());

        let table = table_for(&[&a, &b, &ab]);
        assert_eq!(
            compute_cache_key(&ab, &table).unwrap().to_key_string().unwrap(),
            compute_cache_key(&ba, &table).unwrap().to_key_string().unwrap()
        );
    }

    #[test]
    fn test_unknown_inputs_anywhere_in_closure() {
        let unknown = ScriptConfig {
            files: None,
            ..script("unknown")
        };
        let root = script("root").with_dependency(Arc::new(unknown.clone()));
        let table = table_for(&[&root]);

        match compute_cache_key(&root, &table) {
            Err(CacheKeyError::UnknownInputs(r)) => assert_eq!(r, unknown.encoded_reference()),
            other => panic!("expected UnknownInputs, got {other:?}"),
        }
    }

    #[test]
    fn test_grouping_script_and_empty_files_need_no_digests() {
        let empty = script("empty").with_files(Vec::<String>::new());
        let group = ScriptConfig::new(script("group").reference).with_dependency(Arc::new(empty));
        let key = compute_cache_key(&group, &DigestTable::new()).unwrap();

        assert_eq!(key.command, None);
        assert!(key.files.is_empty());
        assert_eq!(key.dependencies.len(), 1);
    }

    #[test]
    fn test_missing_digests_reported() {
        let s = script("a");
        assert!(matches!(
            compute_cache_key(&s, &DigestTable::new()),
            Err(CacheKeyError::MissingDigests(_))
        ));
    }

    #[test]
    fn test_closure_source() {
        let s = script("a");
        let source = |_: &ScriptConfig| -> Result<FileDigests, CacheKeyError> {
            Ok(FileDigests::from([("src/a.ts".to_string(), digest("a"))]))
        };
        let key = compute_cache_key(&s, &source).unwrap();
        assert_eq!(key.files.len(), 1);
    }

    #[test]
    fn test_same_reference_with_different_config_conflicts() {
        let first = script("dep").with_command("one");
        let second = script("dep").with_command("two");
        let mid = script("mid").with_dependency(Arc::new(second));
        let root = script("root")
            .with_dependency(Arc::new(first.clone()))
            .with_dependency(Arc::new(mid.clone()));
        let table = table_for(&[&first, &mid, &root]);

        match compute_cache_key(&root, &table) {
            Err(CacheKeyError::ConflictingScript(r)) => assert_eq!(r, first.encoded_reference()),
            other => panic!("expected ConflictingScript, got {other:?}"),
        }
    }

    #[test]
    fn test_equal_copies_of_a_dependency_share_one_key() {
        let dep = script("dep");
        let mid = script("mid").with_dependency(Arc::new(dep.clone()));
        let root = script("root")
            .with_dependency(Arc::new(dep.clone()))
            .with_dependency(Arc::new(mid.clone()));
        let key = compute_cache_key(&root, &table_for(&[&dep, &mid, &root])).unwrap();

        let direct = &key.dependencies[&dep.encoded_reference()];
        let nested = &key.dependencies[&mid.encoded_reference()].dependencies[&dep.encoded_reference()];
        assert_eq!(direct, nested);
    }

    #[test]
    fn test_stored_string_round_trip_and_fingerprint() {
        let dep = script("dep");
        let s = script("a").with_dependency(Arc::new(dep.clone()));
        let key = compute_cache_key(&s, &table_for(&[&s, &dep])).unwrap();
        let serialized = key.to_key_string().unwrap();

        let stored = CacheKeyString::from_stored(serialized.as_str()).unwrap();
        assert_eq!(stored, serialized);
        assert_eq!(stored.parse().unwrap(), key);
        assert_eq!(stored.fingerprint().len(), 64);

        let pretty = serde_json::to_string_pretty(&key).unwrap();
        assert!(matches!(
            CacheKeyString::from_stored(pretty),
            Err(CacheKeyError::NonCanonical)
        ));
    }

    #[test]
    fn test_graph_keys_skip_uncacheable() {
        let unknown = Arc::new(ScriptConfig {
            files: None,
            ..script("unknown")
        });
        let cacheable = Arc::new(script("ok"));
        let root = Arc::new(script("root").with_dependency(Arc::clone(&unknown)));

        let graph = ScriptGraph::new(vec![root, Arc::clone(&cacheable)]).unwrap();
        let keys = compute_graph_cache_keys(&graph, &table_for(&[&cacheable])).unwrap();

        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key(&cacheable.encoded_reference()));
    }
}
