/// Script graph traversal
///
/// Indexes every script reachable from a set of roots and walks the DAG
/// depth-first, dependencies before dependents.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use super::config::ScriptConfig;
use super::reference::ScriptReferenceString;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("two different configurations registered for script {0}")]
    ConflictingScript(ScriptReferenceString),
}

/// The dependency DAG of script configurations
///
/// Configs are immutable `Arc`s built bottom-up, so a cycle cannot be
/// expressed; the graph is acyclic by construction.
#[derive(Debug, Clone)]
pub struct ScriptGraph {
    roots: Vec<Arc<ScriptConfig>>,
    scripts: HashMap<ScriptReferenceString, Arc<ScriptConfig>>,
    order: Vec<ScriptReferenceString>,
}

impl ScriptGraph {
    pub fn new(roots: Vec<Arc<ScriptConfig>>) -> Result<Self, GraphError> {
        let mut graph = Self {
            roots: Vec::new(),
            scripts: HashMap::new(),
            order: Vec::new(),
        };

        for root in &roots {
            graph.visit(root)?;
        }
        graph.roots = roots;

        tracing::debug!(
            operation = "graph.build",
            script_count = graph.scripts.len(),
            "indexed script graph"
        );

        Ok(graph)
    }

    fn visit(&mut self, script: &Arc<ScriptConfig>) -> Result<(), GraphError> {
        let key = script.encoded_reference();

        if let Some(existing) = self.scripts.get(&key) {
            if Arc::ptr_eq(existing, script) || **existing == **script {
                return Ok(());
            }
            return Err(GraphError::ConflictingScript(key));
        }

        for dependency in &script.dependencies {
            self.visit(dependency)?;
        }

        self.scripts.insert(key.clone(), Arc::clone(script));
        self.order.push(key);
        Ok(())
    }

    pub fn roots(&self) -> &[Arc<ScriptConfig>] {
        &self.roots
    }

    pub fn get(&self, reference: &ScriptReferenceString) -> Option<&Arc<ScriptConfig>> {
        self.scripts.get(reference)
    }

    pub fn contains(&self, reference: &ScriptReferenceString) -> bool {
        self.scripts.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Every script once, each after all of its dependencies
    pub fn post_order(&self) -> impl Iterator<Item = &Arc<ScriptConfig>> + '_ {
        self.order.iter().filter_map(|key| self.scripts.get(key))
    }

    /// Whether the script and everything it transitively depends on has
    /// known inputs. Returns `false` for references not in the graph.
    pub fn is_cacheable(&self, reference: &ScriptReferenceString) -> bool {
        match self.scripts.get(reference) {
            Some(script) => {
                let mut seen = HashSet::new();
                all_inputs_known(script, &mut seen)
            }
            None => false,
        }
    }
}

fn all_inputs_known(script: &ScriptConfig, seen: &mut HashSet<ScriptReferenceString>) -> bool {
    if !seen.insert(script.encoded_reference()) {
        return true;
    }
    script.has_known_inputs()
        && script
            .dependencies
            .iter()
            .all(|dependency| all_inputs_known(dependency, seen))
}
