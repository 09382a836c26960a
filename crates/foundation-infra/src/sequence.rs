//! Topological ordering of composition resources
//!
//! Computes the waves in which resources must be created, and the reverse
//! waves in which they must be destroyed. Everything in one wave has its
//! dependencies satisfied by earlier waves, so the engine may create a wave
//! concurrently.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use foundation_common::{Error, Result};

use crate::resource::ResourceId;

/// A group of resources with no ordering constraints among themselves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wave {
    /// Resources in this wave, sorted
    pub resources: Vec<ResourceId>,
}

impl Wave {
    /// Check if the wave is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Get the number of resources in the wave
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the wave contains the resource
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resources.contains(id)
    }
}

/// Dependency edges between composition resources
///
/// Sorted maps keep wave contents deterministic across builds.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// resource -> resources it depends on
    dependencies: BTreeMap<ResourceId, BTreeSet<ResourceId>>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource with no dependencies (no-op if present)
    pub fn add_node(&mut self, id: ResourceId) {
        self.dependencies.entry(id).or_default();
    }

    /// Record that `dependent` must be created after `dependency`
    pub fn add_edge(&mut self, dependent: ResourceId, dependency: ResourceId) {
        self.add_node(dependency.clone());
        self.dependencies
            .entry(dependent)
            .or_default()
            .insert(dependency);
    }

    /// Whether the resource is part of the graph
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.dependencies.contains_key(id)
    }

    /// Direct dependencies of a resource
    pub fn dependencies_of(&self, id: &ResourceId) -> impl Iterator<Item = &ResourceId> {
        self.dependencies.get(id).into_iter().flatten()
    }

    /// Resources that directly depend on `id`
    pub fn dependents_of<'a>(&'a self, id: &'a ResourceId) -> impl Iterator<Item = &'a ResourceId> {
        self.dependencies
            .iter()
            .filter(move |(_, deps)| deps.contains(id))
            .map(|(dependent, _)| dependent)
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Creation order: dependencies first
    ///
    /// Uses Kahn's algorithm:
    /// 1. Find all unplaced resources whose dependencies are all placed
    /// 2. Emit them as the next wave
    /// 3. Repeat until everything is placed; no progress means a cycle
    pub fn creation_waves(&self) -> Result<Vec<Wave>> {
        self.waves(|id| self.dependencies_of(id).cloned().collect())
    }

    /// Destruction order: dependents first
    pub fn deletion_waves(&self) -> Result<Vec<Wave>> {
        self.waves(|id| self.dependents_of(id).cloned().collect())
    }

    /// Destruction order for `root` and everything that transitively depends on it
    pub fn deletion_waves_from(&self, root: &ResourceId) -> Result<Vec<Wave>> {
        let mut subset = BTreeSet::new();
        self.collect_dependents(root, &mut subset);

        let mut sub = DependencyGraph::new();
        for id in &subset {
            sub.add_node(id.clone());
            for dep in self.dependencies_of(id).filter(|d| subset.contains(*d)) {
                sub.add_edge(id.clone(), dep.clone());
            }
        }
        sub.deletion_waves()
    }

    fn collect_dependents(&self, id: &ResourceId, collected: &mut BTreeSet<ResourceId>) {
        if !collected.insert(id.clone()) {
            return;
        }
        for dependent in self.dependents_of(id) {
            self.collect_dependents(dependent, collected);
        }
    }

    fn waves<F>(&self, blockers: F) -> Result<Vec<Wave>>
    where
        F: Fn(&ResourceId) -> Vec<ResourceId>,
    {
        let mut placed: BTreeSet<&ResourceId> = BTreeSet::new();
        let mut waves = Vec::new();

        while placed.len() < self.dependencies.len() {
            let wave = Wave {
                resources: self
                    .dependencies
                    .keys()
                    .filter(|id| !placed.contains(id))
                    .filter(|id| blockers(*id).iter().all(|b| placed.contains(b)))
                    .cloned()
                    .collect(),
            };

            if wave.is_empty() {
                let stuck = self
                    .dependencies
                    .keys()
                    .filter(|id| !placed.contains(id))
                    .map(ToString::to_string)
                    .collect();
                return Err(Error::DependencyCycle { stuck });
            }

            debug!(wave = waves.len(), resources = wave.len(), "Computed wave");

            for id in &wave.resources {
                if let Some((key, _)) = self.dependencies.get_key_value(id) {
                    placed.insert(key);
                }
            }
            waves.push(wave);
        }

        Ok(waves)
    }
}

/// Flatten waves into a single ordered list
pub fn flatten(waves: &[Wave]) -> Vec<ResourceId> {
    waves
        .iter()
        .flat_map(|w| w.resources.iter().cloned())
        .collect()
}
