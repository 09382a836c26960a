//! The foundation composition
//!
//! Builds the full set of namespaces and subsystem descriptors from a
//! validated [`CompositionInput`] in one synchronous pass:
//!
//! 1. Allocate one namespace per subsystem
//! 2. Wire the dependency graph (namespace before subsystem, gate before
//!    gated subsystem) and reject cycles or dangling gates
//! 3. Declare every subsystem in creation order, handing it the readiness
//!    signals of its gates
//!
//! The result is immutable. Changes are expressed as lifecycle [`Plan`]s
//! against a newly built composition, never by mutating this one.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use serde::Serialize;
use tracing::{debug, info};

use foundation_common::{Error, Result, COMPOSITION_NAME};

use crate::config::{CompositionInput, StackExports};
use crate::namespace::{NamespaceAllocator, NamespaceHandle};
use crate::resource::{ChildOptions, ResourceId, ResourceRef};
use crate::sequence::{DependencyGraph, Wave};
use crate::subsystem::{
    CertManager, IngressNginx, LocalPathProvisioner, Metallb, ReadinessMode, ReadinessSignal,
    Subsystem, SubsystemDescriptor, SubsystemKind,
};

/// Options applying to the composition as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionOptions {
    /// Refuse destruction of the composition and every child
    pub protect: bool,
    /// Resources outside the composition that must exist before anything in it
    pub depends_on: BTreeSet<ResourceRef>,
    /// Readiness definition used for cross-subsystem gates
    pub readiness: ReadinessMode,
}

impl CompositionOptions {
    /// Options copied onto each child
    fn child_options(&self) -> ChildOptions {
        ChildOptions {
            protect: self.protect,
            external_dependencies: self.depends_on.clone(),
        }
    }
}

/// A namespace the composition declares for one subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceDeclaration {
    /// Allocated names
    #[serde(flatten)]
    pub handle: NamespaceHandle,
    /// Deletion-protection
    pub protect: bool,
    /// Resources outside the composition that must exist first
    pub external_dependencies: BTreeSet<ResourceRef>,
}

/// Lifecycle action on a single resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Create the resource
    Create,
    /// Replace the resource's declared state
    Update,
    /// Delete the resource
    Delete,
}

/// One step of a lifecycle plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    /// Steps sharing a wave may run concurrently
    pub wave: usize,
    /// What to do
    pub action: Action,
    /// Resource acted on
    pub resource: ResourceId,
}

/// Ordered lifecycle steps for the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Composition the plan applies to
    pub composition: String,
    /// Steps in execution order
    pub steps: Vec<PlanStep>,
}

impl Plan {
    fn new(composition: &str) -> Self {
        Self {
            composition: composition.to_string(),
            steps: Vec::new(),
        }
    }

    /// Append a wave, filtered and tagged with an action; empty waves are skipped
    fn push_wave<F>(&mut self, wave: &Wave, mut action: F)
    where
        F: FnMut(&ResourceId) -> Option<Action>,
    {
        let index = self.steps.last().map_or(0, |s| s.wave + 1);
        let steps: Vec<PlanStep> = wave
            .resources
            .iter()
            .filter_map(|id| {
                action(id).map(|action| PlanStep {
                    wave: index,
                    action,
                    resource: id.clone(),
                })
            })
            .collect();
        self.steps.extend(steps);
    }

    /// Whether the plan has nothing to do
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resources in execution order
    pub fn resources(&self) -> Vec<&ResourceId> {
        self.steps.iter().map(|s| &s.resource).collect()
    }

    /// Position of a resource in the plan
    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.steps.iter().position(|s| &s.resource == id)
    }
}

/// Everything the composition exposes to downstream consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundationOutputs {
    /// logical name -> namespace name
    pub namespaces: BTreeMap<String, String>,
    /// Declared subsystems
    pub subsystems: Vec<SubsystemDescriptor>,
    /// Base domain, passed through
    pub base_domain: String,
    /// Ingress address, passed through
    pub ingress_ip: IpAddr,
}

/// Storage, load-balancing, ingress and certificates as one resource
#[derive(Debug, Clone)]
pub struct Foundation {
    name: String,
    options: CompositionOptions,
    namespaces: Vec<NamespaceDeclaration>,
    subsystems: Vec<SubsystemDescriptor>,
    graph: DependencyGraph,
    creation: Vec<Wave>,
}

impl Foundation {
    /// Build the standard four-subsystem composition
    pub fn new(input: &CompositionInput, options: CompositionOptions) -> Result<Self> {
        Self::with_subsystems(
            NamespaceAllocator::default(),
            default_subsystems(input),
            options,
        )
    }

    /// Build a composition from an arbitrary adapter set
    ///
    /// Fails on the first invalid namespace, colliding namespace, gate on an
    /// unregistered subsystem, or dependency cycle; nothing is declared then.
    pub fn with_subsystems(
        allocator: NamespaceAllocator,
        adapters: Vec<Box<dyn Subsystem>>,
        options: CompositionOptions,
    ) -> Result<Self> {
        info!(
            subsystems = adapters.len(),
            protect = options.protect,
            external_dependencies = options.depends_on.len(),
            "Building composition"
        );
        let child = options.child_options();

        let mut namespaces = Vec::with_capacity(adapters.len());
        let mut allocated = BTreeSet::new();
        for adapter in &adapters {
            let handle = allocator.allocate(adapter.logical_name())?;
            if !allocated.insert(handle.physical_name.clone()) {
                return Err(Error::NamespaceCollision {
                    physical_name: handle.physical_name,
                });
            }
            debug!(namespace = %handle.physical_name, "Allocated namespace");
            namespaces.push(NamespaceDeclaration {
                handle,
                protect: child.protect,
                external_dependencies: child.external_dependencies.clone(),
            });
        }

        let mut graph = DependencyGraph::new();
        let mut upstreams: BTreeMap<&str, Vec<&dyn Subsystem>> = BTreeMap::new();
        for adapter in &adapters {
            let name = adapter.logical_name();
            graph.add_edge(ResourceId::subsystem(name), ResourceId::namespace(name));

            for gate in adapter.gates() {
                let gating: Vec<&dyn Subsystem> = adapters
                    .iter()
                    .filter(|a| a.kind() == *gate)
                    .map(|a| a.as_ref())
                    .collect();
                if gating.is_empty() {
                    return Err(Error::UnknownDependency {
                        subsystem: name.to_string(),
                        dependency: gate.to_string(),
                    });
                }
                for upstream in &gating {
                    graph.add_edge(
                        ResourceId::subsystem(name),
                        ResourceId::subsystem(upstream.logical_name()),
                    );
                }
                upstreams.entry(name).or_default().extend(gating);
            }
        }

        let creation = graph.creation_waves()?;

        let mut declared: BTreeMap<String, SubsystemDescriptor> = BTreeMap::new();
        for id in creation.iter().flat_map(|w| w.resources.iter()) {
            let ResourceId::Subsystem(name) = id else {
                continue;
            };
            let adapter = adapters
                .iter()
                .find(|a| a.logical_name() == name)
                .ok_or_else(|| Error::UnknownResource {
                    resource: id.to_string(),
                })?;
            let namespace = namespaces
                .iter()
                .find(|n| &n.handle.logical_name == name)
                .ok_or_else(|| Error::UnknownResource {
                    resource: ResourceId::namespace(name.as_str()).to_string(),
                })?;

            let depends_on: BTreeSet<ReadinessSignal> = upstreams
                .get(name.as_str())
                .into_iter()
                .flatten()
                .map(|upstream| upstream.readiness_signal(options.readiness))
                .collect();

            let descriptor = adapter.declare(&namespace.handle, depends_on, &child)?;
            debug!(
                subsystem = %descriptor.kind,
                namespace = %descriptor.namespace.physical_name,
                gates = descriptor.depends_on.len(),
                "Declared subsystem"
            );
            declared.insert(name.clone(), descriptor);
        }

        let subsystems = adapters
            .iter()
            .map(|a| {
                declared
                    .remove(a.logical_name())
                    .ok_or_else(|| Error::UnknownResource {
                        resource: ResourceId::subsystem(a.logical_name()).to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            namespaces = namespaces.len(),
            waves = creation.len(),
            "Composition built"
        );

        Ok(Self {
            name: COMPOSITION_NAME.to_string(),
            options,
            namespaces,
            subsystems,
            graph,
            creation,
        })
    }

    /// Resource name of the composition
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options the composition was built with
    pub fn options(&self) -> &CompositionOptions {
        &self.options
    }

    /// Declared namespaces, in registration order
    pub fn namespaces(&self) -> &[NamespaceDeclaration] {
        &self.namespaces
    }

    /// Declared subsystems, in registration order
    pub fn subsystems(&self) -> &[SubsystemDescriptor] {
        &self.subsystems
    }

    /// Descriptor of the first subsystem providing `kind`
    pub fn descriptor(&self, kind: SubsystemKind) -> Option<&SubsystemDescriptor> {
        self.subsystems.iter().find(|d| d.kind == kind)
    }

    /// Namespace declared for a logical subsystem name
    pub fn namespace(&self, logical_name: &str) -> Option<&NamespaceDeclaration> {
        self.namespaces
            .iter()
            .find(|n| n.handle.logical_name == logical_name)
    }

    /// Creation waves
    pub fn creation_waves(&self) -> &[Wave] {
        &self.creation
    }

    /// Dependency graph of all declared resources
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Public result of the composition
    pub fn outputs(&self, exports: StackExports) -> FoundationOutputs {
        FoundationOutputs {
            namespaces: self
                .namespaces
                .iter()
                .map(|n| (n.handle.logical_name.clone(), n.handle.physical_name.clone()))
                .collect(),
            subsystems: self.subsystems.clone(),
            base_domain: exports.base_domain,
            ingress_ip: exports.ingress_ip,
        }
    }

    /// Create every resource, dependencies first
    pub fn plan_create(&self) -> Plan {
        let mut plan = Plan::new(&self.name);
        for wave in &self.creation {
            plan.push_wave(wave, |_| Some(Action::Create));
        }
        plan
    }

    /// Move from this composition to `next`
    ///
    /// Removed resources are deleted first (refused when protected), then
    /// added and changed resources are created/updated in `next`'s creation
    /// order. Unchanged resources produce no step. A namespace whose physical
    /// name changes counts as removed and added, as does its subsystem.
    pub fn plan_update(&self, next: &Foundation) -> Result<Plan> {
        // Namespace names are immutable: a renamed namespace is replaced,
        // together with the subsystem installed in it
        let replaced: BTreeSet<&str> = self
            .namespaces
            .iter()
            .filter(|n| {
                next.namespace(&n.handle.logical_name)
                    .is_some_and(|m| m.handle.physical_name != n.handle.physical_name)
            })
            .map(|n| n.handle.logical_name.as_str())
            .collect();

        let removed: BTreeSet<&ResourceId> = flat_ids(&self.creation)
            .filter(|id| !next.graph.contains(id) || replaced.contains(id.logical_name()))
            .collect();

        if !removed.is_empty() && self.options.protect {
            let first = removed.iter().next().map(ToString::to_string);
            return Err(Error::protected(first.unwrap_or_else(|| self.name.clone())));
        }

        let mut plan = Plan::new(&self.name);

        if !removed.is_empty() {
            for wave in self.teardown_waves()? {
                plan.push_wave(&wave, |id| removed.contains(id).then_some(Action::Delete));
            }
        }

        for wave in &next.creation {
            plan.push_wave(wave, |id| {
                if !self.graph.contains(id) || replaced.contains(id.logical_name()) {
                    Some(Action::Create)
                } else if self.differs(next, id) {
                    Some(Action::Update)
                } else {
                    None
                }
            });
        }

        info!(steps = plan.steps.len(), "Computed update plan");
        Ok(plan)
    }

    /// Destroy the composition, dependents first
    ///
    /// Subsystems go in reverse gate order, then every namespace in a final
    /// wave once nothing is left running in any of them.
    pub fn plan_destroy(&self) -> Result<Plan> {
        if self.options.protect {
            return Err(Error::protected(&self.name));
        }

        let mut plan = Plan::new(&self.name);
        for wave in self.teardown_waves()? {
            plan.push_wave(&wave, |_| Some(Action::Delete));
        }
        Ok(plan)
    }

    /// Deletion waves of the whole composition
    ///
    /// Every namespace is made to depend-for-deletion on every subsystem, so
    /// no namespace shares a wave with a subsystem still being removed.
    fn teardown_waves(&self) -> Result<Vec<Wave>> {
        let mut teardown = self.graph.clone();
        for ns in &self.namespaces {
            for descriptor in &self.subsystems {
                teardown.add_edge(
                    ResourceId::subsystem(descriptor.resource_name.as_str()),
                    ResourceId::namespace(ns.handle.logical_name.as_str()),
                );
            }
        }
        teardown.deletion_waves()
    }

    /// Destroy one child and everything that depends on it
    pub fn plan_destroy_resource(&self, id: &ResourceId) -> Result<Plan> {
        if !self.graph.contains(id) {
            return Err(Error::UnknownResource {
                resource: id.to_string(),
            });
        }
        if self.is_protected(id) {
            return Err(Error::protected(id.to_string()));
        }

        let mut plan = Plan::new(&self.name);
        for wave in self.graph.deletion_waves_from(id)? {
            plan.push_wave(&wave, |_| Some(Action::Delete));
        }
        Ok(plan)
    }

    fn is_protected(&self, id: &ResourceId) -> bool {
        match id {
            ResourceId::Namespace(name) => self.namespace(name).is_some_and(|n| n.protect),
            ResourceId::Subsystem(name) => self
                .subsystems
                .iter()
                .any(|d| &d.resource_name == name && d.protect),
        }
    }

    fn differs(&self, next: &Foundation, id: &ResourceId) -> bool {
        match id {
            ResourceId::Namespace(name) => self.namespace(name) != next.namespace(name),
            ResourceId::Subsystem(name) => {
                let find = |f: &Foundation| {
                    f.subsystems
                        .iter()
                        .find(|d| &d.resource_name == name)
                        .cloned()
                };
                find(self) != find(next)
            }
        }
    }
}

/// The four standard adapters, each narrowed to the inputs it needs
pub fn default_subsystems(input: &CompositionInput) -> Vec<Box<dyn Subsystem>> {
    vec![
        Box::new(LocalPathProvisioner::new()),
        Box::new(Metallb::from_input(input)),
        Box::new(IngressNginx::from_input(input)),
        Box::new(CertManager::from_input(input)),
    ]
}

fn flat_ids(waves: &[Wave]) -> impl Iterator<Item = &ResourceId> {
    waves.iter().flat_map(|w| w.resources.iter())
}
