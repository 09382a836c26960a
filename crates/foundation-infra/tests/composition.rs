//! Composition behaviour tests
//!
//! Each story exercises the composition the way a stack deployment would:
//! raw configuration in, namespaces, descriptors and lifecycle plans out.

use std::collections::BTreeSet;

use foundation_common::Error;
use foundation_infra::config::{
    CLOUDFLARE_API_TOKEN_KEY, INGRESS_IP_KEY, LOAD_BALANCER_ADDRESSES_KEY,
};
use foundation_infra::subsystem::{
    CertManager, IngressNginx, LocalPathProvisioner, Metallb, ReclaimPolicy,
};
use foundation_infra::{
    Action, CompositionInput, CompositionOptions, Foundation, NamespaceAllocator, RawInputs,
    ResourceId, ResourceRef, Subsystem, SubsystemKind, SubsystemParameters,
};

fn raw() -> RawInputs {
    RawInputs::new()
        .with(LOAD_BALANCER_ADDRESSES_KEY, "10.0.0.10-10.0.0.20")
        .with(INGRESS_IP_KEY, "10.0.0.10")
        .with(CLOUDFLARE_API_TOKEN_KEY, "tok-abc")
}

fn build(raw: &RawInputs, options: CompositionOptions) -> Result<Foundation, Error> {
    let input = CompositionInput::build(raw)?;
    Foundation::new(&input, options)
}

fn protected() -> CompositionOptions {
    CompositionOptions {
        protect: true,
        ..Default::default()
    }
}

// =============================================================================
// Construction
// =============================================================================

/// Story: The reference stack produces the four expected namespaces
#[test]
fn story_reference_stack_namespaces() {
    let foundation = build(&raw(), CompositionOptions::default()).unwrap();

    let names: Vec<&str> = foundation
        .namespaces()
        .iter()
        .map(|n| n.handle.physical_name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "infra-foundation-local-path-provisioner",
            "infra-foundation-metallb",
            "infra-foundation-ingress-nginx",
            "infra-foundation-cert-manager",
        ]
    );

    for descriptor in foundation.subsystems() {
        assert_eq!(
            descriptor.namespace.physical_name,
            format!("infra-foundation-{}", descriptor.resource_name)
        );
    }
}

/// Story: Rebuilding with identical inputs converges on identical names
#[test]
fn story_rebuild_is_deterministic() {
    let first = build(&raw(), CompositionOptions::default()).unwrap();
    let second = build(&raw(), CompositionOptions::default()).unwrap();

    assert_eq!(first.namespaces(), second.namespaces());
    assert_eq!(first.subsystems(), second.subsystems());
    assert_eq!(first.creation_waves(), second.creation_waves());
}

/// Story: Ingress waits for MetalLB, nothing else waits for anything
#[test]
fn story_only_ingress_is_gated() {
    let foundation = build(&raw(), CompositionOptions::default()).unwrap();

    let ingress = foundation
        .descriptor(SubsystemKind::IngressController)
        .unwrap();
    assert!(ingress.waits_for(SubsystemKind::LoadBalancer));
    assert_eq!(ingress.depends_on.len(), 1);
    assert_eq!(ingress.depends_on.iter().next().unwrap().resource_name, "metallb");

    for kind in [
        SubsystemKind::StorageProvisioner,
        SubsystemKind::LoadBalancer,
        SubsystemKind::CertificateManager,
    ] {
        let descriptor = foundation.descriptor(kind).unwrap();
        assert!(
            descriptor.depends_on.is_empty(),
            "{kind} must not wait on another subsystem"
        );
    }
}

/// Story: MetalLB is always created before the ingress controller
#[test]
fn story_create_plan_orders_metallb_before_ingress() {
    let plan = build(&raw(), CompositionOptions::default())
        .unwrap()
        .plan_create();

    let metallb = plan.position(&ResourceId::subsystem("metallb")).unwrap();
    let ingress = plan
        .position(&ResourceId::subsystem("ingress-nginx"))
        .unwrap();
    assert!(metallb < ingress);
    assert!(plan.steps[metallb].wave < plan.steps[ingress].wave);

    // Every namespace precedes its subsystem
    for name in ["local-path-provisioner", "metallb", "ingress-nginx", "cert-manager"] {
        let ns = plan.position(&ResourceId::namespace(name)).unwrap();
        let sub = plan.position(&ResourceId::subsystem(name)).unwrap();
        assert!(plan.steps[ns].wave < plan.steps[sub].wave, "{name}");
    }
}

/// Story: Fixed policy values reach the descriptors untouched
#[test]
fn story_policy_defaults_are_preserved() {
    let foundation = build(&raw(), CompositionOptions::default()).unwrap();

    match &foundation
        .descriptor(SubsystemKind::StorageProvisioner)
        .unwrap()
        .parameters
    {
        SubsystemParameters::StorageProvisioner {
            path,
            reclaim_policy,
        } => {
            assert_eq!(path, "/srv/containers/k0s-volumes");
            assert_eq!(*reclaim_policy, ReclaimPolicy::Retain);
        }
        other => panic!("unexpected parameters: {other:?}"),
    }

    match &foundation
        .descriptor(SubsystemKind::CertificateManager)
        .unwrap()
        .parameters
    {
        SubsystemParameters::CertificateManager { acme_server, .. } => {
            assert_eq!(acme_server, "https://acme-v02.api.letsencrypt.org/directory")
        }
        other => panic!("unexpected parameters: {other:?}"),
    }
}

/// Story: Options are copied onto every namespace and subsystem
#[test]
fn story_options_propagate_to_every_child() {
    let options = CompositionOptions {
        protect: true,
        depends_on: BTreeSet::from([ResourceRef::new("cluster/k0s")]),
        ..Default::default()
    };
    let foundation = build(&raw(), options.clone()).unwrap();

    for ns in foundation.namespaces() {
        assert!(ns.protect);
        assert_eq!(ns.external_dependencies, options.depends_on);
    }
    for descriptor in foundation.subsystems() {
        assert!(descriptor.protect);
        assert_eq!(descriptor.external_dependencies, options.depends_on);
    }
}

// =============================================================================
// Configuration failures
// =============================================================================

/// Story: Each missing required key is named, and nothing is declared
#[test]
fn story_missing_field_aborts_build() {
    for key in [
        LOAD_BALANCER_ADDRESSES_KEY,
        INGRESS_IP_KEY,
        CLOUDFLARE_API_TOKEN_KEY,
    ] {
        let mut inputs = raw();
        inputs.remove(key);

        let err = build(&inputs, CompositionOptions::default()).unwrap_err();
        assert_eq!(
            err,
            Error::MissingConfiguration {
                field: key.to_string()
            }
        );
    }
}

// =============================================================================
// Secret handling
// =============================================================================

/// Story: The API token never shows up in diagnostics
#[test]
fn story_token_never_rendered() {
    let input = CompositionInput::build(&raw()).unwrap();
    let foundation = Foundation::new(&input, CompositionOptions::default()).unwrap();

    let mut rendered = vec![format!("{:?}", input), format!("{:?}", foundation)];
    rendered.push(serde_json::to_string(&input).unwrap());
    for descriptor in foundation.subsystems() {
        rendered.push(format!("{:?}", descriptor));
        rendered.push(serde_json::to_string(descriptor).unwrap());
    }

    for text in rendered {
        assert!(!text.contains("tok-abc"), "token leaked: {text}");
    }

    // The engine still receives the real value
    match &foundation
        .descriptor(SubsystemKind::CertificateManager)
        .unwrap()
        .parameters
    {
        SubsystemParameters::CertificateManager {
            cloudflare_api_token,
            ..
        } => assert_eq!(cloudflare_api_token.expose(), "tok-abc"),
        other => panic!("unexpected parameters: {other:?}"),
    }
}

// =============================================================================
// Destruction
// =============================================================================

/// Story: Unprotected destruction removes dependents before dependencies
#[test]
fn story_destroy_in_reverse_dependency_order() {
    let plan = build(&raw(), CompositionOptions::default())
        .unwrap()
        .plan_destroy()
        .unwrap();
    assert_eq!(plan.steps.len(), 8);
    assert!(plan.steps.iter().all(|s| s.action == Action::Delete));

    let wave = |id: ResourceId| plan.steps[plan.position(&id).unwrap()].wave;
    let metallb = wave(ResourceId::subsystem("metallb"));

    assert!(wave(ResourceId::subsystem("ingress-nginx")) < metallb);
    assert!(wave(ResourceId::subsystem("cert-manager")) < metallb);

    // No namespace goes while any subsystem is still being removed
    let last_subsystem = plan
        .steps
        .iter()
        .filter(|s| matches!(s.resource, ResourceId::Subsystem(_)))
        .map(|s| s.wave)
        .max()
        .unwrap();
    assert_eq!(last_subsystem, metallb);
    for name in ["local-path-provisioner", "metallb", "ingress-nginx", "cert-manager"] {
        assert!(
            metallb < wave(ResourceId::namespace(name)),
            "namespace/{name} must wait for metallb"
        );
    }
}

/// Story: Protection refuses destruction of the whole composition
#[test]
fn story_protected_composition_refuses_destroy() {
    let foundation = build(&raw(), protected()).unwrap();

    let err = foundation.plan_destroy().unwrap_err();
    assert!(matches!(err, Error::ProtectedDestructionRefused { .. }));
}

/// Story: Protection refuses destruction of any single child
#[test]
fn story_protected_children_refuse_destroy() {
    let foundation = build(&raw(), protected()).unwrap();

    for id in foundation.plan_create().resources() {
        let err = foundation.plan_destroy_resource(id).unwrap_err();
        assert_eq!(err, Error::protected(id.to_string()));
    }
}

/// Story: Removing MetalLB takes the ingress controller with it
#[test]
fn story_destroying_metallb_cascades_to_ingress() {
    let foundation = build(&raw(), CompositionOptions::default()).unwrap();

    let plan = foundation
        .plan_destroy_resource(&ResourceId::subsystem("metallb"))
        .unwrap();
    assert_eq!(
        plan.resources(),
        vec![
            &ResourceId::subsystem("ingress-nginx"),
            &ResourceId::subsystem("metallb"),
        ]
    );
}

// =============================================================================
// Updates
// =============================================================================

/// Story: Changing the address pool updates only MetalLB
#[test]
fn story_pool_change_updates_only_metallb() {
    let before = build(&raw(), CompositionOptions::default()).unwrap();
    let after = build(
        &raw().with(LOAD_BALANCER_ADDRESSES_KEY, "10.0.0.0/24"),
        CompositionOptions::default(),
    )
    .unwrap();

    let plan = before.plan_update(&after).unwrap();
    assert_eq!(plan.steps.len(), 1);
    assert_eq!(plan.steps[0].action, Action::Update);
    assert_eq!(plan.steps[0].resource, ResourceId::subsystem("metallb"));
}

/// Story: Rotating the token updates cert-manager, even when protected
#[test]
fn story_token_rotation_updates_cert_manager() {
    let before = build(&raw(), protected()).unwrap();
    let after = build(
        &raw().with(CLOUDFLARE_API_TOKEN_KEY, "tok-def"),
        protected(),
    )
    .unwrap();

    let plan = before.plan_update(&after).unwrap();
    assert_eq!(plan.resources(), vec![&ResourceId::subsystem("cert-manager")]);
}

/// Story: Dropping a subsystem from a protected composition is refused
#[test]
fn story_protected_update_cannot_remove_subsystems() {
    let input = CompositionInput::build(&raw()).unwrap();
    let without_cert_manager = |options: CompositionOptions| {
        Foundation::with_subsystems(
            NamespaceAllocator::default(),
            vec![
                Box::new(LocalPathProvisioner::new()),
                Box::new(Metallb::from_input(&input)),
                Box::new(IngressNginx::from_input(&input)),
            ],
            options,
        )
        .unwrap()
    };

    let before = Foundation::new(&input, protected()).unwrap();
    let err = before
        .plan_update(&without_cert_manager(protected()))
        .unwrap_err();
    assert!(matches!(err, Error::ProtectedDestructionRefused { .. }));

    // Without protection the same change deletes cert-manager, subsystem first
    let before = Foundation::new(&input, CompositionOptions::default()).unwrap();
    let plan = before
        .plan_update(&without_cert_manager(CompositionOptions::default()))
        .unwrap();
    assert_eq!(
        plan.resources(),
        vec![
            &ResourceId::subsystem("cert-manager"),
            &ResourceId::namespace("cert-manager"),
        ]
    );
    assert!(plan.steps.iter().all(|s| s.action == Action::Delete));
}

/// Story: Renaming namespaces replaces them instead of updating in place
#[test]
fn story_namespace_rename_is_a_replacement() {
    let input = CompositionInput::build(&raw()).unwrap();
    let renamed = |options: CompositionOptions| {
        Foundation::with_subsystems(
            NamespaceAllocator::new("platform").unwrap(),
            foundation_infra::default_subsystems(&input),
            options,
        )
        .unwrap()
    };

    let before = Foundation::new(&input, protected()).unwrap();
    let err = before.plan_update(&renamed(protected())).unwrap_err();
    assert!(matches!(err, Error::ProtectedDestructionRefused { .. }));

    let before = Foundation::new(&input, CompositionOptions::default()).unwrap();
    let plan = before
        .plan_update(&renamed(CompositionOptions::default()))
        .unwrap();
    assert!(plan.steps.iter().all(|s| s.action != Action::Update));

    let deletes = plan.steps.iter().filter(|s| s.action == Action::Delete).count();
    let creates = plan.steps.iter().filter(|s| s.action == Action::Create).count();
    assert_eq!((deletes, creates), (8, 8));

    // Old resources are gone before any replacement is created
    let last_delete = plan.steps.iter().rposition(|s| s.action == Action::Delete).unwrap();
    let first_create = plan.steps.iter().position(|s| s.action == Action::Create).unwrap();
    assert!(last_delete < first_create);
}

// =============================================================================
// Extension
// =============================================================================

/// An adapter gated on an arbitrary set of kinds
#[derive(Debug)]
struct Gated {
    name: &'static str,
    kind: SubsystemKind,
    gates: Vec<SubsystemKind>,
}

impl Subsystem for Gated {
    fn kind(&self) -> SubsystemKind {
        self.kind
    }

    fn logical_name(&self) -> &str {
        self.name
    }

    fn gates(&self) -> &[SubsystemKind] {
        &self.gates
    }

    fn parameters(&self) -> SubsystemParameters {
        SubsystemParameters::StorageProvisioner {
            path: "/tmp".to_string(),
            reclaim_policy: ReclaimPolicy::Delete,
        }
    }
}

/// Story: Mutually gated adapters are rejected before anything is declared
#[test]
fn story_cycle_between_custom_adapters() {
    let adapters: Vec<Box<dyn Subsystem>> = vec![
        Box::new(Gated {
            name: "alpha",
            kind: SubsystemKind::StorageProvisioner,
            gates: vec![SubsystemKind::CertificateManager],
        }),
        Box::new(Gated {
            name: "beta",
            kind: SubsystemKind::CertificateManager,
            gates: vec![SubsystemKind::StorageProvisioner],
        }),
    ];

    let err = Foundation::with_subsystems(
        NamespaceAllocator::default(),
        adapters,
        CompositionOptions::default(),
    )
    .unwrap_err();
    match err {
        Error::DependencyCycle { stuck } => {
            assert_eq!(stuck, vec!["subsystem/alpha", "subsystem/beta"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Story: Ingress without a load-balancer has nothing to wait for
#[test]
fn story_gate_on_missing_subsystem() {
    let input = CompositionInput::build(&raw()).unwrap();
    let err = Foundation::with_subsystems(
        NamespaceAllocator::default(),
        vec![
            Box::new(IngressNginx::from_input(&input)),
            Box::new(CertManager::from_input(&input)),
        ],
        CompositionOptions::default(),
    )
    .unwrap_err();

    assert_eq!(
        err,
        Error::UnknownDependency {
            subsystem: "ingress-nginx".to_string(),
            dependency: "LoadBalancer".to_string(),
        }
    );
}

/// Story: Two adapters claiming the same namespace are rejected
#[test]
fn story_namespace_collision() {
    let err = Foundation::with_subsystems(
        NamespaceAllocator::default(),
        vec![
            Box::new(LocalPathProvisioner::new()),
            Box::new(LocalPathProvisioner::new()),
        ],
        CompositionOptions::default(),
    )
    .unwrap_err();

    assert_eq!(
        err,
        Error::NamespaceCollision {
            physical_name: "infra-foundation-local-path-provisioner".to_string()
        }
    );
}

/// Story: A fifth subsystem joins without touching the orchestrator
#[test]
fn story_extra_subsystem_is_wired_generically() {
    let input = CompositionInput::build(&raw()).unwrap();
    let mut adapters = foundation_infra::default_subsystems(&input);
    adapters.push(Box::new(Gated {
        name: "external-dns",
        kind: SubsystemKind::StorageProvisioner,
        gates: vec![SubsystemKind::IngressController],
    }));

    let foundation = Foundation::with_subsystems(
        NamespaceAllocator::default(),
        adapters,
        CompositionOptions::default(),
    )
    .unwrap();

    assert_eq!(foundation.namespaces().len(), 5);
    assert_eq!(foundation.creation_waves().len(), 4);
    let extra = foundation
        .subsystems()
        .iter()
        .find(|d| d.resource_name == "external-dns")
        .unwrap();
    assert!(extra.waits_for(SubsystemKind::IngressController));
    assert_eq!(extra.namespace.physical_name, "infra-foundation-external-dns");
}
