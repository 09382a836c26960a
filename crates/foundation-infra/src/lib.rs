//! Foundation infrastructure composition
//!
//! Decides what a baseline cluster needs (storage provisioning,
//! load-balancing, ingress and certificates), in what order, with what
//! inputs, and in which namespaces. Applying the result is left to the
//! reconciliation engine.
//!
//! # Public API
//!
//! - [`config::RawInputs`], [`config::CompositionInput`]: configuration surface
//! - [`namespace::NamespaceAllocator`]: per-subsystem namespace derivation
//! - [`subsystem::Subsystem`]: adapter capability, with the four standard
//!   adapters under [`subsystem`]
//! - [`sequence::DependencyGraph`]: creation/deletion wave ordering
//! - [`composition::Foundation`]: the orchestrator and its lifecycle plans

#![deny(missing_docs)]

pub mod composition;
pub mod config;
pub mod namespace;
pub mod resource;
pub mod sequence;
pub mod subsystem;

pub use composition::{
    default_subsystems, Action, CompositionOptions, Foundation, FoundationOutputs,
    NamespaceDeclaration, Plan, PlanStep,
};
pub use config::{AddressPool, CompositionInput, RawInputs, StackExports};
pub use namespace::{NamespaceAllocator, NamespaceHandle};
pub use resource::{ChildOptions, ResourceId, ResourceRef};
pub use subsystem::{
    ReadinessMode, ReadinessSignal, Subsystem, SubsystemDescriptor, SubsystemKind,
    SubsystemParameters,
};
