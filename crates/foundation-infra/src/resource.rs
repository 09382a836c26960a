//! Resource identity and the options every child resource inherits

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use foundation_common::Error;

/// Opaque handle to a resource outside this composition
///
/// The composition never inspects it; it is only copied onto children so the
/// reconciliation engine waits for it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceRef(String);

impl ResourceRef {
    /// Wrap an external resource handle
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The handle as given
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a resource declared by the composition
///
/// Both variants are keyed by the subsystem's logical name, so a namespace
/// and the subsystem living in it share a name but not an identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceId {
    /// The namespace allocated for a subsystem
    Namespace(String),
    /// The subsystem itself
    Subsystem(String),
}

impl ResourceId {
    /// Id of the namespace for the given logical name
    pub fn namespace(logical_name: impl Into<String>) -> Self {
        Self::Namespace(logical_name.into())
    }

    /// Id of the subsystem with the given logical name
    pub fn subsystem(logical_name: impl Into<String>) -> Self {
        Self::Subsystem(logical_name.into())
    }

    /// Logical subsystem name this resource belongs to
    pub fn logical_name(&self) -> &str {
        match self {
            Self::Namespace(name) | Self::Subsystem(name) => name,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Namespace(name) => write!(f, "namespace/{}", name),
            Self::Subsystem(name) => write!(f, "subsystem/{}", name),
        }
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some(("namespace", name)) if !name.is_empty() => Ok(Self::namespace(name)),
            Some(("subsystem", name)) if !name.is_empty() => Ok(Self::subsystem(name)),
            _ => Err(Error::UnknownResource {
                resource: s.to_string(),
            }),
        }
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Options copied onto every namespace and subsystem of a composition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildOptions {
    /// Deletion-protection
    pub protect: bool,
    /// Resources outside the composition that must exist first
    pub external_dependencies: BTreeSet<ResourceRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_display_round_trips() {
        for id in [ResourceId::namespace("metallb"), ResourceId::subsystem("metallb")] {
            assert_eq!(id.to_string().parse::<ResourceId>().unwrap(), id);
        }
    }

    #[test]
    fn namespace_and_subsystem_are_distinct() {
        assert_ne!(ResourceId::namespace("metallb"), ResourceId::subsystem("metallb"));
        assert_eq!(ResourceId::namespace("metallb").logical_name(), "metallb");
    }

    #[test]
    fn unknown_resource_id_prefix() {
        assert!("deployment/metallb".parse::<ResourceId>().is_err());
        assert!("metallb".parse::<ResourceId>().is_err());
        assert!("namespace/".parse::<ResourceId>().is_err());
    }
}
