//! Error types for the foundation composition
//!
//! Every variant aborts composition construction (or a lifecycle plan) as a
//! whole. Messages carry the offending field or resource but never secret
//! material.

use thiserror::Error;

/// Main error type for foundation operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A required top-level input was absent
    #[error("missing required configuration: {field}")]
    MissingConfiguration {
        /// Configuration key that was not supplied
        field: String,
    },

    /// A required input was present but malformed
    #[error("invalid configuration for {field}: {message}")]
    InvalidConfiguration {
        /// Configuration key holding the bad value
        field: String,
        /// Description of what's invalid
        message: String,
    },

    /// Namespace derivation produced an illegal identifier
    #[error("invalid namespace name '{logical_name}': {reason}")]
    InvalidName {
        /// Logical subsystem name the namespace was derived from
        logical_name: String,
        /// Which naming rule was violated
        reason: String,
    },

    /// Two subsystems derived the same namespace
    #[error("namespace {physical_name} is already allocated in this composition")]
    NamespaceCollision {
        /// The duplicated physical namespace name
        physical_name: String,
    },

    /// A subsystem is gated on a subsystem that is not part of the composition
    #[error("subsystem {subsystem} depends on unregistered subsystem {dependency}")]
    UnknownDependency {
        /// The gated subsystem
        subsystem: String,
        /// The missing upstream subsystem
        dependency: String,
    },

    /// Declared dependencies form a cycle
    #[error("dependency cycle detected, cannot order: {}", stuck.join(", "))]
    DependencyCycle {
        /// Resources that could not be placed in any creation wave
        stuck: Vec<String>,
    },

    /// Destruction was requested while deletion-protection is set
    #[error("refusing to destroy {resource}: composition is protected")]
    ProtectedDestructionRefused {
        /// The resource whose destruction was requested
        resource: String,
    },

    /// A lifecycle operation referenced a resource outside the composition
    #[error("resource {resource} is not part of this composition")]
    UnknownResource {
        /// The unknown resource id
        resource: String,
    },
}

impl Error {
    /// Create a missing-configuration error for the given key
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingConfiguration {
            field: field.into(),
        }
    }

    /// Create an invalid-configuration error for the given key
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-name error
    pub fn invalid_name(logical_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            logical_name: logical_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a protection refusal for the given resource
    pub fn protected(resource: impl Into<String>) -> Self {
        Self::ProtectedDestructionRefused {
            resource: resource.into(),
        }
    }

    /// Whether this error was raised while validating configuration input
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingConfiguration { .. } | Self::InvalidConfiguration { .. }
        )
    }
}
