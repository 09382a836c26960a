//! Common types for Foundation: errors, secrets, constants, and telemetry

#![deny(missing_docs)]

pub mod error;
pub mod secret;
pub mod telemetry;

pub use error::Error;
pub use secret::Secret;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Composition Constants
// =============================================================================
// Policy values of the foundation composition. Callers needing different
// values extend the composition input rather than overriding these.

/// Resource name of the composition itself
pub const COMPOSITION_NAME: &str = "foundation";

/// Component type token reported for the composition
pub const COMPONENT_TYPE: &str = "infra:foundation:Foundation";

/// Prefix prepended to every subsystem namespace (`infra-foundation-metallb`)
pub const NAMESPACE_PREFIX: &str = "infra-foundation";

/// ACME directory used by cert-manager issuers (Let's Encrypt v2 production)
pub const LETSENCRYPT_PRODUCTION_DIRECTORY: &str =
    "https://acme-v02.api.letsencrypt.org/directory";

/// Host path backing volumes created by the local-path provisioner
pub const LOCAL_PATH_STORAGE_DIR: &str = "/srv/containers/k0s-volumes";

/// Maximum length of a Kubernetes namespace name (RFC 1123 label)
pub const MAX_NAMESPACE_LENGTH: usize = 63;
