//! Namespace allocation for subsystems
//!
//! Each subsystem gets its own namespace named `<prefix>-<logical name>`.
//! Allocation is a pure function of the prefix and the logical name, so
//! repeated builds of the same composition converge on identical names.

use serde::Serialize;

use foundation_common::{Error, Result, MAX_NAMESPACE_LENGTH, NAMESPACE_PREFIX};

/// A namespace assigned to one subsystem
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceHandle {
    /// Subsystem-level name (`metallb`)
    pub logical_name: String,
    /// Name of the namespace in the cluster (`infra-foundation-metallb`)
    pub physical_name: String,
}

/// Derives namespace names scoped to one composition instance
#[derive(Debug, Clone)]
pub struct NamespaceAllocator {
    prefix: String,
}

impl Default for NamespaceAllocator {
    fn default() -> Self {
        Self {
            prefix: NAMESPACE_PREFIX.to_string(),
        }
    }
}

impl NamespaceAllocator {
    /// Create an allocator with a custom prefix
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_dns_label(&prefix, false)
            .map_err(|reason| Error::invalid_name(&prefix, reason))?;
        Ok(Self { prefix })
    }

    /// The prefix prepended to every namespace
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derive the namespace for a logical subsystem name
    pub fn allocate(&self, logical_name: &str) -> Result<NamespaceHandle> {
        validate_dns_label(logical_name, true)
            .map_err(|reason| Error::invalid_name(logical_name, reason))?;

        let physical_name = format!("{}-{}", self.prefix, logical_name);
        if physical_name.len() > MAX_NAMESPACE_LENGTH {
            return Err(Error::invalid_name(
                logical_name,
                format!(
                    "namespace {} exceeds {} characters",
                    physical_name, MAX_NAMESPACE_LENGTH
                ),
            ));
        }

        Ok(NamespaceHandle {
            logical_name: logical_name.to_string(),
            physical_name,
        })
    }
}

/// Validate an RFC 1123 label fragment.
///
/// Rules:
/// - Must not be empty
/// - Must start with a lowercase letter, or a digit when `allow_leading_digit`
/// - May contain lowercase letters, digits, and hyphens
/// - Must not end with a hyphen
fn validate_dns_label(s: &str, allow_leading_digit: bool) -> std::result::Result<(), String> {
    if s.is_empty() {
        return Err("name cannot be empty".to_string());
    }

    let mut chars = s.chars();

    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        Some(c) if allow_leading_digit && c.is_ascii_digit() => {}
        _ if allow_leading_digit => {
            return Err("name must start with a lowercase letter or digit".to_string())
        }
        _ => return Err("name must start with a lowercase letter".to_string()),
    }

    if chars.any(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-') {
        return Err("name must be lowercase alphanumeric with hyphens".to_string());
    }

    if s.ends_with('-') {
        return Err("name cannot end with hyphen".to_string());
    }

    Ok(())
}
