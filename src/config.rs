//! Stack configuration loading
//!
//! Reads a stack file in stack-config shape:
//!
//! ```yaml
//! config:
//!   foundation:loadBalancerAddresses: 10.0.0.10-10.0.0.20
//!   foundation:ingressIp: 10.0.0.10
//!   foundation:cloudflareApiToken: tok-abc
//!   foundation:baseDomain: example.com
//! ```
//!
//! Resolution order (highest priority first):
//! 1. `--set key=value` overrides
//! 2. `CLOUDFLARE_API_TOKEN` / `--cloudflare-api-token`
//! 3. The stack file
//!
//! Every value lands in [`RawInputs`] and is only parsed when the
//! composition input is built.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use foundation_common::{Error as CompositionError, Secret};
use foundation_infra::config::CLOUDFLARE_API_TOKEN_KEY;
use foundation_infra::{
    CompositionInput, CompositionOptions, RawInputs, ReadinessMode, ResourceRef, StackExports,
};

use crate::{Error, Result};

/// Deletion-protection for the composition and every child
pub const PROTECT_KEY: &str = "protect";
/// Readiness definition used for cross-subsystem gates
pub const READINESS_KEY: &str = "readiness";
/// Comma-separated external resources the composition depends on
pub const DEPENDS_ON_KEY: &str = "dependsOn";

/// On-disk document; intentionally not `Debug` since it holds plaintext values
#[derive(Deserialize, Default)]
struct StackDocument {
    #[serde(default)]
    config: BTreeMap<String, Value>,
}

/// Resolved stack configuration
#[derive(Debug, Clone, Default)]
pub struct StackConfig {
    raw: RawInputs,
    source: Option<PathBuf>,
}

impl StackConfig {
    /// Load a stack file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut config = Self::from_yaml(&data).map_err(|e| match e {
            Error::Yaml { source, .. } => Error::yaml(path, source),
            other => other,
        })?;
        config.source = Some(path.to_path_buf());
        debug!(path = %path.display(), keys = config.raw.keys().count(), "Loaded stack file");
        Ok(config)
    }

    /// Parse a stack document
    pub fn from_yaml(data: &str) -> Result<Self> {
        let document: StackDocument = if data.trim().is_empty() {
            StackDocument::default()
        } else {
            serde_yaml::from_str(data).map_err(|e| Error::yaml("<inline>", e))?
        };

        let mut raw = RawInputs::new();
        for (key, value) in document.config {
            if let Some(scalar) = scalar(&key, value)? {
                raw.insert(&key, scalar);
            }
        }

        Ok(Self { raw, source: None })
    }

    /// File the configuration was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Raw values after overrides
    pub fn raw(&self) -> &RawInputs {
        &self.raw
    }

    /// Replace the DNS provider token
    pub fn set_cloudflare_api_token(&mut self, token: Secret) {
        self.raw.insert(CLOUDFLARE_API_TOKEN_KEY, token);
    }

    /// Apply `key=value` overrides in order
    pub fn apply_overrides<S: AsRef<str>>(&mut self, overrides: &[S]) -> Result<()> {
        for entry in overrides {
            let entry = entry.as_ref();
            let (key, value) = entry
                .split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .ok_or_else(|| Error::InvalidOverride(key_only(entry)))?;
            debug!(key = key.trim(), "Applying override");
            self.raw.insert(key.trim(), value);
        }
        Ok(())
    }

    /// Validated composition input
    pub fn input(&self) -> Result<CompositionInput> {
        Ok(CompositionInput::build(&self.raw)?)
    }

    /// Composition-wide options; absent keys take defaults
    pub fn options(&self) -> Result<CompositionOptions> {
        let protect = self.raw.get_bool(PROTECT_KEY)?.unwrap_or(false);
        let readiness = match self.raw.get(READINESS_KEY) {
            Some(mode) => mode.parse::<ReadinessMode>()?,
            None => ReadinessMode::default(),
        };
        let depends_on = self
            .raw
            .get(DEPENDS_ON_KEY)
            .into_iter()
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ResourceRef::new)
            .collect();

        Ok(CompositionOptions {
            protect,
            depends_on,
            readiness,
        })
    }

    /// Values re-exported alongside the composition
    pub fn exports(&self, input: &CompositionInput) -> Result<StackExports> {
        Ok(StackExports::build(&self.raw, input)?)
    }
}

/// Render a scalar YAML value as a string; nulls count as unset
fn scalar(key: &str, value: Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Mapping(map) if map.contains_key("secure") => {
            Err(CompositionError::invalid_config(
                key,
                "encrypted values are not supported; supply the value via --set or the environment",
            )
            .into())
        }
        Value::Tagged(tagged) => scalar(key, tagged.value),
        _ => Err(CompositionError::invalid_config(key, "expected a scalar value").into()),
    }
}

/// The part of an override safe to echo back
fn key_only(entry: &str) -> String {
    entry.split('=').next().unwrap_or_default().to_string()
}
