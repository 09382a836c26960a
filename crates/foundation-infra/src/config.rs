//! Configuration surface for the foundation composition
//!
//! [`RawInputs`] is the untyped key/value bag supplied by the caller (stack
//! file, flags, environment). [`CompositionInput::build`] validates it into
//! the typed, immutable input the orchestrator threads down to adapters.
//!
//! Required keys are checked in a fixed order and the first missing one
//! aborts the build. Values in the raw bag are held as [`Secret`] until read,
//! so nothing in it renders in diagnostics regardless of classification.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use tracing::warn;

use foundation_common::{Error, Result, Secret};

/// Address range handed to MetalLB
pub const LOAD_BALANCER_ADDRESSES_KEY: &str = "loadBalancerAddresses";
/// Address requested for the ingress controller service
pub const INGRESS_IP_KEY: &str = "ingressIp";
/// DNS provider token used by cert-manager for ACME DNS-01 challenges
pub const CLOUDFLARE_API_TOKEN_KEY: &str = "cloudflareApiToken";
/// Base domain re-exported for downstream stacks
pub const BASE_DOMAIN_KEY: &str = "baseDomain";

/// Untyped configuration values keyed by name
///
/// Keys may be bare (`ingressIp`) or project-qualified
/// (`foundation:ingressIp`); the qualifier is dropped on insert.
#[derive(Clone, Default)]
pub struct RawInputs {
    values: BTreeMap<String, Secret>,
}

impl RawInputs {
    /// Create an empty input bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: &str, value: impl Into<Secret>) {
        self.values.insert(normalize_key(key).to_string(), value.into());
    }

    /// Builder-style [`RawInputs::insert`]
    pub fn with(mut self, key: &str, value: impl Into<Secret>) -> Self {
        self.insert(key, value);
        self
    }

    /// Remove a value, returning whether it was present
    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(normalize_key(key)).is_some()
    }

    /// Read a plain value; empty strings count as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(normalize_key(key))
            .map(Secret::expose)
            .filter(|v| !v.is_empty())
    }

    /// Read a required plain value
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| Error::missing(key))
    }

    /// Read a required secret value
    pub fn require_secret(&self, key: &str) -> Result<Secret> {
        self.values
            .get(normalize_key(key))
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| Error::missing(key))
    }

    /// Read an optional boolean (`true`/`false`)
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key)
            .map(|v| {
                v.parse::<bool>()
                    .map_err(|_| Error::invalid_config(key, "expected true or false"))
            })
            .transpose()
    }

    /// Configured keys, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Debug for RawInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawInputs")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize_key(key: &str) -> &str {
    key.rsplit_once(':').map_or(key, |(_, bare)| bare)
}

/// Validated composition input
///
/// Immutable once built. Adapters receive only the fields they need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionInput {
    /// Address pool managed by the bare-metal load-balancer
    pub load_balancer_addresses: AddressPool,
    /// Address the ingress controller requests from the pool
    pub ingress_ip: IpAddr,
    /// DNS provider token for certificate challenges
    pub cloudflare_api_token: Secret,
}

impl CompositionInput {
    /// Validate raw inputs
    ///
    /// Presence of every required key is checked first, in order, so a
    /// missing key is always reported ahead of a malformed one.
    pub fn build(raw: &RawInputs) -> Result<Self> {
        let addresses = raw.require(LOAD_BALANCER_ADDRESSES_KEY)?;
        let ingress_ip = raw.require(INGRESS_IP_KEY)?;
        let token = raw.require_secret(CLOUDFLARE_API_TOKEN_KEY)?;

        Self::new(addresses, ingress_ip, token)
    }

    /// Validate already-extracted values
    pub fn new(addresses: &str, ingress_ip: &str, token: impl Into<Secret>) -> Result<Self> {
        let load_balancer_addresses: AddressPool = addresses.parse()?;
        let ingress_ip: IpAddr = ingress_ip.trim().parse().map_err(|_| {
            Error::invalid_config(INGRESS_IP_KEY, format!("'{}' is not an IP address", ingress_ip))
        })?;
        let cloudflare_api_token = token.into();
        if cloudflare_api_token.is_empty() {
            return Err(Error::missing(CLOUDFLARE_API_TOKEN_KEY));
        }

        if !load_balancer_addresses.contains(ingress_ip) {
            warn!(
                ingress_ip = %ingress_ip,
                pool = %load_balancer_addresses,
                "Ingress IP is outside the load-balancer pool; MetalLB will not assign it"
            );
        }

        Ok(Self {
            load_balancer_addresses,
            ingress_ip,
            cloudflare_api_token,
        })
    }
}

/// Plain values re-exported to downstream consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackExports {
    /// Base domain applications are published under
    pub base_domain: String,
    /// Address the ingress controller serves on
    pub ingress_ip: IpAddr,
}

impl StackExports {
    /// Read the base domain and pair it with the validated ingress address
    pub fn build(raw: &RawInputs, input: &CompositionInput) -> Result<Self> {
        let base_domain = raw.require(BASE_DOMAIN_KEY)?.trim().trim_end_matches('.');

        let valid_label = |label: &str| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        };
        if !base_domain.split('.').all(valid_label) {
            return Err(Error::invalid_config(
                BASE_DOMAIN_KEY,
                format!("'{}' is not a valid lowercase DNS name", base_domain),
            ));
        }

        Ok(Self {
            base_domain: base_domain.to_string(),
            ingress_ip: input.ingress_ip,
        })
    }
}

/// One entry of a MetalLB address pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRange {
    /// Inclusive range `start-end`
    Range {
        /// First address
        start: IpAddr,
        /// Last address
        end: IpAddr,
    },
    /// CIDR block `network/prefix`
    Cidr {
        /// Network address
        network: IpAddr,
        /// Prefix length
        prefix: u8,
    },
}

impl AddressRange {
    /// Whether the address falls inside this entry
    pub fn contains(&self, ip: IpAddr) -> bool {
        match *self {
            AddressRange::Range { start, end } => match (ordinal(start), ordinal(ip), ordinal(end)) {
                ((fs, s), (fi, i), (_, e)) if fs == fi => s <= i && i <= e,
                _ => false,
            },
            AddressRange::Cidr { network, prefix } => {
                let (family_net, net) = ordinal(network);
                let (family_ip, addr) = ordinal(ip);
                if family_net != family_ip {
                    return false;
                }
                let host_bits = u32::from(family_net.bits().saturating_sub(prefix));
                let mask = u128::MAX.checked_shl(host_bits).unwrap_or(0);
                net & mask == addr & mask
            }
        }
    }
}

impl FromStr for AddressRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some((network, prefix)) = s.split_once('/') {
            let network: IpAddr = network
                .trim()
                .parse()
                .map_err(|_| format!("'{}' is not a valid CIDR network", s))?;
            let prefix: u8 = prefix
                .trim()
                .parse()
                .map_err(|_| format!("'{}' has an invalid prefix length", s))?;
            if prefix > ordinal(network).0.bits() {
                return Err(format!("'{}' has an invalid prefix length", s));
            }
            return Ok(AddressRange::Cidr { network, prefix });
        }

        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("'{}' is neither a range (a-b) nor a CIDR", s))?;
        let start: IpAddr = start
            .trim()
            .parse()
            .map_err(|_| format!("'{}' has an invalid start address", s))?;
        let end: IpAddr = end
            .trim()
            .parse()
            .map_err(|_| format!("'{}' has an invalid end address", s))?;

        let (family_start, lo) = ordinal(start);
        let (family_end, hi) = ordinal(end);
        if family_start != family_end {
            return Err(format!("'{}' mixes IPv4 and IPv6", s));
        }
        if lo > hi {
            return Err(format!("'{}' ends before it starts", s));
        }

        Ok(AddressRange::Range { start, end })
    }
}

/// Address pool as given by the caller, plus its parsed entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPool {
    raw: String,
    ranges: Vec<AddressRange>,
}

impl AddressPool {
    /// The pool exactly as configured
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed pool entries
    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }

    /// Whether any entry contains the address
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.ranges.iter().any(|r| r.contains(ip))
    }
}

impl FromStr for AddressPool {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(Error::missing(LOAD_BALANCER_ADDRESSES_KEY));
        }

        let ranges = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| entry.parse::<AddressRange>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|message| Error::invalid_config(LOAD_BALANCER_ADDRESSES_KEY, message))?;
        if ranges.is_empty() {
            return Err(Error::invalid_config(
                LOAD_BALANCER_ADDRESSES_KEY,
                "pool has no address ranges",
            ));
        }

        Ok(Self {
            raw: raw.to_string(),
            ranges,
        })
    }
}

impl fmt::Display for AddressPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for AddressPool {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    V4,
    V6,
}

impl Family {
    fn bits(self) -> u8 {
        match self {
            Family::V4 => 32,
            Family::V6 => 128,
        }
    }
}

/// Address family and numeric value, right-aligned in a u128
fn ordinal(ip: IpAddr) -> (Family, u128) {
    match ip {
        IpAddr::V4(v4) => (Family::V4, u128::from(u32::from(v4))),
        IpAddr::V6(v6) => (Family::V6, u128::from(v6)),
    }
}
