//! cert-manager adapter
//!
//! Issues certificates from the Let's Encrypt production directory, solving
//! DNS-01 challenges with the Cloudflare API token. The token stays wrapped
//! in [`Secret`] all the way into the descriptor.

use foundation_common::{Secret, LETSENCRYPT_PRODUCTION_DIRECTORY};

use crate::config::CompositionInput;

use super::{Subsystem, SubsystemKind, SubsystemParameters};

/// Logical name of the certificate manager
pub const CERT_MANAGER_NAME: &str = "cert-manager";

/// Certificate manager with an ACME DNS-01 solver
#[derive(Debug, Clone)]
pub struct CertManager {
    cloudflare_api_token: Secret,
    acme_server: String,
}

impl CertManager {
    /// Certificate manager against the production ACME directory
    pub fn new(cloudflare_api_token: Secret) -> Self {
        Self {
            cloudflare_api_token,
            acme_server: LETSENCRYPT_PRODUCTION_DIRECTORY.to_string(),
        }
    }

    /// Narrow the composition input to the API token
    pub fn from_input(input: &CompositionInput) -> Self {
        Self::new(input.cloudflare_api_token.clone())
    }
}

impl Subsystem for CertManager {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::CertificateManager
    }

    fn logical_name(&self) -> &str {
        CERT_MANAGER_NAME
    }

    fn parameters(&self) -> SubsystemParameters {
        SubsystemParameters::CertificateManager {
            cloudflare_api_token: self.cloudflare_api_token.clone(),
            acme_server: self.acme_server.clone(),
        }
    }
}
