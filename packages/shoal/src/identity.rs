//! Pluggable identity gating
//!
//! Identity provisioning lives in an external provider; clients arrive with
//! an asserted display name and, optionally, a token. The relay's default
//! posture is to trust the assertion as-is. Deployments that want a gate can
//! require a pre-shared token on the WS handshake. Either way the `user`
//! field on individual messages is never re-checked — that trust gap is part
//! of the protocol, not an oversight.

use serde::Deserialize;
use std::sync::Arc;

use crate::config::AuthConfig;

/// Connect-time claim carried on the WS handshake query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityClaim {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

pub trait Verifier: Send + Sync {
    /// Decide whether a connect-time claim is acceptable.
    fn verify(&self, claim: &IdentityClaim) -> bool;
}

/// Trust whatever the client asserts (the default posture).
pub struct AcceptAsserted;

impl Verifier for AcceptAsserted {
    fn verify(&self, _claim: &IdentityClaim) -> bool {
        true
    }
}

/// Require a pre-shared token on the handshake.
pub struct SharedToken {
    token: String,
}

impl SharedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Verifier for SharedToken {
    fn verify(&self, claim: &IdentityClaim) -> bool {
        claim.token.as_deref() == Some(self.token.as_str())
    }
}

/// Pick the verifier the config asks for. `required = true` without a
/// configured token still means accept-all, since there is nothing to check
/// against — the server logs this at startup.
pub fn verifier_from_config(auth: &AuthConfig) -> Arc<dyn Verifier> {
    match (&auth.required, &auth.token) {
        (true, Some(token)) => Arc::new(SharedToken::new(token.clone())),
        _ => Arc::new(AcceptAsserted),
    }
}
