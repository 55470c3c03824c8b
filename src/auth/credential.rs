use std::collections::BTreeSet;

use super::token::redact;

pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
pub const REFRESH_TOKEN_GRANT_TYPE: &str = "refresh_token";

/// Public OIDC client registered against one authorization server.
///
/// Created once per server per run and never persisted by the flow itself.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredential {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: BTreeSet<String>,
    pub grant_types: BTreeSet<String>,
    pub issuer_url: String,
}

impl ClientCredential {
    pub fn supports_device_code(&self) -> bool {
        self.grant_types.contains(DEVICE_CODE_GRANT_TYPE)
    }
}

impl std::fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredential")
            .field("client_id", &redact(&self.client_id))
            .field("client_secret", &"***")
            .field("scopes", &self.scopes)
            .field("grant_types", &self.grant_types)
            .field("issuer_url", &self.issuer_url)
            .finish()
    }
}
