use serde::{Deserialize, Serialize};

/// Token pair issued by the token endpoint.
///
/// # Example
/// ```no_run
/// use devgrant::auth::TokenPair;
///
/// let tokens = TokenPair {
///     access_token: "access".to_string(),
///     refresh_token: "refresh".to_string(),
///     expires_in: 3600,
///     id_token: None,
///     token_type: Some("Bearer".to_string()),
/// };
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("expires_in", &self.expires_in)
            .field("id_token", &self.id_token.as_deref().map(redact))
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Shorten a secret for logs and terminal output.
pub fn redact(secret: &str) -> String {
    const VISIBLE: usize = 8;
    if secret.chars().count() <= VISIBLE {
        return "***".to_string();
    }
    let prefix: String = secret.chars().take(VISIBLE).collect();
    format!("{prefix}...")
}
