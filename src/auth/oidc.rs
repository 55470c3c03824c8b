//! Client registration, device authorization and single token requests
//! against an SSO-OIDC authorization server.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::credential::{ClientCredential, DEVICE_CODE_GRANT_TYPE};
use super::device_code::{
    DeviceAuthorization, DeviceCodePoll, DEFAULT_EXPIRES_IN_SECS, DEFAULT_POLL_INTERVAL,
};
use super::error::AuthError;
use super::token::{redact, TokenPair};

pub const DEFAULT_OIDC_BASE_URL: &str = "https://oidc.us-east-1.amazonaws.com";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one SSO-OIDC realm.
///
/// Each flow owns its own instance; nothing is shared between flows.
///
/// # Example
/// ```no_run
/// use devgrant::auth::OidcClient;
///
/// let oidc = OidcClient::new("https://oidc.us-east-1.amazonaws.com")?;
/// # Ok::<(), devgrant::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct OidcClient {
    client: reqwest::Client,
    base_url: String,
}

impl OidcClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AuthError> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Register a public client. One request, never retried.
    pub async fn register(
        &self,
        client_name: &str,
        scopes: &[String],
        grant_types: &[String],
        issuer_url: &str,
    ) -> Result<ClientCredential, AuthError> {
        if scopes.is_empty() {
            return Err(AuthError::InvalidArgument(
                "at least one scope is required".to_string(),
            ));
        }
        if !grant_types.iter().any(|g| g == DEVICE_CODE_GRANT_TYPE) {
            return Err(AuthError::InvalidArgument(format!(
                "grant types must include {DEVICE_CODE_GRANT_TYPE}"
            )));
        }

        info!(issuer = issuer_url, client_name, "Registering OIDC client");
        let resp = self
            .client
            .post(self.endpoint("client/register"))
            .json(&RegisterClientRequest {
                client_name,
                client_type: "public",
                scopes,
                grant_types,
                issuer_url,
            })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Registration {
                status: status.as_u16(),
                body,
            });
        }
        let payload: RegisterClientResponse = resp.json().await?;
        debug!(client_id = %redact(&payload.client_id), "OIDC client registered");
        Ok(ClientCredential {
            client_id: payload.client_id,
            client_secret: payload.client_secret,
            scopes: scopes.iter().cloned().collect::<BTreeSet<_>>(),
            grant_types: grant_types.iter().cloned().collect::<BTreeSet<_>>(),
            issuer_url: issuer_url.to_string(),
        })
    }

    /// Start a device authorization for a registered client.
    pub async fn initiate(
        &self,
        credential: &ClientCredential,
    ) -> Result<DeviceAuthorization, AuthError> {
        info!(issuer = %credential.issuer_url, "Starting device authorization");
        let resp = self
            .client
            .post(self.endpoint("device_authorization"))
            .json(&DeviceAuthorizationRequest {
                client_id: &credential.client_id,
                client_secret: &credential.client_secret,
                start_url: &credential.issuer_url,
            })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::AuthorizationInitiation {
                status: status.as_u16(),
                body,
            });
        }
        let payload: DeviceAuthorizationResponse = resp.json().await?;
        let expires_in = payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = expiry_from_now(expires_in)?;
        let poll_interval = payload
            .interval
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let verification_uri = payload.verification_uri.unwrap_or_else(|| {
            format!("{}/#/device", credential.issuer_url.trim_end_matches('/'))
        });
        debug!(
            user_code = %payload.user_code,
            expires_in,
            interval_secs = poll_interval.as_secs(),
            "Device authorization started"
        );
        Ok(DeviceAuthorization {
            device_code: payload.device_code,
            user_code: payload.user_code,
            verification_uri,
            verification_uri_complete: payload.verification_uri_complete,
            expires_at,
            poll_interval,
        })
    }

    /// Issue one device-code token request and classify the response.
    ///
    /// Transport failures and undecodable 200 bodies are returned as errors;
    /// every HTTP response is mapped to a [`DeviceCodePoll`].
    pub async fn request_token(
        &self,
        credential: &ClientCredential,
        device_code: &str,
    ) -> Result<DeviceCodePoll, AuthError> {
        let resp = self
            .client
            .post(self.endpoint("token"))
            .json(&DeviceTokenRequest {
                client_id: &credential.client_id,
                client_secret: &credential.client_secret,
                grant_type: DEVICE_CODE_GRANT_TYPE,
                device_code,
            })
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => {
                let tokens: TokenPair = resp.json().await?;
                Ok(DeviceCodePoll::Issued { tokens })
            }
            StatusCode::BAD_REQUEST => {
                let body = resp.text().await.unwrap_or_default();
                let Ok(error) = serde_json::from_str::<OidcErrorResponse>(&body) else {
                    return Ok(DeviceCodePoll::Transient { status: 400 });
                };
                Ok(match error.error.as_str() {
                    "authorization_pending" => DeviceCodePoll::Pending,
                    "slow_down" => DeviceCodePoll::SlowDown,
                    _ => DeviceCodePoll::Rejected {
                        code: error.error,
                        description: error.error_description,
                    },
                })
            }
            other => Ok(DeviceCodePoll::Transient {
                status: other.as_u16(),
            }),
        }
    }
}

/// `now + expires_in`, rejecting lifetimes chrono cannot represent.
fn expiry_from_now(expires_in: u64) -> Result<DateTime<Utc>, AuthError> {
    i64::try_from(expires_in)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| {
            AuthError::InvalidResponse(format!("expiresIn {expires_in} is out of range"))
        })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterClientRequest<'a> {
    client_name: &'a str,
    client_type: &'a str,
    scopes: &'a [String],
    grant_types: &'a [String],
    issuer_url: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterClientResponse {
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceAuthorizationRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    start_url: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceAuthorizationResponse {
    device_code: String,
    user_code: String,
    verification_uri: Option<String>,
    verification_uri_complete: Option<String>,
    expires_in: Option<u64>,
    interval: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceTokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    device_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct OidcErrorResponse {
    error: String,
    #[serde(default, alias = "errorDescription")]
    error_description: Option<String>,
}
