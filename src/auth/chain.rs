//! Second-stage token exchange that reuses a first-stage access token as a
//! bearer credential and approves the second device code programmatically.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::approver::Approver;
use super::credential::ClientCredential;
use super::device_code::DeviceAuthorization;
use super::error::AuthError;
use super::oidc::OidcClient;
use super::poller::{DeviceTokenPoller, PollPolicy};
use super::token::{redact, TokenPair};
use crate::config::RealmConfig;

pub const DEFAULT_PORTAL_BASE_URL: &str = "https://portal.sso.us-east-1.amazonaws.com";

/// Opaque, single-use session token minted from a bearer access token.
#[derive(Clone, PartialEq, Eq)]
pub struct BridgeSessionToken(String);

impl BridgeSessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BridgeSessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BridgeSessionToken")
            .field(&redact(&self.0))
            .finish()
    }
}

/// Device context returned when a user code is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContext {
    pub device_context_id: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_type: Option<String>,
}

/// Credential and tokens minted by the chained exchange.
#[derive(Debug, Clone)]
pub struct ChainedTokens {
    pub credential: ClientCredential,
    pub tokens: TokenPair,
}

/// Mints a second token pair for another realm from a first-stage token.
///
/// # Example
/// ```no_run
/// use devgrant::auth::ChainedTokenExchanger;
/// use devgrant::config::RealmConfig;
///
/// let exchanger = ChainedTokenExchanger::new(reqwest::Client::new(), RealmConfig::default());
/// ```
#[derive(Debug, Clone)]
pub struct ChainedTokenExchanger {
    client: reqwest::Client,
    portal_base_url: String,
    realm: RealmConfig,
    oidc: OidcClient,
    policy: PollPolicy,
}

impl ChainedTokenExchanger {
    pub fn new(client: reqwest::Client, realm: RealmConfig) -> Self {
        let oidc = OidcClient::with_client(client.clone(), realm.oidc_base_url.clone());
        Self {
            client,
            portal_base_url: DEFAULT_PORTAL_BASE_URL.to_string(),
            realm,
            oidc,
            policy: PollPolicy::chained(),
        }
    }

    pub fn with_portal_base_url(mut self, url: impl Into<String>) -> Self {
        self.portal_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the exchange, logging and discarding any failure.
    ///
    /// The first-stage token stays valid whatever happens here.
    pub async fn exchange(&self, first_stage: &TokenPair) -> Option<ChainedTokens> {
        match self.try_exchange(first_stage).await {
            Ok(chained) => Some(chained),
            Err(err) => {
                warn!(
                    stage = ?err.stage(),
                    error = %err,
                    "Chained token exchange aborted"
                );
                None
            }
        }
    }

    /// Run the six exchange steps in order, stopping at the first failure.
    pub async fn try_exchange(&self, first_stage: &TokenPair) -> Result<ChainedTokens, AuthError> {
        let bearer = first_stage.access_token.as_str();

        info!(step = 1, "Verifying bearer identity");
        self.verify_identity(bearer).await?;

        info!(step = 2, "Creating device session");
        let session = self.create_session(bearer).await?;

        info!(step = 3, issuer = %self.realm.start_url, "Registering chained client");
        let credential = self
            .oidc
            .register(
                &self.realm.client_name,
                &self.realm.scopes,
                &self.realm.grant_types,
                &self.realm.start_url,
            )
            .await?;

        info!(step = 4, "Starting chained device authorization");
        let authorization = self.oidc.initiate(&credential).await?;

        info!(step = 5, user_code = %authorization.user_code, "Approving chained user code");
        let approver = SessionBridgeApprover {
            oidc: self.oidc.clone(),
            session,
            client_id: credential.client_id.clone(),
            referer: origin_of(&self.realm.start_url),
        };
        approver.approve(&authorization).await?;

        info!(step = 6, "Polling for chained token");
        let poller = DeviceTokenPoller::new(self.oidc.clone(), self.policy.clone());
        let tokens = poller.poll(&credential, authorization).await?;

        Ok(ChainedTokens { credential, tokens })
    }

    async fn verify_identity(&self, bearer: &str) -> Result<(), AuthError> {
        let resp = self
            .client
            .get(self.portal_endpoint("token/whoAmI"))
            .bearer_auth(bearer)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::IdentityVerification {
                status: status.as_u16(),
                body,
            });
        }
        debug!("Bearer identity verified");
        Ok(())
    }

    async fn create_session(&self, bearer: &str) -> Result<BridgeSessionToken, AuthError> {
        let resp = self
            .client
            .post(self.portal_endpoint("session/device"))
            .bearer_auth(bearer)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::SessionCreation(format!(
                "status {}: {body}",
                status.as_u16()
            )));
        }
        let payload: SessionResponse = resp.json().await.map_err(|err| {
            AuthError::SessionCreation(format!("invalid session response: {err}"))
        })?;
        match payload.token {
            Some(token) if !token.is_empty() => Ok(BridgeSessionToken::new(token)),
            _ => Err(AuthError::SessionCreation(
                "session response missing token".to_string(),
            )),
        }
    }

    fn portal_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.portal_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Approves a device authorization on behalf of the session owner.
struct SessionBridgeApprover {
    oidc: OidcClient,
    session: BridgeSessionToken,
    client_id: String,
    referer: String,
}

impl SessionBridgeApprover {
    async fn accept_user_code(&self, user_code: &str) -> Result<DeviceContext, AuthError> {
        let resp = self
            .oidc
            .http()
            .post(self.oidc.endpoint("device_authorization/accept_user_code"))
            .header("Referer", &self.referer)
            .json(&AcceptUserCodeRequest {
                user_code,
                user_session_id: self.session.as_str(),
            })
            .send()
            .await?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::UserCodeAcceptance(format!(
                "status {}: {body}",
                status.as_u16()
            )));
        }
        let payload: AcceptUserCodeResponse = resp.json().await.map_err(|err| {
            AuthError::UserCodeAcceptance(format!("invalid accept response: {err}"))
        })?;
        payload.device_context.ok_or_else(|| {
            AuthError::UserCodeAcceptance("response missing deviceContext".to_string())
        })
    }

    async fn associate_token(&self, context: DeviceContext) -> Result<(), AuthError> {
        let context = DeviceContext {
            client_id: context
                .client_id
                .filter(|id| !id.is_empty())
                .or_else(|| Some(self.client_id.clone())),
            client_type: context
                .client_type
                .filter(|kind| !kind.is_empty())
                .or_else(|| Some("public".to_string())),
            ..context
        };
        let resp = self
            .oidc
            .http()
            .post(self.oidc.endpoint("device_authorization/associate_token"))
            .header("Referer", &self.referer)
            .json(&AssociateTokenRequest {
                device_context: &context,
                user_session_id: self.session.as_str(),
            })
            .send()
            .await?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::TokenAssociation(format!(
                "status {}: {body}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Approver for SessionBridgeApprover {
    async fn approve(&self, authorization: &DeviceAuthorization) -> Result<(), AuthError> {
        let context = self.accept_user_code(&authorization.user_code).await?;
        debug!(device_context_id = %context.device_context_id, "User code accepted");
        self.associate_token(context).await?;
        debug!("Device authorization approved");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcceptUserCodeRequest<'a> {
    user_code: &'a str,
    user_session_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptUserCodeResponse {
    device_context: Option<DeviceContext>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssociateTokenRequest<'a> {
    device_context: &'a DeviceContext,
    user_session_id: &'a str,
}

/// Serialized origin of `url` with a trailing slash, or `url` unchanged when
/// it does not parse to a tuple origin.
fn origin_of(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) if parsed.origin().is_tuple() => {
            format!("{}/", parsed.origin().ascii_serialization())
        }
        _ => url.to_string(),
    }
}
