#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use devgrant::auth::{
    Approver, AuthError, ClientCredential, DeviceAuthorization, PollPolicy,
    DEVICE_CODE_GRANT_TYPE, REFRESH_TOKEN_GRANT_TYPE,
};
use devgrant::config::{DevgrantConfig, PollSettings, RealmConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const START_URL: &str = "https://view.awsapps.com/start";

/// Approver that records every user code it is shown.
#[derive(Default)]
pub struct ScriptedApprover {
    seen: Mutex<Vec<String>>,
    fail_with: Option<String>,
}

impl ScriptedApprover {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("approver lock poisoned").clone()
    }
}

#[async_trait]
impl Approver for ScriptedApprover {
    async fn approve(&self, authorization: &DeviceAuthorization) -> Result<(), AuthError> {
        self.seen
            .lock()
            .expect("approver lock poisoned")
            .push(authorization.user_code.clone());
        match &self.fail_with {
            Some(message) => Err(AuthError::Approval(message.clone())),
            None => Ok(()),
        }
    }
}

pub fn scopes() -> Vec<String> {
    vec![
        "codewhisperer:completions".to_string(),
        "codewhisperer:conversations".to_string(),
    ]
}

pub fn grant_types() -> Vec<String> {
    vec![
        DEVICE_CODE_GRANT_TYPE.to_string(),
        REFRESH_TOKEN_GRANT_TYPE.to_string(),
    ]
}

pub fn credential(client_id: &str) -> ClientCredential {
    ClientCredential {
        client_id: client_id.to_string(),
        client_secret: format!("{client_id}-secret"),
        scopes: scopes().into_iter().collect::<BTreeSet<_>>(),
        grant_types: grant_types().into_iter().collect::<BTreeSet<_>>(),
        issuer_url: START_URL.to_string(),
    }
}

pub fn authorization(device_code: &str) -> DeviceAuthorization {
    DeviceAuthorization {
        device_code: device_code.to_string(),
        user_code: "ABCD-EFGH".to_string(),
        verification_uri: format!("{START_URL}/#/device"),
        verification_uri_complete: None,
        expires_at: Utc::now() + chrono::Duration::minutes(10),
        poll_interval: Duration::from_millis(10),
    }
}

/// Millisecond-scale policy so tests do not sleep for real seconds.
pub fn fast_policy(max_attempts: u32) -> PollPolicy {
    PollPolicy::builder()
        .max_attempts(max_attempts)
        .base_interval(Duration::from_millis(10))
        .slow_down_increment(Duration::from_millis(40))
        .build()
}

pub fn token_body(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "accessToken": access,
        "refreshToken": refresh,
        "expiresIn": 3600,
        "tokenType": "Bearer"
    })
}

pub fn oidc_error(code: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({ "error": code }))
}

pub async fn mount_register(server: &MockServer, client_id: &str) {
    Mock::given(method("POST"))
        .and(path("/client/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clientId": client_id,
            "clientSecret": format!("{client_id}-secret"),
            "clientIdIssuedAt": 1_700_000_000,
            "clientSecretExpiresAt": 1_800_000_000
        })))
        .mount(server)
        .await;
}

pub async fn mount_register_named(server: &MockServer, client_name: &str, client_id: &str) {
    Mock::given(method("POST"))
        .and(path("/client/register"))
        .and(body_partial_json(json!({ "clientName": client_name })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clientId": client_id,
            "clientSecret": format!("{client_id}-secret")
        })))
        .mount(server)
        .await;
}

pub async fn mount_device_authorization(server: &MockServer, client_id: &str, device_code: &str) {
    Mock::given(method("POST"))
        .and(path("/device_authorization"))
        .and(body_partial_json(json!({ "clientId": client_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deviceCode": device_code,
            "userCode": format!("{device_code}-USER"),
            "verificationUri": "https://device.sso.us-east-1.amazonaws.com/",
            "expiresIn": 600,
            "interval": 1
        })))
        .mount(server)
        .await;
}

pub async fn mount_token_success(server: &MockServer, device_code: &str, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_partial_json(json!({ "deviceCode": device_code })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access, refresh)))
        .mount(server)
        .await;
}

/// Config pointing every realm and the portal at `server`.
pub fn test_config(server: &MockServer) -> DevgrantConfig {
    let realm = RealmConfig {
        oidc_base_url: server.uri(),
        start_url: START_URL.to_string(),
        client_name: "devgrant-test".to_string(),
        scopes: scopes(),
        grant_types: grant_types(),
    };
    let fast = PollSettings {
        max_attempts: 5,
        interval_secs: Some(0),
        slow_down_increment_secs: 0,
    };
    DevgrantConfig {
        realm: realm.clone(),
        chained_realm: RealmConfig {
            client_name: "devgrant-chained-test".to_string(),
            ..realm
        },
        portal_base_url: server.uri(),
        poll: fast.clone(),
        chained_poll: fast,
        http_timeout_secs: 5,
        chain_enabled: false,
        max_workers: 2,
        batch_interval_ms: 0,
        results_path: std::path::PathBuf::from("unused.json"),
    }
}

pub async fn request_count(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}
