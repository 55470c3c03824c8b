mod auth_support;

use std::time::{Duration, Instant};

use chrono::Utc;
use devgrant::auth::{AuthError, AuthStage, DeviceTokenPoller, OidcClient, PollPolicy};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_support::{authorization, credential, fast_policy, oidc_error, token_body};

fn poller(server: &MockServer, policy: PollPolicy) -> DeviceTokenPoller {
    DeviceTokenPoller::new(
        OidcClient::new(server.uri()).expect("oidc client"),
        policy,
    )
}

#[tokio::test]
async fn pending_twice_then_issued_returns_tokens_after_three_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(oidc_error("authorization_pending"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "X",
            "refreshToken": "Y",
            "expiresIn": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = poller(&server, fast_policy(10))
        .poll(&credential("client-1"), authorization("device-1"))
        .await
        .expect("tokens issued");

    assert_eq!(tokens.access_token, "X");
    assert_eq!(tokens.refresh_token, "Y");
    assert_eq!(tokens.expires_in, 3600);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn always_pending_times_out_after_exact_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(oidc_error("authorization_pending"))
        .expect(4)
        .mount(&server)
        .await;

    let result = poller(&server, fast_policy(4))
        .poll(&credential("client-1"), authorization("device-1"))
        .await;

    assert!(matches!(result, Err(AuthError::PollTimeout { attempts: 4 })));
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn access_denied_stops_after_first_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(oidc_error("access_denied"))
        .expect(1)
        .mount(&server)
        .await;

    let result = poller(&server, fast_policy(10))
        .poll(&credential("client-1"), authorization("device-1"))
        .await;

    let err = result.expect_err("denied");
    assert_eq!(err.stage(), Some(AuthStage::Poll));
    assert_eq!(err.server_code(), Some("access_denied"));
    assert!(matches!(err, AuthError::PollDenied { .. }));
}

#[tokio::test]
async fn expired_token_and_unknown_codes_surface_unchanged() {
    for code in ["expired_token", "invalid_grant", "some_future_error"] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": code,
                "error_description": "server said no"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = poller(&server, fast_policy(10))
            .poll(&credential("client-1"), authorization("device-1"))
            .await;

        match result {
            Err(AuthError::PollDenied {
                code: returned,
                description,
            }) => {
                assert_eq!(returned, code);
                assert_eq!(description.as_deref(), Some("server said no"));
            }
            other => panic!("expected PollDenied for {code}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn slow_down_increases_wait_before_next_poll() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(oidc_error("slow_down"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a", "r")))
        .mount(&server)
        .await;

    let policy = PollPolicy::builder()
        .max_attempts(5)
        .base_interval(Duration::from_millis(10))
        .slow_down_increment(Duration::from_millis(100))
        .build();
    let started = Instant::now();
    poller(&server, policy)
        .poll(&credential("client-1"), authorization("device-1"))
        .await
        .expect("tokens issued");

    // Waits of 110ms then 210ms before the third request.
    assert!(started.elapsed() >= Duration::from_millis(320));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn server_errors_are_retried_within_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("<html>bad gateway</html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a", "r")))
        .mount(&server)
        .await;

    let tokens = poller(&server, fast_policy(3))
        .poll(&credential("client-1"), authorization("device-1"))
        .await
        .expect("tokens after transient failures");

    assert_eq!(tokens.access_token, "a");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn server_errors_exhaust_the_same_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let result = poller(&server, fast_policy(3))
        .poll(&credential("client-1"), authorization("device-1"))
        .await;

    assert!(matches!(result, Err(AuthError::PollTimeout { attempts: 3 })));
}

#[tokio::test]
async fn transport_failures_count_against_budget() {
    // Nothing listens on port 1.
    let oidc = OidcClient::with_timeout("http://127.0.0.1:1", Duration::from_millis(500))
        .expect("oidc client");
    let result = DeviceTokenPoller::new(oidc, fast_policy(2))
        .poll(&credential("client-1"), authorization("device-1"))
        .await;

    assert!(matches!(result, Err(AuthError::PollTimeout { attempts: 2 })));
}

#[tokio::test]
async fn expired_authorization_is_never_polled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a", "r")))
        .expect(0)
        .mount(&server)
        .await;

    let mut expired = authorization("device-1");
    expired.expires_at = Utc::now() - chrono::Duration::seconds(1);
    let result = poller(&server, fast_policy(5))
        .poll(&credential("client-1"), expired)
        .await;

    assert!(matches!(result, Err(AuthError::DeviceCodeExpired)));
}

#[tokio::test]
async fn token_request_carries_device_code_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_partial_json(json!({
            "clientId": "client-1",
            "clientSecret": "client-1-secret",
            "grantType": "urn:ietf:params:oauth:grant-type:device_code",
            "deviceCode": "device-42"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a", "r")))
        .expect(1)
        .mount(&server)
        .await;

    poller(&server, fast_policy(1))
        .poll(&credential("client-1"), authorization("device-42"))
        .await
        .expect("tokens issued");
}

#[tokio::test]
async fn token_arriving_after_expiry_is_discarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("late-access", "late-refresh"))
                .set_delay(Duration::from_millis(400)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut expiring = authorization("device-1");
    expiring.expires_at = Utc::now() + chrono::Duration::milliseconds(150);
    let result = poller(&server, fast_policy(5))
        .poll(&credential("client-1"), expiring)
        .await;

    assert!(matches!(result, Err(AuthError::DeviceCodeExpired)));
}
