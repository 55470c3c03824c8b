//! Token endpoint polling under the device-grant backoff protocol.

use std::time::Duration;

use bon::Builder;
use tracing::{debug, info, warn};

use super::credential::ClientCredential;
use super::device_code::{DeviceAuthorization, DeviceCodePoll};
use super::error::AuthError;
use super::oidc::OidcClient;
use super::token::TokenPair;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 40;
pub const DEFAULT_SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Attempt budget and cadence for one polling session.
///
/// `base_interval` overrides the interval advertised by the device
/// authorization when set.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use devgrant::auth::PollPolicy;
///
/// let policy = PollPolicy::builder()
///     .max_attempts(20)
///     .base_interval(Duration::from_secs(1))
///     .build();
/// assert_eq!(policy.max_attempts, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct PollPolicy {
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
    pub base_interval: Option<Duration>,
    #[builder(default = DEFAULT_SLOW_DOWN_INCREMENT)]
    pub slow_down_increment: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PollPolicy {
    /// Policy for the second-stage realm: 20 attempts at a 1s cadence.
    pub fn chained() -> Self {
        Self::builder()
            .max_attempts(20)
            .base_interval(Duration::from_secs(1))
            .build()
    }

    pub fn initial_interval(&self, authorization: &DeviceAuthorization) -> Duration {
        self.base_interval.unwrap_or(authorization.poll_interval)
    }

    /// Interval to use after a `slow_down` response.
    pub fn backoff(&self, current: Duration) -> Duration {
        current + self.slow_down_increment
    }
}

/// Polls the token endpoint until a token is issued, the server rejects the
/// device code, or the attempt budget runs out.
#[derive(Debug, Clone)]
pub struct DeviceTokenPoller {
    oidc: OidcClient,
    policy: PollPolicy,
}

impl DeviceTokenPoller {
    pub fn new(oidc: OidcClient, policy: PollPolicy) -> Self {
        Self { oidc, policy }
    }

    /// Poll with the device code of `authorization`.
    ///
    /// `authorization_pending` waits the current interval, `slow_down` grows
    /// it by the policy increment, any other 400 error code ends the session
    /// with [`AuthError::PollDenied`]. Other statuses and transport failures
    /// are retried and count against `max_attempts`.
    pub async fn poll(
        &self,
        credential: &ClientCredential,
        authorization: DeviceAuthorization,
    ) -> Result<TokenPair, AuthError> {
        let max_attempts = self.policy.max_attempts;
        if max_attempts == 0 {
            return Err(AuthError::InvalidArgument(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        let mut interval = self.policy.initial_interval(&authorization);

        for attempt in 1..=max_attempts {
            if authorization.is_expired() {
                warn!(attempt, "Device code expired while polling");
                return Err(AuthError::DeviceCodeExpired);
            }

            match self
                .oidc
                .request_token(credential, &authorization.device_code)
                .await
            {
                Ok(DeviceCodePoll::Issued { .. }) if authorization.is_expired() => {
                    warn!(attempt, "Token arrived after the device code expired");
                    return Err(AuthError::DeviceCodeExpired);
                }
                Ok(DeviceCodePoll::Issued { tokens }) => {
                    info!(attempt, max_attempts, "Token issued");
                    return Ok(tokens);
                }
                Ok(DeviceCodePoll::Pending) => {
                    debug!(attempt, max_attempts, "Authorization pending");
                }
                Ok(DeviceCodePoll::SlowDown) => {
                    interval = self.policy.backoff(interval);
                    debug!(
                        attempt,
                        interval_ms = interval.as_millis() as u64,
                        "Server asked to slow down"
                    );
                }
                Ok(DeviceCodePoll::Rejected { code, description }) => {
                    warn!(attempt, code = %code, "Token request rejected");
                    return Err(AuthError::PollDenied { code, description });
                }
                Ok(DeviceCodePoll::Transient { status }) => {
                    warn!(attempt, status, "Unexpected token endpoint status, retrying");
                }
                Err(err) if err.is_transient() => {
                    warn!(attempt, error = %err, "Token request failed, retrying");
                }
                Err(err) => return Err(err),
            }

            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        warn!(max_attempts, "Token polling attempt budget exhausted");
        Err(AuthError::PollTimeout {
            attempts: max_attempts,
        })
    }
}
