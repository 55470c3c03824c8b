use std::time::Duration;

use chrono::{DateTime, Utc};

use super::TokenPair;

/// Cadence used when the server omits `interval`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Lifetime assumed when the server omits `expiresIn`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 600;

/// Device authorization returned by the initiator.
///
/// The poller takes this by value, so a device code can only back a single
/// polling session.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use devgrant::auth::DeviceAuthorization;
/// use chrono::Utc;
///
/// let authorization = DeviceAuthorization {
///     device_code: "device-code".to_string(),
///     user_code: "ABCD-EFGH".to_string(),
///     verification_uri: "https://view.awsapps.com/start/#/device".to_string(),
///     verification_uri_complete: None,
///     expires_at: Utc::now() + chrono::Duration::minutes(10),
///     poll_interval: Duration::from_secs(3),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub poll_interval: Duration,
}

impl DeviceAuthorization {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Verification URL with the user code filled in.
    pub fn approval_url(&self) -> String {
        match &self.verification_uri_complete {
            Some(url) => url.clone(),
            None => {
                let separator = if self.verification_uri.contains('?') {
                    '&'
                } else {
                    '?'
                };
                format!(
                    "{}{separator}user_code={}",
                    self.verification_uri, self.user_code
                )
            }
        }
    }
}

/// Outcome of a single token request for a device code.
#[derive(Debug, Clone)]
pub enum DeviceCodePoll {
    /// HTTP 200 with a token payload.
    Issued { tokens: TokenPair },
    /// HTTP 400 `authorization_pending`.
    Pending,
    /// HTTP 400 `slow_down`.
    SlowDown,
    /// HTTP 400 with any other error code.
    Rejected {
        code: String,
        description: Option<String>,
    },
    /// Any other status, or a 400 body that could not be decoded.
    Transient { status: u16 },
}
