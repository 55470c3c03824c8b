use strum::{Display, EnumString};
use thiserror::Error;

/// Stage of the device-grant flow an [`AuthError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AuthStage {
    Registration,
    Initiation,
    Approval,
    Poll,
    Chain,
}

/// Errors raised by the device-grant flow, tagged by stage.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Client registration failed with status {status}: {body}")]
    Registration { status: u16, body: String },
    #[error("Device authorization failed with status {status}: {body}")]
    AuthorizationInitiation { status: u16, body: String },
    #[error("Approval failed: {0}")]
    Approval(String),
    #[error("Token polling timed out after {attempts} attempts")]
    PollTimeout { attempts: u32 },
    #[error("Token request rejected: {code}")]
    PollDenied {
        code: String,
        description: Option<String>,
    },
    #[error("Device code expired before a token was issued")]
    DeviceCodeExpired,
    #[error("Identity verification failed with status {status}: {body}")]
    IdentityVerification { status: u16, body: String },
    #[error("Session creation failed: {0}")]
    SessionCreation(String),
    #[error("User code acceptance failed: {0}")]
    UserCodeAcceptance(String),
    #[error("Token association failed: {0}")]
    TokenAssociation(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// Stage of the flow this error aborted.
    ///
    /// Transport, decoding and argument errors can surface from any stage
    /// and return `None`.
    pub fn stage(&self) -> Option<AuthStage> {
        match self {
            Self::Registration { .. } => Some(AuthStage::Registration),
            Self::AuthorizationInitiation { .. } => Some(AuthStage::Initiation),
            Self::Approval(_) => Some(AuthStage::Approval),
            Self::PollTimeout { .. } | Self::PollDenied { .. } | Self::DeviceCodeExpired => {
                Some(AuthStage::Poll)
            }
            Self::IdentityVerification { .. }
            | Self::SessionCreation(_)
            | Self::UserCodeAcceptance(_)
            | Self::TokenAssociation(_) => Some(AuthStage::Chain),
            Self::InvalidArgument(_)
            | Self::InvalidResponse(_)
            | Self::Network(_)
            | Self::Serialization(_) => None,
        }
    }

    /// Whether the poller may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::InvalidResponse(_))
    }

    /// Server error code carried by a denial, if any.
    pub fn server_code(&self) -> Option<&str> {
        match self {
            Self::PollDenied { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
