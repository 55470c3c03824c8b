//! Convenience re-exports for common use.

pub use crate::auth::{
    Approver, AuthError, AuthStage, ChainedTokenExchanger, ChainedTokens, ClientCredential,
    DeviceAuthorization, DeviceTokenPoller, NoopApprover, OidcClient, PollPolicy, TokenPair,
};
pub use crate::config::{DevgrantConfig, RealmConfig};
pub use crate::error::{DevgrantError, Result};
pub use crate::flow::{BatchSummary, DeviceGrantFlow, FlowOutcome};
