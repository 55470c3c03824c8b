//! OAuth device-authorization grant: client registration, device codes,
//! approval, token polling, chained exchange and result storage.

pub mod approver;
pub mod chain;
pub mod credential;
pub mod device_code;
pub mod error;
pub mod oidc;
pub mod poller;
pub mod store;
pub mod token;

pub use approver::{Approver, NoopApprover};
pub use chain::{BridgeSessionToken, ChainedTokenExchanger, ChainedTokens, DeviceContext};
pub use credential::{ClientCredential, DEVICE_CODE_GRANT_TYPE, REFRESH_TOKEN_GRANT_TYPE};
pub use device_code::{DeviceAuthorization, DeviceCodePoll};
pub use error::{AuthError, AuthStage};
pub use oidc::OidcClient;
pub use poller::{DeviceTokenPoller, PollPolicy};
pub use store::{AccountRecord, AccountStore, JsonAccountStore};
pub use token::{redact, TokenPair};
