//! devgrant: OAuth2 device authorization grant client
//!
//! Registers a public OIDC client, starts a device authorization, hands the
//! user code to an [`auth::Approver`], then polls the token endpoint under the
//! `authorization_pending` / `slow_down` protocol. A successful first-stage
//! token can optionally bootstrap a second token pair for another realm
//! without further human interaction.
//!
//! # Quick Start
//!
//! ```no_run
//! use devgrant::auth::NoopApprover;
//! use devgrant::config::DevgrantConfig;
//! use devgrant::flow::DeviceGrantFlow;
//!
//! # async fn example() -> devgrant::error::Result<()> {
//! let flow = DeviceGrantFlow::new(DevgrantConfig::from_env()?);
//! let outcome = flow.run(&NoopApprover).await?;
//! println!("expires in {}s", outcome.tokens.expires_in);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod flow;
pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
