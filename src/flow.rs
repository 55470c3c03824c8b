//! End-to-end account flow: register, initiate, approve, poll, then the
//! optional chained exchange. Batch mode runs independent flows in parallel.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::auth::{
    AccountRecord, AccountStore, Approver, ChainedTokenExchanger, ChainedTokens,
    ClientCredential, DeviceTokenPoller, OidcClient, TokenPair,
};
use crate::config::DevgrantConfig;
use crate::error::{DevgrantError, Result};

/// Result of a successful account flow.
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub run_id: Uuid,
    pub credential: ClientCredential,
    pub tokens: TokenPair,
    /// Absent when chaining is disabled or any chained step failed.
    pub chained: Option<ChainedTokens>,
}

/// Tally of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub outcomes: Vec<FlowOutcome>,
    pub failures: Vec<(usize, DevgrantError)>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Fraction of flows that produced a token, 0.0 for an empty batch.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded() as f64 / self.total as f64
    }
}

/// Drives device-grant flows with one configuration.
///
/// # Example
/// ```no_run
/// use devgrant::auth::NoopApprover;
/// use devgrant::config::DevgrantConfig;
/// use devgrant::flow::DeviceGrantFlow;
///
/// # async fn example() -> devgrant::error::Result<()> {
/// let flow = DeviceGrantFlow::new(DevgrantConfig::load(None)?);
/// let outcome = flow.run(&NoopApprover).await?;
/// println!("chained token: {}", outcome.chained.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DeviceGrantFlow {
    config: DevgrantConfig,
    store: Option<Arc<dyn AccountStore>>,
}

impl std::fmt::Debug for DeviceGrantFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceGrantFlow")
            .field("config", &self.config)
            .field("store", &self.store.as_ref().map(|_| ".."))
            .finish()
    }
}

impl DeviceGrantFlow {
    pub fn new(config: DevgrantConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    /// Persist every successful flow to `store`.
    pub fn with_store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &DevgrantConfig {
        &self.config
    }

    /// Run one account flow.
    ///
    /// Any first-stage failure aborts the flow and nothing is persisted. A
    /// chained-exchange failure only leaves [`FlowOutcome::chained`] empty.
    pub async fn run(&self, approver: &dyn Approver) -> Result<FlowOutcome> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id, approver)
            .instrument(info_span!("device_grant", run_id = %run_id))
            .await
    }

    async fn run_inner(&self, run_id: Uuid, approver: &dyn Approver) -> Result<FlowOutcome> {
        let config = &self.config;
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(crate::auth::AuthError::from)?;
        let oidc = OidcClient::with_client(client.clone(), config.realm.oidc_base_url.clone());

        let credential = oidc
            .register(
                &config.realm.client_name,
                &config.realm.scopes,
                &config.realm.grant_types,
                &config.realm.start_url,
            )
            .await?;
        let authorization = oidc.initiate(&credential).await?;

        info!(
            user_code = %authorization.user_code,
            verification_uri = %authorization.verification_uri,
            "Waiting for approval"
        );
        approver.approve(&authorization).await?;

        let poller = DeviceTokenPoller::new(oidc, config.poll.policy());
        let tokens = poller.poll(&credential, authorization).await?;

        let chained = if config.chain_enabled {
            ChainedTokenExchanger::new(client, config.chained_realm.clone())
                .with_portal_base_url(config.portal_base_url.clone())
                .with_poll_policy(config.chained_poll.policy())
                .exchange(&tokens)
                .await
        } else {
            None
        };

        let outcome = FlowOutcome {
            run_id,
            credential,
            tokens,
            chained,
        };
        self.persist(&outcome);
        Ok(outcome)
    }

    fn persist(&self, outcome: &FlowOutcome) {
        let Some(store) = &self.store else {
            return;
        };
        let record = AccountRecord::new(
            outcome.run_id,
            &outcome.credential,
            &outcome.tokens,
            outcome.chained.as_ref(),
        );
        if let Err(err) = store.append(&record) {
            warn!(error = %err, "Failed to persist account record");
        }
    }

    /// Run `count` independent flows, at most `max_workers` at a time.
    ///
    /// Consecutive launches are spaced by the configured batch interval.
    pub async fn run_batch(&self, count: usize, approver: Arc<dyn Approver>) -> BatchSummary {
        let workers = self.config.max_workers.max(1);
        let spacing = self.config.batch_interval();
        info!(
            count,
            workers,
            spacing_ms = spacing.as_millis() as u64,
            "Starting batch"
        );

        let results: Vec<(usize, Result<FlowOutcome>)> = stream::iter(1..=count)
            .then(move |index| async move {
                if index > 1 && !spacing.is_zero() {
                    tokio::time::sleep(spacing).await;
                }
                index
            })
            .map(|index| {
                let flow = self.clone();
                let approver = approver.clone();
                async move {
                    let handle = tokio::spawn(async move { flow.run(approver.as_ref()).await });
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(err) => Err(DevgrantError::from(err)),
                    };
                    (index, result)
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut summary = BatchSummary {
            total: count,
            ..BatchSummary::default()
        };
        for (index, result) in results {
            match result {
                Ok(outcome) => summary.outcomes.push(outcome),
                Err(err) => {
                    warn!(index, stage = ?err.stage(), error = %err, "Account flow failed");
                    summary.failures.push((index, err));
                }
            }
        }
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "Batch finished"
        );
        summary
    }
}
