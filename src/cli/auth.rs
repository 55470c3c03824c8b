//! CLI command handlers for login, batch and accounts.

use std::io::{self, Stdout, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::auth::{
    redact, AccountStore, Approver, AuthError, DeviceAuthorization, JsonAccountStore,
};
use crate::config::DevgrantConfig;
use crate::flow::DeviceGrantFlow;

use super::{AccountsArgs, BatchArgs, LoginArgs};

/// Writes the verification URL and user code for a human to approve.
#[derive(Debug)]
pub struct ConsoleApprover<W = Stdout> {
    out: Mutex<W>,
}

impl ConsoleApprover<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleApprover<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> Approver for ConsoleApprover<W> {
    async fn approve(&self, authorization: &DeviceAuthorization) -> Result<(), AuthError> {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "🔗 Visit: {}", authorization.approval_url())
            .and_then(|_| writeln!(out, "📋 Enter code: {}", authorization.user_code))
            .and_then(|_| writeln!(out, "⏳ Waiting for authorization..."))
            .and_then(|_| out.flush())
            .map_err(|err| AuthError::Approval(format!("failed to show user code: {err}")))
    }
}

fn store_for(config: &DevgrantConfig, results: Option<PathBuf>) -> Arc<JsonAccountStore> {
    Arc::new(JsonAccountStore::new(
        results.unwrap_or_else(|| config.results_path.clone()),
    ))
}

/// Handle `devgrant login`.
pub async fn handle_login(
    mut config: DevgrantConfig,
    args: LoginArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.no_chain {
        config.chain_enabled = false;
    }
    let store = store_for(&config, args.results);
    let flow = DeviceGrantFlow::new(config).with_store(store.clone());

    let outcome = flow.run(&ConsoleApprover::stdout()).await?;
    println!("✅ Token issued (expires in {}s)", outcome.tokens.expires_in);
    match &outcome.chained {
        Some(chained) => println!(
            "✅ Chained token issued (expires in {}s)",
            chained.tokens.expires_in
        ),
        None if flow.config().chain_enabled => {
            println!("⚠️  Chained token not obtained; the first token is still usable")
        }
        None => {}
    }
    println!("💾 Saved to {}", store.path().display());
    Ok(())
}

/// Handle `devgrant batch`.
pub async fn handle_batch(
    mut config: DevgrantConfig,
    args: BatchArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.no_chain {
        config.chain_enabled = false;
    }
    if let Some(workers) = args.workers {
        config.max_workers = workers.max(1);
    }
    if let Some(interval_ms) = args.interval_ms {
        config.batch_interval_ms = interval_ms;
    }
    let store = store_for(&config, args.results);
    let flow = DeviceGrantFlow::new(config).with_store(store);

    let summary = flow.run_batch(args.count, Arc::new(ConsoleApprover::stdout())).await;
    println!("📊 Batch finished");
    println!("   Total: {}", summary.total);
    println!("   Succeeded: {}", summary.succeeded());
    println!("   Failed: {}", summary.failed());
    println!("   Success rate: {:.1}%", summary.success_rate() * 100.0);
    for (index, err) in &summary.failures {
        eprintln!("   ❌ #{index}: {err}");
    }
    Ok(())
}

/// Handle `devgrant accounts`.
pub async fn handle_accounts(
    config: DevgrantConfig,
    args: AccountsArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = store_for(&config, args.results);
    let records = store.load_all()?;
    if records.is_empty() {
        println!("No saved accounts in {}", store.path().display());
        return Ok(());
    }
    println!("🔐 Saved accounts ({})\n", records.len());
    for record in records {
        let registered = record
            .registered_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let chained = if record.chained_refresh_token.is_some() {
            "✅"
        } else {
            "-"
        };
        println!(
            "  {} client={} refresh={} chained={chained} registered={registered}",
            record.provider,
            redact(&record.client_id),
            redact(&record.refresh_token),
        );
    }
    Ok(())
}
