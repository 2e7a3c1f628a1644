//! Radbill Admin - back-office batch runner for the subscription engine
//!
//! Loads the engine configuration (settings and plan catalog), reads a JSON
//! batch of back-office commands, runs each one through the lifecycle engine
//! against an in-memory store, and prints one JSON result line per command.
//!
//! # Usage
//!
//! ```text
//! RADBILL_CONFIG=radbill.toml radbill-admin batch.json
//! LOG_FORMAT=json RUST_LOG=info,audit=info radbill-admin < batch.json
//! ```
//!
//! Without a batch path the commands are read from stdin.

mod commands;
mod observability;

use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use radbill_engine::{EngineConfig, LifecycleEngine, store::MemoryStore};
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use crate::{
    commands::{Command, execute},
    observability::{LogFormat, init_observability},
};

/// Config file used when `RADBILL_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "radbill.toml";

#[tokio::main]
async fn main() -> ExitCode {
    init_observability(LogFormat::from_env());

    match run().await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            info!(failed, "batch finished with rejected commands");
            ExitCode::from(2)
        }
        Err(err) => {
            error!("batch aborted: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the batch, returning the number of failed commands.
async fn run() -> Result<usize> {
    let config_path =
        std::env::var("RADBILL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let config_text = tokio::fs::read_to_string(&config_path)
        .await
        .with_context(|| format!("cannot read config {config_path}"))?;
    let config = EngineConfig::from_toml(&config_text)
        .with_context(|| format!("invalid config {config_path}"))?;

    let store = MemoryStore::new();
    let engine = LifecycleEngine::from_config(&config, Arc::new(store))
        .context("cannot build the lifecycle engine")?;
    info!(config = %config_path, plans = config.plans.len(), "engine ready");

    let batch_text = read_batch(std::env::args().nth(1)).await?;
    let batch: Vec<Command> =
        serde_json::from_str(&batch_text).context("invalid command batch")?;

    let mut failed = 0;
    for (index, command) in batch.into_iter().enumerate() {
        let outcome = execute(&engine, index, command).await;
        if !outcome.ok {
            failed += 1;
        }
        let line = serde_json::to_string(&outcome).context("cannot encode result line")?;
        println!("{line}");
    }
    Ok(failed)
}

async fn read_batch(path: Option<String>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("cannot read batch {path}")),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("cannot read batch from stdin")?;
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_batch_keeps_io_source() {
        let err = read_batch(Some("/nonexistent/radbill/batch.json".into())).await.unwrap_err();

        assert_eq!(err.to_string(), "cannot read batch /nonexistent/radbill/batch.json");
        let io = err.root_cause().downcast_ref::<std::io::Error>();
        assert_eq!(io.map(std::io::Error::kind), Some(std::io::ErrorKind::NotFound));
        assert!(format!("{err:#}").starts_with("cannot read batch /nonexistent/radbill/batch.json: "));
    }
}
