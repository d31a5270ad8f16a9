//! bugsnag-link - pipe JSON-lines messages through the notification link
//!
//! Each line on stdin is one message, e.g.
//! `{"level": "error", "text": "disk full", "meta": {"host": "db-1"}}`.
//! Messages are printed to stdout and error-level ones are reported.

use anyhow::{Context, Result};
use bugsnag_link::{
    cli::Cli,
    config::{AppConfig, EnvSource, ProcessEnv},
    message::MessageRecord,
    notification::{LogNotifier, NotifierClient, WebhookNotifier},
    pipeline::{ConsoleStage, Pipeline},
    setup,
};
use clap::Parser;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = AppConfig::load(&cli).context("Failed to load configuration")?;

    // Logs go to stderr so that stdout carries only the rendered messages.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("bugsnag-link starting up...");
    info!(
        "Webhook: {}",
        config
            .webhook
            .as_ref()
            .map(|w| w.endpoint.as_str())
            .unwrap_or("none, notifications are logged")
    );

    let env: Arc<dyn EnvSource> = Arc::new(ProcessEnv);
    let client: Arc<dyn NotifierClient> = match &config.webhook {
        Some(webhook) => Arc::new(
            WebhookNotifier::new(
                webhook.endpoint.clone(),
                Duration::from_millis(webhook.timeout_ms),
            )
            .context("Failed to build webhook client")?,
        ),
        None => Arc::new(LogNotifier::new()),
    };

    let link_setup = setup(config.link.clone(), env.as_ref());
    let link = link_setup.link(client, env.clone());
    let console = ConsoleStage::new(
        config.link.prefix,
        link.release_stage().to_string(),
        env.clone(),
    );

    let mut pipeline = Pipeline::new();
    pipeline.add(link);
    pipeline.add(console);

    let stdin = std::io::stdin();
    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let record: MessageRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping malformed message");
                continue;
            }
        };
        let message = pipeline.factory().from_record(record);
        if let Err(e) = pipeline.publish(&message) {
            error!(line = index + 1, error = %e, "Failed to process message");
        }
    }

    info!("Input closed, shutting down.");
    Ok(())
}
