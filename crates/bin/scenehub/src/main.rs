//! # scenehub — dry-run entry point
//!
//! Loads `scenehub.toml`, initialises logging, runs discover → inspect →
//! propose against the configured space and prints the proposals as JSON.
//! Nothing is written to the cloud. Ctrl-C cancels pending calls.

use scenehub::config::Config;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling pending calls");
            on_interrupt.cancel();
        }
    });

    let report = scenehub::pipeline::dry_run(&config, cancel).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
