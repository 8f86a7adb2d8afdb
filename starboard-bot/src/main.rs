//! Starboard Relay Bot
//!
//! Watches a Discord starboard and cross-posts qualifying messages to
//! X/Twitter once they have had a few minutes to settle.

use std::sync::Arc;

use anyhow::Context;
use starboard_core::{Extractor, StarboardError};
use starboard_discord::DiscordConfig;
use starboard_services::{
    DrainConfig, DrainScheduler, EnqueueHandle, PublisherAdapter, StarboardListener,
    TruncationPolicy,
};
use starboard_twitter::{TwitterClient, TwitterConfig};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,starboard_bot=debug,starboard_services=debug")
            }),
        )
        .init();

    info!("Starting starboard relay");

    let discord_config = DiscordConfig::from_env()
        .inspect_err(|e| error!(error = %e, "Invalid Discord configuration"))?;
    let twitter_config = TwitterConfig::from_env()
        .inspect_err(|e| error!(error = %e, "Invalid Twitter configuration"))?;
    let drain_config = DrainConfig::from_env()
        .inspect_err(|e| error!(error = %e, "Invalid drain configuration"))?;

    info!(
        mode = ?discord_config.mode,
        channel_id = discord_config.channel_id,
        threshold = discord_config.reaction_threshold,
        delay_minutes = drain_config.post_delay.num_minutes(),
        "Configuration loaded"
    );

    // Refuse to start with credentials that cannot post
    let twitter = TwitterClient::new(&twitter_config);
    let account = twitter
        .verify_credentials()
        .await
        .map_err(|e| StarboardError::credential_verification("twitter", e.to_string()))
        .inspect_err(|e| error!(error = %e, "Twitter credential check failed"))?;
    info!(username = %account.username, "Twitter credentials verified");

    let extractor = Extractor::new(discord_config.star_emoji.clone())
        .context("Failed to build payload extractor")?;
    let (enqueue, entries) = EnqueueHandle::channel(extractor);
    let (ready_tx, ready_rx) = watch::channel(false);

    let policy = TruncationPolicy::new(
        twitter_config.max_status_chars,
        twitter_config.truncation_margin,
    );
    let publisher = PublisherAdapter::new(Arc::new(twitter), policy);
    let scheduler = DrainScheduler::new(publisher, drain_config);
    let mut scheduler_handle = tokio::spawn(scheduler.run(entries, ready_rx));

    let listener = Arc::new(StarboardListener::new(discord_config, enqueue, ready_tx));

    tokio::select! {
        result = listener.start() => {
            if let Err(e) = result {
                error!(error = %e, "Discord listener stopped");
                return Err(e.into());
            }
        }
        result = &mut scheduler_handle => {
            if let Err(e) = result {
                error!(error = %e, "Drain scheduler task failed");
                return Err(e.into());
            }
            warn!("Drain scheduler stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested, pending posts are discarded");
        }
    }

    Ok(())
}
