//! # News Push
//!
//! Polls news sources, works out which entries have not been posted yet, and
//! pushes them to a Telegram chat.
//!
//! ## Features
//!
//! - Four source kinds: an HTML listing page (BBC Burmese lite), RSS/Atom
//!   feeds, WordPress REST listings (DVB) and HTML category pages (News Eleven)
//! - Per-feed dedup persisted to a JSON file, so restarts never re-post
//! - Optional canonical URL resolution and full-text sends split into
//!   message-sized segments
//! - Feed list reloaded from YAML on every pass
//!
//! ## Usage
//!
//! ```sh
//! BOT_TOKEN=123:abc CHAT_ID=@channel news_push -c feeds.yaml -s seen.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: each feed's adapter turns its source into items
//! 2. **Dedup**: items already recorded for the feed are dropped
//! 3. **Dispatch**: new items are sent oldest-first and recorded
//! 4. **Sleep**: wait for the poll interval and start again

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod article;
mod chunk;
mod cli;
mod config;
mod dispatch;
mod http;
mod models;
mod poll;
mod scrapers;
mod sink;
mod store;
#[cfg(test)]
mod testing;
mod utils;

use cli::Cli;
use config::Settings;
use dispatch::Dispatcher;
use http::HttpClient;
use sink::{RetrySink, TelegramSink};
use utils::ensure_writable_parent;

/// Retries after the first failed send.
const SEND_RETRIES: usize = 3;
const SEND_BASE_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "No .env file loaded");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "news_push starting up");

    let settings = Settings::from_cli(Cli::parse())?;
    debug!(?settings, "Resolved settings");

    // Fail now rather than after the first batch has been sent.
    if let Err(e) = ensure_writable_parent(&settings.seen_path).await {
        error!(
            path = %settings.seen_path.display(),
            error = %e,
            "Seen store directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let http = HttpClient::new(settings.request_timeout)?;
    let telegram = TelegramSink::new(http.inner().clone(), &settings.api_base, &settings.bot_token);
    let sink = RetrySink::new(telegram, SEND_RETRIES, SEND_BASE_DELAY);

    let dispatcher = Dispatcher::new(http, sink, settings);
    poll::run(&dispatcher).await;

    info!("news_push stopped");
    Ok(())
}
