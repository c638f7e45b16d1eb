//! Command-line interface definitions for news_push.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The bot credentials can be provided via command-line flags or environment
//! variables (a `.env` file in the working directory is loaded first).

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the news_push application.
///
/// # Examples
///
/// ```sh
/// # Credentials from the environment, default file locations
/// BOT_TOKEN=123:abc CHAT_ID=@mychannel news_push
///
/// # Explicit feed file and seen store, poll every five minutes
/// news_push -c ./feeds.yaml -s ./state/seen.json -i 300
///
/// # One pass only, e.g. from cron
/// news_push --once
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Telegram bot token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// Default destination chat for feeds without their own `chat_id`
    #[arg(long, env = "CHAT_ID")]
    pub chat_id: String,

    /// Path to the feed configuration file
    #[arg(short, long, default_value = "feeds.yaml")]
    pub config: PathBuf,

    /// Path to the seen-items store
    #[arg(short, long, default_value = "seen.json")]
    pub seen: PathBuf,

    /// Seconds to sleep between passes
    #[arg(short, long, default_value_t = 60)]
    pub interval: u64,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = 20)]
    pub timeout: u64,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_BASE", default_value = "https://api.telegram.org")]
    pub api_base: String,

    /// Run a single pass over all feeds and exit
    #[arg(long)]
    pub once: bool,
}
