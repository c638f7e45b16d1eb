//! Runtime settings and the feed list.
//!
//! [`Settings`] is built once at startup from the CLI/environment and handed
//! to the dispatcher. The feed list is re-read from YAML at the start of every
//! pass, so edits take effect without a restart.
//!
//! # Feed File
//!
//! ```yaml
//! feeds:
//!   - key: bbc_burmese
//!     type: bbc
//!     url: https://www.bbc.com/burmese.lite
//!   - key: myanmarnow
//!     type: rss
//!     url: https://myanmar-now.org/mm/feed/
//!     chat_id: "-1001234567890"
//!     resolve_canonical: true
//!     fulltext: true
//!     split_len: 3500
//! ```
//!
//! Entries are validated one at a time; a bad entry is logged and skipped.
//! When the file is missing, unreadable, or yields no valid entry, the
//! built-in [`default_feeds`] are used.

use serde::Deserialize;
use serde_yaml::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::cli::Cli;
use crate::models::{DEFAULT_SPLIT_LEN, Feed, FeedKind, ParseMode};

pub const BBC_BURMESE_URL: &str = "https://www.bbc.com/burmese.lite";
pub const MYANMAR_NOW_URL: &str = "https://myanmar-now.org/mm/feed/";

/// Everything the pipeline needs, resolved once at startup.
#[derive(Clone)]
pub struct Settings {
    pub bot_token: String,
    /// Destination for feeds that do not name their own chat.
    pub default_chat: String,
    pub feeds_path: PathBuf,
    pub seen_path: PathBuf,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub api_base: String,
    /// Run a single pass and exit.
    pub once: bool,
}

impl Settings {
    /// Validate CLI arguments into settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the bot token or default chat is blank. Clap
    /// already rejects them when absent.
    pub fn from_cli(cli: Cli) -> Result<Self, Box<dyn Error>> {
        let bot_token = cli.bot_token.trim().to_string();
        let default_chat = cli.chat_id.trim().to_string();
        if bot_token.is_empty() || default_chat.is_empty() {
            return Err("BOT_TOKEN / CHAT_ID not set".into());
        }
        Ok(Self {
            bot_token,
            default_chat,
            feeds_path: cli.config,
            seen_path: cli.seen,
            poll_interval: Duration::from_secs(cli.interval),
            request_timeout: Duration::from_secs(cli.timeout),
            api_base: cli.api_base,
            once: cli.once,
        })
    }
}

// The bot token must never reach the logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("default_chat", &self.default_chat)
            .field("feeds_path", &self.feeds_path)
            .field("seen_path", &self.seen_path)
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .field("api_base", &self.api_base)
            .field("once", &self.once)
            .finish_non_exhaustive()
    }
}

/// One `feeds:` entry as written; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFeed {
    key: Option<Value>,
    name: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<String>,
    url: Option<String>,
    chat_id: Option<Value>,
    template: Option<String>,
    parse_mode: Option<String>,
    resolve_canonical: Option<bool>,
    resolve: Option<bool>,
    fulltext: Option<bool>,
    split_len: Option<i64>,
}

impl RawFeed {
    fn into_feed(self, default_chat: &str) -> Result<Feed, String> {
        let url = self.url.as_deref().map(str::trim).unwrap_or_default();
        if url.is_empty() {
            return Err("missing url".to_string());
        }
        let key = self
            .key
            .as_ref()
            .and_then(scalar_string)
            .or_else(|| self.name.as_ref().and_then(scalar_string))
            .unwrap_or_else(|| url.to_string());
        let kind = match self.kind.as_deref() {
            Some(kind) => kind.parse::<FeedKind>()?,
            None => FeedKind::Rss,
        };
        let parse_mode = match self.parse_mode.as_deref() {
            Some(mode) => mode.parse::<ParseMode>()?,
            None => ParseMode::Html,
        };
        let chat_id = self
            .chat_id
            .as_ref()
            .and_then(scalar_string)
            .unwrap_or_else(|| default_chat.to_string());

        Ok(Feed {
            key,
            kind,
            url: url.to_string(),
            chat_id,
            template: self.template.filter(|t| !t.trim().is_empty()),
            parse_mode,
            resolve: self.resolve_canonical.or(self.resolve).unwrap_or(false),
            fulltext: self.fulltext.unwrap_or(false),
            split_len: self.split_len.unwrap_or(DEFAULT_SPLIT_LEN),
        })
    }
}

/// Non-empty string form of a YAML scalar (chat ids are often numbers).
fn scalar_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// The feeds used when no usable feed file exists.
pub fn default_feeds(default_chat: &str) -> Vec<Feed> {
    let bbc = Feed::new("bbc_burmese", FeedKind::Listing, BBC_BURMESE_URL, default_chat);
    let mut myanmar_now = Feed::new("myanmarnow", FeedKind::Rss, MYANMAR_NOW_URL, default_chat);
    myanmar_now.resolve = true;
    myanmar_now.fulltext = true;
    vec![bbc, myanmar_now]
}

/// Parse a feed document, skipping invalid entries and duplicate keys.
///
/// # Errors
///
/// Returns an error only if the document is not YAML at all.
pub fn parse_feeds(yaml: &str, default_chat: &str) -> Result<Vec<Feed>, serde_yaml::Error> {
    let doc: Value = serde_yaml::from_str(yaml)?;
    let entries = doc
        .get("feeds")
        .and_then(Value::as_sequence)
        .cloned()
        .unwrap_or_default();

    let mut keys = HashSet::new();
    let mut feeds = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let feed = serde_yaml::from_value::<RawFeed>(entry)
            .map_err(|e| e.to_string())
            .and_then(|raw| raw.into_feed(default_chat));
        match feed {
            Ok(feed) if !keys.insert(feed.key.clone()) => {
                warn!(index, key = %feed.key, "Duplicate feed key; skipping entry");
            }
            Ok(feed) => feeds.push(feed),
            Err(e) => warn!(index, error = %e, "Invalid feed entry; skipping"),
        }
    }
    Ok(feeds)
}

/// Load the feed list from `path`, falling back to [`default_feeds`].
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_feeds(path: &Path, default_chat: &str) -> Vec<Feed> {
    let feeds = match fs::read_to_string(path).await {
        Ok(raw) => match parse_feeds(&raw, default_chat) {
            Ok(feeds) => feeds,
            Err(e) => {
                warn!(error = %e, "Feed file is not valid YAML");
                Vec::new()
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read feed file");
            Vec::new()
        }
    };

    if feeds.is_empty() {
        info!("No configured feeds; using built-in defaults");
        return default_feeds(default_chat);
    }
    info!(count = feeds.len(), "Loaded feed configuration");
    feeds
}
