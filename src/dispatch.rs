//! One polling pass: fetch every feed, send what is new, remember it.
//!
//! # Flow per Feed
//!
//! 1. Fetch current items through the feed's adapter
//! 2. Drop ids already recorded for the feed's key
//! 3. Sort the rest oldest-first (undated items first)
//! 4. Send each item, recording its id whether or not the send worked
//! 5. Persist the store once the batch is done
//!
//! A feed with nothing new causes no store write. A failing feed is logged
//! and the pass moves on to the next one.

use html_escape::encode_text;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::error::Error;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::article::{self, canonical};
use crate::chunk::chunk_text_weighted;
use crate::config::{Settings, load_feeds};
use crate::http::HttpFetch;
use crate::models::{Feed, Item, ParseMode};
use crate::scrapers::fetch_items;
use crate::sink::{MessageSink, OutgoingMessage, SendError};
use crate::store::SeenStore;
use crate::utils::{display_date, truncate_for_log};

/// Message pattern used when a feed has no template.
pub const DEFAULT_TEMPLATE: &str = "<b>{title}</b>\nDate: {date}\n\n{link}";

/// Pause before each continuation segment of a full-text send.
pub const CONTINUATION_DELAY: Duration = Duration::from_millis(200);

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(title|date|link)\}").unwrap());

/// Runs polling passes against one HTTP client and one message sink.
#[derive(Debug)]
pub struct Dispatcher<H, S> {
    http: H,
    sink: S,
    settings: Settings,
}

impl<H: HttpFetch, S: MessageSink> Dispatcher<H, S> {
    pub fn new(http: H, sink: S, settings: Settings) -> Self {
        Self {
            http,
            sink,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Process every configured feed once.
    ///
    /// Feeds are reloaded from disk on every pass so edits take effect
    /// without a restart.
    ///
    /// # Returns
    ///
    /// The number of items delivered.
    ///
    /// # Errors
    ///
    /// Fails only when the seen store cannot be loaded. Errors inside a
    /// single feed are logged and do not stop the pass.
    #[instrument(level = "info", skip_all)]
    pub async fn run_pass(&self) -> Result<usize, Box<dyn Error>> {
        let t0 = Instant::now();
        let feeds = load_feeds(&self.settings.feeds_path, &self.settings.default_chat).await;
        let mut store = SeenStore::load(&self.settings.seen_path).await?;

        let mut delivered = 0;
        for feed in &feeds {
            match self.run_feed(feed, &mut store).await {
                Ok(n) => delivered += n,
                Err(e) => error!(feed = %feed.key, error = %e, "Feed failed; continuing with next feed"),
            }
        }

        info!(
            feeds = feeds.len(),
            delivered,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Pass complete"
        );
        Ok(delivered)
    }

    /// Send the new items of one feed and record them in `store`.
    ///
    /// # Returns
    ///
    /// The number of items delivered. Items whose send failed are still
    /// recorded, so they are not retried on later passes.
    #[instrument(level = "info", skip_all, fields(feed = %feed.key))]
    pub async fn run_feed(&self, feed: &Feed, store: &mut SeenStore) -> Result<usize, Box<dyn Error>> {
        let items = fetch_items(&self.http, feed).await;
        let mut fresh = store.unseen(&feed.key, items);
        if fresh.is_empty() {
            debug!("Nothing new");
            return Ok(0);
        }
        fresh.sort_by(|a, b| a.chrono_key().cmp(&b.chrono_key()));
        info!(
            new_items = fresh.len(),
            ids = ?fresh.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            "Dispatching new items"
        );

        let mut delivered = 0;
        for item in &fresh {
            // The same id can appear twice in one listing.
            if store.contains(&feed.key, &item.id) {
                continue;
            }
            match self.deliver(feed, item).await {
                Ok(()) => delivered += 1,
                Err(e) => error!(id = %item.id, error = %e, "Send failed; marking seen anyway"),
            }
            store.mark_seen(&feed.key, &item.id);
        }

        store.save(&self.settings.seen_path).await?;
        info!(delivered, seen = store.count(&feed.key), "Feed batch done");
        Ok(delivered)
    }

    /// Send one item as a summary, or as header plus body segments.
    #[instrument(level = "debug", skip_all, fields(id = %item.id))]
    async fn deliver(&self, feed: &Feed, item: &Item) -> Result<(), SendError> {
        let link = if feed.resolve {
            canonical::resolve(&self.http, &item.link).await
        } else {
            item.link.clone()
        };
        let header = render_message(feed, item, &link);

        if !feed.fulltext {
            self.send(feed, header, true).await?;
            return Ok(());
        }

        let body = article::fetch_body(&self.http, feed.kind, &link).await;
        if body.is_empty() {
            warn!(%link, "No article body; sending header only");
            self.send(feed, header, true).await?;
            return Ok(());
        }

        let (first, rest) = segments(feed, header, &body);
        self.send(feed, first, true).await?;
        for segment in rest {
            sleep(CONTINUATION_DELAY).await;
            self.send(feed, segment, false).await?;
        }
        Ok(())
    }

    async fn send(&self, feed: &Feed, text: String, link_preview: bool) -> Result<(), SendError> {
        debug!(chat = %feed.chat_id, text = %truncate_for_log(&text, 120), "Sending message");
        let message = OutgoingMessage {
            chat_id: feed.chat_id.clone(),
            text,
            parse_mode: feed.parse_mode,
            link_preview,
        };
        let id = self.sink.send(&message).await?;
        debug!(message_id = id, "Message sent");
        Ok(())
    }
}

/// Fill a feed's template for `item`, with `link` standing in for its link.
///
/// In HTML mode the title is escaped; the template's own markup is kept.
pub fn render_message(feed: &Feed, item: &Item, link: &str) -> String {
    let template = feed.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
    let title = escape_for(feed.parse_mode, &item.title);
    let date = display_date(&item.date_iso, &item.date_text);
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match &caps[1] {
            "title" => title.clone(),
            "date" => date.clone(),
            _ => link.to_string(),
        })
        .into_owned()
}

fn escape_for(mode: ParseMode, text: &str) -> String {
    match mode {
        ParseMode::Html => encode_text(text).into_owned(),
        _ => text.to_string(),
    }
}

/// Characters `c` occupies once escaped for `mode`.
fn escaped_width(mode: ParseMode, c: char) -> usize {
    match (mode, c) {
        (ParseMode::Html, '&') => "&amp;".len(),
        (ParseMode::Html, '<' | '>') => "&lt;".len(),
        _ => 1,
    }
}

/// Split a full-text send into its first message and continuation segments.
///
/// Every segment fits the feed's length limit after escaping. The header and
/// first chunk share a message when together they fit too.
fn segments(feed: &Feed, header: String, body: &str) -> (String, Vec<String>) {
    let mut chunks = chunk_text_weighted(body, feed.split_len, |c| escaped_width(feed.parse_mode, c))
        .into_iter()
        .map(|chunk| escape_for(feed.parse_mode, &chunk))
        .collect::<Vec<_>>();
    let Some(first) = chunks.first() else {
        return (header, chunks);
    };

    let merged = format!("{header}\n\n{first}");
    if feed.split_len <= 0 || merged.chars().count() as i64 <= feed.split_len {
        chunks.remove(0);
        (merged, chunks)
    } else {
        (header, chunks)
    }
}
