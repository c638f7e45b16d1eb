//! Data models shared by the scrapers, the dispatcher and the sink.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Item`]: One normalized news entry produced by a source adapter
//! - [`Feed`]: One configured source plus its delivery settings
//! - [`FeedKind`]: Which adapter turns the source into items
//! - [`ParseMode`]: How the chat renders a dispatched message

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use crate::utils::parse_iso;

/// Default maximum characters per dispatched message segment.
pub const DEFAULT_SPLIT_LEN: i64 = 3500;

/// One news entry as normalized by a source adapter.
///
/// Items are rebuilt on every fetch cycle and never mutated. Only the `id`
/// outlives the cycle, inside the seen store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Dedup key, normally the article link.
    pub id: String,
    /// Headline text.
    pub title: String,
    /// Absolute article URL.
    pub link: String,
    /// Human-readable date as the source printed it.
    pub date_text: String,
    /// ISO-8601 timestamp, or empty when the source has none.
    pub date_iso: String,
}

impl Item {
    /// Build an item whose dedup key is its link.
    pub fn from_link(title: String, link: String, date_text: String, date_iso: String) -> Self {
        Self {
            id: link.clone(),
            title,
            link,
            date_text,
            date_iso,
        }
    }

    /// Key used to send items oldest-first.
    ///
    /// Items without a parsable date sort before every dated item, and the
    /// link breaks ties so the order is total.
    pub fn chrono_key(&self) -> (Option<NaiveDateTime>, &str) {
        (parse_iso(&self.date_iso), self.link.as_str())
    }
}

/// Which source adapter a feed uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// HTML listing page with a fixed container of entries.
    Listing,
    /// RSS 2.0 or Atom document.
    Rss,
    /// WordPress REST posts listing.
    WordPress,
    /// HTML category page scraped with several selector strategies.
    CategoryPage,
}

impl FromStr for FeedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bbc" | "listing" => Ok(FeedKind::Listing),
            "rss" | "atom" => Ok(FeedKind::Rss),
            "dvb" | "wordpress" | "wp_json" => Ok(FeedKind::WordPress),
            "eleven" | "category" => Ok(FeedKind::CategoryPage),
            other => Err(format!("unknown feed type `{other}`")),
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedKind::Listing => "listing",
            FeedKind::Rss => "rss",
            FeedKind::WordPress => "wordpress",
            FeedKind::CategoryPage => "category",
        };
        f.write_str(name)
    }
}

/// Rendering mode requested from the chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Html,
    Markdown,
    MarkdownV2,
    /// Send the text as-is with no markup.
    Plain,
}

impl ParseMode {
    /// Value of the Bot API `parse_mode` field, if any.
    pub fn as_api_str(&self) -> Option<&'static str> {
        match self {
            ParseMode::Html => Some("HTML"),
            ParseMode::Markdown => Some("Markdown"),
            ParseMode::MarkdownV2 => Some("MarkdownV2"),
            ParseMode::Plain => None,
        }
    }
}

impl FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(ParseMode::Html),
            "markdown" => Ok(ParseMode::Markdown),
            "markdownv2" => Ok(ParseMode::MarkdownV2),
            "plain" | "none" | "text" => Ok(ParseMode::Plain),
            other => Err(format!("unknown parse mode `{other}`")),
        }
    }
}

/// One configured source plus its delivery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    /// Unique key naming this feed's bucket in the seen store.
    pub key: String,
    pub kind: FeedKind,
    pub url: String,
    /// Destination chat; already defaulted to the global chat.
    pub chat_id: String,
    /// Message pattern with `{title}`, `{date}` and `{link}` placeholders.
    pub template: Option<String>,
    pub parse_mode: ParseMode,
    /// Resolve the canonical URL before sending.
    pub resolve: bool,
    /// Fetch, chunk and send the article body.
    pub fulltext: bool,
    /// Maximum characters per message; `<= 0` disables splitting.
    pub split_len: i64,
}

impl Feed {
    /// A feed with default delivery settings.
    pub fn new(key: &str, kind: FeedKind, url: &str, chat_id: &str) -> Self {
        Self {
            key: key.to_string(),
            kind,
            url: url.to_string(),
            chat_id: chat_id.to_string(),
            template: None,
            parse_mode: ParseMode::Html,
            resolve: false,
            fulltext: false,
            split_len: DEFAULT_SPLIT_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(link: &str, date_iso: &str) -> Item {
        Item::from_link("t".into(), link.into(), String::new(), date_iso.into())
    }

    #[test]
    fn test_from_link_uses_link_as_id() {
        let it = item("https://example.com/a", "");
        assert_eq!(it.id, "https://example.com/a");
    }

    #[test]
    fn test_chrono_key_orders_undated_first() {
        let mut items = vec![
            item("https://example.com/b", "2024-01-02"),
            item("https://example.com/a", "2024-01-01"),
            item("https://example.com/c", ""),
        ];
        items.sort_by(|a, b| a.chrono_key().cmp(&b.chrono_key()));
        let links: Vec<_> = items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/c",
                "https://example.com/a",
                "https://example.com/b"
            ]
        );
    }

    #[test]
    fn test_chrono_key_breaks_ties_on_link() {
        let mut items = vec![item("https://example.com/z", ""), item("https://example.com/y", "")];
        items.sort_by(|a, b| a.chrono_key().cmp(&b.chrono_key()));
        assert_eq!(items[0].link, "https://example.com/y");
    }

    #[test]
    fn test_feed_kind_aliases() {
        assert_eq!("BBC".parse::<FeedKind>(), Ok(FeedKind::Listing));
        assert_eq!("rss".parse::<FeedKind>(), Ok(FeedKind::Rss));
        assert_eq!("dvb".parse::<FeedKind>(), Ok(FeedKind::WordPress));
        assert_eq!("eleven".parse::<FeedKind>(), Ok(FeedKind::CategoryPage));
        assert!("gopher".parse::<FeedKind>().is_err());
    }

    #[test]
    fn test_parse_mode_api_names() {
        assert_eq!("html".parse::<ParseMode>().unwrap().as_api_str(), Some("HTML"));
        assert_eq!(
            "MarkdownV2".parse::<ParseMode>().unwrap().as_api_str(),
            Some("MarkdownV2")
        );
        assert_eq!(ParseMode::Plain.as_api_str(), None);
    }
}
