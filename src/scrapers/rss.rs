//! RSS 2.0 and Atom feeds, parsed with `feed-rs`.
//!
//! # Field Mapping
//!
//! | Item field | Source |
//! |------------|--------|
//! | `title` | entry title |
//! | `link` | first link with no `rel` or `rel="alternate"`, else the first link, else an `http(s)` id |
//! | `id` | `guid` / Atom `id`, else the link |
//! | `date_text`, `date_iso` | published, else updated, as RFC 3339 |
//!
//! Entries without a title or link are skipped.

use feed_rs::model::Entry;
use feed_rs::parser::{self, ParseFeedError};
use std::error::Error;
use tracing::{info, instrument};

use crate::http::HttpFetch;
use crate::models::Item;

/// Fetch and parse the feed at `url`.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch<H: HttpFetch>(http: &H, url: &str) -> Result<Vec<Item>, Box<dyn Error>> {
    let page = http.get(url).await?;
    let items = parse_feed(&page.body)?;
    info!(count = items.len(), "Parsed feed");
    Ok(items)
}

/// Parse an RSS or Atom document into items, in document order.
///
/// # Errors
///
/// Returns an error if the body is not a recognizable feed.
pub fn parse_feed(xml: &str) -> Result<Vec<Item>, ParseFeedError> {
    // Entries without a guid get an empty id here and fall back to their link.
    let feed = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(xml.as_bytes())?;
    Ok(feed.entries.into_iter().filter_map(entry_to_item).collect())
}

fn entry_to_item(entry: Entry) -> Option<Item> {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .unwrap_or_default();
    let link = entry_link(&entry);
    if title.is_empty() || link.is_empty() {
        return None;
    }

    let id = match entry.id.trim() {
        "" => link.clone(),
        id => id.to_string(),
    };
    let date = entry
        .published
        .or(entry.updated)
        .map(|d| d.to_rfc3339())
        .unwrap_or_default();

    Some(Item {
        id,
        title,
        link,
        date_text: date.clone(),
        date_iso: date,
    })
}

fn entry_link(entry: &Entry) -> String {
    let hrefs = || {
        entry
            .links
            .iter()
            .map(|l| (l.href.trim(), l.rel.as_deref().unwrap_or("")))
            .filter(|(href, _)| !href.is_empty())
    };
    if let Some((href, _)) = hrefs().find(|(_, rel)| rel.is_empty() || rel.eq_ignore_ascii_case("alternate")) {
        return href.to_string();
    }
    if let Some((href, _)) = hrefs().next() {
        return href.to_string();
    }
    // A permalink guid is the only URL some feeds give.
    let id = entry.id.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        return id.to_string();
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rss2_feed() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
          <channel>
            <title>Test Feed</title>
            <link>https://example.com/</link>
            <item>
              <title>Tom &amp; Jerry&#8217;s day</title>
              <link>https://example.com/1</link>
              <guid isPermaLink="false">post-1</guid>
              <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
            </item>
            <item>
              <title><![CDATA[Second story]]></title>
              <link>
                https://example.com/2
              </link>
            </item>
            <item>
              <title>No link</title>
            </item>
            <item>
              <link>https://example.com/no-title</link>
            </item>
          </channel>
        </rss>"#;

        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "Tom & Jerry\u{2019}s day");
        assert_eq!(items[0].link, "https://example.com/1");
        assert_eq!(items[0].id, "post-1");
        assert_eq!(items[0].date_iso, "2024-01-01T00:00:00+00:00");
        assert_eq!(items[0].date_text, items[0].date_iso);

        assert_eq!(items[1].title, "Second story");
        assert_eq!(items[1].link, "https://example.com/2");
        assert_eq!(items[1].id, "https://example.com/2");
        assert_eq!(items[1].date_iso, "");
    }

    #[test]
    fn test_parse_atom_feed() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
          <title>Test Atom Feed</title>
          <id>urn:feed</id>
          <entry>
            <title>Atom Entry</title>
            <link rel="self" href="https://example.com/atom/1.xml"/>
            <link href="https://example.com/atom/1"/>
            <id>urn:uuid:1</id>
            <updated>2024-01-01T00:00:00Z</updated>
          </entry>
          <entry>
            <title>Only self link</title>
            <link rel="self" href="https://example.com/atom/2.xml"/>
            <published>2024-01-02T00:00:00+06:30</published>
            <updated>2024-01-05T00:00:00Z</updated>
          </entry>
        </feed>"#;

        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "Atom Entry");
        assert_eq!(items[0].link, "https://example.com/atom/1");
        assert_eq!(items[0].id, "urn:uuid:1");
        assert_eq!(items[0].date_iso, "2024-01-01T00:00:00+00:00");

        assert_eq!(items[1].link, "https://example.com/atom/2.xml");
        assert_eq!(items[1].id, "https://example.com/atom/2.xml");
        assert_eq!(items[1].date_iso, "2024-01-01T17:30:00+00:00");
    }

    #[test]
    fn test_namespaced_title_does_not_replace_item_title() {
        let xml = r#"<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/"><channel><title>x</title>
            <item>
              <media:title>Photo caption</media:title>
              <title>Real headline</title>
              <link>https://e.com/a</link>
            </item>
        </channel></rss>"#;
        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Real headline");
    }

    #[test]
    fn test_permalink_guid_used_as_link() {
        let xml = r#"<rss version="2.0"><channel><title>x</title>
            <item><title>T</title><guid isPermaLink="true">https://e.com/g</guid></item>
        </channel></rss>"#;
        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://e.com/g");
        assert_eq!(items[0].id, "https://e.com/g");
    }

    #[test]
    fn test_unparsable_date_leaves_item_undated() {
        let xml = r#"<rss version="2.0"><channel><title>x</title><item><title>A</title><link>https://e.com/a</link>
                   <pubDate>sometime</pubDate></item></channel></rss>"#;
        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].date_iso, "");
    }

    #[test]
    fn test_not_a_feed_is_an_error() {
        assert!(parse_feed("<html><body>Not a feed</body></html>").is_err());
    }

    #[test]
    fn test_empty_channel() {
        let items = parse_feed(r#"<rss version="2.0"><channel><title>x</title></channel></rss>"#).unwrap();
        assert!(items.is_empty());
    }
}
