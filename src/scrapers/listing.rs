//! BBC Burmese lite listing page scraper.
//!
//! This module scrapes the [BBC Burmese lite](https://www.bbc.com/burmese.lite)
//! front page. Entries live in a single `ul` container; each `li` holds an
//! `h3` headline with the article link and a `time` element.
//!
//! # Live Broadcasts
//!
//! Live pages have no fixed article URL and keep changing, so they must never
//! be dispatched as new items. An entry is dropped when its headline matches
//! the live pattern (English or Burmese spelling), when its link path contains
//! `/live/`, or when its headline carries the `first-promo` marker.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{detach_all, element_text};
use crate::http::HttpFetch;
use crate::models::Item;

static CONTAINER: Lazy<Selector> = Lazy::new(|| Selector::parse("ul.bbc-14jdpb9").unwrap());
static ENTRY: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());
static HEADLINE: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").unwrap());
static PROMO_MARKER: Lazy<Selector> = Lazy::new(|| Selector::parse("svg.first-promo").unwrap());
static HIDDEN_TEXT: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("span[data-testid='visually-hidden-text'], span.bbc-m04vo2").unwrap()
});

static LIVE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(တိုက်ရိုက်(?:ထုတ်လွှင့်မှု|ထုတ်လွင့်မှု)?|\blive\b)").unwrap()
});

/// Fetch and parse the listing page at `url`.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch<H: HttpFetch>(http: &H, url: &str) -> Result<Vec<Item>, Box<dyn Error>> {
    let page = http.get(url).await?;
    let items = parse_listing(&page.body, &page.url)?;
    info!(count = items.len(), "Indexed listing page");
    Ok(items)
}

/// Whether a headline announces a live broadcast.
pub fn is_live_title(title: &str) -> bool {
    LIVE_PATTERN.is_match(title)
}

/// Extract items from a listing page body.
///
/// Links are resolved against `page_url`. A page without the expected
/// container yields no items.
pub fn parse_listing(html: &str, page_url: &str) -> Result<Vec<Item>, Box<dyn Error>> {
    let base = Url::parse(page_url)?;
    let mut document = Html::parse_document(html);
    // Screen-reader prefixes ("Video," and the like) are not part of the title.
    detach_all(&mut document, &HIDDEN_TEXT);

    let Some(container) = document.select(&CONTAINER).next() else {
        warn!(%page_url, "Listing container not found");
        return Ok(Vec::new());
    };

    let mut items = Vec::new();
    for entry in container.select(&ENTRY) {
        let Some(headline) = entry.select(&HEADLINE).next() else {
            continue;
        };
        let title = element_text(headline);

        let href = headline
            .select(&ANCHOR)
            .next()
            .or_else(|| entry.select(&ANCHOR).next())
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .unwrap_or_default();
        let link = if href.is_empty() {
            String::new()
        } else {
            base.join(href).map(|u| u.to_string()).unwrap_or_default()
        };

        if title.is_empty() || link.is_empty() {
            continue;
        }
        if link.to_lowercase().contains("/live/")
            || is_live_title(&title)
            || headline.select(&PROMO_MARKER).next().is_some()
        {
            debug!(%title, %link, "Skipping live entry");
            continue;
        }

        let time = entry.select(&TIME).next();
        let date_text = time.map(element_text).unwrap_or_default();
        let date_iso = time
            .and_then(|t| t.value().attr("datetime"))
            .map(|d| d.trim().to_string())
            .unwrap_or_default();

        items.push(Item::from_link(title, link, date_text, date_iso));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHttp;

    const PAGE: &str = r#"
<html><body>
<ul class="bbc-14jdpb9">
  <li>
    <h3><a href="/burmese/articles/c1"><span data-testid="visually-hidden-text">Video, </span>Election results announced</a></h3>
    <time datetime="2024-01-02">၂ ဇန်နဝါရီ</time>
  </li>
  <li>
    <h3><a href="/burmese/articles/c2">Myanmar Live: updates</a></h3>
    <time datetime="2024-01-03">၃ ဇန်နဝါရီ</time>
  </li>
  <li>
    <h3><a href="/burmese/live/c3">Rolling coverage</a></h3>
  </li>
  <li>
    <h3><a href="/burmese/articles/c4">တိုက်ရိုက်ထုတ်လွှင့်မှု</a></h3>
  </li>
  <li>
    <h3><svg class="first-promo"></svg><a href="/burmese/articles/c5">Promoted story</a></h3>
  </li>
  <li><p>No headline here</p></li>
  <li>
    <h3>Headline without anchor</h3>
    <a href="https://www.bbc.com/burmese/articles/c6">Read more</a>
  </li>
  <li><h3><a href="">Empty link</a></h3></li>
  <li><h3>Olive oil prices rise<a href="/burmese/articles/c7"></a></h3></li>
</ul>
</body></html>"#;

    #[test]
    fn test_parse_listing_extracts_entries() {
        let items = parse_listing(PAGE, "https://www.bbc.com/burmese.lite").unwrap();
        let links: Vec<_> = items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://www.bbc.com/burmese/articles/c1",
                "https://www.bbc.com/burmese/articles/c6",
                "https://www.bbc.com/burmese/articles/c7",
            ]
        );

        let first = &items[0];
        assert_eq!(first.title, "Election results announced");
        assert_eq!(first.id, first.link);
        assert_eq!(first.date_iso, "2024-01-02");
        assert_eq!(first.date_text, "၂ ဇန်နဝါရီ");

        assert_eq!(items[1].title, "Headline without anchor");
        assert_eq!(items[1].date_iso, "");
    }

    #[test]
    fn test_live_entry_excluded_even_with_valid_link() {
        let items = parse_listing(PAGE, "https://www.bbc.com/burmese.lite").unwrap();
        assert!(items.iter().all(|i| !i.title.contains("Live")));
        assert!(items.iter().all(|i| !i.link.contains("/live/")));
        assert!(items.iter().all(|i| i.title != "Promoted story"));
    }

    #[test]
    fn test_is_live_title() {
        assert!(is_live_title("LIVE: Parliament session"));
        assert!(is_live_title("Myanmar live updates"));
        assert!(is_live_title("တိုက်ရိုက် သတင်း"));
        assert!(!is_live_title("Olive harvest"));
        assert!(!is_live_title("Lives lost in flood"));
    }

    #[test]
    fn test_missing_container_yields_nothing() {
        let items = parse_listing("<html><ul class='other'><li><h3><a href='/a'>A</a></h3></li></ul></html>", "https://www.bbc.com/").unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_resolves_against_final_url() {
        let http = FakeHttp::default().redirect(
            "https://bbc.in/burmese",
            "https://www.bbc.com/burmese.lite",
            PAGE,
        );
        let items = fetch(&http, "https://bbc.in/burmese").await.unwrap();
        assert_eq!(items[0].link, "https://www.bbc.com/burmese/articles/c1");
    }
}
