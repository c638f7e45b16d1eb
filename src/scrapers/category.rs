//! News Eleven category page scraper.
//!
//! Category pages (e.g. `https://news-eleven.com/business`) have no feed and
//! their markup varies between sections, so several selector strategies are
//! applied in priority order and their results merged, first match winning
//! for each link.
//!
//! The page carries no reliable per-item timestamp, so only the first
//! [`MAX_ITEMS`] entries (the newest, in page order) are returned.

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{info, instrument};
use url::Url;

use super::element_text;
use crate::http::HttpFetch;
use crate::models::Item;

/// Volume cap for this source.
pub const MAX_ITEMS: usize = 5;

static STRATEGIES: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "a[href^='/article/']",
        "a[href^='https://news-eleven.com/article/']",
        "article h2 a[href]",
        "article h3 a[href]",
        "div.views-row h2 a[href]",
        "div.views-row h3 a[href]",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});
static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

/// Fetch and parse the category page at `url`.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch<H: HttpFetch>(http: &H, url: &str) -> Result<Vec<Item>, Box<dyn Error>> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(Vec::new());
    }
    let page = http.get(url).await?;
    let items = parse_category(&page.body, &page.url)?;
    info!(count = items.len(), "Indexed category page");
    Ok(items)
}

/// Title for a link: its text, else its `title` attribute, else an inner image's `alt`.
fn anchor_title(anchor: ElementRef<'_>) -> Option<String> {
    let text = element_text(anchor);
    if !text.is_empty() {
        return Some(text);
    }
    let attr = |el: ElementRef<'_>, name: &str| {
        el.value()
            .attr(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    attr(anchor, "title").or_else(|| {
        anchor
            .select(&IMAGE)
            .next()
            .and_then(|img| attr(img, "alt"))
    })
}

/// Extract up to [`MAX_ITEMS`] items from a category page body.
pub fn parse_category(html: &str, page_url: &str) -> Result<Vec<Item>, Box<dyn Error>> {
    let base = Url::parse(page_url)?;
    let document = Html::parse_document(html);

    let items = STRATEGIES
        .iter()
        .flat_map(|selector| document.select(selector))
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            let link = base.join(href).ok()?.to_string();
            let title = anchor_title(anchor)?;
            Some(Item::from_link(title, link, String::new(), String::new()))
        })
        .unique_by(|item| item.link.clone())
        .take(MAX_ITEMS)
        .collect();
    Ok(items)
}
