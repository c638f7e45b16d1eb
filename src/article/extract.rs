//! Readable body text from an article page.
//!
//! Site chrome is removed first, then the largest content container from a
//! ranked list of known article wrappers is chosen. Paragraph and list item
//! text is collected from it, one block per paragraph.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, instrument};

use crate::http::HttpFetch;
use crate::scrapers::detach_all;
use crate::utils::{collapse_whitespace, fail_open};

static CHROME: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("script, style, noscript, iframe, svg, form, header, footer, nav, aside")
        .unwrap()
});

static CANDIDATES: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article",
        "div.entry-content",
        "div.td-post-content",
        "div[itemprop='articleBody']",
        "div.post-content",
        "div.single-post-content",
        "div.article-content",
        "main",
        "section.article",
        "div#region-content",
        "#content",
        "div.node__content",
        "div.field--name-body",
        "div.field__item",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static BLOCKS: Lazy<Selector> = Lazy::new(|| Selector::parse("p, li").unwrap());

const BULLET: &str = "• ";

/// Fetch `url` and extract its article text.
///
/// # Returns
///
/// Paragraphs separated by blank lines, or an empty string when the page
/// cannot be fetched or has no text.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn extract<H: HttpFetch>(http: &H, url: &str) -> String {
    fail_open("extract_article", url, fetch_text(http, url).await, String::new)
}

async fn fetch_text<H: HttpFetch>(http: &H, url: &str) -> Result<String, Box<dyn Error>> {
    let page = http.get(url).await?;
    let text = text_from_document(Html::parse_document(&page.body));
    debug!(chars = text.chars().count(), "Extracted article text");
    Ok(text)
}

/// Article text of an HTML fragment, such as a CMS-rendered post body.
pub fn text_from_html(fragment: &str) -> String {
    text_from_document(Html::parse_fragment(fragment))
}

fn text_from_document(mut document: Html) -> String {
    detach_all(&mut document, &CHROME);

    let root = content_root(&document)
        .or_else(|| document.select(&BODY).next())
        .unwrap_or_else(|| document.root_element());

    root.select(&BLOCKS)
        .filter_map(|block| {
            let text = collapse_whitespace(&block.text().collect::<String>());
            if text.is_empty() {
                None
            } else if block.value().name() == "li" {
                Some(format!("{BULLET}{text}"))
            } else {
                Some(text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The candidate container with the most text; the earliest one wins ties.
fn content_root(document: &Html) -> Option<ElementRef<'_>> {
    let mut best: Option<(usize, ElementRef<'_>)> = None;
    for element in CANDIDATES.iter().flat_map(|s| document.select(s)) {
        let len = element.text().map(|t| t.trim().chars().count()).sum::<usize>();
        if len > 0 && best.is_none_or(|(best_len, _)| len > best_len) {
            best = Some((len, element));
        }
    }
    best.map(|(_, element)| element)
}
