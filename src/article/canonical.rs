//! Canonical URL resolution.
//!
//! Feed links are often tracking redirects or AMP variants. The canonical
//! form is the one a page declares about itself, falling back to wherever
//! the redirects ended.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::http::HttpFetch;
use crate::utils::fail_open;

static CANONICAL_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("link[rel~='canonical' i][href]").unwrap());
static OG_URL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[property='og:url' i][content]").unwrap());

/// Canonical URL of the page at `url`, or `url` itself on any failure.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn resolve<H: HttpFetch>(http: &H, url: &str) -> String {
    let resolved = fail_open("resolve_canonical", url, try_resolve(http, url).await, || {
        url.to_string()
    });
    if resolved != url {
        debug!(%resolved, "Resolved canonical URL");
    }
    resolved
}

async fn try_resolve<H: HttpFetch>(http: &H, url: &str) -> Result<String, Box<dyn Error>> {
    let page = http.get(url).await?;
    Ok(canonical_from_page(&page.body, &page.url)?)
}

/// URL a page declares as canonical, resolved against `final_url`.
///
/// Prefers `<link rel="canonical">`, then `<meta property="og:url">`, then
/// `final_url` itself.
pub fn canonical_from_page(html: &str, final_url: &str) -> Result<String, url::ParseError> {
    let base = Url::parse(final_url)?;
    let document = Html::parse_document(html);

    let declared = document
        .select(&CANONICAL_LINK)
        .filter_map(|el| el.value().attr("href"))
        .chain(
            document
                .select(&OG_URL)
                .filter_map(|el| el.value().attr("content")),
        )
        .map(str::trim)
        .find(|href| !href.is_empty());

    let canonical = declared
        .and_then(|href| base.join(href).ok())
        .unwrap_or(base);
    Ok(canonical.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHttp;

    #[test]
    fn test_link_rel_canonical_preferred() {
        let html = r#"<html><head>
            <meta property="og:url" content="https://example.com/og">
            <link rel="alternate canonical" href="/news/story-1">
        </head></html>"#;
        assert_eq!(
            canonical_from_page(html, "https://example.com/amp/story-1?utm=x").unwrap(),
            "https://example.com/news/story-1"
        );
    }

    #[test]
    fn test_og_url_fallback() {
        let html = r#"<html><head><meta property="OG:URL" content="https://example.com/og"></head></html>"#;
        assert_eq!(
            canonical_from_page(html, "https://example.com/x").unwrap(),
            "https://example.com/og"
        );
    }

    #[test]
    fn test_final_url_when_nothing_declared() {
        let html = r#"<html><head><link rel="canonical" href="  "></head></html>"#;
        assert_eq!(
            canonical_from_page(html, "https://example.com/final").unwrap(),
            "https://example.com/final"
        );
    }

    #[tokio::test]
    async fn test_resolve_follows_redirect() {
        let http = FakeHttp::default().redirect(
            "https://t.co/abc",
            "https://example.com/story",
            "<html><head></head></html>",
        );
        assert_eq!(resolve(&http, "https://t.co/abc").await, "https://example.com/story");
    }

    #[tokio::test]
    async fn test_resolve_failure_returns_input() {
        let http = FakeHttp::default().status("https://example.com/gone", 410);
        assert_eq!(
            resolve(&http, "https://example.com/gone").await,
            "https://example.com/gone"
        );
    }
}
