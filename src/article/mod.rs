//! Article pages: canonical URL resolution and body text extraction.
//!
//! Both operations fail open. A page that cannot be fetched or parsed leaves
//! the link unchanged and yields an empty body, and dispatch carries on with
//! the summary message alone.

pub mod canonical;
pub mod extract;

use std::error::Error;
use tracing::{debug, instrument};

use crate::http::HttpFetch;
use crate::models::FeedKind;
use crate::scrapers::wordpress::{parse_post_html, post_api_url};
use crate::utils::fail_open;

/// Plain body text of the article at `link`, for a feed of kind `kind`.
///
/// WordPress posts are read from the REST API when the post id can be
/// derived from the link, since that body carries no site chrome. Anything
/// else, or an empty API body, goes through page extraction.
#[instrument(level = "info", skip_all, fields(%link, %kind))]
pub async fn fetch_body<H: HttpFetch>(http: &H, kind: FeedKind, link: &str) -> String {
    if kind == FeedKind::WordPress {
        if let Some(api) = post_api_url(link) {
            let text = fail_open("post_api_body", &api, post_api_text(http, &api).await, String::new);
            if !text.is_empty() {
                debug!(chars = text.chars().count(), "Body taken from post API");
                return text;
            }
        }
    }
    extract::extract(http, link).await
}

async fn post_api_text<H: HttpFetch>(http: &H, api: &str) -> Result<String, Box<dyn Error>> {
    let page = http.get(api).await?;
    let html = parse_post_html(&page.body)?;
    Ok(extract::text_from_html(&html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHttp;

    const LINK: &str = "https://burmese.dvb.no/archives/612345";
    const API: &str = "https://burmese.dvb.no/wp-json/wp/v2/posts/612345";

    #[tokio::test]
    async fn test_wordpress_body_prefers_post_api() {
        let http = FakeHttp::default()
            .page(API, r#"{"content": {"rendered": "<p>From the API.</p>"}}"#)
            .page(LINK, "<html><body><article><p>From the page.</p></article></body></html>");
        let body = fetch_body(&http, FeedKind::WordPress, LINK).await;
        assert_eq!(body, "From the API.");
        assert_eq!(http.requested(), vec![API.to_string()]);
    }

    #[tokio::test]
    async fn test_wordpress_body_falls_back_to_page() {
        let http = FakeHttp::default()
            .status(API, 401)
            .page(LINK, "<html><body><article><p>From the page.</p></article></body></html>");
        let body = fetch_body(&http, FeedKind::WordPress, LINK).await;
        assert_eq!(body, "From the page.");
    }

    #[tokio::test]
    async fn test_other_kinds_skip_post_api() {
        let http = FakeHttp::default()
            .page(LINK, "<html><body><main><p>Scraped.</p></main></body></html>");
        let body = fetch_body(&http, FeedKind::Rss, LINK).await;
        assert_eq!(body, "Scraped.");
        assert_eq!(http.requested(), vec![LINK.to_string()]);
    }
}
