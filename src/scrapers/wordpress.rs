//! WordPress REST API adapter (DVB Burmese and similar sites).
//!
//! Listings come from `wp-json/wp/v2/posts`, which returns an array of post
//! objects with a nested `title.rendered`. When a feed is configured with a
//! plain site URL, the posts endpoint on that site's origin is used instead.
//!
//! The same API also serves full post bodies, which the article extractor
//! prefers over scraping the page (see [`post_api_url`]).

use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::http::HttpFetch;
use crate::models::Item;

const POSTS_PATH: &str = "/wp-json/wp/v2/posts?per_page=10&_fields=id,link,date,title";

static POST_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/archives/(\d+)|[?&]p=(\d+)").unwrap());

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    title: Option<Rendered>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostBody {
    #[serde(default)]
    content: Option<Rendered>,
}

/// WordPress renders text fields either as `{"rendered": "..."}` or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Rendered {
    Object { rendered: String },
    Plain(String),
}

impl Rendered {
    fn into_string(self) -> String {
        match self {
            Rendered::Object { rendered } => rendered,
            Rendered::Plain(s) => s,
        }
    }
}

/// Fetch and parse the posts listing for `url`.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch<H: HttpFetch>(http: &H, url: &str) -> Result<Vec<Item>, Box<dyn Error>> {
    let api = listing_url(url)?;
    let page = http.get(&api).await?;
    let items = parse_posts(&page.body)?;
    info!(%api, count = items.len(), "Parsed WordPress posts");
    Ok(items)
}

/// The posts endpoint to query for a configured feed URL.
///
/// URLs already pointing into `/wp-json/` are used as-is.
pub fn listing_url(url: &str) -> Result<String, url::ParseError> {
    let url = url.trim();
    if url.contains("/wp-json/") {
        return Ok(url.to_string());
    }
    let origin = Url::parse(url)?.origin().ascii_serialization();
    Ok(format!("{origin}{POSTS_PATH}"))
}

/// Parse a posts listing into items.
///
/// Entries that are not objects, or lack a title or link, are skipped. A
/// body that is valid JSON but not an array yields no items.
pub fn parse_posts(body: &str) -> Result<Vec<Item>, serde_json::Error> {
    let Value::Array(entries) = serde_json::from_str::<Value>(body)? else {
        warn!("Posts response is not an array");
        return Ok(Vec::new());
    };

    let items = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<Post>(entry).ok())
        .filter_map(|post| {
            let link = post.link.map(|l| l.trim().to_string()).unwrap_or_default();
            let title = post
                .title
                .map(|t| decode_html_entities(t.into_string().trim()).into_owned())
                .unwrap_or_default();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            let date = post.date.unwrap_or_default();
            Some(Item::from_link(title, link, date.clone(), date))
        })
        .collect();
    Ok(items)
}

/// REST endpoint holding the body of the post at `link`, if its id is visible.
///
/// Recognizes `/archives/<id>` permalinks and `?p=<id>` links.
pub fn post_api_url(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let caps = POST_ID.captures(link)?;
    let id = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let api = format!("{}/wp-json/wp/v2/posts/{id}", url.origin().ascii_serialization());
    debug!(%link, %api, "Derived post API URL");
    Some(api)
}

/// Rendered HTML body of a single-post response.
pub fn parse_post_html(body: &str) -> Result<String, serde_json::Error> {
    let post: PostBody = serde_json::from_str(body)?;
    Ok(post.content.map(Rendered::into_string).unwrap_or_default())
}
