//! Book lookup against Douban subject pages.
//!
//! `GET {base_url}{isbn}` redirects to the book's subject page. The page is
//! scraped with a handful of anchored patterns: the cover block (`#mainpic`)
//! carries title and cover, the `#info` block carries `label: value` lines
//! separated by `<br>`, and the rating sits in a `rating_num` element.

use super::normalize::{parse_pages, parse_price, parse_publish_date, parse_score};
use super::{BookLookup, LookupError, LookupResult};
use async_trait::async_trait;
use booksync_types::{BookRecord, BookValue, Isbn};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

static MAINPIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<div[^>]*\bid="mainpic"[^>]*>(.*?)</div>"#).unwrap());
static ANCHOR_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a\b[^>]*\btitle="([^"]*)""#).unwrap());
static IMG_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<img\b[^>]*\bsrc="([^"]*)""#).unwrap());
static INFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<div[^>]*\bid="info"[^>]*>(.*?)</div>"#).unwrap());
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<strong[^>]*\brating_num\b[^>]*>(.*?)</strong>"#).unwrap()
});

/// Douban lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoubanConfig {
    /// Prefix the ISBN is appended to.
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for DoubanConfig {
    fn default() -> Self {
        Self {
            base_url: "https://douban.com/isbn/".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Looks books up by scraping Douban subject pages.
pub struct DoubanLookup {
    config: DoubanConfig,
    client: Client,
}

impl DoubanLookup {
    pub fn new(config: DoubanConfig) -> LookupResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LookupError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl BookLookup for DoubanLookup {
    async fn fetch_by_isbn(&self, isbn: &Isbn) -> LookupResult<BookRecord> {
        let url = format!("{}{}", self.config.base_url, isbn);
        debug!("Fetching book page {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::Transport(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            info!("No book page for ISBN {}", isbn);
            return Err(LookupError::NotFound(isbn.to_string()));
        }
        if !status.is_success() {
            return Err(LookupError::Transport(format!(
                "book page request failed ({status})"
            )));
        }

        let page_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| LookupError::Transport(format!("failed to read book page: {e}")))?;

        match parse_book_page(&html, &page_url) {
            Some(record) => {
                info!("Looked up \"{}\" for ISBN {}", record.title(), isbn);
                Ok(record)
            }
            None => {
                warn!("Book page {} has no title", page_url);
                Err(LookupError::NotFound(isbn.to_string()))
            }
        }
    }
}

/// Extracts a record from a Douban subject page. Returns `None` if the page
/// has no book title.
pub fn parse_book_page(html: &str, url: &str) -> Option<BookRecord> {
    let mainpic = MAINPIC.captures(html).map(|c| c.get(1).map_or("", |m| m.as_str()))?;
    let title = ANCHOR_TITLE
        .captures(mainpic)
        .map(|c| clean_text(&c[1]))
        .filter(|t| !t.is_empty())?;

    let mut record = BookRecord::new(title).ok()?;

    if let Some(cover) = IMG_SRC.captures(mainpic).map(|c| decode_entities(&c[1])) {
        if !cover.is_empty() {
            record.insert("cover_image", BookValue::image(cover));
        }
    }
    if !url.is_empty() {
        record.insert("url", BookValue::link(url));
    }

    if let Some(info) = INFO.captures(html) {
        for line in LINE_BREAK.split(&info[1]) {
            let text = clean_text(line);
            let Some((label, value)) = text.split_once([':', '：']) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            insert_info(&mut record, label.trim(), value);
        }
    }

    if let Some(score) = RATING.captures(html).and_then(|c| parse_score(&clean_text(&c[1]))) {
        record.insert("score", score);
    }

    Some(record)
}

fn insert_info(record: &mut BookRecord, label: &str, value: &str) {
    match label {
        "作者" => record.insert("author", value),
        "译者" => record.insert("translator", value),
        "出版社" => record.insert("publisher", value),
        "出品方" => record.insert("brand", value),
        "副标题" => record.insert("subtitle", value),
        "原作名" => record.insert("original_title", value),
        "丛书" => record.insert("series", value),
        "装帧" => record.insert("binding", value),
        "ISBN" => record.insert("isbn", value),
        "出版年" => {
            if let Some(date) = parse_publish_date(value) {
                record.insert("publish_date", date);
            }
        }
        "页数" => {
            if let Some(pages) = parse_pages(value) {
                record.insert("pages", pages);
            }
        }
        "定价" => {
            if let Some(price) = parse_price(value) {
                record.insert("price", price);
            }
        }
        _ => debug!("Ignoring info label {}", label),
    }
}

/// Strips tags, decodes entities and collapses whitespace.
fn clean_text(fragment: &str) -> String {
    let stripped = TAG.replace_all(fragment, " ");
    let decoded = decode_entities(&stripped);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
