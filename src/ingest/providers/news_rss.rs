// src/ingest/providers/news_rss.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use scraper::{Html, Selector};
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::types::{Post, SourceProvider};
use crate::ingest::{http_client, truncate_chars, DESKTOP_UA};

const MAX_ITEMS: usize = 50;
const TEXT_CAP: usize = 1000;
const MIN_PARAGRAPH_CHARS: usize = 20;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "$text", default)]
    name: String,
    #[serde(rename = "@url", default)]
    url: String,
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<f64> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .map(|dt| dt.unix_timestamp() as f64)
}

/// Keyword search on the news aggregator's RSS, restricted to one outlet.
pub struct NewsSearchProvider {
    rss_url: String,
    site_filter: String,
    author: String,
    client: reqwest::Client,
}

impl NewsSearchProvider {
    pub fn new(keyword: &str, site_filter: &str, timeout_secs: u64) -> Self {
        Self {
            rss_url: search_url(keyword),
            site_filter: site_filter.to_ascii_lowercase(),
            author: format!("{site_filter}.com"),
            client: http_client(DESKTOP_UA, timeout_secs),
        }
    }

    /// Items without a parseable `pubDate` are skipped, as are items whose
    /// link and outlet name both miss the site filter.
    pub fn parse_feed(&self, xml: &str) -> Result<Vec<Post>> {
        let rss: Rss = from_str(xml).context("parsing news search rss")?;
        let mut out = Vec::new();
        for it in rss.channel.item.into_iter().take(MAX_ITEMS) {
            let Some(link) = it.link.filter(|l| !l.is_empty()) else {
                continue;
            };
            let Some(ts) = it.pub_date.as_deref().and_then(parse_rfc2822_to_unix) else {
                continue;
            };
            let outlet = it
                .source
                .as_ref()
                .map(|s| format!("{} {}", s.name, s.url).to_ascii_lowercase())
                .unwrap_or_default();
            if !link.to_ascii_lowercase().contains(&self.site_filter)
                && !outlet.contains(&self.site_filter)
            {
                continue;
            }
            let id = it.guid.map(|g| g.value).unwrap_or_default();
            out.push(
                Post::new(
                    it.title.unwrap_or_default(),
                    "News Update",
                    link.clone(),
                    ts,
                    self.author.clone(),
                )
                .with_id(if id.trim().is_empty() { link } else { id }),
            );
        }
        Ok(out)
    }
}

pub fn search_url(keyword: &str) -> String {
    let q: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
    format!("https://news.google.com/rss/search?q={q}&hl=zh-CN&gl=CN&ceid=CN:zh-Hans")
}

/// Readable paragraphs of an article page, capped.
pub fn extract_paragraphs(html: &str) -> String {
    static P: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
    let doc = Html::parse_document(html);
    let text = doc
        .select(&P)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|t| t.chars().count() > MIN_PARAGRAPH_CHARS)
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&text, TEXT_CAP, "")
}

#[async_trait]
impl SourceProvider for NewsSearchProvider {
    async fn fetch_latest(&self) -> Result<Vec<Post>> {
        let t0 = std::time::Instant::now();
        let resp = self
            .client
            .get(&self.rss_url)
            .send()
            .await
            .context("news search http get")?;
        if !resp.status().is_success() {
            bail!("news search returned HTTP {}", resp.status());
        }
        let body = resp.text().await.context("news search body")?;
        let out = self.parse_feed(&body)?;

        histogram!("relay_fetch_ms", "provider" => self.name())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("relay_candidates_total", "provider" => self.name()).increment(out.len() as u64);
        Ok(out)
    }

    /// Follows the aggregator redirect to the outlet and pulls the body text.
    async fn hydrate(&self, post: Post) -> Post {
        let resp = match self.client.get(&post.link).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = ?e, link = %post.link, "news article fetch failed");
                return post;
            }
        };
        let resolved = resp.url().to_string();
        if !resp.status().is_success() {
            return Post {
                link: resolved,
                ..post
            };
        }
        match resp.text().await {
            Ok(html) => Post {
                text: extract_paragraphs(&html),
                link: resolved,
                ..post
            },
            Err(e) => {
                tracing::warn!(error = ?e, link = %resolved, "news article body failed");
                Post {
                    link: resolved,
                    ..post
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "news_search"
    }
}
