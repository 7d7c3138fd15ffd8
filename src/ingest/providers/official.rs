// src/ingest/providers/official.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone};
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;

use crate::ingest::types::{Post, SourceProvider};
use crate::ingest::{china_offset, html_to_text, http_client, now_ts, DESKTOP_UA};

pub const DEFAULT_LISTING_URL: &str = "https://www.yysls.cn/news/";
const AUTHOR: &str = "Official Site";
const MAX_LINKS: usize = 5;
const FALLBACK_TITLE: &str = "Official News Update";
const FALLBACK_TEXT: &str = "Could not scrape content.";

/// Article links on the listing page, first occurrence order, capped.
pub fn extract_article_links(html: &str) -> Vec<String> {
    static RE_LINK: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"href="(https://www\.yysls\.cn/news/[^"]*?\.html)""#).unwrap());
    let mut seen = HashSet::new();
    RE_LINK
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .filter(|l| seen.insert(l.clone()))
        .take(MAX_LINKS)
        .collect()
}

/// Stable timestamp from a link like `.../20260203/40412_1285159.html`:
/// the date at 00:00 CST plus the trailing id modulo one day, so posts from
/// the same day stay distinct and never move between runs.
///
/// The offset wraps, so within one day a newer article can sort before an
/// older one. Only the date part orders posts reliably; dedup for this
/// source goes by link.
pub fn timestamp_from_link(link: &str) -> Option<f64> {
    static RE_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(\d{8})/").unwrap());
    static RE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\.html$").unwrap());

    let date = RE_DATE.captures(link)?;
    let day = NaiveDate::parse_from_str(&date[1], "%Y%m%d").ok()?;
    let midnight = china_offset()?
        .from_local_datetime(&day.and_hms_opt(0, 0, 0)?)
        .single()?
        .timestamp();
    let offset = RE_ID
        .captures(link)
        .and_then(|c| c[1].parse::<u64>().ok())
        .map(|id| id % 86_400)
        .unwrap_or(0);
    Some((midnight + offset as i64) as f64)
}

/// Title, body text, and media scraped from an article page.
#[derive(Debug, Default, PartialEq)]
pub struct ArticleDetails {
    pub title: String,
    pub text: String,
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

pub fn parse_article(html: &str) -> ArticleDetails {
    static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
    static BODY: Lazy<Selector> = Lazy::new(|| {
        Selector::parse(".content, .news-detail, .art_content, .main_content, #content").unwrap()
    });
    static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
    static VIDEO: Lazy<Selector> = Lazy::new(|| Selector::parse("video").unwrap());
    static SOURCE: Lazy<Selector> = Lazy::new(|| Selector::parse("source").unwrap());
    static IFRAME: Lazy<Selector> = Lazy::new(|| Selector::parse("iframe").unwrap());

    let doc = Html::parse_document(html);
    let title = doc
        .select(&H1)
        .next()
        .map(|n| n.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Official News".to_string());

    let Some(body) = doc.select(&BODY).next() else {
        return ArticleDetails {
            title,
            text: join_text(doc.root_element().text()),
            ..Default::default()
        };
    };

    let images = body
        .select(&IMG)
        .filter_map(|img| img.value().attr("src").or(img.value().attr("data-src")))
        .filter(|src| src.starts_with("http"))
        .map(str::to_string)
        .collect();

    let mut videos: Vec<String> = body
        .select(&VIDEO)
        .filter_map(|v| {
            v.value().attr("src").map(str::to_string).or_else(|| {
                v.select(&SOURCE)
                    .next()
                    .and_then(|s| s.value().attr("src"))
                    .map(str::to_string)
            })
        })
        .collect();
    videos.extend(
        body.select(&IFRAME)
            .filter_map(|f| f.value().attr("src"))
            .map(str::to_string),
    );

    ArticleDetails {
        title,
        text: join_text(body.text()),
        images,
        videos,
    }
}

fn join_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let joined = parts
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    html_to_text(&joined)
}

/// Official news site: listing page scrape, article pages fetched on hydrate.
pub struct OfficialProvider {
    listing_url: String,
    client: reqwest::Client,
}

impl OfficialProvider {
    pub fn new(listing_url: Option<&str>, timeout_secs: u64) -> Self {
        Self {
            listing_url: listing_url.unwrap_or(DEFAULT_LISTING_URL).to_string(),
            client: http_client(DESKTOP_UA, timeout_secs),
        }
    }

    /// Candidates from a listing page body. Links without a date get "now",
    /// which is not stable across runs; such posts are better served by
    /// id-set mode.
    pub fn parse_listing(html: &str) -> Vec<Post> {
        extract_article_links(html)
            .into_iter()
            .map(|link| {
                let ts = timestamp_from_link(&link).unwrap_or_else(|| {
                    tracing::debug!(%link, "no date in official link; using now");
                    now_ts()
                });
                Post::new("", FALLBACK_TITLE, link.clone(), ts, AUTHOR)
                    .with_text(FALLBACK_TEXT)
                    .with_id(link)
            })
            .collect()
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("official http get {url}"))?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            bail!("official site returned HTTP {status}");
        }
        let bytes = resp.bytes().await.context("official body")?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[async_trait]
impl SourceProvider for OfficialProvider {
    async fn fetch_latest(&self) -> Result<Vec<Post>> {
        let t0 = std::time::Instant::now();
        let body = self.get_text(&self.listing_url).await?;
        let out = Self::parse_listing(&body);

        histogram!("relay_fetch_ms", "provider" => self.name())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("relay_candidates_total", "provider" => self.name()).increment(out.len() as u64);
        Ok(out)
    }

    async fn hydrate(&self, post: Post) -> Post {
        match self.get_text(&post.link).await {
            Ok(html) => {
                let details = parse_article(&html);
                Post {
                    title: details.title,
                    text: details.text,
                    images: details.images,
                    videos: details.videos,
                    ..post
                }
            }
            Err(e) => {
                tracing::warn!(error = ?e, link = %post.link, "official article scrape failed");
                post
            }
        }
    }

    fn name(&self) -> &'static str {
        "official"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_timestamp_uses_date_and_id_offset() {
        let ts = timestamp_from_link("https://www.yysls.cn/news/official/20260203/40412_1285159.html")
            .unwrap();
        // 2026-02-03 00:00 +08:00 == 2026-02-02 16:00 UTC
        let midnight = 1_770_048_000.0;
        assert_eq!(ts, midnight + (1_285_159 % 86_400) as f64);
    }

    #[test]
    fn id_offset_wraps_within_a_day() {
        let earlier = timestamp_from_link("https://www.yysls.cn/news/official/20260203/40412_1295999.html")
            .unwrap();
        let later = timestamp_from_link("https://www.yysls.cn/news/official/20260203/40413_1296001.html")
            .unwrap();
        assert_eq!(earlier, 1_770_134_399.0);
        assert_eq!(later, 1_770_048_001.0);
        assert!(later < earlier);

        // the date still dominates across days
        let next_day = timestamp_from_link("https://www.yysls.cn/news/official/20260204/40414_1296002.html")
            .unwrap();
        assert!(next_day > earlier);
    }

    #[test]
    fn link_without_date_has_no_timestamp() {
        assert!(timestamp_from_link("https://www.yysls.cn/news/about.html").is_none());
    }

    #[test]
    fn listing_links_are_unique_and_capped() {
        let mut html = String::new();
        for i in 0..8 {
            let l = format!("https://www.yysls.cn/news/official/20260101/1_{i}.html");
            html.push_str(&format!(r#"<a href="{l}">a</a><a href="{l}">again</a>"#));
        }
        let links = extract_article_links(&html);
        assert_eq!(links.len(), 5);
        assert!(links[0].ends_with("1_0.html"));
        assert!(links[4].ends_with("1_4.html"));
    }
}
