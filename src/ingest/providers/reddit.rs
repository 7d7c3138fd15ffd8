// src/ingest/providers/reddit.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::ingest::types::{Post, SourceProvider};
use crate::ingest::{html_to_text, http_client, now_ts, truncate_chars, DESKTOP_UA};

const TEXT_CAP: usize = 500;

/// Which public listing to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedditEndpoint {
    /// Atom feed of the day's top posts, `old.reddit.com` hot feed as fallback.
    #[default]
    Rss,
    /// `hot.json` listing.
    Json,
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<String>,
    link: Option<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    author: Option<AtomAuthor>,
    content: Option<AtomContent>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct AtomContent {
    #[serde(rename = "$text", default)]
    value: String,
}

// --- JSON listing ---

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    score: i64,
    created_utc: Option<f64>,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    selftext: String,
}

/// Post id from a permalink: the segment after `/comments/`, else the link.
pub fn post_id_from_link(link: &str) -> String {
    link.split_once("/comments/")
        .and_then(|(_, rest)| rest.split('/').next())
        .filter(|id| !id.is_empty())
        .unwrap_or(link)
        .to_string()
}

fn parse_rfc3339_to_unix(ts: &str) -> Option<f64> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .map(|dt| dt.unix_timestamp() as f64)
}

fn author_label(name: &str) -> String {
    let name = name.trim().trim_start_matches("/u/").trim_start_matches("u/");
    if name.is_empty() {
        "Unknown".to_string()
    } else {
        format!("u/{name}")
    }
}

fn body_text(raw: &str, empty_label: String) -> String {
    let text = truncate_chars(&html_to_text(raw), TEXT_CAP, "...");
    if text.is_empty() {
        empty_label
    } else {
        text
    }
}

/// Atom entries to posts. An entry without a date gets "now", which is not
/// stable across runs; reddit sources run in id-set mode for that reason.
pub fn parse_atom(xml: &str) -> Result<Vec<Post>> {
    let feed: Feed = from_str(xml).context("parsing reddit atom feed")?;
    Ok(feed
        .entries
        .into_iter()
        .filter_map(|e| {
            let link = e.link.map(|l| l.href).filter(|l| !l.is_empty())?;
            let ts = e
                .published
                .as_deref()
                .or(e.updated.as_deref())
                .and_then(parse_rfc3339_to_unix)
                .unwrap_or_else(now_ts);
            let author = author_label(&e.author.map(|a| a.name).unwrap_or_default());
            let text = body_text(
                &e.content.map(|c| c.value).unwrap_or_default(),
                "View post on Reddit".to_string(),
            );
            Some(
                Post::new(e.title.unwrap_or_default(), "No Title", link.clone(), ts, author)
                    .with_text(text)
                    .with_id(post_id_from_link(&link)),
            )
        })
        .collect())
}

pub fn parse_listing_json(body: &str) -> Result<Vec<Post>> {
    let listing: Listing = serde_json::from_str(body).context("parsing reddit json listing")?;
    Ok(listing
        .data
        .children
        .into_iter()
        .map(|c| {
            let p = c.data;
            let link = format!("https://www.reddit.com{}", p.permalink);
            let text = body_text(&p.selftext, format!("Score: {} points", p.score));
            let id = if p.id.is_empty() {
                post_id_from_link(&link)
            } else {
                p.id
            };
            Post::new(
                p.title,
                "No Title",
                link,
                p.created_utc.unwrap_or_else(now_ts),
                author_label(&p.author),
            )
            .with_text(text)
            .with_id(id)
        })
        .collect())
}

/// One subreddit.
pub struct RedditProvider {
    subreddit: String,
    post_limit: u32,
    endpoint: RedditEndpoint,
    client: reqwest::Client,
}

impl RedditProvider {
    pub fn new(subreddit: &str, post_limit: u32, endpoint: RedditEndpoint, timeout_secs: u64) -> Self {
        Self {
            subreddit: subreddit.to_string(),
            post_limit,
            endpoint,
            client: http_client(DESKTOP_UA, timeout_secs),
        }
    }

    pub fn primary_url(&self) -> String {
        match self.endpoint {
            RedditEndpoint::Rss => format!(
                "https://www.reddit.com/r/{}/top/.rss?t=day&limit={}",
                self.subreddit, self.post_limit
            ),
            RedditEndpoint::Json => format!(
                "https://www.reddit.com/r/{}/hot.json?limit={}",
                self.subreddit, self.post_limit
            ),
        }
    }

    fn fallback_url(&self) -> Option<String> {
        match self.endpoint {
            RedditEndpoint::Rss => Some(format!("https://old.reddit.com/r/{}/hot/.rss", self.subreddit)),
            RedditEndpoint::Json => None,
        }
    }

    async fn get_ok(&self, url: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("reddit http get {url}"))?;
        if resp.status() != reqwest::StatusCode::OK {
            tracing::warn!(status = %resp.status(), subreddit = %self.subreddit, url, "reddit non-200");
            return Ok(None);
        }
        Ok(Some(resp.text().await.context("reddit body")?))
    }
}

#[async_trait]
impl SourceProvider for RedditProvider {
    async fn fetch_latest(&self) -> Result<Vec<Post>> {
        let t0 = std::time::Instant::now();
        let mut body = self.get_ok(&self.primary_url()).await?;
        if body.is_none() {
            if let Some(alt) = self.fallback_url() {
                body = self.get_ok(&alt).await?;
            }
        }
        let Some(body) = body else {
            bail!("reddit r/{} unavailable", self.subreddit);
        };
        let out = match self.endpoint {
            RedditEndpoint::Rss => parse_atom(&body)?,
            RedditEndpoint::Json => parse_listing_json(&body)?,
        };

        histogram!("relay_fetch_ms", "provider" => self.name())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("relay_candidates_total", "provider" => self.name()).increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}
