// src/ingest/providers/dashen.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone};
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use scraper::{ElementRef, Html, Selector};

use crate::ingest::types::{Post, SourceProvider};
use crate::ingest::{china_offset, html_to_text, http_client};

const MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Mobile/15E148 Safari/604.1";
const FEED_BASE: &str = "https://ds.163.com/feed/";
const AUTHOR: &str = "NetEase Dashen";

static CARD: Lazy<Selector> = Lazy::new(|| Selector::parse(".feed-card").unwrap());
static TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".feed-card__content-title").unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time.time-location__time").unwrap());
static TEXT: Lazy<Selector> = Lazy::new(|| Selector::parse(".feed-text").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

/// Seconds encoded in the first 8 hex chars of an ObjectId-style card id.
pub fn timestamp_from_object_id(id: &str) -> Option<f64> {
    let head = id.get(..8)?;
    u32::from_str_radix(head, 16).ok().map(f64::from)
}

/// Parse the profile page's relative time labels ("4小时前", "昨天 23:58",
/// "01-31", ...) against `now`. Unknown shapes fall back to `now`, which is
/// not stable across runs.
pub fn parse_relative_time(label: &str, now: DateTime<FixedOffset>) -> f64 {
    static HOURS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)小时前").unwrap());
    static MINUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)分钟前").unwrap());
    static YESTERDAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"昨天\s*(\d{1,2}):(\d{2})").unwrap());
    static BEFORE_YESTERDAY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"前天\s*(\d{1,2}):(\d{2})").unwrap());
    static FULL_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})[/-](\d{1,2})[/-](\d{1,2})").unwrap());
    static SHORT_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})[/-](\d{1,2})").unwrap());

    let label = label.trim();
    let num = |c: &regex::Captures, i: usize| c[i].parse::<i64>().unwrap_or(0);
    let fallback = now.timestamp() as f64;

    let ago = |d: Option<Duration>| {
        d.and_then(|d| now.checked_sub_signed(d))
            .map(|t| t.timestamp() as f64)
            .unwrap_or(fallback)
    };

    if let Some(c) = HOURS.captures(label) {
        return ago(Duration::try_hours(num(&c, 1)));
    }
    if let Some(c) = MINUTES.captures(label) {
        return ago(Duration::try_minutes(num(&c, 1)));
    }
    if label.contains("刚刚") {
        return fallback;
    }
    let at_day = |days_back: i64, c: &regex::Captures| {
        let day = (now - Duration::days(days_back)).date_naive();
        local_ts(now.offset(), day, num(c, 1) as u32, num(c, 2) as u32)
    };
    if let Some(c) = YESTERDAY.captures(label) {
        return at_day(1, &c).unwrap_or(fallback);
    }
    if let Some(c) = BEFORE_YESTERDAY.captures(label) {
        return at_day(2, &c).unwrap_or(fallback);
    }
    if let Some(c) = FULL_DATE.captures(label) {
        return NaiveDate::from_ymd_opt(num(&c, 1) as i32, num(&c, 2) as u32, num(&c, 3) as u32)
            .and_then(|d| local_ts(now.offset(), d, 0, 0))
            .unwrap_or(fallback);
    }
    if let Some(c) = SHORT_DATE.captures(label) {
        let (month, day) = (num(&c, 1) as u32, num(&c, 2) as u32);
        let this_year = NaiveDate::from_ymd_opt(now.year(), month, day);
        // a month/day later than today belongs to last year
        let date = match this_year {
            Some(d) if d > now.date_naive() => NaiveDate::from_ymd_opt(now.year() - 1, month, day),
            other => other,
        };
        return date
            .and_then(|d| local_ts(now.offset(), d, 0, 0))
            .unwrap_or(fallback);
    }
    tracing::debug!(label, "unrecognized dashen time label; using now");
    fallback
}

fn local_ts(offset: &FixedOffset, day: NaiveDate, hour: u32, minute: u32) -> Option<f64> {
    let naive = day.and_hms_opt(hour, minute, 0)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp() as f64)
}

/// Parse every `.feed-card` on a profile page. A card without an id is
/// skipped; the rest of the page still counts.
pub fn parse_profile(html: &str, now: DateTime<FixedOffset>) -> Vec<Post> {
    let doc = Html::parse_document(html);
    doc.select(&CARD)
        .filter_map(|card| parse_card(card, now))
        .collect()
}

fn parse_card(card: ElementRef<'_>, now: DateTime<FixedOffset>) -> Option<Post> {
    let feed_id = card.value().id().filter(|id| !id.is_empty())?;

    let title = card
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();

    let ts = timestamp_from_object_id(feed_id).unwrap_or_else(|| {
        let label = card
            .select(&TIME)
            .next()
            .map(|t| t.text().collect::<String>())
            .unwrap_or_default();
        parse_relative_time(&label, now)
    });

    let text = card
        .select(&TEXT)
        .next()
        .map(|t| html_to_text(&t.text().collect::<Vec<_>>().join("\n")))
        .unwrap_or_default();

    let images = card
        .select(&IMG)
        .filter_map(|img| img.value().attr("src").or(img.value().attr("data-src")))
        .filter(|src| src.starts_with("http") && !src.contains("thumbnail"))
        .map(str::to_string)
        .collect();

    let mut post = Post::new(
        title,
        "Dashen Update",
        format!("{FEED_BASE}{feed_id}/"),
        ts,
        AUTHOR,
    )
    .with_text(text)
    .with_id(feed_id);
    post.images = images;
    Some(post)
}

/// One user's public profile on the Dashen social feed.
pub struct DashenProvider {
    profile_url: String,
    client: reqwest::Client,
}

impl DashenProvider {
    pub fn new(user_id: &str, timeout_secs: u64) -> Self {
        Self {
            profile_url: format!("https://ds.163.com/user/{user_id}/"),
            client: http_client(MOBILE_UA, timeout_secs),
        }
    }

    fn headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"));
        h.insert(REFERER, HeaderValue::from_static("https://ds.163.com/"));
        h
    }
}

#[async_trait]
impl SourceProvider for DashenProvider {
    async fn fetch_latest(&self) -> Result<Vec<Post>> {
        let t0 = std::time::Instant::now();
        let resp = self
            .client
            .get(&self.profile_url)
            .headers(Self::headers())
            .send()
            .await
            .context("dashen http get")?;
        if resp.status() != reqwest::StatusCode::OK {
            bail!("dashen returned HTTP {}", resp.status());
        }
        let bytes = resp.bytes().await.context("dashen body")?;
        let html = String::from_utf8_lossy(&bytes);

        let now = match china_offset() {
            Some(cst) => chrono::Utc::now().with_timezone(&cst),
            None => chrono::Utc::now().fixed_offset(),
        };
        let out = parse_profile(&html, now);

        histogram!("relay_fetch_ms", "provider" => self.name())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("relay_candidates_total", "provider" => self.name()).increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "dashen"
    }
}
