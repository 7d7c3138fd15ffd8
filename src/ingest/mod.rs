// src/ingest/mod.rs
pub mod providers;
pub mod types;

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::time::Duration;

pub use types::{fetch_candidates, Post, SourceProvider};

/// Desktop browser UA shared by the adapters that do not need a mobile one.
pub const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// One-time metrics registration (so series carry descriptions).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        use metrics::{describe_counter, describe_gauge, describe_histogram};
        describe_counter!("relay_candidates_total", "Candidate posts listed by providers.");
        describe_counter!("relay_new_posts_total", "Posts selected as new by the novelty filter.");
        describe_counter!("relay_notified_total", "Posts delivered to the webhook.");
        describe_counter!(
            "relay_notify_failures_total",
            "Webhook deliveries that did not return 204."
        );
        describe_counter!("relay_source_errors_total", "Provider fetch/parse errors.");
        describe_histogram!("relay_fetch_ms", "Provider listing time in milliseconds.");
        describe_gauge!("relay_last_run_ts", "Unix ts when the relay last ran.");
    });
}

/// HTTP client with a fixed user agent and bounded timeouts.
pub fn http_client(user_agent: &str, timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "falling back to default http client");
            reqwest::Client::new()
        })
}

/// Turn an HTML fragment into plain text: decode entities, drop tags,
/// collapse runs of blanks while keeping line breaks.
pub fn html_to_text(s: &str) -> String {
    static RE_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</p>").unwrap());
    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]+>").unwrap());
    static RE_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());
    static RE_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n+").unwrap());

    let out = RE_BR.replace_all(s, "\n");
    let out = RE_TAGS.replace_all(&out, "");
    let out = html_escape::decode_html_entities(&out).to_string();
    let out = RE_BLANKS.replace_all(&out, " ");
    let out = RE_LINES.replace_all(&out, "\n\n");
    out.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Cap `s` at `cap` chars; longer input keeps `cap - marker` chars plus the marker.
pub fn truncate_chars(s: &str, cap: usize, marker: &str) -> String {
    if s.chars().count() <= cap {
        return s.to_string();
    }
    let keep = cap.saturating_sub(marker.chars().count());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(marker);
    out
}

/// China Standard Time (UTC+8); the Chinese sources publish local times.
pub fn china_offset() -> Option<chrono::FixedOffset> {
    chrono::FixedOffset::east_opt(8 * 3600)
}

/// Current time as float unix seconds.
pub fn now_ts() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1_000.0
}
