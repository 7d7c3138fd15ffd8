pub mod discord;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ingest::{truncate_chars, Post};

pub use discord::DiscordNotifier;

pub const TITLE_CAP: usize = 256;
pub const DESCRIPTION_CAP: usize = 1000;
pub const DEFAULT_COLOR: u32 = 3_447_003;

/// Static presentation data of one source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMeta {
    pub name: String,
    pub color: Option<u32>,
}

/// Channel-specific wording around the post.
#[derive(Debug, Clone)]
pub struct EmbedLabels {
    /// Prefix of the trailing link, e.g. "Xem thêm trên" -> "[Xem thêm trên <source>](<link>)".
    pub see_more: String,
    /// Prefix of the footer, e.g. "Nguồn" -> "Nguồn: <author>".
    pub footer: String,
    pub default_color: u32,
}

impl Default for EmbedLabels {
    fn default() -> Self {
        Self {
            see_more: "Xem thêm trên".to_string(),
            footer: "Nguồn".to_string(),
            default_color: DEFAULT_COLOR,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub url: String,
    pub color: u32,
    pub timestamp: String,
    pub footer: EmbedFooter,
}

/// One embed for `post`: title capped at 256 chars, body at 1000 with an
/// ellipsis, followed by a link back to the original.
pub fn build_embed(post: &Post, meta: &SourceMeta, labels: &EmbedLabels) -> Embed {
    let body = truncate_chars(post.text.trim(), DESCRIPTION_CAP, "...");
    let see_more = format!("[{} {}]({})", labels.see_more, meta.name, post.link);
    let description = if body.is_empty() {
        see_more
    } else {
        format!("{body}\n\n{see_more}")
    };

    Embed {
        title: truncate_chars(&post.title, TITLE_CAP, ""),
        description,
        url: post.link.clone(),
        color: meta.color.unwrap_or(labels.default_color),
        timestamp: iso_timestamp(post.timestamp),
        footer: EmbedFooter {
            text: format!("{}: {}", labels.footer, post.author),
        },
    }
}

fn iso_timestamp(ts: f64) -> String {
    let secs = ts.floor() as i64;
    let nanos = ((ts - ts.floor()) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}

/// Delivery of one post to the channel. `false` means the post was not
/// delivered and must not be marked as seen.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, post: &Post, meta: &SourceMeta) -> bool;
}
