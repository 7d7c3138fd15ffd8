// src/config/relay.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::providers::reddit::RedditEndpoint;
use crate::watermark::DedupMode;

pub const ENV_CONFIG_PATH: &str = "RELAY_CONFIG_PATH";
pub const ENV_WEBHOOK_URL: &str = "WEBHOOK_URL";
pub const ENV_STATE_PATH: &str = "RELAY_STATE_PATH";
pub const ENV_TARGET_LANG: &str = "RELAY_TARGET_LANG";

fn default_state_path() -> PathBuf {
    PathBuf::from("data/history.json")
}
fn default_source_lang() -> String {
    "zh-CN".to_string()
}
fn default_target_lang() -> String {
    "vi".to_string()
}
fn default_see_more() -> String {
    "Xem thêm trên".to_string()
}
fn default_footer() -> String {
    "Nguồn".to_string()
}
fn default_color() -> u32 {
    crate::notify::DEFAULT_COLOR
}
fn default_timeout() -> u64 {
    20
}
fn default_true() -> bool {
    true
}
fn default_site_filter() -> String {
    "17173".to_string()
}
fn default_post_limit() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Usually supplied through `WEBHOOK_URL` rather than the file.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_source_lang")]
    pub source_lang: String,
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    /// `false` sends titles and text untranslated.
    #[serde(default = "default_true")]
    pub translate: bool,
    #[serde(default = "default_see_more")]
    pub see_more_label: String,
    #[serde(default = "default_footer")]
    pub footer_label: String,
    #[serde(default = "default_color")]
    pub default_color: u32,
    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Watermark key; must be unique and stable across releases.
    pub key: String,
    /// Display name used in the embed.
    pub name: String,
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default)]
    pub mode: DedupMode,
    /// Overrides the global source language (e.g. "auto" for Reddit).
    #[serde(default)]
    pub source_lang: Option<String>,
    /// Oldest-first cap of posts notified per run.
    #[serde(default)]
    pub max_per_run: Option<usize>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    Official {
        #[serde(default)]
        listing_url: Option<String>,
    },
    NewsSearch {
        keyword: String,
        #[serde(default = "default_site_filter")]
        site_filter: String,
    },
    Dashen {
        user_id: String,
    },
    Reddit {
        subreddit: String,
        #[serde(default = "default_post_limit")]
        post_limit: u32,
        #[serde(default)]
        endpoint: RedditEndpoint,
    },
}

/// The deployment this relay was written for.
pub fn default_sources() -> Vec<SourceConfig> {
    let source = |key: &str, name: &str, color: u32, mode: DedupMode, kind: SourceKind| SourceConfig {
        key: key.to_string(),
        name: name.to_string(),
        color: Some(color),
        mode,
        source_lang: None,
        max_per_run: None,
        enabled: true,
        kind,
    };
    let reddit = |key: &str, sub: &str| SourceConfig {
        source_lang: Some("auto".to_string()),
        ..source(
            key,
            &format!("Reddit r/{sub}"),
            16_729_344,
            DedupMode::IdSet,
            SourceKind::Reddit {
                subreddit: sub.to_string(),
                post_limit: default_post_limit(),
                endpoint: RedditEndpoint::Rss,
            },
        )
    };
    vec![
        // link-derived times can invert within a day; the link is a stable id
        source(
            "last_official_time",
            "Official Website",
            15_844_367,
            DedupMode::IdSet,
            SourceKind::Official { listing_url: None },
        ),
        source(
            "last_google_news_time",
            "17173.com",
            16_750_848,
            DedupMode::Timestamp,
            SourceKind::NewsSearch {
                keyword: "燕云十六声".to_string(),
                site_filter: default_site_filter(),
            },
        ),
        source(
            "last_dashen_time",
            "NetEase Dashen",
            15_484_743,
            DedupMode::Timestamp,
            SourceKind::Dashen {
                user_id: "c47870f2c5f142a58ea746fbc4655165".to_string(),
            },
        ),
        reddit("last_reddit_wherewindsmeet_time", "WhereWindsMeet"),
        reddit("last_reddit_wherewindsmeet_alt_time", "wherewindsmeet_"),
    ]
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            state_path: default_state_path(),
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            translate: true,
            see_more_label: default_see_more(),
            footer_label: default_footer(),
            default_color: default_color(),
            http_timeout_secs: default_timeout(),
            sources: default_sources(),
        }
    }
}

impl RelayConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading relay config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => serde_json::from_str(&content).context("parsing relay config json"),
            _ => toml::from_str(&content).context("parsing relay config toml"),
        }
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $RELAY_CONFIG_PATH
    /// 2) config/relay.toml
    /// 3) config/relay.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = Self::locate()?;
        cfg.apply_env();
        Ok(cfg)
    }

    fn locate() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in ["config/relay.toml", "config/relay.json"] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        Ok(Self::default())
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(ENV_WEBHOOK_URL) {
            if !v.trim().is_empty() {
                self.webhook_url = Some(v.trim().to_string());
            }
        }
        if let Ok(v) = std::env::var(ENV_STATE_PATH) {
            if !v.trim().is_empty() {
                self.state_path = PathBuf::from(v.trim());
            }
        }
        if let Ok(v) = std::env::var(ENV_TARGET_LANG) {
            if !v.trim().is_empty() {
                self.target_lang = v.trim().to_string();
            }
        }
    }

    /// Webhook URL, or an error naming the variable to set.
    pub fn webhook(&self) -> Result<&str> {
        self.webhook_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow!("missing {ENV_WEBHOOK_URL}; set it in the environment or .env"))
    }

    /// Reject configs that would make watermarks ambiguous.
    pub fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        for s in &self.sources {
            if s.key.trim().is_empty() {
                bail!("source {:?} has an empty key", s.name);
            }
            if !keys.insert(s.key.as_str()) {
                bail!("duplicate source key {:?}", s.key);
            }
        }
        Ok(())
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}
