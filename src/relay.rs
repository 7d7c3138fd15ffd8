//! relay.rs — one pass over every configured source:
//! fetch → select new → (hydrate → translate → notify → advance)* → persist.

use metrics::{counter, gauge};

use crate::config::{RelayConfig, SourceConfig, SourceKind};
use crate::ingest::providers::{
    dashen::DashenProvider, news_rss::NewsSearchProvider, official::OfficialProvider,
    reddit::RedditProvider,
};
use crate::ingest::{ensure_metrics_described, fetch_candidates, Post, SourceProvider};
use crate::notify::{Notifier, SourceMeta};
use crate::novelty::{advance, cap_selection, closes_tie_group, select_new};
use crate::translate::TranslationGateway;
use crate::watermark::{DedupMode, WatermarkStore};

/// A configured source: where to read, how to dedup, how to present.
pub struct Source {
    pub key: String,
    pub mode: DedupMode,
    pub meta: SourceMeta,
    pub source_lang: Option<String>,
    pub max_per_run: Option<usize>,
    pub provider: Box<dyn SourceProvider>,
}

impl Source {
    pub fn new(key: &str, mode: DedupMode, meta: SourceMeta, provider: Box<dyn SourceProvider>) -> Self {
        Self {
            key: key.to_string(),
            mode,
            meta,
            source_lang: None,
            max_per_run: None,
            provider,
        }
    }

    pub fn from_config(cfg: &SourceConfig, timeout_secs: u64) -> Self {
        let provider: Box<dyn SourceProvider> = match &cfg.kind {
            SourceKind::Official { listing_url } => {
                Box::new(OfficialProvider::new(listing_url.as_deref(), timeout_secs))
            }
            SourceKind::NewsSearch {
                keyword,
                site_filter,
            } => Box::new(NewsSearchProvider::new(keyword, site_filter, timeout_secs)),
            SourceKind::Dashen { user_id } => Box::new(DashenProvider::new(user_id, timeout_secs)),
            SourceKind::Reddit {
                subreddit,
                post_limit,
                endpoint,
            } => Box::new(RedditProvider::new(subreddit, *post_limit, *endpoint, timeout_secs)),
        };
        // a reddit batch never exceeds the requested post count
        let max_per_run = match &cfg.kind {
            SourceKind::Reddit { post_limit, .. } => cfg.max_per_run.or(Some(*post_limit as usize)),
            _ => cfg.max_per_run,
        };
        Self {
            key: cfg.key.clone(),
            mode: cfg.mode,
            meta: SourceMeta {
                name: cfg.name.clone(),
                color: cfg.color,
            },
            source_lang: cfg.source_lang.clone(),
            max_per_run,
            provider,
        }
    }
}

/// Enabled sources of `cfg`, in declared order.
pub fn sources_from_config(cfg: &RelayConfig) -> Vec<Source> {
    cfg.enabled_sources()
        .map(|s| Source::from_config(s, cfg.http_timeout_secs))
        .collect()
}

/// Default language pair; a source may override the source language.
#[derive(Debug, Clone)]
pub struct Languages {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceReport {
    pub key: String,
    pub candidates: usize,
    pub new: usize,
    pub notified: usize,
    pub failed: usize,
    /// Listing error of this run, if the source could not be read.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
    /// Whether the watermark file was written this run.
    pub persisted: bool,
}

impl RunReport {
    pub fn notified(&self) -> usize {
        self.sources.iter().map(|s| s.notified).sum()
    }

    pub fn source(&self, key: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.key == key)
    }
}

/// Everything a run needs besides the sources and the store.
pub struct Relay<'a> {
    pub notifier: &'a dyn Notifier,
    pub translator: Option<&'a TranslationGateway>,
    pub languages: Languages,
}

impl Relay<'_> {
    /// Process `sources` in order, then persist the store once. A source that
    /// fails to list yields nothing and keeps its watermark; a failed save is
    /// logged and reported, never fatal.
    pub async fn run_once(&self, sources: &[Source], store: &mut WatermarkStore) -> RunReport {
        ensure_metrics_described();
        let mut report = RunReport::default();

        for source in sources {
            tracing::info!(source = %source.key, provider = source.provider.name(), "checking source");
            let r = self.run_source(source, store).await;
            if r.new == 0 {
                tracing::info!(source = %source.key, candidates = r.candidates, "no new posts");
            } else {
                tracing::info!(
                    source = %source.key,
                    new = r.new,
                    notified = r.notified,
                    failed = r.failed,
                    "source done"
                );
            }
            report.sources.push(r);
        }

        if store.is_dirty() {
            match store.save() {
                Ok(()) => report.persisted = true,
                Err(e) => {
                    tracing::error!(error = ?e, path = %store.path().display(), "saving watermarks failed; next run may repeat posts");
                }
            }
        }

        gauge!("relay_last_run_ts").set(crate::ingest::now_ts());
        report
    }

    async fn run_source(&self, source: &Source, store: &mut WatermarkStore) -> SourceReport {
        let mut r = SourceReport {
            key: source.key.clone(),
            ..Default::default()
        };

        let batch = match fetch_candidates(source.provider.as_ref()).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = ?e, source = %source.key, "source unavailable; watermark kept");
                counter!("relay_source_errors_total", "provider" => source.provider.name()).increment(1);
                r.error = Some(format!("{e:#}"));
                return r;
            }
        };
        r.candidates = batch.len();

        let mut mark = store.get(&source.key, source.mode);
        let mut fresh = select_new(&batch, &mark);
        if let Some(cap) = source.max_per_run {
            cap_selection(&mut fresh, cap, source.mode);
        }
        r.new = fresh.len();
        counter!("relay_new_posts_total", "source" => source.key.clone()).increment(r.new as u64);

        for (i, post) in fresh.iter().copied().enumerate() {
            let hydrated = source.provider.hydrate(post.clone()).await;
            let outgoing = self.localize(hydrated, source).await;

            if !self.notifier.notify(&outgoing, &source.meta).await {
                r.failed += 1;
                if source.mode == DedupMode::Timestamp {
                    // a later post would push the watermark past this one
                    tracing::warn!(source = %source.key, "delivery failed; holding the rest of this source until next run");
                    break;
                }
                continue;
            }
            r.notified += 1;
            // a timestamp mark only reaches t once every post at t is delivered
            if source.mode == DedupMode::IdSet || closes_tie_group(&fresh, i) {
                // the candidate, not the hydrated copy, carries the identity
                advance(&mut mark, post);
                store.set(&source.key, mark.clone());
            }
        }
        r
    }

    async fn localize(&self, post: Post, source: &Source) -> Post {
        let Some(gw) = self.translator else {
            return post;
        };
        let src = source
            .source_lang
            .as_deref()
            .unwrap_or(&self.languages.source);
        let dest = &self.languages.target;
        let title = gw.translate(&post.title, src, dest).await;
        let text = gw.translate(&post.text, src, dest).await;
        Post {
            title: if title.is_empty() { post.title.clone() } else { title },
            text,
            ..post
        }
    }
}
