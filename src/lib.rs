// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod novelty;
pub mod relay;
pub mod translate;
pub mod watermark;

// ---- Re-exports for stable public API ----
pub use crate::config::RelayConfig;
pub use crate::ingest::{Post, SourceProvider};
pub use crate::notify::{DiscordNotifier, Notifier, SourceMeta};
pub use crate::relay::{Relay, RunReport, Source};
pub use crate::watermark::{DedupMode, Watermark, WatermarkStore};

use std::sync::Arc;

use crate::notify::EmbedLabels;
use crate::relay::{sources_from_config, Languages};
use crate::translate::{GoogleTranslate, TranslationGateway};

/// One full run against the live sources described by `cfg`: load the
/// watermark file, process every enabled source, persist.
pub async fn run_configured(cfg: &RelayConfig) -> anyhow::Result<RunReport> {
    cfg.validate()?;
    let webhook = cfg.webhook()?.to_string();

    let notifier = DiscordNotifier::new(webhook)
        .with_timeout(cfg.http_timeout_secs)
        .with_labels(EmbedLabels {
            see_more: cfg.see_more_label.clone(),
            footer: cfg.footer_label.clone(),
            default_color: cfg.default_color,
        });
    let gateway = TranslationGateway::new(Arc::new(GoogleTranslate::new(cfg.http_timeout_secs)));
    let relay = Relay {
        notifier: &notifier,
        translator: cfg.translate.then_some(&gateway),
        languages: Languages {
            source: cfg.source_lang.clone(),
            target: cfg.target_lang.clone(),
        },
    };

    let sources = sources_from_config(cfg);
    let mut store = WatermarkStore::load(&cfg.state_path);
    Ok(relay.run_once(&sources, &mut store).await)
}
