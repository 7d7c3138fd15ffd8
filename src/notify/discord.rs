use super::{build_embed, Embed, EmbedLabels, Notifier, SourceMeta};
use crate::ingest::Post;
use anyhow::{anyhow, Result};
use metrics::counter;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

/// Discord webhook delivery: one POST per post, no retry. Only `204 No
/// Content` counts as delivered.
#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    labels: EmbedLabels,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            labels: EmbedLabels::default(),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_labels(mut self, labels: EmbedLabels) -> Self {
        self.labels = labels;
        self
    }

    pub async fn send_embed(&self, embed: Embed) -> Result<()> {
        let payload = DiscordWebhookPayload {
            content: None,
            embeds: vec![embed],
        };

        let rsp = self
            .client
            .post(&self.webhook)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow!("Discord webhook request failed: {e}"))?;

        let status = rsp.status();
        if status != StatusCode::NO_CONTENT {
            let body = rsp.text().await.unwrap_or_default();
            return Err(anyhow!("Discord webhook HTTP {status}: {body}"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, post: &Post, meta: &SourceMeta) -> bool {
        let embed = build_embed(post, meta, &self.labels);
        match self.send_embed(embed).await {
            Ok(()) => {
                tracing::info!(source = %meta.name, link = %post.link, "webhook sent");
                counter!("relay_notified_total").increment(1);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, source = %meta.name, link = %post.link, "webhook failed");
                counter!("relay_notify_failures_total").increment(1);
                false
            }
        }
    }
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<Embed>,
}
