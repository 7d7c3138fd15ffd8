//! Translation gateway: best-effort, falls back to the original text.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A translation service call. Implementations may fail freely; the
/// [`TranslationGateway`] turns failures into the untranslated input.
#[async_trait]
pub trait TranslateBackend: Send + Sync {
    async fn translate(&self, text: &str, source_lang: &str, dest_lang: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// Public Google translate endpoint (`client=gtx`), no key required.
pub struct GoogleTranslate {
    http: reqwest::Client,
    endpoint: String,
}

impl GoogleTranslate {
    pub fn new(timeout_secs: u64) -> Self {
        Self::with_endpoint("https://translate.googleapis.com/translate_a/single", timeout_secs)
    }

    pub fn with_endpoint(endpoint: &str, timeout_secs: u64) -> Self {
        Self {
            http: crate::ingest::http_client(crate::ingest::DESKTOP_UA, timeout_secs),
            endpoint: endpoint.to_string(),
        }
    }
}

/// Concatenate the translated segments of a `translate_a/single` response:
/// `[[["seg1","orig1",...],["seg2","orig2",...]], ...]`.
pub fn parse_gtx_response(v: &serde_json::Value) -> Result<String> {
    let segments = v
        .get(0)
        .and_then(|s| s.as_array())
        .ok_or_else(|| anyhow!("unexpected translate response shape"))?;
    let out: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(|t| t.as_str()))
        .collect();
    if out.is_empty() {
        bail!("translate response had no segments");
    }
    Ok(out)
}

#[async_trait]
impl TranslateBackend for GoogleTranslate {
    async fn translate(&self, text: &str, source_lang: &str, dest_lang: &str) -> Result<String> {
        let resp = self
            .http
            .post(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source_lang),
                ("tl", dest_lang),
                ("dt", "t"),
            ])
            .form(&[("q", text)])
            .send()
            .await
            .context("translate request")?
            .error_for_status()
            .context("translate non-2xx")?;
        let v: serde_json::Value = resp.json().await.context("translate body")?;
        parse_gtx_response(&v)
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

#[derive(Clone)]
pub struct TranslationGateway {
    backend: Arc<dyn TranslateBackend>,
}

impl TranslationGateway {
    pub fn new(backend: Arc<dyn TranslateBackend>) -> Self {
        Self { backend }
    }

    /// Translated text, or `text` itself when the backend fails. Empty input
    /// returns empty without calling the backend. The result may still be in
    /// the source language.
    pub async fn translate(&self, text: &str, source_lang: &str, dest_lang: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        match self.backend.translate(text, source_lang, dest_lang).await {
            Ok(t) if !t.trim().is_empty() => t,
            Ok(_) => text.to_string(),
            Err(e) => {
                tracing::warn!(error = ?e, backend = self.backend.name(), "translation failed; sending original");
                text.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TranslateBackend for Counting {
        async fn translate(&self, text: &str, _s: &str, _d: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("quota exceeded");
            }
            Ok(format!("[vi] {text}"))
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn gateway(fail: bool) -> (Arc<Counting>, TranslationGateway) {
        let b = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail,
        });
        (b.clone(), TranslationGateway::new(b))
    }

    #[tokio::test]
    async fn empty_text_skips_backend() {
        let (b, gw) = gateway(false);
        assert_eq!(gw.translate("", "zh-CN", "vi").await, "");
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_returns_original() {
        let (b, gw) = gateway(true);
        assert_eq!(gw.translate("新版本", "zh-CN", "vi").await, "新版本");
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_returns_translation() {
        let (_b, gw) = gateway(false);
        assert_eq!(gw.translate("hi", "auto", "vi").await, "[vi] hi");
    }

    #[test]
    fn gtx_segments_are_joined() {
        let v = serde_json::json!([[["Xin chào. ", "你好。", null], ["Thế giới", "世界", null]], null, "zh-CN"]);
        assert_eq!(parse_gtx_response(&v).unwrap(), "Xin chào. Thế giới");
        assert!(parse_gtx_response(&serde_json::json!({"error": 1})).is_err());
    }
}
