// src/ingest/types.rs
use anyhow::{Context, Result};

/// Normalized record every source adapter produces.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Post {
    pub title: String,
    pub link: String,
    pub text: String,
    pub timestamp: f64, // unix seconds, best effort
    pub author: String,
    pub post_id: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
}

impl Post {
    /// Builds a post, substituting `fallback_title` when the source gave none.
    pub fn new(
        title: impl Into<String>,
        fallback_title: &str,
        link: impl Into<String>,
        timestamp: f64,
        author: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            fallback_title.to_string()
        } else {
            title.trim().to_string()
        };
        Self {
            title,
            link: link.into(),
            text: String::new(),
            timestamp,
            author: author.into(),
            post_id: None,
            images: Vec::new(),
            videos: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.post_id = (!id.is_empty()).then_some(id);
        self
    }

    /// Identity used by id-set dedup: the explicit id, else the link.
    pub fn identity(&self) -> &str {
        self.post_id.as_deref().unwrap_or(&self.link)
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Lists the current candidates of this source. May fail; callers go
    /// through [`fetch_candidates`].
    async fn fetch_latest(&self) -> Result<Vec<Post>>;

    /// Fills in details (full text, media, resolved link) for a post that was
    /// selected as new. Must not fail: on error it returns the post unchanged.
    async fn hydrate(&self, post: Post) -> Post {
        post
    }

    fn name(&self) -> &'static str;
}

/// Adapter boundary: a listing error is tagged with the provider and handed
/// back for the caller to record; a successful batch is always sorted
/// ascending by timestamp.
pub async fn fetch_candidates(provider: &dyn SourceProvider) -> Result<Vec<Post>> {
    let mut posts = provider
        .fetch_latest()
        .await
        .with_context(|| format!("{} listing", provider.name()))?;
    sort_by_timestamp(&mut posts);
    Ok(posts)
}

/// Stable ascending sort; ties keep adapter order.
pub fn sort_by_timestamp(posts: &mut [Post]) {
    posts.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
}
