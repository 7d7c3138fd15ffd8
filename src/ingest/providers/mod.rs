pub mod dashen;
pub mod news_rss;
pub mod official;
pub mod reddit;
