// tests/providers_news_rss.rs
use news_relay::ingest::providers::news_rss::NewsSearchProvider;

const FEED: &str = include_str!("fixtures/news_search_rss.xml");

#[test]
fn only_dated_items_from_the_outlet_are_kept() {
    let p = NewsSearchProvider::new("燕云十六声", "17173", 5);
    let posts = p.parse_feed(FEED).expect("rss parses");

    let ids: Vec<_> = posts.iter().filter_map(|p| p.post_id.as_deref()).collect();
    assert_eq!(ids, vec!["CBMiA17173", "CBMiB17173"]);

    let first = &posts[0];
    assert_eq!(first.title, "燕云十六声新版本前瞻 - 17173游戏网");
    assert_eq!(first.link, "https://news.google.com/rss/articles/CBMiA17173?oc=5");
    assert_eq!(first.author, "17173.com");
    // Tue, 03 Feb 2026 08:30:00 GMT
    assert_eq!(first.timestamp, 1_770_107_400.0);
}

#[test]
fn malformed_feed_is_an_error() {
    let p = NewsSearchProvider::new("x", "17173", 5);
    assert!(p.parse_feed("<html>not rss</html>").is_err());
}
