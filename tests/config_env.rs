// tests/config_env.rs
use news_relay::config::{RelayConfig, SourceKind};
use news_relay::ingest::providers::reddit::RedditEndpoint;
use news_relay::DedupMode;
use std::{env, fs};

const SAMPLE_TOML: &str = r#"
target_lang = "en"
translate = false

[[sources]]
key = "last_official_time"
name = "Official Website"
color = 15844367
kind = "official"

[[sources]]
key = "last_reddit_wherewindsmeet_time"
name = "Reddit r/WhereWindsMeet"
mode = "id_set"
source_lang = "auto"
max_per_run = 3
kind = "reddit"
subreddit = "WhereWindsMeet"
endpoint = "json"

[[sources]]
key = "disabled"
name = "Off"
enabled = false
kind = "dashen"
user_id = "abc"
"#;

#[test]
fn toml_sources_parse_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("relay.toml");
    fs::write(&p, SAMPLE_TOML).unwrap();

    let cfg = RelayConfig::load_from(&p).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.target_lang, "en");
    assert_eq!(cfg.source_lang, "zh-CN");
    assert!(!cfg.translate);
    assert_eq!(cfg.sources.len(), 3);
    assert_eq!(cfg.enabled_sources().count(), 2);

    let official = &cfg.sources[0];
    assert_eq!(official.mode, DedupMode::Timestamp);
    assert_eq!(official.kind, SourceKind::Official { listing_url: None });

    let reddit = &cfg.sources[1];
    assert_eq!(reddit.mode, DedupMode::IdSet);
    assert_eq!(reddit.source_lang.as_deref(), Some("auto"));
    assert_eq!(reddit.max_per_run, Some(3));
    assert_eq!(
        reddit.kind,
        SourceKind::Reddit {
            subreddit: "WhereWindsMeet".into(),
            post_limit: 5,
            endpoint: RedditEndpoint::Json,
        }
    );
}

#[test]
fn json_config_and_duplicate_keys() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("relay.json");
    fs::write(
        &p,
        r#"{"sources": [
            {"key": "k", "name": "A", "kind": "news_search", "keyword": "燕云十六声"},
            {"key": "k", "name": "B", "kind": "dashen", "user_id": "u"}
        ]}"#,
    )
    .unwrap();

    let cfg = RelayConfig::load_from(&p).unwrap();
    assert_eq!(
        cfg.sources[0].kind,
        SourceKind::NewsSearch {
            keyword: "燕云十六声".into(),
            site_filter: "17173".into(),
        }
    );
    assert!(cfg.validate().is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // keep the repo's own config/ out of the way
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    env::remove_var("RELAY_CONFIG_PATH");
    env::remove_var("WEBHOOK_URL");
    env::remove_var("RELAY_STATE_PATH");
    env::remove_var("RELAY_TARGET_LANG");

    // 1) nothing on disk: built-in sources, no webhook
    let cfg = RelayConfig::load_default().unwrap();
    assert_eq!(cfg.sources.len(), 5);
    assert!(cfg.webhook().is_err());

    // 2) ./config/relay.toml
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("relay.toml"), SAMPLE_TOML).unwrap();
    let cfg = RelayConfig::load_default().unwrap();
    assert_eq!(cfg.sources.len(), 3);

    // 3) explicit path wins, env overrides apply on top
    let p_env = tmp.path().join("other.json");
    fs::write(&p_env, r#"{"target_lang": "fr", "sources": []}"#).unwrap();
    env::set_var("RELAY_CONFIG_PATH", p_env.display().to_string());
    env::set_var("WEBHOOK_URL", " https://discord.com/api/webhooks/1/abc ");
    env::set_var("RELAY_STATE_PATH", "state/marks.json");
    let cfg = RelayConfig::load_default().unwrap();
    assert!(cfg.sources.is_empty());
    assert_eq!(cfg.target_lang, "fr");
    assert_eq!(cfg.webhook().unwrap(), "https://discord.com/api/webhooks/1/abc");
    assert_eq!(cfg.state_path, std::path::PathBuf::from("state/marks.json"));

    // 4) a missing explicit path is an error, not a silent fallback
    env::set_var("RELAY_CONFIG_PATH", tmp.path().join("missing.toml").display().to_string());
    assert!(RelayConfig::load_default().is_err());

    env::remove_var("RELAY_CONFIG_PATH");
    env::remove_var("WEBHOOK_URL");
    env::remove_var("RELAY_STATE_PATH");
    env::set_current_dir(&old).unwrap();
}
