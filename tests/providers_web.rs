use chrono::{TimeZone, Utc};
use crypto_news_digest::ingest::normalize_record;
use crypto_news_digest::ingest::providers::web::{parse_page, WebProvider};
use crypto_news_digest::{Origin, SourceProvider, SourceSpec};

const PAGE: &str = include_str!("fixtures/news_page.html");

fn spec(selector: Option<&str>) -> SourceSpec {
    SourceSpec {
        name: "Policy Desk".into(),
        url: "https://desk.example.com/latest/".into(),
        selector: selector.map(str::to_string),
    }
}

#[tokio::test]
async fn selector_picks_articles_with_links() {
    let p = WebProvider::from_fixture(spec(Some("article.story")), PAGE).unwrap();
    assert_eq!(p.origin(), Origin::Web);

    let raw = p.fetch_latest().await.unwrap();
    // third article has no anchor
    assert_eq!(raw.len(), 2);
    assert_eq!(raw[0].link.as_deref(), Some("/policy/fomc-holds"));
    assert_eq!(
        raw[0].description.as_deref(),
        Some("Officials kept the policy rate unchanged.")
    );
    assert_eq!(raw[0].published.as_deref(), Some("2025-02-20T18:00:00Z"));
    assert!(raw[1].published.is_none());
}

#[tokio::test]
async fn web_links_resolve_against_page_url() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let p = WebProvider::from_fixture(spec(Some("article.story")), PAGE).unwrap();
    let news: Vec<_> = p
        .fetch_latest()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|r| normalize_record(r, p.name(), p.origin(), p.base_url(), now))
        .collect();

    assert_eq!(news.len(), 2);
    assert_eq!(news[0].url, "https://desk.example.com/policy/fomc-holds");
    assert_eq!(news[0].title, "FOMC holds rates, flags inflation risk");
    assert_eq!(
        news[0].published_at,
        Utc.with_ymd_and_hms(2025, 2, 20, 18, 0, 0).unwrap()
    );
    assert_eq!(news[1].url, "https://other.example.org/crypto/stablecoin-bill");
    assert_eq!(news[1].published_at, now);
}

#[test]
fn anchor_selector_uses_the_anchor_itself() {
    let raw = parse_page(PAGE, "aside.promo a").unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].title.as_deref(), Some("Subscribe"));
    assert_eq!(raw[0].link.as_deref(), Some("/subscribe"));
}

#[test]
fn missing_or_invalid_selector_is_rejected() {
    assert!(WebProvider::from_fixture(spec(None), PAGE).is_err());
    assert!(WebProvider::from_fixture(spec(Some("  ")), PAGE).is_err());
    assert!(WebProvider::from_fixture(spec(Some("article[[")), PAGE).is_err());
}
