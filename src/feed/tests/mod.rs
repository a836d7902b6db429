use super::*;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NYAA_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss xmlns:atom="http://www.w3.org/2005/Atom" xmlns:nyaa="https://nyaa.si/xmlns/nyaa" version="2.0">
    <channel>
        <title>Nyaa - "show" - Torrent File RSS</title>
        <description>RSS Feed for "show"</description>
        <link>https://nyaa.si/</link>
        <item>
            <title>[Group] Show Name - 06 [1080p]</title>
            <link>https://nyaa.si/download/1002.torrent</link>
            <guid isPermaLink="true">https://nyaa.si/view/1002</guid>
            <pubDate>Sat, 13 Jan 2024 00:10:00 -0000</pubDate>
            <nyaa:infoHash>ABCDEF0123456789ABCDEF0123456789ABCDEF01</nyaa:infoHash>
        </item>
        <item>
            <title>[Group] Show Name - 05 [1080p]</title>
            <link>https://nyaa.si/download/1001.torrent</link>
            <guid isPermaLink="true">https://nyaa.si/view/1001</guid>
            <pubDate>Sat, 06 Jan 2024 00:10:00 -0000</pubDate>
        </item>
    </channel>
</rss>"#;

const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Show releases</title>
    <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
    <updated>2024-01-13T00:10:00Z</updated>
    <entry>
        <title>Show Name - 07 [1080p]</title>
        <id>urn:uuid:1</id>
        <updated>2024-01-20T00:10:00Z</updated>
        <link href="https://nyaa.si/view/1003"/>
        <link rel="enclosure" type="application/x-bittorrent" href="https://nyaa.si/download/1003.torrent"/>
    </entry>
    <entry>
        <title>Show Name - 06 [1080p]</title>
        <id>urn:uuid:2</id>
        <updated>2024-01-13T00:10:00Z</updated>
        <link href="https://nyaa.si/view/1002"/>
    </entry>
</feed>"#;

#[test]
fn test_parse_rss_keeps_feed_order() {
    let entries = parse_feed(NYAA_RSS).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].title, "[Group] Show Name - 06 [1080p]");
    assert_eq!(entries[0].link, "https://nyaa.si/download/1002.torrent");
    assert_eq!(entries[1].title, "[Group] Show Name - 05 [1080p]");
}

#[test]
fn test_parse_rss_reads_nyaa_info_hash() {
    let entries = parse_feed(NYAA_RSS).unwrap();

    assert_eq!(
        entries[0].info_hash.as_deref(),
        Some("abcdef0123456789abcdef0123456789abcdef01")
    );
    assert_eq!(entries[1].info_hash, None);
}

#[test]
fn test_parse_atom_fallback() {
    let entries = parse_feed(ATOM).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].title, "Show Name - 07 [1080p]");
    assert_eq!(entries[0].link, "https://nyaa.si/download/1003.torrent");
    assert_eq!(entries[1].link, "https://nyaa.si/view/1002");
}

#[test]
fn test_parse_garbage_reports_both_errors() {
    let err = parse_feed("this is not xml").unwrap_err();
    assert!(err.contains("RSS error"));
    assert!(err.contains("Atom error"));
}

#[tokio::test]
async fn test_fetch_feed_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("page", "rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(NYAA_RSS))
        .mount(&mock_server)
        .await;

    let source = HttpFeedSource::new(Duration::from_secs(5)).unwrap();
    let url = format!("{}/?page=rss&q=show", mock_server.uri());
    let entries = source.fetch(&url).await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].link, "https://nyaa.si/download/1001.torrent");
}

#[tokio::test]
async fn test_fetch_non_success_status_is_unreachable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let source = HttpFeedSource::new(Duration::from_secs(5)).unwrap();
    let url = format!("{}/?page=rss", mock_server.uri());

    match source.fetch(&url).await.unwrap_err() {
        FeedError::Unreachable { url: u, status } => {
            assert_eq!(u, url);
            assert_eq!(status, "503");
        }
        other => panic!("Expected Unreachable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_html_body_is_unparseable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>maintenance</body></html>"))
        .mount(&mock_server)
        .await;

    let source = HttpFeedSource::new(Duration::from_secs(5)).unwrap();
    let url = format!("{}/?page=rss", mock_server.uri());

    assert!(matches!(
        source.fetch(&url).await,
        Err(FeedError::Unparseable { .. })
    ));
}

#[tokio::test]
async fn test_fetch_connection_refused_is_unreachable() {
    // Nothing listens on port 9 (discard) on the loopback interface in test environments
    let source = HttpFeedSource::new(Duration::from_secs(2)).unwrap();
    let result = source.fetch("http://127.0.0.1:9/?page=rss").await;

    assert!(matches!(result, Err(FeedError::Unreachable { .. })));
}
