//! Common fixtures for series-dl pipeline tests: feed and descriptor builders and a mocked
//! qBittorrent Web API.

#![allow(dead_code)]

use serde_json::json;
use series_dl::torrent::TorrentDescriptor;
use std::path::Path;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bencoded single-file descriptor for `file_name`
pub fn single_file_torrent(file_name: &str) -> Vec<u8> {
    format!(
        "d8:announce15:http://tracker/4:infod6:lengthi2048e4:name{}:{}12:piece lengthi16384e6:pieces0:ee",
        file_name.len(),
        file_name
    )
    .into_bytes()
}

/// Info-hash the client will report for a descriptor
pub fn info_hash(descriptor: &[u8]) -> String {
    TorrentDescriptor::parse(descriptor).unwrap().info_hash
}

/// RSS 2.0 document listing `(title, link)` items in order
pub fn rss_feed(items: &[(&str, String)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, link)| {
            format!("<item><title>{title}</title><link>{link}</link><guid>{link}</guid></item>")
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Test feed</title><link>http://example.invalid/</link><description>Episodes</description>{items}</channel></rss>"#
    )
}

/// Serve an RSS feed at `route`
pub async fn mount_feed(server: &MockServer, route: &str, body: String) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(body),
        )
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}

/// Serve a single-file descriptor for `file_name` and return `(link, info_hash)`
pub async fn mount_descriptor(server: &MockServer, file_name: &str) -> (String, String) {
    let bytes = single_file_torrent(file_name);
    let hash = info_hash(&bytes);
    let route = format!("/download/{file_name}.torrent");
    Mock::given(method("GET"))
        .and(path(route.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .mount(server)
        .await;
    (format!("{}{}", server.uri(), route), hash)
}

/// Accept every added torrent
pub async fn mount_add_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/add"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
        .mount(server)
        .await;
}

/// Answer 415 for the descriptor named `file_name`
pub async fn mount_add_unsupported(server: &MockServer, file_name: &str) {
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/add"))
        .and(body_string_contains(file_name))
        .respond_with(ResponseTemplate::new(415))
        .with_priority(1)
        .mount(server)
        .await;
}

/// Report torrent `hash` as seeding with one file `file_name` in `save_path`
pub async fn mount_finished_job(server: &MockServer, hash: &str, file_name: &str, save_path: &Path) {
    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/info"))
        .and(query_param("hashes", hash))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "hash": hash,
            "name": file_name,
            "state": "uploading",
            "save_path": save_path.to_string_lossy(),
            "progress": 1.0,
        }])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/files"))
        .and(query_param("hash", hash))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "name": file_name }])))
        .mount(server)
        .await;
}

/// Accept every delete call
pub async fn mount_delete_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/delete"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}
