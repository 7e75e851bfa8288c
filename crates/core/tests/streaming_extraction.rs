//! Streaming extraction integration tests.
//!
//! A small in-process HTTP server serves archives so the fetcher runs its
//! real download path: status handling, format sniffing, progressive ZIP
//! extraction, RAR extraction and temp-file cleanup.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use subscout_core::{
    archive::FetchOptions,
    testing::fixtures,
    ArchiveError, ArchiveExtractor, ArchiveFetcher, ExtractionConfig, StreamingFetcher,
};

/// Serves fixed routes on an ephemeral port until dropped.
struct TestServer {
    base_url: String,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("No local address");

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(stream));
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            _handle: handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn episode_archive() -> Vec<u8> {
    fixtures::zip_archive(&[
        ("Show.S02E05.1080p.WEB-DL.srt", b"7\r\nSalut\r\n\r\n8\r\nPa\r\n".as_slice()),
        ("readme.txt", b"not a subtitle".as_slice()),
        ("extra/Show.S02E05.720p.HDTV.srt", b"1\nBun\n".as_slice()),
    ])
}

async fn handle_connection(mut stream: TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let request = String::from_utf8_lossy(&request);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    match path.as_str() {
        "/archive.zip" => respond(&mut stream, "200 OK", &episode_archive()).await,
        "/slow.zip" => {
            let body = episode_archive();
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/zip\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes()).await;
            for chunk in body.chunks(64) {
                let _ = stream.write_all(chunk).await;
                let _ = stream.flush().await;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        "/episodes.rar" => respond(&mut stream, "200 OK", fixtures::RAR_TWO_EPISODES).await,
        "/throttled" => respond(&mut stream, "429 Too Many Requests", b"slow down").await,
        "/page" => respond(&mut stream, "200 OK", b"<html><body>login</body></html>").await,
        _ => respond(&mut stream, "404 Not Found", b"").await,
    }
    let _ = stream.shutdown().await;
}

async fn respond(stream: &mut TcpStream, status: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(body).await;
}

fn fetcher(scratch: &Path, progressive: bool) -> StreamingFetcher {
    let config = ExtractionConfig {
        progressive,
        poll_interval_ms: 10,
        ..Default::default()
    };
    StreamingFetcher::new(config, Arc::new(ArchiveExtractor::new(scratch)))
}

fn file_names(paths: &[std::path::PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn leftover_archives(scratch: &Path) -> usize {
    std::fs::read_dir(scratch)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("stream_"))
        .count()
}

#[tokio::test]
async fn test_download_extracts_subtitles() {
    let server = TestServer::start().await;
    let scratch = TempDir::new().unwrap();
    let fetcher = fetcher(scratch.path(), true);

    let files = fetcher
        .download_and_extract(&server.url("/archive.zip"), &FetchOptions::default())
        .await
        .unwrap();

    let names = file_names(&files);
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("extracted_"));
    assert!(names[0].ends_with("_0_Show.S02E05.1080p.WEB-DL.srt"));
    assert!(names[1].ends_with("_1_Show.S02E05.720p.HDTV.srt"));

    // Cues renumbered from 1 and line endings normalized.
    let content = std::fs::read_to_string(&files[0]).unwrap();
    assert_eq!(content, "1\nSalut\n\n2\nPa\n");

    assert_eq!(leftover_archives(scratch.path()), 0);
}

#[tokio::test]
async fn test_slow_download_extracts_progressively() {
    let server = TestServer::start().await;
    let scratch = TempDir::new().unwrap();
    let fetcher = fetcher(scratch.path(), true);

    let files = fetcher
        .download_and_extract(&server.url("/slow.zip"), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.exists()));
    assert_eq!(leftover_archives(scratch.path()), 0);
}

#[tokio::test]
async fn test_buffered_mode_matches_progressive() {
    let server = TestServer::start().await;
    let scratch = TempDir::new().unwrap();
    let fetcher = fetcher(scratch.path(), false);

    let files = fetcher
        .download_and_extract(&server.url("/slow.zip"), &FetchOptions::default())
        .await
        .unwrap();

    let names = file_names(&files);
    assert_eq!(names.len(), 2);
    assert!(names[1].ends_with("_1_Show.S02E05.720p.HDTV.srt"));
}

#[tokio::test]
async fn test_rar_download_extracts_after_completion() {
    let server = TestServer::start().await;
    let scratch = TempDir::new().unwrap();
    let fetcher = fetcher(scratch.path(), true);

    let files = fetcher
        .download_and_extract(&server.url("/episodes.rar"), &FetchOptions::default())
        .await
        .unwrap();

    let names = file_names(&files);
    assert_eq!(names.len(), 2);
    assert!(names[0].ends_with("_0_Show.S02E05.srt"));
    assert!(names[1].ends_with("_1_Show.S02E06.srt"));

    let sixth = std::fs::read_to_string(&files[1]).unwrap();
    assert!(sixth.contains("Episodul şase"));
    assert!(!sixth.contains('\r'));

    assert_eq!(leftover_archives(scratch.path()), 0);
}

#[tokio::test]
async fn test_http_429_is_throttled() {
    let server = TestServer::start().await;
    let scratch = TempDir::new().unwrap();
    let fetcher = fetcher(scratch.path(), true);

    let result = fetcher
        .download_and_extract(&server.url("/throttled"), &FetchOptions::default())
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, ArchiveError::Throttled { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_html_body_is_unknown_format() {
    let server = TestServer::start().await;
    let scratch = TempDir::new().unwrap();
    let fetcher = fetcher(scratch.path(), true);

    let result = fetcher
        .download_and_extract(&server.url("/page"), &FetchOptions::default())
        .await;

    assert!(matches!(result, Err(ArchiveError::UnknownFormat { .. })));
    assert_eq!(leftover_archives(scratch.path()), 0);
}

#[tokio::test]
async fn test_missing_archive_is_fetch_error() {
    let server = TestServer::start().await;
    let scratch = TempDir::new().unwrap();
    let fetcher = fetcher(scratch.path(), true);

    let result = fetcher
        .download_and_extract(&server.url("/gone.zip"), &FetchOptions::default())
        .await;

    match result {
        Err(ArchiveError::Fetch { connect, message, .. }) => {
            assert!(!connect);
            assert!(message.contains("404"));
        }
        other => panic!("expected fetch error, got {:?}", other),
    }
}
