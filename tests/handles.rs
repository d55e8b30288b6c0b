//! Open descriptor accounting lives in its own test binary so that no other
//! test in the process opens or closes files while the counts are taken.
#![cfg(target_os = "linux")]

use std::net::SocketAddr;
use std::time::Duration;

use range_httpd::{FileServer, ServeConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const LARGE_VIDEO: usize = 64 * 1024 * 1024;

fn open_descriptors() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

async fn get(addr: SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

async fn status_of(addr: SocketAddr, path: &str) -> String {
    let mut stream = get(addr, path).await;
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);
    response.lines().next().unwrap_or_default().to_owned()
}

async fn settle_at_or_below(baseline: usize) -> usize {
    let mut open = open_descriptors();
    for _ in 0..50 {
        if open <= baseline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        open = open_descriptors();
    }
    open
}

#[tokio::test]
async fn test_aborted_and_failed_requests_release_descriptors() {
    let root = tempfile::tempdir().unwrap();
    let media = tempfile::tempdir().unwrap();
    let video_path = media.path().join("large.mp4");
    let labels_path = media.path().join("large-labels.json");
    std::fs::write(&video_path, vec![0x5a; LARGE_VIDEO]).unwrap();
    std::fs::write(&labels_path, b"{}").unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServeConfig::new(root.path(), video_path, labels_path);
    tokio::spawn(FileServer::new(config).serve_on(listener));

    // the first request lazily sets up whatever the server keeps for its lifetime
    assert_eq!("HTTP/1.1 404 Not Found", status_of(addr, "/warmup.bin").await);
    let baseline = settle_at_or_below(open_descriptors()).await;

    for _ in 0..30 {
        let mut stream = get(addr, "/video.mp4").await;
        let mut head = [0u8; 4096];
        let read = stream.read(&mut head).await.unwrap();
        assert!(head[..read].starts_with(b"HTTP/1.1 200 OK"));
        drop(stream);
    }
    let after_aborts = settle_at_or_below(baseline).await;
    assert!(after_aborts <= baseline, "{after_aborts} open after aborted downloads, {baseline} before");

    for _ in 0..50 {
        assert_eq!("HTTP/1.1 404 Not Found", status_of(addr, "/nope.bin").await);
    }
    let after_misses = settle_at_or_below(baseline).await;
    assert!(after_misses <= baseline, "{after_misses} open after missing files, {baseline} before");

    // still serving the large file from the start
    let mut stream = get(addr, "/video.mp4").await;
    let mut head = [0u8; 64];
    let read = stream.read(&mut head).await.unwrap();
    assert!(head[..read].starts_with(b"HTTP/1.1 200 OK"));
}
