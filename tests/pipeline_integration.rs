//! End-to-end download pipeline tests against a local one-shot HTTP server.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use astrocast::{
    BlobCache, Database, DownloadPipeline, DownloadStatus, Episode, StartOutcome,
};

struct TestServer {
    url: String,
    accepted: Arc<AtomicUsize>,
}

/// Serves `status_line` plus `body` to every connection, writing the body in
/// four pieces with a pause in between so transfers take a little while.
fn spawn_server(status_line: &'static str, body: Vec<u8>, chunk_delay: Duration) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    let accepted = Arc::new(AtomicUsize::new(0));
    let accepted_counter = Arc::clone(&accepted);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            accepted_counter.fetch_add(1, Ordering::SeqCst);

            // Drain the request head before answering.
            let mut request = Vec::new();
            let mut buf = [0u8; 512];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            let header = format!(
                "{}\r\nContent-Type: audio/mpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            );
            if stream.write_all(header.as_bytes()).is_err() {
                continue;
            }

            let piece = (body.len() / 4).max(1);
            for chunk in body.chunks(piece) {
                if stream.write_all(chunk).is_err() {
                    break;
                }
                stream.flush().ok();
                thread::sleep(chunk_delay);
            }
        }
    });

    TestServer {
        url: format!("http://{}/episode.mp3", addr),
        accepted,
    }
}

fn episode(id: &str, url: &str) -> Episode {
    Episode {
        id: id.to_string(),
        title: format!("Episode {}", id),
        audio_url: url.to_string(),
        image_url: None,
        podcast_id: Some("astro-weekly".to_string()),
        podcast_name: Some("Astro Weekly".to_string()),
        duration: Some(1800),
    }
}

fn pipeline(dir: &tempfile::TempDir) -> DownloadPipeline {
    let database = Database::open_in_memory().expect("db");
    let cache = BlobCache::at(dir.path().join("audio"));
    DownloadPipeline::new(database, cache).expect("pipeline")
}

#[tokio::test]
async fn download_completes_with_progress_and_blob() {
    let server = spawn_server("HTTP/1.1 200 OK", vec![42u8; 1000], Duration::from_millis(5));
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = pipeline(&dir);

    let observed: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    pipeline.subscribe(Arc::new(move |update| {
        sink.lock().unwrap().push(update.percent);
    }));

    let episode = episode("ep-1", &server.url);
    let outcome = pipeline.start_download(&episode).await.expect("download");
    assert_eq!(outcome, StartOutcome::Completed);

    let record = pipeline.record("ep-1").expect("record");
    assert_eq!(record.status, DownloadStatus::Completed);
    assert_eq!(record.progress_percentage, 100);
    assert_eq!(record.file_size, Some(1000));
    assert!(record.completed_at.is_some());

    let path = pipeline.local_episode_path("ep-1").expect("blob path");
    assert_eq!(std::fs::read(path).expect("blob").len(), 1000);
    assert!(pipeline.is_episode_downloaded("ep-1"));

    // TCP framing decides the chunk boundaries, so only the shape of the
    // sequence is asserted: it climbs and it lands on 100.
    let observed = observed.lock().unwrap();
    assert!(!observed.is_empty());
    assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(observed.last(), Some(&100));
}

#[tokio::test]
async fn second_request_collapses_into_the_running_transfer() {
    let server = spawn_server("HTTP/1.1 200 OK", vec![7u8; 4000], Duration::from_millis(50));
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = pipeline(&dir);
    let episode = episode("ep-1", &server.url);

    let (first, second) = tokio::join!(
        pipeline.start_download(&episode),
        pipeline.start_download(&episode),
    );

    assert_eq!(first.expect("first request"), StartOutcome::Completed);
    assert_eq!(second.expect("second request"), StartOutcome::AlreadyInFlight);

    // Exactly one byte transfer hit the server.
    assert_eq!(server.accepted.load(Ordering::SeqCst), 1);

    let record = pipeline.record("ep-1").expect("record");
    assert_eq!(record.status, DownloadStatus::Completed);
}

#[tokio::test]
async fn rejecting_source_fails_the_record() {
    let server = spawn_server("HTTP/1.1 404 Not Found", Vec::new(), Duration::ZERO);
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = pipeline(&dir);
    let episode = episode("ep-missing", &server.url);

    let result = pipeline.start_download(&episode).await;
    assert!(result.is_err());

    let record = pipeline.record("ep-missing").expect("record");
    assert_eq!(record.status, DownloadStatus::Failed);
    assert!(record.error_message.as_deref().expect("message").contains("404"));
    assert!(!pipeline.is_episode_downloaded("ep-missing"));
    assert!(pipeline.local_episode_path("ep-missing").is_none());
}

#[tokio::test]
async fn deleted_episode_can_be_downloaded_again() {
    let server = spawn_server("HTTP/1.1 200 OK", vec![9u8; 800], Duration::from_millis(2));
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = pipeline(&dir);
    let episode = episode("ep-1", &server.url);

    assert_eq!(
        pipeline.start_download(&episode).await.expect("first cycle"),
        StartOutcome::Completed
    );

    pipeline.delete_download("ep-1").expect("delete");
    assert!(!pipeline.is_episode_downloaded("ep-1"));
    assert!(pipeline.local_episode_path("ep-1").is_none());
    assert_eq!(
        pipeline.record("ep-1").expect("audit row").status,
        DownloadStatus::Deleted
    );

    assert_eq!(
        pipeline.start_download(&episode).await.expect("second cycle"),
        StartOutcome::Completed
    );
    assert!(pipeline.is_episode_downloaded("ep-1"));
    let path = pipeline.local_episode_path("ep-1").expect("blob back");
    assert_eq!(std::fs::read(path).expect("blob").len(), 800);
}

#[tokio::test]
async fn retry_after_failure_starts_a_fresh_cycle() {
    let bad = spawn_server("HTTP/1.1 500 Internal Server Error", Vec::new(), Duration::ZERO);
    let good = spawn_server("HTTP/1.1 200 OK", vec![1u8; 600], Duration::from_millis(2));
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = pipeline(&dir);

    let failing = episode("ep-1", &bad.url);
    assert!(pipeline.start_download(&failing).await.is_err());
    assert_eq!(
        pipeline.record("ep-1").expect("record").status,
        DownloadStatus::Failed
    );

    // Retry re-enters pending from scratch, no partial resume.
    let retried = episode("ep-1", &good.url);
    assert_eq!(
        pipeline.start_download(&retried).await.expect("retry"),
        StartOutcome::Completed
    );
    assert_eq!(
        pipeline.record("ep-1").expect("record").status,
        DownloadStatus::Completed
    );
}
