use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::cancel::CancellationCoordinator;
use crate::catalog::CatalogClient;
use crate::error::{ClientError, ClientResult};
use crate::metrics::TransferMetrics;
use crate::transfer::{DirectorySink, DownloadOutcome, Downloader, FileSink};
use crate::types::{Credential, FileRef};

use super::{host_client, spawn_host, wait_until};

#[derive(Default)]
struct RecordingSink {
    saved: Mutex<Vec<(String, String, Vec<u8>)>>,
}

#[async_trait]
impl FileSink for RecordingSink {
    async fn save(&self, file_name: &str, mime_type: &str, bytes: &[u8]) -> ClientResult<String> {
        self.saved.lock().unwrap().push((file_name.to_string(), mime_type.to_string(), bytes.to_vec()));
        Ok(format!("recorded {}", file_name))
    }
}

fn downloader() -> (Downloader, CancellationCoordinator, TransferMetrics) {
    let coordinator = CancellationCoordinator::new();
    let metrics = TransferMetrics::new();
    let d = Downloader::new(CatalogClient::new(host_client()), coordinator.clone(), metrics.clone());
    (d, coordinator, metrics)
}

fn song() -> FileRef {
    FileRef { name: "song".to_string(), path: "/music/rock/song.mp3".to_string() }
}

#[tokio::test]
async fn test_download_hands_bytes_to_sink() {
    let host = spawn_host().await;
    let (d, coordinator, metrics) = downloader();
    let sink = RecordingSink::default();

    let out = d.download("audio", &song(), &host.credential(), &sink).await.unwrap();
    assert_eq!(
        out,
        DownloadOutcome::Saved { file_name: "song.mp3".to_string(), location: "recorded song.mp3".to_string(), size: 4 }
    );

    let saved = sink.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0], ("song.mp3".to_string(), "audio/mp3".to_string(), vec![1, 2, 3, 4]));

    assert!(!coordinator.is_active());
    let snap = metrics.get_snapshot();
    assert_eq!(snap.downloads_started, 1);
    assert_eq!(snap.downloads_completed, 1);
    assert_eq!(snap.bytes_received, 4);
}

#[tokio::test]
async fn test_cancel_before_response_is_silent() {
    let host = spawn_host().await;
    host.state.file_delay_ms.store(10_000, Ordering::SeqCst);
    let (d, coordinator, metrics) = downloader();

    let credential = host.credential();
    let task = tokio::spawn(async move {
        let sink = RecordingSink::default();
        let out = d.download("audio", &song(), &credential, &sink).await;
        let saved = sink.saved.lock().unwrap().len();
        (out, saved)
    });

    let state = host.state.clone();
    wait_until(|| state.hits() >= 1).await;
    assert!(coordinator.is_active());
    assert!(coordinator.overlay().active);
    assert!(coordinator.cancel());

    let (out, saved) = tokio::time::timeout(Duration::from_secs(3), task).await.unwrap().unwrap();
    assert_eq!(out.unwrap(), DownloadOutcome::Cancelled);
    assert_eq!(saved, 0);
    assert!(!coordinator.is_active());
    assert!(!coordinator.overlay().active);
    assert_eq!(metrics.get_snapshot().downloads_cancelled, 1);
}

#[tokio::test]
async fn test_second_download_rejected_while_active() {
    let host = spawn_host().await;
    let (d, coordinator, _) = downloader();
    let _busy = coordinator.begin().unwrap();

    let err = d.download("audio", &song(), &host.credential(), &RecordingSink::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::OperationInProgress));
    assert_eq!(host.state.hits(), 0);
}

#[tokio::test]
async fn test_failed_download_frees_slot() {
    let host = spawn_host().await;
    let (d, coordinator, metrics) = downloader();
    let wrong = Credential::new(&host.base, "wrong");

    let err = d.download("audio", &song(), &wrong, &RecordingSink::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "failed to request file type:audio::401:Unauthorized");
    assert!(err.is_user_visible());
    assert!(!coordinator.is_active());
    assert_eq!(metrics.get_snapshot().downloads_failed, 1);
}

#[tokio::test]
async fn test_null_file_data_is_an_error() {
    let host = spawn_host().await;
    let (d, _, _) = downloader();
    let pic = FileRef { name: "pic".to_string(), path: "/pics/pic.png".to_string() };

    // The image endpoint answers with `data: null`
    let err = d.download("image", &pic, &host.credential(), &RecordingSink::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "failed to get data from the server");
}

#[tokio::test]
async fn test_directory_sink_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(dir.path().join("downloads"));

    let location = sink.save("song.mp3", "audio/mp3", &[9, 8, 7]).await.unwrap();
    assert!(location.contains("song.mp3"));
    let written = std::fs::read(dir.path().join("downloads").join("song.mp3")).unwrap();
    assert_eq!(written, vec![9, 8, 7]);
}

#[tokio::test]
async fn test_directory_sink_strips_path_components() {
    let dir = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(dir.path());

    sink.save("../escape.mp3", "audio/mp3", &[1]).await.unwrap();
    assert!(dir.path().join("escape.mp3").exists());
    assert!(sink.save("..", "audio/mp3", &[1]).await.is_err());
}
