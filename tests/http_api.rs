//! HTTP scenarios against a running bridge backed by an in-memory clipboard

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clipbridge::clipboard::memory::{MemoryClipboard, MemoryContents};
use clipbridge::codec;
use clipbridge::config::ServerConfig;
use clipbridge::notify::{Notification, NotificationQueue, Notifier, NotifyError};
use clipbridge::server::{build_router, serve};
use clipbridge::staging::StagingArea;
use clipbridge::sync::{PullResponse, WireFile};
use clipbridge::SyncHandler;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

const VERSION_MISMATCH: &str = "接口版本不匹配，请升级您的捷径";

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        self.seen.lock().unwrap().push(Notification {
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

struct TestServer {
    base: String,
    http: reqwest::Client,
    clipboard: Arc<MemoryClipboard>,
    notifier: Arc<RecordingNotifier>,
    staging_dir: PathBuf,
    _temp: TempDir,
}

impl TestServer {
    async fn spawn(clipboard: MemoryClipboard) -> Self {
        let temp = TempDir::new().unwrap();
        let staging_dir = temp.path().join("temp");
        let clipboard = Arc::new(clipboard);
        let notifier = Arc::new(RecordingNotifier::default());
        let (queue, _task) = NotificationQueue::spawn(notifier.clone(), 16);

        let handler = Arc::new(SyncHandler::new(
            clipboard.clone(),
            StagingArea::new(&staging_dir),
            queue,
        ));
        let app = build_router(handler, &ServerConfig::default());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            serve(listener, app, std::future::pending::<()>()).await.unwrap();
        });

        Self {
            base: format!("http://127.0.0.1:{}", port),
            http: reqwest::Client::new(),
            clipboard,
            notifier,
            staging_dir,
            _temp: temp,
        }
    }

    fn get(&self) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}/", self.base))
            .header("X-API-Version", "1")
            .header("X-Client-Name", "My%20iPhone")
    }

    fn post(&self, kind: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/", self.base))
            .header("X-API-Version", "1")
            .header("X-Client-Name", "My%20iPhone")
            .header("X-Content-Type", kind)
    }

    fn manifest(&self) -> Vec<PathBuf> {
        std::fs::read_to_string(self.staging_dir.join("_filename.txt"))
            .unwrap()
            .lines()
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// Wait for the background queue to deliver `count` notifications
    async fn notifications(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            {
                let seen = self.notifier.seen.lock().unwrap();
                if seen.len() >= count {
                    return seen.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifier.seen.lock().unwrap().clone()
    }
}

fn file_payload(files: &[(&str, &str)]) -> Value {
    let names: Vec<&str> = files.iter().map(|(n, _)| *n).collect();
    let blobs: Vec<String> = files
        .iter()
        .map(|(_, content)| codec::encode(content.as_bytes()))
        .collect();
    json!({ "names": names.join("\n"), "files": blobs.join("\n") })
}

#[tokio::test]
async fn push_text_sets_clipboard_and_notifies() {
    let server = TestServer::spawn(MemoryClipboard::new()).await;

    let resp = server
        .post("text")
        .json(&json!({ "text": "hello" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        server.clipboard.contents(),
        MemoryContents::Text("hello".to_string())
    );
    assert_eq!(
        server.notifications(1).await,
        vec![Notification {
            title: "粘贴自 My iPhone".to_string(),
            body: "hello".to_string(),
        }]
    );
}

#[tokio::test]
async fn push_empty_text_notifies_empty_content() {
    let server = TestServer::spawn(MemoryClipboard::with_text("before")).await;

    let resp = server.post("text").json(&json!({})).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(server.clipboard.contents(), MemoryContents::Text(String::new()));
    assert_eq!(server.notifications(1).await[0].body, "粘贴内容为空");
}

#[tokio::test]
async fn push_files_stages_and_sets_clipboard() {
    let server = TestServer::spawn(MemoryClipboard::new()).await;

    let resp = server
        .post("file")
        .json(&file_payload(&[("a.txt", "AAA"), ("b.txt", "BBB")]))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "");

    let expected = vec![server.staging_dir.join("a.txt"), server.staging_dir.join("b.txt")];
    assert_eq!(server.manifest(), expected);
    assert_eq!(server.clipboard.contents(), MemoryContents::Files(expected.clone()));
    assert_eq!(std::fs::read(&expected[0]).unwrap(), b"AAA");
    assert_eq!(std::fs::read(&expected[1]).unwrap(), b"BBB");
    assert_eq!(server.notifications(1).await[0].body, "[文件] 已复制到剪贴板");
}

#[tokio::test]
async fn push_media_replaces_previous_files() {
    let server = TestServer::spawn(MemoryClipboard::new()).await;

    server
        .post("file")
        .json(&file_payload(&[("a.txt", "A"), ("b.txt", "B")]))
        .send()
        .await
        .unwrap();
    let resp = server
        .post("media")
        .json(&file_payload(&[("c.jpg", "C")]))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert!(!server.staging_dir.join("a.txt").exists());
    assert!(!server.staging_dir.join("b.txt").exists());

    let c = server.staging_dir.join("c.jpg");
    assert_eq!(server.manifest(), vec![c.clone()]);
    assert_eq!(server.clipboard.contents(), MemoryContents::Files(vec![c]));
    assert_eq!(server.notifications(2).await[1].body, "[图片媒体] 已复制到剪贴板");
}

#[tokio::test]
async fn push_files_with_mismatched_batch_is_rejected() {
    let server = TestServer::spawn(MemoryClipboard::with_text("keep")).await;

    let resp = server
        .post("file")
        .json(&json!({ "names": "a.txt\nb.txt", "files": codec::encode(b"one") }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Malformed batch"));
    assert_eq!(server.clipboard.contents(), MemoryContents::Text("keep".to_string()));
}

#[tokio::test]
async fn push_with_unknown_kind_is_rejected() {
    let server = TestServer::spawn(MemoryClipboard::with_text("keep")).await;

    let resp = server
        .post("image")
        .json(&json!({ "text": "x" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    assert_eq!(server.clipboard.contents(), MemoryContents::Text("keep".to_string()));
}

#[tokio::test]
async fn push_with_malformed_body_is_rejected() {
    let server = TestServer::spawn(MemoryClipboard::with_text("keep")).await;

    let resp = server
        .post("text")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
    assert_eq!(server.clipboard.contents(), MemoryContents::Text("keep".to_string()));
}

#[tokio::test]
async fn malformed_file_body_leaves_previous_generation_in_place() {
    let server = TestServer::spawn(MemoryClipboard::new()).await;

    let resp = server
        .post("file")
        .json(&file_payload(&[("a.txt", "A")]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let a = server.staging_dir.join("a.txt");

    for kind in ["file", "media"] {
        let resp = server.post(kind).body("{not json").send().await.unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());

        assert_eq!(std::fs::read(&a).unwrap(), b"A");
        assert_eq!(server.manifest(), vec![a.clone()]);
        assert_eq!(server.clipboard.contents(), MemoryContents::Files(vec![a.clone()]));
    }
}

#[tokio::test]
async fn pull_text() {
    let server = TestServer::spawn(MemoryClipboard::with_text("from desktop")).await;

    let resp = server.get().send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: PullResponse = resp.json().await.unwrap();
    assert_eq!(body, PullResponse::Text("from desktop".to_string()));

    let seen = server.notifications(1).await;
    assert_eq!(seen[0].title, "复制自 My iPhone");
    assert_eq!(seen[0].body, "from desktop");
}

#[tokio::test]
async fn pull_empty_text_is_not_an_error() {
    let server = TestServer::spawn(MemoryClipboard::with_text("")).await;

    let resp = server.get().send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "type": "text", "data": "" }));
    assert_eq!(server.notifications(1).await[0].body, "复制内容为空");
}

#[tokio::test]
async fn pull_files_returns_encoded_contents() {
    let files = TempDir::new().unwrap();
    let report = files.path().join("report.pdf");
    std::fs::write(&report, b"%PDF").unwrap();
    let vanished = files.path().join("vanished.txt");

    let server = TestServer::spawn(MemoryClipboard::with_files(vec![report, vanished])).await;

    let resp = server.get().send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: PullResponse = resp.json().await.unwrap();
    assert_eq!(
        body,
        PullResponse::File(vec![WireFile {
            name: "report.pdf".to_string(),
            content: codec::encode(b"%PDF"),
        }])
    );
    assert_eq!(server.notifications(1).await[0].body, "[文件] 被复制");
}

#[tokio::test]
async fn pull_unrecognized_clipboard() {
    let server = TestServer::spawn(MemoryClipboard::new()).await;

    let resp = server.get().send().await.unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "无法识别剪切板内容" }));
}

#[tokio::test]
async fn version_mismatch_is_rejected_before_handler() {
    let server = TestServer::spawn(MemoryClipboard::with_text("keep")).await;

    let missing = server
        .http
        .get(format!("{}/", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 400);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body, json!({ "error": VERSION_MISMATCH }));

    let wrong = server
        .http
        .post(format!("{}/", server.base))
        .header("X-API-Version", "0")
        .header("X-Content-Type", "text")
        .json(&json!({ "text": "overwrite" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 400);
    assert_eq!(server.clipboard.contents(), MemoryContents::Text("keep".to_string()));
    assert!(server.notifications(1).await.is_empty());
}

#[tokio::test]
async fn anonymous_client_name() {
    let server = TestServer::spawn(MemoryClipboard::new()).await;

    server
        .http
        .post(format!("{}/", server.base))
        .header("X-API-Version", "1")
        .header("X-Content-Type", "text")
        .json(&json!({ "text": "hi" }))
        .send()
        .await
        .unwrap();

    assert_eq!(server.notifications(1).await[0].title, "粘贴自 匿名设备");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let server = TestServer::spawn(MemoryClipboard::new()).await;

    let resp = server
        .http
        .get(format!("{}/api/nonexistent", server.base))
        .header("X-API-Version", "1")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn concurrent_pushes_leave_one_generation() {
    let server = Arc::new(TestServer::spawn(MemoryClipboard::new()).await);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let server = Arc::clone(&server);
        tasks.push(tokio::spawn(async move {
            let first = format!("push{}-a.bin", i);
            let second = format!("push{}-b.bin", i);
            server
                .post("file")
                .json(&file_payload(&[(first.as_str(), "a"), (second.as_str(), "b")]))
                .send()
                .await
                .unwrap()
                .status()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), 200);
    }

    let manifest = server.manifest();
    assert_eq!(manifest.len(), 2);
    assert_eq!(server.clipboard.contents(), MemoryContents::Files(manifest.clone()));

    let mut on_disk: Vec<PathBuf> = std::fs::read_dir(&server.staging_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.file_name().unwrap() != "_filename.txt")
        .collect();
    on_disk.sort();
    let mut expected = manifest;
    expected.sort();
    assert_eq!(on_disk, expected);
}
