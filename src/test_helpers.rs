//! In-process HTTP server for tests that exercise real requests.

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

use crate::downloader::Job;
use crate::thread::RemoteFile;

pub struct MockFile {
    pub path: String,
    pub body: Vec<u8>,
}

impl MockFile {
    pub fn new(path: &str, body: &[u8]) -> Self {
        MockFile {
            path: path.to_string(),
            body: body.to_vec(),
        }
    }
}

pub struct MockServer {
    pub base: String,
    hits: Arc<AtomicUsize>,
}

impl MockServer {
    /// Requests answered with a body so far. Unknown paths get a 404 and are
    /// not counted.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serve `files` on an ephemeral localhost port until the test's runtime
/// shuts down.
pub async fn serve(files: Vec<MockFile>) -> MockServer {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut app = Router::new();
    for file in files {
        let hits = Arc::clone(&hits);
        let body = file.body;
        app = app.route(
            &file.path,
            get(move || {
                let hits = Arc::clone(&hits);
                let body = body.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    body
                }
            }),
        );
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        base: format!("http://{}", addr),
        hits,
    }
}

/// A file whose expected checksum matches `body`.
pub fn remote_file(id: u64, url: String, body: &[u8]) -> RemoteFile {
    RemoteFile {
        id,
        board: "wg".to_string(),
        name: format!("file{}", id),
        extension: "jpg".to_string(),
        size: body.len() as u64,
        width: 1,
        height: 1,
        md5: format!("{:x}", md5::compute(body)),
        url,
    }
}

pub fn job(file: RemoteFile, dir: &std::path::Path) -> Job {
    let destination = dir.join(format!("{}.{}", file.id, file.extension));
    Job { file, destination }
}
