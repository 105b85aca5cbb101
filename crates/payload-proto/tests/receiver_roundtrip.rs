//! End-to-end dispatch against a local HTTP receiver.
//!
//! An axum server stands in for the console's payload port. Payload files
//! live in a temp directory and state in another.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use payload_proto::dispatch::{HttpDirSource, HttpReceiver, LocalDirSource, PayloadSource};
use payload_proto::store::FileBackend;
use payload_proto::{
    Catalog, Controller, DispatchEngine, DispatchError, DispatchOutcome, DispatchPhase, Notifier,
    PayloadDescriptor, StateStore,
};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct Received {
    bodies: Arc<Mutex<Vec<Vec<u8>>>>,
}

async fn accept(State(received): State<Received>, body: Bytes) -> StatusCode {
    received.bodies.lock().await.push(body.to_vec());
    StatusCode::OK
}

async fn serve_ftp() -> Vec<u8> {
    FTP_BYTES.to_vec()
}

async fn missing() -> StatusCode {
    StatusCode::NOT_FOUND
}

const FTP_BYTES: &[u8] = b"\x7fELF\x00ftp";

async fn refuse(_body: Bytes) -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Serve `app` on an ephemeral port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

struct Rig {
    payload_dir: TempDir,
    state_dir: TempDir,
    notifier: Notifier,
}

impl Rig {
    fn new() -> Self {
        Self {
            payload_dir: TempDir::new().unwrap(),
            state_dir: TempDir::new().unwrap(),
            notifier: Notifier::default(),
        }
    }

    fn put_payload(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.payload_dir.path().join(name), bytes).unwrap();
    }

    async fn engine(&self, receiver_url: &str) -> (Arc<DispatchEngine>, Arc<StateStore>) {
        let client = reqwest::Client::new();
        let store = Arc::new(StateStore::open(Arc::new(FileBackend::new(self.state_dir.path()))).await);
        let engine = Arc::new(DispatchEngine::new(
            Arc::new(LocalDirSource::new(self.payload_dir.path())),
            Arc::new(HttpReceiver::new(client, receiver_url)),
            store.clone(),
            self.notifier.clone(),
        ));
        (engine, store)
    }
}

#[tokio::test]
async fn exact_bytes_reach_receiver() {
    let received = Received::default();
    let app = Router::new()
        .route("/", post(accept))
        .with_state(received.clone());
    let url = serve(app).await;

    let rig = Rig::new();
    let body: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    rig.put_payload("goldhen.bin", &body);

    let (engine, store) = rig.engine(&format!("{}/", url)).await;
    let outcome = engine.dispatch("goldhen.bin").await;

    match outcome {
        DispatchOutcome::Sent {
            name,
            recents,
            persisted,
        } => {
            assert_eq!(name, "goldhen.bin");
            assert_eq!(recents, vec!["goldhen.bin"]);
            assert!(persisted);
        }
        other => panic!("expected Sent, got {:?}", other),
    }

    let bodies = received.bodies.lock().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0], body);

    let status = engine.status().await;
    assert_eq!(status.phase, DispatchPhase::Sent);
    assert_eq!(status.selected_name.as_deref(), Some("goldhen.bin"));
    assert_eq!(store.recents().await, vec!["goldhen.bin"]);

    // Recents survive a reopen of the state directory.
    let reopened = StateStore::open(Arc::new(FileBackend::new(rig.state_dir.path()))).await;
    assert_eq!(reopened.recents().await, vec!["goldhen.bin"]);
}

#[tokio::test]
async fn error_status_is_transfer_failure() {
    let url = serve(Router::new().route("/", post(refuse))).await;

    let rig = Rig::new();
    rig.put_payload("ftp.bin", b"\x7fELF");
    let (engine, store) = rig.engine(&format!("{}/", url)).await;

    match engine.dispatch("ftp.bin").await {
        DispatchOutcome::Failed { error, .. } => {
            assert!(matches!(error, DispatchError::TransferFailed { .. }));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(engine.status().await.phase, DispatchPhase::Failed);
    assert!(store.recents().await.is_empty());
}

#[tokio::test]
async fn closed_port_is_transfer_failure() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let rig = Rig::new();
    rig.put_payload("ftp.bin", b"payload");
    let (engine, _store) = rig.engine(&format!("http://{}/", addr)).await;

    match engine.dispatch("ftp.bin").await {
        DispatchOutcome::Failed { error, .. } => {
            assert!(matches!(error, DispatchError::TransferFailed { .. }));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn controller_sends_through_real_receiver() {
    let received = Received::default();
    let app = Router::new()
        .route("/", post(accept))
        .with_state(received.clone());
    let url = serve(app).await;

    let rig = Rig::new();
    rig.put_payload("a.bin", b"first");
    rig.put_payload("b.bin", b"second");
    let (engine, store) = rig.engine(&format!("{}/", url)).await;

    let catalog = Arc::new(
        Catalog::new(vec![
            PayloadDescriptor::new("a.bin", "first payload", 1.0),
            PayloadDescriptor::new("b.bin", "second payload", 1.0),
        ])
        .unwrap(),
    );
    let controller = Controller::new(catalog, engine, store, rig.notifier.clone());

    controller.select_and_send("a.bin").await.await.unwrap();
    controller.select_and_send("b.bin").await.await.unwrap();

    let snap = controller.snapshot().await;
    assert_eq!(snap.state.recents, vec!["b.bin", "a.bin"]);
    assert_eq!(snap.selected.as_deref(), Some("b.bin"));

    let bodies = received.bodies.lock().await;
    assert_eq!(bodies.as_slice(), &[b"first".to_vec(), b"second".to_vec()]);
}

#[tokio::test]
async fn http_source_fetches_base_plus_name() {
    let received = Received::default();
    let app = Router::new()
        .route("/payloads/ftp.bin", get(serve_ftp))
        .route("/payloads/gone.bin", get(missing))
        .route("/", post(accept))
        .with_state(received.clone());
    let url = serve(app).await;

    let client = reqwest::Client::new();
    let source = HttpDirSource::new(client.clone(), format!("{}/payloads/", url));
    assert_eq!(source.fetch("ftp.bin").await.unwrap(), FTP_BYTES);
    assert!(matches!(
        source.fetch("gone.bin").await,
        Err(DispatchError::SourceUnavailable { .. })
    ));

    let rig = Rig::new();
    let store = Arc::new(StateStore::open(Arc::new(FileBackend::new(rig.state_dir.path()))).await);
    let engine = DispatchEngine::new(
        Arc::new(source),
        Arc::new(HttpReceiver::new(client, format!("{}/", url))),
        store.clone(),
        rig.notifier.clone(),
    );

    assert!(engine.dispatch("ftp.bin").await.is_sent());
    match engine.dispatch("gone.bin").await {
        DispatchOutcome::Failed { error, .. } => {
            assert!(matches!(error, DispatchError::SourceUnavailable { .. }));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(store.recents().await, vec!["ftp.bin"]);
    assert_eq!(received.bodies.lock().await.as_slice(), &[FTP_BYTES.to_vec()]);
}
