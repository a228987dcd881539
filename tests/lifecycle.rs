//! Full service lifecycle: dual-protocol serving against one store,
//! graceful shutdown ordering, and startup verification failures

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use imdb2meta::ingest::{self, IngestOptions};
use imdb2meta::proto::meta_fetcher_client::MetaFetcherClient;
use imdb2meta::proto::MetaRequest;
use imdb2meta::service::server::DEFAULT_SHUTDOWN_GRACE;
use imdb2meta::store::{self, OpenMode, Store, StoreConfig};
use imdb2meta::{Error, Result, Service, ServiceConfig};
use tempfile::TempDir;
use tokio::sync::oneshot;

const TSV: &str = "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres\n\
tt0000001\tshort\tCarmencita\tCarmencita\t0\t1894\t\\N\t1\tDocumentary,Short";

fn ingest_fixture(dir: &TempDir) -> StoreConfig {
    let config = StoreConfig::from_paths(Some(dir.path().join("db")), None).unwrap();
    let store = store::open(&config, OpenMode::ReadWrite).unwrap();
    ingest::run(
        Cursor::new(TSV.to_string()),
        store.as_ref(),
        &IngestOptions::default(),
    )
    .unwrap();
    store.close().unwrap();
    config
}

fn free_addr() -> SocketAddr {
    // Bind to an ephemeral port and release it; tests re-bind shortly after.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn service_config(store: StoreConfig) -> ServiceConfig {
    ServiceConfig {
        http_addr: free_addr(),
        grpc_addr: free_addr(),
        store,
        open_mode: OpenMode::ReadOnly,
        shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
    }
}

async fn connect_grpc(addr: SocketAddr) -> MetaFetcherClient<tonic::transport::Channel> {
    for _ in 0..50 {
        if let Ok(client) = MetaFetcherClient::connect(format!("http://{addr}")).await {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("couldn't connect to gRPC server at {addr}");
}

async fn await_health(client: &reqwest::Client, url: &str) {
    for _ in 0..50 {
        if let Ok(response) = client.get(url).send().await {
            if response.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("service never became healthy at {url}");
}

#[tokio::test(flavor = "multi_thread")]
async fn serves_both_protocols_and_shuts_down_cleanly() {
    let dir = TempDir::new().unwrap();
    let config = service_config(ingest_fixture(&dir));
    let http_addr = config.http_addr;
    let grpc_addr = config.grpc_addr;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let service = tokio::spawn(Service::new(config).serve(async move {
        let _ = stop_rx.await;
    }));

    let client = reqwest::Client::new();
    let health_url = format!("http://{http_addr}/health");
    await_health(&client, &health_url).await;

    // HTTP lookup
    let response = client
        .get(format!("http://{http_addr}/meta/tt0000001"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["id"], "tt0000001");
    assert_eq!(json["titleType"], "short");

    let response = client
        .get(format!("http://{http_addr}/meta/tt9999999"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    // gRPC lookup against the same store; the gRPC listener comes up after
    // the HTTP one has been verified, so retry the connect briefly
    let mut grpc = connect_grpc(grpc_addr).await;
    let meta = grpc
        .get(MetaRequest {
            id: "tt0000001".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(meta.id, "tt0000001");
    assert_eq!(meta.primary_title, "Carmencita");

    let status = grpc
        .get(MetaRequest {
            id: "tt9999999".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::NotFound);

    let status = grpc
        .get(MetaRequest { id: String::new() })
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);

    // Trigger shutdown; the service must drain and exit cleanly
    stop_tx.send(()).unwrap();
    service.await.unwrap().unwrap();

    // Listeners are gone after shutdown
    assert!(client.get(&health_url).send().await.is_err());
}

/// Wraps a real store and stretches every read, so a lookup can still be in
/// flight when the termination signal lands. Records whether any read ran
/// against an already-closed store.
#[derive(Debug)]
struct SlowStore {
    inner: Box<dyn Store>,
    closed: Arc<AtomicBool>,
    read_after_close: Arc<AtomicBool>,
}

impl Store for SlowStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        std::thread::sleep(Duration::from_millis(500));
        if self.closed.load(Ordering::SeqCst) {
            self.read_after_close.store(true, Ordering::SeqCst);
        }
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.inner.put(key, value)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.inner.close()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_lookup_completes_during_shutdown() {
    let dir = TempDir::new().unwrap();
    let store_config = ingest_fixture(&dir);

    let closed = Arc::new(AtomicBool::new(false));
    let read_after_close = Arc::new(AtomicBool::new(false));
    let slow = Arc::new(SlowStore {
        inner: store::open(&store_config, OpenMode::ReadOnly).unwrap(),
        closed,
        read_after_close: Arc::clone(&read_after_close),
    });

    let config = service_config(store_config);
    let http_addr = config.http_addr;
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let service = tokio::spawn(Service::with_store(config, slow).serve(async move {
        let _ = stop_rx.await;
    }));

    let client = reqwest::Client::new();
    await_health(&client, &format!("http://{http_addr}/health")).await;

    // Start a lookup that is still reading when the signal arrives
    let in_flight = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .get(format!("http://{http_addr}/meta/tt0000001"))
                .send()
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(150)).await;
    stop_tx.send(()).unwrap();

    // The pending lookup drains to completion instead of being cut off
    let response = in_flight.await.unwrap().unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["id"], "tt0000001");

    // Clean exit, and the store closed only after the last read finished
    service.await.unwrap().unwrap();
    assert!(!read_after_close.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread")]
async fn startup_aborts_when_http_port_is_taken() {
    let dir = TempDir::new().unwrap();
    let mut config = service_config(ingest_fixture(&dir));

    // Occupy the HTTP port before the service starts
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    config.http_addr = blocker.local_addr().unwrap();

    let err = Service::new(config)
        .serve(std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StartupVerification(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn startup_aborts_when_grpc_port_is_taken() {
    let dir = TempDir::new().unwrap();
    let mut config = service_config(ingest_fixture(&dir));

    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    config.grpc_addr = blocker.local_addr().unwrap();

    let err = Service::new(config)
        .serve(std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StartupVerification(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn startup_fails_on_un_ingested_store() {
    let dir = TempDir::new().unwrap();
    let config = service_config(
        StoreConfig::from_paths(Some(dir.path().join("empty-db")), None).unwrap(),
    );

    let err = Service::new(config)
        .serve(std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Integrity(_)));
}
