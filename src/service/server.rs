//! Service lifecycle
//!
//! Open store → start listeners → verify liveness → serve → graceful
//! shutdown. The ordering invariant on the way down: both listeners stop
//! accepting and drain (or hit the grace deadline) before the store closes,
//! so no in-flight lookup ever observes a closed store.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;

use crate::error::{Error, Result};
use crate::service::grpc::MetaFetcherService;
use crate::service::{http, Lookup};
use crate::store::{self, OpenMode, Store, StoreConfig};

/// A bind can succeed while the effective service isn't reachable; the probe
/// converts that into a hard startup failure instead of a half-working deploy.
const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// How long after starting a listener we still treat its failure as a
/// startup failure rather than a runtime one.
const STARTUP_WINDOW: Duration = Duration::from_secs(1);

/// Upper bound on each gRPC request.
const GRPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Docker stop only gives us 10s; drain everything before that.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(9);

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub http_addr: SocketAddr,
    pub grpc_addr: SocketAddr,
    pub store: StoreConfig,
    pub open_mode: OpenMode,
    pub shutdown_grace: Duration,
}

pub struct Service {
    config: ServiceConfig,
    store: Option<Arc<dyn Store>>,
}

impl Service {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    /// Serve against an already-open store handle instead of opening one
    /// from the config. The lifecycle still owns the handle and closes it.
    pub fn with_store(config: ServiceConfig, store: Arc<dyn Store>) -> Self {
        Self {
            config,
            store: Some(store),
        }
    }

    /// Run the service until `shutdown` resolves (or startup fails).
    ///
    /// The store is closed exactly once, after the listeners have finished,
    /// on every exit path past a successful open.
    pub async fn serve(mut self, shutdown: impl Future<Output = ()> + Send) -> Result<()> {
        tracing::info!(
            http = %self.config.http_addr,
            grpc = %self.config.grpc_addr,
            "starting lookup service"
        );
        let store: Arc<dyn Store> = match self.store.take() {
            Some(store) => store,
            None => Arc::from(store::open(&self.config.store, self.config.open_mode)?),
        };

        let result = self.run(Arc::clone(&store), shutdown).await;

        if let Err(e) = store.close() {
            tracing::error!(error = %e, "couldn't close store");
            return result.and(Err(e));
        }
        tracing::info!("store closed");
        result
    }

    async fn run(
        &self,
        store: Arc<dyn Store>,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<()> {
        let lookup = Arc::new(Lookup::new(store));
        // Cancellation signal for both listeners
        let (stop_tx, stop_rx) = watch::channel(false);
        // Listener tasks report failures here instead of crashing the
        // process, tagged with the listener that produced them
        let (err_tx, mut err_rx) = mpsc::channel::<(&'static str, String)>(2);

        // HTTP listener
        let http_listener = match TcpListener::bind(self.config.http_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                return Err(Error::StartupVerification(format!(
                    "couldn't bind HTTP listener on {}: {e}",
                    self.config.http_addr
                )))
            }
        };
        let http_addr = http_listener.local_addr()?;
        let router = http::router(Arc::clone(&lookup));
        let http_err = err_tx.clone();
        let mut http_stop = stop_rx.clone();
        let http_task = tokio::spawn(async move {
            let served = axum::serve(http_listener, router)
                .with_graceful_shutdown(async move {
                    let _ = http_stop.changed().await;
                })
                .await;
            if let Err(e) = served {
                let _ = http_err.send(("HTTP", e.to_string())).await;
            }
        });
        let mut tasks = vec![("HTTP", http_task)];

        if let Err(e) = verify_http(http_addr, &mut err_rx).await {
            return self.abort_startup(tasks, stop_tx, e).await;
        }
        tracing::info!(addr = %http_addr, "HTTP server started successfully");

        // gRPC listener
        let grpc_listener = match TcpListener::bind(self.config.grpc_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                let err = Error::StartupVerification(format!(
                    "couldn't bind gRPC listener on {}: {e}",
                    self.config.grpc_addr
                ));
                return self.abort_startup(tasks, stop_tx, err).await;
            }
        };
        let grpc_addr = match grpc_listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => return self.abort_startup(tasks, stop_tx, Error::Io(e)).await,
        };
        let grpc_service = MetaFetcherService::new(Arc::clone(&lookup)).into_server();
        let grpc_err = err_tx.clone();
        let mut grpc_stop = stop_rx.clone();
        let grpc_task = tokio::spawn(async move {
            let served = tonic::transport::Server::builder()
                .timeout(GRPC_REQUEST_TIMEOUT)
                .add_service(grpc_service)
                .serve_with_incoming_shutdown(TcpListenerStream::new(grpc_listener), async move {
                    let _ = grpc_stop.changed().await;
                })
                .await;
            if let Err(e) = served {
                let _ = grpc_err.send(("gRPC", e.to_string())).await;
            }
        });
        tasks.push(("gRPC", grpc_task));
        // Only the listener tasks may report errors from here on
        drop(err_tx);

        if let Err(e) = startup_window(&mut err_rx).await {
            return self.abort_startup(tasks, stop_tx, e).await;
        }
        tracing::info!(addr = %grpc_addr, "gRPC server started successfully");

        // Serving: block until the termination signal or a listener death
        let serve_result = {
            tokio::pin!(shutdown);
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("termination signal received, shutting down");
                    Ok(())
                }
                err = err_rx.recv() => Err(match err {
                    Some((listener, detail)) => {
                        Error::Internal(format!("{listener} server failed: {detail}"))
                    }
                    None => Error::Internal("listeners exited unexpectedly".to_string()),
                }),
            }
        };
        if let Err(e) = &serve_result {
            tracing::error!(error = %e, "listener failed while serving, shutting down");
        }

        let _ = stop_tx.send(true);
        let drained = self.drain(tasks).await;
        serve_result.and(drained)
    }

    /// Unwind already-started listeners after a startup failure.
    async fn abort_startup(
        &self,
        tasks: Vec<(&'static str, JoinHandle<()>)>,
        stop_tx: watch::Sender<bool>,
        err: Error,
    ) -> Result<()> {
        tracing::error!(error = %err, "startup verification failed, unwinding");
        let _ = stop_tx.send(true);
        if let Err(e) = self.drain(tasks).await {
            tracing::error!(error = %e, "unwind didn't finish cleanly");
        }
        Err(err)
    }

    /// Wait for the listener tasks to drain, bounded by the shutdown grace
    /// period. On deadline overrun the remaining tasks are abandoned so the
    /// store still closes in time; integrity wins over a stuck connection.
    async fn drain(&self, tasks: Vec<(&'static str, JoinHandle<()>)>) -> Result<()> {
        let grace = self.config.shutdown_grace;
        let joined = tokio::time::timeout(grace, async {
            for (name, task) in tasks {
                match task.await {
                    Ok(()) => tracing::info!(listener = name, "listener stopped"),
                    Err(e) => tracing::error!(listener = name, error = %e, "listener task panicked"),
                }
            }
        })
        .await;
        match joined {
            Ok(()) => Ok(()),
            Err(_) => {
                tracing::warn!(?grace, "grace period elapsed before listeners drained");
                Err(Error::Internal(
                    "shutdown deadline elapsed before listeners drained".to_string(),
                ))
            }
        }
    }
}

/// Probe the liveness path, then watch for an early server error.
async fn verify_http(
    addr: SocketAddr,
    err_rx: &mut mpsc::Receiver<(&'static str, String)>,
) -> Result<()> {
    let host = if addr.ip().is_unspecified() {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        addr.ip()
    };
    let url = format!("http://{}/health", SocketAddr::new(host, addr.port()));
    let client = reqwest::Client::builder()
        .timeout(STARTUP_PROBE_TIMEOUT)
        .build()
        .map_err(|e| Error::Internal(format!("couldn't build probe client: {e}")))?;
    let response = client.get(&url).send().await.map_err(|e| {
        Error::StartupVerification(format!("liveness probe to {url} failed: {e}"))
    })?;
    if !response.status().is_success() {
        return Err(Error::StartupVerification(format!(
            "liveness probe to {url} returned {}",
            response.status()
        )));
    }
    // The probe alone isn't proof: a conflicting process on the port could
    // have answered it while our own listener failed.
    startup_window(err_rx).await
}

/// Require that no listener error shows up within the startup window. The
/// channel is shared by both listener tasks, so the failure is attributed to
/// whichever one reported it, not to whichever started last.
async fn startup_window(err_rx: &mut mpsc::Receiver<(&'static str, String)>) -> Result<()> {
    tokio::select! {
        err = err_rx.recv() => {
            let (listener, detail) = err
                .unwrap_or_else(|| ("listener", "task exited".to_string()));
            Err(Error::StartupVerification(format!(
                "{listener} listener failed during startup: {detail}"
            )))
        }
        _ = tokio::time::sleep(STARTUP_WINDOW) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn startup_window_names_the_listener_that_failed() {
        let (tx, mut rx) = mpsc::channel(2);
        tx.send(("HTTP", "connection reset".to_string()))
            .await
            .unwrap();

        // The gRPC startup check must not claim an HTTP failure as its own.
        let err = startup_window(&mut rx).await.unwrap_err();
        assert!(matches!(err, Error::StartupVerification(_)));
        let message = err.to_string();
        assert!(message.contains("HTTP listener failed during startup"));
        assert!(message.contains("connection reset"));
        assert!(!message.contains("gRPC"));
    }

    #[tokio::test]
    async fn startup_window_passes_when_no_listener_reports() {
        let (tx, mut rx) = mpsc::channel::<(&'static str, String)>(2);
        startup_window(&mut rx).await.unwrap();
        drop(tx);
    }
}
