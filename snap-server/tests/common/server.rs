//! Test server harness for integration tests.
//!
//! Provides a way to spin up the real router on a random port
//! for integration testing with HTTP clients.

use std::net::SocketAddr;
use std::path::Path;

use snap_server::{router, AppState, ServerConfig, SubscriptionLedger};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Secret the test server signs webhooks with.
#[allow(dead_code)]
pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// A test server instance with control handles.
pub struct TestServer {
    addr: SocketAddr,
    ledger: SubscriptionLedger,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server with [`WEBHOOK_SECRET`] configured.
    ///
    /// # Panics
    ///
    /// Panics if no port is available or server fails to bind.
    pub async fn start(output_dir: &Path) -> Self {
        Self::start_with(ServerConfig::new(output_dir).with_webhook_secret(WEBHOOK_SECRET)).await
    }

    /// Start a server with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if no port is available or server fails to bind.
    pub async fn start_with(config: ServerConfig) -> Self {
        let port = portpicker::pick_unused_port().expect("no available port");
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let state = AppState::new(config).expect("state");
        let ledger = state.ledger().clone();
        let app = router(state);

        let listener = TcpListener::bind(addr).await.expect("failed to bind");
        let actual_addr = listener.local_addr().expect("failed to get local addr");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("server error");
        });

        // Give the server a moment to start
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

        Self {
            addr: actual_addr,
            ledger,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Full URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// The server's ledger (for test assertions).
    #[allow(dead_code)]
    pub fn ledger(&self) -> &SubscriptionLedger {
        &self.ledger
    }

    /// Gracefully shut down the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(tokio::time::Duration::from_secs(5), self.handle).await;
    }
}
