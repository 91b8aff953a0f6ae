use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cheatcode_core::ConversationChain;
use cheatcode_core::session::SessionStore;
use cheatcode_llm::any::AnyProvider;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub(crate) struct AppState {
    pub chain: Arc<ConversationChain<AnyProvider>>,
    pub sessions: Arc<SessionStore>,
    pub started_at: Instant,
}

pub struct GatewayServer {
    addr: SocketAddr,
    max_body_size: usize,
    session_ttl: Duration,
    chain: Arc<ConversationChain<AnyProvider>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        chain: Arc<ConversationChain<AnyProvider>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("binding to 0.0.0.0 exposes the chat API without authentication");
        }

        Self {
            addr,
            max_body_size: 1_048_576,
            session_ttl: Duration::from_secs(1800),
            chain,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Start the HTTP server and run until the shutdown signal fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let sessions = Arc::new(SessionStore::new(self.session_ttl));
        let state = AppState {
            chain: self.chain,
            sessions: Arc::clone(&sessions),
            started_at: Instant::now(),
        };

        let router = build_router(state, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("listening on http://{}", self.addr);

        let purge = tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                interval.tick().await;
                sessions.purge_expired().await;
            }
        });

        let mut shutdown_rx = self.shutdown_rx;
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                tracing::info!("server shutting down");
            })
            .await
            .map_err(|e| GatewayError::Server(format!("{e}")));

        purge.abort();
        result
    }
}
