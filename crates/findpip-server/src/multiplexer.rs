// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TCP front end for findpip.
//
// The accept loop only accepts.  Each connection gets its own task which
// reads chunks until the framer yields a message, hands the message to the
// session coordinator (whose pipeline runs on the blocking pool), and closes
// the connection once the response has been written.  Exactly one message is
// served per connection.
//
// Connection states:
//
//   accept ──► AwaitingMessage ──(sentinel)──► Processing ──► Closing ──► gone
//                    │
//                    └──(EOF / read error / bad UTF-8)──────────────────► gone
//
// There is no idle timeout: a client that never sends the sentinel keeps its
// connection open until it disconnects.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use findpip_core::config::ServerConfig;
use findpip_core::error::{FindpipError, Result};
use findpip_core::types::{ConnectionId, ConnectionState, ServerStatus};

use crate::framer::{MessageFramer, READ_CHUNK_SIZE};
use crate::session::SessionCoordinator;

// ---------------------------------------------------------------------------
// Connection registry
// ---------------------------------------------------------------------------

/// Live connections and the state each one is in.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, ConnectionState>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, ConnectionState>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a freshly accepted connection.
    pub fn register(&self, id: ConnectionId) {
        self.lock().insert(id, ConnectionState::AwaitingMessage);
    }

    /// Move a registered connection to `state`. Unknown ids are ignored.
    pub fn set_state(&self, id: ConnectionId, state: ConnectionState) {
        if let Some(current) = self.lock().get_mut(&id) {
            *current = state;
        }
    }

    /// Remove a connection, returning the state it was in.
    pub fn deregister(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.lock().remove(&id)
    }

    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.lock().get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of connections currently in `state`.
    pub fn count_in(&self, state: ConnectionState) -> usize {
        self.lock().values().filter(|s| **s == state).count()
    }
}

// ---------------------------------------------------------------------------
// Shared state passed to connection handlers
// ---------------------------------------------------------------------------

struct SharedState {
    coordinator: Arc<SessionCoordinator>,
    registry: Arc<ConnectionRegistry>,
    active_connections: Arc<AtomicU32>,
}

// ---------------------------------------------------------------------------
// FindpipServer
// ---------------------------------------------------------------------------

/// The findpip TCP server.
pub struct FindpipServer {
    config: ServerConfig,
    status: ServerStatus,
    /// Notification handle used to signal a graceful shutdown.
    shutdown_signal: Arc<Notify>,
    /// Handle to the Tokio task running the accept loop.
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
    registry: Arc<ConnectionRegistry>,
    coordinator: Arc<SessionCoordinator>,
    /// Address actually bound, once started.
    local_addr: Option<SocketAddr>,
}

impl FindpipServer {
    /// Create a server with production session wiring. The server is
    /// created in `Stopped` state.
    pub fn new(config: ServerConfig) -> Self {
        let coordinator = Arc::new(SessionCoordinator::from_config(config.clone()));
        Self::with_coordinator(config, coordinator)
    }

    /// Create a server that runs sessions through `coordinator`.
    pub fn with_coordinator(config: ServerConfig, coordinator: Arc<SessionCoordinator>) -> Self {
        Self {
            config,
            status: ServerStatus::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections: Arc::new(AtomicU32::new(0)),
            registry: Arc::new(ConnectionRegistry::new()),
            coordinator,
            local_addr: None,
        }
    }

    /// The bound port once started, otherwise the configured one.
    pub fn port(&self) -> u16 {
        self.local_addr
            .map(|addr| addr.port())
            .unwrap_or(self.config.port)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Number of connections whose handler task is running.
    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Bind `0.0.0.0:{port}` and spawn the accept loop.
    ///
    /// # Errors
    ///
    /// Returns [`FindpipError::Server`] if the port cannot be bound.
    pub async fn start(&mut self) -> Result<()> {
        if self.status == ServerStatus::Running {
            debug!(port = self.port(), "server already running");
            return Ok(());
        }

        self.status = ServerStatus::Starting;

        let bind_addr: SocketAddr = ([0, 0, 0, 0], self.config.port).into();
        let listener = match TcpListener::bind(bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.status = ServerStatus::Stopped;
                return Err(FindpipError::Server(format!("bind {bind_addr}: {e}")));
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|e| FindpipError::Server(format!("local address: {e}")))?;
        self.local_addr = Some(local_addr);

        info!(
            addr = %local_addr,
            version = %self.config.version,
            scope = ?self.config.option_scope,
            "findpip server listening"
        );

        let shutdown = Arc::clone(&self.shutdown_signal);
        let shared = Arc::new(SharedState {
            coordinator: Arc::clone(&self.coordinator),
            registry: Arc::clone(&self.registry),
            active_connections: Arc::clone(&self.active_connections),
        });

        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, shared).await;
        });

        self.task_handle = Some(handle);
        self.status = ServerStatus::Running;
        Ok(())
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    /// Connections already accepted run to completion.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!(port = self.port(), "stopping findpip server");
        self.shutdown_signal.notify_one();

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| FindpipError::Server(format!("task join: {e}")))?;
        }

        self.status = ServerStatus::Stopped;
        info!(port = self.port(), "findpip server stopped");
        Ok(())
    }

    async fn accept_loop(listener: TcpListener, shutdown: Arc<Notify>, shared: Arc<SharedState>) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("accept loop received shutdown signal");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let id = ConnectionId::new();
                            shared.registry.register(id);
                            info!(
                                peer = %peer_addr,
                                connection = %id,
                                open = shared.registry.len(),
                                processing = shared.registry.count_in(ConnectionState::Processing),
                                "connection accepted"
                            );

                            let state = Arc::clone(&shared);
                            tokio::spawn(async move {
                                state.active_connections.fetch_add(1, Ordering::Relaxed);
                                if let Err(e) = Self::handle_connection(stream, peer_addr, id, &state).await {
                                    warn!(
                                        peer = %peer_addr,
                                        connection = %id,
                                        error = %e,
                                        "connection handler error"
                                    );
                                }
                                state.registry.deregister(id);
                                state.active_connections.fetch_sub(1, Ordering::Relaxed);
                                debug!(connection = %id, "connection closed");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }
    }

    /// Read one message from `stream`, serve it, and return. The caller
    /// deregisters the connection.
    async fn handle_connection(
        mut stream: TcpStream,
        peer_addr: SocketAddr,
        id: ConnectionId,
        state: &SharedState,
    ) -> Result<()> {
        let mut trace = state.coordinator.new_trace(id);
        trace.note(format!("Connection from {peer_addr}"));

        let mut framer = MessageFramer::new();
        let mut buf = [0u8; READ_CHUNK_SIZE];
        let message = loop {
            let n = stream
                .read(&mut buf)
                .await
                .map_err(|e| FindpipError::Server(format!("read from {peer_addr}: {e}")))?;
            if n == 0 {
                if framer.is_empty() {
                    debug!(peer = %peer_addr, "peer closed without sending");
                } else {
                    debug!(
                        peer = %peer_addr,
                        buffered = framer.buffered_len(),
                        chunks = framer.chunks_received(),
                        "peer closed before completing a message"
                    );
                }
                return Ok(());
            }
            if let Some(message) = framer.push(&buf[..n])? {
                break message;
            }
        };

        state.registry.set_state(id, ConnectionState::Processing);
        trace.note(format!("Message received ({} bytes)", message.len()));

        let outcome = Arc::clone(&state.coordinator)
            .serve(message, trace, &mut stream)
            .await?;

        state.registry.set_state(id, ConnectionState::Closing);
        match &outcome.transmission_error {
            None => info!(
                peer = %peer_addr,
                connection = %id,
                bytes = outcome.bytes_sent,
                extracted = outcome.extracted,
                "session complete"
            ),
            Some(e) => warn!(
                peer = %peer_addr,
                connection = %id,
                bytes = outcome.bytes_sent,
                error = %e,
                "session abandoned"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    fn ephemeral_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            ..ServerConfig::default()
        }
    }

    async fn connect(server: &FindpipServer) -> TcpStream {
        let port = server.port();
        TcpStream::connect(("127.0.0.1", port)).await.unwrap()
    }

    /// Poll `condition` until it holds or two seconds pass.
    async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    #[test]
    fn default_port_is_6003() {
        let server = FindpipServer::new(ServerConfig::default());
        assert_eq!(server.port(), 6003);
    }

    #[test]
    fn initial_status_is_stopped() {
        let server = FindpipServer::new(ServerConfig::default());
        assert_eq!(server.status(), ServerStatus::Stopped);
        assert_eq!(server.active_connections(), 0);
        assert!(server.local_addr().is_none());
    }

    #[test]
    fn registry_tracks_state() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        registry.register(id);
        assert_eq!(registry.state(id), Some(ConnectionState::AwaitingMessage));

        registry.set_state(id, ConnectionState::Processing);
        assert_eq!(registry.count_in(ConnectionState::Processing), 1);

        assert_eq!(registry.deregister(id), Some(ConnectionState::Processing));
        assert!(registry.is_empty());

        registry.set_state(id, ConnectionState::Closing);
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn start_and_stop() {
        let mut server = FindpipServer::new(ephemeral_config());
        server.start().await.unwrap();
        assert_eq!(server.status(), ServerStatus::Running);
        assert_ne!(server.port(), 0);

        server.stop().await.unwrap();
        assert_eq!(server.status(), ServerStatus::Stopped);
    }

    #[tokio::test]
    async fn version_request_over_tcp() {
        let mut server = FindpipServer::new(ephemeral_config());
        server.start().await.unwrap();

        let mut client = connect(&server).await;
        client.write_all(b"http://ver").await.unwrap();
        client.write_all(b"sion~").await.unwrap();
        client.write_all(b"~~").await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let expected = format!("{}\n", ServerConfig::default().version);
        assert_eq!(response, expected.as_bytes());

        assert!(eventually(|| server.registry().is_empty()).await);
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn waiting_connection_is_registered() {
        let mut server = FindpipServer::new(ephemeral_config());
        server.start().await.unwrap();

        let mut client = connect(&server).await;
        client.write_all(b"http://h/").await.unwrap();

        let registry = Arc::clone(server.registry());
        assert!(eventually(|| registry.count_in(ConnectionState::AwaitingMessage) == 1).await);

        drop(client);
        assert!(eventually(|| registry.is_empty()).await);
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn eof_before_sentinel_deregisters() {
        let mut server = FindpipServer::new(ephemeral_config());
        server.start().await.unwrap();

        let mut client = connect(&server).await;
        client.write_all(b"http://h/a.png").await.unwrap();
        client.shutdown().await.unwrap();

        // The server closes without answering.
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.is_empty());

        assert!(eventually(|| server.registry().is_empty()).await);
        assert!(eventually(|| server.active_connections() == 0).await);
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_utf8_closes_only_that_connection() {
        let mut server = FindpipServer::new(ephemeral_config());
        server.start().await.unwrap();

        let mut bad = connect(&server).await;
        bad.write_all(b"\xff\xfe~~~").await.unwrap();
        let mut response = Vec::new();
        bad.read_to_end(&mut response).await.unwrap();
        assert!(response.is_empty());

        let mut good = connect(&server).await;
        good.write_all(b"http://version~~~").await.unwrap();
        let mut response = Vec::new();
        good.read_to_end(&mut response).await.unwrap();
        assert!(!response.is_empty());

        server.stop().await.unwrap();
    }
}
