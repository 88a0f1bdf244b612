//! Signaling server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::chat::{ChatStore, NoStore};
use crate::error::Result;
use crate::room::RoomConfig;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::hub::Hub;

/// WebSocket signaling server
pub struct SignalServer<S: ChatStore = NoStore> {
    config: ServerConfig,
    hub: Arc<Hub<S>>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl SignalServer<NoStore> {
    /// Create a new server that keeps chat in memory only
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, RoomConfig::default(), NoStore)
    }
}

impl<S: ChatStore> SignalServer<S> {
    /// Create a new server with custom room configuration and chat store
    pub fn with_store(config: ServerConfig, room_config: RoomConfig, store: S) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            hub: Arc::new(Hub::with_store(room_config, store)),
            connection_semaphore,
        }
    }

    /// Get a reference to the shared hub
    pub fn hub(&self) -> &Arc<Hub<S>> {
        &self.hub
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tracing::info!(addr = %listener.local_addr()?, "Signaling server listening");

        let stats_handle = if self.config.stats_interval.is_zero() {
            None
        } else {
            Some(self.hub.spawn_stats_task(self.config.stats_interval))
        };

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        if let Some(handle) = stats_handle {
            handle.abort();
        }

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        tracing::debug!(peer = %peer_addr, "New connection");

        let connection = Connection::new(peer_addr, self.config.clone(), Arc::clone(&self.hub));

        tokio::spawn(async move {
            // held for the lifetime of the connection
            let _permit = permit;

            if let Err(e) = connection.run(socket).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Connection error");
            }
        });
    }
}
