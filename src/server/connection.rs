//! Per-connection WebSocket handling
//!
//! Each accepted socket gets a reader (this task) and a writer task. The
//! writer drains the connection's [`Outbox`](super::Outbox) so that a slow
//! peer never holds up the hub.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

use crate::chat::ChatStore;
use crate::connection::ConnectionId;
use crate::error::{Error, Result};
use crate::protocol;
use crate::server::config::ServerConfig;
use crate::server::hub::Hub;

/// One client connection
pub struct Connection<S: ChatStore> {
    peer_addr: SocketAddr,
    config: ServerConfig,
    hub: Arc<Hub<S>>,
}

impl<S: ChatStore> Connection<S> {
    pub fn new(peer_addr: SocketAddr, config: ServerConfig, hub: Arc<Hub<S>>) -> Self {
        Self {
            peer_addr,
            config,
            hub,
        }
    }

    /// Upgrade the socket and serve it until either side closes
    ///
    /// The connection is always removed from the hub before this returns,
    /// whether it closed cleanly or failed.
    pub async fn run(self, socket: TcpStream) -> Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        let ws_config = WebSocketConfig::default().max_message_size(Some(self.config.max_message_size));
        let ws = tokio::time::timeout(
            self.config.handshake_timeout,
            tokio_tungstenite::accept_async_with_config(socket, Some(ws_config)),
        )
        .await
        .map_err(|_| Error::HandshakeTimeout)??;

        let (sink, mut stream) = ws.split();
        let (tx, rx) = mpsc::channel(self.config.outbox_capacity.max(1));

        let conn = self.hub.connect(tx).await;
        tracing::debug!(connection = %conn, peer = %self.peer_addr, "Client connected");

        let writer = tokio::spawn(write_loop(conn, sink, rx));

        let result = self.read_loop(conn, &mut stream).await;

        self.hub.disconnect(conn).await;
        // outbox is gone now, so the writer flushes and exits
        if let Err(e) = writer.await {
            tracing::debug!(connection = %conn, error = %e, "Writer task failed");
        }

        tracing::debug!(connection = %conn, peer = %self.peer_addr, "Client disconnected");
        result
    }

    async fn read_loop(
        &self,
        conn: ConnectionId,
        stream: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    ) -> Result<()> {
        while let Some(message) = stream.next().await {
            match message? {
                Message::Text(text) => match protocol::decode(text.as_str()) {
                    Ok(event) => {
                        tracing::trace!(connection = %conn, event = event.name(), "Received event");
                        self.hub.dispatch(conn, event).await;
                    }
                    Err(e) => {
                        tracing::debug!(connection = %conn, error = %e, "Ignoring malformed frame");
                    }
                },
                Message::Close(_) => break,
                // pings are answered by tungstenite itself
                _ => {}
            }
        }

        Ok(())
    }
}

async fn write_loop(
    conn: ConnectionId,
    mut sink: futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>,
    mut rx: mpsc::Receiver<bytes::Bytes>,
) {
    while let Some(frame) = rx.recv().await {
        let text = match Utf8Bytes::try_from(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(connection = %conn, error = %e, "Dropping non-UTF-8 frame");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(text)).await {
            tracing::debug!(connection = %conn, error = %e, "Failed to send frame");
            return;
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!(connection = %conn, error = %e, "Failed to close socket");
    }
}
